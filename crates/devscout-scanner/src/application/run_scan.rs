//! RunScan use case: one scan from start to exactly-once finalize.
//!
//! The orchestrator starts both discovery sources, folds their events
//! into per-source device rosters, blends heterogeneous progress
//! signals into one non-decreasing gauge, and closes the session out
//! through the store when the scan ends.
//!
//! # Concurrency model
//!
//! Source events, the progress tick, the scan deadline, and caller
//! commands all race. Every piece of mutable scan state therefore
//! lives on one actor task and is touched from nowhere else; the
//! public [`ScanOrchestrator`] handle only sends commands and reads
//! watch channels. `start()` and `stop()` are non-blocking — callers
//! observe effects through the [`ScanEvent`] stream and the
//! `scanning`/`progress` watches, never by blocking on a result.
//!
//! # Finalize
//!
//! Three triggers end a scan: an explicit stop, the absolute deadline,
//! and natural completion of one source while the other is already
//! inactive. They may fire in any order, including simultaneously.
//! All of them funnel into [`finish_scanning`], and the active-scan
//! state is consumed with `Option::take` — the first trigger wins and
//! every later one finds nothing left to finalize. The tick and
//! deadline timers are owned by the consumed state, so no timer can
//! outlive the scan that armed it.
//!
//! [`finish_scanning`]: Actor::finish_scanning

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use devscout_core::{Device, DeviceRoster, ProgressBlend, ScanSession};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::session_store::SessionStore;
use crate::infrastructure::discovery::{DiscoverySource, SourceEvent, SourceKind};

/// Timing settings for one scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Short-range source scan window.
    pub short_range_window: Duration,
    /// Local-network source scan window.
    pub local_network_window: Duration,
    /// Progress gauge tick interval.
    pub progress_tick: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            short_range_window: Duration::from_secs(15),
            local_network_window: Duration::from_secs(15),
            progress_tick: Duration::from_millis(100),
        }
    }
}

impl ScanConfig {
    /// The orchestrator's absolute deadline: the later of the two
    /// sources' own windows. A well-behaved source finishes on its own
    /// first; the deadline catches the ones that do not.
    pub fn deadline(&self) -> Duration {
        self.short_range_window.max(self.local_network_window)
    }
}

/// Notifications emitted while a scan runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// A session was created; at least one source is scanning.
    Started { session_id: Uuid },
    /// A device was sighted for the first time or refreshed.
    DeviceSeen { device: Device },
    /// A source could not start or died mid-scan. The scan itself
    /// keeps running as long as its sibling does.
    SourceFailed { kind: SourceKind, reason: String },
    /// A store write failed. The in-memory session stands; nothing is
    /// retried.
    PersistenceFailed { reason: String },
    /// The session was finalized and persisted.
    Finished { session_id: Uuid, device_count: usize },
}

/// Commands accepted by the actor.
enum Command {
    Start,
    Stop,
}

/// Handle to the scan actor.
///
/// Dropping the handle shuts the actor down, finalizing any scan
/// still in flight.
pub struct ScanOrchestrator {
    commands: mpsc::UnboundedSender<Command>,
    scanning: watch::Receiver<bool>,
    progress: watch::Receiver<f64>,
}

impl ScanOrchestrator {
    /// Spawns the scan actor and returns the handle together with the
    /// notification stream.
    ///
    /// Both sources and the store are injected, which is what lets the
    /// whole use case run against mocks in tests.
    pub fn spawn(
        short_range: Arc<dyn DiscoverySource>,
        local_network: Arc<dyn DiscoverySource>,
        store: Arc<dyn SessionStore>,
        config: ScanConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (scanning_tx, scanning_rx) = watch::channel(false);
        let (progress_tx, progress_rx) = watch::channel(0.0);

        let actor = Actor {
            short_range,
            local_network,
            store,
            config,
            events: event_tx,
            scanning: scanning_tx,
            progress: progress_tx,
            scan: None,
        };
        tokio::spawn(actor.run(command_rx));

        (
            Self {
                commands: command_tx,
                scanning: scanning_rx,
                progress: progress_rx,
            },
            event_rx,
        )
    }

    /// Requests a scan start. Non-blocking; a no-op if a scan is
    /// already running.
    pub fn start(&self) {
        let _ = self.commands.send(Command::Start);
    }

    /// Requests a stop. Non-blocking; effective in any state.
    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    /// Whether a session is currently active.
    pub fn is_scanning(&self) -> bool {
        *self.scanning.borrow()
    }

    /// The current combined progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        *self.progress.borrow()
    }

    /// A watch on the scanning flag.
    pub fn scanning_changes(&self) -> watch::Receiver<bool> {
        self.scanning.clone()
    }

    /// A watch on the combined progress gauge.
    pub fn progress_changes(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }
}

/// Per-source state during one scan.
struct Lane {
    /// The source's event stream; `None` once the source is inactive
    /// (finished, failed, or never started).
    events: Option<mpsc::UnboundedReceiver<SourceEvent>>,
    /// Devices this source has sighted, deduplicated, in discovery
    /// order.
    roster: DeviceRoster,
}

impl Lane {
    fn new(events: Option<mpsc::UnboundedReceiver<SourceEvent>>) -> Self {
        Self {
            events,
            roster: DeviceRoster::new(),
        }
    }
}

/// Everything owned by one in-flight scan. Consumed whole at finalize.
struct ActiveScan {
    session: ScanSession,
    started_at: Instant,
    short_range: Lane,
    local_network: Lane,
    blend: ProgressBlend,
    tick: time::Interval,
    deadline: std::pin::Pin<Box<time::Sleep>>,
}

/// What woke the actor up.
enum Wake {
    Command(Option<Command>),
    Source(SourceKind, Option<SourceEvent>),
    Tick,
    Deadline,
}

/// The scan actor. Sole owner and mutator of scan state.
struct Actor {
    short_range: Arc<dyn DiscoverySource>,
    local_network: Arc<dyn DiscoverySource>,
    store: Arc<dyn SessionStore>,
    config: ScanConfig,
    events: mpsc::UnboundedSender<ScanEvent>,
    scanning: watch::Sender<bool>,
    progress: watch::Sender<f64>,
    scan: Option<ActiveScan>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let wake = match self.scan.as_mut() {
                Some(scan) => {
                    tokio::select! {
                        command = commands.recv() => Wake::Command(command),
                        event = next_event(&mut scan.short_range.events) => {
                            Wake::Source(SourceKind::ShortRange, event)
                        }
                        event = next_event(&mut scan.local_network.events) => {
                            Wake::Source(SourceKind::LocalNetwork, event)
                        }
                        _ = scan.tick.tick() => Wake::Tick,
                        _ = scan.deadline.as_mut() => Wake::Deadline,
                    }
                }
                None => Wake::Command(commands.recv().await),
            };

            match wake {
                Wake::Command(None) => {
                    // Every handle is gone; close out whatever is
                    // still running and die.
                    self.finish_scanning();
                    break;
                }
                Wake::Command(Some(Command::Start)) => self.handle_start(),
                Wake::Command(Some(Command::Stop)) => self.handle_stop(),
                Wake::Source(kind, event) => self.handle_source_event(kind, event),
                Wake::Tick => self.handle_tick(),
                Wake::Deadline => {
                    info!("scan deadline reached");
                    self.finish_scanning();
                }
            }
        }
    }

    fn handle_start(&mut self) {
        if self.scan.is_some() {
            warn!("scan already running; ignoring start request");
            return;
        }

        // Fresh scan, fresh gauge. Rosters are created per scan, so
        // there is no per-source buffer to clear beyond this.
        let _ = self.progress.send(0.0);

        let mut failures = Vec::new();
        let short_range = self.start_source(true, &mut failures);
        let local_network = self.start_source(false, &mut failures);

        if short_range.is_none() && local_network.is_none() {
            for (kind, reason) in failures {
                let _ = self.events.send(ScanEvent::SourceFailed { kind, reason });
            }
            info!("no discovery source could start; scan aborted");
            return;
        }

        let session = ScanSession::new();
        let deadline = self.config.deadline();
        info!("scan {} started", session.id);
        let _ = self.events.send(ScanEvent::Started {
            session_id: session.id,
        });
        let _ = self.scanning.send(true);
        // Failures after `Started`: observers that see one can rely on
        // the scanning flag already reflecting whether a session exists.
        for (kind, reason) in failures {
            let _ = self.events.send(ScanEvent::SourceFailed { kind, reason });
        }

        let mut tick = time::interval(self.config.progress_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.scan = Some(ActiveScan {
            session,
            started_at: Instant::now(),
            short_range: Lane::new(short_range),
            local_network: Lane::new(local_network),
            blend: ProgressBlend::new(deadline),
            tick,
            deadline: Box::pin(time::sleep(deadline)),
        });
    }

    /// Starts one source, recording a synchronous failure instead of
    /// aborting the whole scan.
    fn start_source(
        &self,
        short_range: bool,
        failures: &mut Vec<(SourceKind, String)>,
    ) -> Option<mpsc::UnboundedReceiver<SourceEvent>> {
        let source = if short_range {
            &self.short_range
        } else {
            &self.local_network
        };
        match source.start() {
            Ok(events) => Some(events),
            Err(e) => {
                warn!("{e}");
                failures.push((source.kind(), e.to_string()));
                None
            }
        }
    }

    fn handle_stop(&mut self) {
        // Same finalize path as every other trigger; the sources are
        // cancelled in there.
        self.finish_scanning();
    }

    fn handle_source_event(&mut self, kind: SourceKind, event: Option<SourceEvent>) {
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        let lane = match kind {
            SourceKind::ShortRange => &mut scan.short_range,
            SourceKind::LocalNetwork => &mut scan.local_network,
        };

        match event {
            Some(SourceEvent::Sighting(sighting)) => {
                let device = lane.roster.observe(&sighting).clone();
                debug!("{kind} sighted {}", device.name);
                let _ = self.events.send(ScanEvent::DeviceSeen { device });
            }
            Some(SourceEvent::Progress(value)) => {
                let combined = scan.blend.on_report(value);
                let _ = self.progress.send(combined);
            }
            Some(SourceEvent::Finished) | None => {
                debug!("{kind} source is done");
                lane.events = None;
                self.finalize_if_settled();
            }
            Some(SourceEvent::Failed(reason)) => {
                warn!("{kind} source failed: {reason}");
                lane.events = None;
                let _ = self.events.send(ScanEvent::SourceFailed { kind, reason });
                self.finalize_if_settled();
            }
        }
    }

    fn handle_tick(&mut self) {
        let Some(scan) = self.scan.as_mut() else {
            return;
        };
        let combined = scan.blend.on_tick(scan.started_at.elapsed());
        let _ = self.progress.send(combined);
    }

    /// Finalizes once both sources have gone inactive.
    fn finalize_if_settled(&mut self) {
        let settled = self
            .scan
            .as_ref()
            .map(|scan| scan.short_range.events.is_none() && scan.local_network.events.is_none())
            .unwrap_or(false);
        if settled {
            info!("both discovery sources are inactive");
            self.finish_scanning();
        }
    }

    /// The one finalize routine every trigger converges on.
    ///
    /// Taking the scan out of the `Option` is the single-consumption
    /// gate: racing triggers on this single-threaded actor resolve to
    /// one winner, and later calls return immediately.
    fn finish_scanning(&mut self) {
        let Some(scan) = self.scan.take() else {
            return;
        };

        self.short_range.stop();
        self.local_network.stop();

        let ActiveScan {
            mut session,
            short_range,
            local_network,
            mut blend,
            ..
        } = scan;

        session.ended_at = Some(Utc::now());
        session.completed = true;
        let session_id = session.id;

        // All short-range devices in discovery order, then all
        // local-network devices in discovery order.
        let mut devices = short_range.roster.into_devices();
        devices.extend(local_network.roster.into_devices());

        for mut device in devices {
            device.session_id = Some(session_id);
            if let Err(e) = self.store.save_device(&device) {
                error!("failed to persist device {}: {e}", device.id);
                let _ = self.events.send(ScanEvent::PersistenceFailed {
                    reason: e.to_string(),
                });
            }
            session.devices.push(device);
        }
        if let Err(e) = self.store.save_session(&session) {
            error!("failed to persist session {session_id}: {e}");
            let _ = self.events.send(ScanEvent::PersistenceFailed {
                reason: e.to_string(),
            });
        }

        let device_count = session.device_count();
        let _ = self.progress.send(blend.complete());
        let _ = self.scanning.send(false);
        let _ = self.events.send(ScanEvent::Finished {
            session_id,
            device_count,
        });
        info!("scan {session_id} finished with {device_count} device(s)");
    }
}

/// Receives from a lane that may already be settled. A settled lane
/// never wakes the select loop.
async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<SourceEvent>>,
) -> Option<SourceEvent> {
    match events {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
