//! Short-range radio discovery source.
//!
//! Wraps a [`Radio`] backend in the [`DiscoverySource`] contract: a
//! worker task translates advertisement updates into sightings and
//! enforces the source's own fixed scan window, independent of
//! whatever deadline the orchestrator runs.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use devscout_core::Sighting;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::radio::{Radio, RadioUpdate};
use super::{DiscoverySource, EventGate, SourceError, SourceEvent, SourceKind};

/// Scan window used when none is configured.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(15);

/// Discovery source for short-range radio advertisements.
pub struct ShortRangeSource {
    radio: Arc<dyn Radio>,
    scan_window: Duration,
    active: Arc<AtomicBool>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    gate: Option<EventGate>,
    stop_tx: Option<watch::Sender<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl ShortRangeSource {
    pub fn new(radio: Arc<dyn Radio>, scan_window: Duration) -> Self {
        Self {
            radio,
            scan_window,
            active: Arc::new(AtomicBool::new(false)),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Severs the event gate, signals the worker to die, and marks the
    /// source idle. Safe to call in any state.
    fn halt(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(gate) = inner.gate.take() {
            gate.sever();
        }
        if let Some(stop_tx) = inner.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        inner.worker.take();
        self.active.store(false, Ordering::SeqCst);
    }
}

impl DiscoverySource for ShortRangeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ShortRange
    }

    fn start(&self) -> Result<mpsc::UnboundedReceiver<SourceEvent>, SourceError> {
        // Restart semantics: a start under a running scan discards the
        // in-flight scan and begins a fresh one.
        self.halt();

        if !self.radio.is_powered_on() {
            return Err(SourceError::PreconditionUnmet {
                kind: SourceKind::ShortRange,
                reason: "radio is powered off".to_string(),
            });
        }

        let updates = self
            .radio
            .start_scan()
            .map_err(|e| SourceError::StartFailed {
                kind: SourceKind::ShortRange,
                reason: e.to_string(),
            })?;

        let gate = EventGate::default();
        let events = gate.arm();
        let (stop_tx, stop_rx) = watch::channel(false);
        self.active.store(true, Ordering::SeqCst);

        let worker = tokio::spawn(scan_worker(
            updates,
            gate.clone(),
            stop_rx,
            self.scan_window,
            Arc::clone(&self.active),
            Arc::clone(&self.radio),
        ));

        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.gate = Some(gate);
        inner.stop_tx = Some(stop_tx);
        inner.worker = Some(worker);

        debug!("short-range scan started ({:?} window)", self.scan_window);
        Ok(events)
    }

    fn stop(&self) {
        self.halt();
        self.radio.stop_scan();
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Bridges radio updates onto the event gate until the scan window
/// elapses, the backend finishes or fails, or the source is stopped.
async fn scan_worker(
    mut updates: mpsc::UnboundedReceiver<RadioUpdate>,
    gate: EventGate,
    mut stop_rx: watch::Receiver<bool>,
    scan_window: Duration,
    active: Arc<AtomicBool>,
    radio: Arc<dyn Radio>,
) {
    let window = tokio::time::sleep(scan_window);
    tokio::pin!(window);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(RadioUpdate::Advertisement(adv)) => {
                    gate.emit(SourceEvent::Sighting(Sighting::ShortRange {
                        peripheral_id: adv.peripheral_id,
                        local_name: adv.local_name,
                        rssi: adv.rssi,
                    }));
                }
                Some(RadioUpdate::Failed(reason)) => {
                    warn!("radio backend failed mid-scan: {reason}");
                    active.store(false, Ordering::SeqCst);
                    gate.emit(SourceEvent::Failed(reason));
                    break;
                }
                None => {
                    // Backend ran out of advertisements: natural completion.
                    active.store(false, Ordering::SeqCst);
                    gate.emit(SourceEvent::Finished);
                    break;
                }
            },
            _ = &mut window => {
                debug!("short-range scan window elapsed");
                active.store(false, Ordering::SeqCst);
                gate.emit(SourceEvent::Finished);
                break;
            }
            _ = stop_rx.changed() => {
                // Externally stopped; the gate is already severed.
                break;
            }
        }
    }

    active.store(false, Ordering::SeqCst);
    // Terminal exit: close the stream so consumers see the end of it.
    gate.sever();
    radio.stop_scan();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::discovery::mock::MockRadio;
    use uuid::Uuid;

    fn make_source(radio: Arc<MockRadio>) -> ShortRangeSource {
        ShortRangeSource::new(radio, Duration::from_secs(15))
    }

    #[tokio::test]
    async fn test_start_fails_when_radio_powered_off() {
        // Arrange
        let radio = Arc::new(MockRadio::powered_off());
        let source = make_source(Arc::clone(&radio));

        // Act
        let result = source.start();

        // Assert
        assert!(matches!(
            result,
            Err(SourceError::PreconditionUnmet { kind: SourceKind::ShortRange, .. })
        ));
        assert!(!source.is_active(), "failed start must not activate");
    }

    #[tokio::test]
    async fn test_advertisements_surface_as_sightings() {
        // Arrange
        let radio = Arc::new(MockRadio::powered_on());
        let source = make_source(Arc::clone(&radio));
        let mut events = source.start().expect("start must succeed");
        let peripheral_id = Uuid::new_v4();

        // Act
        radio.advertise(peripheral_id, Some("keyboard"), -48);

        // Assert
        let event = events.recv().await.expect("event expected");
        assert_eq!(
            event,
            SourceEvent::Sighting(Sighting::ShortRange {
                peripheral_id,
                local_name: Some("keyboard".to_string()),
                rssi: -48,
            })
        );
        assert!(source.is_active());
    }

    #[tokio::test]
    async fn test_stop_closes_stream_and_deactivates() {
        // Arrange
        let radio = Arc::new(MockRadio::powered_on());
        let source = make_source(Arc::clone(&radio));
        let mut events = source.start().expect("start must succeed");

        // Act
        source.stop();

        // Assert – no events can arrive once stop has returned
        assert!(!source.is_active());
        assert!(events.recv().await.is_none(), "stream must be closed");
        assert!(radio.stop_calls() >= 1, "backend must be told to stop");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_window_elapse_reports_finished() {
        // Arrange
        let radio = Arc::new(MockRadio::powered_on());
        let source =
            ShortRangeSource::new(Arc::clone(&radio) as Arc<dyn Radio>, Duration::from_secs(15));
        let mut events = source.start().expect("start must succeed");

        // Act – paused time auto-advances to the scan window
        let event = events.recv().await;

        // Assert
        assert_eq!(event, Some(SourceEvent::Finished));
        assert!(!source.is_active());
    }

    #[tokio::test]
    async fn test_backend_failure_reports_failed_and_deactivates() {
        // Arrange
        let radio = Arc::new(MockRadio::powered_on());
        let source = make_source(Arc::clone(&radio));
        let mut events = source.start().expect("start must succeed");

        // Act
        radio.fail("radio powered off under a running scan");

        // Assert
        let event = events.recv().await;
        assert_eq!(
            event,
            Some(SourceEvent::Failed(
                "radio powered off under a running scan".to_string()
            ))
        );
        assert!(events.recv().await.is_none(), "failure is terminal");
        assert!(!source.is_active());
    }

    #[tokio::test]
    async fn test_backend_stream_end_reports_finished() {
        // Arrange
        let radio = Arc::new(MockRadio::powered_on());
        let source = make_source(Arc::clone(&radio));
        let mut events = source.start().expect("start must succeed");

        // Act
        radio.end_stream();

        // Assert
        assert_eq!(events.recv().await, Some(SourceEvent::Finished));
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_restart_replaces_in_flight_scan() {
        // Arrange
        let radio = Arc::new(MockRadio::powered_on());
        let source = make_source(Arc::clone(&radio));
        let mut first = source.start().expect("first start must succeed");

        // Act
        let mut second = source.start().expect("second start must succeed");
        radio.advertise(Uuid::new_v4(), None, -60);

        // Assert – the first stream is dead, the second one is live
        assert!(first.recv().await.is_none(), "prior scan must be discarded");
        assert!(matches!(
            second.recv().await,
            Some(SourceEvent::Sighting(_))
        ));
    }
}
