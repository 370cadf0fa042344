//! Local-network discovery source.
//!
//! Wraps a [`NetworkProber`] backend in the [`DiscoverySource`]
//! contract. The worker translates sweep updates into sightings,
//! passes the prober's progress through, and enforces the source's own
//! fixed scan window in case the backend never completes.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use devscout_core::Sighting;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::probe::{NetworkProber, ProbeUpdate};
use super::{DiscoverySource, EventGate, SourceError, SourceEvent, SourceKind};

/// Scan window used when none is configured.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(15);

/// Discovery source for hosts on the attached local network.
pub struct LocalNetworkSource {
    prober: Arc<dyn NetworkProber>,
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

impl LocalNetworkSource {
    pub fn new(prober: Arc<dyn NetworkProber>, scan_window: Duration) -> Self {
        Self {
            prober,
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

impl DiscoverySource for LocalNetworkSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LocalNetwork
    }

    fn start(&self) -> Result<mpsc::UnboundedReceiver<SourceEvent>, SourceError> {
        // Restart semantics: a start under a running scan discards the
        // in-flight sweep and begins a fresh one.
        self.halt();

        if !self.prober.is_attached() {
            return Err(SourceError::PreconditionUnmet {
                kind: SourceKind::LocalNetwork,
                reason: "no local-network attachment".to_string(),
            });
        }

        let updates = self
            .prober
            .start_sweep()
            .map_err(|e| SourceError::StartFailed {
                kind: SourceKind::LocalNetwork,
                reason: e.to_string(),
            })?;

        let gate = EventGate::default();
        let events = gate.arm();
        let (stop_tx, stop_rx) = watch::channel(false);
        self.active.store(true, Ordering::SeqCst);

        let worker = tokio::spawn(sweep_worker(
            updates,
            gate.clone(),
            stop_rx,
            self.scan_window,
            Arc::clone(&self.active),
            Arc::clone(&self.prober),
        ));

        let mut inner = self.inner.lock().expect("lock poisoned");
        inner.gate = Some(gate);
        inner.stop_tx = Some(stop_tx);
        inner.worker = Some(worker);

        debug!("local-network sweep started ({:?} window)", self.scan_window);
        Ok(events)
    }

    fn stop(&self) {
        self.halt();
        self.prober.stop_sweep();
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Bridges sweep updates onto the event gate until the sweep completes
/// or fails, the scan window elapses, or the source is stopped.
async fn sweep_worker(
    mut updates: mpsc::UnboundedReceiver<ProbeUpdate>,
    gate: EventGate,
    mut stop_rx: watch::Receiver<bool>,
    scan_window: Duration,
    active: Arc<AtomicBool>,
    prober: Arc<dyn NetworkProber>,
) {
    let window = tokio::time::sleep(scan_window);
    tokio::pin!(window);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(ProbeUpdate::Host(reply)) => {
                    gate.emit(SourceEvent::Sighting(Sighting::LocalNetwork {
                        address: reply.address,
                        hardware_address: reply.hardware_address,
                        hostname: reply.hostname,
                    }));
                }
                Some(ProbeUpdate::Progress(value)) => {
                    gate.emit(SourceEvent::Progress(value));
                }
                Some(ProbeUpdate::Complete) | None => {
                    active.store(false, Ordering::SeqCst);
                    gate.emit(SourceEvent::Finished);
                    break;
                }
                Some(ProbeUpdate::Failed(reason)) => {
                    warn!("network prober failed mid-sweep: {reason}");
                    active.store(false, Ordering::SeqCst);
                    gate.emit(SourceEvent::Failed(reason));
                    break;
                }
            },
            _ = &mut window => {
                debug!("local-network scan window elapsed");
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
    prober.stop_sweep();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::discovery::mock::MockProber;

    fn make_source(prober: Arc<MockProber>) -> LocalNetworkSource {
        LocalNetworkSource::new(prober, Duration::from_secs(15))
    }

    #[tokio::test]
    async fn test_start_fails_without_attachment() {
        // Arrange
        let prober = Arc::new(MockProber::detached());
        let source = make_source(Arc::clone(&prober));

        // Act
        let result = source.start();

        // Assert
        assert!(matches!(
            result,
            Err(SourceError::PreconditionUnmet { kind: SourceKind::LocalNetwork, .. })
        ));
        assert!(!source.is_active(), "failed start must not activate");
    }

    #[tokio::test]
    async fn test_host_replies_surface_as_sightings() {
        // Arrange
        let prober = Arc::new(MockProber::attached());
        let source = make_source(Arc::clone(&prober));
        let mut events = source.start().expect("start must succeed");

        // Act
        prober.report_host("192.168.1.34", Some("aa:bb:cc:00:11:22"), Some("printer"));

        // Assert
        let event = events.recv().await.expect("event expected");
        assert_eq!(
            event,
            SourceEvent::Sighting(Sighting::LocalNetwork {
                address: "192.168.1.34".parse().unwrap(),
                hardware_address: Some("aa:bb:cc:00:11:22".to_string()),
                hostname: Some("printer".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_progress_passes_through() {
        // Arrange
        let prober = Arc::new(MockProber::attached());
        let source = make_source(Arc::clone(&prober));
        let mut events = source.start().expect("start must succeed");

        // Act
        prober.report_progress(0.4);

        // Assert
        assert_eq!(events.recv().await, Some(SourceEvent::Progress(0.4)));
    }

    #[tokio::test]
    async fn test_sweep_completion_reports_finished() {
        // Arrange
        let prober = Arc::new(MockProber::attached());
        let source = make_source(Arc::clone(&prober));
        let mut events = source.start().expect("start must succeed");

        // Act
        prober.complete_sweep();

        // Assert
        assert_eq!(events.recv().await, Some(SourceEvent::Finished));
        assert!(events.recv().await.is_none(), "completion is terminal");
        assert!(!source.is_active());
    }

    #[tokio::test]
    async fn test_backend_failure_reports_failed() {
        // Arrange
        let prober = Arc::new(MockProber::attached());
        let source = make_source(Arc::clone(&prober));
        let mut events = source.start().expect("start must succeed");

        // Act
        prober.fail("interface went away");

        // Assert
        assert_eq!(
            events.recv().await,
            Some(SourceEvent::Failed("interface went away".to_string()))
        );
        assert!(!source.is_active());
    }

    #[tokio::test]
    async fn test_stop_closes_stream_and_tells_backend() {
        // Arrange
        let prober = Arc::new(MockProber::attached());
        let source = make_source(Arc::clone(&prober));
        let mut events = source.start().expect("start must succeed");

        // Act
        source.stop();

        // Assert
        assert!(!source.is_active());
        assert!(events.recv().await.is_none(), "stream must be closed");
        assert!(prober.stop_calls() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_window_elapse_reports_finished() {
        // Arrange – a prober that never completes on its own
        let prober = Arc::new(MockProber::attached());
        let source =
            LocalNetworkSource::new(Arc::clone(&prober) as Arc<dyn NetworkProber>, Duration::from_secs(15));
        let mut events = source.start().expect("start must succeed");

        // Act – paused time auto-advances to the scan window
        let event = events.recv().await;

        // Assert
        assert_eq!(event, Some(SourceEvent::Finished));
        assert!(!source.is_active());
    }
}
