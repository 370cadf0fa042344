//! Discovery source infrastructure.
//!
//! A discovery source is an independently start/stop-able asynchronous
//! producer of device sightings for one mechanism. Two implementations
//! exist, with one external contract between them and the scan
//! orchestrator:
//!
//! - [`short_range::ShortRangeSource`] – listens for radio
//!   advertisements through the [`radio::Radio`] boundary.
//! - [`local_network::LocalNetworkSource`] – sweeps the attached
//!   network through the [`probe::NetworkProber`] boundary.
//!
//! Each source runs its own worker task with its own fixed scan-window
//! timer, fully decoupled from the orchestrator. The orchestrator only
//! sees the [`SourceEvent`] stream a successful [`DiscoverySource::start`]
//! hands back.
//!
//! # Testability
//!
//! The backend boundary traits allow unit tests to drive both sources
//! with the injectable mocks in [`mock`], without radio hardware or a
//! network attachment.

use std::fmt;
use std::sync::{Arc, Mutex};

use devscout_core::Sighting;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod local_network;
pub mod mock;
pub mod probe;
pub mod radio;
pub mod short_range;

/// Which discovery mechanism a source drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    ShortRange,
    LocalNetwork,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::ShortRange => f.write_str("short-range"),
            SourceKind::LocalNetwork => f.write_str("local-network"),
        }
    }
}

/// An event emitted by a running discovery source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A device was sighted. A previously-unseen identity is a new
    /// sighting; a known identity is an update and is never surfaced
    /// as a duplicate record downstream.
    Sighting(Sighting),
    /// Sweep progress in `[0, 1]`. Only the local-network source
    /// reports this.
    Progress(f64),
    /// The source completed naturally — the backend ran out of work or
    /// the source's own scan window elapsed. Distinct from an
    /// externally requested stop, which emits nothing.
    Finished,
    /// The backend failed mid-scan. The source is inactive afterwards;
    /// its sibling and the orchestrator keep running.
    Failed(String),
}

/// Error returned when a source cannot start.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The capability the source depends on is unavailable (radio
    /// powered off, no local-network attachment).
    #[error("{kind} discovery unavailable: {reason}")]
    PreconditionUnmet { kind: SourceKind, reason: String },

    /// The backend refused to begin scanning.
    #[error("{kind} backend failed to start: {reason}")]
    StartFailed { kind: SourceKind, reason: String },
}

/// An independently start/stop-able producer of discovery events.
///
/// # Contract
///
/// - `start()` begins asynchronous discovery and returns the event
///   stream for this scan. It fails synchronously — without
///   transitioning to active — when the underlying capability is
///   unavailable. Calling `start()` while already active clears the
///   prior in-flight scan and restarts; duplicate scans are never
///   silently accumulated.
/// - `stop()` halts discovery. No further events are emitted on the
///   stream after it returns: the sender is severed under a lock
///   before the backend is told to stop.
/// - A source moves back to idle on `stop()`, on its own fixed
///   scan-window timeout, on natural completion, and on a backend
///   failure. The last three are reported on the stream (`Finished` /
///   `Failed`); an externally requested stop is not.
pub trait DiscoverySource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Begins discovery, handing back this scan's event stream.
    ///
    /// Must be called from within a Tokio runtime: the source spawns
    /// its worker task here.
    ///
    /// # Errors
    ///
    /// [`SourceError::PreconditionUnmet`] when the capability is
    /// unavailable; [`SourceError::StartFailed`] when the backend
    /// refuses to scan.
    fn start(&self) -> Result<mpsc::UnboundedReceiver<SourceEvent>, SourceError>;

    /// Halts discovery. Idempotent; a no-op when idle.
    fn stop(&self);

    /// Whether the source is currently scanning.
    fn is_active(&self) -> bool;
}

/// Severable event channel shared between a source and its worker.
///
/// The sender lives behind a mutex so `stop()` can cut it off
/// synchronously: once severed, a worker that is still winding down
/// has nowhere to emit, which is what makes the no-events-after-stop
/// guarantee hard rather than best-effort.
#[derive(Clone, Default)]
pub(crate) struct EventGate {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<SourceEvent>>>>,
}

impl EventGate {
    /// Installs a fresh channel and returns its receiving end.
    pub(crate) fn arm(&self) -> mpsc::UnboundedReceiver<SourceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().expect("lock poisoned") = Some(tx);
        rx
    }

    /// Emits an event if the gate is still open. Returns `false` once
    /// severed or once the receiver is gone.
    pub(crate) fn emit(&self, event: SourceEvent) -> bool {
        let guard = self.sender.lock().expect("lock poisoned");
        match guard.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Drops the sender, closing the stream for good.
    pub(crate) fn sever(&self) {
        *self.sender.lock().expect("lock poisoned") = None;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
