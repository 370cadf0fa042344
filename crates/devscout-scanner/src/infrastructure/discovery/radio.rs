//! Short-range radio backend boundary.
//!
//! The wire-level advertisement scanning itself is provided by a
//! platform backend, not designed here. [`Radio`] is the seam the
//! [`super::short_range::ShortRangeSource`] consumes: a powered-state
//! probe plus a stream of advertisement updates.
//!
//! No OS backend ships yet for the targets this crate builds on, so
//! [`platform_radio`] currently hands out [`UnsupportedRadio`], which
//! reports the capability unavailable — the same way the source would
//! behave on a machine whose radio is switched off. A platform
//! implementation slots in behind the same trait (cfg-gated, like any
//! other OS adapter) without touching the source.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One received advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Identifier the backend assigned to the peripheral.
    pub peripheral_id: Uuid,
    /// Name the peripheral advertises, if any.
    pub local_name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: i16,
}

/// An update from a running advertisement scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioUpdate {
    Advertisement(Advertisement),
    /// The backend died mid-scan (e.g. the radio was powered off under
    /// a running scan).
    Failed(String),
}

/// Error starting an advertisement scan.
#[derive(Debug, Error)]
pub enum RadioError {
    #[error("radio backend error: {0}")]
    Backend(String),
}

/// The short-range radio backend.
pub trait Radio: Send + Sync {
    /// Whether the radio is present and powered on.
    fn is_powered_on(&self) -> bool;

    /// Begins an advertisement scan, returning the update stream.
    ///
    /// # Errors
    ///
    /// Returns [`RadioError::Backend`] when the backend refuses to
    /// scan.
    fn start_scan(&self) -> Result<mpsc::UnboundedReceiver<RadioUpdate>, RadioError>;

    /// Halts the advertisement scan. Idempotent.
    fn stop_scan(&self);
}

/// Radio adapter for platforms without a short-range backend.
///
/// Always reports the radio as unavailable, so the source fails its
/// start precondition and scanning proceeds over the sibling
/// mechanism only.
#[derive(Debug, Default)]
pub struct UnsupportedRadio;

impl Radio for UnsupportedRadio {
    fn is_powered_on(&self) -> bool {
        false
    }

    fn start_scan(&self) -> Result<mpsc::UnboundedReceiver<RadioUpdate>, RadioError> {
        Err(RadioError::Backend(
            "no short-range radio backend on this platform".to_string(),
        ))
    }

    fn stop_scan(&self) {}
}

/// Returns the radio backend for the current platform.
pub fn platform_radio() -> Arc<dyn Radio> {
    Arc::new(UnsupportedRadio)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_radio_reports_powered_off() {
        let radio = UnsupportedRadio;
        assert!(!radio.is_powered_on());
    }

    #[test]
    fn test_unsupported_radio_refuses_to_scan() {
        let radio = UnsupportedRadio;
        let result = radio.start_scan();
        assert!(matches!(result, Err(RadioError::Backend(_))));
    }

    #[test]
    fn test_platform_radio_returns_an_adapter() {
        let radio = platform_radio();
        // The shipped adapter must never claim an unavailable capability.
        assert!(!radio.is_powered_on());
    }
}
