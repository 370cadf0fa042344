//! One bounded scan attempt.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::device::Device;

/// A scan session: the devices found between one start and one finish.
///
/// A session is created only once at least one discovery source has
/// actually transitioned to scanning, is mutated solely by the
/// orchestrator while the scan runs, and becomes immutable history the
/// moment it is finalized and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSession {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, at finalize.
    pub ended_at: Option<DateTime<Utc>>,
    /// Devices in discovery order.
    pub devices: Vec<Device>,
    pub completed: bool,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            devices: Vec::new(),
            completed: false,
        }
    }

    /// End minus start; zero while the session is still running.
    pub fn duration(&self) -> Duration {
        self.ended_at
            .map(|ended| ended - self.started_at)
            .unwrap_or_else(Duration::zero)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::Sighting;

    #[test]
    fn test_new_session_is_open_and_empty() {
        let session = ScanSession::new();

        assert!(session.ended_at.is_none());
        assert!(!session.completed);
        assert_eq!(session.device_count(), 0);
    }

    #[test]
    fn test_duration_is_zero_while_running() {
        let session = ScanSession::new();
        assert_eq!(session.duration(), Duration::zero());
    }

    #[test]
    fn test_duration_is_end_minus_start() {
        let mut session = ScanSession::new();
        session.ended_at = Some(session.started_at + Duration::seconds(15));

        assert_eq!(session.duration(), Duration::seconds(15));
    }

    #[test]
    fn test_device_count_tracks_devices() {
        let mut session = ScanSession::new();
        session.devices.push(Device::from_sighting(&Sighting::ShortRange {
            peripheral_id: Uuid::new_v4(),
            local_name: None,
            rssi: -70,
        }));

        assert_eq!(session.device_count(), 1);
    }
}
