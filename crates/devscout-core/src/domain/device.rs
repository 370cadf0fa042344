//! The `Device` entity and its per-source identity.
//!
//! A device record is created the first time a discovery source sights
//! an identity and updated in place on every repeat sighting. The
//! identity key depends on the discovery mechanism: short-range radio
//! peripherals carry a source-assigned identifier, local-network hosts
//! are identified by their address.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Display name used when a backend supplies no name for a device.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown device";

/// Connection status of a discovered device.
///
/// Short-range peripherals are sighted from advertisements only, so
/// they enter as `Disconnected`; a local-network host answered a probe,
/// so it enters as `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Disconnected,
    Connecting,
    Connected,
    Unknown,
}

impl DeviceStatus {
    /// Stable string form used by the session store.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Disconnected => "disconnected",
            DeviceStatus::Connecting => "connecting",
            DeviceStatus::Connected => "connected",
            DeviceStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a persisted status string fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized device status: {0}")]
pub struct ParseDeviceStatusError(pub String);

impl FromStr for DeviceStatus {
    type Err = ParseDeviceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disconnected" => Ok(DeviceStatus::Disconnected),
            "connecting" => Ok(DeviceStatus::Connecting),
            "connected" => Ok(DeviceStatus::Connected),
            "unknown" => Ok(DeviceStatus::Unknown),
            other => Err(ParseDeviceStatusError(other.to_string())),
        }
    }
}

/// The discovery mechanism a device was found by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Sighted via short-range radio advertisements.
    ShortRange,
    /// Sighted via local-network probing.
    LocalNetwork,
}

impl DeviceKind {
    /// Stable string form used by the session store.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::ShortRange => "short_range",
            DeviceKind::LocalNetwork => "local_network",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a persisted kind string fails.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized device kind: {0}")]
pub struct ParseDeviceKindError(pub String);

impl FromStr for DeviceKind {
    type Err = ParseDeviceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short_range" => Ok(DeviceKind::ShortRange),
            "local_network" => Ok(DeviceKind::LocalNetwork),
            other => Err(ParseDeviceKindError(other.to_string())),
        }
    }
}

/// The attribute that deduplicates sightings into one device record.
///
/// Identity holds within a single scan session only. A peripheral that
/// rotates its source-assigned identifier between scans (randomized
/// hardware addresses are common) is recorded as a distinct device;
/// no heuristic merging is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Source-assigned identifier of a short-range peripheral.
    Peripheral(Uuid),
    /// Network address of a local-network host.
    Address(IpAddr),
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Peripheral(id) => write!(f, "peripheral:{id}"),
            IdentityKey::Address(addr) => write!(f, "address:{addr}"),
        }
    }
}

/// Mechanism-specific attributes of a device record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceDetails {
    ShortRange {
        /// Identifier assigned by the radio backend.
        peripheral_id: Uuid,
        /// Last observed signal strength in dBm.
        rssi: i16,
    },
    LocalNetwork {
        /// Host address on the attached network.
        address: IpAddr,
        /// Hardware address, when the prober could resolve one.
        hardware_address: Option<String>,
    },
}

impl DeviceDetails {
    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceDetails::ShortRange { .. } => DeviceKind::ShortRange,
            DeviceDetails::LocalNetwork { .. } => DeviceKind::LocalNetwork,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        match self {
            DeviceDetails::ShortRange { peripheral_id, .. } => {
                IdentityKey::Peripheral(*peripheral_id)
            }
            DeviceDetails::LocalNetwork { address, .. } => IdentityKey::Address(*address),
        }
    }
}

/// A raw device sighting emitted by a discovery source.
///
/// A sighting for a previously-unseen identity becomes a new device
/// record; a sighting for a known identity refreshes the existing
/// record (see [`crate::DeviceRoster::observe`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sighting {
    ShortRange {
        peripheral_id: Uuid,
        /// Name advertised by the peripheral, if any.
        local_name: Option<String>,
        /// Signal strength in dBm.
        rssi: i16,
    },
    LocalNetwork {
        address: IpAddr,
        hardware_address: Option<String>,
        /// Name resolved for the host, if any.
        hostname: Option<String>,
    },
}

impl Sighting {
    pub fn identity_key(&self) -> IdentityKey {
        match self {
            Sighting::ShortRange { peripheral_id, .. } => IdentityKey::Peripheral(*peripheral_id),
            Sighting::LocalNetwork { address, .. } => IdentityKey::Address(*address),
        }
    }

    /// The display name carried by the sighting, falling back to
    /// [`UNKNOWN_DEVICE_NAME`].
    pub fn display_name(&self) -> String {
        let name = match self {
            Sighting::ShortRange { local_name, .. } => local_name.as_deref(),
            Sighting::LocalNetwork { hostname, .. } => hostname.as_deref(),
        };
        name.filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_DEVICE_NAME)
            .to_string()
    }
}

/// A discovered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Opaque record identity, assigned on first sighting.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Mechanism-specific attributes.
    pub details: DeviceDetails,
    /// Connection status at discovery time.
    pub status: DeviceStatus,
    /// Owning session. `None` until the session finalizes; immutable
    /// once assigned.
    pub session_id: Option<Uuid>,
    /// Instant the record was created.
    pub created_at: DateTime<Utc>,
}

impl Device {
    /// Builds a fresh record from the first sighting of an identity.
    pub fn from_sighting(sighting: &Sighting) -> Self {
        let (details, status) = match sighting {
            Sighting::ShortRange {
                peripheral_id,
                rssi,
                ..
            } => (
                DeviceDetails::ShortRange {
                    peripheral_id: *peripheral_id,
                    rssi: *rssi,
                },
                DeviceStatus::Disconnected,
            ),
            Sighting::LocalNetwork {
                address,
                hardware_address,
                ..
            } => (
                DeviceDetails::LocalNetwork {
                    address: *address,
                    hardware_address: hardware_address.clone(),
                },
                DeviceStatus::Connected,
            ),
        };

        Self {
            id: Uuid::new_v4(),
            name: sighting.display_name(),
            details,
            status,
            session_id: None,
            created_at: Utc::now(),
        }
    }

    /// Refreshes the mutable fields from a repeat sighting.
    ///
    /// Only the short-range signal strength is mutable; identity,
    /// name, position, and all local-network fields keep their
    /// first-seen values.
    pub fn refresh(&mut self, sighting: &Sighting) {
        if let (
            DeviceDetails::ShortRange { rssi, .. },
            Sighting::ShortRange {
                rssi: observed_rssi,
                ..
            },
        ) = (&mut self.details, sighting)
        {
            *rssi = *observed_rssi;
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.details.kind()
    }

    pub fn identity_key(&self) -> IdentityKey {
        self.details.identity_key()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn short_range_sighting(rssi: i16) -> Sighting {
        Sighting::ShortRange {
            peripheral_id: Uuid::new_v4(),
            local_name: Some("headset".to_string()),
            rssi,
        }
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            DeviceStatus::Disconnected,
            DeviceStatus::Connecting,
            DeviceStatus::Connected,
            DeviceStatus::Unknown,
        ] {
            assert_eq!(status.as_str().parse::<DeviceStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_status_parse_rejects_unknown_string() {
        let result = "paired".parse::<DeviceStatus>();
        assert_eq!(result, Err(ParseDeviceStatusError("paired".to_string())));
    }

    #[test]
    fn test_kind_string_round_trip() {
        for kind in [DeviceKind::ShortRange, DeviceKind::LocalNetwork] {
            assert_eq!(kind.as_str().parse::<DeviceKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_short_range_device_enters_disconnected() {
        let device = Device::from_sighting(&short_range_sighting(-60));
        assert_eq!(device.status, DeviceStatus::Disconnected);
        assert_eq!(device.kind(), DeviceKind::ShortRange);
        assert_eq!(device.name, "headset");
        assert!(device.session_id.is_none(), "unassigned until finalize");
    }

    #[test]
    fn test_local_network_device_enters_connected() {
        let sighting = Sighting::LocalNetwork {
            address: "192.168.1.23".parse().unwrap(),
            hardware_address: Some("aa:bb:cc:dd:ee:ff".to_string()),
            hostname: Some("printer".to_string()),
        };

        let device = Device::from_sighting(&sighting);

        assert_eq!(device.status, DeviceStatus::Connected);
        assert_eq!(device.kind(), DeviceKind::LocalNetwork);
        assert_eq!(device.name, "printer");
    }

    #[test]
    fn test_missing_name_falls_back_to_unknown() {
        let sighting = Sighting::ShortRange {
            peripheral_id: Uuid::new_v4(),
            local_name: None,
            rssi: -40,
        };
        assert_eq!(sighting.display_name(), UNKNOWN_DEVICE_NAME);

        let empty = Sighting::LocalNetwork {
            address: "10.0.0.7".parse().unwrap(),
            hardware_address: None,
            hostname: Some(String::new()),
        };
        assert_eq!(empty.display_name(), UNKNOWN_DEVICE_NAME);
    }

    #[test]
    fn test_refresh_updates_short_range_rssi_only() {
        // Arrange
        let peripheral_id = Uuid::new_v4();
        let first = Sighting::ShortRange {
            peripheral_id,
            local_name: Some("tracker".to_string()),
            rssi: -60,
        };
        let mut device = Device::from_sighting(&first);
        let original_id = device.id;

        // Act – repeat sighting with a new strength and a new name
        device.refresh(&Sighting::ShortRange {
            peripheral_id,
            local_name: Some("tracker-renamed".to_string()),
            rssi: -40,
        });

        // Assert – strength refreshed, identity and name untouched
        assert_eq!(
            device.details,
            DeviceDetails::ShortRange {
                peripheral_id,
                rssi: -40
            }
        );
        assert_eq!(device.name, "tracker");
        assert_eq!(device.id, original_id);
    }

    #[test]
    fn test_refresh_leaves_local_network_fields_untouched() {
        let address: IpAddr = "192.168.1.50".parse().unwrap();
        let mut device = Device::from_sighting(&Sighting::LocalNetwork {
            address,
            hardware_address: None,
            hostname: Some("nas".to_string()),
        });

        device.refresh(&Sighting::LocalNetwork {
            address,
            hardware_address: Some("11:22:33:44:55:66".to_string()),
            hostname: Some("nas-renamed".to_string()),
        });

        assert_eq!(
            device.details,
            DeviceDetails::LocalNetwork {
                address,
                hardware_address: None
            }
        );
        assert_eq!(device.name, "nas");
    }

    #[test]
    fn test_identity_key_matches_between_sighting_and_device() {
        let sighting = short_range_sighting(-55);
        let device = Device::from_sighting(&sighting);
        assert_eq!(device.identity_key(), sighting.identity_key());
    }
}
