//! The insertion-ordered, identity-keyed device collection.
//!
//! Each discovery source gets its own roster. Folding every sighting
//! through [`DeviceRoster::observe`] guarantees the two dedup
//! invariants: no two records share an identity key, and a record's
//! position in the externally observable list never changes once it
//! has been appended. Both hold under arbitrary interleavings of new
//! and repeat sightings.

use std::collections::HashMap;

use super::device::{Device, IdentityKey, Sighting};

/// Ordered device records, deduplicated by identity key.
///
/// Lookup is a `HashMap` from identity key to position; the records
/// themselves live in a `Vec` so first-seen order is preserved.
#[derive(Debug, Default)]
pub struct DeviceRoster {
    devices: Vec<Device>,
    index: HashMap<IdentityKey, usize>,
}

impl DeviceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one sighting into the roster.
    ///
    /// A previously-unseen identity appends a new record; a known
    /// identity refreshes the existing record's mutable fields in
    /// place. Returns the affected record either way.
    pub fn observe(&mut self, sighting: &Sighting) -> &Device {
        let key = sighting.identity_key();
        let position = match self.index.get(&key).copied() {
            Some(position) => {
                self.devices[position].refresh(sighting);
                position
            }
            None => {
                self.devices.push(Device::from_sighting(sighting));
                let position = self.devices.len() - 1;
                self.index.insert(key, position);
                position
            }
        };
        &self.devices[position]
    }

    /// Records in discovery order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&Device> {
        self.index.get(key).map(|&position| &self.devices[position])
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Consumes the roster, yielding the records in discovery order.
    pub fn into_devices(self) -> Vec<Device> {
        self.devices
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::device::DeviceDetails;
    use std::net::IpAddr;
    use uuid::Uuid;

    fn radio_sighting(peripheral_id: Uuid, rssi: i16) -> Sighting {
        Sighting::ShortRange {
            peripheral_id,
            local_name: None,
            rssi,
        }
    }

    fn host_sighting(address: &str) -> Sighting {
        Sighting::LocalNetwork {
            address: address.parse().unwrap(),
            hardware_address: None,
            hostname: None,
        }
    }

    #[test]
    fn test_new_identity_appends_record() {
        let mut roster = DeviceRoster::new();

        roster.observe(&radio_sighting(Uuid::new_v4(), -60));
        roster.observe(&radio_sighting(Uuid::new_v4(), -70));

        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_repeat_sighting_updates_in_place() {
        // Arrange
        let mut roster = DeviceRoster::new();
        let peripheral_id = Uuid::new_v4();
        roster.observe(&radio_sighting(peripheral_id, -60));

        // Act – the same identity seen again with a stronger signal
        roster.observe(&radio_sighting(peripheral_id, -40));

        // Assert – one record, refreshed strength
        assert_eq!(roster.len(), 1, "repeat sighting must not duplicate");
        let device = roster
            .get(&IdentityKey::Peripheral(peripheral_id))
            .expect("record must exist");
        assert_eq!(
            device.details,
            DeviceDetails::ShortRange {
                peripheral_id,
                rssi: -40
            }
        );
    }

    #[test]
    fn test_record_position_survives_updates() {
        // Arrange – three peripherals in a known order
        let mut roster = DeviceRoster::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();
        roster.observe(&radio_sighting(first, -50));
        roster.observe(&radio_sighting(second, -60));
        roster.observe(&radio_sighting(third, -70));

        // Act – refresh the first and second out of order
        roster.observe(&radio_sighting(second, -55));
        roster.observe(&radio_sighting(first, -45));

        // Assert – first-seen order is unchanged
        let keys: Vec<IdentityKey> = roster.devices().iter().map(|d| d.identity_key()).collect();
        assert_eq!(
            keys,
            vec![
                IdentityKey::Peripheral(first),
                IdentityKey::Peripheral(second),
                IdentityKey::Peripheral(third),
            ]
        );
    }

    #[test]
    fn test_record_identity_survives_updates() {
        let mut roster = DeviceRoster::new();
        let peripheral_id = Uuid::new_v4();
        let original = roster.observe(&radio_sighting(peripheral_id, -60)).id;

        let refreshed = roster.observe(&radio_sighting(peripheral_id, -40)).id;

        assert_eq!(original, refreshed, "record id must be stable");
    }

    #[test]
    fn test_hosts_deduplicate_by_address() {
        let mut roster = DeviceRoster::new();

        roster.observe(&host_sighting("192.168.1.10"));
        roster.observe(&host_sighting("192.168.1.11"));
        roster.observe(&host_sighting("192.168.1.10"));

        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_interleaved_sightings_have_unique_keys() {
        // Arrange – an arbitrary interleaving of repeats and new identities
        let mut roster = DeviceRoster::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let sightings = [
            radio_sighting(a, -60),
            radio_sighting(b, -80),
            radio_sighting(a, -59),
            radio_sighting(b, -78),
            radio_sighting(a, -58),
        ];

        // Act
        for sighting in &sightings {
            roster.observe(sighting);
        }

        // Assert – no duplicate identity keys in the final set
        let mut keys: Vec<IdentityKey> =
            roster.devices().iter().map(|d| d.identity_key()).collect();
        let total = keys.len();
        keys.sort_by_key(|k| format!("{k}"));
        keys.dedup();
        assert_eq!(keys.len(), total, "identity keys must be unique");
        assert_eq!(total, 2);
    }

    #[test]
    fn test_into_devices_preserves_order() {
        let mut roster = DeviceRoster::new();
        roster.observe(&host_sighting("10.0.0.1"));
        roster.observe(&host_sighting("10.0.0.2"));

        let devices = roster.into_devices();

        let addresses: Vec<IpAddr> = devices
            .iter()
            .map(|d| match d.details {
                DeviceDetails::LocalNetwork { address, .. } => address,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            addresses,
            vec!["10.0.0.1".parse::<IpAddr>().unwrap(), "10.0.0.2".parse().unwrap()]
        );
    }
}
