//! # devscout-core
//!
//! Shared domain library for devscout: the device and scan-session
//! entities, the order-preserving device roster that folds raw
//! sightings into deduplicated records, and the monotonic progress
//! blender.
//!
//! This crate is pure domain logic. It has zero dependencies on the
//! async runtime, OS APIs, network sockets, or the storage backend,
//! which keeps the scan orchestration in `devscout-scanner` testable
//! against plain values.

pub mod domain;

// Re-export the most-used types at the crate root so callers can write
// `devscout_core::Device` instead of `devscout_core::domain::device::Device`.
pub use domain::device::{
    Device, DeviceDetails, DeviceKind, DeviceStatus, IdentityKey, ParseDeviceKindError,
    ParseDeviceStatusError, Sighting, UNKNOWN_DEVICE_NAME,
};
pub use domain::progress::ProgressBlend;
pub use domain::roster::DeviceRoster;
pub use domain::session::ScanSession;
