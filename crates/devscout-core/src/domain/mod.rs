//! Pure domain logic with no I/O dependencies.
//!
//! # Sub-modules
//!
//! - **`device`**   – The `Device` entity, its per-source identity key,
//!   and the raw `Sighting` payload the discovery sources emit.
//!
//! - **`session`**  – One bounded scan attempt: start/end instants and
//!   the devices found during it, in discovery order.
//!
//! - **`roster`**   – The insertion-ordered, identity-keyed collection
//!   that folds sightings into device records without ever surfacing a
//!   duplicate.
//!
//! - **`progress`** – Blends the elapsed-time progress floor with the
//!   value a source reports into one non-decreasing gauge.

pub mod device;
pub mod progress;
pub mod roster;
pub mod session;
