//! devscout-scanner library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does devscout do?
//!
//! devscout finds the devices around a machine using two independent
//! discovery mechanisms — short-range radio advertisements and
//! local-network probing — and folds whatever both report into one
//! scan session that is written to the history store when the scan
//! finishes.
//!
//! The interesting part is the orchestration: the two sources start
//! and fail independently, emit events on their own schedules, and
//! may complete, error out, or time out in any order. The
//! [`application::run_scan::ScanOrchestrator`] serializes all of that
//! onto one actor task, deduplicates device records per source,
//! publishes a progress gauge that never moves backwards, and
//! guarantees the session is finalized and persisted exactly once.

/// Application layer: the scan orchestrator and history use cases.
pub mod application;

/// Infrastructure layer: discovery sources, their backend boundaries,
/// configuration, and the SQLite session store.
pub mod infrastructure;
