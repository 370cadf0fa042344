//! The persistence contract for scan history.
//!
//! Infrastructure implementations write SQLite; test implementations
//! record calls or fail on purpose. A store failure never rolls back
//! the in-memory session the caller already observed — it is surfaced
//! and the scan result stands.

use std::path::PathBuf;

use devscout_core::{Device, ScanSession};
use thiserror::Error;
use uuid::Uuid;

/// Error type for session store operations.
///
/// Backend-agnostic on purpose: implementations map their native
/// errors into these variants.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened or prepared.
    #[error("failed to open session store at {path}: {message}")]
    Open { path: PathBuf, message: String },

    /// A write failed.
    #[error("session store write failed: {0}")]
    Write(String),

    /// A read failed.
    #[error("session store query failed: {0}")]
    Query(String),
}

/// Durable scan history.
///
/// Writes are synchronous and single-writer (the scan actor); saves
/// are idempotent upserts by id.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// Upserts one device record.
    fn save_device(&self, device: &Device) -> Result<(), StoreError>;

    /// Upserts one session record.
    fn save_session(&self, session: &ScanSession) -> Result<(), StoreError>;

    /// All sessions, newest first, with their devices loaded in
    /// discovery order.
    fn list_sessions(&self) -> Result<Vec<ScanSession>, StoreError>;

    /// The devices found during one session, in discovery order.
    fn devices_for_session(&self, session_id: Uuid) -> Result<Vec<Device>, StoreError>;

    /// Removes a session and every device it owns.
    fn delete_session(&self, session_id: Uuid) -> Result<(), StoreError>;
}
