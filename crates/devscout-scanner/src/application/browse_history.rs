//! BrowseHistory use case: the read side over past scan sessions.
//!
//! Holds an in-memory snapshot of the store, newest session first, and
//! narrows it with a case-insensitive device-name filter. Deleting a
//! session cascades to its devices and refreshes the snapshot.

use std::sync::Arc;

use devscout_core::{Device, ScanSession};
use tracing::debug;
use uuid::Uuid;

use crate::application::session_store::{SessionStore, StoreError};

/// Scan history browser.
pub struct ScanHistory {
    store: Arc<dyn SessionStore>,
    sessions: Vec<ScanSession>,
    filter: String,
}

impl ScanHistory {
    /// Creates an empty browser; call [`refresh`](Self::refresh) to
    /// load the snapshot.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            sessions: Vec::new(),
            filter: String::new(),
        }
    }

    /// Reloads the snapshot from the store.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the underlying query.
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.sessions = self.store.list_sessions()?;
        debug!("history snapshot holds {} session(s)", self.sessions.len());
        Ok(())
    }

    /// Every session in the snapshot, newest first.
    pub fn sessions(&self) -> &[ScanSession] {
        &self.sessions
    }

    /// Sets the device-name filter. An empty filter shows everything.
    pub fn set_filter(&mut self, text: &str) {
        self.filter = text.to_string();
    }

    /// The sessions matching the current filter: those containing at
    /// least one device whose name contains the filter text,
    /// case-insensitively.
    pub fn visible_sessions(&self) -> Vec<&ScanSession> {
        if self.filter.is_empty() {
            return self.sessions.iter().collect();
        }
        let needle = self.filter.to_lowercase();
        self.sessions
            .iter()
            .filter(|session| {
                session
                    .devices
                    .iter()
                    .any(|device| device.name.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// The devices found during one session, in discovery order.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the underlying query.
    pub fn devices_for_session(&self, session_id: Uuid) -> Result<Vec<Device>, StoreError> {
        self.store.devices_for_session(session_id)
    }

    /// Deletes a session (and, through the store, its devices), then
    /// refreshes the snapshot.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError`] from the delete or the reload.
    pub fn delete_session(&mut self, session_id: Uuid) -> Result<(), StoreError> {
        self.store.delete_session(session_id)?;
        self.refresh()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
