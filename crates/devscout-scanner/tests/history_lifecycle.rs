//! Integration tests for the history use case over the real SQLite
//! store.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use devscout_core::{Device, ScanSession, Sighting};
use devscout_scanner::application::browse_history::ScanHistory;
use devscout_scanner::application::session_store::SessionStore;
use devscout_scanner::infrastructure::storage::sessions::SqliteSessionStore;
use uuid::Uuid;

fn seeded_session(store: &SqliteSessionStore, device_name: &str, minutes_ago: i64) -> ScanSession {
    let mut session = ScanSession::new();
    session.started_at = Utc::now() - ChronoDuration::minutes(minutes_ago);
    session.ended_at = Some(session.started_at + ChronoDuration::seconds(15));
    session.completed = true;

    let mut device = Device::from_sighting(&Sighting::LocalNetwork {
        address: "192.168.1.77".parse().unwrap(),
        hardware_address: None,
        hostname: Some(device_name.to_string()),
    });
    device.session_id = Some(session.id);
    session.devices.push(device.clone());

    store.save_device(&device).expect("device must save");
    store.save_session(&session).expect("session must save");
    session
}

#[test]
fn test_refresh_lists_sessions_newest_first() {
    // Arrange
    let store = Arc::new(SqliteSessionStore::open_in_memory().unwrap());
    let old = seeded_session(&store, "printer", 10);
    let new = seeded_session(&store, "camera", 1);

    // Act
    let mut history = ScanHistory::new(Arc::clone(&store) as Arc<dyn SessionStore>);
    history.refresh().expect("refresh must succeed");

    // Assert
    let ids: Vec<Uuid> = history.sessions().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![new.id, old.id]);
}

#[test]
fn test_filter_narrows_by_device_name() {
    // Arrange
    let store = Arc::new(SqliteSessionStore::open_in_memory().unwrap());
    seeded_session(&store, "Office-Printer", 5);
    seeded_session(&store, "door-camera", 3);

    let mut history = ScanHistory::new(Arc::clone(&store) as Arc<dyn SessionStore>);
    history.refresh().unwrap();

    // Act
    history.set_filter("printer");

    // Assert
    let visible = history.visible_sessions();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].devices[0].name, "Office-Printer");
}

#[test]
fn test_delete_session_empties_its_device_list() {
    // Arrange
    let store = Arc::new(SqliteSessionStore::open_in_memory().unwrap());
    let doomed = seeded_session(&store, "printer", 2);
    let kept = seeded_session(&store, "camera", 1);

    let mut history = ScanHistory::new(Arc::clone(&store) as Arc<dyn SessionStore>);
    history.refresh().unwrap();
    assert_eq!(history.sessions().len(), 2);

    // Act
    history.delete_session(doomed.id).expect("delete must work");

    // Assert – the snapshot refreshed and the cascade emptied the
    // deleted session's devices
    let ids: Vec<Uuid> = history.sessions().iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![kept.id]);
    assert!(history
        .devices_for_session(doomed.id)
        .expect("query must succeed")
        .is_empty());
    assert_eq!(
        history.devices_for_session(kept.id).unwrap().len(),
        1,
        "unrelated sessions must keep their devices"
    );
}
