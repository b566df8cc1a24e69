use std::fs;

use chrono::{TimeZone, Utc};
use uai_sessions::{Role, SessionRegistry, SessionStats, SessionStore};
use tempfile::TempDir;

/// Helper: create a temp directory with hand-written session files.
fn create_test_sessions_dir() -> TempDir {
    let dir = TempDir::new().unwrap();

    // Closed claude session, two turns, 2m30s long
    let session1 = r#"{
  "id": "0b9a3c1e-1111-4a4a-9d9d-000000000001",
  "tool": "claude-code",
  "projectPath": "/home/user/project-alpha",
  "startTime": "2026-01-20T10:00:00Z",
  "endTime": "2026-01-20T10:02:30Z",
  "messages": [
    {"role": "user", "content": "fix the auth bug", "timestamp": "2026-01-20T10:00:05Z"},
    {"role": "assistant", "content": "done", "timestamp": "2026-01-20T10:02:00Z"}
  ]
}"#;
    fs::write(
        dir.path().join("0b9a3c1e-1111-4a4a-9d9d-000000000001.json"),
        session1,
    )
    .unwrap();

    // Abandoned search session (never closed)
    let session2 = r#"{
  "id": "0b9a3c1e-2222-4a4a-9d9d-000000000002",
  "tool": "o3-mcp",
  "projectPath": "/home/user/project-beta",
  "startTime": "2026-01-21T14:00:00Z",
  "messages": [
    {"role": "user", "content": "rust async runtimes", "timestamp": "2026-01-21T14:00:01Z"}
  ]
}"#;
    fs::write(
        dir.path().join("0b9a3c1e-2222-4a4a-9d9d-000000000002.json"),
        session2,
    )
    .unwrap();

    // Garbage that must be skipped by listing
    fs::write(dir.path().join("broken.json"), "{\"id\": ").unwrap();

    // Unrelated file that must be ignored
    fs::write(dir.path().join("notes.txt"), "not a session").unwrap();

    dir
}

// ============================================================
// Store tests
// ============================================================

#[test]
fn test_read_fixture_session() {
    let dir = create_test_sessions_dir();
    let store = SessionStore::with_dir(dir.path().to_path_buf());

    let session = store.read("0b9a3c1e-1111-4a4a-9d9d-000000000001").unwrap();

    assert_eq!(session.tool, "claude-code");
    assert_eq!(session.project_path, "/home/user/project-alpha");
    assert_eq!(
        session.start_time,
        Utc.with_ymd_and_hms(2026, 1, 20, 10, 0, 0).unwrap()
    );
    assert_eq!(
        session.end_time,
        Some(Utc.with_ymd_and_hms(2026, 1, 20, 10, 2, 30).unwrap())
    );
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].role, Role::User);
    assert_eq!(session.messages[1].role, Role::Assistant);
}

#[test]
fn test_list_skips_unparsable_and_sorts_newest_first() {
    let dir = create_test_sessions_dir();
    let store = SessionStore::with_dir(dir.path().to_path_buf());

    let sessions = store.list().unwrap();

    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].tool, "o3-mcp");
    assert_eq!(sessions[1].tool, "claude-code");
}

#[test]
fn test_create_then_read_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::with_dir(dir.path().to_path_buf());

    let created = store.create("demo", "/tmp/p").unwrap();
    let read = store.read(&created.id).unwrap();

    assert!(read.messages.is_empty());
    assert!(read.end_time.is_none());
    assert_eq!(read, created);
}

#[test]
fn test_delete_all_then_list_is_empty() {
    let dir = create_test_sessions_dir();
    let store = SessionStore::with_dir(dir.path().to_path_buf());

    let removed = store.delete_all().unwrap();

    // The broken file has the session extension and is removed too
    assert_eq!(removed, 3);
    assert!(store.list().unwrap().is_empty());
    assert!(dir.path().join("notes.txt").exists());
}

// ============================================================
// Registry tests
// ============================================================

#[test]
fn test_message_count_matches_successful_appends() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::new(SessionStore::with_dir(dir.path().to_path_buf()));
    let id = registry.open("demo", "/tmp/p").unwrap();

    for i in 0..7 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        registry.append(&id, role, format!("turn {}", i)).unwrap();
    }
    // Failed appends do not count
    assert!(registry.append("other", Role::User, "x").is_err());

    assert_eq!(registry.stats(&id).message_count, 7);
}

#[test]
fn test_close_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::new(SessionStore::with_dir(dir.path().to_path_buf()));
    let id = registry.open("demo", "/tmp/p").unwrap();

    registry.close(&id).unwrap();
    let first = registry.store().read(&id).unwrap().end_time;
    assert!(first.is_some());

    registry.close(&id).unwrap();
    let second = registry.store().read(&id).unwrap().end_time;

    assert_eq!(first, second);
}

#[test]
fn test_stats_on_unknown_id_is_zero() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::new(SessionStore::with_dir(dir.path().to_path_buf()));

    let stats = registry.stats("no-such-session");

    assert_eq!(stats, SessionStats::zero());
    assert_eq!(stats.duration, "0m0s");
}

#[test]
fn test_stats_on_closed_fixture() {
    let dir = create_test_sessions_dir();
    let registry = SessionRegistry::new(SessionStore::with_dir(dir.path().to_path_buf()));

    let stats = registry.stats("0b9a3c1e-1111-4a4a-9d9d-000000000001");

    assert_eq!(stats.message_count, 2);
    assert_eq!(stats.duration, "2m30s");
}

#[test]
fn test_demo_scenario() {
    let dir = TempDir::new().unwrap();
    let registry = SessionRegistry::new(SessionStore::with_dir(dir.path().to_path_buf()));

    let id = registry.open("demo", "/tmp/p").unwrap();
    registry.append(&id, Role::User, "hi").unwrap();
    registry.append(&id, Role::Assistant, "hello").unwrap();
    registry.close(&id).unwrap();

    let stats = registry.stats(&id);
    assert_eq!(stats.message_count, 2);
    // Closed immediately, so well under a minute
    assert!(stats.duration.starts_with("0m"));

    let persisted = registry.store().read(&id).unwrap();
    let elapsed = persisted.end_time.unwrap() - persisted.start_time;
    assert!(elapsed.num_milliseconds() >= 0);

    let listed = registry.store().list().unwrap();
    assert_eq!(listed.iter().filter(|s| s.id == id).count(), 1);
    assert_eq!(listed[0].messages[0].content, "hi");
    assert_eq!(listed[0].messages[1].content, "hello");
}
