use gmail_agent::mailbox::InboxMessage;
use gmail_agent::tracker::ProcessingTracker;

fn message(id: &str) -> InboxMessage {
    InboxMessage {
        id: id.to_string(),
        thread_id: Some(format!("thread-{}", id)),
        rfc822_message_id: None,
        subject: format!("Subject {}", id),
        sender: "someone@example.com".to_string(),
        body: "Hello".to_string(),
    }
}

#[test]
fn test_durability_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_messages.json");

    let mut tracker = ProcessingTracker::load(&path);
    assert!(tracker.is_empty());
    tracker.mark_processed("18c2f0a1");
    tracker.persist().unwrap();

    let reloaded = ProcessingTracker::load(&path);
    assert!(reloaded.contains("18c2f0a1"));
    assert!(!reloaded.contains("other"));
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn test_mark_processed_twice_keeps_persisted_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_messages.json");

    let mut tracker = ProcessingTracker::load(&path);
    tracker.mark_processed("a");
    tracker.persist().unwrap();
    assert_eq!(ProcessingTracker::load(&path).len(), 1);

    assert!(!tracker.mark_processed("a"));
    tracker.persist().unwrap();
    assert_eq!(ProcessingTracker::load(&path).len(), 1);
}

#[test]
fn test_clear_empties_persisted_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_messages.json");

    let mut tracker = ProcessingTracker::load(&path);
    for id in ["a", "b", "c"] {
        tracker.mark_processed(id);
    }
    tracker.persist().unwrap();

    tracker.clear().unwrap();
    assert!(tracker.is_empty());

    let reloaded = ProcessingTracker::load(&path);
    assert!(reloaded.is_empty());
    for id in ["a", "b", "c"] {
        assert!(!reloaded.contains(id));
    }
    assert!(path.exists());
}

#[test]
fn test_corrupt_store_degrades_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_messages.json");
    std::fs::write(&path, "{ not json").unwrap();

    let mut tracker = ProcessingTracker::load(&path);
    assert!(tracker.is_empty());

    // The next persist replaces the corrupt file
    tracker.mark_processed("a");
    tracker.persist().unwrap();
    assert!(ProcessingTracker::load(&path).contains("a"));
}

#[test]
fn test_missing_store_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let tracker = ProcessingTracker::load(dir.path().join("nope.json"));
    assert!(tracker.is_empty());

    let stats = tracker.stats();
    assert_eq!(stats.total_processed, 0);
    assert!(!stats.history_file_exists);
    assert!(stats.last_updated.is_none());
}

#[test]
fn test_stats_after_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_messages.json");

    let mut tracker = ProcessingTracker::load(&path);
    tracker.mark_processed("a");
    tracker.mark_processed("b");
    tracker.persist().unwrap();

    assert_eq!(tracker.path(), path.as_path());
    let stats = tracker.stats();
    assert_eq!(stats.total_processed, 2);
    assert!(stats.history_file_exists);
    assert!(stats.last_updated.is_some());
}

#[test]
fn test_persisted_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_messages.json");

    let mut tracker = ProcessingTracker::load(&path);
    tracker.mark_processed("msg-1");
    tracker.persist().unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["processed"][0]["message_id"], "msg-1");
    assert!(value["processed"][0]["processed_at"].is_string());
    assert!(value["last_updated"].is_string());
}

#[test]
fn test_filter_new_drops_tracked_ids() {
    let dir = tempfile::tempdir().unwrap();
    let mut tracker = ProcessingTracker::load(dir.path().join("h.json"));
    tracker.mark_processed("2");

    let kept = tracker.filter_new(vec![message("1"), message("2"), message("3")]);
    let ids: Vec<&str> = kept.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
}

#[test]
fn test_legacy_processed_ids_are_imported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_messages.json");
    std::fs::write(
        &path,
        r#"{"processed_ids": ["18c2f0a1", "18c2f0a2"], "last_updated": "2024-05-01T10:00:00.123456"}"#,
    )
    .unwrap();

    let mut tracker = ProcessingTracker::load(&path);
    assert_eq!(tracker.len(), 2);
    assert!(tracker.contains("18c2f0a1"));
    assert!(tracker.contains("18c2f0a2"));
    assert!(tracker.has_unsaved_changes());

    let stats = tracker.stats();
    assert_eq!(
        stats.last_updated.map(|at| at.to_rfc3339()),
        Some("2024-05-01T10:00:00.123456+00:00".to_string())
    );

    // Rewritten in the current layout, ids kept
    tracker.persist().unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(value.get("processed_ids").is_none());
    assert_eq!(value["processed"].as_array().unwrap().len(), 2);
    assert_eq!(ProcessingTracker::load(&path).len(), 2);
}
