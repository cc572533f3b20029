mod common;

use std::time::Duration;
use tempfile::tempdir;

use app::sync::{register_pairs, TaskRegistry};
use common::*;

#[tokio::test]
async fn test_registry_starts_every_configured_pair_once() {
    init_logger();
    let src_a = tempdir().unwrap();
    let src_b = tempdir().unwrap();
    let dst = tempdir().unwrap();
    create_source_tree(src_a.path());
    create_source_tree(src_b.path());

    let dest_a = dst.path().join("a");
    let dest_b = dst.path().join("b");
    let pairs = vec![
        format!("{}:{}", src_a.path().display(), dest_a.display()),
        "not-a-pair".to_string(),
        format!("{}:{}", src_b.path().display(), dest_b.display()),
    ];

    let registry = TaskRegistry::new();
    let tasks = register_pairs(&registry, &pairs, Duration::from_secs(3600), &fallback_options());
    assert_eq!(tasks.len(), 2);

    assert_eq!(registry.start_all(), 2);
    assert_eq!(registry.start_all(), 0);

    assert!(
        wait_for(Duration::from_secs(10), || {
            registry
                .get_all_status()
                .iter()
                .all(|s| s.last_sync.is_some() && !s.is_syncing)
        })
        .await
    );
    assert_mirrored(&dest_a);
    assert_mirrored(&dest_b);

    let id = tasks[1].id().to_string();
    let status = registry.status_by_id(&id).unwrap();
    assert_eq!(status.id, id);
    assert!(status.last_error.is_empty());
    assert!(registry.status_by_id("missing:id").is_none());
}

#[tokio::test]
async fn test_trigger_all_reschedules_every_task() {
    init_logger();
    let tmp = tempdir().unwrap();
    let registry = TaskRegistry::new();
    for name in ["one", "two", "three"] {
        registry
            .add_task(
                tmp.path().join(name),
                tmp.path().join(format!("{}-out", name)),
                Duration::from_secs(3600),
                fallback_options(),
            )
            .unwrap();
    }
    registry.pause_by_id(&registry.tasks()[1].id().to_string());

    registry.trigger_all();

    let now = chrono::Utc::now();
    for status in registry.get_all_status() {
        assert!(!status.paused);
        assert!((now - status.next_sync_time).num_seconds().abs() <= 2);
    }
}
