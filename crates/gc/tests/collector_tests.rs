//! Integration tests for the garbage collector cycle.

mod common;

use common::*;
use drydock_core::GcConfig;
use drydock_gc::Collector;

#[tokio::test]
async fn test_check_container_reaped_end_to_end() {
    let harness = TestStore::new().await;
    let store = harness.store();

    store.save_worker(&test_worker("w1", "10.0.0.1:7788")).await.unwrap();
    let rc = insert_resource_config(harness.pool(), "hash-a").await;

    let creating = store.create_check_container("w1", rc, "check").await.unwrap();
    store.mark_container_created(&creating).await.unwrap();

    // No live owner anymore: the container is garbage.
    delete_resource_config(harness.pool(), rc).await;

    let backend = FakeBackend::new();
    let connector = FakeConnector::new(backend.clone());
    let collector = Collector::new(store.clone(), connector, GcConfig::default());

    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.containers_marked, 1);
    assert_eq!(stats.containers_reaped, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(backend.destroyed_containers(), vec![creating.handle.clone()]);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM containers")
        .fetch_one(harness.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);

    // A second cycle finds nothing and performs no action.
    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.containers_marked, 0);
    assert_eq!(stats.containers_reaped, 0);
    assert_eq!(backend.destroyed_containers().len(), 1);
}

#[tokio::test]
async fn test_addressless_worker_leaves_resource_marked() {
    let harness = TestStore::new().await;
    let store = harness.store();

    store.save_worker(&addressless_worker("w1")).await.unwrap();
    let rc = insert_resource_config(harness.pool(), "hash-a").await;

    let creating = store.create_check_container("w1", rc, "check").await.unwrap();
    let created = store.mark_container_created(&creating).await.unwrap();
    store.begin_container_destroy(&created).await.unwrap();

    let backend = FakeBackend::new();
    let connector = FakeConnector::new(backend.clone());
    let collector = Collector::new(store.clone(), connector, GcConfig::default());

    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.errors, 0);
    assert!(backend.destroyed_containers().is_empty());
    assert_eq!(
        container_state(harness.pool(), creating.id).await.as_deref(),
        Some("destroying")
    );

    // The worker re-registers with an address; the leftover is reaped.
    store.save_worker(&test_worker("w1", "10.0.0.1:7788")).await.unwrap();

    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.containers_reaped, 1);
    assert_eq!(backend.destroyed_containers(), vec![creating.handle.clone()]);
}

#[tokio::test]
async fn test_unknown_worker_leaves_resource_marked() {
    let harness = TestStore::new().await;
    let store = harness.store();

    store.save_worker(&test_worker("w1", "10.0.0.1:7788")).await.unwrap();
    let rc = insert_resource_config(harness.pool(), "hash-a").await;

    let creating = store.create_check_container("w1", rc, "check").await.unwrap();
    let created = store.mark_container_created(&creating).await.unwrap();
    store.begin_container_destroy(&created).await.unwrap();

    // Make the worker row vanish underneath the container, as a pruned
    // registry would.
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(harness.pool())
        .await
        .unwrap();
    sqlx::query("DELETE FROM workers WHERE name = 'w1'")
        .execute(harness.pool())
        .await
        .unwrap();
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(harness.pool())
        .await
        .unwrap();

    let backend = FakeBackend::new();
    let connector = FakeConnector::new(backend.clone());
    let collector = Collector::new(store.clone(), connector, GcConfig::default());

    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(
        container_state(harness.pool(), creating.id).await.as_deref(),
        Some("destroying")
    );
}

#[tokio::test]
async fn test_remote_failure_defers_to_next_cycle() {
    let harness = TestStore::new().await;
    let store = harness.store();

    store.save_worker(&test_worker("w1", "10.0.0.1:7788")).await.unwrap();
    let rc = insert_resource_config(harness.pool(), "hash-a").await;

    let creating = store.create_check_container("w1", rc, "check").await.unwrap();
    let created = store.mark_container_created(&creating).await.unwrap();
    store.begin_container_destroy(&created).await.unwrap();

    let backend = FakeBackend::new();
    backend.set_failing(true);
    let connector = FakeConnector::new(backend.clone());
    let collector = Collector::new(store.clone(), connector, GcConfig::default());

    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.containers_reaped, 0);
    // No remote confirmation: the row must not be force-finalized.
    assert_eq!(
        container_state(harness.pool(), creating.id).await.as_deref(),
        Some("destroying")
    );

    backend.set_failing(false);

    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.containers_reaped, 1);
    assert_eq!(container_state(harness.pool(), creating.id).await, None);
}

#[tokio::test]
async fn test_container_reap_strands_and_reaps_volumes_in_order() {
    let harness = TestStore::new().await;
    let store = harness.store();

    store.save_worker(&test_worker("w1", "10.0.0.1:7788")).await.unwrap();
    let team = insert_team(harness.pool(), "main").await;
    let rc = insert_resource_config(harness.pool(), "hash-a").await;

    let creating = store.create_check_container("w1", rc, "check").await.unwrap();
    let container = store.mark_container_created(&creating).await.unwrap();

    let volume = store
        .create_container_volume(team, "w1", container.id, "/scratch")
        .await
        .unwrap();
    store.mark_volume_created(&volume).await.unwrap();

    delete_resource_config(harness.pool(), rc).await;

    let backend = FakeBackend::new();
    let connector = FakeConnector::new(backend.clone());
    let collector = Collector::new(store.clone(), connector, GcConfig::default());

    // Containers go first; removing the container strands its volume,
    // which the same cycle's volume pass then picks up.
    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.containers_reaped, 1);
    assert_eq!(stats.volumes_marked, 1);
    assert_eq!(stats.volumes_reaped, 1);
    assert_eq!(backend.destroyed_containers(), vec![container.handle.clone()]);
    assert_eq!(backend.destroyed_volumes(), vec![volume.handle.clone()]);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM volumes")
        .fetch_one(harness.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_clients_are_reused_within_a_cycle() {
    let harness = TestStore::new().await;
    let store = harness.store();

    store.save_worker(&test_worker("w1", "10.0.0.1:7788")).await.unwrap();
    let rc = insert_resource_config(harness.pool(), "hash-a").await;

    for step in ["check-a", "check-b"] {
        let creating = store.create_check_container("w1", rc, step).await.unwrap();
        let created = store.mark_container_created(&creating).await.unwrap();
        store.begin_container_destroy(&created).await.unwrap();
    }

    let backend = FakeBackend::new();
    let connector = FakeConnector::new(backend.clone());
    let collector = Collector::new(store.clone(), connector.clone(), GcConfig::default());

    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.containers_reaped, 2);
    // One dial per worker address per cycle.
    assert_eq!(connector.dialed(), vec!["10.0.0.1:7788".to_string()]);
}

#[tokio::test]
async fn test_creating_rows_are_untouched_by_default() {
    let harness = TestStore::new().await;
    let store = harness.store();

    store.save_worker(&test_worker("w1", "10.0.0.1:7788")).await.unwrap();
    let rc = insert_resource_config(harness.pool(), "hash-a").await;

    let creating = store.create_check_container("w1", rc, "check").await.unwrap();
    backdate_container(harness.pool(), creating.id, time::Duration::hours(48)).await;

    let backend = FakeBackend::new();
    let connector = FakeConnector::new(backend.clone());
    let collector = Collector::new(store.clone(), connector, GcConfig::default());

    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.stale_creating_marked, 0);
    assert_eq!(
        container_state(harness.pool(), creating.id).await.as_deref(),
        Some("creating")
    );
}

#[tokio::test]
async fn test_abandoned_creating_rows_reaped_when_configured() {
    let harness = TestStore::new().await;
    let store = harness.store();

    store.save_worker(&test_worker("w1", "10.0.0.1:7788")).await.unwrap();
    let rc = insert_resource_config(harness.pool(), "hash-a").await;

    let abandoned = store.create_check_container("w1", rc, "check").await.unwrap();
    backdate_container(harness.pool(), abandoned.id, time::Duration::hours(2)).await;

    // A fresh creating row from a live creator must survive the sweep.
    let fresh = store.create_check_container("w1", rc, "check-b").await.unwrap();

    let config = GcConfig {
        reap_creating_after_secs: Some(3600),
        ..GcConfig::default()
    };

    let backend = FakeBackend::new();
    let connector = FakeConnector::new(backend.clone());
    let collector = Collector::new(store.clone(), connector, config);

    let stats = collector.run_cycle().await.unwrap();
    assert_eq!(stats.stale_creating_marked, 1);
    assert_eq!(stats.containers_reaped, 1);
    assert_eq!(backend.destroyed_containers(), vec![abandoned.handle.clone()]);
    assert_eq!(
        container_state(harness.pool(), fresh.id).await.as_deref(),
        Some("creating")
    );
}
