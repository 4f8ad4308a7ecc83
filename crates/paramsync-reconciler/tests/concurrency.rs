mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use paramsync_core::ParameterStatus;
use paramsync_reconciler::{
    ReconcileError, ReconcilerConfig, SyncEngine, SyncScheduler, UpdateRequest,
};
use paramsync_storage::ParameterStore;
use tokio::sync::watch;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_passes_for_same_owner_serialize() {
    let cache = parent("cache-1", "p-1");
    let store = store_with_parents(&[&cache]);
    let reconciler = reconciler(store.clone());
    let external = vec![
        view("x1", "maxmemory", "100"),
        view("x2", "timeout", "30"),
        view("x3", "databases", "16"),
    ];

    let mut handles = Vec::new();
    for _ in 0..8 {
        let reconciler = reconciler.clone();
        let cache = cache.clone();
        let external = external.clone();
        handles.push(tokio::spawn(async move {
            reconciler.sync_parameters(&cache, external).await
        }));
    }

    let mut added = 0;
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(!result.is_error(), "{result}");
        added += result.added.ok;
    }

    assert_eq!(added, 3);
    assert_eq!(store.count_by_parent("cache-1"), 3);
    assert_eq!(reconciler.locks().active_keys(), 0);
}

#[tokio::test]
async fn pass_waits_for_held_scope_lock() {
    let cache = parent("cache-1", "p-1");
    let store = store_with_parents(&[&cache]);
    let reconciler = reconciler(store.clone());

    let scope = reconciler.scopes().scope_for_parent(&cache);
    let held = reconciler.locks().lock_scope(&scope).await;

    let task = {
        let reconciler = reconciler.clone();
        let cache = cache.clone();
        tokio::spawn(async move {
            reconciler
                .sync_parameters(&cache, vec![view("x1", "maxmemory", "100")])
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());
    assert_eq!(store.count_by_parent("cache-1"), 0);

    drop(held);
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("pass should finish once the lock is released")
        .unwrap();
    assert_eq!(result.added.ok, 1);
}

#[tokio::test]
async fn different_owners_do_not_block_each_other() {
    let a = parent("cache-a", "p-1");
    let b = parent("cache-b", "p-2");
    let store = store_with_parents(&[&a, &b]);
    let reconciler = reconciler(store.clone());

    let scope_a = reconciler.scopes().scope_for_parent(&a);
    let _held = reconciler.locks().lock_scope(&scope_a).await;

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        reconciler.sync_parameters(&b, vec![view("y1", "timeout", "0")]),
    )
    .await
    .expect("other owner must not wait");
    assert_eq!(result.added.ok, 1);
}

#[tokio::test]
async fn lock_timeout_aborts_pass() {
    let cache = parent("cache-1", "p-1");
    let store = store_with_parents(&[&cache]);
    let reconciler = reconciler(store.clone()).with_lock_timeout(Some(Duration::from_millis(20)));

    let scope = reconciler.scopes().scope_for_parent(&cache);
    let _held = reconciler.locks().lock_scope(&scope).await;

    let result = reconciler
        .sync_parameters(&cache, vec![view("x1", "maxmemory", "100")])
        .await;
    assert!(result.is_fatal());
    assert!(matches!(result.fatal, Some(ReconcileError::LockTimeout { .. })));
    assert_eq!(store.count_by_parent("cache-1"), 0);
}

#[tokio::test]
async fn scope_resolves_through_parent_registry() {
    let cache = parent("cache-1", "p-1");
    let store = store_with_parents(&[&cache]);
    let row = seed(&store, &cache, &view("x1", "maxmemory", "100")).await;
    let reconciler = reconciler(store.clone());

    let scope = reconciler.scopes().scope_for_parameter(&row).await.unwrap();
    assert_eq!(scope, reconciler.scopes().scope_for_parent(&cache));
    assert_eq!(scope.to_string(), "elasticcacheparameters:p-1");

    store.remove_parent("cache-1");
    let err = reconciler.scopes().scope_for_parameter(&row).await.unwrap_err();
    assert!(matches!(err, ReconcileError::ParentNotFound(_)));
}

#[tokio::test]
async fn scheduler_runs_every_registered_parent() {
    let a = parent("cache-a", "p-1");
    let b = parent("cache-b", "p-1");
    let c = parent("cache-c", "p-2");
    let store = store_with_parents(&[&a, &b, &c]);

    let source = Arc::new(StaticSource::default());
    source.set("cache-a", vec![view("x1", "maxmemory", "100")]);
    source.set("cache-b", vec![view("x2", "maxmemory", "200"), view("x3", "timeout", "0")]);
    source.fail_for("cache-c");

    let (engine, _rx) = engine(store.clone());
    let scheduler = engine.scheduler(source.clone());
    scheduler.register(a);
    scheduler.register(b);
    scheduler.register(c);
    assert_eq!(scheduler.parent_count(), 3);

    let synced = scheduler.run_once().await;
    let ids: Vec<&str> = synced.iter().map(|s| s.parent_id.as_str()).collect();
    assert_eq!(ids, vec!["cache-a", "cache-b", "cache-c"]);
    assert_eq!(synced[0].result.added.ok, 1);
    assert_eq!(synced[1].result.added.ok, 2);
    assert!(synced[2].result.is_fatal());

    assert_eq!(store.count_by_parent("cache-a"), 1);
    assert_eq!(store.count_by_parent("cache-b"), 2);
    assert_eq!(engine.locks().active_keys(), 0);

    assert!(scheduler.unregister("cache-c").is_some());
    let synced = scheduler.run_once().await;
    assert_eq!(synced.len(), 2);
    assert!(synced.iter().all(|s| !s.result.is_error()));
}

#[tokio::test]
async fn scheduler_stops_on_shutdown() {
    let cache = parent("cache-1", "p-1");
    let store = store_with_parents(&[&cache]);
    let source = Arc::new(StaticSource::default());
    source.set("cache-1", vec![view("x1", "maxmemory", "100")]);

    let scheduler = SyncScheduler::new(
        reconciler(store.clone()),
        source,
        Duration::from_millis(10),
    );
    scheduler.register(cache);

    let (tx, rx) = watch::channel(false);
    let running = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run(rx).await })
    };

    // The first tick fires immediately.
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.count_by_parent("cache-1") == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first tick should sync the parent");

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("scheduler should stop")
        .unwrap();
}

#[tokio::test]
async fn sync_update_waits_for_held_entity_lock() {
    let cache = parent("cache-1", "p-1");
    let store = store_with_parents(&[&cache]);
    let row = seed(&store, &cache, &view("x1", "maxmemory", "100")).await;
    let reconciler = reconciler(store.clone());

    let held = reconciler.locks().lock_entity(&row.id).await;
    let task = {
        let reconciler = reconciler.clone();
        let cache = cache.clone();
        tokio::spawn(async move {
            reconciler
                .sync_parameters(&cache, vec![view("x1", "maxmemory", "200")])
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());
    assert_eq!(store.get(&row.id).await.unwrap().unwrap().value, "100");

    drop(held);
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("pass should finish once the row is released")
        .unwrap();
    assert_eq!(result.updated.ok, 1);
    assert_eq!(store.get(&row.id).await.unwrap().unwrap().value, "200");
}

#[tokio::test]
async fn user_update_waits_for_running_pass() {
    let cache = parent("cache-1", "p-1");
    let store = store_with_parents(&[&cache]);
    let row = seed(&store, &cache, &view("x1", "timeout", "0").with_modifiable(true)).await;
    let (engine, mut rx) = engine(store.clone());

    let scope = engine.reconciler().scopes().scope_for_parent(&cache);
    let pass = engine.locks().lock_scope(&scope).await;
    let update = {
        let engine = engine.clone();
        let id = row.id.clone();
        tokio::spawn(async move { engine.updater().update(&id, UpdateRequest::value("30")).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!update.is_finished());
    let stored = store.get(&row.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ParameterStatus::Ready);
    assert!(rx.try_recv().is_err());

    drop(pass);
    let outcome = tokio::time::timeout(Duration::from_secs(5), update)
        .await
        .expect("update should proceed once the pass ends")
        .unwrap()
        .unwrap();
    assert!(outcome.is_dispatched());
    assert_eq!(store.get(&row.id).await.unwrap().unwrap().value, "30");
    assert!(rx.recv().await.is_some());
}

#[tokio::test]
async fn pass_for_parent_without_owner_project_is_fatal() {
    let cache = parent("cache-1", "");
    let store = store_with_parents(&[&cache]);

    let result = reconciler(store.clone())
        .sync_parameters(&cache, vec![view("x1", "maxmemory", "100")])
        .await;
    assert!(result.is_fatal());
    assert!(matches!(result.fatal, Some(ReconcileError::Core(_))));
    assert_eq!(store.count_by_parent("cache-1"), 0);
}

#[tokio::test]
async fn engine_queue_uses_configured_capacity() {
    let cache = parent("cache-1", "p-1");
    let store = store_with_parents(&[&cache]);
    let first = seed(&store, &cache, &view("x1", "timeout", "0").with_modifiable(true)).await;
    let second = seed(&store, &cache, &view("x2", "maxmemory", "100").with_modifiable(true)).await;

    let mut config = ReconcilerConfig::default();
    config.dispatch.channel_capacity = 1;
    let (engine, mut rx) = SyncEngine::with_channel(config, store.clone(), store.clone());

    let queued = engine
        .updater()
        .update(&first.id, UpdateRequest::value("30"))
        .await
        .unwrap();
    assert!(queued.is_dispatched());

    let overflow = engine
        .updater()
        .update(&second.id, UpdateRequest::value("200"))
        .await
        .unwrap();
    assert!(!overflow.is_dispatched());

    assert_eq!(rx.recv().await.unwrap().target_id, first.id);
    assert!(rx.try_recv().is_err());
}
