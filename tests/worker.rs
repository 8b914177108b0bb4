//! Scheduled executions driven through a channel transport and a worker.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use taskframe::{
    get_context, transport, Config, Event, EventKind, LogWriter, MemoryStore, Options, Progress,
    Registry, RuntimeError, Subscribe, TaskDecl, TaskError, TaskManager, TaskStatus, TaskStore,
    Worker,
};
use tokio_util::sync::CancellationToken;

/// Counts terminal events.
#[derive(Default)]
struct Terminals(AtomicUsize);

#[async_trait]
impl Subscribe for Terminals {
    async fn on_event(&self, event: &Event) {
        if event.is_terminal() {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &'static str {
        "terminals"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduled_tasks_run_on_worker() {
    common::init_tracing();
    let registry = Registry::new();
    let square = registry
        .register(TaskDecl::new("square"), |n: u64| async move {
            get_context()?
                .update_task(Some(Progress::Of { current: 1, total: 1 }), None)
                .await?;
            Ok::<_, TaskError>(n * n)
        })
        .unwrap();

    let terminals = Arc::new(Terminals::default());
    let (tx, rx) = transport::channel(16);
    let manager = TaskManager::builder(registry, Arc::new(MemoryStore::new()))
        .with_config(Config {
            max_concurrent: 2,
            ..common::config()
        })
        .with_transport(tx)
        .with_subscribers(vec![
            terminals.clone() as Arc<dyn Subscribe>,
            Arc::new(LogWriter::new()),
        ])
        .build();

    let token = CancellationToken::new();
    let worker = tokio::spawn(Worker::new(manager.clone(), rx).run(token.clone()));

    let mut ids = Vec::new();
    for n in 0..5u64 {
        let rec = square
            .schedule(&manager, n, Options::new().task_name(format!("square {n}")))
            .await
            .unwrap();
        assert_eq!(rec.status, TaskStatus::Pending);
        assert_eq!(rec.properties.execution_mode(), Some("async"));
        ids.push(rec.id);
    }

    for id in &ids {
        let rec = manager
            .wait_for_completion(*id, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(rec.status, TaskStatus::Success);
        assert_eq!(rec.properties.progress_percent(), Some(1.0));
        assert!(rec.display_name.starts_with("square "));
    }

    token.cancel();
    worker.await.unwrap().unwrap();
    manager.shutdown().await;
    assert_eq!(terminals.0.load(Ordering::SeqCst), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abort_reaches_scheduled_task() {
    let registry = Registry::new();
    let h = registry
        .register(TaskDecl::new("long-poll"), |_: ()| async {
            let done = Arc::new(tokio::sync::Notify::new());
            let d = done.clone();
            get_context()?
                .on_abort(move || {
                    d.notify_one();
                    Ok(())
                })
                .await?;
            tokio::select! {
                _ = done.notified() => {}
                _ = tokio::time::sleep(Duration::from_secs(10)) => {}
            }
            Ok::<_, TaskError>(())
        })
        .unwrap();
    let (tx, rx) = transport::channel(4);
    let manager = TaskManager::builder(registry, Arc::new(MemoryStore::new()))
        .with_config(common::config())
        .with_transport(tx)
        .build();
    let token = CancellationToken::new();
    let worker = tokio::spawn(Worker::new(manager.clone(), rx).run(token.clone()));

    let rec = h.schedule(&manager, (), Options::default()).await.unwrap();
    loop {
        let cur = manager.read(rec.id).await.unwrap();
        if cur.properties.is_abortable() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(manager.request_abort(rec.id).await.unwrap());

    let done = manager
        .wait_for_completion(rec.id, Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Aborted);

    token.cancel();
    worker.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_reports_stuck_runs() {
    let registry = Registry::new();
    let h = registry
        .register(TaskDecl::new("stubborn"), |_: ()| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            anyhow::Ok(())
        })
        .unwrap();
    let (tx, rx) = transport::channel(4);
    let manager = TaskManager::builder(registry, Arc::new(MemoryStore::new()))
        .with_config(Config {
            grace: Duration::from_millis(50),
            ..common::config()
        })
        .with_transport(tx)
        .build();
    let mut events = manager.subscribe();

    let token = CancellationToken::new();
    let worker = tokio::spawn(Worker::new(manager.clone(), rx).run(token.clone()));
    let rec = h.schedule(&manager, (), Options::default()).await.unwrap();

    loop {
        if manager.read(rec.id).await.unwrap().status == TaskStatus::InProgress {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    token.cancel();

    match worker.await.unwrap() {
        Err(RuntimeError::GraceExceeded { stuck, .. }) => assert_eq!(stuck, vec![rec.id]),
        other => panic!("expected grace exceeded, got {other:?}"),
    }

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    assert!(kinds.contains(&EventKind::ShutdownRequested));
    assert!(kinds.contains(&EventKind::GraceExceeded));
}

fn drain_registry() -> (Registry, taskframe::TaskHandle<()>) {
    let registry = Registry::new();
    let h = registry
        .register(TaskDecl::new("drain"), |_: ()| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            anyhow::Ok(())
        })
        .unwrap();
    (registry, h)
}

#[tokio::test]
async fn closed_transport_drains_and_returns() {
    let store = Arc::new(MemoryStore::new());
    let (tx, rx) = transport::channel(4);

    // Producer side: schedules, then goes away with the only sender.
    let (registry, h) = drain_registry();
    let producer = TaskManager::builder(registry, store.clone())
        .with_config(common::config())
        .with_transport(tx)
        .build();
    let rec = h.schedule(&producer, (), Options::default()).await.unwrap();
    producer.shutdown().await;
    drop(producer);

    let (registry, _) = drain_registry();
    let consumer = TaskManager::builder(registry, store.clone())
        .with_config(common::config())
        .build();
    Worker::new(consumer, rx)
        .run(CancellationToken::new())
        .await
        .unwrap();

    let rec = store.read(rec.id).await.unwrap();
    assert_eq!(rec.status, TaskStatus::Success);
}

fn counting_registry(starts: Arc<AtomicUsize>) -> (Registry, taskframe::TaskHandle<u32>) {
    let registry = Registry::new();
    let h = registry
        .register(TaskDecl::new("counted"), move |_: u32| {
            starts.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                anyhow::Ok(())
            }
        })
        .unwrap();
    (registry, h)
}

async fn statuses(store: &MemoryStore) -> Vec<TaskStatus> {
    store.list().await.into_iter().map(|r| r.status).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_worker_starts_no_queued_run() {
    let starts = Arc::new(AtomicUsize::new(0));
    let (registry, h) = counting_registry(starts.clone());
    let store = Arc::new(MemoryStore::new());
    let (tx, rx) = transport::channel(8);
    let manager = TaskManager::builder(registry, store.clone())
        .with_config(Config {
            max_concurrent: 1,
            ..common::config()
        })
        .with_transport(tx)
        .build();

    for n in 0..4 {
        h.schedule(&manager, n, Options::default()).await.unwrap();
    }
    let token = CancellationToken::new();
    let worker = tokio::spawn(Worker::new(manager.clone(), rx).run(token.clone()));

    tokio::time::sleep(Duration::from_millis(30)).await;
    token.cancel();
    worker.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(starts.load(Ordering::SeqCst), 1);

    let all = statuses(&store).await;
    assert_eq!(all.iter().filter(|s| **s == TaskStatus::Success).count(), 1);
    assert_eq!(all.iter().filter(|s| **s == TaskStatus::Aborted).count(), 3);
}

#[tokio::test]
async fn queued_ids_are_aborted_on_shutdown() {
    let starts = Arc::new(AtomicUsize::new(0));
    let (registry, h) = counting_registry(starts.clone());
    let store = Arc::new(MemoryStore::new());
    let (tx, rx) = transport::channel(8);
    let manager = TaskManager::builder(registry, store.clone())
        .with_config(common::config())
        .with_transport(tx)
        .build();
    let mut events = manager.subscribe();

    let a = h.schedule(&manager, 1, Options::default()).await.unwrap();
    let b = h.schedule(&manager, 2, Options::default()).await.unwrap();

    let token = CancellationToken::new();
    token.cancel();
    Worker::new(manager.clone(), rx).run(token).await.unwrap();

    assert_eq!(starts.load(Ordering::SeqCst), 0);
    let mut seen = Vec::new();
    while let Ok(ev) = events.try_recv() {
        seen.push(ev);
    }
    for id in [a.id, b.id] {
        assert_eq!(manager.read(id).await.unwrap().status, TaskStatus::Aborted);
        assert!(seen.iter().any(|ev| ev.task_id == Some(id) && ev.kind == EventKind::TaskAborted));
    }
}
