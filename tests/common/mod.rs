#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use taskframe::{
    Config, Event, ExecutionMode, MemoryStore, NewTask, Properties, Registry, Scope, TaskId,
    TaskManager, TaskStore,
};
use tokio::sync::broadcast;

/// Fast polling, no store retries.
pub fn config() -> Config {
    Config {
        abort_poll_interval: Duration::from_millis(20),
        completion_poll_interval: Duration::from_millis(20),
        store_attempts: 1,
        grace: Duration::from_secs(2),
        ..Config::default()
    }
}

pub fn manager(registry: Registry) -> (TaskManager, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let manager = TaskManager::builder(registry, store.clone())
        .with_config(config())
        .build();
    (manager, store)
}

/// Inserts a PENDING record directly, as an external producer would.
pub async fn insert(store: &MemoryStore, name: &str, args: Value) -> TaskId {
    insert_with(store, name, args, Properties::new()).await
}

pub async fn insert_with(
    store: &MemoryStore,
    name: &str,
    args: Value,
    properties: Properties,
) -> TaskId {
    store
        .create(NewTask {
            name: name.to_string(),
            display_name: name.to_string(),
            scope: Scope::Private,
            task_key: None,
            owner: None,
            args,
            properties,
            execution_mode: ExecutionMode::Async,
        })
        .await
        .unwrap()
        .into_record()
        .id
}

/// Events already published for `id`, in order.
pub fn drain_for(rx: &mut broadcast::Receiver<Event>, id: TaskId) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        if ev.task_id == Some(id) {
            out.push(ev);
        }
    }
    out
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
