//! # In-process task store.
//!
//! [`MemoryStore`] keeps records in a `HashMap` behind a single async `RwLock`.
//! Each operation holds the write lock for its whole read-modify-write, which
//! gives the per-record transactional guarantees the runtime relies on
//! (dedup on create, atomic claim, atomic patch).
//!
//! Suitable for tests, single-process hosts and as the reference behavior
//! for other backends.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{apply_status, Created, NewTask, TaskPatch, TaskStore};
use crate::error::StoreError;
use crate::record::{ErrorInfo, TaskId, TaskRecord, TaskStatus};

/// Thread-safe in-memory [`TaskStore`].
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, oldest first.
    pub async fn list(&self) -> Vec<TaskRecord> {
        let records = self.records.read().await;
        let mut all: Vec<TaskRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// True if the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create(&self, new: NewTask) -> Result<Created, StoreError> {
        let mut records = self.records.write().await;

        if let Some(key) = new.task_key.as_deref() {
            let existing = records.values().find(|r| {
                !r.status.is_terminal() && r.name == new.name && r.task_key.as_deref() == Some(key)
            });
            if let Some(rec) = existing {
                return Ok(Created::Existing(rec.clone()));
            }
        }

        let id = TaskId::new();
        let record = new.into_record(id, Utc::now());
        records.insert(id, record.clone());
        Ok(Created::New(record))
    }

    async fn claim(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound { id })?;

        if record.status != TaskStatus::Pending || record.abort_requested {
            return Ok(None);
        }
        apply_status(record, TaskStatus::InProgress, None, Utc::now())?;
        Ok(Some(record.clone()))
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<TaskRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound { id })?;

        if record.status.is_terminal() {
            return Err(StoreError::Terminal {
                id,
                status: record.status,
            });
        }
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<ErrorInfo>,
        at: DateTime<Utc>,
    ) -> Result<TaskRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound { id })?;

        apply_status(record, status, error.as_ref(), at)?;
        Ok(record.clone())
    }

    async fn read(&self, id: TaskId) -> Result<TaskRecord, StoreError> {
        let records = self.records.read().await;
        records.get(&id).cloned().ok_or(StoreError::NotFound { id })
    }

    async fn request_abort(&self, id: TaskId) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound { id })?;

        if record.status.is_terminal() {
            return Ok(false);
        }
        record.abort_requested = true;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{keys, ExecutionMode, Properties, PropertyPatch, Scope};
    use serde_json::{json, Map, Value};

    fn new_task(name: &str, key: Option<&str>) -> NewTask {
        NewTask {
            name: name.to_string(),
            display_name: name.to_string(),
            scope: Scope::Private,
            task_key: key.map(str::to_string),
            owner: None,
            args: Value::Null,
            properties: Properties::new(),
            execution_mode: ExecutionMode::Async,
        }
    }

    #[tokio::test]
    async fn test_dedup_returns_existing_non_terminal() {
        let store = MemoryStore::new();
        let first = store.create(new_task("t", Some("K"))).await.unwrap();
        let second = store.create(new_task("t", Some("K"))).await.unwrap();

        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(first.record().id, second.record().id);
        assert_eq!(store.len().await, 1);

        // Same key under another name is a different task.
        let other = store.create(new_task("u", Some("K"))).await.unwrap();
        assert!(other.is_new());
    }

    #[tokio::test]
    async fn test_dedup_ignores_terminal_records() {
        let store = MemoryStore::new();
        let first = store.create(new_task("t", Some("K"))).await.unwrap().into_record();
        store
            .set_status(first.id, TaskStatus::Aborted, None, Utc::now())
            .await
            .unwrap();

        let second = store.create(new_task("t", Some("K"))).await.unwrap();
        assert!(second.is_new());
        assert_ne!(second.record().id, first.id);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let store = MemoryStore::new();
        let rec = store.create(new_task("t", None)).await.unwrap().into_record();

        let claimed = store.claim(rec.id).await.unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);
        assert!(claimed.started_at.is_some());
        assert!(store.claim(rec.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_refuses_abort_requested() {
        let store = MemoryStore::new();
        let rec = store.create(new_task("t", None)).await.unwrap().into_record();
        assert!(store.request_abort(rec.id).await.unwrap());
        assert!(store.claim(rec.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_and_rejects_terminal() {
        let store = MemoryStore::new();
        let rec = store.create(new_task("t", None)).await.unwrap().into_record();

        let mut payload = Map::new();
        payload.insert("a".into(), json!(1));
        store
            .update(
                rec.id,
                TaskPatch {
                    properties: PropertyPatch::new().with("custom", "x"),
                    payload,
                },
            )
            .await
            .unwrap();

        let mut payload = Map::new();
        payload.insert("b".into(), json!(2));
        let rec2 = store
            .update(
                rec.id,
                TaskPatch {
                    properties: PropertyPatch::new().with(keys::PROGRESS_PERCENT, 0.5),
                    payload,
                },
            )
            .await
            .unwrap();
        assert_eq!(Value::Object(rec2.payload), json!({"a": 1, "b": 2}));
        assert_eq!(rec2.properties.get("custom"), Some(&json!("x")));

        store
            .set_status(rec.id, TaskStatus::Failure, None, Utc::now())
            .await
            .unwrap();
        let err = store.update(rec.id, TaskPatch::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Terminal { .. }));
    }

    #[tokio::test]
    async fn test_set_status_terminal_is_noop_and_edges_enforced() {
        let store = MemoryStore::new();
        let rec = store.create(new_task("t", None)).await.unwrap().into_record();

        let err = store
            .set_status(rec.id, TaskStatus::Success, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        store
            .set_status(rec.id, TaskStatus::Aborted, None, Utc::now())
            .await
            .unwrap();
        let after = store
            .set_status(rec.id, TaskStatus::InProgress, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(after.status, TaskStatus::Aborted);
        assert!(after.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_request_abort_idempotent() {
        let store = MemoryStore::new();
        let rec = store.create(new_task("t", None)).await.unwrap().into_record();
        assert!(store.request_abort(rec.id).await.unwrap());
        assert!(store.request_abort(rec.id).await.unwrap());
        assert!(store.read(rec.id).await.unwrap().abort_requested);

        store
            .set_status(rec.id, TaskStatus::Aborted, None, Utc::now())
            .await
            .unwrap();
        assert!(!store.request_abort(rec.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let store = MemoryStore::new();
        let id = TaskId::new();
        assert_eq!(store.read(id).await.unwrap_err(), StoreError::NotFound { id });
    }
}
