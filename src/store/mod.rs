//! # Persistence boundary.
//!
//! [`TaskStore`] is the repository the runtime writes through. Every operation
//! is transactional with respect to the record it names.
//!
//! ## Contract
//! - `create` inserts a PENDING record, or returns the existing non-terminal
//!   record with the same `(name, task_key)`.
//! - `claim` atomically moves PENDING → IN_PROGRESS (sets `started_at`); it
//!   returns `None` if the record was already claimed, is terminal, or has an
//!   abort request pending.
//! - `update` merges a [`TaskPatch`] into a non-terminal record in one step.
//! - `set_status` writes a status edge (plus error fields and `ended_at` for
//!   terminal statuses). From a terminal status it is a no-op that returns the
//!   record unchanged; any other illegal edge is rejected.
//! - `read` returns the current record.
//! - `request_abort` sets the abort flag on a non-terminal record (idempotent).
//!
//! ## Provided implementations
//! - [`MemoryStore`] in-process store
//! - [`RetryStore`] retries transient failures of an inner store

mod memory;
mod retry;

pub use memory::MemoryStore;
pub use retry::RetryStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::record::{
    ErrorInfo, ExecutionMode, Properties, PropertyPatch, Scope, TaskId, TaskRecord, TaskStatus,
};

/// Shared store handle.
pub type StoreRef = Arc<dyn TaskStore>;

/// Fields supplied when creating a record.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub display_name: String,
    pub scope: Scope,
    pub task_key: Option<String>,
    pub owner: Option<String>,
    pub args: Value,
    pub properties: Properties,
    pub execution_mode: ExecutionMode,
}

impl NewTask {
    /// Materializes the PENDING record for this request.
    pub fn into_record(self, id: TaskId, now: DateTime<Utc>) -> TaskRecord {
        TaskRecord {
            id,
            name: self.name,
            display_name: self.display_name,
            scope: self.scope,
            status: TaskStatus::Pending,
            task_key: self.task_key,
            owner: self.owner,
            args: self.args,
            payload: Map::new(),
            properties: self.properties,
            abort_requested: false,
            execution_mode: self.execution_mode,
            created_at: now,
            started_at: None,
            ended_at: None,
        }
    }
}

/// Result of [`TaskStore::create`].
#[derive(Debug, Clone)]
pub enum Created {
    /// A new PENDING record was inserted.
    New(TaskRecord),
    /// An existing non-terminal record with the same dedup key was returned.
    Existing(TaskRecord),
}

impl Created {
    pub fn record(&self) -> &TaskRecord {
        match self {
            Created::New(r) | Created::Existing(r) => r,
        }
    }

    pub fn into_record(self) -> TaskRecord {
        match self {
            Created::New(r) | Created::Existing(r) => r,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Created::New(_))
    }
}

/// One atomic write issued by a running task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    /// Property keys to set/remove.
    pub properties: PropertyPatch,
    /// Payload keys to shallow-merge.
    pub payload: Map<String, Value>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.payload.is_empty()
    }

    /// Applies the patch to a record in place.
    pub fn apply_to(&self, record: &mut TaskRecord) {
        record.properties.apply(&self.properties);
        for (k, v) in &self.payload {
            record.payload.insert(k.clone(), v.clone());
        }
    }
}

/// Repository of task records.
#[async_trait]
pub trait TaskStore: Send + Sync + 'static {
    /// Inserts a PENDING record, honoring `(name, task_key)` dedup.
    async fn create(&self, new: NewTask) -> Result<Created, StoreError>;

    /// PENDING → IN_PROGRESS, or `None` if the record cannot be claimed.
    async fn claim(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError>;

    /// Atomic merge of properties and payload into a non-terminal record.
    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<TaskRecord, StoreError>;

    /// Status edge, with optional error fields.
    async fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<ErrorInfo>,
        at: DateTime<Utc>,
    ) -> Result<TaskRecord, StoreError>;

    /// Current record.
    async fn read(&self, id: TaskId) -> Result<TaskRecord, StoreError>;

    /// Sets the abort flag; `false` if the record is already terminal.
    async fn request_abort(&self, id: TaskId) -> Result<bool, StoreError>;
}

#[async_trait]
impl<T: TaskStore + ?Sized> TaskStore for Arc<T> {
    async fn create(&self, new: NewTask) -> Result<Created, StoreError> {
        (**self).create(new).await
    }

    async fn claim(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        (**self).claim(id).await
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<TaskRecord, StoreError> {
        (**self).update(id, patch).await
    }

    async fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<ErrorInfo>,
        at: DateTime<Utc>,
    ) -> Result<TaskRecord, StoreError> {
        (**self).set_status(id, status, error, at).await
    }

    async fn read(&self, id: TaskId) -> Result<TaskRecord, StoreError> {
        (**self).read(id).await
    }

    async fn request_abort(&self, id: TaskId) -> Result<bool, StoreError> {
        (**self).request_abort(id).await
    }
}

/// Applies a status edge to an in-memory record, following the [`TaskStore::set_status`] rules.
///
/// Shared by store implementations so every backend enforces the same graph.
pub fn apply_status(
    record: &mut TaskRecord,
    status: TaskStatus,
    error: Option<&ErrorInfo>,
    at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    if record.status.is_terminal() {
        return Ok(false);
    }
    if !record.status.can_transition_to(status) {
        return Err(StoreError::InvalidTransition {
            id: record.id,
            from: record.status,
            to: status,
        });
    }

    record.status = status;
    if status == TaskStatus::InProgress {
        record.started_at = Some(at);
    }
    if let Some(err) = error {
        record.properties.apply(&err.to_patch());
    }
    if status.is_terminal() {
        record.ended_at = Some(at);
    }
    Ok(true)
}
