//! # Task record and scheduling options.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::properties::{ErrorInfo, Properties};
use super::status::{ExecutionMode, Scope, TaskStatus};

/// Stable unique identifier of a task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generates a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent descriptor of one execution of a registered task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    /// Registered task name.
    pub name: String,
    /// Human label.
    pub display_name: String,
    pub scope: Scope,
    pub status: TaskStatus,
    /// Dedup key.
    pub task_key: Option<String>,
    /// Owner principal.
    pub owner: Option<String>,
    /// Serialized arguments.
    pub args: Value,
    /// Shallow-merged payload reported by the body.
    pub payload: Map<String, Value>,
    pub properties: Properties,
    /// Set by an external controller; observed by the abort watcher.
    pub abort_requested: bool,
    pub execution_mode: ExecutionMode,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Error descriptor, if the body (or startup) failed.
    pub fn error(&self) -> Option<ErrorInfo> {
        ErrorInfo::from_properties(&self.properties)
    }

    /// Resolved timeout stored on the record.
    ///
    /// Values that do not fit a `Duration` read as no timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.properties
            .timeout()
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// Per-schedule overrides supplied by the caller.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use taskframe::Options;
///
/// let opts = Options::new().task_key("report-42").timeout(Duration::from_secs(30));
/// assert_eq!(opts.task_key.as_deref(), Some("report-42"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Dedup key.
    pub task_key: Option<String>,
    /// Display name override.
    pub task_name: Option<String>,
    /// Overrides the registered timeout.
    pub timeout: Option<Duration>,
    /// Principal recorded on the row.
    pub owner: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_key(mut self, key: impl Into<String>) -> Self {
        self.task_key = Some(key.into());
        self
    }

    pub fn task_name(mut self, name: impl Into<String>) -> Self {
        self.task_name = Some(name.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{keys, PropertyPatch};

    fn with_timeout(secs: f64) -> TaskRecord {
        let mut properties = Properties::new();
        properties.apply(&PropertyPatch::new().with(keys::TIMEOUT, secs));
        TaskRecord {
            id: TaskId::new(),
            name: "t".into(),
            display_name: "t".into(),
            scope: Scope::Private,
            status: TaskStatus::Pending,
            task_key: None,
            owner: None,
            args: Value::Null,
            payload: Map::new(),
            properties,
            abort_requested: false,
            execution_mode: ExecutionMode::Async,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    #[test]
    fn test_timeout_reads_seconds() {
        assert_eq!(with_timeout(1.5).timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(with_timeout(0.0).timeout(), None);
        assert_eq!(with_timeout(-3.0).timeout(), None);
    }

    #[test]
    fn test_unrepresentable_timeout_is_none() {
        assert_eq!(with_timeout(1e30).timeout(), None);
        assert_eq!(with_timeout(f64::MAX).timeout(), None);
    }
}
