//! Error types used by the taskframe runtime, its store and its tasks.
//!
//! This module defines the error enums surfaced to callers:
//!
//! - [`TaskError`]: errors raised to callers of the declaration, context and manager APIs.
//! - [`RegistryError`]: registration failures (duplicate names, sealed registry).
//! - [`StoreError`]: failures reported by a [`TaskStore`](crate::TaskStore).
//! - [`TransportError`]: failures handing a record to a worker.
//! - [`RuntimeError`]: failures of the worker runtime itself.
//!
//! Each type provides `as_label` (stable snake_case, for logs/metrics).
//! Errors raised *inside* a task body are never surfaced through these types;
//! they are captured on the task record instead.

use std::time::Duration;

use thiserror::Error;

use crate::record::{TaskId, TaskStatus};

/// # Errors produced by the worker runtime.
///
/// These represent failures in the execution runtime itself,
/// such as a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some executions were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of the records whose runners did not finish in time.
        stuck: Vec<TaskId>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskframe::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors produced while registering task declarations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A task with the same name is already registered.
    #[error("task already registered: {name}")]
    AlreadyRegistered {
        /// The conflicting name.
        name: String,
    },

    /// The registry was sealed by a running manager; no more registrations.
    #[error("registry is sealed; tasks must be registered before the manager starts")]
    Sealed,

    /// No explicit name was given and none could be derived from the callable.
    #[error("cannot derive a task name from `{type_name}`; pass one explicitly")]
    Unnamed {
        /// Type name of the callable.
        type_name: &'static str,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::AlreadyRegistered { .. } => "registry_already_registered",
            RegistryError::Sealed => "registry_sealed",
            RegistryError::Unnamed { .. } => "registry_unnamed",
        }
    }
}

/// # Errors reported by a task store.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id.
    #[error("task {id} not found")]
    NotFound {
        /// The requested id.
        id: TaskId,
    },

    /// Write rejected because the record is already terminal.
    #[error("task {id} is terminal ({status})")]
    Terminal {
        /// The record id.
        id: TaskId,
        /// Its terminal status.
        status: TaskStatus,
    },

    /// The requested status change is not an edge of the state machine.
    #[error("invalid transition {from} -> {to} for task {id}")]
    InvalidTransition {
        /// The record id.
        id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// Backend could not be reached or could not commit.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Backend-provided detail.
        reason: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "store_not_found",
            StoreError::Terminal { .. } => "store_terminal",
            StoreError::InvalidTransition { .. } => "store_invalid_transition",
            StoreError::Unavailable { .. } => "store_unavailable",
        }
    }

    /// Indicates whether retrying the same operation may succeed.
    ///
    /// Only [`StoreError::Unavailable`] is transient.
    ///
    /// # Example
    /// ```
    /// use taskframe::StoreError;
    ///
    /// let transient = StoreError::Unavailable { reason: "connection reset".into() };
    /// assert!(transient.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// # Errors produced while handing a record to a worker.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The receiving side is gone.
    #[error("transport closed")]
    Closed,

    /// The queue is at capacity (non-blocking enqueue only).
    #[error("transport queue full")]
    Full,

    /// `schedule` was used on a manager built without a transport.
    #[error("no transport configured")]
    Unconfigured,
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Closed => "transport_closed",
            TransportError::Full => "transport_full",
            TransportError::Unconfigured => "transport_unconfigured",
        }
    }
}

/// # Errors raised to callers of the task API.
///
/// Body failures are *not* represented here: the synchronous and asynchronous
/// paths both report them through the returned [`TaskRecord`](crate::TaskRecord).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Registration failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Arguments could not be serialized for the record.
    #[error("invalid task arguments: {reason}")]
    Arguments {
        /// Serializer message.
        reason: String,
    },

    /// `update_task` received a progress value outside the accepted shapes.
    #[error("invalid progress: {reason}")]
    InvalidProgress {
        /// What was wrong with the value.
        reason: String,
    },

    /// `update_task` received a payload that is not a JSON object.
    #[error("invalid payload: expected a JSON object")]
    InvalidPayload,

    /// `get_context()` was called outside a runner-managed execution.
    #[error("no active task")]
    NoActiveTask,

    /// The store failed (after its own retries).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The record could not be handed to a worker.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `wait_for_completion` gave up before the record became terminal.
    #[error("timed out after {timeout:?} waiting for task {id}")]
    WaitTimeout {
        /// The awaited record.
        id: TaskId,
        /// The wait budget.
        timeout: Duration,
    },
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskframe::TaskError;
    ///
    /// assert_eq!(TaskError::NoActiveTask.as_label(), "task_no_active_task");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Registry(e) => e.as_label(),
            TaskError::Arguments { .. } => "task_invalid_arguments",
            TaskError::InvalidProgress { .. } => "task_invalid_progress",
            TaskError::InvalidPayload => "task_invalid_payload",
            TaskError::NoActiveTask => "task_no_active_task",
            TaskError::Store(e) => e.as_label(),
            TaskError::Transport(e) => e.as_label(),
            TaskError::WaitTimeout { .. } => "task_wait_timeout",
        }
    }

    pub(crate) fn invalid_progress(reason: impl Into<String>) -> Self {
        TaskError::InvalidProgress {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_retryable_only_when_unavailable() {
        let id = TaskId::new();
        assert!(StoreError::Unavailable { reason: "x".into() }.is_retryable());
        assert!(!StoreError::NotFound { id }.is_retryable());
        assert!(!StoreError::Terminal {
            id,
            status: TaskStatus::Success
        }
        .is_retryable());
    }

    #[test]
    fn test_task_error_labels_delegate() {
        let err: TaskError = RegistryError::Sealed.into();
        assert_eq!(err.as_label(), "registry_sealed");
        let err: TaskError = StoreError::Unavailable { reason: "down".into() }.into();
        assert_eq!(err.as_label(), "store_unavailable");
    }

    #[test]
    fn test_registry_error_messages() {
        let err = RegistryError::AlreadyRegistered { name: "t1".into() };
        assert_eq!(err.to_string(), "task already registered: t1");
        assert_eq!(TaskError::NoActiveTask.to_string(), "no active task");
    }
}
