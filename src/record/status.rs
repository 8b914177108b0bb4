//! # Task status state machine.
//!
//! ```text
//!             ┌──────────► ABORTED
//!             │
//!  PENDING ───┼──────────► FAILURE ◄──────────┐
//!             │                               │
//!             └──► IN_PROGRESS ──► SUCCESS ◄──┤
//!                       │                     │
//!                       └────► ABORTING ──────┤
//!                                 ├─► ABORTED
//!                                 └─► TIMED_OUT
//! ```
//!
//! ## Rules
//! - Terminal statuses (`SUCCESS`, `FAILURE`, `ABORTED`, `TIMED_OUT`) have no outgoing edges.
//! - `PENDING → FAILURE` is taken when the record cannot start (unknown name, bad arguments).
//! - `ABORTING → SUCCESS/FAILURE` is taken when the body finished before the abort was acted on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of one task record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, waiting for a runner.
    Pending,
    /// Claimed by a runner; body executing.
    InProgress,
    /// Abort or timeout observed; abort handlers running.
    Aborting,
    /// Body returned normally.
    Success,
    /// Body failed, or the record could not start.
    Failure,
    /// Cancelled externally.
    Aborted,
    /// Cancelled by its own deadline.
    TimedOut,
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Aborting,
        TaskStatus::Success,
        TaskStatus::Failure,
        TaskStatus::Aborted,
        TaskStatus::TimedOut,
    ];

    /// True for statuses with no outgoing transitions.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Aborted | TaskStatus::TimedOut
        )
    }

    /// True if `self → next` is an edge of the state machine.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Aborted)
                | (Pending, Failure)
                | (InProgress, Success)
                | (InProgress, Failure)
                | (InProgress, Aborting)
                | (Aborting, Aborted)
                | (Aborting, TimedOut)
                | (Aborting, Success)
                | (Aborting, Failure)
        )
    }

    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Aborting => "ABORTING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Aborted => "ABORTED",
            TaskStatus::TimedOut => "TIMED_OUT",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown task status: {s}"))
    }
}

/// Intended visibility class of a task.
///
/// Recorded on every row; enforcement belongs to the access-control layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Owned by the submitting user.
    #[default]
    Private,
    /// Visible to multiple users.
    Shared,
    /// Administrative.
    System,
}

/// How a record reached its runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Handed to a worker through the transport.
    Async,
    /// Executed inline by the caller.
    Sync,
}

impl ExecutionMode {
    /// Stable wire name (`"async"` / `"sync"`).
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Async => "async",
            ExecutionMode::Sync => "sync",
        }
    }
}
