//! # Runtime events emitted by the manager, runners, watchers and workers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Record events**: creation, deduplication, hand-off to a worker
//! - **Execution events**: start, progress, abort detection, handler failures
//! - **Terminal events**: one per record reaching a terminal status
//! - **Runtime events**: subscriber health and worker shutdown
//!
//! The [`Event`] struct carries metadata such as the record id, task name,
//! status and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use taskframe::{Event, EventKind, TaskId, TaskStatus};
//!
//! let id = TaskId::new();
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task_id(id)
//!     .with_task("reports.render")
//!     .with_status(TaskStatus::Failure)
//!     .with_reason("boom");
//!
//! assert!(ev.is_terminal());
//! assert_eq!(ev.task_id, Some(id));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::record::{TaskId, TaskStatus};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Worker shutdown events ===
    /// Worker shutdown requested (signal or token).
    ShutdownRequested,

    /// All in-flight executions finished within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some executions were still running.
    GraceExceeded,

    // === Record events ===
    /// A new PENDING record was created.
    ///
    /// Sets: `task_id`, `task`, `status`.
    TaskCreated,

    /// Creation collapsed onto an existing non-terminal record (dedup key).
    ///
    /// Sets: `task_id` (existing record), `task`, `status`.
    TaskDeduplicated,

    /// Record handed to the transport.
    ///
    /// Sets: `task_id`, `task`.
    TaskEnqueued,

    /// A delivery found the record already claimed or terminal; nothing ran.
    ///
    /// Sets: `task_id`, `status`.
    TaskSkipped,

    // === Execution events ===
    /// Runner claimed the record; the body is about to run.
    ///
    /// Sets: `task_id`, `task`, `timeout_ms` (if armed).
    TaskStarted,

    /// `update_task` committed a write.
    ///
    /// Sets: `task_id`, `task`.
    TaskProgress,

    /// An external controller requested an abort.
    ///
    /// Sets: `task_id`.
    AbortRequested,

    /// The abort watcher observed an abort request or an elapsed deadline.
    ///
    /// Sets: `task_id`, `task`, `reason` (`"abort"` or `"timeout"`).
    AbortDetected,

    /// A cleanup or abort handler failed; the failure was swallowed.
    ///
    /// Sets: `task_id`, `task`, `reason` (`"cleanup: ..."` / `"abort: ..."`).
    HandlerFailed,

    // === Terminal events ===
    /// Record ended in SUCCESS.
    TaskSucceeded,

    /// Record ended in FAILURE.
    ///
    /// Sets: `reason` (error message).
    TaskFailed,

    /// Record ended in ABORTED.
    TaskAborted,

    /// Record ended in TIMED_OUT.
    TaskTimedOut,
}

impl EventKind {
    /// Terminal event kind for a terminal status (`None` otherwise).
    pub fn for_terminal(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::Success => Some(EventKind::TaskSucceeded),
            TaskStatus::Failure => Some(EventKind::TaskFailed),
            TaskStatus::Aborted => Some(EventKind::TaskAborted),
            TaskStatus::TimedOut => Some(EventKind::TaskTimedOut),
            _ => None,
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Record the event is about.
    pub task_id: Option<TaskId>,
    /// Registered task name (or subscriber name for subscriber events).
    pub task: Option<Arc<str>>,
    /// Record status at the time of the event.
    pub status: Option<TaskStatus>,
    /// Human-readable reason (errors, abort cause, overflow details).
    pub reason: Option<Arc<str>>,
    /// Armed timeout in milliseconds.
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task_id: None,
            task: None,
            status: None,
            reason: None,
            timeout_ms: None,
        }
    }

    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    #[inline]
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for the four terminal kinds.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskSucceeded
                | EventKind::TaskFailed
                | EventKind::TaskAborted
                | EventKind::TaskTimedOut
        )
    }

    /// True if this is a terminal event for `id`.
    #[inline]
    pub fn is_terminal_for(&self, id: TaskId) -> bool {
        self.is_terminal() && self.task_id == Some(id)
    }
}
