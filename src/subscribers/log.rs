//! # LogWriter: renders runtime events through `tracing`.
//!
//! Terminal failures are logged at `warn`, subscriber and shutdown problems at
//! `error`, everything else at `info`/`debug`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO taskframe: task created task_id=6f1c.. task="reports.render"
//! INFO taskframe: task started task_id=6f1c.. task="reports.render" timeout_ms=30000
//! INFO taskframe: abort detected task_id=6f1c.. reason="timeout"
//! INFO taskframe: task timed out task_id=6f1c..
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let id = e.task_id.map(|id| id.to_string());
        let id = id.as_deref().unwrap_or("-");
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TaskCreated => {
                tracing::info!(task_id = id, task, "task created")
            }
            EventKind::TaskDeduplicated => {
                tracing::info!(task_id = id, task, "task deduplicated onto existing record")
            }
            EventKind::TaskEnqueued => tracing::debug!(task_id = id, task, "task enqueued"),
            EventKind::TaskSkipped => {
                tracing::debug!(task_id = id, status = ?e.status, "delivery skipped")
            }
            EventKind::TaskStarted => {
                tracing::info!(task_id = id, task, timeout_ms = ?e.timeout_ms, "task started")
            }
            EventKind::TaskProgress => tracing::debug!(task_id = id, task, "task updated"),
            EventKind::AbortRequested => tracing::info!(task_id = id, "abort requested"),
            EventKind::AbortDetected => {
                tracing::info!(task_id = id, task, reason, "abort detected")
            }
            EventKind::HandlerFailed => {
                tracing::warn!(task_id = id, task, reason, "handler failed")
            }
            EventKind::TaskSucceeded => tracing::info!(task_id = id, task, "task succeeded"),
            EventKind::TaskFailed => {
                tracing::warn!(task_id = id, task, error = reason, "task failed")
            }
            EventKind::TaskAborted => tracing::info!(task_id = id, task, "task aborted"),
            EventKind::TaskTimedOut => tracing::info!(task_id = id, task, "task timed out"),
            EventKind::SubscriberOverflow => {
                tracing::warn!(subscriber = task, reason, "subscriber overflow")
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(subscriber = task, info = reason, "subscriber panicked")
            }
            EventKind::ShutdownRequested => tracing::info!("shutdown requested"),
            EventKind::AllStoppedWithin => tracing::info!("all executions stopped within grace"),
            EventKind::GraceExceeded => {
                tracing::error!(stuck = reason, "grace exceeded")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
