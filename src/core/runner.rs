//! # Drives one task record from PENDING to a terminal status.
//!
//! ## Procedure
//! ```text
//! read ─► not PENDING ───────────────────────────► TaskSkipped (duplicate delivery)
//!   │
//!   ├─► abort requested ─────────────────────────► ABORTED
//!   ├─► name not registered ─────────────────────► FAILURE (TaskNotRegistered)
//!   ├─► arguments do not decode ─────────────────► FAILURE (InvalidArguments)
//!   └─► claim (PENDING → IN_PROGRESS) ─► lost ──► TaskSkipped
//!          │
//!          ├─► install Context, arm deadline, TaskStarted
//!          ├─► body (panics caught)
//!          ├─► mark completed, wait for in-flight abort handlers
//!          ├─► resolve outcome
//!          ├─► cleanup handlers (LIFO)
//!          ├─► stop abort watcher
//!          └─► terminal status + ended_at + error fields, terminal event
//! ```
//!
//! ## Outcome resolution
//! - abort accepted → ABORTED / TIMED_OUT (error fields only if the body failed)
//! - abort observed after the body completed → dropped, body outcome kept
//! - otherwise SUCCESS, or FAILURE with the body's error
//!
//! A store failure seen by `update_task` counts as a body failure
//! (`exception_type = "StoreError"`) when the body itself returned `Ok`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::time::Instant;

use crate::config::Config;
use crate::core::context::Context;
use crate::core::registry::Registry;
use crate::core::watcher::{AbortPhase, AbortState};
use crate::core::ambient;
use crate::error::StoreError;
use crate::events::{Bus, Event, EventKind};
use crate::record::{ErrorInfo, TaskId, TaskRecord, TaskStatus};
use crate::store::StoreRef;
use crate::tasks::failure;

/// `exception_type` for records whose name is not in the registry.
pub const TASK_NOT_REGISTERED: &str = "TaskNotRegistered";
/// `exception_type` for records whose arguments do not fit the signature.
pub const INVALID_ARGUMENTS: &str = "InvalidArguments";
/// `exception_type` for executions whose progress writes failed.
pub const STORE_ERROR: &str = "StoreError";

/// Executes task records by id.
///
/// Cheap to clone; the same runner is shared by inline calls and workers.
#[derive(Clone)]
pub struct Runner {
    registry: Registry,
    store: StoreRef,
    bus: Bus,
    cfg: Arc<Config>,
}

impl Runner {
    pub(crate) fn new(registry: Registry, store: StoreRef, bus: Bus, cfg: Arc<Config>) -> Self {
        Self {
            registry,
            store,
            bus,
            cfg,
        }
    }

    /// Runs record `id` to completion and returns the record as left by this call.
    ///
    /// Body failures end up on the record; only store failures are returned as `Err`.
    pub async fn run(&self, id: TaskId) -> Result<TaskRecord, StoreError> {
        let record = self.store.read(id).await?;
        if record.status != TaskStatus::Pending {
            self.publish_skipped(&record);
            return Ok(record);
        }
        if record.abort_requested {
            return self.finish(&record, TaskStatus::Aborted, None).await;
        }

        let Some(entry) = self.registry.get(&record.name) else {
            let err = ErrorInfo::new(
                TASK_NOT_REGISTERED,
                format!("task not registered: {}", record.name),
                format!("{TASK_NOT_REGISTERED}: no task named `{}` in the registry", record.name),
            );
            return self.finish(&record, TaskStatus::Failure, Some(err)).await;
        };

        let body = match entry.task.prepare(record.args.clone()) {
            Ok(body) => body,
            Err(reason) => {
                let err = ErrorInfo::new(
                    INVALID_ARGUMENTS,
                    reason.clone(),
                    format!(
                        "{INVALID_ARGUMENTS}: expected `{}`: {reason}",
                        entry.task.args_type()
                    ),
                );
                return self.finish(&record, TaskStatus::Failure, Some(err)).await;
            }
        };

        let Some(record) = self.store.claim(id).await? else {
            // Lost the claim, or an abort arrived in between.
            let current = self.store.read(id).await?;
            if current.status == TaskStatus::Pending && current.abort_requested {
                return self.finish(&current, TaskStatus::Aborted, None).await;
            }
            self.publish_skipped(&current);
            return Ok(current);
        };

        let timeout = record.timeout().or(entry.timeout);
        // An unrepresentable deadline means no deadline.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let name: Arc<str> = Arc::from(record.name.as_str());
        let ctx = Context::new(
            id,
            Arc::clone(&name),
            Arc::clone(&self.store),
            self.bus.clone(),
            Arc::clone(&self.cfg),
            deadline,
        );

        let mut started = Event::new(EventKind::TaskStarted)
            .with_task_id(id)
            .with_task(Arc::clone(&name))
            .with_status(TaskStatus::InProgress);
        if let Some(t) = timeout {
            started = started.with_timeout(t);
        }
        self.bus.publish(started);

        let outcome = ambient::scope(ctx.clone(), AssertUnwindSafe(body).catch_unwind()).await;
        let body_error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(info)) => Some(info),
            Err(panic) => Some(failure::from_panic(panic.as_ref())),
        };

        let abort = ctx.abort_switch().complete().await;
        let failure = body_error.or_else(|| ctx.take_store_failure().map(store_failure));
        let (status, error) = resolve(abort, failure);

        ctx.run_cleanup();
        ctx.stop_watcher().await;

        if ctx.deadline().is_some_and(|d| Instant::now() >= d) && !ctx.is_abortable() {
            tracing::warn!(
                task_id = %id,
                task = %name,
                timeout = ?timeout,
                "task exceeded its timeout but registered no abort handler; outcome kept"
            );
        }

        self.finish(&record, status, error).await
    }

    /// Writes the terminal status and publishes the terminal event.
    async fn finish(
        &self,
        record: &TaskRecord,
        status: TaskStatus,
        error: Option<ErrorInfo>,
    ) -> Result<TaskRecord, StoreError> {
        let reason = error.as_ref().map(|e| e.message.clone());
        let done = self
            .store
            .set_status(record.id, status, error, Utc::now())
            .await?;

        if let Some(kind) = EventKind::for_terminal(done.status) {
            let mut ev = Event::new(kind)
                .with_task_id(done.id)
                .with_task(done.name.as_str())
                .with_status(done.status);
            if let Some(reason) = reason {
                ev = ev.with_reason(reason);
            }
            self.bus.publish(ev);
        }
        Ok(done)
    }

    fn publish_skipped(&self, record: &TaskRecord) {
        tracing::debug!(task_id = %record.id, status = %record.status, "record not pending; skipping");
        self.bus.publish(
            Event::new(EventKind::TaskSkipped)
                .with_task_id(record.id)
                .with_task(record.name.as_str())
                .with_status(record.status),
        );
    }
}

fn store_failure(e: StoreError) -> ErrorInfo {
    ErrorInfo::new(STORE_ERROR, e.to_string(), format!("{STORE_ERROR}: {e:?}"))
}

/// Terminal status and error fields for a finished execution.
fn resolve(abort: AbortState, failure: Option<ErrorInfo>) -> (TaskStatus, Option<ErrorInfo>) {
    match abort.phase {
        AbortPhase::Accepted(cause) => (cause.status(), failure),
        AbortPhase::Idle | AbortPhase::Dropped | AbortPhase::Running(_) => match failure {
            None => (TaskStatus::Success, None),
            Some(err) => (TaskStatus::Failure, Some(err)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::watcher::AbortCause;

    fn state(phase: AbortPhase) -> AbortState {
        AbortState {
            phase,
            completed: true,
        }
    }

    #[test]
    fn test_resolve() {
        let err = ErrorInfo::new("ValueError", "nope", "trace");

        assert_eq!(resolve(state(AbortPhase::Idle), None), (TaskStatus::Success, None));
        assert_eq!(
            resolve(state(AbortPhase::Dropped), Some(err.clone())),
            (TaskStatus::Failure, Some(err.clone()))
        );
        assert_eq!(
            resolve(state(AbortPhase::Accepted(AbortCause::Timeout)), None),
            (TaskStatus::TimedOut, None)
        );
        assert_eq!(
            resolve(state(AbortPhase::Accepted(AbortCause::External)), Some(err.clone())),
            (TaskStatus::Aborted, Some(err))
        );
    }
}
