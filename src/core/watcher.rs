//! # Abort watcher.
//!
//! Started on the first `on_abort` registration of an execution. It waits for
//! the first of:
//! - the execution's deadline (cause: timeout),
//! - an `AbortRequested` event for its record on the bus (cause: external abort),
//! - a poll tick whose store read shows `abort_requested` (same cause; covers
//!   requests made through another process or a lagged receiver),
//! - the stop token (runner exit).
//!
//! On the first positive observation it moves the record to ABORTING and runs
//! the abort handlers in registration order, then exits. It never touches the
//! body future.
//!
//! ## Abort phase
//! The runner and the watcher coordinate through a `watch` channel holding an
//! [`AbortState`]:
//!
//! ```text
//!            begin (not completed)          handlers done
//!   Idle ──────────────────────► Running ─────────────────► Accepted(cause)
//!                                   │
//!                                   │ body completed before handlers started
//!                                   ▼
//!                                Dropped
//! ```
//!
//! The runner marks the state `completed` when the body returns and then waits
//! until the phase is not `Running`. `begin` is refused once `completed` is set,
//! so an abort observed after the body finished never reaches the record.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::context::Context;
use crate::events::{Event, EventKind};
use crate::record::TaskStatus;

/// What triggered an abort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AbortCause {
    External,
    Timeout,
}

impl AbortCause {
    /// Terminal status of an accepted abort.
    pub(crate) fn status(self) -> TaskStatus {
        match self {
            AbortCause::External => TaskStatus::Aborted,
            AbortCause::Timeout => TaskStatus::TimedOut,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AbortCause::External => "abort",
            AbortCause::Timeout => "timeout",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AbortPhase {
    Idle,
    Running(AbortCause),
    Accepted(AbortCause),
    Dropped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct AbortState {
    pub(crate) phase: AbortPhase,
    /// Body returned (or panicked).
    pub(crate) completed: bool,
}

/// Shared abort state of one execution.
pub(crate) struct AbortSwitch {
    tx: watch::Sender<AbortState>,
}

impl AbortSwitch {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(AbortState {
            phase: AbortPhase::Idle,
            completed: false,
        });
        Self { tx }
    }

    pub(crate) fn state(&self) -> AbortState {
        *self.tx.borrow()
    }

    /// Idle → Running(cause); refused once completed or already fired.
    fn begin(&self, cause: AbortCause) -> bool {
        self.tx.send_if_modified(|s| {
            if s.completed || s.phase != AbortPhase::Idle {
                return false;
            }
            s.phase = AbortPhase::Running(cause);
            true
        })
    }

    fn set_phase(&self, phase: AbortPhase) {
        self.tx.send_modify(|s| s.phase = phase);
    }

    /// Marks the body as finished and waits for in-flight handlers.
    pub(crate) async fn complete(&self) -> AbortState {
        self.tx.send_modify(|s| s.completed = true);
        let mut rx = self.tx.subscribe();
        let settled = rx
            .wait_for(|s| !matches!(s.phase, AbortPhase::Running(_)))
            .await
            .map(|s| *s);
        settled.unwrap_or_else(|_| self.state())
    }
}

/// Watcher task body.
pub(crate) async fn watch(
    ctx: Context,
    stop: CancellationToken,
    poll: Duration,
    deadline: Option<Instant>,
) {
    let mut tick = tokio::time::interval(poll);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut events = ctx.bus().subscribe_task(ctx.task_id());

    let cause = loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            _ = until(deadline) => break AbortCause::Timeout,
            Some(ev) = events.next() => {
                if ev.kind == EventKind::AbortRequested {
                    break AbortCause::External;
                }
            }
            _ = tick.tick() => match ctx.store().read(ctx.task_id()).await {
                Ok(rec) if rec.abort_requested => break AbortCause::External,
                Ok(rec) if rec.is_terminal() => return,
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    task_id = %ctx.task_id(),
                    error = %e,
                    "abort watcher could not read task"
                ),
            }
        }
    };
    fire(&ctx, cause).await;
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Runs the abort sequence for `cause` unless the body already completed.
async fn fire(ctx: &Context, cause: AbortCause) {
    let switch = ctx.abort_switch();
    if !switch.begin(cause) {
        return;
    }

    let id = ctx.task_id();
    tracing::info!(task_id = %id, task = %ctx.task_name(), cause = cause.as_str(), "abort detected");
    if let Err(e) = ctx
        .store()
        .set_status(id, TaskStatus::Aborting, None, Utc::now())
        .await
    {
        tracing::warn!(task_id = %id, error = %e, "failed to record ABORTING");
    }
    ctx.bus().publish(
        Event::new(EventKind::AbortDetected)
            .with_task_id(id)
            .with_task(ctx.task_name())
            .with_status(TaskStatus::Aborting)
            .with_reason(cause.as_str()),
    );

    // The body may have returned while ABORTING was being written.
    if switch.state().completed {
        switch.set_phase(AbortPhase::Dropped);
        return;
    }

    for handler in ctx.take_abort_handlers() {
        ctx.run_handler("abort", handler);
    }
    switch.set_phase(AbortPhase::Accepted(cause));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_begin_refused_after_completion() {
        let switch = AbortSwitch::new();
        let state = switch.complete().await;
        assert_eq!(state.phase, AbortPhase::Idle);
        assert!(!switch.begin(AbortCause::Timeout));
    }

    #[tokio::test]
    async fn test_first_cause_wins() {
        let switch = AbortSwitch::new();
        assert!(switch.begin(AbortCause::External));
        assert!(!switch.begin(AbortCause::Timeout));
        switch.set_phase(AbortPhase::Accepted(AbortCause::External));
        let state = switch.complete().await;
        assert_eq!(state.phase, AbortPhase::Accepted(AbortCause::External));
        assert_eq!(AbortCause::External.status(), TaskStatus::Aborted);
    }

    #[tokio::test]
    async fn test_complete_waits_for_running_handlers() {
        let switch = std::sync::Arc::new(AbortSwitch::new());
        assert!(switch.begin(AbortCause::Timeout));

        let waiter = {
            let switch = switch.clone();
            tokio::spawn(async move { switch.complete().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        switch.set_phase(AbortPhase::Accepted(AbortCause::Timeout));
        let state = waiter.await.unwrap();
        assert_eq!(state.phase, AbortPhase::Accepted(AbortCause::Timeout));
        assert!(state.completed);
    }
}
