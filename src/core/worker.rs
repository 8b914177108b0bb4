//! # Worker: executes scheduled records.
//!
//! A [`Worker`] pulls record ids from a [`TaskReceiver`] and runs each one
//! through the manager's [`Runner`](crate::Runner) on its own tokio task.
//!
//! ```text
//! permit? ─► TaskReceiver::recv ──► JoinSet::spawn(Runner::run(id), permit)
//!        │
//!   cancel / signal ──► ShutdownRequested
//!                        ├─► queued ids: request_abort + Runner::run → ABORTED
//!                        └─► wait in-flight runs up to cfg.grace
//!                              ├─ all joined → AllStoppedWithin, Ok(())
//!                              └─ timeout    → GraceExceeded, Err(RuntimeError::GraceExceeded)
//! ```
//!
//! `Config::max_concurrent` caps how many runs execute at once; an id is only
//! taken off the queue once a slot is free, so the queue keeps its backpressure.
//! Ids still queued when the worker is cancelled are aborted (PENDING → ABORTED)
//! before the grace wait starts; none of their bodies run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use super::manager::TaskManager;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Event, EventKind};
use crate::record::TaskId;
use crate::transport::TaskReceiver;

/// Ids of runs in flight, for the grace-exceeded report.
#[derive(Clone, Default)]
struct InFlight(Arc<Mutex<HashSet<TaskId>>>);

impl InFlight {
    fn with<R>(&self, f: impl FnOnce(&mut HashSet<TaskId>) -> R) -> R {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn snapshot(&self) -> Vec<TaskId> {
        let mut ids = self.with(|ids| ids.iter().copied().collect::<Vec<_>>());
        ids.sort();
        ids
    }
}

/// Consumes a transport queue and runs each delivered record.
pub struct Worker {
    manager: TaskManager,
    receiver: TaskReceiver,
}

impl Worker {
    pub fn new(manager: TaskManager, receiver: TaskReceiver) -> Self {
        Self { manager, receiver }
    }

    /// Runs until `token` is cancelled or the transport closes.
    ///
    /// On cancellation the worker stops receiving, aborts the ids still
    /// queued and waits up to `Config::grace` for in-flight runs. When the
    /// transport closes, every in-flight run is awaited.
    pub async fn run(mut self, token: CancellationToken) -> Result<(), RuntimeError> {
        let semaphore = self
            .manager
            .config()
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));
        let in_flight = InFlight::default();
        let mut set = JoinSet::new();
        let mut permit: Option<OwnedSemaphorePermit> = None;

        let cancelled = loop {
            // Ids are only taken off the queue with a free slot in hand.
            match &semaphore {
                Some(sem) if permit.is_none() => tokio::select! {
                    biased;
                    _ = token.cancelled() => break true,
                    Some(joined) = set.join_next(), if !set.is_empty() => {
                        log_join(joined);
                        continue;
                    }
                    acquired = Arc::clone(sem).acquire_owned() => match acquired {
                        Ok(p) => permit = Some(p),
                        Err(_) => break true,
                    },
                },
                _ => {}
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break true,
                Some(joined) = set.join_next(), if !set.is_empty() => log_join(joined),
                next = self.receiver.recv() => match next {
                    Some(id) => self.spawn_run(&mut set, id, permit.take(), in_flight.clone()),
                    None => break false,
                },
            }
        };
        drop(permit);

        if !cancelled {
            tracing::info!("transport closed; draining in-flight runs");
            while let Some(joined) = set.join_next().await {
                log_join(joined);
            }
            return Ok(());
        }

        self.receiver.close();
        self.manager
            .bus()
            .publish(Event::new(EventKind::ShutdownRequested));
        self.cancel_queued().await;
        self.wait_all_with_grace(&mut set, &in_flight).await
    }

    /// Like [`run`](Self::run), cancelled by SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere).
    pub async fn run_until_signal(self) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let signals = tokio::spawn(async move {
            match shutdown_signal().await {
                Ok(()) => trigger.cancel(),
                Err(e) => tracing::error!(error = %e, "cannot listen for shutdown signals"),
            }
        });
        let res = self.run(token).await;
        signals.abort();
        res
    }

    fn spawn_run(
        &self,
        set: &mut JoinSet<()>,
        id: TaskId,
        permit: Option<OwnedSemaphorePermit>,
        in_flight: InFlight,
    ) {
        let runner = self.manager.runner();
        in_flight.with(|ids| ids.insert(id));
        set.spawn(async move {
            let _permit = permit;
            if let Err(e) = runner.run(id).await {
                tracing::error!(task_id = %id, error = %e, "task run failed in the store");
            }
            in_flight.with(|ids| ids.remove(&id));
        });
    }

    /// Aborts ids still queued at shutdown so no PENDING record is left without a runner.
    async fn cancel_queued(&mut self) {
        let runner = self.manager.runner();
        while let Some(id) = self.receiver.try_recv() {
            tracing::warn!(task_id = %id, "task still queued at shutdown; aborting");
            let aborted = match self.manager.request_abort(id).await {
                Ok(true) => runner.run(id).await.map(|_| ()).map_err(TaskError::from),
                Ok(false) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = aborted {
                tracing::error!(task_id = %id, error = %e, "failed to abort queued task");
            }
        }
    }

    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<()>,
        in_flight: &InFlight,
    ) -> Result<(), RuntimeError> {
        let grace = self.manager.config().grace;
        let done = async {
            while let Some(joined) = set.join_next().await {
                log_join(joined);
            }
        };

        match tokio::time::timeout(grace, done).await {
            Ok(()) => {
                self.manager
                    .bus()
                    .publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = in_flight.snapshot();
                let listed = stuck
                    .iter()
                    .map(TaskId::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                self.manager
                    .bus()
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(listed));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "task run aborted");
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;
    let name = tokio::select! {
        r = tokio::signal::ctrl_c() => { r?; "SIGINT" }
        _ = term.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    tracing::info!(signal = name, "shutdown signal received");
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "shutdown signal received");
    Ok(())
}
