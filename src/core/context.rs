//! # Per-execution context.
//!
//! A [`Context`] is the write-only handle a running body uses to report on its
//! own record. It is created by the runner, installed as the ambient context
//! (see [`get_context`](crate::get_context)) and torn down when the execution
//! ends.
//!
//! ```text
//! body ── update_task(progress, payload) ──► TaskStore::update (one atomic write)
//!      ── on_cleanup(h) ──► cleanup stack ──► run LIFO by the runner at exit
//!      ── on_abort(h)   ──► abort handlers ─► run FIFO by the abort watcher
//!                          (first call: is_abortable=true, watcher started)
//! ```
//!
//! Handler failures (`Err` or panic) are logged, reported as `HandlerFailed`
//! events and swallowed; they never change the task's terminal status.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::{ambient, panic_message, watcher};
use crate::core::watcher::AbortSwitch;
use crate::error::{StoreError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::record::{keys, Progress, PropertyPatch, TaskId};
use crate::store::{StoreRef, TaskPatch};

/// Zero-argument callback registered through [`Context::on_cleanup`] or [`Context::on_abort`].
pub type Handler = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

struct Watcher {
    stop: CancellationToken,
    join: JoinHandle<()>,
}

struct Inner {
    id: TaskId,
    name: Arc<str>,
    store: StoreRef,
    bus: Bus,
    cfg: Arc<Config>,
    deadline: Option<Instant>,
    cleanup: Mutex<Vec<Handler>>,
    abort_handlers: Mutex<Vec<Handler>>,
    abortable: AtomicBool,
    abort: AbortSwitch,
    watcher: Mutex<Option<Watcher>>,
    store_failure: Mutex<Option<StoreError>>,
}

/// Handle bound to one execution of one task record.
///
/// Cheap to clone; clones refer to the same execution.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    pub(crate) fn new(
        id: TaskId,
        name: Arc<str>,
        store: StoreRef,
        bus: Bus,
        cfg: Arc<Config>,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                name,
                store,
                bus,
                cfg,
                deadline,
                cleanup: Mutex::new(Vec::new()),
                abort_handlers: Mutex::new(Vec::new()),
                abortable: AtomicBool::new(false),
                abort: AbortSwitch::new(),
                watcher: Mutex::new(None),
                store_failure: Mutex::new(None),
            }),
        }
    }

    /// Id of the record this execution drives.
    pub fn task_id(&self) -> TaskId {
        self.inner.id
    }

    /// Registered name of the running task.
    pub fn task_name(&self) -> &str {
        &self.inner.name
    }

    /// Reports progress and/or merges `payload` into the record in one write.
    ///
    /// `payload` must be a JSON object; its keys overwrite existing payload
    /// keys and leave the others untouched. Invalid input is rejected before
    /// anything is written. A store failure is returned to the caller and the
    /// execution is recorded as FAILURE even if the body recovers.
    ///
    /// ```no_run
    /// # async fn body() -> Result<(), taskframe::TaskError> {
    /// use serde_json::json;
    /// use taskframe::{get_context, Progress};
    ///
    /// let ctx = get_context()?;
    /// ctx.update_task(Some(Progress::Of { current: 3, total: 10 }), Some(json!({"rows": 300})))
    ///     .await?;
    /// # Ok(()) }
    /// ```
    pub async fn update_task(
        &self,
        progress: Option<Progress>,
        payload: Option<Value>,
    ) -> Result<(), TaskError> {
        let mut patch = TaskPatch::default();
        if let Some(progress) = progress {
            patch.properties = progress.to_patch()?;
        }
        match payload {
            None => {}
            Some(Value::Object(map)) => patch.payload = map,
            Some(_) => return Err(TaskError::InvalidPayload),
        }
        if patch.is_empty() {
            return Ok(());
        }

        self.write(patch).await?;
        self.inner.bus.publish(
            Event::new(EventKind::TaskProgress)
                .with_task_id(self.inner.id)
                .with_task(Arc::clone(&self.inner.name)),
        );
        Ok(())
    }

    /// Registers a handler run at the end of the execution, whatever the outcome.
    ///
    /// Handlers run last-registered-first.
    pub fn on_cleanup<H>(&self, handler: H)
    where
        H: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        lock(&self.inner.cleanup).push(Box::new(handler));
    }

    /// Registers a handler run when an abort or timeout is observed.
    ///
    /// The first registration marks the record `is_abortable` and starts the
    /// abort watcher. Handlers run in registration order, at most once.
    /// Handlers registered after the abort was observed are not run.
    pub async fn on_abort<H>(&self, handler: H) -> Result<(), TaskError>
    where
        H: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        lock(&self.inner.abort_handlers).push(Box::new(handler));
        if self.inner.abortable.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let patch = TaskPatch {
            properties: PropertyPatch::new().with(keys::IS_ABORTABLE, true),
            ..TaskPatch::default()
        };
        let written = self.write(patch).await;
        self.start_watcher();
        written
    }

    async fn write(&self, patch: TaskPatch) -> Result<(), TaskError> {
        match self.inner.store.update(self.inner.id, patch).await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(task_id = %self.inner.id, error = %e, "task update failed");
                lock(&self.inner.store_failure).get_or_insert_with(|| e.clone());
                Err(TaskError::Store(e))
            }
        }
    }

    fn start_watcher(&self) {
        let stop = CancellationToken::new();
        let join = tokio::spawn(watcher::watch(
            self.clone(),
            stop.clone(),
            self.inner.cfg.abort_poll_interval_clamped(),
            self.inner.deadline,
        ));
        *lock(&self.inner.watcher) = Some(Watcher { stop, join });
    }

    pub(crate) fn store(&self) -> &StoreRef {
        &self.inner.store
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub(crate) fn abort_switch(&self) -> &AbortSwitch {
        &self.inner.abort
    }

    /// True once `on_abort` was called.
    pub(crate) fn is_abortable(&self) -> bool {
        self.inner.abortable.load(Ordering::Acquire)
    }

    pub(crate) fn take_abort_handlers(&self) -> Vec<Handler> {
        std::mem::take(&mut *lock(&self.inner.abort_handlers))
    }

    pub(crate) fn take_store_failure(&self) -> Option<StoreError> {
        lock(&self.inner.store_failure).take()
    }

    /// Runs the cleanup stack, last registered first.
    pub(crate) fn run_cleanup(&self) {
        loop {
            let next = lock(&self.inner.cleanup).pop();
            let Some(handler) = next else { break };
            self.run_handler("cleanup", handler);
        }
    }

    /// Stops the watcher (if any) and waits for it to exit.
    pub(crate) async fn stop_watcher(&self) {
        let watcher = lock(&self.inner.watcher).take();
        if let Some(w) = watcher {
            w.stop.cancel();
            if let Err(e) = w.join.await {
                tracing::warn!(task_id = %self.inner.id, error = %e, "abort watcher exited abnormally");
            }
        }
    }

    /// Invokes one handler inside the ambient scope, swallowing failures.
    pub(crate) fn run_handler(&self, kind: &'static str, handler: Handler) {
        let outcome =
            ambient::sync_scope(self.clone(), || std::panic::catch_unwind(AssertUnwindSafe(handler)));
        let reason = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
        };

        tracing::error!(
            task_id = %self.inner.id,
            task = %self.inner.name,
            handler = kind,
            error = %reason,
            "handler failed"
        );
        self.inner.bus.publish(
            Event::new(EventKind::HandlerFailed)
                .with_task_id(self.inner.id)
                .with_task(Arc::clone(&self.inner.name))
                .with_reason(format!("{kind}: {reason}")),
        );
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("task_id", &self.inner.id)
            .field("task", &self.inner.name)
            .field("abortable", &self.is_abortable())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
