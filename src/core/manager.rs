//! # TaskManager: record creation, inline execution, scheduling and control.
//!
//! The [`TaskManager`] owns the sealed [`Registry`], the store, the optional
//! transport and the event [`Bus`]. Both execution paths start the same way:
//!
//! ```text
//! call / schedule
//!   └─► serialize args, resolve timeout, build properties
//!        └─► TaskStore::create ──► New(record) ──────┬─► call:     Runner::run(id) inline
//!                 │                                  └─► schedule: Transport::enqueue(id)
//!                 └─► Existing(record) (dedup hit) ──┬─► call:     wait_for_completion(id)
//!                                                    └─► schedule: return record as-is
//! ```
//!
//! ## Example
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), taskframe::TaskError> {
//! use std::sync::Arc;
//! use taskframe::{get_context, MemoryStore, Progress, Registry, TaskDecl, TaskManager, TaskStatus};
//!
//! let registry = Registry::new();
//! let inc = registry.register(TaskDecl::new("t1"), |x: i64| async move {
//!     get_context()?.update_task(Some(Progress::Percent(1.0)), None).await?;
//!     Ok::<_, taskframe::TaskError>(x + 1)
//! })?;
//!
//! let manager = TaskManager::builder(registry, Arc::new(MemoryStore::new())).build();
//! let rec = inc.call(&manager, 41).await?;
//! assert_eq!(rec.status, TaskStatus::Success);
//! assert_eq!(rec.properties.progress_percent(), Some(1.0));
//! # Ok(()) }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::builder::TaskManagerBuilder;
use super::registry::Registry;
use super::runner::Runner;
use crate::config::Config;
use crate::error::{TaskError, TransportError};
use crate::events::{Bus, Event, EventKind, TaskEvents};
use crate::record::{
    keys, ErrorInfo, ExecutionMode, Options, Properties, PropertyPatch, TaskId, TaskRecord,
    TaskStatus,
};
use crate::store::{Created, NewTask, StoreRef};
use crate::subscribers::SubscriberSet;
use crate::tasks::TaskHandle;
use crate::transport::Transport;

/// `exception_type` for scheduled records the transport refused.
pub const TRANSPORT_ERROR: &str = "TransportError";

pub(crate) struct Inner {
    cfg: Arc<Config>,
    registry: Registry,
    store: StoreRef,
    transport: Option<Arc<dyn Transport>>,
    bus: Bus,
    runner: Runner,
    stop: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cfg: Arc<Config>,
        registry: Registry,
        store: StoreRef,
        transport: Option<Arc<dyn Transport>>,
        bus: Bus,
        runner: Runner,
        stop: CancellationToken,
        listener: JoinHandle<()>,
    ) -> Self {
        Self {
            cfg,
            registry,
            store,
            transport,
            bus,
            runner,
            stop,
            listener: Mutex::new(Some(listener)),
        }
    }
}

/// Entry point for running and controlling tasks. Cheap to clone.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    /// Starts building a manager over `registry` and `store`.
    pub fn builder(registry: Registry, store: StoreRef) -> TaskManagerBuilder {
        TaskManagerBuilder::new(registry, store)
    }

    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Store as seen by the runtime (retry wrapper included).
    pub fn store(&self) -> &StoreRef {
        &self.inner.store
    }

    /// Runner sharing this manager's registry, store and bus.
    pub fn runner(&self) -> Runner {
        self.inner.runner.clone()
    }

    /// Receiver of all subsequent runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Runs the task inline; see [`TaskHandle::call`].
    pub async fn call<A: Serialize + Send>(
        &self,
        handle: &TaskHandle<A>,
        args: A,
        options: Options,
    ) -> Result<TaskRecord, TaskError> {
        match self.create(handle, &args, &options, ExecutionMode::Sync).await? {
            Created::New(rec) => Ok(self.inner.runner.run(rec.id).await?),
            Created::Existing(rec) => {
                tracing::info!(
                    task_id = %rec.id,
                    task = %rec.name,
                    "joining existing execution instead of running again"
                );
                self.wait_for_completion(rec.id, None).await
            }
        }
    }

    /// Creates a PENDING record and enqueues it; see [`TaskHandle::schedule`].
    ///
    /// A dedup hit returns the existing record without enqueueing it again.
    /// If the transport refuses the record, it is marked FAILURE
    /// (`exception_type = "TransportError"`) and the error is returned.
    pub async fn schedule<A: Serialize + Send>(
        &self,
        handle: &TaskHandle<A>,
        args: A,
        options: Options,
    ) -> Result<TaskRecord, TaskError> {
        let rec = match self.create(handle, &args, &options, ExecutionMode::Async).await? {
            Created::New(rec) => rec,
            Created::Existing(rec) => return Ok(rec),
        };

        let sent = match &self.inner.transport {
            Some(t) => t.enqueue(rec.id).await,
            None => Err(TransportError::Unconfigured),
        };
        match sent {
            Ok(()) => {
                tracing::debug!(task_id = %rec.id, task = %rec.name, "task scheduled");
                self.inner.bus.publish(
                    Event::new(EventKind::TaskEnqueued)
                        .with_task_id(rec.id)
                        .with_task(rec.name.as_str()),
                );
                Ok(rec)
            }
            Err(e) => {
                tracing::error!(task_id = %rec.id, task = %rec.name, error = %e, "failed to enqueue task");
                let err = ErrorInfo::new(
                    TRANSPORT_ERROR,
                    e.to_string(),
                    format!("{TRANSPORT_ERROR}: {e:?}"),
                );
                let failed = self
                    .inner
                    .store
                    .set_status(rec.id, TaskStatus::Failure, Some(err), Utc::now())
                    .await?;
                self.inner.bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_task_id(failed.id)
                        .with_task(failed.name.as_str())
                        .with_status(failed.status)
                        .with_reason(e.to_string()),
                );
                Err(TaskError::Transport(e))
            }
        }
    }

    /// Flags record `id` for abort.
    ///
    /// Returns `false` if the record is already terminal. Idempotent: repeated
    /// calls leave the outcome of the first one unchanged.
    pub async fn request_abort(&self, id: TaskId) -> Result<bool, TaskError> {
        let accepted = self.inner.store.request_abort(id).await?;
        if accepted {
            tracing::info!(task_id = %id, "abort requested");
            self.inner
                .bus
                .publish(Event::new(EventKind::AbortRequested).with_task_id(id));
        }
        Ok(accepted)
    }

    /// Current record.
    pub async fn read(&self, id: TaskId) -> Result<TaskRecord, TaskError> {
        Ok(self.inner.store.read(id).await?)
    }

    /// Waits until record `id` is terminal.
    ///
    /// Terminal events on the bus end the wait early; the store is also polled
    /// every `completion_poll_interval` so records finished by other processes
    /// are seen. `timeout = None` waits indefinitely.
    pub async fn wait_for_completion(
        &self,
        id: TaskId,
        timeout: Option<Duration>,
    ) -> Result<TaskRecord, TaskError> {
        let events = self.inner.bus.subscribe_task(id);
        let wait = self.wait_terminal(id, events);

        match timeout {
            None => wait.await,
            Some(t) => tokio::time::timeout(t, wait)
                .await
                .map_err(|_| TaskError::WaitTimeout { id, timeout: t })?,
        }
    }

    async fn wait_terminal(
        &self,
        id: TaskId,
        mut events: TaskEvents,
    ) -> Result<TaskRecord, TaskError> {
        let mut tick = tokio::time::interval(self.inner.cfg.completion_poll_interval_clamped());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                Some(ev) = events.next() => {
                    if ev.is_terminal() {
                        return Ok(self.inner.store.read(id).await?);
                    }
                }
                _ = tick.tick() => {
                    let rec = self.inner.store.read(id).await?;
                    if rec.is_terminal() {
                        return Ok(rec);
                    }
                }
            }
        }
    }

    /// Stops the subscriber listener after delivering queued events.
    pub async fn shutdown(&self) {
        self.inner.stop.cancel();
        let listener = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            let _ = listener.await;
        }
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    async fn create<A: Serialize>(
        &self,
        handle: &TaskHandle<A>,
        args: &A,
        options: &Options,
        mode: ExecutionMode,
    ) -> Result<Created, TaskError> {
        let args = serde_json::to_value(args).map_err(|e| TaskError::Arguments {
            reason: e.to_string(),
        })?;

        let timeout = options
            .timeout
            .filter(|d| !d.is_zero())
            .or(handle.timeout())
            .map(|d| d.min(Config::MAX_TIMEOUT));
        let mut patch = PropertyPatch::new().with(keys::EXECUTION_MODE, mode.as_str());
        if let Some(t) = timeout {
            patch = patch.with(keys::TIMEOUT, t.as_secs_f64());
        }
        let mut properties = Properties::new();
        properties.apply(&patch);

        let created = self
            .inner
            .store
            .create(NewTask {
                name: handle.name().to_string(),
                display_name: options
                    .task_name
                    .clone()
                    .unwrap_or_else(|| handle.name().to_string()),
                scope: handle.scope(),
                task_key: options.task_key.clone(),
                owner: options.owner.clone(),
                args,
                properties,
                execution_mode: mode,
            })
            .await?;

        let rec = created.record();
        let kind = if created.is_new() {
            EventKind::TaskCreated
        } else {
            tracing::info!(
                task_id = %rec.id,
                task = %rec.name,
                task_key = ?rec.task_key,
                "deduplicated onto existing task"
            );
            EventKind::TaskDeduplicated
        };
        self.inner.bus.publish(
            Event::new(kind)
                .with_task_id(rec.id)
                .with_task(rec.name.as_str())
                .with_status(rec.status),
        );
        Ok(created)
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("registry", &self.inner.registry)
            .field("transport", &self.inner.transport.is_some())
            .finish()
    }
}

/// Forwards bus events to the subscriber set until stopped, then drains.
pub(crate) async fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "subscriber listener lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = stop.cancelled() => {
                while let Ok(ev) = rx.try_recv() {
                    set.emit(&ev);
                }
                break;
            }
        }
    }
    set.shutdown().await;
}
