//! # taskframe
//!
//! **taskframe** is a task execution framework for tokio applications.
//!
//! Tasks are declared once in a [`Registry`] and then either run inline
//! ([`TaskHandle::call`]) or scheduled for a [`Worker`]
//! ([`TaskHandle::schedule`]). Both paths produce a [`TaskRecord`] kept in a
//! [`TaskStore`]; the body's return value is discarded and its outcome is
//! read from the record.
//!
//! While a body runs it can reach its own [`Context`] through
//! [`get_context`] to report progress, merge a JSON payload, and register
//! cleanup and abort handlers. Cancellation is cooperative: an external
//! [`TaskManager::request_abort`] or an elapsed timeout is observed by a
//! background watcher that moves the record to ABORTING and runs the abort
//! handlers; the body decides when to return.
//!
//! ## Architecture
//! ```text
//!   TaskHandle::call ─────┐                         ┌───────────── Worker ◄── TaskReceiver
//!   TaskHandle::schedule ─┤                         │                            ▲
//!                         ▼                         ▼                            │
//!                    TaskManager ── create ──► TaskStore ◄── claim/update ── Runner
//!                         │                         ▲                        │   │
//!                         ├── enqueue ──► Transport ┘ (ids)                  │   ├─► Context (ambient)
//!                         │                                                  │   └─► abort watcher
//!                         └── Bus ◄──────────── lifecycle events ────────────┘
//!                              └──► SubscriberSet ──► LogWriter / custom Subscribe
//! ```
//!
//! ## Status lifecycle
//! ```text
//! PENDING ──► IN_PROGRESS ──► SUCCESS | FAILURE
//!    │             └──► ABORTING ──► ABORTED | TIMED_OUT | SUCCESS | FAILURE
//!    └──► ABORTED | FAILURE
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Declaration**   | Named, scoped tasks with default timeouts.                    | [`Registry`], [`TaskDecl`], [`TaskHandle`]  |
//! | **Execution**     | Inline runs, scheduled runs, workers with graceful shutdown.  | [`TaskManager`], [`Runner`], [`Worker`]     |
//! | **Context**       | Progress, payload, cleanup and abort handlers.                | [`Context`], [`get_context`], [`Progress`]  |
//! | **Persistence**   | Store interface, in-memory store, retrying adapter.           | [`TaskStore`], [`MemoryStore`], [`RetryStore`] |
//! | **Dispatch**      | Transport interface and in-process channel.                   | [`Transport`], [`transport::channel`]       |
//! | **Observability** | Lifecycle events and subscribers.                             | [`Subscribe`], [`Event`], [`LogWriter`]     |
//! | **Errors**        | Typed errors with stable labels.                              | [`TaskError`], [`StoreError`], [`RuntimeError`] |
//! | **Configuration** | Poll intervals, concurrency, grace, store retries.            | [`Config`], [`BackoffPolicy`]               |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskframe::{
//!     get_context, transport, LogWriter, MemoryStore, Options, Progress, Registry, TaskDecl,
//!     TaskManager, TaskStatus, Worker,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::new();
//!     let render = registry.register(
//!         TaskDecl::new("reports.render").timeout(Duration::from_secs(30)),
//!         |pages: u64| async move {
//!             let ctx = get_context()?;
//!             for page in 1..=pages {
//!                 ctx.update_task(Some(Progress::Of { current: page, total: pages }), None)
//!                     .await?;
//!             }
//!             Ok::<_, taskframe::TaskError>(())
//!         },
//!     )?;
//!
//!     let (tx, rx) = transport::channel(64);
//!     let manager = TaskManager::builder(registry, Arc::new(MemoryStore::new()))
//!         .with_transport(tx)
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build();
//!
//!     let token = CancellationToken::new();
//!     let worker = tokio::spawn(Worker::new(manager.clone(), rx).run(token.clone()));
//!
//!     let rec = render.schedule(&manager, 3, Options::new().task_key("weekly")).await?;
//!     let done = manager
//!         .wait_for_completion(rec.id, Some(Duration::from_secs(5)))
//!         .await?;
//!     assert_eq!(done.status, TaskStatus::Success);
//!
//!     token.cancel();
//!     worker.await??;
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod policies;
mod record;
mod store;
mod subscribers;
mod tasks;
pub mod transport;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{
    get_context, Context, Handler, Registry, Runner, TaskManager, TaskManagerBuilder, Worker,
    INVALID_ARGUMENTS, STORE_ERROR, TASK_NOT_REGISTERED, TRANSPORT_ERROR,
};
pub use error::{RegistryError, RuntimeError, StoreError, TaskError, TransportError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use record::{
    keys, ErrorInfo, ExecutionMode, Options, Progress, Properties, PropertyPatch, Scope, TaskId,
    TaskRecord, TaskStatus,
};
pub use store::{
    apply_status, Created, MemoryStore, NewTask, RetryStore, StoreRef, TaskPatch, TaskStore,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{BodyFuture, Task, TaskDecl, TaskFn, TaskHandle, TaskRef};
pub use transport::{ChannelTransport, TaskReceiver, Transport};
