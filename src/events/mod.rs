//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the manager, runners, abort
//! watchers, workers and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `TaskManager` (created/deduplicated/enqueued/abort requested),
//!   `Runner` (started/terminal), `Context` (progress/handler failures),
//!   abort watcher (abort detected), `Worker` (shutdown), `SubscriberSet` workers.
//! - **Consumers**: the manager's subscriber listener (fans out to `SubscriberSet`)
//!   and `TaskManager::wait_for_completion`.

mod bus;
mod event;

pub use bus::Bus;
pub(crate) use bus::TaskEvents;
pub use event::{Event, EventKind};
