//! Runtime core: registration, execution and control.
//!
//! - [`registry`]: name → callable map, sealed once a manager is built
//! - [`context`]: per-execution handle (progress, payload, handlers)
//! - [`ambient`]: task-local installation of the current context
//! - [`watcher`]: abort/timeout observer and the abort phase shared with the runner
//! - [`runner`]: drives one record from PENDING to a terminal status
//! - [`manager`]: record creation, inline calls, scheduling, abort requests, waiting
//! - [`builder`]: assembles a manager (retry store, bus, subscribers)
//! - [`worker`]: executes scheduled records with a concurrency cap and graceful shutdown

mod ambient;
mod builder;
mod context;
mod manager;
mod registry;
mod runner;
mod watcher;
mod worker;

use std::any::Any;

pub use ambient::get_context;
pub use builder::TaskManagerBuilder;
pub use context::{Context, Handler};
pub use manager::{TaskManager, TRANSPORT_ERROR};
pub use registry::Registry;
pub use runner::{Runner, INVALID_ARGUMENTS, STORE_ERROR, TASK_NOT_REGISTERED};
pub use worker::Worker;

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
