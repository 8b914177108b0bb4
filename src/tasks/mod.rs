//! # Task declarations and callables.
//!
//! - [`TaskDecl`] registration-time defaults (name, scope, timeout)
//! - [`TaskHandle`] typed, dual-mode reference returned by registration
//! - [`Task`] argument-erased callable stored in the registry
//! - [`TaskFn`] function-backed [`Task`] implementation
//! - [`failure`] conversion of body errors and panics into record error fields

mod decl;
pub(crate) mod failure;
mod handle;
mod task;
mod task_fn;

pub(crate) use decl::natural_name;
pub use decl::TaskDecl;
pub use handle::TaskHandle;
pub use task::{BodyFuture, Task, TaskRef};
pub use task_fn::TaskFn;
