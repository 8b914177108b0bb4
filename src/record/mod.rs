//! # Task records and their building blocks.
//!
//! - [`TaskRecord`] persistent descriptor of one execution
//! - [`TaskStatus`] lifecycle state machine
//! - [`Properties`] sparse property bag with reserved keys
//! - [`Progress`] accepted progress shapes
//! - [`Options`] caller-side overrides for one schedule

mod progress;
mod properties;
mod status;
mod task;

pub use progress::Progress;
pub use properties::{keys, ErrorInfo, Properties, PropertyPatch};
pub use status::{ExecutionMode, Scope, TaskStatus};
pub use task::{Options, TaskId, TaskRecord};
