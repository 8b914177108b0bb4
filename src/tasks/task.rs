//! # Type-erased task callable.
//!
//! The registry stores every declaration behind the [`Task`] trait so that a
//! runner can execute a record knowing only its registered name and its
//! serialized arguments. The typed side lives in [`TaskFn`](crate::tasks::TaskFn).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::record::ErrorInfo;

/// Future produced by [`Task::prepare`]; resolves to the captured body failure, if any.
pub type BodyFuture = Pin<Box<dyn Future<Output = Result<(), ErrorInfo>> + Send + 'static>>;

/// Shared handle to a registered task.
pub type TaskRef = Arc<dyn Task>;

/// # A registered, argument-erased unit of work.
///
/// `prepare` decodes the record's arguments and returns the body future
/// without polling it. The body itself is entered only when the runner first
/// polls the future, which happens inside the ambient execution scope.
pub trait Task: Send + Sync + 'static {
    /// Registered name.
    fn name(&self) -> &str;

    /// Type name of the argument value (signature metadata).
    fn args_type(&self) -> &'static str;

    /// Decodes `args` and builds the body future.
    ///
    /// Returns the decoder message when `args` does not fit the signature.
    fn prepare(&self, args: Value) -> Result<BodyFuture, String>;
}
