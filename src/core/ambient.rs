//! # Ambient execution context.
//!
//! The runner installs the execution's [`Context`] in a tokio task-local slot
//! around the body future. Cleanup and abort handlers are invoked inside a
//! synchronous scope holding the same `Context`, so [`get_context`] resolves
//! there too. The slot is per tokio task and is never shared.

use std::future::Future;

use crate::core::context::Context;
use crate::error::TaskError;

tokio::task_local! {
    static CURRENT: Context;
}

/// Returns the [`Context`] of the execution the caller runs in.
///
/// Fails with [`TaskError::NoActiveTask`] outside a runner-managed execution,
/// including tasks spawned from a body with `tokio::spawn` (pass the context
/// explicitly there).
pub fn get_context() -> Result<Context, TaskError> {
    CURRENT
        .try_with(Context::clone)
        .map_err(|_| TaskError::NoActiveTask)
}

/// Runs `fut` with `ctx` installed.
pub(crate) async fn scope<F: Future>(ctx: Context, fut: F) -> F::Output {
    CURRENT.scope(ctx, fut).await
}

/// Runs `f` with `ctx` installed.
pub(crate) fn sync_scope<R>(ctx: Context, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(ctx, f)
}
