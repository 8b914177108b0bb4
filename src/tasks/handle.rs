//! # Typed handle returned by registration.
//!
//! A [`TaskHandle`] is the dual-mode reference to a registered task: the same
//! handle runs the task inline ([`call`](TaskHandle::call)) or hands it to a
//! worker ([`schedule`](TaskHandle::schedule)). Both return the task record;
//! the body's return value is never exposed.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::core::TaskManager;
use crate::error::TaskError;
use crate::record::{Options, Scope, TaskRecord};

/// Typed reference to a registered task taking arguments `A`.
pub struct TaskHandle<A> {
    name: Arc<str>,
    scope: Scope,
    timeout: Option<Duration>,
    _args: PhantomData<fn(A)>,
}

impl<A> Clone for TaskHandle<A> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            scope: self.scope,
            timeout: self.timeout,
            _args: PhantomData,
        }
    }
}

impl<A> std::fmt::Debug for TaskHandle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<A> TaskHandle<A> {
    pub(crate) fn new(name: Arc<str>, scope: Scope, timeout: Option<Duration>) -> Self {
        Self {
            name,
            scope,
            timeout,
            _args: PhantomData,
        }
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Registered default timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl<A: Serialize + Send> TaskHandle<A> {
    /// Runs the task inline and returns its terminal record.
    ///
    /// Body failures are reported on the record, not as `Err`.
    pub async fn call(&self, manager: &TaskManager, args: A) -> Result<TaskRecord, TaskError> {
        manager.call(self, args, Options::default()).await
    }

    /// Inline run with per-call options.
    ///
    /// When `options.task_key` matches a non-terminal record, that record is
    /// awaited instead of running the body a second time.
    pub async fn call_with(
        &self,
        manager: &TaskManager,
        args: A,
        options: Options,
    ) -> Result<TaskRecord, TaskError> {
        manager.call(self, args, options).await
    }

    /// Creates a PENDING record and hands it to the manager's transport.
    pub async fn schedule(
        &self,
        manager: &TaskManager,
        args: A,
        options: Options,
    ) -> Result<TaskRecord, TaskError> {
        manager.schedule(self, args, options).await
    }
}
