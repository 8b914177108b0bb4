//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(A) -> Fut` and a typed argument `A`,
//! producing a fresh future per execution. Shared state across executions must
//! be captured explicitly (`Arc<...>`) by the closure.
//!
//! Body errors are converted to [`ErrorInfo`] at the boundary (see
//! [`failure`](crate::tasks::failure)); the `Ok` value is discarded.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::tasks::failure;
use crate::tasks::task::{BodyFuture, Task};

/// Function-backed task implementation.
pub struct TaskFn<A, F> {
    name: String,
    f: Arc<F>,
    _args: PhantomData<fn(A)>,
}

impl<A, F> TaskFn<A, F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
            _args: PhantomData,
        }
    }
}

impl<A, F, Fut, T, E> Task for TaskFn<A, F>
where
    A: DeserializeOwned + Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn args_type(&self) -> &'static str {
        std::any::type_name::<A>()
    }

    fn prepare(&self, args: Value) -> Result<BodyFuture, String> {
        let args: A = serde_json::from_value(args).map_err(|e| e.to_string())?;
        let f = Arc::clone(&self.f);
        Ok(Box::pin(async move {
            match f(args).await {
                Ok(_) => Ok(()),
                Err(e) => Err(failure::from_error::<E>(e)),
            }
        }))
    }
}
