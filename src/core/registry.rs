//! # Task registry.
//!
//! Maps registered names to type-erased callables and their defaults.
//!
//! ## Rules
//! - names are unique; a second registration fails with `AlreadyRegistered`
//! - the registry is populated before a [`TaskManager`](crate::TaskManager) is
//!   built over it; building seals it and later registrations fail with `Sealed`
//! - lookups after sealing are read-only and never block writers
//!
//! ```rust
//! use taskframe::{Registry, TaskDecl};
//!
//! let registry = Registry::new();
//! let add = registry
//!     .register(TaskDecl::new("add"), |(a, b): (i64, i64)| async move {
//!         Ok::<_, std::io::Error>(a + b)
//!     })
//!     .unwrap();
//!
//! assert_eq!(add.name(), "add");
//! assert!(registry.contains("add"));
//! assert!(registry.register(TaskDecl::new("add"), |_: ()| async { Ok::<_, std::io::Error>(()) }).is_err());
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::RegistryError;
use crate::tasks::{natural_name, TaskDecl, TaskFn, TaskHandle, TaskRef};

/// One registered task.
#[derive(Clone)]
pub(crate) struct Entry {
    pub(crate) task: TaskRef,
    /// Registered default, used for records that carry no `timeout` property.
    pub(crate) timeout: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    tasks: RwLock<HashMap<String, Entry>>,
    sealed: AtomicBool,
}

/// Shared registry of task declarations (cheap to clone).
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under the declaration's name and returns a typed handle.
    ///
    /// `A` is the argument value (use a tuple or struct for several
    /// parameters); it is serialized into the record at creation and decoded
    /// again by the runner.
    pub fn register<A, F, Fut, T, E>(
        &self,
        decl: TaskDecl,
        f: F,
    ) -> Result<TaskHandle<A>, RegistryError>
    where
        A: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        if self.is_sealed() {
            return Err(RegistryError::Sealed);
        }
        let (name, scope, timeout) = decl.parts();
        let name = match name {
            Some(name) => name,
            None => natural_name::<F>()?,
        };

        let mut tasks = self
            .inner
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if tasks.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered { name });
        }
        let task: TaskRef = Arc::new(TaskFn::<A, F>::new(name.clone(), f));
        tasks.insert(name.clone(), Entry { task, timeout });
        tracing::debug!(task = %name, args = std::any::type_name::<A>(), "task registered");
        Ok(TaskHandle::new(Arc::from(name), scope, timeout))
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read(|tasks| tasks.contains_key(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.read(|tasks| tasks.keys().cloned().collect::<Vec<_>>());
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read(HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once a manager was built over this registry.
    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.load(Ordering::Acquire)
    }

    pub(crate) fn seal(&self) {
        self.inner.sealed.store(true, Ordering::Release);
    }

    pub(crate) fn get(&self, name: &str) -> Option<Entry> {
        self.read(|tasks| tasks.get(name).cloned())
    }

    fn read<R>(&self, f: impl FnOnce(&HashMap<String, Entry>) -> R) -> R {
        let tasks = self
            .inner
            .tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&tasks)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("tasks", &self.names())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Scope;

    async fn nightly_digest(_: ()) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let reg = Registry::new();
        reg.register(TaskDecl::new("t1"), |_: ()| async { anyhow::Ok(()) })
            .unwrap();
        let err = reg
            .register(TaskDecl::new("t1"), |_: u8| async { anyhow::Ok(()) })
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRegistered { name: "t1".into() });
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_sealed_registry_rejects() {
        let reg = Registry::new();
        reg.seal();
        let err = reg
            .register(TaskDecl::new("late"), |_: ()| async { anyhow::Ok(()) })
            .unwrap_err();
        assert_eq!(err, RegistryError::Sealed);
    }

    #[test]
    fn test_natural_name_and_defaults() {
        let reg = Registry::new();
        let h = reg
            .register(
                TaskDecl::natural()
                    .scope(Scope::System)
                    .timeout(Duration::from_secs(3)),
                nightly_digest,
            )
            .unwrap();
        assert_eq!(h.name(), "nightly_digest");
        assert_eq!(h.scope(), Scope::System);

        let entry = reg.get("nightly_digest").unwrap();
        assert_eq!(entry.timeout, Some(Duration::from_secs(3)));
        assert_eq!(entry.task.args_type(), "()");
    }
}
