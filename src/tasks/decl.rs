//! # Task declarations.
//!
//! [`TaskDecl`] carries the registration-time defaults of a task: its name,
//! scope and default timeout. It is consumed by
//! [`Registry::register`](crate::Registry::register).
//!
//! ```rust
//! use std::time::Duration;
//! use taskframe::{Scope, TaskDecl};
//!
//! let decl = TaskDecl::new("reports.render")
//!     .scope(Scope::Shared)
//!     .timeout(Duration::from_secs(30));
//! assert_eq!(decl.explicit_name(), Some("reports.render"));
//! ```

use std::time::Duration;

use crate::error::RegistryError;
use crate::record::Scope;

/// Registration-time defaults for one task.
#[derive(Clone, Debug, Default)]
pub struct TaskDecl {
    name: Option<String>,
    scope: Scope,
    timeout: Option<Duration>,
}

impl TaskDecl {
    /// Declaration with an explicit name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Declaration named after the registered function item.
    ///
    /// Closures have no usable name; registering one this way fails with
    /// [`RegistryError::Unnamed`].
    pub fn natural() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Default timeout; `Duration::ZERO` means none.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout).filter(|d| !d.is_zero());
        self
    }

    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn parts(self) -> (Option<String>, Scope, Option<Duration>) {
        (self.name, self.scope, self.timeout)
    }
}

/// Derives a task name from the type of a function item.
///
/// `my_app::jobs::render` → `render`.
pub(crate) fn natural_name<F>() -> Result<String, RegistryError> {
    let type_name = std::any::type_name::<F>();
    if type_name.contains("{{closure}}") || type_name.contains('<') {
        return Err(RegistryError::Unnamed { type_name });
    }
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    if short.is_empty() {
        return Err(RegistryError::Unnamed { type_name });
    }
    Ok(short.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn rebuild_index(_: ()) -> Result<(), std::io::Error> {
        Ok(())
    }

    fn named<F>(_: &F) -> Result<String, RegistryError> {
        natural_name::<F>()
    }

    #[test]
    fn test_natural_name_of_fn_item() {
        assert_eq!(named(&rebuild_index).unwrap(), "rebuild_index");
    }

    #[test]
    fn test_closure_has_no_natural_name() {
        let f = |_: ()| async { Ok::<_, std::io::Error>(()) };
        assert!(matches!(named(&f), Err(RegistryError::Unnamed { .. })));
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let (_, _, timeout) = TaskDecl::new("t").timeout(Duration::ZERO).parts();
        assert_eq!(timeout, None);
    }
}
