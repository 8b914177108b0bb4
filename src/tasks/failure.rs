//! Conversion of body failures into record error fields.
//!
//! - `error_message`: the error's `Display`
//! - `exception_type`: the short type name of the error returned by the body
//!   (`"Panic"` for panics)
//! - `stack_trace`: the error chain plus the captured backtrace, if any

use std::any::Any;

use crate::record::ErrorInfo;

/// Exception type recorded for panicking bodies.
pub const PANIC: &str = "Panic";

/// Builds the error descriptor for an `Err(e)` returned by a body.
pub fn from_error<E>(err: E) -> ErrorInfo
where
    E: Into<anyhow::Error> + 'static,
{
    let exception_type = short_type_name(std::any::type_name::<E>());
    let err: anyhow::Error = err.into();
    // `{:?}` renders the cause chain and, when enabled, the backtrace.
    let stack_trace = format!("{exception_type}: {err:?}");
    ErrorInfo::new(exception_type, err.to_string(), stack_trace)
}

/// Builds the error descriptor for a caught panic payload.
pub fn from_panic(payload: &(dyn Any + Send)) -> ErrorInfo {
    let message = crate::core::panic_message(payload);
    let stack_trace = format!("{PANIC}: {message}");
    ErrorInfo::new(PANIC, message, stack_trace)
}

/// `my_crate::errors::Wrapper<io::Error>` → `Wrapper`.
pub fn short_type_name(full: &str) -> String {
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("app::Wrapper<std::io::Error>"), "Wrapper");
        assert_eq!(short_type_name("ValueError"), "ValueError");
    }

    #[test]
    fn test_chain_in_stack_trace() {
        let err = anyhow::anyhow!("disk full").context("writing report");
        let info = from_error(err);
        assert_eq!(info.message, "writing report");
        assert!(info.stack_trace.contains("disk full"));
    }

    #[test]
    fn test_panic_payloads() {
        let info = from_panic(&"boom");
        assert_eq!(info.exception_type, PANIC);
        assert_eq!(info.message, "boom");
        let info = from_panic(&String::from("owned"));
        assert_eq!(info.message, "owned");
    }
}
