//! # Sparse, forward-compatible task properties.
//!
//! [`Properties`] wraps a JSON object. Reserved keys have typed accessors that
//! default-miss; every other key is carried through read-modify-write untouched.
//!
//! Writes are expressed as a [`PropertyPatch`] (keys to set, keys to remove),
//! so a store can apply them in one step next to a payload merge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved property keys.
pub mod keys {
    /// `"async"` / `"sync"`.
    pub const EXECUTION_MODE: &str = "execution_mode";
    /// Resolved timeout, in seconds.
    pub const TIMEOUT: &str = "timeout";
    /// Set once any abort handler was registered.
    pub const IS_ABORTABLE: &str = "is_abortable";
    /// Float in `[0, 1]`.
    pub const PROGRESS_PERCENT: &str = "progress_percent";
    /// Items processed.
    pub const PROGRESS_CURRENT: &str = "progress_current";
    /// Items expected (absent when unknown).
    pub const PROGRESS_TOTAL: &str = "progress_total";
    /// Stringified body error.
    pub const ERROR_MESSAGE: &str = "error_message";
    /// Concrete error type name.
    pub const EXCEPTION_TYPE: &str = "exception_type";
    /// Error chain and backtrace.
    pub const STACK_TRACE: &str = "stack_trace";
}

/// Sparse JSON property bag of a task record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(Map<String, Value>);

impl Properties {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw access to a key (reserved or not).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// True if the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Borrow the underlying object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn execution_mode(&self) -> Option<&str> {
        self.0.get(keys::EXECUTION_MODE).and_then(Value::as_str)
    }

    /// Resolved timeout in seconds.
    pub fn timeout(&self) -> Option<f64> {
        self.0.get(keys::TIMEOUT).and_then(Value::as_f64)
    }

    pub fn is_abortable(&self) -> bool {
        self.0
            .get(keys::IS_ABORTABLE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn progress_percent(&self) -> Option<f64> {
        self.0.get(keys::PROGRESS_PERCENT).and_then(Value::as_f64)
    }

    pub fn progress_current(&self) -> Option<u64> {
        self.0.get(keys::PROGRESS_CURRENT).and_then(Value::as_u64)
    }

    pub fn progress_total(&self) -> Option<u64> {
        self.0.get(keys::PROGRESS_TOTAL).and_then(Value::as_u64)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.0.get(keys::ERROR_MESSAGE).and_then(Value::as_str)
    }

    pub fn exception_type(&self) -> Option<&str> {
        self.0.get(keys::EXCEPTION_TYPE).and_then(Value::as_str)
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.0.get(keys::STACK_TRACE).and_then(Value::as_str)
    }

    /// Applies a patch: removals first, then sets. Untouched keys are preserved.
    pub fn apply(&mut self, patch: &PropertyPatch) {
        for key in &patch.unset {
            self.0.remove(key);
        }
        for (k, v) in &patch.set {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Shallow write to a [`Properties`] bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyPatch {
    /// Keys to insert or overwrite.
    pub set: Map<String, Value>,
    /// Keys to remove.
    pub unset: Vec<String>,
}

impl PropertyPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key to set.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set.insert(key.to_string(), value.into());
        self
    }

    /// Adds a key to remove.
    pub fn without(mut self, key: &str) -> Self {
        self.unset.push(key.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }

    /// Folds `other` into `self`; later writes win.
    pub fn merge(&mut self, other: PropertyPatch) {
        for key in other.unset {
            self.set.remove(&key);
            if !self.unset.contains(&key) {
                self.unset.push(key);
            }
        }
        for (k, v) in other.set {
            self.unset.retain(|u| u != &k);
            self.set.insert(k, v);
        }
    }
}

/// Error descriptor captured from a failed body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stringified error.
    pub message: String,
    /// Concrete type name (`"ValueError"`, `"Panic"`, `"TaskNotRegistered"`...).
    pub exception_type: String,
    /// Error chain, followed by a backtrace when one was captured.
    pub stack_trace: String,
}

impl ErrorInfo {
    pub fn new(
        exception_type: impl Into<String>,
        message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            exception_type: exception_type.into(),
            stack_trace: stack_trace.into(),
        }
    }

    /// The three error keys as a property patch.
    pub fn to_patch(&self) -> PropertyPatch {
        PropertyPatch::new()
            .with(keys::ERROR_MESSAGE, self.message.clone())
            .with(keys::EXCEPTION_TYPE, self.exception_type.clone())
            .with(keys::STACK_TRACE, self.stack_trace.clone())
    }

    /// Reads the descriptor back from properties, if an error was recorded.
    pub fn from_properties(props: &Properties) -> Option<Self> {
        let exception_type = props.exception_type()?;
        Some(Self {
            message: props.error_message().unwrap_or_default().to_string(),
            exception_type: exception_type.to_string(),
            stack_trace: props.stack_trace().unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let raw = json!({"progress_percent": 0.5, "x_custom": {"nested": [1, 2]}, "flag": true});
        let props: Properties = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(props.progress_percent(), Some(0.5));
        assert_eq!(serde_json::to_value(&props).unwrap(), raw);
    }

    #[test]
    fn test_missing_keys_default() {
        let props = Properties::new();
        assert!(!props.is_abortable());
        assert_eq!(props.progress_total(), None);
        assert_eq!(props.error_message(), None);
        assert!(ErrorInfo::from_properties(&props).is_none());
    }

    #[test]
    fn test_apply_preserves_untouched_keys() {
        let mut props: Properties =
            serde_json::from_value(json!({"keep": 1, "progress_total": 10})).unwrap();
        props.apply(
            &PropertyPatch::new()
                .with(keys::PROGRESS_CURRENT, 3)
                .without(keys::PROGRESS_TOTAL),
        );
        assert_eq!(props.get("keep"), Some(&json!(1)));
        assert_eq!(props.progress_current(), Some(3));
        assert!(!props.contains(keys::PROGRESS_TOTAL));
    }

    #[test]
    fn test_patch_merge_later_wins() {
        let mut a = PropertyPatch::new().with("k", 1).without("gone");
        a.merge(PropertyPatch::new().with("gone", 2).without("k"));
        assert_eq!(a.set.get("gone"), Some(&json!(2)));
        assert!(a.unset.contains(&"k".to_string()));
        assert!(!a.unset.contains(&"gone".to_string()));
        assert!(!a.set.contains_key("k"));
    }
}
