//! # Progress values accepted by `Context::update_task`.
//!
//! Three shapes are accepted:
//! - [`Progress::Percent`]: a fraction in `[0, 1]`;
//! - [`Progress::Count`]: items processed, total unknown;
//! - [`Progress::Of`]: items processed out of a known total.
//!
//! Each shape maps to the `progress_*` property keys so that, after any write,
//! `progress_percent == progress_current / progress_total` whenever a total is present.

use serde_json::Value;

use crate::error::TaskError;
use crate::record::properties::{keys, PropertyPatch};

/// A progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    /// Fraction complete.
    Percent(f64),
    /// Items processed so far.
    Count(u64),
    /// Items processed out of `total`.
    Of {
        /// Items processed.
        current: u64,
        /// Items expected.
        total: u64,
    },
}

impl Progress {
    /// Checks the value and converts it to the property write it implies.
    ///
    /// # Errors
    /// [`TaskError::InvalidProgress`] for a percent outside `[0, 1]` (or NaN),
    /// a zero total, or `current > total`.
    ///
    /// # Example
    /// ```
    /// use taskframe::Progress;
    ///
    /// assert!(Progress::Percent(1.0).to_patch().is_ok());
    /// assert!(Progress::Percent(1.1).to_patch().is_err());
    /// assert!(Progress::Of { current: 0, total: 0 }.to_patch().is_err());
    /// ```
    pub fn to_patch(self) -> Result<PropertyPatch, TaskError> {
        match self {
            Progress::Percent(p) => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(TaskError::invalid_progress(format!(
                        "percent {p} is outside [0, 1]"
                    )));
                }
                Ok(PropertyPatch::new()
                    .with(keys::PROGRESS_PERCENT, p)
                    .without(keys::PROGRESS_CURRENT)
                    .without(keys::PROGRESS_TOTAL))
            }
            Progress::Count(n) => Ok(PropertyPatch::new()
                .with(keys::PROGRESS_CURRENT, n)
                .without(keys::PROGRESS_TOTAL)
                .without(keys::PROGRESS_PERCENT)),
            Progress::Of { current, total } => {
                if total == 0 {
                    return Err(TaskError::invalid_progress("total must be positive"));
                }
                if current > total {
                    return Err(TaskError::invalid_progress(format!(
                        "current {current} exceeds total {total}"
                    )));
                }
                Ok(PropertyPatch::new()
                    .with(keys::PROGRESS_CURRENT, current)
                    .with(keys::PROGRESS_TOTAL, total)
                    .with(keys::PROGRESS_PERCENT, current as f64 / total as f64))
            }
        }
    }
}

impl From<f64> for Progress {
    fn from(p: f64) -> Self {
        Progress::Percent(p)
    }
}

impl From<u64> for Progress {
    fn from(n: u64) -> Self {
        Progress::Count(n)
    }
}

impl From<(u64, u64)> for Progress {
    fn from((current, total): (u64, u64)) -> Self {
        Progress::Of { current, total }
    }
}

/// Dynamic shape detection for progress arriving as JSON.
///
/// - floating-point number → `Percent`
/// - non-negative integer → `Count`
/// - two-element array of non-negative integers → `Of`
/// - anything else is rejected
impl TryFrom<&Value> for Progress {
    type Error = TaskError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) if n.is_f64() => n
                .as_f64()
                .map(Progress::Percent)
                .ok_or_else(|| TaskError::invalid_progress("not a finite number")),
            Value::Number(n) => n
                .as_u64()
                .map(Progress::Count)
                .ok_or_else(|| TaskError::invalid_progress(format!("negative count {n}"))),
            Value::Array(pair) if pair.len() == 2 => match (pair[0].as_u64(), pair[1].as_u64()) {
                (Some(current), Some(total)) => Ok(Progress::Of { current, total }),
                _ => Err(TaskError::invalid_progress(
                    "pair must hold two non-negative integers",
                )),
            },
            other => Err(TaskError::invalid_progress(format!(
                "expected float, int or (current, total), got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percent_bounds() {
        assert!(Progress::Percent(0.0).to_patch().is_ok());
        assert!(Progress::Percent(1.0).to_patch().is_ok());
        assert!(Progress::Percent(-0.1).to_patch().is_err());
        assert!(Progress::Percent(1.1).to_patch().is_err());
        assert!(Progress::Percent(f64::NAN).to_patch().is_err());
    }

    #[test]
    fn test_pair_rules() {
        assert!(Progress::Of { current: 0, total: 0 }.to_patch().is_err());
        assert!(Progress::Of { current: 5, total: 4 }.to_patch().is_err());

        let patch = Progress::Of { current: 3, total: 4 }.to_patch().unwrap();
        assert_eq!(patch.set.get(keys::PROGRESS_PERCENT), Some(&json!(0.75)));
        assert_eq!(patch.set.get(keys::PROGRESS_TOTAL), Some(&json!(4)));
    }

    #[test]
    fn test_count_clears_stale_total() {
        let patch = Progress::Count(7).to_patch().unwrap();
        assert_eq!(patch.set.get(keys::PROGRESS_CURRENT), Some(&json!(7)));
        assert!(patch.unset.contains(&keys::PROGRESS_TOTAL.to_string()));
        assert!(patch.unset.contains(&keys::PROGRESS_PERCENT.to_string()));
    }

    #[test]
    fn test_json_shapes() {
        assert_eq!(Progress::try_from(&json!(0.5)).unwrap(), Progress::Percent(0.5));
        assert_eq!(Progress::try_from(&json!(42)).unwrap(), Progress::Count(42));
        assert_eq!(
            Progress::try_from(&json!([3, 10])).unwrap(),
            Progress::Of { current: 3, total: 10 }
        );
        assert!(Progress::try_from(&json!("half")).is_err());
        assert!(Progress::try_from(&json!(-3)).is_err());
        assert!(Progress::try_from(&json!([1, 2, 3])).is_err());
        assert!(Progress::try_from(&json!({"current": 1})).is_err());
    }
}
