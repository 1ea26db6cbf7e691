//! Degradations recorded while compiling a section query.
//!
//! Compilation drops fragments it cannot render instead of failing the whole
//! query. Each drop is reported here so callers can tell when a filter ended
//! up wider than requested.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompileWarning {
    #[error("{path}: field {field:?} is not a valid identifier, condition dropped")]
    InvalidField { path: String, field: String },
    #[error("{path}: condition needs a field and a recognized operator, skipped")]
    IncompleteCondition { path: String },
    #[error("{path}: {operator} on {field} needs a [low, high] pair, condition dropped")]
    MalformedBetween {
        path: String,
        field: String,
        operator: String,
    },
    #[error("{path}: {operator} on {field} needs a value, condition dropped")]
    MissingValue {
        path: String,
        field: String,
        operator: String,
    },
    #[error("{path}: {operator} on {field} got a non-scalar value, condition dropped")]
    UnsupportedValue {
        path: String,
        field: String,
        operator: String,
    },
    #[error("{path}: group produced no conditions, dropped")]
    EmptyGroup { path: String },
    #[error("{path}: group nested deeper than {max_depth}, dropped")]
    DepthExceeded { path: String, max_depth: usize },
    #[error("unknown time interval {token:?}, using daily")]
    UnknownGranularity { token: String },
    #[error("{context} {name:?} is not a valid identifier, ignored")]
    InvalidIdentifier { context: String, name: String },
    #[error("start date {start} is after end date {end}")]
    InvertedDateRange { start: String, end: String },
}

impl CompileWarning {
    /// True when the warning means rows may match that the section did not ask for.
    pub fn widens_filter(&self) -> bool {
        matches!(
            self,
            CompileWarning::InvalidField { .. }
                | CompileWarning::IncompleteCondition { .. }
                | CompileWarning::MalformedBetween { .. }
                | CompileWarning::MissingValue { .. }
                | CompileWarning::UnsupportedValue { .. }
                | CompileWarning::EmptyGroup { .. }
                | CompileWarning::DepthExceeded { .. }
        )
    }
}
