//! Error types for covdelta

use thiserror::Error;

use crate::component::ComponentRef;
use crate::measure::ValueType;
use crate::period::MAX_PERIOD_COUNT;

/// Errors that can occur during measure computation.
///
/// All variants are hard errors: they indicate a caller-contract violation
/// or malformed analyzer output and abort the current run. Missing coverage
/// or changeset data is never an error; it simply contributes nothing.
#[derive(Error, Debug)]
pub enum CovdeltaError {
    /// `add` was called twice for the same (component, metric, scope) key
    #[error("a measure already exists for component {component} and metric '{metric_key}'")]
    MeasureAlreadyExists {
        component: ComponentRef,
        metric_key: String,
    },

    /// `update` was called for a key that was never populated
    #[error("no measure to update for component {component} and metric '{metric_key}'")]
    MeasureNotYetAdded {
        component: ComponentRef,
        metric_key: String,
    },

    /// Updated measure's value type disagrees with the metric's declared type
    #[error("measure value type {measure:?} is not consistent with metric value type {metric:?}")]
    ValueTypeMismatch { measure: ValueType, metric: ValueType },

    /// A formula was asked for an output metric it did not declare
    #[error("unsupported metric '{0}'")]
    UnsupportedMetric(String),

    /// Metric key not registered in the metric directory
    #[error("unknown metric key '{0}'")]
    UnknownMetric(String),

    /// Period index outside 1..=MAX_PERIOD_COUNT
    #[error("invalid period index {0}, must be between 1 and {MAX_PERIOD_COUNT}")]
    InvalidPeriodIndex(usize),

    /// Malformed `line=count` data reported by the analyzer
    #[error("malformed line data '{data}': {message}")]
    MalformedLineData { data: String, message: String },

    /// Raw analyzer measure payload does not fit the metric's declared type
    #[error("raw measure for metric '{metric_key}' does not match its declared value type {expected:?}")]
    MalformedMeasure {
        metric_key: String,
        expected: ValueType,
    },

    /// Failure while reading a persisted baseline measure
    #[error("baseline store error: {0}")]
    BaselineStore(String),
}
