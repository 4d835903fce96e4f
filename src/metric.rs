//! Metric definitions and the metric directory.
//!
//! A metric is a stable string key plus a declared value type. The directory
//! resolves keys to metrics for formulas and the measure repository;
//! [`core_metrics`] registers every metric the new-coverage computation
//! reads or produces.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CovdeltaError;
use crate::measure::ValueType;
use crate::Result;

/// Numeric identity of a metric, used by the persisted-baseline store.
pub type MetricId = u32;

// Line-data input metrics (unit test coverage family).
pub const COVERAGE_LINE_HITS_DATA_KEY: &str = "coverage_line_hits_data";
pub const CONDITIONS_BY_LINE_KEY: &str = "conditions_by_line";
pub const COVERED_CONDITIONS_BY_LINE_KEY: &str = "covered_conditions_by_line";

// Integration test coverage family.
pub const IT_COVERAGE_LINE_HITS_DATA_KEY: &str = "it_coverage_line_hits_data";
pub const IT_CONDITIONS_BY_LINE_KEY: &str = "it_conditions_by_line";
pub const IT_COVERED_CONDITIONS_BY_LINE_KEY: &str = "it_covered_conditions_by_line";

// Overall coverage family.
pub const OVERALL_COVERAGE_LINE_HITS_DATA_KEY: &str = "overall_coverage_line_hits_data";
pub const OVERALL_CONDITIONS_BY_LINE_KEY: &str = "overall_conditions_by_line";
pub const OVERALL_COVERED_CONDITIONS_BY_LINE_KEY: &str = "overall_covered_conditions_by_line";

// New-coverage output metrics (unit test coverage family).
pub const NEW_LINES_TO_COVER_KEY: &str = "new_lines_to_cover";
pub const NEW_UNCOVERED_LINES_KEY: &str = "new_uncovered_lines";
pub const NEW_CONDITIONS_TO_COVER_KEY: &str = "new_conditions_to_cover";
pub const NEW_UNCOVERED_CONDITIONS_KEY: &str = "new_uncovered_conditions";

pub const NEW_IT_LINES_TO_COVER_KEY: &str = "new_it_lines_to_cover";
pub const NEW_IT_UNCOVERED_LINES_KEY: &str = "new_it_uncovered_lines";
pub const NEW_IT_CONDITIONS_TO_COVER_KEY: &str = "new_it_conditions_to_cover";
pub const NEW_IT_UNCOVERED_CONDITIONS_KEY: &str = "new_it_uncovered_conditions";

pub const NEW_OVERALL_LINES_TO_COVER_KEY: &str = "new_overall_lines_to_cover";
pub const NEW_OVERALL_UNCOVERED_LINES_KEY: &str = "new_overall_uncovered_lines";
pub const NEW_OVERALL_CONDITIONS_TO_COVER_KEY: &str = "new_overall_conditions_to_cover";
pub const NEW_OVERALL_UNCOVERED_CONDITIONS_KEY: &str = "new_overall_uncovered_conditions";

/// Declared type of a metric.
///
/// This is slightly richer than [`ValueType`]: `Percent` is carried as a
/// double and `Data` as a string, which matters to analyzers but not to the
/// measure overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    Int,
    Long,
    Double,
    Percent,
    Bool,
    String,
    Data,
    Level,
}

impl MetricType {
    /// The value type a measure of this metric must carry.
    pub fn value_type(self) -> ValueType {
        match self {
            MetricType::Int => ValueType::Int,
            MetricType::Long => ValueType::Long,
            MetricType::Double | MetricType::Percent => ValueType::Double,
            MetricType::Bool => ValueType::Bool,
            MetricType::String | MetricType::Data => ValueType::String,
            MetricType::Level => ValueType::Level,
        }
    }
}

/// A metric definition: stable key plus declared value type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    id: MetricId,
    key: String,
    metric_type: MetricType,
}

impl Metric {
    /// Create a metric definition.
    pub fn new(id: MetricId, key: impl Into<String>, metric_type: MetricType) -> Self {
        Self {
            id,
            key: key.into(),
            metric_type,
        }
    }

    pub fn id(&self) -> MetricId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// The value type measures of this metric must carry.
    pub fn value_type(&self) -> ValueType {
        self.metric_type.value_type()
    }
}

/// Resolves metric keys to metric definitions.
#[derive(Debug, Clone, Default)]
pub struct MetricDirectory {
    by_key: HashMap<String, Metric>,
}

impl MetricDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metric. A later registration under the same key replaces
    /// the earlier one.
    pub fn register(&mut self, metric: Metric) {
        self.by_key.insert(metric.key().to_string(), metric);
    }

    /// Look up a metric by key, failing if it is not registered.
    pub fn by_key(&self, key: &str) -> Result<&Metric> {
        self.by_key
            .get(key)
            .ok_or_else(|| CovdeltaError::UnknownMetric(key.to_string()))
    }
}

/// Directory pre-populated with every metric the new-coverage computation
/// consumes (line-data inputs) or produces (per-period variation outputs).
pub fn core_metrics() -> MetricDirectory {
    let inputs = [
        COVERAGE_LINE_HITS_DATA_KEY,
        CONDITIONS_BY_LINE_KEY,
        COVERED_CONDITIONS_BY_LINE_KEY,
        IT_COVERAGE_LINE_HITS_DATA_KEY,
        IT_CONDITIONS_BY_LINE_KEY,
        IT_COVERED_CONDITIONS_BY_LINE_KEY,
        OVERALL_COVERAGE_LINE_HITS_DATA_KEY,
        OVERALL_CONDITIONS_BY_LINE_KEY,
        OVERALL_COVERED_CONDITIONS_BY_LINE_KEY,
    ];
    let outputs = [
        NEW_LINES_TO_COVER_KEY,
        NEW_UNCOVERED_LINES_KEY,
        NEW_CONDITIONS_TO_COVER_KEY,
        NEW_UNCOVERED_CONDITIONS_KEY,
        NEW_IT_LINES_TO_COVER_KEY,
        NEW_IT_UNCOVERED_LINES_KEY,
        NEW_IT_CONDITIONS_TO_COVER_KEY,
        NEW_IT_UNCOVERED_CONDITIONS_KEY,
        NEW_OVERALL_LINES_TO_COVER_KEY,
        NEW_OVERALL_UNCOVERED_LINES_KEY,
        NEW_OVERALL_CONDITIONS_TO_COVER_KEY,
        NEW_OVERALL_UNCOVERED_CONDITIONS_KEY,
    ];

    let mut directory = MetricDirectory::new();
    let mut id: MetricId = 1;
    for key in inputs {
        directory.register(Metric::new(id, key, MetricType::Data));
        id += 1;
    }
    for key in outputs {
        directory.register(Metric::new(id, key, MetricType::Int));
        id += 1;
    }
    directory
}
