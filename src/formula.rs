//! The formula/counter contract shared by all metric computations.
//!
//! A formula knows how to create a fresh per-node accumulator and how to
//! turn a finished accumulator into output measures; a counter accumulates
//! either from leaf-level raw data or from child counters. The traversal
//! engine in [`visitor`](crate::visitor) is agnostic to how many formulas
//! exist or what they compute.

use crate::component::Component;
use crate::measure::Measure;
use crate::metric::{Metric, MetricDirectory};
use crate::period::Period;
use crate::report::{Changesets, ReportReader};
use crate::repository::MeasureRepository;
use crate::Result;

/// Everything a counter may consult while accumulating a FILE node.
///
/// Measure reads are routed through the repository so the overlay stays the
/// single read path for raw analyzer data.
pub struct FileAggregateContext<'a, 'r> {
    file: &'a Component,
    periods: &'a [Period],
    reader: &'a dyn ReportReader,
    metrics: &'a MetricDirectory,
    repository: &'a mut MeasureRepository<'r>,
}

impl<'a, 'r> FileAggregateContext<'a, 'r> {
    pub(crate) fn new(
        file: &'a Component,
        periods: &'a [Period],
        reader: &'a dyn ReportReader,
        metrics: &'a MetricDirectory,
        repository: &'a mut MeasureRepository<'r>,
    ) -> Self {
        Self {
            file,
            periods,
            reader,
            metrics,
            repository,
        }
    }

    /// The FILE component being accumulated.
    pub fn file(&self) -> &Component {
        self.file
    }

    /// The active comparison periods.
    pub fn periods(&self) -> &[Period] {
        self.periods
    }

    /// Changeset data for the file, absent when it has no SCM history.
    pub fn changesets(&self) -> Option<&Changesets> {
        self.reader.changesets(self.file.reference())
    }

    /// The current raw measure of the file for a metric key, if any.
    ///
    /// Fails when the key is unknown to the metric directory or the raw
    /// payload does not fit the metric's declared type.
    pub fn measure(&mut self, metric_key: &str) -> Result<Option<Measure>> {
        let metric = self.metrics.by_key(metric_key)?;
        Ok(self.repository.raw_measure(self.file, metric)?.cloned())
    }
}

/// Context handed to a formula when it emits measures for one node and one
/// of its declared output metrics.
pub struct CreateMeasureContext<'a> {
    component: &'a Component,
    periods: &'a [Period],
    metric: &'a Metric,
}

impl<'a> CreateMeasureContext<'a> {
    pub(crate) fn new(component: &'a Component, periods: &'a [Period], metric: &'a Metric) -> Self {
        Self {
            component,
            periods,
            metric,
        }
    }

    /// The node measures are being emitted for.
    pub fn component(&self) -> &Component {
        self.component
    }

    /// The active comparison periods.
    pub fn periods(&self) -> &[Period] {
        self.periods
    }

    /// The output metric currently being produced.
    pub fn metric(&self) -> &Metric {
        self.metric
    }
}

/// Per-node, per-formula accumulator.
///
/// Created fresh for every node, populated exactly once (from leaf data or
/// from child counters), consumed once to emit measures, then discarded.
pub trait Counter {
    /// Fold a fully-processed child counter into this one.
    fn aggregate(&mut self, child: &Self);

    /// Accumulate directly from a FILE node's raw data.
    ///
    /// Missing changeset or coverage data contributes nothing and is not an
    /// error; only malformed data or wiring bugs fail.
    fn aggregate_file(&mut self, context: &mut FileAggregateContext<'_, '_>) -> Result<()>;
}

/// A pluggable metric computation.
pub trait Formula {
    type Counter: Counter;

    /// A fresh accumulator for one tree node.
    fn create_counter(&self) -> Self::Counter;

    /// Turn a finished counter into a measure for one output metric, or
    /// nothing when the counter observed no contribution.
    ///
    /// Asking for a metric outside [`Formula::output_metric_keys`] is a
    /// wiring bug and fails with
    /// [`CovdeltaError::UnsupportedMetric`](crate::CovdeltaError::UnsupportedMetric).
    fn create_measure(
        &self,
        counter: &Self::Counter,
        context: &CreateMeasureContext<'_>,
    ) -> Result<Option<Measure>>;

    /// The metric keys this formula produces measures for.
    fn output_metric_keys(&self) -> &[&str];
}
