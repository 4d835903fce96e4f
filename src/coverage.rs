//! New-coverage computation: how much of the code added since each baseline
//! is covered by tests.
//!
//! Three parameterized instances of one formula cover the three input
//! families (unit test, integration test, overall coverage). Each FILE node
//! contributes its per-line hit and condition counts, classified as new or
//! not by the line's changeset attribution date; containers sum their
//! children. These measures carry no value, only per-period variations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::debug;

use crate::component::Component;
use crate::counter::VariationArray;
use crate::error::CovdeltaError;
use crate::formula::{Counter, CreateMeasureContext, FileAggregateContext, Formula};
use crate::measure::{Measure, MeasureValue, MeasureVariations, ValueType};
use crate::metric::{self, MetricDirectory};
use crate::period::Period;
use crate::report::{parse_count_by_line, ReportReader};
use crate::repository::MeasureRepository;
use crate::visitor::FormulaExecutor;
use crate::Result;

/// The line-data metrics one coverage family reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewCoverageInputMetricKeys {
    line_hits_data: &'static str,
    conditions_by_line: &'static str,
    covered_conditions_by_line: &'static str,
}

impl NewCoverageInputMetricKeys {
    pub fn new(
        line_hits_data: &'static str,
        conditions_by_line: &'static str,
        covered_conditions_by_line: &'static str,
    ) -> Self {
        Self {
            line_hits_data,
            conditions_by_line,
            covered_conditions_by_line,
        }
    }
}

/// The four variation metrics one coverage family produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewCoverageOutputMetricKeys {
    new_lines_to_cover: &'static str,
    new_uncovered_lines: &'static str,
    new_conditions_to_cover: &'static str,
    new_uncovered_conditions: &'static str,
}

impl NewCoverageOutputMetricKeys {
    pub fn new(
        new_lines_to_cover: &'static str,
        new_uncovered_lines: &'static str,
        new_conditions_to_cover: &'static str,
        new_uncovered_conditions: &'static str,
    ) -> Self {
        Self {
            new_lines_to_cover,
            new_uncovered_lines,
            new_conditions_to_cover,
            new_uncovered_conditions,
        }
    }
}

/// Formula computing new-coverage variation measures for one input family.
pub struct NewCoverageFormula {
    input: NewCoverageInputMetricKeys,
    output: NewCoverageOutputMetricKeys,
    output_keys: [&'static str; 4],
}

impl NewCoverageFormula {
    pub fn new(input: NewCoverageInputMetricKeys, output: NewCoverageOutputMetricKeys) -> Self {
        Self {
            input,
            output,
            output_keys: [
                output.new_lines_to_cover,
                output.new_uncovered_lines,
                output.new_conditions_to_cover,
                output.new_uncovered_conditions,
            ],
        }
    }

    /// Unit test coverage family.
    pub fn unit_tests() -> Self {
        Self::new(
            NewCoverageInputMetricKeys::new(
                metric::COVERAGE_LINE_HITS_DATA_KEY,
                metric::CONDITIONS_BY_LINE_KEY,
                metric::COVERED_CONDITIONS_BY_LINE_KEY,
            ),
            NewCoverageOutputMetricKeys::new(
                metric::NEW_LINES_TO_COVER_KEY,
                metric::NEW_UNCOVERED_LINES_KEY,
                metric::NEW_CONDITIONS_TO_COVER_KEY,
                metric::NEW_UNCOVERED_CONDITIONS_KEY,
            ),
        )
    }

    /// Integration test coverage family.
    pub fn integration_tests() -> Self {
        Self::new(
            NewCoverageInputMetricKeys::new(
                metric::IT_COVERAGE_LINE_HITS_DATA_KEY,
                metric::IT_CONDITIONS_BY_LINE_KEY,
                metric::IT_COVERED_CONDITIONS_BY_LINE_KEY,
            ),
            NewCoverageOutputMetricKeys::new(
                metric::NEW_IT_LINES_TO_COVER_KEY,
                metric::NEW_IT_UNCOVERED_LINES_KEY,
                metric::NEW_IT_CONDITIONS_TO_COVER_KEY,
                metric::NEW_IT_UNCOVERED_CONDITIONS_KEY,
            ),
        )
    }

    /// Overall (unit + integration) coverage family.
    pub fn overall() -> Self {
        Self::new(
            NewCoverageInputMetricKeys::new(
                metric::OVERALL_COVERAGE_LINE_HITS_DATA_KEY,
                metric::OVERALL_CONDITIONS_BY_LINE_KEY,
                metric::OVERALL_COVERED_CONDITIONS_BY_LINE_KEY,
            ),
            NewCoverageOutputMetricKeys::new(
                metric::NEW_OVERALL_LINES_TO_COVER_KEY,
                metric::NEW_OVERALL_UNCOVERED_LINES_KEY,
                metric::NEW_OVERALL_CONDITIONS_TO_COVER_KEY,
                metric::NEW_OVERALL_UNCOVERED_CONDITIONS_KEY,
            ),
        )
    }

    fn value_for_metric(&self, counter: &NewCoverageCounter, period: &Period, metric_key: &str) -> Result<i64> {
        if metric_key == self.output.new_lines_to_cover {
            return Ok(counter.new_lines(period));
        }
        if metric_key == self.output.new_uncovered_lines {
            return Ok(counter.new_lines(period) - counter.new_covered_lines(period));
        }
        if metric_key == self.output.new_conditions_to_cover {
            return Ok(counter.new_conditions(period));
        }
        if metric_key == self.output.new_uncovered_conditions {
            return Ok(counter.new_conditions(period) - counter.new_covered_conditions(period));
        }
        Err(CovdeltaError::UnsupportedMetric(metric_key.to_string()))
    }
}

impl Formula for NewCoverageFormula {
    type Counter = NewCoverageCounter;

    fn create_counter(&self) -> NewCoverageCounter {
        NewCoverageCounter::new(self.input)
    }

    fn create_measure(
        &self,
        counter: &NewCoverageCounter,
        context: &CreateMeasureContext<'_>,
    ) -> Result<Option<Measure>> {
        let mut builder = MeasureVariations::builder();
        for period in context.periods() {
            if counter.has_new_code(period) {
                let value = self.value_for_metric(counter, period, context.metric().key())?;
                builder.set_variation(period, value as f64);
            }
        }
        Ok(builder
            .build()
            .map(|variations| Measure::no_value().with_variations(variations)))
    }

    fn output_metric_keys(&self) -> &[&str] {
        &self.output_keys
    }
}

/// Per-node accumulator of new-line and new-condition counts per period.
pub struct NewCoverageCounter {
    input: NewCoverageInputMetricKeys,
    new_lines: VariationArray,
    new_covered_lines: VariationArray,
    new_conditions: VariationArray,
    new_covered_conditions: VariationArray,
}

impl NewCoverageCounter {
    fn new(input: NewCoverageInputMetricKeys) -> Self {
        Self {
            input,
            new_lines: VariationArray::new(),
            new_covered_lines: VariationArray::new(),
            new_conditions: VariationArray::new(),
            new_covered_conditions: VariationArray::new(),
        }
    }

    /// Classify one line against every period and record its contribution.
    ///
    /// A line with no attribution date contributes nothing. A line belongs
    /// to a period when its date is strictly after the period's snapshot
    /// date; a line touched on the boundary day instant itself is not new.
    pub fn analyze(
        &mut self,
        periods: &[Period],
        line_date: Option<DateTime<Utc>>,
        hits: i64,
        conditions: i64,
        covered_conditions: i64,
    ) {
        let Some(line_date) = line_date else {
            return;
        };
        for period in periods {
            if line_date > period.snapshot_date() {
                self.increment_lines(period, hits);
                self.increment_conditions(period, conditions, covered_conditions);
            }
        }
    }

    fn increment_lines(&mut self, period: &Period, hits: i64) {
        self.new_lines.increment(period, 1);
        if hits > 0 {
            self.new_covered_lines.increment(period, 1);
        }
    }

    fn increment_conditions(&mut self, period: &Period, conditions: i64, covered_conditions: i64) {
        self.new_conditions.increment(period, conditions);
        if conditions > 0 {
            self.new_covered_conditions.increment(period, covered_conditions);
        }
    }

    /// Whether any line was classified as new for this period, here or in
    /// any descendant merged in so far.
    pub fn has_new_code(&self, period: &Period) -> bool {
        self.new_lines.get(period).is_set()
    }

    pub fn new_lines(&self, period: &Period) -> i64 {
        self.new_lines.get(period).value()
    }

    pub fn new_covered_lines(&self, period: &Period) -> i64 {
        self.new_covered_lines.get(period).value()
    }

    pub fn new_conditions(&self, period: &Period) -> i64 {
        self.new_conditions.get(period).value()
    }

    pub fn new_covered_conditions(&self, period: &Period) -> i64 {
        self.new_covered_conditions.get(period).value()
    }
}

/// Line-data payload of a measure: the parsed `line=count` map.
///
/// Absent and no-value measures yield an empty map; any other non-string
/// payload is a wiring bug between the metric directory and the analyzer.
fn count_by_line(measure: Option<Measure>, metric_key: &str) -> Result<BTreeMap<u32, i64>> {
    let Some(measure) = measure else {
        return Ok(BTreeMap::new());
    };
    match measure.value() {
        MeasureValue::NoValue => Ok(BTreeMap::new()),
        MeasureValue::Text(data) => parse_count_by_line(data),
        _ => Err(CovdeltaError::MalformedMeasure {
            metric_key: metric_key.to_string(),
            expected: ValueType::String,
        }),
    }
}

impl Counter for NewCoverageCounter {
    fn aggregate(&mut self, child: &Self) {
        self.new_lines.combine(&child.new_lines);
        self.new_covered_lines.combine(&child.new_covered_lines);
        self.new_conditions.combine(&child.new_conditions);
        self.new_covered_conditions.combine(&child.new_covered_conditions);
    }

    fn aggregate_file(&mut self, context: &mut FileAggregateContext<'_, '_>) -> Result<()> {
        // No SCM attribution means no line can be classified as new.
        if context.changesets().is_none() {
            return Ok(());
        }

        let hits_measure = context.measure(self.input.line_hits_data)?;
        let hits_present = hits_measure
            .as_ref()
            .is_some_and(|measure| measure.value_type() != ValueType::NoValue);
        if !hits_present {
            return Ok(());
        }

        let hits_by_line = count_by_line(hits_measure, self.input.line_hits_data)?;
        let conditions_by_line = count_by_line(
            context.measure(self.input.conditions_by_line)?,
            self.input.conditions_by_line,
        )?;
        let covered_conditions_by_line = count_by_line(
            context.measure(self.input.covered_conditions_by_line)?,
            self.input.covered_conditions_by_line,
        )?;

        let Some(changesets) = context.changesets() else {
            return Ok(());
        };
        let periods = context.periods();
        for (&line, &hits) in &hits_by_line {
            let conditions = conditions_by_line.get(&line).copied().unwrap_or(0);
            let covered_conditions = covered_conditions_by_line.get(&line).copied().unwrap_or(0);
            self.analyze(
                periods,
                changesets.date_for_line(line),
                hits,
                conditions,
                covered_conditions,
            );
        }
        Ok(())
    }
}

/// Compute every new-coverage measure for one analysis run.
///
/// Builds the three family formulas and performs a single post-order
/// traversal from `root`; afterwards the repository holds every produced
/// measure, ready for downstream persistence.
pub fn compute_new_coverage(
    root: &Component,
    periods: &[Period],
    reader: &dyn ReportReader,
    metrics: &MetricDirectory,
    repository: &mut MeasureRepository<'_>,
) -> Result<()> {
    debug!("computing new coverage measures");
    let unit_tests = NewCoverageFormula::unit_tests();
    let integration_tests = NewCoverageFormula::integration_tests();
    let overall = NewCoverageFormula::overall();

    FormulaExecutor::new(metrics, periods, reader)
        .with_formula(&unit_tests)
        .with_formula(&integration_tests)
        .with_formula(&overall)
        .visit(root, repository)
}
