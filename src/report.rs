//! Reading the external analyzer's output: raw measures and changesets.
//!
//! The analyzer reports, per file component, a list of raw measures (typed
//! payloads keyed by metric key) and optionally per-line source-control
//! attribution dates. Both are consumed through the [`ReportReader`] trait;
//! [`InMemoryReport`] is the map-backed implementation used by tests and by
//! embedders that already hold the analyzer output in memory.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::component::ComponentRef;
use crate::error::CovdeltaError;
use crate::measure::{CharacteristicId, Measure, MeasureScope, RuleId};
use crate::metric::Metric;
use crate::Result;

/// Typed payload of a raw analyzer measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Text(String),
}

/// One measure as reported by the analyzer, before conversion.
///
/// How the payload is interpreted is decided by the metric the key resolves
/// to, not by the payload itself; see [`RawMeasure::to_measure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasure {
    metric_key: String,
    value: RawValue,
    rule_id: Option<RuleId>,
    characteristic_id: Option<CharacteristicId>,
}

impl RawMeasure {
    /// Create a plain raw measure.
    pub fn new(metric_key: impl Into<String>, value: RawValue) -> Self {
        Self {
            metric_key: metric_key.into(),
            value,
            rule_id: None,
            characteristic_id: None,
        }
    }

    /// Attribute this raw measure to a rule.
    pub fn for_rule(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    /// Attribute this raw measure to a quality characteristic.
    pub fn for_characteristic(mut self, characteristic_id: CharacteristicId) -> Self {
        self.characteristic_id = Some(characteristic_id);
        self
    }

    pub fn metric_key(&self) -> &str {
        &self.metric_key
    }

    pub fn value(&self) -> &RawValue {
        &self.value
    }

    /// The scope discriminator this raw measure carries.
    pub fn scope(&self) -> MeasureScope {
        match (self.rule_id, self.characteristic_id) {
            (Some(rule_id), _) => MeasureScope::Rule(rule_id),
            (None, Some(characteristic_id)) => MeasureScope::Characteristic(characteristic_id),
            (None, None) => MeasureScope::Plain,
        }
    }

    /// Convert to a [`Measure`], driven by the metric's declared value type.
    ///
    /// A payload that does not fit the metric type is a hard error: the
    /// analyzer and the metric directory disagree about the metric.
    pub fn to_measure(&self, metric: &Metric) -> Result<Measure> {
        let mismatch = || CovdeltaError::MalformedMeasure {
            metric_key: self.metric_key.clone(),
            expected: metric.value_type(),
        };

        let measure = match (metric.value_type(), &self.value) {
            (crate::measure::ValueType::Int, RawValue::Int(v)) => Measure::int(*v),
            (crate::measure::ValueType::Long, RawValue::Long(v)) => Measure::long(*v),
            (crate::measure::ValueType::Long, RawValue::Int(v)) => Measure::long(i64::from(*v)),
            (crate::measure::ValueType::Double, RawValue::Double(v)) => Measure::double(*v),
            (crate::measure::ValueType::Bool, RawValue::Bool(v)) => Measure::boolean(*v),
            (crate::measure::ValueType::String, RawValue::Text(v)) => Measure::text(v.clone()),
            _ => return Err(mismatch()),
        };

        let measure = match self.scope() {
            MeasureScope::Plain => measure,
            MeasureScope::Rule(rule_id) => measure.for_rule(rule_id),
            MeasureScope::Characteristic(id) => measure.for_characteristic(id),
        };
        Ok(measure)
    }
}

/// Per-line source-control attribution for one file.
///
/// Lines are one-based. A line with no recorded date cannot be classified
/// as new code and is skipped during leaf accumulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changesets {
    dates: Vec<Option<DateTime<Utc>>>,
}

impl Changesets {
    /// Build from per-line dates, index 0 holding line 1.
    pub fn new(dates: Vec<Option<DateTime<Utc>>>) -> Self {
        Self { dates }
    }

    /// The attribution date of a one-based line, if recorded.
    pub fn date_for_line(&self, line: u32) -> Option<DateTime<Utc>> {
        if line == 0 {
            return None;
        }
        self.dates.get(line as usize - 1).copied().flatten()
    }
}

/// Access to the analyzer's per-component output.
pub trait ReportReader {
    /// Raw measures reported for a component. Empty when none were reported.
    fn measures(&self, component: ComponentRef) -> &[RawMeasure];

    /// Per-line changeset data for a component, absent when the file has no
    /// source-control history.
    fn changesets(&self, component: ComponentRef) -> Option<&Changesets>;
}

/// Map-backed [`ReportReader`].
#[derive(Debug, Default)]
pub struct InMemoryReport {
    measures: HashMap<ComponentRef, Vec<RawMeasure>>,
    changesets: HashMap<ComponentRef, Changesets>,
}

impl InMemoryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the raw measures of a component, replacing earlier ones.
    pub fn put_measures(&mut self, component: ComponentRef, measures: Vec<RawMeasure>) {
        self.measures.insert(component, measures);
    }

    /// Record the changesets of a component, replacing earlier ones.
    pub fn put_changesets(&mut self, component: ComponentRef, changesets: Changesets) {
        self.changesets.insert(component, changesets);
    }
}

impl ReportReader for InMemoryReport {
    fn measures(&self, component: ComponentRef) -> &[RawMeasure] {
        self.measures.get(&component).map(Vec::as_slice).unwrap_or(&[])
    }

    fn changesets(&self, component: ComponentRef) -> Option<&Changesets> {
        self.changesets.get(&component)
    }
}

/// Parse the compact `"line=count;line=count"` format used by line-data
/// measures. An empty string yields an empty map.
pub fn parse_count_by_line(data: &str) -> Result<BTreeMap<u32, i64>> {
    let mut counts = BTreeMap::new();
    if data.is_empty() {
        return Ok(counts);
    }

    let malformed = |message: &str| CovdeltaError::MalformedLineData {
        data: data.to_string(),
        message: message.to_string(),
    };

    for entry in data.split(';') {
        let (line, count) = entry
            .split_once('=')
            .ok_or_else(|| malformed("expected 'line=count' entries separated by ';'"))?;
        let line: u32 = line
            .parse()
            .map_err(|_| malformed("line number is not an integer"))?;
        let count: i64 = count
            .parse()
            .map_err(|_| malformed("count is not an integer"))?;
        counts.insert(line, count);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::ValueType;
    use crate::metric::MetricType;
    use chrono::TimeZone;

    #[test]
    fn test_parse_count_by_line() {
        let counts = parse_count_by_line("1=3;2=0;10=7").unwrap();
        assert_eq!(counts.get(&1), Some(&3));
        assert_eq!(counts.get(&2), Some(&0));
        assert_eq!(counts.get(&10), Some(&7));
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn test_parse_count_by_line_empty() {
        assert!(parse_count_by_line("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_count_by_line_malformed() {
        assert!(matches!(
            parse_count_by_line("1:3"),
            Err(CovdeltaError::MalformedLineData { .. })
        ));
        assert!(matches!(
            parse_count_by_line("x=3"),
            Err(CovdeltaError::MalformedLineData { .. })
        ));
        assert!(matches!(
            parse_count_by_line("1=y"),
            Err(CovdeltaError::MalformedLineData { .. })
        ));
    }

    #[test]
    fn test_changesets_lookup() {
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let changesets = Changesets::new(vec![Some(t1), None]);

        assert_eq!(changesets.date_for_line(1), Some(t1));
        assert_eq!(changesets.date_for_line(2), None);
        assert_eq!(changesets.date_for_line(3), None);
        assert_eq!(changesets.date_for_line(0), None);
    }

    #[test]
    fn test_to_measure_by_metric_type() {
        let string_metric = Metric::new(1, "m", MetricType::Data);
        let raw = RawMeasure::new("m", RawValue::Text("1=2".into()));
        let measure = raw.to_measure(&string_metric).unwrap();
        assert_eq!(measure.value_type(), ValueType::String);

        let long_metric = Metric::new(2, "n", MetricType::Long);
        let raw = RawMeasure::new("n", RawValue::Int(5));
        let measure = raw.to_measure(&long_metric).unwrap();
        assert_eq!(measure.value(), &crate::measure::MeasureValue::Long(5));
    }

    #[test]
    fn test_to_measure_mismatch() {
        let int_metric = Metric::new(1, "m", MetricType::Int);
        let raw = RawMeasure::new("m", RawValue::Text("oops".into()));
        assert!(matches!(
            raw.to_measure(&int_metric),
            Err(CovdeltaError::MalformedMeasure { .. })
        ));
    }

    #[test]
    fn test_to_measure_keeps_scope() {
        let metric = Metric::new(1, "m", MetricType::Int);
        let raw = RawMeasure::new("m", RawValue::Int(3)).for_rule(42);
        let measure = raw.to_measure(&metric).unwrap();
        assert_eq!(measure.scope(), MeasureScope::Rule(42));
    }

    #[test]
    fn test_in_memory_report() {
        let mut report = InMemoryReport::new();
        let file = ComponentRef(1);
        report.put_measures(file, vec![RawMeasure::new("m", RawValue::Int(1))]);

        assert_eq!(report.measures(file).len(), 1);
        assert!(report.measures(ComponentRef(2)).is_empty());
        assert!(report.changesets(file).is_none());
    }
}
