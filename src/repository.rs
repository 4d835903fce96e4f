//! The measure overlay repository: the per-run cache of measures.
//!
//! Reads fall back through three layers: measures added or updated during
//! this run, raw analyzer-reported values (parsed lazily, then cached into
//! the same map so they become updatable), and the persisted baseline from
//! the previous analysis. The baseline is only ever consulted explicitly
//! through [`MeasureRepository::base_measure`], never by the raw-measure
//! lookups.

use std::collections::HashMap;

use crate::component::{Component, ComponentRef};
use crate::error::CovdeltaError;
use crate::measure::{CharacteristicId, Measure, MeasureScope, RuleId, ValueType};
use crate::metric::{Metric, MetricDirectory, MetricId};
use crate::report::ReportReader;
use crate::Result;

/// Read access to measures persisted by the previous analysis.
///
/// Implementations should scope any storage session around the single call;
/// the engine never holds a session across the traversal.
pub trait BaselineStore {
    /// The measure stored for the last snapshot of (component, metric), if
    /// one exists.
    fn last_value(&self, component: ComponentRef, metric: MetricId) -> Result<Option<Measure>>;
}

/// Map-backed [`BaselineStore`] for embedders and tests.
#[derive(Debug, Default)]
pub struct InMemoryBaselineStore {
    values: HashMap<(ComponentRef, MetricId), Measure>,
}

impl InMemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the last-snapshot measure for (component, metric).
    pub fn put(&mut self, component: ComponentRef, metric: MetricId, measure: Measure) {
        self.values.insert((component, metric), measure);
    }
}

impl BaselineStore for InMemoryBaselineStore {
    fn last_value(&self, component: ComponentRef, metric: MetricId) -> Result<Option<Measure>> {
        Ok(self.values.get(&(component, metric)).cloned())
    }
}

/// Overlay key: at most one measure per (component, metric, scope).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MeasureKey {
    component: ComponentRef,
    metric_key: String,
    scope: MeasureScope,
}

impl MeasureKey {
    fn new(component: &Component, metric: &Metric, scope: MeasureScope) -> Self {
        Self {
            component: component.reference(),
            metric_key: metric.key().to_string(),
            scope,
        }
    }
}

/// The per-run measure cache.
pub struct MeasureRepository<'a> {
    baseline: &'a dyn BaselineStore,
    reader: &'a dyn ReportReader,
    metrics: &'a MetricDirectory,
    measures: HashMap<MeasureKey, Measure>,
}

impl<'a> MeasureRepository<'a> {
    pub fn new(
        baseline: &'a dyn BaselineStore,
        reader: &'a dyn ReportReader,
        metrics: &'a MetricDirectory,
    ) -> Self {
        Self {
            baseline,
            reader,
            metrics,
            measures: HashMap::new(),
        }
    }

    /// The persisted measure of the last snapshot for (component, metric),
    /// absent when the previous analysis stored none.
    pub fn base_measure(&self, component: &Component, metric: &Metric) -> Result<Option<Measure>> {
        self.baseline.last_value(component.reference(), metric.id())
    }

    /// Insert a newly computed measure.
    ///
    /// Each (component, metric, scope) key may be populated at most once;
    /// a second `add` signals a double computation and fails.
    pub fn add(&mut self, component: &Component, metric: &Metric, measure: Measure) -> Result<()> {
        let key = MeasureKey::new(component, metric, measure.scope());
        if self.measures.contains_key(&key) {
            return Err(CovdeltaError::MeasureAlreadyExists {
                component: component.reference(),
                metric_key: metric.key().to_string(),
            });
        }
        self.measures.insert(key, measure);
        Ok(())
    }

    /// Replace an existing overlay entry.
    ///
    /// Fails when the key was never populated, or when the new measure's
    /// value type disagrees with the metric's declared type (a no-value
    /// measure is always accepted).
    pub fn update(&mut self, component: &Component, metric: &Metric, measure: Measure) -> Result<()> {
        let key = MeasureKey::new(component, metric, measure.scope());
        if !self.measures.contains_key(&key) {
            return Err(CovdeltaError::MeasureNotYetAdded {
                component: component.reference(),
                metric_key: metric.key().to_string(),
            });
        }
        if measure.value_type() != ValueType::NoValue && measure.value_type() != metric.value_type() {
            return Err(CovdeltaError::ValueTypeMismatch {
                measure: measure.value_type(),
                metric: metric.value_type(),
            });
        }
        self.measures.insert(key, measure);
        Ok(())
    }

    /// The current plain-scoped measure for (component, metric).
    ///
    /// Checks the overlay first, then parses a matching raw analyzer entry
    /// and caches it into the overlay so it can later be updated. Never
    /// consults the persisted baseline.
    pub fn raw_measure(&mut self, component: &Component, metric: &Metric) -> Result<Option<&Measure>> {
        self.raw_measure_scoped(component, metric, MeasureScope::Plain)
    }

    /// Like [`MeasureRepository::raw_measure`], for a rule-scoped entry.
    pub fn raw_measure_for_rule(
        &mut self,
        component: &Component,
        metric: &Metric,
        rule_id: RuleId,
    ) -> Result<Option<&Measure>> {
        self.raw_measure_scoped(component, metric, MeasureScope::Rule(rule_id))
    }

    /// Like [`MeasureRepository::raw_measure`], for a characteristic-scoped
    /// entry.
    pub fn raw_measure_for_characteristic(
        &mut self,
        component: &Component,
        metric: &Metric,
        characteristic_id: CharacteristicId,
    ) -> Result<Option<&Measure>> {
        self.raw_measure_scoped(component, metric, MeasureScope::Characteristic(characteristic_id))
    }

    fn raw_measure_scoped(
        &mut self,
        component: &Component,
        metric: &Metric,
        scope: MeasureScope,
    ) -> Result<Option<&Measure>> {
        let key = MeasureKey::new(component, metric, scope);
        if !self.measures.contains_key(&key) {
            let raw = self
                .reader
                .measures(component.reference())
                .iter()
                .find(|raw| raw.metric_key() == metric.key() && raw.scope() == scope);
            if let Some(raw) = raw {
                let measure = raw.to_measure(metric)?;
                self.measures.insert(key.clone(), measure);
            }
        }
        Ok(self.measures.get(&key))
    }

    /// Every measure currently known for a component, grouped by metric key.
    ///
    /// Overlay entries shadow raw analyzer entries with the same metric and
    /// scope; raw entries are converted on the fly and not cached.
    pub fn raw_measures(&self, component: &Component) -> Result<HashMap<String, Vec<Measure>>> {
        let reference = component.reference();
        let mut result: HashMap<String, Vec<Measure>> = HashMap::new();

        for (key, measure) in &self.measures {
            if key.component == reference {
                result.entry(key.metric_key.clone()).or_default().push(measure.clone());
            }
        }

        for raw in self.reader.measures(reference) {
            let shadowed = self.measures.contains_key(&MeasureKey {
                component: reference,
                metric_key: raw.metric_key().to_string(),
                scope: raw.scope(),
            });
            if shadowed {
                continue;
            }
            let metric = self.metrics.by_key(raw.metric_key())?;
            result
                .entry(raw.metric_key().to_string())
                .or_default()
                .push(raw.to_measure(metric)?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentType;
    use crate::metric::MetricType;
    use crate::report::{InMemoryReport, RawMeasure, RawValue};

    fn file(reference: u32) -> Component {
        Component::file(ComponentRef(reference))
    }

    fn string_metric(id: MetricId, key: &str) -> Metric {
        Metric::new(id, key, MetricType::String)
    }

    struct Fixture {
        baseline: InMemoryBaselineStore,
        report: InMemoryReport,
        metrics: MetricDirectory,
    }

    impl Fixture {
        fn new() -> Self {
            let mut metrics = MetricDirectory::new();
            metrics.register(string_metric(1, "metric-1"));
            metrics.register(string_metric(2, "metric-2"));
            Self {
                baseline: InMemoryBaselineStore::new(),
                report: InMemoryReport::new(),
                metrics,
            }
        }

        fn repository(&self) -> MeasureRepository<'_> {
            MeasureRepository::new(&self.baseline, &self.report, &self.metrics)
        }
    }

    #[test]
    fn test_add_twice_fails() {
        let fixture = Fixture::new();
        let mut repository = fixture.repository();
        let component = file(1);
        let metric = string_metric(1, "metric-1");

        repository.add(&component, &metric, Measure::text("a")).unwrap();
        assert!(matches!(
            repository.add(&component, &metric, Measure::text("a")),
            Err(CovdeltaError::MeasureAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_update_before_add_fails() {
        let fixture = Fixture::new();
        let mut repository = fixture.repository();

        assert!(matches!(
            repository.update(&file(1), &string_metric(1, "metric-1"), Measure::text("a")),
            Err(CovdeltaError::MeasureNotYetAdded { .. })
        ));
    }

    #[test]
    fn test_update_value_type_mismatch() {
        let fixture = Fixture::new();
        let mut repository = fixture.repository();
        let component = file(1);
        let metric = string_metric(1, "metric-1");

        repository.add(&component, &metric, Measure::text("a")).unwrap();
        assert!(matches!(
            repository.update(&component, &metric, Measure::int(3)),
            Err(CovdeltaError::ValueTypeMismatch {
                measure: ValueType::Int,
                metric: ValueType::String,
            })
        ));
    }

    #[test]
    fn test_update_accepts_no_value_for_any_metric_type() {
        let fixture = Fixture::new();
        let mut repository = fixture.repository();
        let component = file(1);

        let cases = [
            (Metric::new(10, "m-int", MetricType::Int), Measure::int(1)),
            (Metric::new(11, "m-bool", MetricType::Bool), Measure::boolean(true)),
            (Metric::new(12, "m-str", MetricType::String), Measure::text("v")),
        ];
        for (metric, initial) in cases {
            repository.add(&component, &metric, initial).unwrap();
            repository.update(&component, &metric, Measure::no_value()).unwrap();
        }
    }

    #[test]
    fn test_update_to_same_value_and_replacement() {
        let fixture = Fixture::new();
        let mut repository = fixture.repository();
        let component = file(1);
        let metric = string_metric(1, "metric-1");

        repository.add(&component, &metric, Measure::text("a")).unwrap();
        repository.update(&component, &metric, Measure::text("a")).unwrap();
        repository.update(&component, &metric, Measure::text("b")).unwrap();

        let current = repository.raw_measure(&component, &metric).unwrap().unwrap();
        assert_eq!(current, &Measure::text("b"));
    }

    #[test]
    fn test_raw_measure_matches_component_and_metric() {
        let fixture = Fixture::new();
        let mut repository = fixture.repository();
        let component = file(1);
        let metric1 = string_metric(1, "metric-1");
        let metric2 = string_metric(2, "metric-2");

        repository.add(&component, &metric1, Measure::text("a")).unwrap();

        assert!(repository.raw_measure(&component, &metric1).unwrap().is_some());
        assert!(repository.raw_measure(&component, &metric2).unwrap().is_none());
        assert!(repository.raw_measure(&file(2), &metric1).unwrap().is_none());
    }

    #[test]
    fn test_raw_measure_falls_back_to_report() {
        let mut fixture = Fixture::new();
        let component = file(1);
        fixture.report.put_measures(
            component.reference(),
            vec![RawMeasure::new("metric-1", RawValue::Text("from report".into()))],
        );
        let mut repository = fixture.repository();
        let metric = string_metric(1, "metric-1");

        let measure = repository.raw_measure(&component, &metric).unwrap().unwrap();
        assert_eq!(measure.value(), &crate::measure::MeasureValue::Text("from report".into()));

        assert!(repository.raw_measure(&component, &string_metric(2, "metric-2")).unwrap().is_none());
    }

    #[test]
    fn test_added_measure_shadows_report_value() {
        let mut fixture = Fixture::new();
        let component = file(1);
        fixture.report.put_measures(
            component.reference(),
            vec![RawMeasure::new("metric-1", RawValue::Text("raw".into()))],
        );
        let mut repository = fixture.repository();
        let metric = string_metric(1, "metric-1");

        repository.add(&component, &metric, Measure::text("computed")).unwrap();

        let measure = repository.raw_measure(&component, &metric).unwrap().unwrap();
        assert_eq!(measure, &Measure::text("computed"));
    }

    #[test]
    fn test_report_value_is_cached_and_becomes_updatable() {
        let mut fixture = Fixture::new();
        let component = file(1);
        fixture.report.put_measures(
            component.reference(),
            vec![RawMeasure::new("metric-1", RawValue::Text("raw".into()))],
        );
        let mut repository = fixture.repository();
        let metric = string_metric(1, "metric-1");

        repository.raw_measure(&component, &metric).unwrap();
        repository.update(&component, &metric, Measure::text("updated")).unwrap();

        let measure = repository.raw_measure(&component, &metric).unwrap().unwrap();
        assert_eq!(measure, &Measure::text("updated"));
    }

    #[test]
    fn test_scoped_siblings_under_one_metric() {
        let fixture = Fixture::new();
        let mut repository = fixture.repository();
        let component = file(1);
        let metric = string_metric(1, "metric-1");

        repository
            .add(&component, &metric, Measure::no_value().for_rule(123))
            .unwrap();
        repository
            .add(&component, &metric, Measure::no_value().for_rule(222))
            .unwrap();
        repository
            .add(&component, &metric, Measure::no_value().for_characteristic(9))
            .unwrap();

        let for_rule = repository
            .raw_measure_for_rule(&component, &metric, 123)
            .unwrap()
            .unwrap();
        assert_eq!(for_rule.scope(), MeasureScope::Rule(123));

        let for_characteristic = repository
            .raw_measure_for_characteristic(&component, &metric, 9)
            .unwrap()
            .unwrap();
        assert_eq!(for_characteristic.scope(), MeasureScope::Characteristic(9));

        assert!(repository
            .raw_measure_for_rule(&component, &metric, 999)
            .unwrap()
            .is_none());
        assert!(repository.raw_measure(&component, &metric).unwrap().is_none());
    }

    #[test]
    fn test_update_scoped_measure() {
        let fixture = Fixture::new();
        let mut repository = fixture.repository();
        let component = file(1);
        let metric = string_metric(1, "metric-1");

        repository
            .add(&component, &metric, Measure::text("v1").for_rule(123))
            .unwrap();
        repository
            .update(&component, &metric, Measure::text("v2").for_rule(123))
            .unwrap();

        let measure = repository
            .raw_measure_for_rule(&component, &metric, 123)
            .unwrap()
            .unwrap();
        assert_eq!(measure.value(), &crate::measure::MeasureValue::Text("v2".into()));
    }

    #[test]
    fn test_raw_measures_combines_overlay_and_report() {
        let mut fixture = Fixture::new();
        let component = file(1);
        fixture.report.put_measures(
            component.reference(),
            vec![
                RawMeasure::new("metric-1", RawValue::Text("raw 1".into())),
                RawMeasure::new("metric-2", RawValue::Text("raw 2".into())),
            ],
        );
        let mut repository = fixture.repository();
        let metric1 = string_metric(1, "metric-1");

        repository.add(&component, &metric1, Measure::text("computed")).unwrap();
        repository
            .add(&component, &metric1, Measure::no_value().for_characteristic(9))
            .unwrap();

        let all = repository.raw_measures(&component).unwrap();
        assert_eq!(all.len(), 2);

        let under_metric1 = &all["metric-1"];
        assert_eq!(under_metric1.len(), 2);
        assert!(under_metric1.contains(&Measure::text("computed")));
        assert!(under_metric1.contains(&Measure::no_value().for_characteristic(9)));

        assert_eq!(all["metric-2"], vec![Measure::text("raw 2")]);
    }

    #[test]
    fn test_base_measure() {
        let mut fixture = Fixture::new();
        let component = file(1);
        let metric = string_metric(1, "metric-1");
        fixture
            .baseline
            .put(component.reference(), metric.id(), Measure::text("baseline"));
        let repository = fixture.repository();

        let measure = repository.base_measure(&component, &metric).unwrap().unwrap();
        assert_eq!(measure, Measure::text("baseline"));

        assert!(repository
            .base_measure(&file(2), &metric)
            .unwrap()
            .is_none());
        assert!(repository
            .base_measure(&component, &string_metric(2, "metric-2"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_base_measure_propagates_store_errors() {
        struct FailingStore;
        impl BaselineStore for FailingStore {
            fn last_value(&self, _: ComponentRef, _: MetricId) -> crate::Result<Option<Measure>> {
                Err(CovdeltaError::BaselineStore("connection lost".into()))
            }
        }

        let report = InMemoryReport::new();
        let metrics = MetricDirectory::new();
        let store = FailingStore;
        let repository = MeasureRepository::new(&store, &report, &metrics);

        assert!(matches!(
            repository.base_measure(&file(1), &string_metric(1, "metric-1")),
            Err(CovdeltaError::BaselineStore(_))
        ));
    }

    #[test]
    fn test_overlay_ignores_baseline() {
        let mut fixture = Fixture::new();
        let component = file(1);
        let metric = string_metric(1, "metric-1");
        fixture
            .baseline
            .put(component.reference(), metric.id(), Measure::text("baseline"));
        let mut repository = fixture.repository();

        assert!(repository.raw_measure(&component, &metric).unwrap().is_none());
    }

    #[test]
    fn test_keys_distinguish_container_components() {
        let fixture = Fixture::new();
        let mut repository = fixture.repository();
        let metric = string_metric(1, "metric-1");
        let directory = Component::container(
            ComponentType::Directory,
            ComponentRef(10),
            vec![file(11)],
        );

        repository.add(&directory, &metric, Measure::text("dir")).unwrap();
        repository.add(&file(11), &metric, Measure::text("file")).unwrap();

        assert_eq!(
            repository.raw_measure(&directory, &metric).unwrap().unwrap(),
            &Measure::text("dir")
        );
    }
}
