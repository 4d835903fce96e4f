//! # covdelta
//!
//! A measure-computation engine that walks the hierarchical representation
//! of an analyzed project (files, directories, modules, project) and derives
//! "new code" coverage measures: how many lines and branch conditions were
//! added since each tracked baseline, and how many of those are covered.
//!
//! ## Overview
//!
//! Two independently produced, line-indexed datasets are reconciled per
//! file: hit/condition counts reported by an external analyzer, and
//! source-control attribution dates telling when each line was last touched.
//! A line counts as "new" for a period when its attribution date is strictly
//! after that period's baseline snapshot.
//!
//! The computation is organized around three pieces:
//!
//! - **Formulas and counters** ([`formula`]): a generic contract pairing a
//!   per-metric formula with a per-node accumulator, so unrelated metrics
//!   can share one traversal.
//! - **The aggregation engine** ([`visitor`]): a single post-order walk that
//!   fills leaf counters from raw data, merges children into parents, and
//!   asks every formula for output measures at every node.
//! - **The measure overlay** ([`repository`]): the per-run cache giving each
//!   (component, metric, scope) key at most one authoritative measure,
//!   falling back from computed values to raw analyzer values, with
//!   persisted baselines behind an explicit separate read.
//!
//! Raw data production, period selection and durable persistence live
//! outside this crate and are consumed through the [`ReportReader`] and
//! [`BaselineStore`] traits.
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use covdelta::metric::{COVERAGE_LINE_HITS_DATA_KEY, NEW_LINES_TO_COVER_KEY};
//! use covdelta::{
//!     compute_new_coverage, core_metrics, Changesets, Component, ComponentRef,
//!     InMemoryBaselineStore, InMemoryReport, MeasureRepository, Period, RawMeasure, RawValue,
//! };
//!
//! // One file, one baseline period.
//! let file = Component::file(ComponentRef(1));
//! let baseline = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let periods = vec![Period::new(1, baseline).unwrap()];
//!
//! // The analyzer reported hit counts for two lines; the changeset data
//! // says line 1 was touched after the baseline, line 2 long before it.
//! let mut report = InMemoryReport::new();
//! report.put_measures(
//!     file.reference(),
//!     vec![RawMeasure::new(
//!         COVERAGE_LINE_HITS_DATA_KEY,
//!         RawValue::Text("1=3;2=0".into()),
//!     )],
//! );
//! report.put_changesets(
//!     file.reference(),
//!     Changesets::new(vec![
//!         Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
//!         Some(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()),
//!     ]),
//! );
//!
//! let metrics = core_metrics();
//! let store = InMemoryBaselineStore::new();
//! let mut repository = MeasureRepository::new(&store, &report, &metrics);
//!
//! compute_new_coverage(&file, &periods, &report, &metrics, &mut repository).unwrap();
//!
//! let new_lines = metrics.by_key(NEW_LINES_TO_COVER_KEY).unwrap();
//! let measure = repository.raw_measure(&file, new_lines).unwrap().unwrap();
//! assert_eq!(
//!     measure.variations().unwrap().variation(&periods[0]),
//!     Some(1.0)
//! );
//! ```

pub mod component;
pub mod counter;
pub mod coverage;
pub mod error;
pub mod formula;
pub mod measure;
pub mod metric;
pub mod period;
pub mod report;
pub mod repository;
pub mod visitor;

pub use component::{Component, ComponentRef, ComponentType};
pub use counter::{VariationArray, VariationValue};
pub use coverage::{
    compute_new_coverage, NewCoverageCounter, NewCoverageFormula, NewCoverageInputMetricKeys,
    NewCoverageOutputMetricKeys,
};
pub use error::CovdeltaError;
pub use formula::{Counter, CreateMeasureContext, FileAggregateContext, Formula};
pub use measure::{
    CharacteristicId, Level, Measure, MeasureScope, MeasureValue, MeasureVariations,
    MeasureVariationsBuilder, RuleId, ValueType,
};
pub use metric::{core_metrics, Metric, MetricDirectory, MetricId, MetricType};
pub use period::{Period, MAX_PERIOD_COUNT};
pub use report::{parse_count_by_line, Changesets, InMemoryReport, RawMeasure, RawValue, ReportReader};
pub use repository::{BaselineStore, InMemoryBaselineStore, MeasureRepository};
pub use visitor::FormulaExecutor;

/// Result type for covdelta operations
pub type Result<T> = std::result::Result<T, CovdeltaError>;
