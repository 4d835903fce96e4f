//! Measures: the immutable values attached to (component, metric) pairs.
//!
//! A measure carries a typed value, optionally a set of per-period numeric
//! variations, and optionally a scope discriminator attributing it to a rule
//! or a quality characteristic. Measures are never mutated; "updating" one
//! in the repository means replacing it with a new immutable value.

use serde::{Deserialize, Serialize};

use crate::period::{Period, MAX_PERIOD_COUNT};

/// Identity of a rule a measure can be attributed to.
pub type RuleId = u32;

/// Identity of a quality characteristic a measure can be attributed to.
pub type CharacteristicId = u32;

/// Quality gate level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Ok,
    Warn,
    Error,
}

/// Classification of the value a measure carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    NoValue,
    Int,
    Long,
    Double,
    Bool,
    String,
    Level,
}

/// The value of a measure, tagged by type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureValue {
    NoValue,
    Int(i32),
    Long(i64),
    Double(f64),
    Bool(bool),
    Text(String),
    Level(Level),
}

impl MeasureValue {
    /// The value type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            MeasureValue::NoValue => ValueType::NoValue,
            MeasureValue::Int(_) => ValueType::Int,
            MeasureValue::Long(_) => ValueType::Long,
            MeasureValue::Double(_) => ValueType::Double,
            MeasureValue::Bool(_) => ValueType::Bool,
            MeasureValue::Text(_) => ValueType::String,
            MeasureValue::Level(_) => ValueType::Level,
        }
    }
}

/// Scope discriminator: a measure is either plain or attributed to a rule
/// or characteristic. Scoped siblings may coexist under one metric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureScope {
    Plain,
    Rule(RuleId),
    Characteristic(CharacteristicId),
}

/// Per-period numeric variations of a measure.
///
/// Built through [`MeasureVariations::builder`]; an empty set of variations
/// cannot be constructed, which is how "emit nothing for periods with no new
/// code" is expressed at the type level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureVariations {
    variations: [Option<f64>; MAX_PERIOD_COUNT],
}

impl MeasureVariations {
    /// Start building a variation set.
    pub fn builder() -> MeasureVariationsBuilder {
        MeasureVariationsBuilder::default()
    }

    /// The variation recorded for a period, if any.
    pub fn variation(&self, period: &Period) -> Option<f64> {
        self.variations[period.array_index()]
    }
}

/// Accumulates per-period variations; yields `None` when nothing was set.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeasureVariationsBuilder {
    variations: [Option<f64>; MAX_PERIOD_COUNT],
}

impl MeasureVariationsBuilder {
    /// Record the variation for a period, replacing any previous value.
    pub fn set_variation(&mut self, period: &Period, value: f64) {
        self.variations[period.array_index()] = Some(value);
    }

    /// Whether no variation has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.variations.iter().all(Option::is_none)
    }

    /// Finish building; `None` when no variation was recorded.
    pub fn build(self) -> Option<MeasureVariations> {
        if self.is_empty() {
            return None;
        }
        Some(MeasureVariations {
            variations: self.variations,
        })
    }
}

/// An immutable measure value with optional variations and scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    value: MeasureValue,
    variations: Option<MeasureVariations>,
    scope: MeasureScope,
}

impl Measure {
    fn from_value(value: MeasureValue) -> Self {
        Self {
            value,
            variations: None,
            scope: MeasureScope::Plain,
        }
    }

    /// A measure carrying no value (variations-only measures use this).
    pub fn no_value() -> Self {
        Self::from_value(MeasureValue::NoValue)
    }

    pub fn int(value: i32) -> Self {
        Self::from_value(MeasureValue::Int(value))
    }

    pub fn long(value: i64) -> Self {
        Self::from_value(MeasureValue::Long(value))
    }

    pub fn double(value: f64) -> Self {
        Self::from_value(MeasureValue::Double(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::from_value(MeasureValue::Bool(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::from_value(MeasureValue::Text(value.into()))
    }

    pub fn level(value: Level) -> Self {
        Self::from_value(MeasureValue::Level(value))
    }

    /// Attach per-period variations.
    pub fn with_variations(mut self, variations: MeasureVariations) -> Self {
        self.variations = Some(variations);
        self
    }

    /// Attribute this measure to a rule.
    pub fn for_rule(mut self, rule_id: RuleId) -> Self {
        self.scope = MeasureScope::Rule(rule_id);
        self
    }

    /// Attribute this measure to a quality characteristic.
    pub fn for_characteristic(mut self, characteristic_id: CharacteristicId) -> Self {
        self.scope = MeasureScope::Characteristic(characteristic_id);
        self
    }

    pub fn value(&self) -> &MeasureValue {
        &self.value
    }

    /// The value type tag of the carried value.
    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    pub fn variations(&self) -> Option<&MeasureVariations> {
        self.variations.as_ref()
    }

    pub fn scope(&self) -> MeasureScope {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn period(index: usize) -> Period {
        Period::new(index, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).unwrap()
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Measure::no_value().value_type(), ValueType::NoValue);
        assert_eq!(Measure::int(1).value_type(), ValueType::Int);
        assert_eq!(Measure::long(1).value_type(), ValueType::Long);
        assert_eq!(Measure::double(1.0).value_type(), ValueType::Double);
        assert_eq!(Measure::boolean(true).value_type(), ValueType::Bool);
        assert_eq!(Measure::text("x").value_type(), ValueType::String);
        assert_eq!(Measure::level(Level::Warn).value_type(), ValueType::Level);
    }

    #[test]
    fn test_empty_variations_build_to_none() {
        let builder = MeasureVariations::builder();
        assert!(builder.is_empty());
        assert!(builder.build().is_none());
    }

    #[test]
    fn test_variations_round_trip() {
        let p1 = period(1);
        let p3 = period(3);

        let mut builder = MeasureVariations::builder();
        builder.set_variation(&p1, 4.0);
        builder.set_variation(&p3, 2.0);
        let variations = builder.build().unwrap();

        assert_eq!(variations.variation(&p1), Some(4.0));
        assert_eq!(variations.variation(&period(2)), None);
        assert_eq!(variations.variation(&p3), Some(2.0));
    }

    #[test]
    fn test_scope_builders() {
        assert_eq!(Measure::no_value().scope(), MeasureScope::Plain);
        assert_eq!(Measure::no_value().for_rule(123).scope(), MeasureScope::Rule(123));
        assert_eq!(
            Measure::no_value().for_characteristic(9).scope(),
            MeasureScope::Characteristic(9)
        );
    }
}
