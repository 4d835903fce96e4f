//! Per-period optional accumulators used by counters.
//!
//! A value stays `Unset` until the first contribution for its period, then
//! holds a running sum. The combine operation is associative and
//! commutative, which is what makes parent-from-children aggregation
//! independent of child visitation order.

use crate::period::{Period, MAX_PERIOD_COUNT};

/// A deferred per-period value: unset until the first contribution.
///
/// `Unset ⊕ x = x` and `Value(a) ⊕ Value(b) = Value(a + b)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VariationValue {
    #[default]
    Unset,
    Value(i64),
}

impl VariationValue {
    /// Add to the value, setting it on first contribution.
    pub fn increment(&mut self, by: i64) {
        *self = VariationValue::Value(self.value() + by);
    }

    /// Fold another value in; an unset other leaves this one untouched.
    pub fn combine(&mut self, other: &VariationValue) {
        if let VariationValue::Value(v) = other {
            self.increment(*v);
        }
    }

    /// Whether at least one contribution was recorded.
    pub fn is_set(&self) -> bool {
        matches!(self, VariationValue::Value(_))
    }

    /// The accumulated value, 0 when unset.
    pub fn value(&self) -> i64 {
        match self {
            VariationValue::Unset => 0,
            VariationValue::Value(v) => *v,
        }
    }
}

/// One [`VariationValue`] slot per trackable period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariationArray {
    values: [VariationValue; MAX_PERIOD_COUNT],
}

impl VariationArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the slot of a period.
    pub fn increment(&mut self, period: &Period, by: i64) {
        self.values[period.array_index()].increment(by);
    }

    /// Fold every slot of another array into this one.
    pub fn combine(&mut self, other: &VariationArray) {
        for (slot, other_slot) in self.values.iter_mut().zip(other.values.iter()) {
            slot.combine(other_slot);
        }
    }

    /// The slot of a period.
    pub fn get(&self, period: &Period) -> VariationValue {
        self.values[period.array_index()]
    }
}
