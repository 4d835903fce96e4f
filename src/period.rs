//! Comparison periods: the historical baselines "new code" is measured against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CovdeltaError;
use crate::Result;

/// Maximum number of simultaneously tracked periods in one run.
pub const MAX_PERIOD_COUNT: usize = 5;

/// A historical baseline snapshot.
///
/// A line counts as "new" for a period when its changeset attribution date
/// is strictly after the period's snapshot date. Periods are supplied once
/// per run and never change during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    index: usize,
    snapshot_date: DateTime<Utc>,
}

impl Period {
    /// Create a period. `index` must be in `1..=MAX_PERIOD_COUNT`.
    pub fn new(index: usize, snapshot_date: DateTime<Utc>) -> Result<Self> {
        if index == 0 || index > MAX_PERIOD_COUNT {
            return Err(CovdeltaError::InvalidPeriodIndex(index));
        }
        Ok(Self {
            index,
            snapshot_date,
        })
    }

    /// The period's one-based identifier.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The baseline snapshot date.
    pub fn snapshot_date(&self) -> DateTime<Utc> {
        self.snapshot_date
    }

    /// Zero-based slot for per-period arrays.
    pub(crate) fn array_index(&self) -> usize {
        self.index - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_valid_indexes() {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for index in 1..=MAX_PERIOD_COUNT {
            let period = Period::new(index, date).unwrap();
            assert_eq!(period.index(), index);
            assert_eq!(period.array_index(), index - 1);
        }
    }

    #[test]
    fn test_invalid_indexes() {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            Period::new(0, date),
            Err(CovdeltaError::InvalidPeriodIndex(0))
        ));
        assert!(matches!(
            Period::new(MAX_PERIOD_COUNT + 1, date),
            Err(CovdeltaError::InvalidPeriodIndex(_))
        ));
    }
}
