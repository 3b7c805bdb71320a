//! Monthly totals, successes and conversion rates.

use rand::Rng;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::classify::classify;
use super::synthetic;
use super::window::MonthWindow;
use crate::models::{Aggregated, DealRecord, MonthKey, StatusVocabulary};

/// Per-month deal totals and won counts over a month window.
///
/// Every window month has an entry in both maps, zero when no record fell
/// into it. Iteration is chronological.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlySeries {
    totals: BTreeMap<MonthKey, u64>,
    successes: BTreeMap<MonthKey, u64>,
}

impl MonthlySeries {
    /// A series with every window month at zero.
    pub fn zeroed(window: &MonthWindow) -> Self {
        let totals: BTreeMap<MonthKey, u64> = window.iter().map(|m| (*m, 0)).collect();
        Self {
            successes: totals.clone(),
            totals,
        }
    }

    pub(crate) fn set(&mut self, month: MonthKey, total: u64, success: u64) {
        self.totals.insert(month, total);
        self.successes.insert(month, success);
    }

    pub fn months(&self) -> impl Iterator<Item = &MonthKey> {
        self.totals.keys()
    }

    pub fn total(&self, month: &MonthKey) -> u64 {
        self.totals.get(month).copied().unwrap_or(0)
    }

    pub fn success(&self, month: &MonthKey) -> u64 {
        self.successes.get(month).copied().unwrap_or(0)
    }

    /// Won share of the month in percent; 0 when the month has no deals.
    pub fn conversion_rate(&self, month: &MonthKey) -> f64 {
        let total = self.total(month);
        if total == 0 {
            0.0
        } else {
            self.success(month) as f64 / total as f64 * 100.0
        }
    }

    pub fn grand_total(&self) -> u64 {
        self.totals.values().sum()
    }

    pub fn grand_success(&self) -> u64 {
        self.successes.values().sum()
    }
}

#[derive(Serialize)]
struct MonthEntry {
    month: MonthKey,
    total: u64,
    success: u64,
    conversion_rate: f64,
}

#[derive(Serialize)]
struct SeriesView {
    months: Vec<MonthEntry>,
    total: u64,
    success: u64,
}

/// Serialized as one entry per month carrying its conversion rate.
impl Serialize for MonthlySeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let months = self
            .months()
            .map(|month| MonthEntry {
                month: *month,
                total: self.total(month),
                success: self.success(month),
                conversion_rate: self.conversion_rate(month),
            })
            .collect();

        SeriesView {
            months,
            total: self.grand_total(),
            success: self.grand_success(),
        }
        .serialize(serializer)
    }
}

/// Counts in-window records per month. Records that cannot be bucketed or
/// fall outside the window are skipped.
pub fn count_monthly(
    records: &[DealRecord],
    window: &MonthWindow,
    vocabulary: &StatusVocabulary,
) -> MonthlySeries {
    let mut series = MonthlySeries::zeroed(window);
    let mut skipped = 0usize;

    for record in records {
        let class = classify(record, vocabulary);
        let Some(month) = class.month.filter(|m| window.contains(m)) else {
            skipped += 1;
            continue;
        };

        *series.totals.entry(month).or_insert(0) += 1;
        if class.success {
            *series.successes.entry(month).or_insert(0) += 1;
        }
    }

    debug!(
        "Monthly aggregation: {} records counted, {} skipped",
        records.len() - skipped,
        skipped
    );

    series
}

/// Monthly series with the empty-input fallback.
///
/// When no record lands in the window the all-zero result is replaced by
/// synthetic counts drawn from `rng` and returned as `Aggregated::Fallback`.
pub fn aggregate_monthly<R: Rng + ?Sized>(
    records: &[DealRecord],
    window: &MonthWindow,
    vocabulary: &StatusVocabulary,
    rng: &mut R,
) -> Aggregated<MonthlySeries> {
    let series = count_monthly(records, window, vocabulary);

    if series.grand_total() > 0 {
        return Aggregated::Computed(series);
    }

    warn!(
        "No deals in the {}-month window; substituting sample monthly data",
        window.len()
    );
    Aggregated::Fallback(synthetic::monthly_series(window, rng))
}
