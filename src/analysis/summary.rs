//! Summary cards: deal totals, status counts and per-owner statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{DealOutcome, DealRecord, StatusVocabulary};

/// Total deal count and the count for each vocabulary label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
}

impl StatusCounts {
    /// Counts the vocabulary labels over in-memory records.
    #[allow(dead_code)] // In-memory counterpart of source::status_counts
    pub fn tally(records: &[DealRecord], vocabulary: &StatusVocabulary) -> Self {
        let mut by_status: BTreeMap<String, u64> = vocabulary
            .labels()
            .iter()
            .map(|label| (label.to_string(), 0))
            .collect();

        for status in records.iter().filter_map(|r| r.status.as_deref()) {
            if let Some(count) = by_status.get_mut(status) {
                *count += 1;
            }
        }

        Self {
            total: records.len() as u64,
            by_status,
        }
    }

    pub fn get(&self, label: &str) -> u64 {
        self.by_status.get(label).copied().unwrap_or(0)
    }
}

/// Deals handled by one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerStat {
    pub owner: String,
    pub total: u64,
    pub won: u64,
    /// Won share in percent, one decimal.
    pub rate: f64,
}

/// Deals per canonical outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeBreakdown {
    pub won: u64,
    pub open: u64,
    pub lost: u64,
}

impl OutcomeBreakdown {
    fn record(&mut self, outcome: DealOutcome) {
        match outcome {
            DealOutcome::Won => self.won += 1,
            DealOutcome::Open => self.open += 1,
            DealOutcome::Lost => self.lost += 1,
        }
    }
}

/// Figures shown on the dashboard summary cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSummary {
    pub total_deals: u64,
    pub status_counts: StatusCounts,
    /// Won share of all deals in percent, one decimal.
    pub conversion_rate: f64,
    pub outcomes: OutcomeBreakdown,
    pub owner_stats: Vec<OwnerStat>,
}

/// `part / total * 100` rounded to one decimal, 0 when `total` is 0.
pub fn rate_one_decimal(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Builds the summary from source-side status counts and the fetched records.
///
/// Owner statistics cover at most `max_owner_stats` owners in lexicographic
/// order. Records without an owner are left out of them.
pub fn summarize(
    records: &[DealRecord],
    vocabulary: &StatusVocabulary,
    status_counts: StatusCounts,
    max_owner_stats: usize,
) -> DealSummary {
    let mut outcomes = OutcomeBreakdown::default();
    let mut per_owner: BTreeMap<&str, (u64, u64)> = BTreeMap::new();

    for record in records {
        let status = record.status.as_deref().unwrap_or_default();
        outcomes.record(vocabulary.outcome(status));

        let Some(owner) = record.owner.as_deref().filter(|o| !o.is_empty()) else {
            continue;
        };
        let entry = per_owner.entry(owner).or_insert((0, 0));
        entry.0 += 1;
        if vocabulary.is_won(status) {
            entry.1 += 1;
        }
    }

    let owner_stats = per_owner
        .into_iter()
        .take(max_owner_stats)
        .map(|(owner, (total, won))| OwnerStat {
            owner: owner.to_string(),
            total,
            won,
            rate: rate_one_decimal(won, total),
        })
        .collect();

    let won = status_counts.get(&vocabulary.won);

    DealSummary {
        total_deals: status_counts.total,
        conversion_rate: rate_one_decimal(won, status_counts.total),
        status_counts,
        outcomes,
        owner_stats,
    }
}
