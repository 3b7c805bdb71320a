//! Owner-by-month deal matrix.
//!
//! Counts deals per (month, owner) pair over a month window, with optional
//! status and owner filters, and derives per-owner, per-month and grand
//! success percentages.

use rand::Rng;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::classify::classify;
use super::synthetic;
use super::window::MonthWindow;
use crate::models::{Aggregated, DealRecord, MonthKey, OwnerFilter, StatusFilter, StatusVocabulary};

/// Counts for one (month, owner) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub total: u64,
    pub success: u64,
}

/// Total, won count and rounded success percentage over some cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub total: u64,
    pub success: u64,
    pub percent: u32,
}

impl Tally {
    pub fn from_counts(total: u64, success: u64) -> Self {
        let percent = if total > 0 {
            (success as f64 / total as f64 * 100.0).round() as u32
        } else {
            0
        };
        Self {
            total,
            success,
            percent,
        }
    }

    fn from_cells<'a>(cells: impl Iterator<Item = &'a Cell>) -> Self {
        let (total, success) =
            cells.fold((0, 0), |(t, s), cell| (t + cell.total, s + cell.success));
        Self::from_counts(total, success)
    }
}

/// Deal counts per month and owner.
///
/// Months iterate chronologically and owners lexicographically. Every
/// (month, owner) pair of the window and owner set has a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerMonthMatrix {
    owners: Vec<String>,
    cells: BTreeMap<MonthKey, BTreeMap<String, Cell>>,
}

impl OwnerMonthMatrix {
    /// A matrix with a zero cell for every window month and owner.
    /// Owners are sorted and deduplicated.
    pub fn zeroed(window: &MonthWindow, owners: Vec<String>) -> Self {
        let owners: Vec<String> = owners
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let row: BTreeMap<String, Cell> = owners
            .iter()
            .map(|o| (o.clone(), Cell::default()))
            .collect();
        let cells = window.iter().map(|month| (*month, row.clone())).collect();

        Self { owners, cells }
    }

    pub(crate) fn set(&mut self, month: MonthKey, owner: &str, total: u64, success: u64) {
        if let Some(cell) = self.cell_mut(&month, owner) {
            *cell = Cell { total, success };
        }
    }

    fn cell_mut(&mut self, month: &MonthKey, owner: &str) -> Option<&mut Cell> {
        self.cells.get_mut(month)?.get_mut(owner)
    }

    pub fn owners(&self) -> &[String] {
        &self.owners
    }

    pub fn months(&self) -> impl Iterator<Item = &MonthKey> {
        self.cells.keys()
    }

    pub fn cell(&self, month: &MonthKey, owner: &str) -> Cell {
        self.cells
            .get(month)
            .and_then(|row| row.get(owner))
            .copied()
            .unwrap_or_default()
    }

    /// One owner across all months.
    pub fn owner_tally(&self, owner: &str) -> Tally {
        Tally::from_cells(self.cells.values().filter_map(|row| row.get(owner)))
    }

    /// One month across all owners.
    pub fn month_tally(&self, month: &MonthKey) -> Tally {
        match self.cells.get(month) {
            Some(row) => Tally::from_cells(row.values()),
            None => Tally::default(),
        }
    }

    /// The whole matrix.
    pub fn grand_tally(&self) -> Tally {
        Tally::from_cells(self.cells.values().flat_map(|row| row.values()))
    }

    /// Projection onto a single owner's row.
    #[allow(dead_code)] // Compared against owner-filtered matrices
    pub fn restrict_to_owner(&self, owner: &str) -> Self {
        let cells = self
            .cells
            .iter()
            .map(|(month, row)| {
                let cell = row.get(owner).copied().unwrap_or_default();
                (*month, BTreeMap::from([(owner.to_string(), cell)]))
            })
            .collect();

        Self {
            owners: vec![owner.to_string()],
            cells,
        }
    }
}

#[derive(Serialize)]
struct MatrixView<'a> {
    owners: &'a [String],
    cells: &'a BTreeMap<MonthKey, BTreeMap<String, Cell>>,
    owner_tallies: BTreeMap<&'a str, Tally>,
    month_tallies: BTreeMap<MonthKey, Tally>,
    grand_tally: Tally,
}

/// Serialized with the per-owner, per-month and grand tallies alongside
/// the cells.
impl Serialize for OwnerMonthMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MatrixView {
            owners: &self.owners,
            cells: &self.cells,
            owner_tallies: self
                .owners
                .iter()
                .map(|owner| (owner.as_str(), self.owner_tally(owner)))
                .collect(),
            month_tallies: self
                .months()
                .map(|month| (*month, self.month_tally(month)))
                .collect(),
            grand_tally: self.grand_tally(),
        }
        .serialize(serializer)
    }
}

/// Inputs of the owner-month aggregation besides records and window.
#[derive(Debug, Clone, Copy)]
pub struct MatrixOptions<'a> {
    pub status: StatusFilter,
    pub owner: &'a OwnerFilter,
    /// Owner names known from elsewhere, used for the fallback roster.
    pub known_owners: &'a [String],
    /// Roster used by the fallback when no owners are known.
    pub fallback_owners: &'a [String],
}

/// Distinct non-empty owners, sorted.
pub fn distinct_owners(records: &[DealRecord]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.owner.as_deref())
        .filter(|owner| !owner.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Counts records per (month, owner).
///
/// The displayed owners are the filtered owner when an owner filter is set,
/// otherwise every distinct owner in `records`, taken before the status
/// filter is applied.
pub fn count_owner_months(
    records: &[DealRecord],
    window: &MonthWindow,
    vocabulary: &StatusVocabulary,
    status: StatusFilter,
    owner: &OwnerFilter,
) -> OwnerMonthMatrix {
    let display_owners = match owner.owner() {
        Some(name) => vec![name.to_string()],
        None => distinct_owners(records),
    };

    let status_label = status.label(vocabulary);
    let mut matrix = OwnerMonthMatrix::zeroed(window, display_owners);

    let filtered = records.iter().filter(|record| {
        status_label.map_or(true, |label| record.status.as_deref() == Some(label))
            && owner
                .owner()
                .map_or(true, |name| record.owner.as_deref() == Some(name))
    });

    let mut counted = 0usize;
    for record in filtered {
        let class = classify(record, vocabulary);
        let (Some(month), Some(name)) = (class.month, class.owner) else {
            continue;
        };

        if let Some(cell) = matrix.cell_mut(&month, name) {
            cell.total += 1;
            if class.success {
                cell.success += 1;
            }
            counted += 1;
        }
    }

    debug!(
        "Owner-month aggregation: {} owners, {} records counted",
        matrix.owners().len(),
        counted
    );

    matrix
}

/// Owner-month matrix with the empty-input fallback.
///
/// Falls back when there is no owner to display or no record was counted.
/// The sample roster is the filtered owner, else `known_owners`, else
/// `fallback_owners`.
pub fn aggregate_owner_months<R: Rng + ?Sized>(
    records: &[DealRecord],
    window: &MonthWindow,
    vocabulary: &StatusVocabulary,
    options: &MatrixOptions<'_>,
    rng: &mut R,
) -> Aggregated<OwnerMonthMatrix> {
    let matrix = count_owner_months(records, window, vocabulary, options.status, options.owner);

    if !matrix.owners().is_empty() && matrix.grand_tally().total > 0 {
        return Aggregated::Computed(matrix);
    }

    let roster: Vec<String> = match options.owner.owner() {
        Some(name) => vec![name.to_string()],
        None if !options.known_owners.is_empty() => options.known_owners.to_vec(),
        None => options.fallback_owners.to_vec(),
    };

    warn!(
        "No owner-month data for the current filters; substituting sample data for {} owners",
        roster.len()
    );
    Aggregated::Fallback(synthetic::owner_matrix(window, &roster, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn window(n: usize) -> MonthWindow {
        MonthWindow::build(NaiveDate::from_ymd_opt(2024, 4, 15).unwrap(), n)
    }

    fn key(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn sample_records() -> Vec<DealRecord> {
        vec![
            DealRecord::new("2024-03-05", "성사됨", "이사원"),
            DealRecord::new("2024-03-20", "진행중", "김대표"),
            DealRecord::new("2024-04-01", "성사됨", "김대표"),
            DealRecord::new("2024-04-02", "실패", "김대표"),
            DealRecord::new("2024-04-03", "실패", "박부장"),
            DealRecord::new("2023-01-01", "성사됨", "최과장"),
            DealRecord::new("2024-04-09", "성사됨", ""),
            DealRecord::new("bad date", "성사됨", "이사원"),
        ]
    }

    fn cell(total: u64, success: u64) -> Cell {
        Cell { total, success }
    }

    fn tally(total: u64, success: u64, percent: u32) -> Tally {
        Tally {
            total,
            success,
            percent,
        }
    }

    fn roster() -> Vec<String> {
        ["김대표", "이사원", "박부장", "최과장"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_distinct_owners_sorted() {
        let owners = distinct_owners(&sample_records());
        assert_eq!(owners, vec!["김대표", "박부장", "이사원", "최과장"]);
    }

    #[test]
    fn test_counts_and_tallies() {
        let vocab = StatusVocabulary::default();
        let matrix = count_owner_months(
            &sample_records(),
            &window(2),
            &vocab,
            StatusFilter::All,
            &OwnerFilter::All,
        );

        // Owners outside the window still get a row.
        assert_eq!(matrix.owners(), &["김대표", "박부장", "이사원", "최과장"]);
        assert_eq!(matrix.cell(&key("2024-04"), "김대표"), cell(2, 1));
        assert_eq!(matrix.cell(&key("2024-03"), "이사원"), cell(1, 1));
        assert_eq!(matrix.cell(&key("2024-03"), "최과장"), Cell::default());

        assert_eq!(matrix.owner_tally("김대표"), tally(3, 1, 33));
        assert_eq!(matrix.month_tally(&key("2024-04")), tally(3, 1, 33));
        assert_eq!(matrix.grand_tally(), tally(5, 2, 40));
        assert_eq!(matrix.owner_tally("최과장").percent, 0);
    }

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(Tally::from_counts(8, 1).percent, 13);
        assert_eq!(Tally::from_counts(200, 1).percent, 1);
        assert_eq!(Tally::from_counts(3, 2).percent, 67);
        assert_eq!(Tally::from_counts(0, 0).percent, 0);
    }

    #[test]
    fn test_status_filter_keeps_owner_rows() {
        let vocab = StatusVocabulary::default();
        let matrix = count_owner_months(
            &sample_records(),
            &window(2),
            &vocab,
            StatusFilter::Fail,
            &OwnerFilter::All,
        );

        assert_eq!(matrix.owners().len(), 4);
        assert_eq!(matrix.owner_tally("이사원").total, 0);
        assert_eq!(matrix.owner_tally("김대표"), tally(1, 0, 0));
        assert_eq!(matrix.grand_tally().total, 2);
    }

    #[test]
    fn test_owner_filter_idempotence() {
        let vocab = StatusVocabulary::default();
        let records = sample_records();
        let w = window(3);

        for status in [StatusFilter::All, StatusFilter::Success, StatusFilter::Fail] {
            let all = count_owner_months(&records, &w, &vocab, status, &OwnerFilter::All);
            for owner in all.owners() {
                let direct = count_owner_months(
                    &records,
                    &w,
                    &vocab,
                    status,
                    &OwnerFilter::Owner(owner.clone()),
                );
                assert_eq!(all.restrict_to_owner(owner), direct);
            }
        }
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let vocab = StatusVocabulary::default();
        let records = sample_records();
        let options = MatrixOptions {
            status: StatusFilter::All,
            owner: &OwnerFilter::All,
            known_owners: &[],
            fallback_owners: &roster(),
        };

        let w = window(12);
        let mut rng = StdRng::seed_from_u64(1);
        let first = aggregate_owner_months(&records, &w, &vocab, &options, &mut rng);

        let mut reversed = records.clone();
        reversed.reverse();
        let mut rng = StdRng::seed_from_u64(2);
        let second = aggregate_owner_months(&reversed, &w, &vocab, &options, &mut rng);

        assert!(!first.is_synthetic());
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallback_uses_default_roster() {
        let vocab = StatusVocabulary::default();
        let fallback = roster();
        let options = MatrixOptions {
            status: StatusFilter::All,
            owner: &OwnerFilter::All,
            known_owners: &[],
            fallback_owners: &fallback,
        };

        let mut rng = StdRng::seed_from_u64(5);
        let result = aggregate_owner_months(&[], &window(6), &vocab, &options, &mut rng);

        assert!(result.is_synthetic());
        let matrix = result.get();
        assert_eq!(matrix.owners().len(), 4);
        for month in matrix.months() {
            for owner in matrix.owners() {
                assert!((10..=30).contains(&matrix.cell(month, owner).total));
            }
        }
    }

    #[test]
    fn test_fallback_prefers_known_owners() {
        let vocab = StatusVocabulary::default();
        let known = vec!["정직원".to_string(), "홍과장".to_string()];
        let fallback = roster();
        let options = MatrixOptions {
            status: StatusFilter::All,
            owner: &OwnerFilter::All,
            known_owners: &known,
            fallback_owners: &fallback,
        };

        let mut rng = StdRng::seed_from_u64(5);
        let result = aggregate_owner_months(&[], &window(3), &vocab, &options, &mut rng);
        assert!(result.is_synthetic());
        assert_eq!(result.get().owners(), known.as_slice());
    }

    #[test]
    fn test_fallback_keeps_filtered_owner() {
        let vocab = StatusVocabulary::default();
        let owner = OwnerFilter::Owner("최과장".to_string());
        let known = vec!["정직원".to_string()];
        let fallback = roster();
        let options = MatrixOptions {
            status: StatusFilter::All,
            owner: &owner,
            known_owners: &known,
            fallback_owners: &fallback,
        };

        // 최과장 only has a deal outside the window.
        let records = sample_records();
        let mut rng = StdRng::seed_from_u64(5);
        let result = aggregate_owner_months(&records, &window(3), &vocab, &options, &mut rng);
        assert!(result.is_synthetic());
        assert_eq!(result.get().owners(), &["최과장"]);
    }

    #[test]
    fn test_serializes_tallies() {
        let vocab = StatusVocabulary::default();
        let matrix = count_owner_months(
            &sample_records(),
            &window(2),
            &vocab,
            StatusFilter::All,
            &OwnerFilter::All,
        );
        let json = serde_json::to_value(&matrix).unwrap();

        assert_eq!(json["cells"]["2024-04"]["김대표"]["total"], 2);
        assert_eq!(json["owner_tallies"]["김대표"]["percent"], 33);
        assert_eq!(json["month_tallies"]["2024-03"]["total"], 2);
        assert_eq!(json["month_tallies"]["2024-03"]["percent"], 50);
        assert_eq!(json["grand_tally"]["total"], 5);
        assert_eq!(json["grand_tally"]["percent"], 40);
        assert_eq!(json["owners"].as_array().map(Vec::len), Some(4));
    }
}
