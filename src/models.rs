//! Data models for the deal dashboard.
//!
//! This module contains the core data structures shared by the data
//! sources, the aggregation engine and the report generator.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::analysis::{DealSummary, MonthlySeries, OwnerMonthMatrix};

/// A calendar month (`YYYY-MM`) used as an aggregation bucket.
///
/// Ordering is chronological: by year, then by month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Creates a month key, returning `None` for a month outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month a calendar date falls in.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month `months` calendar months before this one.
    pub fn months_before(self, months: u32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) - months as i32;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid month key '{}': expected YYYY-MM", s))?;

        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid year in month key '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid month in month key '{}'", s))?;

        Self::new(year, month).ok_or_else(|| format!("Month out of range in '{}'", s))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Number of trailing months shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthSpan(usize);

impl MonthSpan {
    pub const DEFAULT: usize = 12;
    pub const SUPPORTED: [usize; 4] = [3, 6, 12, 24];

    /// Interprets a raw selector value. Absent, non-numeric or zero input
    /// falls back to the default of 12 months.
    pub fn from_input(input: Option<&str>) -> Self {
        input
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|months| *months > 0)
            .map_or_else(Self::default, Self)
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Whether the span is one of the selector options (3, 6, 12, 24).
    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self.0)
    }
}

impl Default for MonthSpan {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<usize> for MonthSpan {
    fn from(months: usize) -> Self {
        if months == 0 {
            Self::default()
        } else {
            Self(months)
        }
    }
}

/// Creation time of a deal as delivered by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedAt {
    /// Already parsed calendar date.
    Date(NaiveDate),
    /// Raw text, parsed lazily during classification.
    Text(String),
}

impl fmt::Display for CreatedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreatedAt::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            CreatedAt::Text(raw) => write!(f, "{}", raw),
        }
    }
}

/// A single CRM deal. Read-only input to the aggregation engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<CreatedAt>,
}

impl DealRecord {
    /// Creates a record from raw field values.
    #[allow(dead_code)] // Convenience constructor for hand-built records
    pub fn new(created_at: &str, status: &str, owner: &str) -> Self {
        Self {
            id: None,
            name: None,
            owner: Some(owner.to_string()),
            status: Some(status.to_string()),
            created_at: Some(CreatedAt::Text(created_at.to_string())),
        }
    }

    /// Extracts a record from a JSON row using the configured column names.
    pub fn from_row(row: &Map<String, Value>, fields: &FieldMap) -> Self {
        Self {
            id: text_field(row, &fields.id),
            name: text_field(row, &fields.name),
            owner: text_field(row, &fields.owner),
            status: text_field(row, &fields.status),
            created_at: text_field(row, &fields.created_at).map(CreatedAt::Text),
        }
    }
}

fn text_field(row: &Map<String, Value>, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Column names used to read deal rows from the data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    #[serde(default = "default_created_at_field")]
    pub created_at: String,

    #[serde(default = "default_owner_field")]
    pub owner: String,

    #[serde(default = "default_status_field")]
    pub status: String,

    #[serde(default = "default_id_field")]
    pub id: String,

    #[serde(default = "default_name_field")]
    pub name: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            created_at: default_created_at_field(),
            owner: default_owner_field(),
            status: default_status_field(),
            id: default_id_field(),
            name: default_name_field(),
        }
    }
}

fn default_created_at_field() -> String {
    "created_at".to_string()
}

fn default_owner_field() -> String {
    "manager".to_string()
}

fn default_status_field() -> String {
    "status".to_string()
}

fn default_id_field() -> String {
    "deal_id".to_string()
}

fn default_name_field() -> String {
    "deal_name".to_string()
}

/// Canonical outcome of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealOutcome {
    Won,
    Open,
    Lost,
}

impl fmt::Display for DealOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DealOutcome::Won => write!(f, "Won"),
            DealOutcome::Open => write!(f, "Open"),
            DealOutcome::Lost => write!(f, "Lost"),
        }
    }
}

/// Status labels used by one deployment.
///
/// `won` is the success sentinel: a deal counts as a success only when its
/// status equals it exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusVocabulary {
    #[serde(default = "default_won")]
    pub won: String,

    #[serde(default = "default_in_progress")]
    pub in_progress: String,

    #[serde(default = "default_failed")]
    pub failed: String,

    #[serde(default = "default_on_hold")]
    pub on_hold: String,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self {
            won: default_won(),
            in_progress: default_in_progress(),
            failed: default_failed(),
            on_hold: default_on_hold(),
        }
    }
}

fn default_won() -> String {
    "성사됨".to_string()
}

fn default_in_progress() -> String {
    "진행중".to_string()
}

fn default_failed() -> String {
    "실패".to_string()
}

fn default_on_hold() -> String {
    "보류".to_string()
}

impl StatusVocabulary {
    pub fn is_won(&self, status: &str) -> bool {
        status == self.won
    }

    /// Maps a raw status onto {won, open, lost}. Anything that is neither
    /// the won nor the failed label is still open.
    pub fn outcome(&self, status: &str) -> DealOutcome {
        if status == self.won {
            DealOutcome::Won
        } else if status == self.failed {
            DealOutcome::Lost
        } else {
            DealOutcome::Open
        }
    }

    /// All labels in display order.
    pub fn labels(&self) -> [&str; 4] {
        [&self.won, &self.in_progress, &self.failed, &self.on_hold]
    }
}

/// Status filter of the owner-month table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    /// No status restriction (default)
    #[default]
    All,
    /// Won deals only
    Success,
    /// Deals in progress only
    Progress,
    /// Failed deals only
    Fail,
}

impl StatusFilter {
    /// The status label this filter retains, `None` for `All`.
    pub fn label<'a>(&self, vocabulary: &'a StatusVocabulary) -> Option<&'a str> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Success => Some(&vocabulary.won),
            StatusFilter::Progress => Some(&vocabulary.in_progress),
            StatusFilter::Fail => Some(&vocabulary.failed),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => write!(f, "all"),
            StatusFilter::Success => write!(f, "success"),
            StatusFilter::Progress => write!(f, "progress"),
            StatusFilter::Fail => write!(f, "fail"),
        }
    }
}

/// Owner filter of the owner-month table: `all` or a single owner name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OwnerFilter {
    #[default]
    All,
    Owner(String),
}

impl OwnerFilter {
    pub fn owner(&self) -> Option<&str> {
        match self {
            OwnerFilter::All => None,
            OwnerFilter::Owner(name) => Some(name),
        }
    }
}

impl From<&str> for OwnerFilter {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            OwnerFilter::All
        } else {
            OwnerFilter::Owner(s.to_string())
        }
    }
}

impl fmt::Display for OwnerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerFilter::All => write!(f, "all"),
            OwnerFilter::Owner(name) => write!(f, "{}", name),
        }
    }
}

impl Serialize for OwnerFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OwnerFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(OwnerFilter::from(raw.as_str()))
    }
}

/// Aggregation output tagged with its provenance.
///
/// `Fallback` carries synthetic placeholder data generated because the real
/// input was empty; it must be shown as non-authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Aggregated<T> {
    Computed(T),
    Fallback(T),
}

impl<T> Aggregated<T> {
    /// The `usingSyntheticData` flag.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Aggregated::Fallback(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Aggregated::Computed(value) | Aggregated::Fallback(value) => value,
        }
    }

    /// The value only when it was computed from real records.
    #[allow(dead_code)] // Counterpart of get() for callers that must ignore sample data
    pub fn computed(&self) -> Option<&T> {
        match self {
            Aggregated::Computed(value) => Some(value),
            Aggregated::Fallback(_) => None,
        }
    }
}

/// One page of the recent-deals listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealPage {
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    /// Number of deals across all pages.
    pub total: u64,
    pub deals: Vec<DealRecord>,
}

impl DealPage {
    /// 1-based positions of the first and last deal on this page.
    pub fn shown_range(&self) -> Option<(u64, u64)> {
        if self.deals.is_empty() {
            return None;
        }
        let first = ((self.page.max(1) - 1) * self.page_size) as u64 + 1;
        let last = (first + self.deals.len() as u64 - 1).min(self.total.max(first));
        Some((first, last))
    }

    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size as u64)
    }
}

/// Metadata about a generated dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetadata {
    /// Description of the data source (URL or file path).
    pub source: String,
    pub generated_at: DateTime<Utc>,
    /// Last month of the window.
    pub reference_month: MonthKey,
    pub months: usize,
    pub status_filter: StatusFilter,
    pub owner_filter: OwnerFilter,
    /// Number of deal records fetched.
    pub records_fetched: usize,
    pub duration_seconds: f64,
}

/// The complete dashboard handed to the report generator.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub metadata: DashboardMetadata,
    pub summary: DealSummary,
    pub monthly: Aggregated<MonthlySeries>,
    pub owner_matrix: Aggregated<OwnerMonthMatrix>,
    pub recent: DealPage,
}

impl Dashboard {
    /// Whether any section shows synthetic data.
    pub fn uses_synthetic_data(&self) -> bool {
        self.monthly.is_synthetic() || self.owner_matrix.is_synthetic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_ordering_and_display() {
        let dec = MonthKey::new(2023, 12).unwrap();
        let jan = MonthKey::new(2024, 1).unwrap();
        assert!(dec < jan);
        assert_eq!(dec.to_string(), "2023-12");
        assert_eq!(jan.to_string(), "2024-01");
        assert!(MonthKey::new(2024, 13).is_none());
    }

    #[test]
    fn test_month_key_months_before_rolls_years() {
        let jan = MonthKey::new(2024, 1).unwrap();
        assert_eq!(jan.months_before(1).to_string(), "2023-12");
        assert_eq!(jan.months_before(2).to_string(), "2023-11");
        assert_eq!(jan.months_before(13).to_string(), "2022-12");
        assert_eq!(jan.months_before(0), jan);
    }

    #[test]
    fn test_month_key_parse() {
        assert_eq!("2024-03".parse::<MonthKey>(), Ok(MonthKey::new(2024, 3).unwrap()));
        assert!("2024/03".parse::<MonthKey>().is_err());
        assert!("2024-00".parse::<MonthKey>().is_err());
    }

    #[test]
    fn test_month_key_serializes_as_string() {
        let key = MonthKey::new(2024, 4).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2024-04\"");
        let back: MonthKey = serde_json::from_str("\"2024-04\"").unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_month_span_from_input() {
        assert_eq!(MonthSpan::from_input(None).get(), 12);
        assert_eq!(MonthSpan::from_input(Some("abc")).get(), 12);
        assert_eq!(MonthSpan::from_input(Some("0")).get(), 12);
        assert_eq!(MonthSpan::from_input(Some("6")).get(), 6);
        assert!(MonthSpan::from_input(Some("24")).is_supported());
        assert!(!MonthSpan::from_input(Some("5")).is_supported());
    }

    #[test]
    fn test_from_row_uses_field_map() {
        let row: Map<String, Value> = serde_json::from_str(
            r#"{"deal_id": 17, "manager": "김대표", "status": "성사됨", "created_at": "2024-03-05T09:00:00Z", "deal_name": null}"#,
        )
        .unwrap();

        let record = DealRecord::from_row(&row, &FieldMap::default());
        assert_eq!(record.id.as_deref(), Some("17"));
        assert_eq!(record.owner.as_deref(), Some("김대표"));
        assert_eq!(record.status.as_deref(), Some("성사됨"));
        assert_eq!(
            record.created_at,
            Some(CreatedAt::Text("2024-03-05T09:00:00Z".to_string()))
        );
        assert!(record.name.is_none());
    }

    #[test]
    fn test_status_vocabulary_outcome() {
        let vocab = StatusVocabulary::default();
        assert_eq!(vocab.outcome("성사됨"), DealOutcome::Won);
        assert_eq!(vocab.outcome("실패"), DealOutcome::Lost);
        assert_eq!(vocab.outcome("보류"), DealOutcome::Open);
        assert_eq!(vocab.outcome("won"), DealOutcome::Open);
        assert!(!vocab.is_won("won"));
    }

    #[test]
    fn test_status_filter_labels() {
        let vocab = StatusVocabulary::default();
        assert_eq!(StatusFilter::All.label(&vocab), None);
        assert_eq!(StatusFilter::Success.label(&vocab), Some("성사됨"));
        assert_eq!(StatusFilter::Progress.label(&vocab), Some("진행중"));
        assert_eq!(StatusFilter::Fail.label(&vocab), Some("실패"));
    }

    #[test]
    fn test_owner_filter_from_str() {
        assert_eq!(OwnerFilter::from("all"), OwnerFilter::All);
        assert_eq!(OwnerFilter::from(""), OwnerFilter::All);
        assert_eq!(
            OwnerFilter::from("박부장"),
            OwnerFilter::Owner("박부장".to_string())
        );
    }

    #[test]
    fn test_aggregated_tagging() {
        let real = Aggregated::Computed(3);
        let fake = Aggregated::Fallback(3);
        assert!(!real.is_synthetic());
        assert!(fake.is_synthetic());
        assert_eq!(real.computed(), Some(&3));
        assert_eq!(fake.computed(), None);
        assert_eq!(*fake.get(), 3);

        let json = serde_json::to_string(&fake).unwrap();
        assert_eq!(json, r#"{"kind":"fallback","data":3}"#);
    }

    #[test]
    fn test_deal_page_range() {
        let page = DealPage {
            page: 2,
            page_size: 20,
            total: 45,
            deals: vec![DealRecord::default(); 20],
        };
        assert_eq!(page.shown_range(), Some((21, 40)));
        assert_eq!(page.total_pages(), 3);

        let empty = DealPage::default();
        assert_eq!(empty.shown_range(), None);
    }
}
