//! Deal queries shared by all data sources.

use chrono::NaiveDate;
use std::cmp::Ordering;

use crate::analysis::record_date;
use crate::models::{DealRecord, OwnerFilter, StatusFilter, StatusVocabulary};

/// Ordering by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Filter, ordering and paging of a deal fetch.
///
/// Date bounds are inclusive calendar dates. Records whose creation date
/// cannot be read never match a query with a date bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DealQuery {
    pub status: Option<String>,
    pub owner: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_until: Option<NaiveDate>,
    pub order: Option<SortOrder>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl DealQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query for the dashboard's status and owner filters.
    pub fn for_filters(
        status: StatusFilter,
        owner: &OwnerFilter,
        vocabulary: &StatusVocabulary,
    ) -> Self {
        let mut query = Self::new();
        if let Some(label) = status.label(vocabulary) {
            query = query.with_status(label);
        }
        if let Some(name) = owner.owner() {
            query = query.with_owner(name);
        }
        query
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn created_between(mut self, from: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        self.created_from = from;
        self.created_until = until;
        self
    }

    pub fn ordered(mut self, order: SortOrder) -> Self {
        self.order = Some(order);
        self
    }

    pub fn paged(mut self, offset: usize, limit: usize) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    /// The same filters without ordering or paging, as used for counting.
    pub fn filters_only(&self) -> Self {
        Self {
            order: None,
            offset: None,
            limit: None,
            ..self.clone()
        }
    }

    fn has_date_bound(&self) -> bool {
        self.created_from.is_some() || self.created_until.is_some()
    }

    /// Whether an in-memory record satisfies the filters.
    pub fn matches(&self, record: &DealRecord) -> bool {
        if let Some(ref status) = self.status {
            if record.status.as_deref() != Some(status.as_str()) {
                return false;
            }
        }

        if let Some(ref owner) = self.owner {
            if record.owner.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }

        if !self.has_date_bound() {
            return true;
        }

        let Some(date) = record_date(record) else {
            return false;
        };
        self.created_from.map_or(true, |from| date >= from)
            && self.created_until.map_or(true, |until| date <= until)
    }

    /// Applies filters, ordering and paging to in-memory records.
    pub fn apply(&self, records: &[DealRecord]) -> Vec<DealRecord> {
        let mut matched: Vec<&DealRecord> = records.iter().filter(|r| self.matches(r)).collect();

        if let Some(order) = self.order {
            // Stable sort; undated records go last in either direction.
            matched.sort_by(|a, b| match (record_date(a), record_date(b)) {
                (Some(x), Some(y)) => match order {
                    SortOrder::Ascending => x.cmp(&y),
                    SortOrder::Descending => y.cmp(&x),
                },
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }

        matched
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}
