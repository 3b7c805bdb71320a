//! Trailing month window.

use chrono::NaiveDate;

use crate::models::{MonthKey, MonthSpan};

/// Ordered run of consecutive calendar months ending at a reference month,
/// oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthWindow {
    months: Vec<MonthKey>,
}

impl MonthWindow {
    /// Builds the `count` months ending at the month of `reference`.
    ///
    /// A count of zero is treated as the 12-month default.
    pub fn build(reference: NaiveDate, count: usize) -> Self {
        let count = MonthSpan::from(count).get();
        let current = MonthKey::from_date(reference);

        let months = (0..count)
            .rev()
            .map(|offset| current.months_before(offset as u32))
            .collect();

        Self { months }
    }

    pub fn months(&self) -> &[MonthKey] {
        &self.months
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    #[allow(dead_code)] // Pairs with len(); windows are never empty in practice
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn contains(&self, month: &MonthKey) -> bool {
        self.months.binary_search(month).is_ok()
    }

    /// The reference (most recent) month.
    pub fn last(&self) -> Option<MonthKey> {
        self.months.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonthKey> {
        self.months.iter()
    }
}
