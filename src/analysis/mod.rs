//! Deal aggregation engine.
//!
//! Month bucketing, record classification, the monthly conversion series,
//! the owner-by-month matrix and the dashboard summary. Every function here
//! is a pure function of its inputs; the synthetic fallback draws from a
//! caller-supplied random source and is always tagged `Aggregated::Fallback`.

pub mod classify;
pub mod matrix;
pub mod monthly;
pub mod summary;
pub mod synthetic;
pub mod window;

pub use classify::{classify, parse_created_at, record_date, Classification};
pub use matrix::{
    aggregate_owner_months, count_owner_months, distinct_owners, Cell, MatrixOptions,
    OwnerMonthMatrix, Tally,
};
pub use monthly::{aggregate_monthly, count_monthly, MonthlySeries};
pub use summary::{summarize, DealSummary, OutcomeBreakdown, OwnerStat, StatusCounts};
pub use window::MonthWindow;
