//! Sample data substituted when the real input is empty.
//!
//! Output of this module is placeholder data for presentation only. Callers
//! wrap it in `Aggregated::Fallback`.

use rand::Rng;
use std::ops::{Range, RangeInclusive};

use super::matrix::OwnerMonthMatrix;
use super::monthly::MonthlySeries;
use super::window::MonthWindow;

pub const MONTHLY_TOTALS: RangeInclusive<u64> = 20..=50;
pub const MONTHLY_RATIOS: Range<f64> = 0.2..0.6;

pub const MATRIX_TOTALS: RangeInclusive<u64> = 10..=30;
pub const MATRIX_RATIOS: Range<f64> = 0.3..0.8;

/// Draws a total and a success count of `floor(total * ratio)`.
fn draw<R: Rng + ?Sized>(
    rng: &mut R,
    totals: &RangeInclusive<u64>,
    ratios: &Range<f64>,
) -> (u64, u64) {
    let total = rng.gen_range(totals.clone());
    let ratio = rng.gen_range(ratios.clone());
    (total, (total as f64 * ratio).floor() as u64)
}

/// Sample monthly series: totals in [20, 50], success ratio in [0.2, 0.6).
pub fn monthly_series<R: Rng + ?Sized>(window: &MonthWindow, rng: &mut R) -> MonthlySeries {
    let mut series = MonthlySeries::zeroed(window);
    for month in window.iter() {
        let (total, success) = draw(rng, &MONTHLY_TOTALS, &MONTHLY_RATIOS);
        series.set(*month, total, success);
    }
    series
}

/// Sample owner-month matrix: totals in [10, 30], success ratio in [0.3, 0.8).
pub fn owner_matrix<R: Rng + ?Sized>(
    window: &MonthWindow,
    owners: &[String],
    rng: &mut R,
) -> OwnerMonthMatrix {
    let mut matrix = OwnerMonthMatrix::zeroed(window, owners.to_vec());
    for month in window.iter() {
        for owner in matrix.owners().to_vec() {
            let (total, success) = draw(rng, &MATRIX_TOTALS, &MATRIX_RATIOS);
            matrix.set(*month, &owner, total, success);
        }
    }
    matrix
}
