use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::LoanDirection;
use crate::decimal::{Money, Rate};
use crate::facts::PaymentFact;
use crate::periods::is_leap_year;

use super::{BookInterestSource, InterestCalculator};

/// day count convention for interest calculations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayCountConvention {
    /// actual days / 365
    Actual365,
    /// actual days / actual days in year (handles leap years)
    ActualActual,
}

/// engine for accruing simple interest over date sub-periods
pub struct AccrualEngine {
    pub convention: DayCountConvention,
}

impl AccrualEngine {
    pub fn new(convention: DayCountConvention) -> Self {
        Self { convention }
    }

    /// year basis for the convention
    pub fn year_basis(&self, year: i32) -> u32 {
        match self.convention {
            DayCountConvention::Actual365 => 365,
            DayCountConvention::ActualActual => {
                if is_leap_year(year) {
                    366
                } else {
                    365
                }
            }
        }
    }

    fn simple_interest(&self, debt: Money, rate: Rate, days: i64, basis: u32) -> Decimal {
        debt.as_decimal() * rate.as_decimal() * Decimal::from(days) / Decimal::from(basis)
    }
}

impl Default for AccrualEngine {
    fn default() -> Self {
        Self::new(DayCountConvention::ActualActual)
    }
}

impl InterestCalculator for AccrualEngine {
    fn accrue(
        &self,
        debt: Money,
        annual_rate: Rate,
        date_begin: NaiveDate,
        date_end: NaiveDate,
    ) -> Money {
        if date_end <= date_begin || debt.is_zero() || annual_rate.is_zero() {
            return Money::ZERO;
        }

        // split at year boundaries so leap years use their own basis
        let mut total = Decimal::ZERO;
        let mut cursor = date_begin;
        while cursor < date_end {
            let year_end = NaiveDate::from_ymd_opt(cursor.year(), 12, 31).expect("valid date");
            let slice_end = year_end.min(date_end);
            let days = (slice_end - cursor).num_days();
            total += self.simple_interest(debt, annual_rate, days, self.year_basis(cursor.year()));
            cursor = slice_end;
            if cursor == year_end && cursor < date_end {
                // december 31st belongs to the old year, the next day opens the new one
                let next = cursor.succ_opt().expect("valid date");
                total +=
                    self.simple_interest(debt, annual_rate, 1, self.year_basis(cursor.year()));
                cursor = next;
            }
        }
        Money::from_decimal(total)
    }
}

/// book accrual backed by the percent postings the ledger already holds
///
/// sums the accrued interest of every percent posting dated inside
/// (date_begin, date_end]; the rate is carried by the postings themselves
pub struct PostedPercents<'a> {
    percents: &'a BTreeMap<NaiveDate, PaymentFact>,
    direction: LoanDirection,
}

impl<'a> PostedPercents<'a> {
    pub fn new(percents: &'a BTreeMap<NaiveDate, PaymentFact>, direction: LoanDirection) -> Self {
        Self { percents, direction }
    }
}

impl BookInterestSource for PostedPercents<'_> {
    fn accrue_by_book(
        &self,
        _annual_rate: Rate,
        date_begin: NaiveDate,
        date_end: NaiveDate,
    ) -> Money {
        self.percents
            .range(date_begin.succ_opt().unwrap_or(date_begin)..=date_end)
            .map(|(_, fact)| fact.accrued(self.direction))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_simple_accrual() {
        let engine = AccrualEngine::new(DayCountConvention::Actual365);
        let interest = engine.accrue(
            Money::from_major(120_000),
            Rate::from_percentage(12),
            d(2023, 1, 1),
            d(2023, 2, 1),
        );
        // 120000 * 0.12 * 31 / 365
        assert_eq!(interest, Money::from_str_exact("1223.01").unwrap());
    }

    #[test]
    fn test_empty_and_degenerate_periods() {
        let engine = AccrualEngine::default();
        let rate = Rate::from_percentage(12);
        assert_eq!(
            engine.accrue(Money::from_major(1_000), rate, d(2024, 1, 1), d(2024, 1, 1)),
            Money::ZERO
        );
        assert_eq!(
            engine.accrue(Money::ZERO, rate, d(2024, 1, 1), d(2024, 2, 1)),
            Money::ZERO
        );
        assert_eq!(
            engine.accrue(Money::from_major(1_000), Rate::ZERO, d(2024, 1, 1), d(2024, 2, 1)),
            Money::ZERO
        );
    }

    #[test]
    fn test_leap_year_basis() {
        let engine = AccrualEngine::new(DayCountConvention::ActualActual);
        assert_eq!(engine.year_basis(2024), 366);
        assert_eq!(engine.year_basis(2023), 365);

        let interest = engine.accrue(
            Money::from_major(100_000),
            Rate::from_percentage(10),
            d(2024, 1, 1),
            d(2024, 2, 1),
        );
        // 100000 * 0.10 * 31 / 366
        assert_eq!(interest, Money::from_str_exact("846.99").unwrap());
    }

    #[test]
    fn test_year_boundary_split() {
        let engine = AccrualEngine::new(DayCountConvention::ActualActual);
        let whole = engine.accrue(
            Money::from_major(100_000),
            Rate::from_percentage(10),
            d(2023, 12, 1),
            d(2024, 2, 1),
        );
        let first = engine.accrue(
            Money::from_major(100_000),
            Rate::from_percentage(10),
            d(2023, 12, 1),
            d(2024, 1, 1),
        );
        let second = engine.accrue(
            Money::from_major(100_000),
            Rate::from_percentage(10),
            d(2024, 1, 1),
            d(2024, 2, 1),
        );
        assert!((whole - first - second).abs() <= Money::CENT);
    }

    #[test]
    fn test_posted_percents_range() {
        let mut percents = BTreeMap::new();
        for (id, date, amount) in [
            (1, d(2024, 1, 31), 100),
            (2, d(2024, 2, 29), 90),
            (3, d(2024, 3, 31), 80),
        ] {
            percents.insert(
                date,
                PaymentFact {
                    doc_ids: vec![id],
                    date,
                    debit_percent: Money::from_major(amount),
                    ..Default::default()
                },
            );
        }

        let book = PostedPercents::new(&percents, LoanDirection::Issued);
        // (2024-01-31, 2024-03-31] picks up february and march postings
        assert_eq!(
            book.accrue_by_book(Rate::from_percentage(12), d(2024, 1, 31), d(2024, 3, 31)),
            Money::from_major(170)
        );
    }
}
