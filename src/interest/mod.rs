//! Interest calculation seams.
//!
//! The schedule engine never owns day-count law: it consumes two external
//! contracts, a pure period calculator and a "book" source reflecting what
//! the accounting ledger actually accrued. Default implementations cover
//! common conventions and posting-backed book accrual.

mod accrual;

pub use accrual::{AccrualEngine, DayCountConvention, PostedPercents};

use chrono::NaiveDate;

use crate::decimal::{Money, Rate};

/// pure, deterministic interest accrual over a date sub-period
pub trait InterestCalculator {
    /// interest accrued on `debt` at `annual_rate` over (date_begin, date_end]
    fn accrue(
        &self,
        debt: Money,
        annual_rate: Rate,
        date_begin: NaiveDate,
        date_end: NaiveDate,
    ) -> Money;
}

/// interest as the accounting ledger accrued it (the delay builder's Xf term)
pub trait BookInterestSource {
    fn accrue_by_book(&self, annual_rate: Rate, date_begin: NaiveDate, date_end: NaiveDate)
        -> Money;
}
