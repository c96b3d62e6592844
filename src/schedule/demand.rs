//! Schedule of an on-demand loan.
//!
//! There is no plan timeline: the schedule is just the payments that actually
//! happened, with the running debt threaded through them.

use chrono::NaiveDate;

use crate::decimal::Money;
use crate::row::ScheduleRow;

use super::real::{Engine, PeriodRows};

pub fn build(mut engine: Engine<'_>) -> Vec<ScheduleRow> {
    let dates: Vec<NaiveDate> = engine.facts.payments.keys().copied().collect();
    let mut rows = PeriodRows::default();
    let mut debt = Some(Money::ZERO);
    for date in dates {
        engine.process_payment(date, debt, &mut rows);
        if let Some(row) = rows.payments.last() {
            debt = Some(row.remaining_debt);
        }
    }
    rows.payments
}
