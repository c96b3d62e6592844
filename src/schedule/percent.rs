//! Per-build percent calculator.
//!
//! Interest over a plan period depends on the money that moved inside it:
//! the period is split at every disbursement and payment date, the running
//! debt absorbs each movement and the injected calculator accrues over each
//! slice. Results are memoized for the lifetime of one build only.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::decimal::{Money, Rate};
use crate::interest::InterestCalculator;
use crate::periods::split_period;
use crate::timeline::Timeline;

type MemoKey = (Money, NaiveDate, NaiveDate, Option<NaiveDate>);

pub struct PercentCalc<'a> {
    calc: &'a dyn InterestCalculator,
    rate: Rate,
    memo: HashMap<MemoKey, Money>,
}

impl<'a> PercentCalc<'a> {
    pub fn new(calc: &'a dyn InterestCalculator, rate: Rate) -> Self {
        Self {
            calc,
            rate,
            memo: HashMap::new(),
        }
    }

    /// interest accrued on `debt` over the plan period, following the new
    /// disbursements and payments of that period
    ///
    /// `limit_date_payment` ignores payments arriving after it; with three
    /// payments on the 5th, 10th and 12th, a limit of the 10th drops the 12th
    pub fn calc(
        &mut self,
        timeline: &Timeline,
        debt: Money,
        date_begin: NaiveDate,
        date_end: NaiveDate,
        limit_date_payment: Option<NaiveDate>,
    ) -> Money {
        let key = (debt, date_begin, date_end, limit_date_payment);
        if let Some(cached) = self.memo.get(&key) {
            return *cached;
        }

        let disbursements = timeline.disbursements_of_month(date_end);
        let payments = timeline.payments_of_month(date_end).map(|m| &m.debts);

        let mut split_dates: Vec<NaiveDate> = Vec::new();
        if let Some(debts) = disbursements {
            split_dates.extend(debts.keys().copied());
        }
        if let Some(debts) = payments {
            split_dates.extend(
                debts
                    .keys()
                    .copied()
                    .filter(|d| limit_date_payment.map(|limit| *d <= limit).unwrap_or(true)),
            );
        }

        let mut running_debt = debt;
        let mut percent = Money::ZERO;
        for sub in split_period(date_begin, date_end, &split_dates) {
            if let Some(amount) = disbursements.and_then(|d| d.get(&sub.begin)) {
                running_debt += *amount;
            }
            if let Some(amount) = payments.and_then(|d| d.get(&sub.begin)) {
                running_debt -= *amount;
            }
            percent += self.calc.accrue(running_debt, self.rate, sub.begin, sub.end);
        }

        let percent = percent.round_dp(2);
        self.memo.insert(key, percent);
        percent
    }
}
