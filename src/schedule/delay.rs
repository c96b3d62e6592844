//! Delinquency rows.
//!
//! A closed delay was settled in the past and its sums are static; an open
//! delay runs up to the current day and grows with it. Interest owed on a
//! delinquency follows the formula Xf - Xnp - Xpaid, where Xf is the interest
//! accrued on the actual debt since the schedule began, Xnp the interest of
//! the last unfinished period of the ideal plan, and Xpaid the interest
//! actually paid so far.

use chrono::{Days, NaiveDate};

use crate::decimal::Money;
use crate::periods::name_period;
use crate::row::{synthetic_id, AmountField, Amounts, RowType, ScheduleRow};

use super::real::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelayCase {
    /// the delay closes the schedule, repays the whole debt
    LastRow,
    /// the principal was overpaid while the interest is settled
    OverBodyDebt,
    /// the first plan date arrived before the money was even disbursed
    EarlyFirstPayment,
    Default,
}

impl Engine<'_> {
    pub(super) fn create_open_delay_row(
        &mut self,
        date_begin: NaiveDate,
        date_end: NaiveDate,
        debt: Option<Money>,
        is_last_row: bool,
    ) -> ScheduleRow {
        self.create_delay_row(RowType::OpenDelay, date_begin, date_end, debt, is_last_row)
    }

    pub(super) fn create_closed_delay_row(
        &mut self,
        date_begin: NaiveDate,
        date_end: NaiveDate,
        debt: Money,
        is_last_row: bool,
    ) -> ScheduleRow {
        self.create_delay_row(
            RowType::ClosedDelay,
            date_begin,
            date_end,
            Some(debt),
            is_last_row,
        )
    }

    fn create_delay_row(
        &mut self,
        row_type: RowType,
        date_begin: NaiveDate,
        date_end: NaiveDate,
        debt: Option<Money>,
        is_last_row: bool,
    ) -> ScheduleRow {
        let debt = debt.unwrap_or(Money::ZERO);
        let (plan, case) = self.calc_delay_plan(date_begin, date_end, debt, is_last_row);
        let prev_plan = self.prev_plan;
        self.ledger.correct_after_delay(&prev_plan, &plan);
        let debt_after = debt - plan.body_debt;

        let mut row = ScheduleRow::new(synthetic_id(date_end), row_type, date_end);
        row.period = Some(crate::periods::Period::new(date_begin, date_end));
        row.plan = plan;
        row.remaining_debt = debt_after;
        row.description = self.delay_description(date_begin, date_end);
        row.date_description = self.delay_date_description(date_begin, date_end);
        row.detail = self.detail(Some(case_description(case)));
        row
    }

    fn calc_delay_plan(
        &mut self,
        date_begin: NaiveDate,
        date_end: NaiveDate,
        debt: Money,
        is_last_row: bool,
    ) -> (Amounts, DelayCase) {
        let case = self.select_delay_case(date_begin, is_last_row);
        let plan = match case {
            DelayCase::LastRow => self.last_row_delay(date_begin, date_end, debt),
            DelayCase::OverBodyDebt => self.over_body_debt_delay(),
            DelayCase::EarlyFirstPayment => {
                self.early_first_payment_delay(date_begin, date_end, debt)
            }
            DelayCase::Default => self.default_delay(date_end, debt),
        };
        (plan, case)
    }

    fn select_delay_case(&self, date_begin: NaiveDate, is_last_row: bool) -> DelayCase {
        if is_last_row {
            DelayCase::LastRow
        } else if self.is_overpayment_body_debt() {
            DelayCase::OverBodyDebt
        } else if self.is_early_first_payment(date_begin) {
            DelayCase::EarlyFirstPayment
        } else {
            DelayCase::Default
        }
    }

    fn last_row_delay(
        &mut self,
        date_begin: NaiveDate,
        date_end: NaiveDate,
        debt: Money,
    ) -> Amounts {
        let percent_paid_off = !self.ledger.balance(AmountField::Percent).is_positive();
        let percent = if percent_paid_off {
            self.fine_delay(date_begin, date_end, debt)
        } else {
            self.delay_percent(date_end)
        };
        let body_debt = debt;
        Amounts::new(body_debt + percent, body_debt, percent)
    }

    /// only the principal is overpaid, the balances carry the row as is
    fn over_body_debt_delay(&self) -> Amounts {
        let percent = self.ledger.balance(AmountField::Percent);
        let body_debt = self.ledger.balance(AmountField::BodyDebt).max(Money::ZERO);
        Amounts::new(percent + body_debt, body_debt, percent)
    }

    /// the client had no time to use the money, so no interest is expected
    /// beyond the fine for the days actually overdue
    fn early_first_payment_delay(
        &mut self,
        date_begin: NaiveDate,
        date_end: NaiveDate,
        debt: Money,
    ) -> Amounts {
        let percent = self.fine_delay(date_begin, date_end, debt);
        let body_debt = self.ledger.balance(AmountField::BodyDebt).max(Money::ZERO);
        Amounts::new(percent + body_debt, body_debt, percent)
    }

    fn default_delay(&mut self, date_end: NaiveDate, debt: Money) -> Amounts {
        let percent = self.delay_percent(date_end);
        let body_debt = debt - self.ideal_debt_of_period(date_end);
        Amounts::new(percent + body_debt, body_debt, percent)
    }

    /// Xf - Xnp - Xpaid
    fn delay_percent(&mut self, date_end: NaiveDate) -> Money {
        let percent_by_fact_debt =
            self.book
                .accrue_by_book(self.config.rate(), self.config.date_begin, date_end);
        let percent_by_plan_debt = self.percent_by_plan_debt(date_end);
        let paid_percents = self
            .facts
            .paid_percents_before(date_end, self.config.direction);
        percent_by_fact_debt - percent_by_plan_debt - paid_percents
    }

    /// Xnp: interest of the last unfinished period, on the ideal debt
    fn percent_by_plan_debt(&mut self, date_end: NaiveDate) -> Money {
        let ideal_debt = self.ideal_debt_of_period(date_end);
        let date_begin = match self.delay_end.or(self.delay_begin) {
            Some(date) => date,
            None => return Money::ZERO,
        };
        self.calc_percent(ideal_debt, date_begin, date_end, None)
    }

    /// difference between the actual and the planned accrual over the
    /// delinquency, summed with the fines of the already skipped periods
    fn fine_delay(&mut self, date_begin: NaiveDate, date_end: NaiveDate, debt: Money) -> Money {
        let plan_debt = self.ideal_debt_of_period(date_end);
        let old_periods = self.delay_periods.clone();
        let mut fine = Money::ZERO;
        for period in old_periods {
            fine += self.calc_percent(debt, period.begin, period.end, None);
        }
        let fine_fact = self.calc_percent(debt, date_begin, date_end, None);
        let fine_plan = self.calc_percent(plan_debt, date_begin, date_end, None);
        fine + fine_fact - fine_plan
    }

    /// ideal remaining debt at the start of the plan period covering `date`
    fn ideal_debt_of_period(&self, date: NaiveDate) -> Money {
        self.timeline
            .plan_period_of(date)
            .and_then(|period| self.ideal.plan_at(period.begin))
            .map(|plan| plan.end_debt)
            .unwrap_or(Money::ZERO)
    }

    fn is_overpayment_body_debt(&self) -> bool {
        self.ledger.overpayment.body_debt.is_positive()
            && self.ledger.overpayment.percent.is_zero()
    }

    fn is_early_first_payment(&self, date_begin: NaiveDate) -> bool {
        self.facts
            .first_disbursement_date()
            .map(|first| date_begin <= first)
            .unwrap_or(false)
    }

    fn delay_description(&self, date_begin: NaiveDate, date_end: NaiveDate) -> Option<String> {
        let name = name_period(date_begin, date_end);
        let still_open = date_end == self.today && !self.facts.payments.contains_key(&date_end);
        let text = if still_open {
            format!("Overdue {}", name)
        } else {
            format!("Was overdue {}", name)
        };
        Some(text)
    }

    /// pretty period of the delay, hidden when a payment opens it
    fn delay_date_description(
        &self,
        date_begin: NaiveDate,
        date_end: NaiveDate,
    ) -> Option<String> {
        if self.facts.payments.contains_key(&date_begin) {
            return None;
        }
        let prev_day = date_end - Days::new(1);
        let months = self
            .ideal
            .plans
            .keys()
            .filter(|date| date_begin <= **date && **date < prev_day)
            .count();
        let mut text = name_period(date_begin, prev_day);
        if months > 0 {
            text.push_str(&format!(" ({} months overdue)", months));
        }
        Some(text)
    }
}

fn case_description(case: DelayCase) -> &'static str {
    match case {
        DelayCase::LastRow => "Closing delay row",
        DelayCase::OverBodyDebt => "Delay with principal overpaid",
        DelayCase::EarlyFirstPayment => "Delay before the first disbursement",
        DelayCase::Default => "Delay row",
    }
}
