//! Real payment schedule.
//!
//! Walks the plan periods chronologically and reconciles planned rows against
//! the payments that actually arrived. The schedule types differ only in how
//! the plan sums come out; the delinquency machinery is shared.
//!
//! Build rules for one plan period:
//! - payments come first, then the plan row, then the correction row;
//! - a payment arriving while a delinquency is open closes it with a
//!   closed-delay row;
//! - the current day falling inside a period with an open delinquency
//!   produces an open-delay row, whose sums grow day by day;
//! - when the open delay and the plan row land on the current day, the plan
//!   sums merge into the open delay and the plan row is hidden.

use chrono::NaiveDate;

use crate::config::LoanConfig;
use crate::decimal::Money;
use crate::facts::PaymentFacts;
use crate::ideal::IdealSchedule;
use crate::interest::BookInterestSource;
use crate::ledger::BalanceLedger;
use crate::periods::Period;
use crate::row::{AmountField, Amounts, ScheduleRow};
use crate::timeline::Timeline;

use super::percent::PercentCalc;

/// builds the schedule of a registered loan
pub fn build(engine: Engine<'_>) -> Vec<ScheduleRow> {
    engine.run()
}

/// rows produced while processing one plan period
///
/// which of them reach the schedule is decided at the end of the period
#[derive(Default)]
pub(super) struct PeriodRows {
    pub(super) plan: Option<ScheduleRow>,
    pub(super) payments: Vec<ScheduleRow>,
    pub(super) open_delay: Option<ScheduleRow>,
    pub(super) closed_delays: Vec<ScheduleRow>,
    pub(super) correction: Option<ScheduleRow>,
}

/// mutable state shared by the row builders during one build
pub(crate) struct Engine<'a> {
    pub(super) config: &'a LoanConfig,
    pub(super) facts: &'a PaymentFacts,
    pub(super) timeline: &'a Timeline,
    pub(super) ideal: &'a IdealSchedule,
    pub(super) book: &'a dyn BookInterestSource,
    pub(super) percent: PercentCalc<'a>,
    pub(super) ledger: BalanceLedger,
    pub(super) today: NaiveDate,
    /// open delinquency window
    pub(super) delay_begin: Option<NaiveDate>,
    pub(super) delay_end: Option<NaiveDate>,
    /// closed delinquency periods awaiting the next plan row
    pub(super) delay_periods: Vec<Period>,
    /// plan sums of the previous plan row, rolled back by delay rows
    pub(super) prev_plan: Amounts,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        config: &'a LoanConfig,
        facts: &'a PaymentFacts,
        timeline: &'a Timeline,
        ideal: &'a IdealSchedule,
        percent: PercentCalc<'a>,
        book: &'a dyn BookInterestSource,
        today: NaiveDate,
    ) -> Self {
        Self {
            config,
            facts,
            timeline,
            ideal,
            book,
            percent,
            ledger: BalanceLedger::new(),
            today,
            delay_begin: None,
            delay_end: None,
            delay_periods: Vec::new(),
            prev_plan: Amounts::default(),
        }
    }

    pub(super) fn monthly_payment(&self) -> Money {
        self.ideal.monthly_payment
    }

    pub(super) fn calc_percent(
        &mut self,
        debt: Money,
        date_begin: NaiveDate,
        date_end: NaiveDate,
        limit_date_payment: Option<NaiveDate>,
    ) -> Money {
        let timeline = self.timeline;
        self.percent
            .calc(timeline, debt, date_begin, date_end, limit_date_payment)
    }

    /// row detail: the case description plus the current ledger dump
    pub(super) fn detail(&self, row_detail: Option<&str>) -> Option<String> {
        let store = self.ledger.detail();
        let text = match row_detail {
            Some(row) if store.is_empty() => row.to_string(),
            Some(row) => format!("{}\n{}", row, store),
            None if store.is_empty() => return None,
            None => store,
        };
        Some(text)
    }

    /// the correction row appears when the last payment leaves the balances
    /// with opposite signs
    pub(super) fn is_not_typical_case(&self) -> bool {
        let percent = self.ledger.balance(AmountField::Percent);
        let body = self.ledger.balance(AmountField::BodyDebt);
        (percent.is_positive() && !body.is_positive())
            || (percent.is_negative() && !body.is_negative())
    }

    fn run(mut self) -> Vec<ScheduleRow> {
        let mut result = Vec::new();
        let last_plan_date = match self.timeline.last_plan_date(true) {
            Some(date) => date,
            None => return result,
        };

        let mut debt: Option<Money> = None;
        for period in self
            .timeline
            .periods(self.config, self.facts, true, true)
        {
            let already_paid_off = debt.map(|d| d <= self.monthly_payment()).unwrap_or(false);
            let is_last_sub_period = period.end == last_plan_date || already_paid_off;

            self.track_delay(period.begin);
            let mut rows = PeriodRows::default();
            self.process_payments(period, debt, &mut rows);
            self.process_plan(period, debt, is_last_sub_period, &mut rows);
            self.process_correction(period.begin, &mut rows);
            let hide_plan = Self::merge_open_delay(period.end, self.today, &mut rows);

            if let Some(row) = Self::row_debt(&rows) {
                debt = Some(row.remaining_debt);
            }
            let interrupt = self.need_interrupt(&rows, debt, period.end);
            Self::append_period(rows, hide_plan, &mut result);
            if interrupt {
                break;
            }
        }
        result
    }

    /// opens or extends the delinquency window when something is still owed
    fn track_delay(&mut self, date: NaiveDate) {
        if self.ledger.is_underpayment_exists(None) {
            self.delay_end = Some(date);
            if self.delay_begin.is_none() {
                self.delay_begin = Some(date);
            }
        }
    }

    /// an unhealed underpayment reopens the window at the payment date
    fn reset_delay(&mut self, date: NaiveDate) {
        self.delay_begin = if self.ledger.is_underpayment_exists(None) {
            Some(date)
        } else {
            None
        };
        self.delay_end = None;
    }

    fn process_payments(&mut self, period: Period, debt: Option<Money>, rows: &mut PeriodRows) {
        let dates = self.timeline.payment_dates_of_plan(period.end).to_vec();
        for date in dates {
            self.process_payment(date, debt, rows);
        }
        self.track_delay(period.begin);
    }

    pub(super) fn process_payment(
        &mut self,
        date: NaiveDate,
        debt: Option<Money>,
        rows: &mut PeriodRows,
    ) {
        let facts = self.facts;
        let fact = match facts.payments.get(&date) {
            Some(fact) => fact,
            None => return,
        };
        if let Some(delay_begin) = self.delay_begin {
            let closed =
                self.create_closed_delay_row(delay_begin, date, debt.unwrap_or(Money::ZERO), false);
            rows.closed_delays.push(closed);
        }
        let is_delay_payment = !rows.closed_delays.is_empty();
        let payment_row = self.create_payment_row(fact, is_delay_payment);
        rows.payments.push(payment_row);
        self.reset_delay(date);
    }

    fn process_plan(
        &mut self,
        period: Period,
        debt: Option<Money>,
        is_last_sub_period: bool,
        rows: &mut PeriodRows,
    ) {
        // a stale plan period with an open delinquency is skipped until the
        // current day or a payment arrives
        if period.end < self.today && self.delay_begin.is_some() {
            self.delay_periods.push(period);
            return;
        }

        let mut debt = debt;
        if let Some(delay_begin) = self.delay_begin {
            let today_inside = period.begin <= self.today && self.today <= period.end;
            if today_inside && delay_begin != self.today {
                let is_last_row = is_last_sub_period && self.today == period.end;
                let row = self.create_open_delay_row(delay_begin, self.today, debt, is_last_row);
                debt = Some(row.remaining_debt);
                rows.open_delay = Some(row);
                self.delay_begin = None;
                self.delay_end = None;
            }
        }

        if self.need_plan(is_last_sub_period, rows, debt, period.end) {
            let row = self.create_plan_row(period, debt, is_last_sub_period);
            self.delay_periods.clear();
            rows.plan = Some(row);
        }
    }

    /// the last plan row is dropped when an open delay replaces it or the
    /// final payment already cleared the debt
    fn need_plan(
        &self,
        is_last_sub_period: bool,
        rows: &PeriodRows,
        debt: Option<Money>,
        date_end: NaiveDate,
    ) -> bool {
        let is_old_plan = date_end <= self.today;
        let is_first_period = debt.is_none();
        let open_delay_exists = rows.open_delay.is_some();
        let last_payment_paid_debt = rows
            .payments
            .last()
            .map(|row| row.remaining_debt.is_zero())
            .unwrap_or(false);
        let skip = is_old_plan
            && !is_first_period
            && is_last_sub_period
            && (open_delay_exists || last_payment_paid_debt);
        !skip
    }

    fn process_correction(&mut self, date_begin: NaiveDate, rows: &mut PeriodRows) {
        let date_payment = rows
            .payments
            .last()
            .map(|row| row.date)
            .filter(|date| *date > date_begin);
        if let Some(date) = date_payment {
            let is_last_payment = Some(date) == self.facts.last_payment_date();
            // a payment arriving today still has time to be topped up
            if date != self.today && is_last_payment && self.is_not_typical_case() {
                rows.correction = Some(self.create_correction_row(date));
            }
        }
    }

    /// hides a plan row intersecting the open delay on the current day,
    /// moving its sums into the delay row
    fn merge_open_delay(date_end: NaiveDate, today: NaiveDate, rows: &mut PeriodRows) -> bool {
        let merge = rows.open_delay.is_some() && rows.plan.is_some() && date_end == today;
        if merge {
            if let (Some(delay), Some(plan)) = (rows.open_delay.as_mut(), rows.plan.as_ref()) {
                crate::row::join_sum_rows(delay, &[plan]);
            }
        }
        merge
    }

    /// the row the next period takes its remaining debt from
    ///
    /// the plan row is built after the open delay and after the payments, so
    /// it wins ties; otherwise the chronologically later row wins
    fn row_debt(rows: &PeriodRows) -> Option<&ScheduleRow> {
        if let Some(correction) = &rows.correction {
            return Some(correction);
        }
        let plan_or_delay = rows.plan.as_ref().or(rows.open_delay.as_ref());
        let payment = rows.payments.last();
        match (payment, plan_or_delay) {
            (Some(pay), Some(plan)) if pay.date > plan.date => Some(pay),
            (Some(_), Some(plan)) => Some(plan),
            (Some(pay), None) => Some(pay),
            (None, plan) => plan,
        }
    }

    /// stops the walk once every payment is processed and the loan is repaid,
    /// corrected, or planned down to zero
    fn need_interrupt(&self, rows: &PeriodRows, debt: Option<Money>, date_end: NaiveDate) -> bool {
        let payments_processed = self
            .facts
            .last_payment_date()
            .map(|last| date_end >= last)
            .unwrap_or(false);
        if !payments_processed {
            return false;
        }
        let is_paid_off = debt.map(|d| d.is_zero()).unwrap_or(true)
            && !self.ledger.is_underpayment_exists(None);
        let correction_exists = rows.correction.is_some();
        let last_future_plan = rows
            .plan
            .as_ref()
            .map(|row| row.date > self.today && row.remaining_debt.is_zero())
            .unwrap_or(false);
        is_paid_off || correction_exists || last_future_plan
    }

    fn append_period(rows: PeriodRows, hide_plan: bool, result: &mut Vec<ScheduleRow>) {
        if !hide_plan {
            result.extend(rows.plan);
        }
        result.extend(rows.payments);
        result.extend(rows.open_delay);
        result.extend(rows.closed_delays);
        result.extend(rows.correction);
    }
}
