//! Schedule of a deposit contract.
//!
//! Interest is paid out periodically and the principal comes back at the end,
//! so the plan rows carry the interest due while the principal column stays
//! flat until the closing row. Instead of the delinquency machinery, the
//! under- and overpaid parts of each row simply roll into the next one.

use chrono::NaiveDate;

use crate::config::LoanConfig;
use crate::decimal::Money;
use crate::facts::PaymentFacts;
use crate::row::{Amounts, RowType, ScheduleRow};
use crate::timeline::Timeline;

use super::percent::PercentCalc;

pub struct DepositBuilder<'a> {
    config: &'a LoanConfig,
    facts: &'a PaymentFacts,
    timeline: &'a Timeline,
    percent: PercentCalc<'a>,
    monthly_payment: Money,
    today: NaiveDate,
    /// plan sums per schedule date, fact rows reference them
    plans: Vec<(NaiveDate, Amounts)>,
    /// carried from the previous row
    underpayment: Amounts,
    overpayment: Amounts,
}

impl<'a> DepositBuilder<'a> {
    pub fn new(
        config: &'a LoanConfig,
        facts: &'a PaymentFacts,
        timeline: &'a Timeline,
        percent: PercentCalc<'a>,
        monthly_payment: Money,
        today: NaiveDate,
    ) -> Self {
        Self {
            config,
            facts,
            timeline,
            percent,
            monthly_payment,
            today,
            plans: Vec::new(),
            underpayment: Amounts::default(),
            overpayment: Amounts::default(),
        }
    }

    pub fn build(mut self) -> Vec<ScheduleRow> {
        let mut rows = self.add_plans();
        rows.extend(self.add_facts());
        rows
    }

    /// plan dates, actual payment dates and the current day, merged
    fn schedule_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.timeline.plan_dates(true).to_vec();
        dates.extend(self.facts.payments.keys().copied());
        dates.push(self.today);
        dates.sort();
        dates.dedup();
        dates
    }

    fn loan_sum(&self) -> Money {
        let disbursed = self.facts.total_disbursed(self.config.direction);
        if disbursed.is_positive() {
            disbursed
        } else {
            self.config.principal
        }
    }

    fn add_plans(&mut self) -> Vec<ScheduleRow> {
        let registered = self.facts.is_registered();
        let dates = self.schedule_dates();
        let last_date = dates.last().copied();
        let mut prev_date = self
            .facts
            .first_disbursement_date()
            .unwrap_or(self.config.date_begin);
        let mut debt = if registered {
            Money::ZERO
        } else {
            self.loan_sum()
        };
        let mut paid_body = Money::ZERO;

        let mut rows = Vec::new();
        for (i, date) in dates.into_iter().enumerate() {
            let is_last_plan = Some(date) == last_date;
            let plan = self.plan_sums(debt, prev_date, date, is_last_plan);
            let fact = self
                .timeline
                .payments_of_month(date)
                .map(|month| {
                    Amounts::new(
                        month.total_size_payment,
                        month.total_body_debt,
                        month.total_percent,
                    )
                })
                .unwrap_or_default();
            debt = self.correct_debt(debt, date, &plan);
            self.plans.push((date, plan));
            self.roll_overpayment(&plan);
            self.roll_underpayment(date, &plan);

            let mut row = ScheduleRow::new(-(i as i64 + 1), RowType::Plan, date);
            row.plan = Amounts::new(
                plan.size_payment.max(Money::ZERO),
                plan.body_debt.max(Money::ZERO),
                plan.percent.max(Money::ZERO),
            );
            row.fact = fact;
            row.remaining_debt = debt;
            rows.push(row);

            prev_date = date;
            paid_body += fact.body_debt;
            if self.is_paid_out(paid_body) {
                break;
            }
        }
        rows
    }

    fn plan_sums(
        &mut self,
        debt: Money,
        date_begin: NaiveDate,
        date_end: NaiveDate,
        is_last_plan: bool,
    ) -> Amounts {
        let timeline = self.timeline;
        let percent_accrued = self
            .percent
            .calc(timeline, debt, date_begin, date_end, None);
        if !self.facts.is_registered() {
            return if is_last_plan {
                Amounts::new(debt + percent_accrued, debt, percent_accrued)
            } else {
                Amounts::new(
                    self.monthly_payment,
                    self.monthly_payment - percent_accrued,
                    percent_accrued,
                )
            };
        }

        let month = self
            .timeline
            .payments_of_month(date_end)
            .cloned()
            .unwrap_or_default();
        let percent = percent_accrued + self.underpayment.percent - self.overpayment.percent
            - month.total_percent;
        if is_last_plan {
            let body_debt = debt + self.timeline.change_debts_by_month(date_end);
            Amounts::new(body_debt + percent, body_debt, percent)
        } else {
            let size_payment = self.monthly_payment + self.underpayment.size_payment
                - self.overpayment.size_payment
                - month.total_size_payment;
            Amounts::new(size_payment, size_payment - percent, percent)
        }
    }

    /// a registered deposit repays the plan body only once it is due
    fn correct_debt(&self, debt: Money, date: NaiveDate, plan: &Amounts) -> Money {
        if self.facts.is_registered() {
            let mut debt = debt + self.timeline.change_debts_by_month(date);
            if date >= self.today && plan.body_debt.is_positive() {
                debt = debt - plan.body_debt;
            }
            debt
        } else {
            debt - plan.body_debt
        }
    }

    /// negative plan sums mean the month was overpaid
    fn roll_overpayment(&mut self, plan: &Amounts) {
        self.overpayment = Amounts::new(
            plan.size_payment.min(Money::ZERO).abs(),
            plan.body_debt.min(Money::ZERO).abs(),
            plan.percent.min(Money::ZERO).abs(),
        );
    }

    /// positive plan sums of a past month mean it was underpaid
    fn roll_underpayment(&mut self, date: NaiveDate, plan: &Amounts) {
        self.underpayment = if date < self.today {
            Amounts::new(
                plan.size_payment.max(Money::ZERO),
                plan.body_debt.max(Money::ZERO),
                plan.percent.max(Money::ZERO),
            )
        } else {
            Amounts::default()
        };
    }

    fn is_paid_out(&self, paid_body: Money) -> bool {
        let disbursed = self.facts.total_disbursed(self.config.direction);
        !self.facts.payments.is_empty() && disbursed.is_positive() && paid_body >= disbursed
    }

    fn add_facts(&self) -> Vec<ScheduleRow> {
        let mut rows = Vec::new();
        for (date, payment) in &self.facts.payments {
            let plan = self
                .plans
                .iter()
                .find(|(plan_date, _)| plan_date >= date)
                .map(|(_, plan)| *plan)
                .unwrap_or_default();
            let body = payment.body_debt(self.config.direction);
            let percent = payment.percent(self.config.direction);

            let row_type = if payment.is_grouped() {
                RowType::GroupedPayments
            } else {
                RowType::Payment
            };
            let mut row = ScheduleRow::new(payment.primary_doc_id(), row_type, *date);
            row.plan = plan;
            row.fact = Amounts::new(body + percent, body, percent);
            row.remaining_debt = payment.remaining_debt;
            rows.push(row);
        }
        rows
    }
}
