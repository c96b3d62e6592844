//! Plan rows of the real schedule.
//!
//! A plan row shows what should be paid at the end of a plan period. The sums
//! depend on the state of the ledger: a healthy loan follows the ideal plan,
//! a prepayment shrinks the interest, an overpayment is absorbed into the
//! next row, and the last row closes whatever debt remains.

use crate::config::{FixedField, ScheduleType};
use crate::decimal::Money;
use crate::ledger::PaymentKind;
use crate::periods::Period;
use crate::row::{synthetic_id, AmountField, Amounts, RowType, ScheduleRow};

use super::real::Engine;

/// how the sums of a particular plan row were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanCase {
    /// future row matching the ideal schedule
    Ideal,
    /// row after an early repayment, interest reduced by the paid part
    Prepayment,
    /// the closing row, repays the remaining debt in full
    LastRow,
    /// row recalculated from the actual debt
    Default,
}

impl PlanCase {
    fn describe(self) -> &'static str {
        match self {
            PlanCase::Ideal => "Ideal plan row",
            PlanCase::Prepayment => "Plan row after early repayment",
            PlanCase::LastRow => "Closing plan row",
            PlanCase::Default => "Recalculated plan row",
        }
    }
}

impl Engine<'_> {
    pub(super) fn create_plan_row(
        &mut self,
        period: Period,
        debt: Option<Money>,
        is_last_sub_period: bool,
    ) -> ScheduleRow {
        let case = self.select_case(period, debt, is_last_sub_period);
        let mut plan = match case {
            PlanCase::Ideal => self.ideal_sums(period),
            PlanCase::Prepayment => self.prepayment_sums(period, debt),
            PlanCase::LastRow => self.last_row_sums(period, debt),
            PlanCase::Default => self.default_sums(period, debt),
        };
        self.ledger
            .record_payment(&plan, &Amounts::default(), PaymentKind::Timely);
        self.ledger.rebalance_on_overpayment();
        self.absorb_overpayment(&mut plan);

        let mut row = ScheduleRow::new(synthetic_id(period.end), RowType::Plan, period.end);
        row.period = Some(period);
        row.plan = plan;
        row.remaining_debt = self.correct_debt(debt, period.end, &plan);
        row.already_paid = self.ledger.is_already_paid();
        row.detail = self.detail(Some(case.describe()));
        self.prev_plan = plan;
        row
    }

    fn select_case(
        &self,
        period: Period,
        debt: Option<Money>,
        is_last_sub_period: bool,
    ) -> PlanCase {
        if is_last_sub_period {
            PlanCase::LastRow
        } else if period.end > self.today && self.balance_is_normalized(period.end, debt) {
            PlanCase::Ideal
        } else if !self.ledger.prepayment.is_zero() {
            PlanCase::Prepayment
        } else {
            PlanCase::Default
        }
    }

    /// a future row may reuse the ideal plan once the actual debt caught up
    /// with the ideal one
    ///
    /// `debt` is the remainder at the start of the period; payments inside
    /// the period move it, so the last payment of the month wins
    fn balance_is_normalized(&self, date_end: chrono::NaiveDate, debt: Option<Money>) -> bool {
        let debt = match self
            .timeline
            .payments_of_month(date_end)
            .and_then(|month| month.debt)
        {
            Some(paid_debt) => Some(paid_debt),
            None => debt,
        };
        let debt = match debt {
            Some(debt) => debt,
            None => return false,
        };
        self.ideal
            .plan_at(date_end)
            .map(|plan| plan.begin_debt == debt)
            .unwrap_or(false)
    }

    fn ideal_sums(&self, period: Period) -> Amounts {
        self.ideal
            .plan_at(period.end)
            .map(|plan| plan.amounts)
            .unwrap_or_default()
    }

    fn prepayment_sums(&mut self, period: Period, debt: Option<Money>) -> Amounts {
        let debt = debt.unwrap_or(Money::ZERO);
        let full_percent = self.calc_percent(debt, period.begin, period.end, None);
        let percent = full_percent - self.ledger.prepayment.percent;
        let mut plan = self.base_sums(percent);
        plan.percent = percent;
        self.ledger.prepayment = Amounts::default();
        plan
    }

    fn last_row_sums(&mut self, period: Period, debt: Option<Money>) -> Amounts {
        let debt = debt.unwrap_or(Money::ZERO);
        let mut percent = self.calc_percent(debt, period.begin, period.end, None);
        let mut body = debt;
        if debt.is_zero() && !self.ledger.is_underpayment_exists(None) {
            body = self.monthly_payment();
        }
        let month = self.timeline.payments_of_month(period.end);
        if let Some(month) = month {
            percent = percent - month.total_percent;
            body = body - month.total_body_debt;
        }
        Amounts::new(body + percent, body, percent)
    }

    fn default_sums(&mut self, period: Period, debt: Option<Money>) -> Amounts {
        let debt = debt.unwrap_or(Money::ZERO);
        let percent = self.calc_percent(debt, period.begin, period.end, None);
        if self.config.schedule_type == ScheduleType::RepayAtEnd {
            let body = self.monthly_payment();
            return Amounts::new(body + percent, body, percent);
        }
        self.base_sums(percent)
    }

    /// fills the free fields around the fixed one
    fn base_sums(&self, percent: Money) -> Amounts {
        let monthly = self.monthly_payment();
        match self.config.schedule_type.fixed_field() {
            FixedField::SizePayment => Amounts::new(monthly, monthly - percent, percent),
            FixedField::BodyDebt => Amounts::new(monthly + percent, monthly, percent),
        }
    }

    /// reduces the row by an accumulated overpayment
    ///
    /// the overpaid field carries the (negative) balance residual, the fixed
    /// field keeps the monthly payment, the third one takes the difference
    fn absorb_overpayment(&mut self, plan: &mut Amounts) {
        let field = if self.ledger.is_overpayment_exists(Some(AmountField::Percent)) {
            AmountField::Percent
        } else if self.ledger.is_overpayment_exists(Some(AmountField::BodyDebt)) {
            AmountField::BodyDebt
        } else {
            return;
        };
        let residual = self.ledger.balance(field);
        self.ledger.clear_field(field);
        let monthly = self.monthly_payment();
        match (field, self.config.schedule_type.fixed_field()) {
            (AmountField::Percent, FixedField::SizePayment) => {
                plan.percent = residual;
                plan.size_payment = monthly;
                plan.body_debt = plan.size_payment - plan.percent;
            }
            (AmountField::Percent, FixedField::BodyDebt) => {
                plan.percent = residual;
                plan.body_debt = monthly;
                plan.size_payment = plan.body_debt + plan.percent;
            }
            (AmountField::BodyDebt, FixedField::SizePayment) => {
                plan.body_debt = residual;
                plan.size_payment = monthly;
                plan.percent = plan.size_payment - plan.body_debt;
            }
            (AmountField::BodyDebt, FixedField::BodyDebt) => {
                plan.body_debt = residual;
                plan.size_payment = plan.body_debt + plan.percent;
            }
            (AmountField::SizePayment, _) => {}
        }
    }

    /// remaining debt shown on a plan row
    ///
    /// during the fact period the debt follows the book movements of the
    /// month; a future row with an outstanding underpayment additionally
    /// repays the planned body
    pub(super) fn correct_debt(
        &self,
        debt: Option<Money>,
        date: chrono::NaiveDate,
        plan: &Amounts,
    ) -> Money {
        if self.facts.is_registered() {
            let mut debt =
                debt.unwrap_or(Money::ZERO) + self.timeline.change_debts_by_month(date);
            if date >= self.today && self.ledger.is_underpayment_exists(None) {
                debt = debt - plan.body_debt;
            }
            debt
        } else {
            debt.unwrap_or(Money::ZERO) - plan.body_debt
        }
    }
}
