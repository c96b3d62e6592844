//! Ideal payment schedule.
//!
//! The ideal plan assumes the loan is disbursed in full on day one and every
//! payment arrives exactly on its plan date. It serves three purposes: it is
//! the schedule shown for loans that were never disbursed, it pins down the
//! best monthly payment when the user did not choose one, and it supplies the
//! reference debts the real schedule compares itself against.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::{LoanConfig, ScheduleType};
use crate::decimal::Money;
use crate::facts::PaymentFacts;
use crate::interest::InterestCalculator;
use crate::periods::Period;
use crate::row::{synthetic_id, Amounts, RowType, ScheduleRow};
use crate::timeline::Timeline;

/// convergence bound for the monthly-payment fit
const PAYMENT_FIT_TOLERANCE: &str = "0.01";

/// one month of the ideal plan, keyed in the schedule by its period end
#[derive(Debug, Clone, PartialEq)]
pub struct IdealPlan {
    pub amounts: Amounts,
    pub begin_debt: Money,
    pub end_debt: Money,
    pub period: Period,
}

/// the full ideal plan plus the monthly payment it was built with
#[derive(Debug, Clone)]
pub struct IdealSchedule {
    pub plans: BTreeMap<NaiveDate, IdealPlan>,
    pub monthly_payment: Money,
}

impl IdealSchedule {
    pub fn build(
        config: &LoanConfig,
        facts: &PaymentFacts,
        timeline: &Timeline,
        calc: &dyn InterestCalculator,
    ) -> Self {
        let builder = Builder {
            config,
            facts,
            timeline,
            calc,
        };
        let monthly_payment = match config.monthly_payment.filter(|m| !m.is_zero()) {
            Some(user) => user,
            None => builder.best_monthly_payment(),
        };
        let plans = builder.sum_schedule(monthly_payment);
        Self {
            plans,
            monthly_payment,
        }
    }

    pub fn plan_at(&self, period_end: NaiveDate) -> Option<&IdealPlan> {
        self.plans.get(&period_end)
    }

    /// plan rows shown for a loan that was never disbursed
    pub fn unregistered_rows(&self) -> Vec<ScheduleRow> {
        self.plans
            .iter()
            .map(|(date, plan)| {
                let mut row = ScheduleRow::new(synthetic_id(*date), RowType::Plan, *date);
                row.period = Some(plan.period);
                row.plan = plan.amounts;
                row.remaining_debt = plan.end_debt;
                row
            })
            .collect()
    }
}

struct Builder<'a> {
    config: &'a LoanConfig,
    facts: &'a PaymentFacts,
    timeline: &'a Timeline,
    calc: &'a dyn InterestCalculator,
}

impl Builder<'_> {
    /// full loan amount the plan amortizes: actual disbursements once money
    /// moved, the contractual principal otherwise
    fn loan_sum(&self) -> Money {
        let disbursed = self.facts.total_disbursed(self.config.direction);
        if disbursed.is_positive() {
            disbursed
        } else {
            self.config.principal
        }
    }

    fn payments_count(&self) -> usize {
        if self.config.schedule_type == ScheduleType::OnDemand {
            1
        } else {
            self.timeline.plan_dates(false).len()
        }
    }

    fn sum_schedule(&self, monthly_payment: Money) -> BTreeMap<NaiveDate, IdealPlan> {
        let mut plans = BTreeMap::new();
        let plan_dates = self.timeline.plan_dates(false);
        let last_plan_date = match plan_dates.last() {
            Some(last) => *last,
            None => return plans,
        };

        let mut debt = self.config.principal;
        for period in self
            .timeline
            .periods(self.config, self.facts, false, false)
        {
            let is_last = period.end == last_plan_date;
            let amounts = self.calc_plan(debt, &period, is_last, monthly_payment);
            let end_debt = debt - amounts.body_debt;
            plans.insert(
                period.end,
                IdealPlan {
                    amounts,
                    begin_debt: debt,
                    end_debt,
                    period,
                },
            );
            debt = end_debt;
            if debt.is_zero() {
                break;
            }
        }
        plans
    }

    fn calc_plan(
        &self,
        debt: Money,
        period: &Period,
        is_last: bool,
        monthly_payment: Money,
    ) -> Amounts {
        let percent = self
            .calc
            .accrue(debt, self.config.rate(), period.begin, period.end)
            .round_dp(2);

        if is_last {
            return Amounts::new(debt + percent, debt, percent);
        }

        let (mut size_payment, mut body_debt) =
            if self.config.schedule_type == ScheduleType::Differentiated {
                (monthly_payment + percent, monthly_payment)
            } else {
                (monthly_payment, monthly_payment - percent)
            };
        if Self::has_overflow(size_payment, body_debt, percent, debt - body_debt) {
            body_debt = debt;
            size_payment = body_debt + percent;
        }
        Amounts::new(size_payment, body_debt, percent)
    }

    fn has_overflow(size_payment: Money, body_debt: Money, percent: Money, debt: Money) -> bool {
        let overflow = [size_payment, body_debt, percent, debt]
            .iter()
            .any(Money::is_negative);
        if overflow {
            log::warn!(
                "plan row overflow (payment: {}, body debt: {}, percent: {}, \
                 remaining debt: {}); treating the period as the last one",
                size_payment,
                body_debt,
                percent,
                debt,
            );
        }
        overflow
    }

    fn best_monthly_payment(&self) -> Money {
        if self.config.schedule_type == ScheduleType::Annuity {
            self.fit_annuity_payment()
        } else {
            self.simple_monthly_payment()
        }
    }

    /// loan sum split evenly over the expected payments
    fn simple_monthly_payment(&self) -> Money {
        let count = self.payments_count();
        if count == 0 {
            return self.loan_sum();
        }
        self.loan_sum() / Decimal::from(count)
    }

    /// closed-form annuity payment: S * mr * (1 + 1 / ((1 + mr)^n - 1))
    fn annuity_monthly_payment(&self) -> Money {
        let count = self.payments_count();
        let monthly_rate = self.config.monthly_rate().as_decimal();
        if count == 0 || monthly_rate.is_zero() {
            return self.simple_monthly_payment();
        }
        let compound = power(Decimal::ONE + monthly_rate, count) - Decimal::ONE;
        if compound.is_zero() {
            return self.simple_monthly_payment();
        }
        let factor = monthly_rate * (Decimal::ONE + Decimal::ONE / compound);
        self.loan_sum() * factor
    }

    /// refines the closed-form payment until the last plan row pays exactly
    /// the monthly payment, by the secant method on the residual
    fn fit_annuity_payment(&self) -> Money {
        let tolerance = Money::from_str_exact(PAYMENT_FIT_TOLERANCE)
            .unwrap_or(Money::CENT);

        let mut payment = self.annuity_monthly_payment();
        let mut delta = self.payment_delta(payment);
        if delta.abs() < tolerance {
            return payment;
        }

        let mut prev = (payment, delta);
        payment += Money::CENT;
        delta = self.payment_delta(payment);
        let mut cur = (payment, delta);

        for _ in 0..5 {
            if cur.1.abs() < tolerance {
                break;
            }
            let next = match secant_root(prev, cur) {
                Some(x) => x,
                None => break,
            };
            prev = cur;
            cur = (next, self.payment_delta(next));
        }
        cur.0
    }

    /// residual between the last plan payment and the monthly payment
    fn payment_delta(&self, monthly_payment: Money) -> Money {
        let plans = self.sum_schedule(monthly_payment);
        match plans.values().next_back() {
            Some(last) => last.amounts.size_payment - monthly_payment,
            None => Money::ZERO,
        }
    }
}

/// x intercept of the line through two points
fn secant_root((x1, y1): (Money, Money), (x2, y2): (Money, Money)) -> Option<Money> {
    let run = (x2 - x1).as_decimal();
    let rise = (y2 - y1).as_decimal();
    if run.is_zero() || rise.is_zero() {
        return None;
    }
    let slope = rise / run;
    Some(Money::from_decimal(-y2.as_decimal() / slope + x2.as_decimal()))
}

fn power(base: Decimal, exp: usize) -> Decimal {
    let mut result = Decimal::ONE;
    for _ in 0..exp {
        result *= base;
    }
    result
}
