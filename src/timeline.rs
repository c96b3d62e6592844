//! Plan-date timeline and fact aggregation.
//!
//! Derives the planned payment dates from the loan terms, extends them with a
//! prolongation date when payments outlive the contract, and groups the raw
//! ledger facts by the plan date they settle.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;

use crate::config::{LoanConfig, ScheduleType};
use crate::decimal::Money;
use crate::facts::PaymentFacts;
use crate::periods::{is_end_of_month, month_delta, monthly_dates, sub_periods, Period};

/// facts of one plan month rolled together
#[derive(Debug, Clone, Default)]
pub struct MonthlyPayments {
    /// principal repaid per payment date
    pub debts: BTreeMap<NaiveDate, Money>,
    pub total_body_debt: Money,
    pub total_percent: Money,
    pub total_size_payment: Money,
    /// remaining debt after the last payment of the month
    pub debt: Option<Money>,
}

/// precomputed date structure of one schedule build
#[derive(Debug, Clone)]
pub struct Timeline {
    today: NaiveDate,
    /// contractual plan dates, without prolongation
    plan_dates: Vec<NaiveDate>,
    /// plan dates extended with the prolongation date when needed
    plan_dates_prolonged: Vec<NaiveDate>,
    /// disbursements grouped by the first plan date at or after them
    agg_disbursements: BTreeMap<NaiveDate, BTreeMap<NaiveDate, Money>>,
    /// payments grouped by the first plan date at or after them
    agg_payments: BTreeMap<NaiveDate, MonthlyPayments>,
    payment_dates_by_plan: BTreeMap<NaiveDate, Vec<NaiveDate>>,
    plan_period_by_date: BTreeMap<NaiveDate, Period>,
}

impl Timeline {
    pub fn new(config: &LoanConfig, facts: &PaymentFacts, today: NaiveDate) -> Self {
        let plan_dates = Self::calc_plan_dates(config, facts);

        let prolongation_date = match facts.last_payment_date() {
            Some(last) => today.max(last),
            None => today,
        };
        let needs_prolongation = facts.is_registered()
            && config
                .date_end
                .map(|end| end < prolongation_date)
                .unwrap_or(false);
        let mut plan_dates_prolonged = plan_dates.clone();
        if needs_prolongation {
            plan_dates_prolonged.push(prolongation_date);
            plan_dates_prolonged.sort();
        }

        let agg_disbursements =
            Self::calc_agg_disbursements(&plan_dates_prolonged, config, facts);
        let agg_payments = Self::calc_agg_payments(&plan_dates_prolonged, config, facts);
        let payment_dates_by_plan =
            Self::calc_payment_dates_by_plan(&plan_dates_prolonged, facts);
        let plan_period_by_date = Self::calc_plan_period_by_date(
            &plan_dates_prolonged,
            config.date_begin,
            facts,
            today,
        );

        Self {
            today,
            plan_dates,
            plan_dates_prolonged,
            agg_disbursements,
            agg_payments,
            payment_dates_by_plan,
            plan_period_by_date,
        }
    }

    /// expected date of the first plan payment
    ///
    /// a user-chosen first payment date wins while it stays inside the
    /// contract, otherwise one month after the start, capped by the end
    fn plan_first_payment_date(config: &LoanConfig) -> NaiveDate {
        let date_end = config.date_end_or_begin();
        if let Some(first) = config.first_payment_date {
            if config.date_begin <= first && first <= date_end {
                return first;
            }
        }
        month_delta(config.date_begin, 1, false).min(date_end)
    }

    fn calc_plan_dates(config: &LoanConfig, facts: &PaymentFacts) -> Vec<NaiveDate> {
        match config.schedule_type {
            ScheduleType::Annuity | ScheduleType::Differentiated | ScheduleType::Deposit => {
                let first = Self::plan_first_payment_date(config);
                let mut dates = monthly_dates(
                    first,
                    config.date_end_or_begin(),
                    is_end_of_month(first),
                );
                if let Some(count) = Self::user_payments_count(config, facts) {
                    dates.truncate(count);
                }
                dates
            }
            ScheduleType::RepayAtEnd => match config.date_end {
                Some(end) => vec![end],
                None => Vec::new(),
            },
            ScheduleType::OnDemand => Vec::new(),
        }
    }

    /// number of payments implied by a user-chosen monthly payment
    fn user_payments_count(config: &LoanConfig, facts: &PaymentFacts) -> Option<usize> {
        let monthly = config.monthly_payment.filter(|m| m.is_positive())?;
        if config.schedule_type != ScheduleType::Annuity {
            let loan_sum = {
                let disbursed = facts.total_disbursed(config.direction);
                if disbursed.is_positive() {
                    disbursed
                } else {
                    config.principal
                }
            };
            let count = (loan_sum.as_decimal() / monthly.as_decimal()).ceil();
            return count.to_usize();
        }

        // annuity term: log_{1+mr}(p / (p - S * mr)); a payment below the
        // monthly interest never repays the loan
        let monthly_rate = config.monthly_rate().as_decimal();
        let interest_only = config.principal.as_decimal() * monthly_rate;
        if monthly.as_decimal() <= interest_only {
            return None;
        }
        if monthly_rate.is_zero() {
            let count = (config.principal.as_decimal() / monthly.as_decimal()).ceil();
            return count.to_usize();
        }
        let term = (monthly.as_decimal() / (monthly.as_decimal() - interest_only)).to_f64()?;
        let base = (rust_decimal::Decimal::ONE + monthly_rate).to_f64()?;
        let count = term.ln() / base.ln();
        Some(count.ceil() as usize)
    }

    fn calc_agg_disbursements(
        plan_dates: &[NaiveDate],
        config: &LoanConfig,
        facts: &PaymentFacts,
    ) -> BTreeMap<NaiveDate, BTreeMap<NaiveDate, Money>> {
        let mut dates: Vec<NaiveDate> = plan_dates.to_vec();
        dates.extend(facts.disbursements.keys().copied());
        dates.sort();
        dates.dedup();

        let mut by_month = BTreeMap::new();
        let mut debts = BTreeMap::new();
        for date in dates {
            if let Some(fact) = facts.disbursements.get(&date) {
                debts.insert(date, fact.disbursed(config.direction));
            }
            if plan_dates.contains(&date) {
                by_month.insert(date, std::mem::take(&mut debts));
            }
        }
        by_month
    }

    fn calc_agg_payments(
        plan_dates: &[NaiveDate],
        config: &LoanConfig,
        facts: &PaymentFacts,
    ) -> BTreeMap<NaiveDate, MonthlyPayments> {
        let mut dates: Vec<NaiveDate> = plan_dates.to_vec();
        dates.extend(facts.payments.keys().copied());
        dates.sort();
        dates.dedup();

        let mut by_month = BTreeMap::new();
        let mut current = MonthlyPayments::default();
        for date in dates {
            if let Some(fact) = facts.payments.get(&date) {
                let body = fact.body_debt(config.direction);
                let percent = fact.percent(config.direction);
                current.debts.insert(date, body);
                current.total_body_debt += body;
                current.total_percent += percent;
                current.total_size_payment = current.total_body_debt + current.total_percent;
                current.debt = Some(fact.remaining_debt);
            }
            if plan_dates.contains(&date) && !current.debts.is_empty() {
                by_month.insert(date, std::mem::take(&mut current));
            }
        }
        by_month
    }

    fn calc_payment_dates_by_plan(
        plan_dates: &[NaiveDate],
        facts: &PaymentFacts,
    ) -> BTreeMap<NaiveDate, Vec<NaiveDate>> {
        let mut dates: Vec<NaiveDate> = plan_dates.to_vec();
        dates.extend(facts.payments.keys().copied());
        dates.sort();
        dates.dedup();

        let mut by_plan = BTreeMap::new();
        let mut payment_dates = Vec::new();
        for date in dates {
            if facts.payments.contains_key(&date) {
                payment_dates.push(date);
            }
            if plan_dates.contains(&date) {
                by_plan.insert(date, std::mem::take(&mut payment_dates));
            }
        }
        by_plan
    }

    fn calc_plan_period_by_date(
        plan_dates: &[NaiveDate],
        date_begin: NaiveDate,
        facts: &PaymentFacts,
        today: NaiveDate,
    ) -> BTreeMap<NaiveDate, Period> {
        let mut bounds = vec![date_begin];
        bounds.extend_from_slice(plan_dates);
        let plan_periods = sub_periods(bounds, false);

        let mut schedule_dates: Vec<NaiveDate> = plan_dates.to_vec();
        schedule_dates.extend(facts.payments.keys().copied());
        schedule_dates.push(today);
        schedule_dates.sort();
        schedule_dates.dedup();

        let mut by_date = BTreeMap::new();
        for date in schedule_dates {
            for period in &plan_periods {
                if period.begin < date && date <= period.end {
                    by_date.insert(date, *period);
                }
            }
        }
        by_date
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn plan_dates(&self, use_prolongation: bool) -> &[NaiveDate] {
        if use_prolongation {
            &self.plan_dates_prolonged
        } else {
            &self.plan_dates
        }
    }

    pub fn is_plan_date(&self, date: NaiveDate) -> bool {
        self.plan_dates_prolonged.contains(&date)
    }

    pub fn last_plan_date(&self, use_prolongation: bool) -> Option<NaiveDate> {
        self.plan_dates(use_prolongation).last().copied()
    }

    /// plan periods, optionally starting no earlier than the first disbursement
    pub fn periods(
        &self,
        config: &LoanConfig,
        facts: &PaymentFacts,
        use_prolongation: bool,
        check_disbursement: bool,
    ) -> Vec<Period> {
        if config.schedule_type == ScheduleType::OnDemand {
            return Vec::new();
        }
        let date_begin = if check_disbursement {
            match facts.first_disbursement_date() {
                Some(first) => config.date_begin.max(first),
                None => config.date_begin,
            }
        } else {
            config.date_begin
        };
        let mut dates = vec![date_begin];
        dates.extend(
            self.plan_dates(use_prolongation)
                .iter()
                .copied()
                .filter(|d| *d >= date_begin),
        );
        sub_periods(dates, false)
    }

    pub fn disbursements_of_month(
        &self,
        plan_date: NaiveDate,
    ) -> Option<&BTreeMap<NaiveDate, Money>> {
        self.agg_disbursements.get(&plan_date)
    }

    pub fn payments_of_month(&self, plan_date: NaiveDate) -> Option<&MonthlyPayments> {
        self.agg_payments.get(&plan_date)
    }

    pub fn payment_dates_of_plan(&self, plan_date: NaiveDate) -> &[NaiveDate] {
        self.payment_dates_by_plan
            .get(&plan_date)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn plan_period_of(&self, date: NaiveDate) -> Option<Period> {
        self.plan_period_by_date.get(&date).copied()
    }

    /// net principal movement (new disbursements minus repayments) settled on
    /// the plan date
    pub fn change_debts_by_month(&self, plan_date: NaiveDate) -> Money {
        let disbursed: Money = self
            .agg_disbursements
            .get(&plan_date)
            .map(|debts| debts.values().copied().sum())
            .unwrap_or(Money::ZERO);
        let repaid: Money = self
            .agg_payments
            .get(&plan_date)
            .map(|month| month.debts.values().copied().sum())
            .unwrap_or(Money::ZERO);
        disbursed - repaid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoanDirection, SortOrder};
    use crate::facts::testing::{issued_disbursement, issued_payment};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn config(schedule_type: ScheduleType) -> LoanConfig {
        LoanConfig {
            principal: Money::from_major(120_000),
            annual_rate: Money::from_major(12),
            schedule_type,
            date_begin: d(2024, 1, 15),
            date_end: Some(d(2024, 7, 15)),
            monthly_payment: None,
            first_payment_date: None,
            build_date: None,
            direction: LoanDirection::Issued,
            order_by: SortOrder::Ascending,
            payment_allowed: false,
        }
    }

    #[test]
    fn test_monthly_plan_dates() {
        let cfg = config(ScheduleType::Differentiated);
        let facts = PaymentFacts::default();
        let timeline = Timeline::new(&cfg, &facts, d(2024, 1, 15));
        assert_eq!(
            timeline.plan_dates(false),
            &[
                d(2024, 2, 15),
                d(2024, 3, 15),
                d(2024, 4, 15),
                d(2024, 5, 15),
                d(2024, 6, 15),
                d(2024, 7, 15),
            ]
        );
    }

    #[test]
    fn test_first_payment_date_override() {
        let mut cfg = config(ScheduleType::Differentiated);
        cfg.first_payment_date = Some(d(2024, 2, 1));
        let facts = PaymentFacts::default();
        let timeline = Timeline::new(&cfg, &facts, d(2024, 1, 15));
        assert_eq!(timeline.plan_dates(false)[0], d(2024, 2, 1));

        // outside the contract the override is ignored
        cfg.first_payment_date = Some(d(2023, 12, 1));
        let timeline = Timeline::new(&cfg, &facts, d(2024, 1, 15));
        assert_eq!(timeline.plan_dates(false)[0], d(2024, 2, 15));
    }

    #[test]
    fn test_repay_at_end_single_date() {
        let cfg = config(ScheduleType::RepayAtEnd);
        let facts = PaymentFacts::default();
        let timeline = Timeline::new(&cfg, &facts, d(2024, 1, 15));
        assert_eq!(timeline.plan_dates(false), &[d(2024, 7, 15)]);
    }

    #[test]
    fn test_on_demand_has_no_plan() {
        let cfg = config(ScheduleType::OnDemand);
        let facts = PaymentFacts::default();
        let timeline = Timeline::new(&cfg, &facts, d(2024, 1, 15));
        assert!(timeline.plan_dates(true).is_empty());
        assert!(timeline.periods(&cfg, &facts, true, false).is_empty());
    }

    #[test]
    fn test_prolongation_after_contract_end() {
        let cfg = config(ScheduleType::Differentiated);
        let mut facts = PaymentFacts::default();
        facts.disbursements.insert(
            d(2024, 1, 15),
            issued_disbursement(1, d(2024, 1, 15), Money::from_major(120_000)),
        );
        let today = d(2024, 9, 1);
        let timeline = Timeline::new(&cfg, &facts, today);

        assert_eq!(timeline.last_plan_date(false), Some(d(2024, 7, 15)));
        assert_eq!(timeline.last_plan_date(true), Some(today));
    }

    #[test]
    fn test_no_prolongation_without_registration() {
        let cfg = config(ScheduleType::Differentiated);
        let facts = PaymentFacts::default();
        let timeline = Timeline::new(&cfg, &facts, d(2024, 9, 1));
        assert_eq!(timeline.last_plan_date(true), Some(d(2024, 7, 15)));
    }

    #[test]
    fn test_user_payments_count_truncates() {
        let mut cfg = config(ScheduleType::Differentiated);
        cfg.monthly_payment = Some(Money::from_major(50_000));
        let facts = PaymentFacts::default();
        let timeline = Timeline::new(&cfg, &facts, d(2024, 1, 15));
        // ceil(120000 / 50000) = 3 payments
        assert_eq!(timeline.plan_dates(false).len(), 3);
    }

    #[test]
    fn test_annuity_count_rejects_small_payment() {
        let mut cfg = config(ScheduleType::Annuity);
        // monthly interest is 1200, a payment below it never repays
        cfg.monthly_payment = Some(Money::from_major(1_000));
        let facts = PaymentFacts::default();
        assert_eq!(Timeline::user_payments_count(&cfg, &facts), None);

        cfg.monthly_payment = Some(Money::from_major(25_000));
        let count = Timeline::user_payments_count(&cfg, &facts).unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_fact_aggregation() {
        let cfg = config(ScheduleType::Differentiated);
        let mut facts = PaymentFacts::default();
        facts.disbursements.insert(
            d(2024, 1, 15),
            issued_disbursement(1, d(2024, 1, 15), Money::from_major(120_000)),
        );
        // two payments inside the first plan month, one in the second
        for (id, date, body) in [
            (2, d(2024, 1, 25), 5_000),
            (3, d(2024, 2, 15), 15_000),
            (4, d(2024, 3, 1), 20_000),
        ] {
            facts.payments.insert(
                date,
                issued_payment(
                    id,
                    date,
                    Money::from_major(body),
                    Money::from_major(100),
                    Money::from_major(120_000 - body),
                ),
            );
        }
        let timeline = Timeline::new(&cfg, &facts, d(2024, 3, 10));

        let first = timeline.payments_of_month(d(2024, 2, 15)).unwrap();
        assert_eq!(first.debts.len(), 2);
        assert_eq!(first.total_body_debt, Money::from_major(20_000));
        assert_eq!(first.total_percent, Money::from_major(200));
        assert_eq!(first.total_size_payment, Money::from_major(20_200));
        assert_eq!(first.debt, Some(Money::from_major(105_000)));

        assert_eq!(
            timeline.payment_dates_of_plan(d(2024, 2, 15)),
            &[d(2024, 1, 25), d(2024, 2, 15)]
        );
        // the day-one disbursement lands in the first plan month, so the
        // month's debt change is 120000 disbursed minus 20000 repaid
        assert_eq!(
            timeline.change_debts_by_month(d(2024, 2, 15)),
            Money::from_major(100_000)
        );

        let period = timeline.plan_period_of(d(2024, 3, 1)).unwrap();
        assert_eq!(period, Period::new(d(2024, 2, 15), d(2024, 3, 15)));
    }
}
