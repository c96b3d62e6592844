//! Schedule builders and the public entry point.
//!
//! A build starts from the loan terms and the materialized ledger facts,
//! derives the timeline and the ideal plan, then dispatches to the builder
//! matching the schedule type: the real builder for periodic loans, the
//! demand builder for on-demand loans, the deposit builder for deposits.
//! Loans with no disbursement get the ideal plan as is.

mod correction;
mod delay;
mod demand;
mod deposit;
mod payment;
mod percent;
mod plan;
mod real;

pub use percent::PercentCalc;

use hourglass_rs::SafeTimeProvider;

use crate::config::{LoanConfig, ScheduleType};
use crate::errors::Result;
use crate::facts::PaymentFacts;
use crate::ideal::IdealSchedule;
use crate::interest::{BookInterestSource, InterestCalculator};
use crate::postprocess::{self, Outcome};
use crate::row::ScheduleRow;
use crate::timeline::Timeline;

use deposit::DepositBuilder;
use real::Engine;

/// the built schedule: display-ready rows plus the totals line
#[derive(Debug, Clone, Default)]
pub struct ScheduleResult {
    pub rows: Vec<ScheduleRow>,
    /// absent when the loan terms cannot produce a schedule
    pub outcome: Option<Outcome>,
}

pub struct PaymentSchedule;

impl PaymentSchedule {
    pub fn build(
        config: &LoanConfig,
        facts: &PaymentFacts,
        calculator: &dyn InterestCalculator,
        book: &dyn BookInterestSource,
        time: &SafeTimeProvider,
    ) -> Result<ScheduleResult> {
        config.validate()?;
        if !config.is_valid() {
            return Ok(ScheduleResult::default());
        }

        let today = config.resolve_today(time);
        let timeline = Timeline::new(config, facts, today);
        let ideal = IdealSchedule::build(config, facts, &timeline, calculator);
        let monthly_payment = ideal.monthly_payment;

        let rows = match config.schedule_type {
            ScheduleType::Deposit => DepositBuilder::new(
                config,
                facts,
                &timeline,
                PercentCalc::new(calculator, config.rate()),
                monthly_payment,
                today,
            )
            .build(),
            _ if !facts.is_registered() => ideal.unregistered_rows(),
            ScheduleType::OnDemand => demand::build(Self::engine(
                config, facts, &timeline, &ideal, calculator, book, today,
            )),
            _ => real::build(Self::engine(
                config, facts, &timeline, &ideal, calculator, book, today,
            )),
        };

        let (rows, outcome) = postprocess::run(rows, config, facts, today, monthly_payment);
        Ok(ScheduleResult {
            rows,
            outcome: Some(outcome),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn engine<'a>(
        config: &'a LoanConfig,
        facts: &'a PaymentFacts,
        timeline: &'a Timeline,
        ideal: &'a IdealSchedule,
        calculator: &'a dyn InterestCalculator,
        book: &'a dyn BookInterestSource,
        today: chrono::NaiveDate,
    ) -> Engine<'a> {
        Engine::new(
            config,
            facts,
            timeline,
            ideal,
            PercentCalc::new(calculator, config.rate()),
            book,
            today,
        )
    }
}
