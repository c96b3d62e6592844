//! Fact rows: payments that actually happened.

use crate::facts::PaymentFact;
use crate::ledger::PaymentKind;
use crate::periods::Period;
use crate::row::{Amounts, RowType, ScheduleRow};

use super::real::Engine;

impl Engine<'_> {
    /// folds the payment into the ledger and renders its row
    pub(super) fn create_payment_row(
        &mut self,
        fact: &PaymentFact,
        is_delay_payment: bool,
    ) -> ScheduleRow {
        let direction = self.config.direction;
        let body = fact.body_debt(direction);
        let percent = fact.percent(direction);
        let sums = Amounts::new(body + percent, body, percent);

        let kind = if is_delay_payment {
            PaymentKind::DelaySettlement
        } else if self.timeline.is_plan_date(fact.date) {
            PaymentKind::Timely
        } else {
            PaymentKind::Prepayment
        };
        self.ledger
            .record_payment(&Amounts::default(), &sums, kind);

        let row_type = if fact.is_initial_balance {
            RowType::InitialBalance
        } else if fact.is_grouped() {
            RowType::GroupedPayments
        } else {
            RowType::Payment
        };
        let mut row = ScheduleRow::new(fact.primary_doc_id(), row_type, fact.date);
        row.period = Some(Period::new(fact.date, fact.date));
        row.fact = sums;
        row.remaining_debt = fact.remaining_debt;
        row.already_paid = self.ledger.is_already_paid();
        row.detail = self.detail(None);
        row
    }
}
