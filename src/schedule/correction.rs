//! Correction rows.
//!
//! Produced when the last payment leaves the loan in a state a plan row
//! cannot express, such as interest underpaid while the principal is overpaid.
//! The row shows the residual of each component and asks the user to correct
//! the payment.

use chrono::NaiveDate;

use crate::decimal::Money;
use crate::periods::Period;
use crate::row::{synthetic_id, AmountField, Amounts, RowType, ScheduleRow};

use super::real::Engine;

impl Engine<'_> {
    pub(super) fn create_correction_row(&mut self, date: NaiveDate) -> ScheduleRow {
        let plan = Amounts::new(
            Money::ZERO,
            self.ledger.balance(AmountField::BodyDebt),
            self.ledger.balance(AmountField::Percent),
        );
        let mut row = ScheduleRow::new(synthetic_id(date), RowType::Correction, date);
        row.period = Some(Period::new(date, date));
        row.plan = plan;
        row.remaining_debt = Money::ZERO;
        row.already_paid = self.ledger.is_already_paid();
        row.tooltip = Some(self.correction_tooltip(&plan));
        row.detail = self.detail(Some("Correction row"));
        row
    }

    fn correction_tooltip(&self, plan: &Amounts) -> String {
        let mut parts = Vec::new();
        for (amount, name) in [(plan.percent, "interest"), (plan.body_debt, "principal")] {
            if amount.is_positive() {
                parts.push(format!("underpayment of {}", name));
            } else if amount.is_negative() {
                parts.push(format!("overpayment of {}", name));
            }
        }
        let mut text = parts.join(", ");
        if let Some(first) = text.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        text.push_str(". Correct the payment.");
        text
    }
}
