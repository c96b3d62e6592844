//! Balance ledger: the five money buckets tracking how actual payments
//! relate to planned obligations during one schedule build.
//!
//! A positive balance on a field means net underpayment, a negative one net
//! overpayment. The ledger lives exactly as long as one build and is never
//! persisted.

use std::fmt::Write;

use crate::decimal::Money;
use crate::row::{AmountField, Amounts};

/// where a non-zero payment is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentKind {
    /// money put in before its plan date
    Prepayment,
    /// money put in exactly on a plan date
    Timely,
    /// money put in to settle an outstanding delinquency
    DelaySettlement,
}

/// mutable working state of one schedule build
#[derive(Debug, Clone, Default)]
pub struct BalanceLedger {
    pub prepayment: Amounts,
    pub timely_payment: Amounts,
    pub delay_payment: Amounts,
    pub underpayment: Amounts,
    pub overpayment: Amounts,
}

impl BalanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// balance = underpayment - overpayment - prepayment - timely - delay
    pub fn balance(&self, field: AmountField) -> Money {
        self.underpayment.get(field)
            - self.overpayment.get(field)
            - self.prepayment.get(field)
            - self.timely_payment.get(field)
            - self.delay_payment.get(field)
    }

    pub fn is_underpayment_exists(&self, field: Option<AmountField>) -> bool {
        match field {
            Some(f) => self.balance(f).is_positive(),
            None => AmountField::ALL.iter().any(|f| self.balance(*f).is_positive()),
        }
    }

    pub fn is_overpayment_exists(&self, field: Option<AmountField>) -> bool {
        match field {
            Some(f) => self.balance(f).is_negative(),
            None => AmountField::ALL.iter().any(|f| self.balance(*f).is_negative()),
        }
    }

    /// every field balances to exactly zero
    pub fn is_balanced(&self) -> bool {
        AmountField::ALL.iter().all(|f| self.balance(*f).is_zero())
    }

    /// nothing owed on any field; future plan rows carrying this flag are hidden
    pub fn is_already_paid(&self) -> bool {
        AmountField::ALL
            .iter()
            .all(|f| !self.balance(*f).is_positive())
    }

    /// folds one processed row into the buckets
    ///
    /// a non-zero `fact` goes to the bucket named by `kind`; an all-zero fact
    /// means an unpaid plan row, whose planned amounts become underpayment
    pub fn record_payment(&mut self, plan: &Amounts, fact: &Amounts, kind: PaymentKind) {
        if !fact.is_zero() {
            let storage = match kind {
                PaymentKind::Prepayment => &mut self.prepayment,
                PaymentKind::Timely => &mut self.timely_payment,
                PaymentKind::DelaySettlement => &mut self.delay_payment,
            };
            storage.add(fact);
        } else {
            self.underpayment.add(plan);
        }
    }

    /// moves the excess of payments over what was owed into overpayment
    ///
    /// per field: when 0 < underpayment < prepayment + timely + delay, the
    /// surplus becomes overpayment and the four payment-side buckets reset
    pub fn rebalance_on_overpayment(&mut self) {
        for field in AmountField::ALL {
            let all_payment = self.prepayment.get(field)
                + self.timely_payment.get(field)
                + self.delay_payment.get(field);
            let under = self.underpayment.get(field);
            if under.is_positive() && under < all_payment {
                *self.overpayment.get_mut(field) += all_payment - under;
                *self.underpayment.get_mut(field) = Money::ZERO;
                *self.prepayment.get_mut(field) = Money::ZERO;
                *self.timely_payment.get_mut(field) = Money::ZERO;
                *self.delay_payment.get_mut(field) = Money::ZERO;
            }
        }
    }

    /// rolls back the previous plan row once a delay row supersedes it
    ///
    /// the plan amounts were already counted into underpayment; replace that
    /// contribution with the delay's amounts
    pub fn correct_after_delay(&mut self, previous_plan: &Amounts, delay: &Amounts) {
        for field in AmountField::ALL {
            *self.underpayment.get_mut(field) +=
                delay.get(field) - previous_plan.get(field);
        }
    }

    /// zeroes one field across every bucket (overpayment absorbed into a plan row)
    pub fn clear_field(&mut self, field: AmountField) {
        *self.prepayment.get_mut(field) = Money::ZERO;
        *self.timely_payment.get_mut(field) = Money::ZERO;
        *self.delay_payment.get_mut(field) = Money::ZERO;
        *self.underpayment.get_mut(field) = Money::ZERO;
        *self.overpayment.get_mut(field) = Money::ZERO;
    }

    /// human-readable dump of non-empty buckets plus the balance line
    pub fn detail(&self) -> String {
        let stores = [
            ("Underpayment", &self.underpayment),
            ("Overpayment", &self.overpayment),
            ("Prepayment", &self.prepayment),
            ("Timely payment", &self.timely_payment),
            ("Delay payment", &self.delay_payment),
        ];
        let mut out = String::new();
        for (name, store) in stores {
            if store.is_zero() {
                continue;
            }
            let _ = writeln!(
                out,
                "{}: [payment: {}, body debt: {}, percent: {}]",
                name, store.size_payment, store.body_debt, store.percent
            );
        }
        if !out.is_empty() {
            out.insert_str(0, "Bucket contents:\n");
            let _ = write!(
                out,
                "Balance: [payment: {}, body debt: {}, percent: {}]",
                self.balance(AmountField::SizePayment),
                self.balance(AmountField::BodyDebt),
                self.balance(AmountField::Percent)
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amounts(size: i64, body: i64, percent: i64) -> Amounts {
        Amounts::new(
            Money::from_major(size),
            Money::from_major(body),
            Money::from_major(percent),
        )
    }

    #[test]
    fn test_balance_invariant() {
        let mut ledger = BalanceLedger::new();
        ledger.underpayment = amounts(110, 100, 10);
        ledger.timely_payment = amounts(55, 50, 5);
        ledger.prepayment = amounts(11, 10, 1);

        assert_eq!(ledger.balance(AmountField::SizePayment), Money::from_major(44));
        assert_eq!(ledger.balance(AmountField::BodyDebt), Money::from_major(40));
        assert_eq!(ledger.balance(AmountField::Percent), Money::from_major(4));
        assert!(ledger.is_underpayment_exists(None));
        assert!(!ledger.is_overpayment_exists(None));
    }

    #[test]
    fn test_unpaid_plan_becomes_underpayment() {
        let mut ledger = BalanceLedger::new();
        ledger.record_payment(&amounts(110, 100, 10), &Amounts::default(), PaymentKind::Timely);
        assert_eq!(ledger.underpayment, amounts(110, 100, 10));
        assert!(ledger.timely_payment.is_zero());
    }

    #[test]
    fn test_payment_routing() {
        let mut ledger = BalanceLedger::new();
        let fact = amounts(110, 100, 10);
        ledger.record_payment(&Amounts::default(), &fact, PaymentKind::Prepayment);
        ledger.record_payment(&Amounts::default(), &fact, PaymentKind::DelaySettlement);
        assert_eq!(ledger.prepayment, fact);
        assert_eq!(ledger.delay_payment, fact);
        assert!(ledger.is_overpayment_exists(None));
    }

    #[test]
    fn test_rebalance_on_overpayment() {
        let mut ledger = BalanceLedger::new();
        *ledger.underpayment.get_mut(AmountField::Percent) = Money::from_major(10);
        *ledger.timely_payment.get_mut(AmountField::Percent) = Money::from_major(15);

        ledger.rebalance_on_overpayment();

        assert_eq!(ledger.overpayment.get(AmountField::Percent), Money::from_major(5));
        assert_eq!(ledger.underpayment.get(AmountField::Percent), Money::ZERO);
        assert_eq!(ledger.prepayment.get(AmountField::Percent), Money::ZERO);
        assert_eq!(ledger.timely_payment.get(AmountField::Percent), Money::ZERO);
        assert_eq!(ledger.delay_payment.get(AmountField::Percent), Money::ZERO);
        assert_eq!(ledger.balance(AmountField::Percent), Money::from_major(-5));
    }

    #[test]
    fn test_rebalance_leaves_pure_underpayment_alone() {
        let mut ledger = BalanceLedger::new();
        *ledger.underpayment.get_mut(AmountField::BodyDebt) = Money::from_major(10);
        *ledger.timely_payment.get_mut(AmountField::BodyDebt) = Money::from_major(4);

        ledger.rebalance_on_overpayment();

        // nothing moved: what was paid does not cover what is owed
        assert_eq!(ledger.underpayment.get(AmountField::BodyDebt), Money::from_major(10));
        assert_eq!(ledger.timely_payment.get(AmountField::BodyDebt), Money::from_major(4));
        assert_eq!(ledger.overpayment.get(AmountField::BodyDebt), Money::ZERO);
    }

    #[test]
    fn test_correct_after_delay() {
        let mut ledger = BalanceLedger::new();
        ledger.underpayment = amounts(110, 100, 10);

        let prev_plan = amounts(110, 100, 10);
        let delay = amounts(130, 115, 15);
        ledger.correct_after_delay(&prev_plan, &delay);

        assert_eq!(ledger.underpayment, amounts(130, 115, 15));
    }

    #[test]
    fn test_already_paid() {
        let mut ledger = BalanceLedger::new();
        assert!(ledger.is_already_paid());
        assert!(ledger.is_balanced());

        ledger.underpayment = amounts(1, 1, 0);
        assert!(!ledger.is_already_paid());

        ledger.timely_payment = amounts(2, 1, 1);
        assert!(ledger.is_already_paid());
        assert!(!ledger.is_balanced());
    }

    #[test]
    fn test_clear_field() {
        let mut ledger = BalanceLedger::new();
        ledger.underpayment = amounts(10, 0, 10);
        ledger.timely_payment = amounts(15, 0, 15);
        ledger.clear_field(AmountField::Percent);
        assert_eq!(ledger.balance(AmountField::Percent), Money::ZERO);
        assert_eq!(ledger.balance(AmountField::SizePayment), Money::from_major(-5));
    }
}
