//! Payment facts consumed by the schedule builders.
//!
//! The ledger queries that produce these maps are outside the engine; the
//! engine receives disbursements, percent-accrual postings and payments
//! already materialized, keyed by date, with same-date postings merged into
//! one logical fact.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::LoanDirection;
use crate::decimal::Money;

/// one aggregated ledger fact for a single date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaymentFact {
    /// underlying ledger document ids; more than one means a grouped payment
    pub doc_ids: Vec<i64>,
    pub date: NaiveDate,
    pub debit_debt: Money,
    pub credit_debt: Money,
    pub debit_percent: Money,
    pub credit_percent: Money,
    /// running remaining debt as of this posting
    pub remaining_debt: Money,
    /// opening-balance document rather than a live payment
    pub is_initial_balance: bool,
}

impl PaymentFact {
    /// principal component, seen from the loan direction
    pub fn body_debt(&self, direction: LoanDirection) -> Money {
        match direction {
            LoanDirection::Issued => self.credit_debt - self.debit_debt,
            LoanDirection::Received => self.debit_debt - self.credit_debt,
        }
    }

    /// interest component, seen from the loan direction
    pub fn percent(&self, direction: LoanDirection) -> Money {
        match direction {
            LoanDirection::Issued => self.credit_percent - self.debit_percent,
            LoanDirection::Received => self.debit_percent - self.credit_percent,
        }
    }

    /// accrued interest carried by a percent posting, seen from the loan direction
    ///
    /// accruals grow the receivable side, the mirror of payment postings
    pub fn accrued(&self, direction: LoanDirection) -> Money {
        match direction {
            LoanDirection::Issued => self.debit_percent - self.credit_percent,
            LoanDirection::Received => self.credit_percent - self.debit_percent,
        }
    }

    /// disbursed amount, seen from the loan direction
    pub fn disbursed(&self, direction: LoanDirection) -> Money {
        match direction {
            LoanDirection::Issued => self.debit_debt,
            LoanDirection::Received => self.credit_debt,
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.doc_ids.len() > 1
    }

    pub fn primary_doc_id(&self) -> i64 {
        self.doc_ids.first().copied().unwrap_or(0)
    }
}

/// the three chronological fact maps for one loan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFacts {
    pub disbursements: BTreeMap<NaiveDate, PaymentFact>,
    pub percents: BTreeMap<NaiveDate, PaymentFact>,
    pub payments: BTreeMap<NaiveDate, PaymentFact>,
}

impl PaymentFacts {
    /// a loan is registered once money actually went out
    pub fn is_registered(&self) -> bool {
        !self.disbursements.is_empty()
    }

    pub fn first_disbursement_date(&self) -> Option<NaiveDate> {
        self.disbursements.keys().next().copied()
    }

    pub fn last_payment_date(&self) -> Option<NaiveDate> {
        self.payments.keys().next_back().copied()
    }

    pub fn total_disbursed(&self, direction: LoanDirection) -> Money {
        self.disbursements
            .values()
            .map(|f| f.disbursed(direction))
            .sum()
    }

    /// interest actually paid strictly before `date`
    pub fn paid_percents_before(&self, date: NaiveDate, direction: LoanDirection) -> Money {
        self.payments
            .range(..date)
            .map(|(_, f)| f.percent(direction))
            .sum()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// payment fact for an issued loan: money comes back on the credit side
    pub fn issued_payment(
        id: i64,
        date: NaiveDate,
        body: Money,
        percent: Money,
        remaining: Money,
    ) -> PaymentFact {
        PaymentFact {
            doc_ids: vec![id],
            date,
            credit_debt: body,
            credit_percent: percent,
            remaining_debt: remaining,
            ..Default::default()
        }
    }

    /// disbursement fact for an issued loan: money goes out on the debit side
    pub fn issued_disbursement(id: i64, date: NaiveDate, amount: Money) -> PaymentFact {
        PaymentFact {
            doc_ids: vec![id],
            date,
            debit_debt: amount,
            remaining_debt: amount,
            ..Default::default()
        }
    }
}
