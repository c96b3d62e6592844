use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::periods::Period;

/// the three money components every schedule row carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Amounts {
    pub size_payment: Money,
    pub body_debt: Money,
    pub percent: Money,
}

/// addressable component of an [`Amounts`] triple or a ledger bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountField {
    SizePayment,
    BodyDebt,
    Percent,
}

impl AmountField {
    pub const ALL: [AmountField; 3] = [
        AmountField::SizePayment,
        AmountField::BodyDebt,
        AmountField::Percent,
    ];
}

impl Amounts {
    pub fn new(size_payment: Money, body_debt: Money, percent: Money) -> Self {
        Self {
            size_payment,
            body_debt,
            percent,
        }
    }

    pub fn get(&self, field: AmountField) -> Money {
        match field {
            AmountField::SizePayment => self.size_payment,
            AmountField::BodyDebt => self.body_debt,
            AmountField::Percent => self.percent,
        }
    }

    pub fn get_mut(&mut self, field: AmountField) -> &mut Money {
        match field {
            AmountField::SizePayment => &mut self.size_payment,
            AmountField::BodyDebt => &mut self.body_debt,
            AmountField::Percent => &mut self.percent,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.size_payment.is_zero() && self.body_debt.is_zero() && self.percent.is_zero()
    }

    pub fn add(&mut self, other: &Amounts) {
        self.size_payment += other.size_payment;
        self.body_debt += other.body_debt;
        self.percent += other.percent;
    }
}

/// tagged schedule row variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowType {
    Plan,
    Payment,
    GroupedPayments,
    InitialBalance,
    OpenDelay,
    ClosedDelay,
    Correction,
    YearSeparator,
    Outcome,
}

impl RowType {
    /// fixed intra-date ordering: year separators always sort first
    pub fn sort_priority(&self) -> i32 {
        match self {
            RowType::YearSeparator => 0,
            RowType::ClosedDelay => 1,
            RowType::OpenDelay => 2,
            RowType::Payment => 3,
            RowType::GroupedPayments => 4,
            RowType::InitialBalance => 5,
            RowType::Plan => 6,
            RowType::Outcome => 7,
            RowType::Correction => 8,
        }
    }
}

/// one row of the built schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// ledger document id for payment rows, synthetic negative id otherwise
    pub id: i64,
    pub row_type: RowType,
    pub date: NaiveDate,
    pub period: Option<Period>,
    /// planned amounts
    pub plan: Amounts,
    /// actual amounts
    pub fact: Amounts,
    pub remaining_debt: Money,
    pub description: Option<String>,
    pub date_description: Option<String>,
    pub tooltip: Option<String>,
    /// free text explaining which case produced the row
    pub detail: Option<String>,
    pub already_paid: bool,
    pub can_payment: bool,
    pub nearest_payment: bool,
    pub show_total: bool,
    pub separator_line: bool,
}

impl ScheduleRow {
    pub fn new(id: i64, row_type: RowType, date: NaiveDate) -> Self {
        Self {
            id,
            row_type,
            date,
            period: None,
            plan: Amounts::default(),
            fact: Amounts::default(),
            remaining_debt: Money::ZERO,
            description: None,
            date_description: None,
            tooltip: None,
            detail: None,
            already_paid: false,
            can_payment: false,
            nearest_payment: false,
            show_total: false,
            separator_line: false,
        }
    }
}

/// synthetic identity for computed (non-persisted) rows, derived from the date
pub fn synthetic_id(date: NaiveDate) -> i64 {
    -((date.year() as i64) * 10_000 + (date.month() as i64) * 100 + date.day() as i64)
}

/// folds the amounts of auxiliary rows into a base row
///
/// absorbed principal also shrinks the base row's remaining debt
pub fn join_sum_rows(base: &mut ScheduleRow, rows: &[&ScheduleRow]) {
    let mut change_body = Money::ZERO;
    for row in rows {
        base.plan.add(&row.plan);
        base.fact.add(&row.fact);
        change_body += row.plan.body_debt + row.fact.body_debt;
    }
    base.remaining_debt -= change_body;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_synthetic_id() {
        assert_eq!(synthetic_id(d(2024, 2, 1)), -20_240_201);
        assert_eq!(synthetic_id(d(2024, 12, 31)), -20_241_231);
    }

    #[test]
    fn test_year_separator_sorts_first() {
        for rt in [
            RowType::Plan,
            RowType::Payment,
            RowType::OpenDelay,
            RowType::ClosedDelay,
            RowType::Correction,
        ] {
            assert!(RowType::YearSeparator.sort_priority() < rt.sort_priority());
        }
    }

    #[test]
    fn test_join_sum_rows() {
        let mut base = ScheduleRow::new(synthetic_id(d(2024, 3, 15)), RowType::OpenDelay, d(2024, 3, 15));
        base.plan = Amounts::new(
            Money::from_major(110),
            Money::from_major(100),
            Money::from_major(10),
        );
        base.remaining_debt = Money::from_major(900);

        let mut plan = ScheduleRow::new(synthetic_id(d(2024, 3, 15)), RowType::Plan, d(2024, 3, 15));
        plan.plan = Amounts::new(
            Money::from_major(55),
            Money::from_major(50),
            Money::from_major(5),
        );

        join_sum_rows(&mut base, &[&plan]);
        assert_eq!(base.plan.size_payment, Money::from_major(165));
        assert_eq!(base.plan.body_debt, Money::from_major(150));
        assert_eq!(base.plan.percent, Money::from_major(15));
        assert_eq!(base.remaining_debt, Money::from_major(850));
    }

    #[test]
    fn test_row_type_round_trip() {
        let row = ScheduleRow::new(-20_240_201, RowType::OpenDelay, d(2024, 2, 1));
        let json = serde_json::to_string(&row).unwrap();
        let back: ScheduleRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
