//! Post-processing of a built schedule.
//!
//! Runs after any of the builders: sorts, flags the nearest payment, inserts
//! the year separators, drops stale plan rows, marks the current-day
//! separator line, and aggregates the outcome totals.
//!
//! The steps are order-sensitive: the nearest payment must be computed before
//! stale plans are removed (the flagged row may be among them), and the
//! separator line needs the rows sorted by date.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use crate::config::{LoanConfig, SortOrder};
use crate::decimal::Money;
use crate::facts::PaymentFacts;
use crate::row::{Amounts, RowType, ScheduleRow};

/// totals line of the schedule
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub amounts: Amounts,
    pub remaining_debt: Money,
    pub monthly_payment: Money,
    pub order_by: SortOrder,
    pub payments_exist: bool,
    pub show_total: bool,
}

pub fn run(
    mut rows: Vec<ScheduleRow>,
    config: &LoanConfig,
    facts: &PaymentFacts,
    today: NaiveDate,
    monthly_payment: Money,
) -> (Vec<ScheduleRow>, Outcome) {
    rows.sort_by_key(|row| row.date);
    mark_nearest_payment(&mut rows, facts, today);
    add_year_rows(&mut rows, config, facts, today);
    remove_stale_plans(&mut rows, facts, today);
    mark_can_payment(&mut rows, config, facts);
    mark_separator_line(&mut rows, facts, today);
    let show_total = rows.len() > 1;
    for row in &mut rows {
        row.show_total = show_total;
    }
    sort_rows(&mut rows, config.order_by);
    let outcome = calc_outcome(&rows, config, facts, today, monthly_payment, show_total);
    (rows, outcome)
}

/// flags the first plan or open-delay row at or after the current day
fn mark_nearest_payment(rows: &mut [ScheduleRow], facts: &PaymentFacts, today: NaiveDate) {
    if !facts.is_registered() {
        return;
    }
    let nearest = rows.iter_mut().find(|row| {
        matches!(row.row_type, RowType::Plan | RowType::OpenDelay) && row.date >= today
    });
    if let Some(row) = nearest {
        row.nearest_payment = true;
    }
}

/// service rows carrying the year, so the client can group by it
fn add_year_rows(
    rows: &mut Vec<ScheduleRow>,
    config: &LoanConfig,
    facts: &PaymentFacts,
    today: NaiveDate,
) {
    let mut years: BTreeSet<i32> = rows
        .iter()
        .filter(|row| !facts.is_registered() || row.date >= today)
        .map(|row| row.date.year())
        .collect();
    years.extend(facts.payments.keys().map(|date| date.year()));

    let mut years: Vec<i32> = years.into_iter().collect();
    if years.is_empty() {
        return;
    }
    // the first visible year needs no separator
    match config.order_by {
        SortOrder::Ascending => {
            years.remove(0);
        }
        SortOrder::Descending => {
            years.pop();
        }
    }
    let (month, day) = match config.order_by {
        SortOrder::Ascending => (1, 1),
        SortOrder::Descending => (12, 31),
    };
    for year in years {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            let mut row = ScheduleRow::new(year as i64, RowType::YearSeparator, date);
            row.date_description = Some(year.to_string());
            rows.push(row);
        }
    }
}

/// drops plan rows that are in the past or already covered by payments
fn remove_stale_plans(rows: &mut Vec<ScheduleRow>, facts: &PaymentFacts, today: NaiveDate) {
    if !facts.is_registered() {
        return;
    }
    let mut nearest_removed = false;
    rows.retain(|row| {
        let stale = row.row_type == RowType::Plan && (row.date < today || row.already_paid);
        if stale && row.nearest_payment {
            nearest_removed = true;
        }
        !stale
    });
    if nearest_removed {
        mark_nearest_payment(rows, facts, today);
    }
}

fn mark_can_payment(rows: &mut [ScheduleRow], config: &LoanConfig, facts: &PaymentFacts) {
    let can_payment = facts.is_registered() && config.payment_allowed;
    for row in rows {
        row.can_payment = can_payment;
    }
}

/// underlines the last row at or before the current day
fn mark_separator_line(rows: &mut [ScheduleRow], facts: &PaymentFacts, today: NaiveDate) {
    if !facts.is_registered() {
        return;
    }
    let visible = |row: &ScheduleRow| {
        matches!(
            row.row_type,
            RowType::Plan | RowType::Payment | RowType::ClosedDelay | RowType::GroupedPayments
        )
    };
    let last_date = rows.iter().filter(|r| visible(r)).map(|r| r.date).max();
    let separator_date = rows
        .iter()
        .filter(|r| visible(r) && r.date <= today)
        .map(|r| r.date)
        .max();
    let (Some(last_date), Some(separator_date)) = (last_date, separator_date) else {
        return;
    };
    if separator_date == last_date {
        return;
    }
    // the last row of that date gets the line
    if let Some(row) = rows
        .iter_mut()
        .filter(|r| visible(r) && r.date == separator_date)
        .last()
    {
        row.separator_line = true;
    }
}

/// date, then year separators first, then row type, then id
///
/// the year row stays on top of its year regardless of the direction
fn sort_rows(rows: &mut [ScheduleRow], order_by: SortOrder) {
    rows.sort_by(|a, b| {
        let date = match order_by {
            SortOrder::Ascending => a.date.cmp(&b.date),
            SortOrder::Descending => b.date.cmp(&a.date),
        };
        let year = (a.row_type != RowType::YearSeparator)
            .cmp(&(b.row_type != RowType::YearSeparator));
        let priority = match order_by {
            SortOrder::Ascending => a.row_type.sort_priority().cmp(&b.row_type.sort_priority()),
            SortOrder::Descending => b.row_type.sort_priority().cmp(&a.row_type.sort_priority()),
        };
        date.then(year).then(priority).then(a.id.cmp(&b.id))
    });
}

/// sums the payments when there are any, the future plans otherwise
fn calc_outcome(
    rows: &[ScheduleRow],
    config: &LoanConfig,
    facts: &PaymentFacts,
    today: NaiveDate,
    monthly_payment: Money,
    show_total: bool,
) -> Outcome {
    let is_registered = facts.is_registered();
    let use_payment = is_registered && !facts.payments.is_empty();
    let only_future_plan = is_registered && facts.payments.is_empty();

    let mut amounts = Amounts::default();
    let mut last: Option<&ScheduleRow> = None;
    for row in rows {
        let aggregated = if use_payment {
            matches!(row.row_type, RowType::Payment | RowType::GroupedPayments)
        } else {
            matches!(row.row_type, RowType::Plan | RowType::OpenDelay)
        };
        if !aggregated {
            continue;
        }
        if only_future_plan && row.date < today {
            continue;
        }
        let source = if use_payment { &row.fact } else { &row.plan };
        amounts.add(source);
        if last.map(|prev| row.date >= prev.date).unwrap_or(true) {
            last = Some(row);
        }
    }

    Outcome {
        amounts,
        remaining_debt: last.map(|row| row.remaining_debt).unwrap_or(Money::ZERO),
        monthly_payment,
        order_by: config.order_by,
        payments_exist: config.is_valid() && !facts.payments.is_empty(),
        show_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoanDirection, ScheduleType};
    use crate::row::synthetic_id;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn config(order_by: SortOrder) -> LoanConfig {
        LoanConfig {
            principal: Money::from_major(120_000),
            annual_rate: Money::from_major(12),
            schedule_type: ScheduleType::Differentiated,
            date_begin: d(2024, 1, 1),
            date_end: Some(d(2026, 1, 1)),
            monthly_payment: None,
            first_payment_date: None,
            build_date: None,
            direction: LoanDirection::Issued,
            order_by,
            payment_allowed: true,
        }
    }

    fn plan_row(date: NaiveDate, body: i64, percent: i64, debt: i64) -> ScheduleRow {
        let mut row = ScheduleRow::new(synthetic_id(date), RowType::Plan, date);
        row.plan = Amounts::new(
            Money::from_major(body + percent),
            Money::from_major(body),
            Money::from_major(percent),
        );
        row.remaining_debt = Money::from_major(debt);
        row
    }

    #[test]
    fn test_unregistered_plan_outcome() {
        let facts = PaymentFacts::default();
        let rows = vec![
            plan_row(d(2025, 1, 1), 100, 10, 200),
            plan_row(d(2025, 2, 1), 100, 10, 100),
            plan_row(d(2025, 3, 1), 100, 10, 0),
        ];
        let (rows, outcome) = run(
            rows,
            &config(SortOrder::Ascending),
            &facts,
            d(2025, 2, 15),
            Money::from_major(100),
        );

        assert_eq!(outcome.amounts.body_debt, Money::from_major(300));
        assert_eq!(outcome.amounts.percent, Money::from_major(30));
        assert_eq!(outcome.remaining_debt, Money::ZERO);
        assert!(!outcome.payments_exist);
        // unregistered schedules keep their past plan rows
        assert_eq!(
            rows.iter().filter(|r| r.row_type == RowType::Plan).count(),
            3
        );
    }

    #[test]
    fn test_year_rows_skip_first_year() {
        let facts = PaymentFacts::default();
        let rows = vec![
            plan_row(d(2024, 12, 1), 100, 10, 200),
            plan_row(d(2025, 1, 1), 100, 10, 100),
            plan_row(d(2026, 1, 1), 100, 10, 0),
        ];
        let (rows, _) = run(
            rows,
            &config(SortOrder::Ascending),
            &facts,
            d(2024, 6, 1),
            Money::from_major(100),
        );

        let years: Vec<i64> = rows
            .iter()
            .filter(|r| r.row_type == RowType::YearSeparator)
            .map(|r| r.id)
            .collect();
        assert_eq!(years, vec![2025, 2026]);
        // the year row opens its year
        let pos_year = rows.iter().position(|r| r.id == 2025).unwrap();
        let pos_plan = rows
            .iter()
            .position(|r| r.date == d(2025, 1, 1) && r.row_type == RowType::Plan)
            .unwrap();
        assert!(pos_year < pos_plan);
    }

    #[test]
    fn test_nearest_payment_recomputed_after_stale_removal() {
        let mut facts = PaymentFacts::default();
        facts.disbursements.insert(
            d(2024, 1, 10),
            crate::facts::testing::issued_disbursement(1, d(2024, 1, 10), Money::from_major(300)),
        );

        let today = d(2024, 3, 15);
        let mut stale = plan_row(d(2024, 2, 1), 100, 10, 200);
        stale.already_paid = false;
        let rows = vec![
            stale,
            plan_row(d(2024, 4, 1), 100, 10, 100),
            plan_row(d(2024, 5, 1), 100, 10, 0),
        ];
        let (rows, _) = run(
            rows,
            &config(SortOrder::Ascending),
            &facts,
            today,
            Money::from_major(100),
        );

        assert!(rows
            .iter()
            .all(|r| r.row_type != RowType::Plan || r.date >= today));
        let nearest: Vec<NaiveDate> = rows
            .iter()
            .filter(|r| r.nearest_payment)
            .map(|r| r.date)
            .collect();
        assert_eq!(nearest, vec![d(2024, 4, 1)]);
    }

    #[test]
    fn test_descending_sort_keeps_year_rows_on_top() {
        let facts = PaymentFacts::default();
        let rows = vec![
            plan_row(d(2024, 12, 1), 100, 10, 100),
            plan_row(d(2025, 2, 1), 100, 10, 0),
        ];
        let (rows, outcome) = run(
            rows,
            &config(SortOrder::Descending),
            &facts,
            d(2024, 6, 1),
            Money::from_major(100),
        );

        assert_eq!(outcome.order_by, SortOrder::Descending);
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        let mut sorted = dates.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(dates, sorted);
        // descending order drops the latest year, so only the 2024 separator
        // remains, dated at the year end and opening the 2024 block
        let separators: Vec<&ScheduleRow> = rows
            .iter()
            .filter(|r| r.row_type == RowType::YearSeparator)
            .collect();
        assert_eq!(separators.len(), 1);
        assert_eq!(separators[0].id, 2024);
        assert_eq!(separators[0].date, d(2024, 12, 31));
        let pos_year = rows.iter().position(|r| r.id == 2024).unwrap();
        let pos_plan = rows
            .iter()
            .position(|r| r.date == d(2024, 12, 1) && r.row_type == RowType::Plan)
            .unwrap();
        assert!(pos_year < pos_plan);
    }

    #[test]
    fn test_separator_line_on_last_past_row() {
        let mut facts = PaymentFacts::default();
        facts.disbursements.insert(
            d(2024, 1, 10),
            crate::facts::testing::issued_disbursement(1, d(2024, 1, 10), Money::from_major(300)),
        );
        facts.payments.insert(
            d(2024, 2, 1),
            crate::facts::testing::issued_payment(
                42,
                d(2024, 2, 1),
                Money::from_major(100),
                Money::from_major(10),
                Money::from_major(200),
            ),
        );
        let today = d(2024, 3, 15);
        let mut payment = ScheduleRow::new(42, RowType::Payment, d(2024, 2, 1));
        payment.fact = Amounts::new(
            Money::from_major(110),
            Money::from_major(100),
            Money::from_major(10),
        );
        payment.remaining_debt = Money::from_major(200);
        let rows = vec![
            payment,
            plan_row(d(2024, 4, 1), 100, 10, 100),
            plan_row(d(2024, 5, 1), 100, 10, 0),
        ];
        let (rows, outcome) = run(
            rows,
            &config(SortOrder::Ascending),
            &facts,
            today,
            Money::from_major(100),
        );

        let flagged: Vec<NaiveDate> = rows
            .iter()
            .filter(|r| r.separator_line)
            .map(|r| r.date)
            .collect();
        assert_eq!(flagged, vec![d(2024, 2, 1)]);
        // payments exist, so the outcome aggregates facts
        assert_eq!(outcome.amounts.body_debt, Money::from_major(100));
        assert_eq!(outcome.remaining_debt, Money::from_major(200));
        assert!(rows.iter().all(|r| r.can_payment));
    }
}
