//! Calendar helpers for plan timelines and accrual sub-periods.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// half-open date interval (begin, end] used for interest accrual
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Self {
        Self { begin, end }
    }

    /// date lies inside the half-open interval
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.begin < date && date <= self.end
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

pub fn is_end_of_month(date: NaiveDate) -> bool {
    date.day() == days_in_month(date.year(), date.month())
}

/// add calendar months, clamping the day to the target month's length
///
/// with `stick_end_of_month` the 31st of january maps to the last day of
/// every following month rather than the clamped 28th/30th
pub fn month_delta(date: NaiveDate, months: u32, stick_end_of_month: bool) -> NaiveDate {
    let total = date.year() * 12 + date.month() as i32 - 1 + months as i32;
    let year = total.div_euclid(12);
    let month = (total.rem_euclid(12) + 1) as u32;
    let last_day = days_in_month(year, month);
    let day = if stick_end_of_month && is_end_of_month(date) {
        last_day
    } else {
        date.day().min(last_day)
    };
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_else(|| {
        // unreachable for clamped days, but avoid panicking on arithmetic edges
        NaiveDate::from_ymd_opt(year, month, last_day).expect("valid clamped date")
    })
}

/// monthly anniversaries of `first` through `end`, end always included
///
/// anniversaries are taken from the original first date so the day of month
/// never drifts after a short month
pub fn monthly_dates(first: NaiveDate, end: NaiveDate, stick_end_of_month: bool) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    if first > end {
        return dates;
    }
    let mut step = 0;
    loop {
        let date = month_delta(first, step, stick_end_of_month);
        if date >= end {
            break;
        }
        dates.push(date);
        step += 1;
    }
    dates.push(end);
    dates
}

/// consecutive (begin, end] pairs over a set of boundary dates
///
/// boundaries are sorted and de-duplicated; zero-length periods are dropped
/// unless `keep_duplicates` is set
pub fn sub_periods(mut dates: Vec<NaiveDate>, keep_duplicates: bool) -> Vec<Period> {
    dates.sort();
    let mut periods = Vec::new();
    for pair in dates.windows(2) {
        if pair[0] == pair[1] && !keep_duplicates {
            continue;
        }
        periods.push(Period::new(pair[0], pair[1]));
    }
    periods
}

/// boundaries of (begin, end] split at every extra date strictly inside it
pub fn split_period(begin: NaiveDate, end: NaiveDate, extra: &[NaiveDate]) -> Vec<Period> {
    let mut dates: Vec<NaiveDate> = extra
        .iter()
        .copied()
        .filter(|d| begin < *d && *d < end)
        .collect();
    dates.push(begin);
    dates.push(end);
    dates.sort();
    dates.dedup();
    sub_periods(dates, false)
}

/// human-readable period for delay descriptions
pub fn name_period(begin: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{} - {}",
        begin.format("%d.%m.%Y"),
        end.format("%d.%m.%Y")
    )
}
