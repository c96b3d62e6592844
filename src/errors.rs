use chrono::NaiveDate;
use thiserror::Error;

use crate::decimal::{Money, Rate};

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("invalid date range: begin {begin} is after end {end}")]
    InvalidDateRange { begin: NaiveDate, end: NaiveDate },

    #[error("invalid interest rate: {rate}")]
    InvalidInterestRate { rate: Rate },

    #[error("invalid principal amount: {amount}")]
    InvalidPrincipal { amount: Money },
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
