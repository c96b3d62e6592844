use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{Result, ScheduleError};

/// repayment schedule type
///
/// determines which of size_payment / body_debt is held constant across
/// periods and how the plan-date timeline is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleType {
    /// equal total payment each month
    Annuity,
    /// equal principal portion each month
    Differentiated,
    /// principal and interest in a single payment at maturity
    RepayAtEnd,
    /// no fixed timeline, repaid when demanded
    OnDemand,
    /// interest paid periodically, principal returned at the end
    Deposit,
}

impl ScheduleType {
    /// which amount field the monthly payment pins: size_payment or body_debt
    pub fn fixed_field(&self) -> FixedField {
        match self {
            ScheduleType::Differentiated => FixedField::BodyDebt,
            _ => FixedField::SizePayment,
        }
    }
}

/// the amount field held constant at the monthly payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedField {
    SizePayment,
    BodyDebt,
}

/// loan direction relative to our organization
///
/// swaps the debit/credit sides used to read disbursement and payment facts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanDirection {
    /// we lent the money out
    Issued,
    /// we received the loan
    Received,
}

/// client-requested ordering of the result rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// immutable input for one schedule build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanConfig {
    /// contractual loan amount
    pub principal: Money,
    /// annual rate, in percent (12 means 12%)
    pub annual_rate: Money,
    pub schedule_type: ScheduleType,
    pub date_begin: NaiveDate,
    /// required unless the schedule type is on-demand
    pub date_end: Option<NaiveDate>,
    /// user-specified monthly payment; computed when absent
    pub monthly_payment: Option<Money>,
    /// overrides the default first plan date (begin + 1 month)
    pub first_payment_date: Option<NaiveDate>,
    /// reference date for the build; resolved from the time provider when absent
    pub build_date: Option<NaiveDate>,
    pub direction: LoanDirection,
    pub order_by: SortOrder,
    /// externally-resolved permission to create a payment document
    pub payment_allowed: bool,
}

impl LoanConfig {
    /// checks the filter fields required to build a schedule at all
    ///
    /// an invalid config short-circuits to an empty result, it is not an error
    pub fn is_valid(&self) -> bool {
        let has_end = self.date_end.is_some() || self.schedule_type == ScheduleType::OnDemand;
        !self.principal.is_zero() && has_end
    }

    /// hard contract checks that callers must not violate
    pub fn validate(&self) -> Result<()> {
        if let Some(end) = self.date_end {
            if self.date_begin > end {
                return Err(ScheduleError::InvalidDateRange {
                    begin: self.date_begin,
                    end,
                });
            }
        }
        if self.rate().as_decimal().is_sign_negative() {
            return Err(ScheduleError::InvalidInterestRate { rate: self.rate() });
        }
        if self.principal.is_negative() {
            return Err(ScheduleError::InvalidPrincipal {
                amount: self.principal,
            });
        }
        Ok(())
    }

    /// annual rate as a fraction
    pub fn rate(&self) -> Rate {
        Rate::from_percent_decimal(self.annual_rate.as_decimal())
    }

    /// monthly rate as a fraction
    pub fn monthly_rate(&self) -> Rate {
        self.rate().monthly_rate()
    }

    /// reference "today" for the build
    pub fn resolve_today(&self, time: &SafeTimeProvider) -> NaiveDate {
        self.build_date.unwrap_or_else(|| time.now().date_naive())
    }

    /// end of the schedule; on-demand loans have none
    pub fn date_end_or_begin(&self) -> NaiveDate {
        self.date_end.unwrap_or(self.date_begin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use hourglass_rs::TimeSource;

    fn config() -> LoanConfig {
        LoanConfig {
            principal: Money::from_major(120_000),
            annual_rate: Money::from_major(12),
            schedule_type: ScheduleType::Differentiated,
            date_begin: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            date_end: Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
            monthly_payment: None,
            first_payment_date: None,
            build_date: None,
            direction: LoanDirection::Issued,
            order_by: SortOrder::Ascending,
            payment_allowed: false,
        }
    }

    #[test]
    fn test_valid_filter() {
        assert!(config().is_valid());

        let mut missing_end = config();
        missing_end.date_end = None;
        assert!(!missing_end.is_valid());

        missing_end.schedule_type = ScheduleType::OnDemand;
        assert!(missing_end.is_valid());

        let mut no_sum = config();
        no_sum.principal = Money::ZERO;
        assert!(!no_sum.is_valid());
    }

    #[test]
    fn test_rate_fraction() {
        let cfg = config();
        assert_eq!(cfg.rate(), Rate::from_percentage(12));
        assert_eq!(cfg.monthly_rate(), Rate::from_percentage(1));
    }

    #[test]
    fn test_inverted_dates_rejected() {
        let mut cfg = config();
        cfg.date_end = Some(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_resolve_today() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
        ));
        let mut cfg = config();
        assert_eq!(
            cfg.resolve_today(&time),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );

        cfg.build_date = NaiveDate::from_ymd_opt(2024, 2, 1);
        assert_eq!(
            cfg.resolve_today(&time),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }
}
