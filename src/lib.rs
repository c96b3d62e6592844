pub mod config;
pub mod decimal;
pub mod errors;
pub mod facts;
pub mod ideal;
pub mod interest;
pub mod ledger;
pub mod periods;
pub mod postprocess;
pub mod row;
pub mod schedule;
pub mod timeline;

// re-export key types
pub use config::{FixedField, LoanConfig, LoanDirection, ScheduleType, SortOrder};
pub use decimal::{Money, Rate};
pub use errors::{Result, ScheduleError};
pub use facts::{PaymentFact, PaymentFacts};
pub use ideal::{IdealPlan, IdealSchedule};
pub use interest::{
    AccrualEngine, BookInterestSource, DayCountConvention, InterestCalculator, PostedPercents,
};
pub use postprocess::Outcome;
pub use row::{AmountField, Amounts, RowType, ScheduleRow};
pub use schedule::{PaymentSchedule, ScheduleResult};
pub use timeline::Timeline;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
