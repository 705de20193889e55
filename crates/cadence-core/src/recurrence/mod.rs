//! Recurrence rules and the date arithmetic behind them.
//!
//! - [`rule`]: the rule type and its JSON codec
//! - [`calculator`]: next-occurrence computation
//! - [`describe`]: human-readable rendering

pub mod calculator;
pub mod describe;
pub mod rule;

pub use calculator::{next_occurrence, OccurrenceCalculator};
pub use describe::describe;
pub use rule::{decode, encode, try_decode, EndType, Frequency, MonthlyPattern, RecurrenceRule};
