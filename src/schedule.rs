//! Cron expression parsing for the cleanup schedule.
//!
//! The configuration surface uses the standard 5-field cron syntax
//! (minute hour day-of-month month day-of-week). The `cron` crate expects a
//! leading seconds field, so expressions are normalized before parsing.

use std::str::FromStr;

use cron::Schedule;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(
        "expected a 5-field cron expression (minute hour day-of-month month day-of-week), got {0} fields"
    )]
    FieldCount(usize),

    #[error("invalid cron expression {expr:?}: {source}")]
    Parse {
        expr: String,
        #[source]
        source: cron::error::Error,
    },
}

/// Parse a 5-field cron expression.
pub fn parse(expr: &str) -> Result<Schedule, ScheduleError> {
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        return Err(ScheduleError::FieldCount(fields));
    }

    // Fire at second zero of each matching minute.
    let with_seconds = format!("0 {}", expr.trim());
    Schedule::from_str(&with_seconds).map_err(|source| ScheduleError::Parse {
        expr: expr.to_string(),
        source,
    })
}
