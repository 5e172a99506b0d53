//! Cron normalization and next-fire computation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use rainalert_core::AlertError;

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// `ALERT_SCHEDULE` is usually standard 5-field cron: `min hour day-of-month month day-of-week`.
pub(crate) fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn parse_schedule(expr: &str) -> Result<Schedule, AlertError> {
    Schedule::from_str(&normalize_cron(expr))
        .map_err(|e| AlertError::Config(format!("invalid ALERT_SCHEDULE '{expr}': {e}")))
}

/// First fire time strictly after `now`, read as wall-clock time in `tz`.
pub(crate) fn next_fire(schedule: &Schedule, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    schedule
        .after(&now.with_timezone(&tz))
        .next()
        .map(|t| t.with_timezone(&Utc))
}

/// Next fire time for the run loop: strictly after both `now` and the
/// previous fire, so a wall clock running slightly behind the timer cannot
/// repeat an instant that already fired.
pub(crate) fn next_fire_after_previous(
    schedule: &Schedule,
    now: DateTime<Utc>,
    previous: Option<DateTime<Utc>>,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    let from = previous.map_or(now, |prev| prev.max(now));
    next_fire(schedule, from, tz)
}
