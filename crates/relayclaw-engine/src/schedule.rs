//! Time expression grammar for one-shot schedules.
//!
//! Accepted forms:
//! - `<N>m` — N minutes from now
//! - `<N>h` — N hours from now
//! - `HH:MM` — today at that time, or tomorrow if already past
//! - `YYYY-MM-DD HH:MM` — absolute
//!
//! Anything else, and anything resolving to a non-future instant, is an
//! `InvalidSchedule` error.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use relayclaw_core::{RelayError, Result};

/// Compute the absolute fire time for `expr`, relative to `now`.
/// The result is always strictly after `now`.
pub fn parse_fire_time(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(RelayError::InvalidSchedule("empty time expression".into()));
    }

    if let Some(fire) = parse_relative(expr, now)? {
        return in_future(fire, now);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(expr, "%Y-%m-%d %H:%M") {
        let fire = Utc
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| RelayError::InvalidSchedule(format!("ambiguous datetime: {expr}")))?;
        return in_future(fire, now);
    }

    if let Ok(time) = NaiveTime::parse_from_str(expr, "%H:%M") {
        let mut fire = now
            .date_naive()
            .and_time(time)
            .and_utc();
        // Already past today: roll to tomorrow.
        if fire <= now {
            fire += Duration::days(1);
        }
        return in_future(fire, now);
    }

    Err(RelayError::InvalidSchedule(format!(
        "unrecognized time expression: {expr}"
    )))
}

/// `<N>m` / `<N>h` forms. Returns Ok(None) if the shape doesn't match.
fn parse_relative(expr: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let Some(unit) = expr.chars().last() else {
        return Ok(None);
    };
    if unit != 'm' && unit != 'h' {
        return Ok(None);
    }
    let digits = &expr[..expr.len() - 1];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    let n: i64 = digits
        .parse()
        .map_err(|_| RelayError::InvalidSchedule(format!("bad offset: {expr}")))?;
    if n == 0 {
        return Err(RelayError::InvalidSchedule(
            "offset must be at least 1".into(),
        ));
    }
    let delta = if unit == 'm' {
        Duration::minutes(n)
    } else {
        Duration::hours(n)
    };
    Ok(Some(now + delta))
}

fn in_future(fire: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if fire <= now {
        return Err(RelayError::InvalidSchedule(format!(
            "scheduled time must be in the future (got {})",
            fire.format("%Y-%m-%d %H:%M")
        )));
    }
    Ok(fire)
}
