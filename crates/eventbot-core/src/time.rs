//! Time helpers for chat commands.
//!
//! [`parse_when`] understands the handful of ways people write a start time in
//! a chat message, and [`parse_duration`] the ways they write a length.
//! [`humanize`] renders a duration back for replies ("2 hours and 5 minutes").

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;

/// Errors returned when a time or duration cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WhenError {
    /// Nothing recognisable in the input.
    #[error("I don't understand when \"{0}\" is")]
    Unrecognized(String),

    /// A duration was recognised but has no length.
    #[error("\"{0}\" is not a positive duration")]
    NotPositive(String),

    /// The time or length is beyond what the calendar can represent.
    #[error("\"{0}\" is too far away")]
    OutOfRange(String),
}

/// Parses a start time relative to `now`.
///
/// Accepted forms:
/// - `now`
/// - RFC 3339 (`2026-01-02T19:30:00Z`)
/// - `2026-01-02 19:30` and `2026-01-02T19:30`, in `now`'s timezone
/// - `19:30` (today) and `tomorrow` / `tomorrow 19:30`
/// - relative durations: `in 90 minutes`, `in 2h`, `1 hour 30 minutes`, `45m`
///
/// Times in the past are returned as-is; rejecting them is up to the caller.
pub fn parse_when<Tz: TimeZone>(
    input: &str,
    now: &DateTime<Tz>,
) -> Result<DateTime<Utc>, WhenError> {
    let text = input.trim().to_lowercase();
    let now_utc = now.with_timezone(&Utc);

    if text == "now" {
        return Ok(now_utc);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input.trim()) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input.trim(), format) {
            return localize(&now.timezone(), naive).ok_or_else(|| unrecognized(input));
        }
    }

    if let Ok(time) = parse_clock(&text) {
        return at_time(now, now.date_naive(), time).ok_or_else(|| unrecognized(input));
    }

    if let Some(rest) = text.strip_prefix("tomorrow") {
        let date = now
            .date_naive()
            .succ_opt()
            .ok_or_else(|| unrecognized(input))?;
        let rest = rest.trim().trim_start_matches("at").trim();
        let time = if rest.is_empty() {
            now.time()
        } else {
            parse_clock(rest).map_err(|_| unrecognized(input))?
        };
        return at_time(now, date, time).ok_or_else(|| unrecognized(input));
    }

    let relative = text.strip_prefix("in ").unwrap_or(&text);
    let offset = parse_duration(relative).map_err(|e| match e {
        WhenError::OutOfRange(_) => out_of_range(input),
        _ => unrecognized(input),
    })?;
    now_utc
        .checked_add_signed(offset)
        .ok_or_else(|| out_of_range(input))
}

/// Parses a length such as `90 minutes`, `2h`, `1 hour and 30 minutes`.
pub fn parse_duration(input: &str) -> Result<Duration, WhenError> {
    let text = input.trim().to_lowercase();
    let mut chars = text.chars().peekable();
    let mut total = Duration::zero();
    let mut matched = false;

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut digits = String::new();
        while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
            digits.push(c);
            chars.next();
        }

        if digits.is_empty() {
            // Allow "and" between parts.
            let mut word = String::new();
            while let Some(c) = chars.peek().copied().filter(|c| c.is_alphabetic()) {
                word.push(c);
                chars.next();
            }
            if word == "and" && matched {
                continue;
            }
            return Err(unrecognized(input));
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let mut unit = String::new();
        while let Some(c) = chars.peek().copied().filter(|c| c.is_alphabetic()) {
            unit.push(c);
            chars.next();
        }

        let amount: i64 = digits.parse().map_err(|_| out_of_range(input))?;
        let part = match unit_duration(&unit, amount) {
            Some(part) => part,
            None if is_unit(&unit) => return Err(out_of_range(input)),
            None => return Err(unrecognized(input)),
        };
        total = total.checked_add(&part).ok_or_else(|| out_of_range(input))?;
        matched = true;
    }

    if !matched {
        return Err(unrecognized(input));
    }
    if total <= Duration::zero() {
        return Err(WhenError::NotPositive(input.trim().to_string()));
    }
    Ok(total)
}

/// Renders a duration for humans, e.g. `1 day, 2 hours and 5 minutes`.
///
/// Rounds up to the next minute; the sign is ignored.
pub fn humanize(duration: Duration) -> String {
    let secs = duration.num_seconds().abs();
    if secs < 60 {
        return "less than a minute".to_string();
    }

    let total_minutes = (secs + 59) / 60;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(plural(days, "day"));
    }
    if hours > 0 {
        parts.push(plural(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(plural(minutes, "minute"));
    }

    match parts.len() {
        1 => parts.remove(0),
        _ => {
            let last = parts.pop().unwrap_or_default();
            format!("{} and {}", parts.join(", "), last)
        }
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn is_unit(unit: &str) -> bool {
    unit_duration(unit, 1).is_some()
}

fn unit_duration(unit: &str, amount: i64) -> Option<Duration> {
    let duration = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(amount)?,
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(amount)?,
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(amount)?,
        "d" | "day" | "days" => Duration::try_days(amount)?,
        "w" | "week" | "weeks" => Duration::try_weeks(amount)?,
        _ => return None,
    };
    Some(duration)
}

fn parse_clock(text: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(text, "%H:%M")
}

fn at_time<Tz: TimeZone>(
    now: &DateTime<Tz>,
    date: NaiveDate,
    time: NaiveTime,
) -> Option<DateTime<Utc>> {
    localize(&now.timezone(), date.and_time(time))
}

fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    // DST gaps have no local time; overlaps take the earlier instant.
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn unrecognized(input: &str) -> WhenError {
    WhenError::Unrecognized(input.trim().to_string())
}

fn out_of_range(input: &str) -> WhenError {
    WhenError::OutOfRange(input.trim().to_string())
}
