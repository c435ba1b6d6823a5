//! Date filters accepted by `find --date`.
//!
//! Two forms are understood:
//!
//! - relative, `<n><unit>`: `s`, `m` and `h` are sliding windows ending now;
//!   `D`, `M` and `Y` are calendar aligned and cover the current unit plus the
//!   `n - 1` units before it (`1D` is today, `2M` is this month and last).
//! - absolute, any prefix of `YYYY-MM-DD HH:MM:SS`, optionally as `A to B`.
//!   A prefix is widened to the whole period it names, so `2025-07` is all of
//!   July 2025.
//!
//! Bounds are inclusive seconds of naive local time.

use crate::core::note::DATE_FORMAT;
use crate::{NotamyError, Result};
use chrono::{Datelike, Days, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};

const MIN_YEAR: i32 = 1970;
const MAX_YEAR: i32 = 2100;

/// Digit/separator layout of a full absolute date; inputs may be any prefix
/// that ends on a field boundary.
const TEMPLATE: &str = "dddd-dd-dd dd:dd:dd";
const FIELD_ENDS: [usize; 6] = [4, 7, 10, 13, 16, 19];

/// Inclusive range of naive local seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: i64,
    pub end: i64,
}

/// Parses a stored note date into naive seconds, or `None` for the root
/// placeholder and malformed dates.
#[must_use]
pub fn parse_note_date(date: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(date, DATE_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

impl DateRange {
    /// Parses `input` relative to the current local time.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::InvalidDate`] if the input matches neither form.
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_at(input, Local::now().naive_local())
    }

    /// Parses `input` relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`NotamyError::InvalidDate`] if the input matches neither form,
    /// names an impossible date, or yields a reversed range.
    pub fn parse_at(input: &str, now: NaiveDateTime) -> Result<Self> {
        let input = input.trim();
        let range = if let Some((from, to)) = input.split_once(" to ") {
            let (start, _) = absolute_period(from.trim())?;
            let (_, end) = absolute_period(to.trim())?;
            Self { start, end }
        } else if let Some(range) = relative(input, now)? {
            range
        } else {
            let (start, end) = absolute_period(input)?;
            Self { start, end }
        };

        if range.start > range.end {
            return Err(NotamyError::InvalidDate(format!(
                "'{input}': range ends before it starts"
            )));
        }
        log::debug!("date filter '{input}' -> {}..={}", range.start, range.end);
        Ok(range)
    }

    #[must_use]
    pub fn contains(&self, seconds: i64) -> bool {
        (self.start..=self.end).contains(&seconds)
    }
}

fn seconds(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

fn invalid(input: &str) -> NotamyError {
    NotamyError::InvalidDate(format!("'{input}' is not a valid date"))
}

/// `Ok(None)` when `input` is not of the `<n><unit>` form at all.
fn relative(input: &str, now: NaiveDateTime) -> Result<Option<DateRange>> {
    let Some(unit) = input.chars().last().filter(|u| "smhDMY".contains(*u)) else {
        return Ok(None);
    };
    let digits = &input[..input.len() - 1];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    let n: i64 = digits.parse().map_err(|_| invalid(input))?;
    if n == 0 {
        return Err(NotamyError::InvalidDate(format!(
            "'{input}': count must be at least 1"
        )));
    }
    let back = i32::try_from(n - 1).map_err(|_| invalid(input))?;

    let now_secs = seconds(now);
    let window = |unit_secs: i64| DateRange {
        start: now_secs.saturating_sub(n.saturating_mul(unit_secs)),
        end: now_secs,
    };
    let today = now.date();

    let (first, next) = match unit {
        's' => return Ok(Some(window(1))),
        'm' => return Ok(Some(window(60))),
        'h' => return Ok(Some(window(3600))),
        'D' => (
            today.checked_sub_days(Days::new(back as u64)),
            today.checked_add_days(Days::new(1)),
        ),
        'M' => {
            let total = (today.year() * 12 + today.month0() as i32).checked_sub(back);
            (
                total.and_then(|t| month_start(t.div_euclid(12), t.rem_euclid(12) as u32 + 1)),
                next_month(today.year(), today.month()),
            )
        }
        _ => (
            today.year().checked_sub(back).and_then(|y| month_start(y, 1)),
            month_start(today.year() + 1, 1),
        ),
    };
    let first = first.ok_or_else(|| invalid(input))?;
    let next = next.ok_or_else(|| invalid(input))?;
    Ok(Some(DateRange {
        start: day_start(first),
        end: day_start(next) - 1,
    }))
}

/// Inclusive bounds of the period named by an absolute date prefix.
fn absolute_period(input: &str) -> Result<(i64, i64)> {
    let len = input.len();
    let matches_template = FIELD_ENDS.contains(&len)
        && input.chars().zip(TEMPLATE.chars()).all(|(c, t)| match t {
            'd' => c.is_ascii_digit(),
            sep => c == sep,
        });
    if !matches_template {
        return Err(invalid(input));
    }

    let field = |from: usize, to: usize| -> Option<u32> {
        input.get(from..to).and_then(|s| s.parse().ok())
    };
    let year = field(0, 4).ok_or_else(|| invalid(input))? as i32;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(NotamyError::InvalidDate(format!(
            "'{input}': year must be between {MIN_YEAR} and {MAX_YEAR}"
        )));
    }
    let month = field(5, 7).unwrap_or(1);
    let day = field(8, 10).unwrap_or(1);
    let hour = field(11, 13).unwrap_or(0);
    let minute = field(14, 16).unwrap_or(0);
    let second = field(17, 19).unwrap_or(0);

    let start = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(|| invalid(input))?;

    let next = match len {
        4 => month_start(year + 1, 1).map(|d| d.and_time(NaiveTime::MIN)),
        7 => next_month(year, month).map(|d| d.and_time(NaiveTime::MIN)),
        10 => Some(start + Duration::days(1)),
        13 => Some(start + Duration::hours(1)),
        16 => Some(start + Duration::minutes(1)),
        _ => Some(start + Duration::seconds(1)),
    }
    .ok_or_else(|| invalid(input))?;

    Ok((seconds(start), seconds(next) - 1))
}

fn month_start(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn next_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        month_start(year + 1, 1)
    } else {
        month_start(year, month + 1)
    }
}

fn day_start(date: NaiveDate) -> i64 {
    seconds(date.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, DATE_FORMAT).unwrap()
    }

    fn secs(text: &str) -> i64 {
        parse_note_date(text).unwrap()
    }

    #[test]
    fn test_absolute_month_covers_whole_month() {
        let range = DateRange::parse("2024-02").unwrap();
        assert_eq!(range.start, secs("2024-02-01 00:00:00"));
        assert_eq!(range.end, secs("2024-02-29 23:59:59"));
    }

    #[test]
    fn test_absolute_year_and_full_timestamp() {
        let range = DateRange::parse("2025").unwrap();
        assert!(range.contains(secs("2025-12-31 23:59:59")));
        assert!(!range.contains(secs("2026-01-01 00:00:00")));

        let exact = DateRange::parse("2025-07-30 10:00:00").unwrap();
        assert_eq!(exact.start, exact.end);
    }

    #[test]
    fn test_absolute_range_with_to() {
        let range = DateRange::parse("2025-01 to 2025-03-15").unwrap();
        assert_eq!(range.start, secs("2025-01-01 00:00:00"));
        assert_eq!(range.end, secs("2025-03-15 23:59:59"));
    }

    #[test]
    fn test_reversed_range_rejected() {
        assert!(DateRange::parse("2025-03 to 2025-01").is_err());
    }

    #[test]
    fn test_invalid_inputs() {
        for input in ["", "yesterday", "2025-13", "2025-02-30", "1969", "2025/01", "0D", "5x"] {
            assert!(DateRange::parse(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_relative_sliding_windows() {
        let now = at("2025-07-30 10:00:00");
        let range = DateRange::parse_at("90m", now).unwrap();
        assert_eq!(range.start, secs("2025-07-30 08:30:00"));
        assert_eq!(range.end, secs("2025-07-30 10:00:00"));

        let range = DateRange::parse_at("2h", now).unwrap();
        assert_eq!(range.start, secs("2025-07-30 08:00:00"));
    }

    #[test]
    fn test_relative_calendar_units() {
        let now = at("2025-03-10 15:20:00");

        let today = DateRange::parse_at("1D", now).unwrap();
        assert_eq!(today.start, secs("2025-03-10 00:00:00"));
        assert_eq!(today.end, secs("2025-03-10 23:59:59"));

        let months = DateRange::parse_at("4M", now).unwrap();
        assert_eq!(months.start, secs("2024-12-01 00:00:00"));
        assert_eq!(months.end, secs("2025-03-31 23:59:59"));

        let years = DateRange::parse_at("2Y", now).unwrap();
        assert_eq!(years.start, secs("2024-01-01 00:00:00"));
        assert_eq!(years.end, secs("2025-12-31 23:59:59"));
    }

    #[test]
    fn test_parse_note_date_rejects_placeholder() {
        assert!(parse_note_date(".").is_none());
    }
}
