//! Five-field cron expressions
//!
//! Supports `*`, numbers, ranges (`a-b`), steps (`*/n`, `a-b/n`, `a/n`) and
//! comma-separated lists in each of the minute, hour, day-of-month, month and
//! day-of-week fields. Day-of-week accepts 0-7 with both 0 and 7 meaning
//! Sunday. When both day fields are restricted a day matches if either does.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike,
};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How far ahead to look for a matching time before giving up
const SEARCH_LIMIT_DAYS: i64 = 366 * 5;

/// Errors from parsing a cron expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid {field} field: '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("{field} value {value} out of range {min}-{max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Bounds and name of one cron field
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
};
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
};

/// A parsed cron schedule
///
/// Each field is a bitmask of the values it admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(CronError::FieldCount(fields.len()));
        }

        let mut days_of_week = parse_field(fields[4], &DAY_OF_WEEK)?;
        // 7 is Sunday too
        if days_of_week & (1 << 7) != 0 {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expression: fields.join(" "),
            minutes: parse_field(fields[0], &MINUTE)?,
            hours: parse_field(fields[1], &HOUR)?,
            days_of_month: parse_field(fields[2], &DAY_OF_MONTH)?,
            months: parse_field(fields[3], &MONTH)?,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn parse_value(raw: &str, spec: &FieldSpec, whole: &str) -> Result<u32, CronError> {
    let value: u32 = raw.parse().map_err(|_| CronError::InvalidField {
        field: spec.name,
        value: whole.to_string(),
    })?;

    if value < spec.min || value > spec.max {
        return Err(CronError::OutOfRange {
            field: spec.name,
            value,
            min: spec.min,
            max: spec.max,
        });
    }
    Ok(value)
}

fn parse_field(field: &str, spec: &FieldSpec) -> Result<u64, CronError> {
    let invalid = || CronError::InvalidField {
        field: spec.name,
        value: field.to_string(),
    };

    let mut mask = 0u64;
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step.parse().map_err(|_| invalid())?;
                if step == 0 {
                    return Err(invalid());
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = if range == "*" {
            (spec.min, spec.max)
        } else if let Some((start, end)) = range.split_once('-') {
            let start = parse_value(start, spec, field)?;
            let end = parse_value(end, spec, field)?;
            if start > end {
                return Err(invalid());
            }
            (start, end)
        } else {
            let start = parse_value(range, spec, field)?;
            // `a/n` runs from a to the end of the field
            let end = if item.contains('/') { spec.max } else { start };
            (start, end)
        };

        let mut value = start;
        while value <= end {
            mask |= 1 << value;
            value = match value.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    }

    Ok(mask)
}

fn admits(mask: u64, value: u32) -> bool {
    mask & (1 << value) != 0
}

impl CronSchedule {
    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = admits(self.days_of_month, date.day());
        let dow = admits(self.days_of_week, date.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// Finds the first matching wall-clock time strictly after `after`
    ///
    /// Returns None if nothing matches within five years.
    pub fn next_after_naive(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut t = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let limit = t + Duration::days(SEARCH_LIMIT_DAYS);

        while t <= limit {
            if !admits(self.months, t.month()) {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
                continue;
            }

            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }

            if !admits(self.hours, t.hour()) {
                t = t.date().and_hms_opt(t.hour(), 0, 0)? + Duration::hours(1);
                continue;
            }

            if !admits(self.minutes, t.minute()) {
                t += Duration::minutes(1);
                continue;
            }

            return Some(t);
        }

        None
    }

    /// Finds the next firing time after `after`, in the same time zone
    ///
    /// Local times that do not exist (a DST gap) are skipped. Ambiguous local
    /// times resolve to the earlier instant.
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = after.timezone();
        let mut naive = after.naive_local();

        loop {
            let candidate = self.next_after_naive(naive)?;
            match tz.from_local_datetime(&candidate) {
                LocalResult::Single(t) => return Some(t),
                LocalResult::Ambiguous(earliest, _) => return Some(earliest),
                LocalResult::None => naive = candidate,
            }
        }
    }
}
