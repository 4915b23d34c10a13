//! Five-field cron expressions evaluated in UTC
//!
//! `minute hour day-of-month month day-of-week`, each accepting `*`, values,
//! ranges `a-b`, lists `a,b` and steps `*/n` / `a-b/n`. Months take JAN-DEC,
//! weekdays take SUN-SAT (0 and 7 are both Sunday). When both day fields are
//! restricted a day matches if either one does.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How far ahead `next_after` searches before giving up
const SEARCH_HORIZON_DAYS: i64 = 5 * 366;

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("expected 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid {field} field '{value}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Parsed cron expression. Each field is a bitset of allowed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expr: String,
    minutes: u64,
    hours: u64,
    days_of_month: u64,
    months: u64,
    days_of_week: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    /// Names mapped to `names_offset + index`
    names: &'static [&'static str],
    names_offset: u32,
}

const MINUTE: FieldSpec = FieldSpec { name: "minute", min: 0, max: 59, names: &[], names_offset: 0 };
const HOUR: FieldSpec = FieldSpec { name: "hour", min: 0, max: 23, names: &[], names_offset: 0 };
const DAY_OF_MONTH: FieldSpec = FieldSpec { name: "day-of-month", min: 1, max: 31, names: &[], names_offset: 0 };
const MONTH: FieldSpec = FieldSpec { name: "month", min: 1, max: 12, names: MONTH_NAMES, names_offset: 1 };
const DAY_OF_WEEK: FieldSpec = FieldSpec { name: "day-of-week", min: 0, max: 7, names: WEEKDAY_NAMES, names_offset: 0 };

impl FieldSpec {
    fn error(&self, value: &str, reason: impl Into<String>) -> ScheduleError {
        ScheduleError::InvalidField {
            field: self.name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    fn value(&self, raw: &str, whole: &str) -> Result<u32, ScheduleError> {
        let value = match raw.parse::<u32>() {
            Ok(v) => v,
            Err(_) => self
                .names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(raw))
                .map(|i| i as u32 + self.names_offset)
                .ok_or_else(|| self.error(whole, format!("'{}' is not a number or name", raw)))?,
        };
        if value < self.min || value > self.max {
            return Err(self.error(
                whole,
                format!("{} is outside {}-{}", value, self.min, self.max),
            ));
        }
        Ok(value)
    }

    fn parse(&self, field: &str) -> Result<u64, ScheduleError> {
        let mut bits = 0u64;

        for part in field.split(',') {
            if part.is_empty() {
                return Err(self.error(field, "empty list element"));
            }

            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step = step
                        .parse::<u32>()
                        .ok()
                        .filter(|s| *s > 0)
                        .ok_or_else(|| self.error(field, format!("bad step '{}'", step)))?;
                    (range, Some(step))
                }
                None => (part, None),
            };

            let (start, end) = if range == "*" {
                (self.min, self.max)
            } else if let Some((a, b)) = range.split_once('-') {
                let (a, b) = (self.value(a, field)?, self.value(b, field)?);
                if a > b {
                    return Err(self.error(field, format!("range {}-{} is reversed", a, b)));
                }
                (a, b)
            } else {
                let v = self.value(range, field)?;
                // `5/15` means "from 5 every 15"
                if step.is_some() {
                    (v, self.max)
                } else {
                    (v, v)
                }
            };

            for v in (start..=end).step_by(step.unwrap_or(1) as usize) {
                bits |= 1 << v;
            }
        }

        Ok(bits)
    }
}

fn has(bits: u64, value: u32) -> bool {
    bits & (1 << value) != 0
}

impl FromStr for CronSchedule {
    type Err = ScheduleError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(fields.len()));
        }

        let mut days_of_week = DAY_OF_WEEK.parse(fields[4])?;
        // 7 is Sunday too
        if has(days_of_week, 7) {
            days_of_week = (days_of_week & !(1 << 7)) | 1;
        }

        Ok(Self {
            expr: fields.join(" "),
            minutes: MINUTE.parse(fields[0])?,
            hours: HOUR.parse(fields[1])?,
            days_of_month: DAY_OF_MONTH.parse(fields[2])?,
            months: MONTH.parse(fields[3])?,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        expr.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.expr
    }

    fn matches_day(&self, date: NaiveDate) -> bool {
        let dom = has(self.days_of_month, date.day());
        let dow = has(self.days_of_week, date.weekday().num_days_from_sunday());
        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    /// Whether `t` (to the minute) is a fire time
    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        has(self.months, t.month())
            && self.matches_day(t.date_naive())
            && has(self.hours, t.hour())
            && has(self.minutes, t.minute())
    }

    /// First fire time strictly after `after`, or `None` if nothing matches
    /// within the search horizon (e.g. `0 0 30 2 *`).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)?;
        let limit = start + Duration::days(SEARCH_HORIZON_DAYS);
        let mut t = start + Duration::minutes(1);

        while t <= limit {
            if !has(self.months, t.month()) {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
                continue;
            }

            if !self.matches_day(t.date_naive()) {
                let next_day = t.date_naive().succ_opt()?;
                t = Utc.from_utc_datetime(&next_day.and_hms_opt(0, 0, 0)?);
                continue;
            }

            if !has(self.hours, t.hour()) {
                t = t.with_minute(0)? + Duration::hours(1);
                continue;
            }

            if !has(self.minutes, t.minute()) {
                t += Duration::minutes(1);
                continue;
            }

            return Some(t);
        }

        None
    }
}
