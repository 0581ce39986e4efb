//! Calendar-aware coverage duration.
//!
//! The ISO-8601 duration is the calendar difference between two timestamps:
//! whole months are counted first (day of month clamped), then the remainder
//! is split into days, hours, minutes and seconds.

use chrono::{Datelike, Months, NaiveDateTime};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalendarDelta {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

fn add_months(start: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let months = u32::try_from(months).ok()?;
    start.checked_add_months(Months::new(months))
}

impl CalendarDelta {
    /// Difference `end - start`; the arguments are ordered first
    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let (start, end) = if end < start { (end, start) } else { (start, end) };

        let mut months = months_between(start, end);

        let mut anchor = add_months(start, months).unwrap_or(start);
        while months > 0 && anchor > end {
            months -= 1;
            anchor = add_months(start, months).unwrap_or(start);
        }

        let remainder = (end - anchor).num_seconds();
        let days = remainder / 86_400;
        let rest = remainder % 86_400;

        Self {
            years: months / 12,
            months: months % 12,
            days,
            hours: rest / 3_600,
            minutes: (rest % 3_600) / 60,
            seconds: rest % 60,
        }
    }
}

fn months_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    let years = i64::from(end.year()) - i64::from(start.year());
    let months = i64::from(end.month()) - i64::from(start.month());
    years * 12 + months
}

impl fmt::Display for CalendarDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{}Y{}M{}DT{}H{}M{}S",
            self.years, self.months, self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// `time_coverage_duration` value for a coverage interval
pub fn iso8601_duration(start: NaiveDateTime, end: NaiveDateTime) -> String {
    CalendarDelta::between(start, end).to_string()
}
