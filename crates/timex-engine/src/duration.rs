//! Durations as they appear in timex values.
//!
//! A [`DurationValue`] is either an exact number of seconds ("3 hours and 20
//! minutes") or a bare unit with no count ("a few days"). Formatting uses fixed
//! unit lengths (a month is 30 days, a year is 365 days) so that output is
//! stable regardless of the reference date.

use serde::Serialize;

use crate::parts::TemporalUnit;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// A duration, either exact or vague.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DurationValue {
    /// Exact length in seconds. Zero for vague durations.
    raw_seconds: i64,
    /// The unit the duration was expressed in, when one was given.
    unit: Option<TemporalUnit>,
    /// Count for units with no fixed length (weekends, weekdays).
    count: i64,
}

/// A duration split into fixed-length bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DecomposedDuration {
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl DurationValue {
    /// An exact duration of `seconds` seconds.
    pub fn from_seconds(seconds: i64) -> Self {
        DurationValue {
            raw_seconds: seconds,
            unit: None,
            count: 0,
        }
    }

    /// A duration of `count` units. A count of zero with a unit is a vague
    /// duration ("some hours").
    ///
    /// Legacy units are canonicalized: decades and centuries become years,
    /// quarters become months, fortnights become days.
    pub fn new(count: i64, unit: Option<TemporalUnit>) -> Self {
        let Some(unit) = unit else {
            return DurationValue::from_seconds(count);
        };

        let (count, unit) = match unit {
            TemporalUnit::Century => (count * 100, TemporalUnit::Year),
            TemporalUnit::Decade => (count * 10, TemporalUnit::Year),
            TemporalUnit::Quarter => (count * 3, TemporalUnit::Month),
            TemporalUnit::Fortnight => (count * 14, TemporalUnit::Day),
            TemporalUnit::BusinessDay => (count, TemporalUnit::Day),
            other => (count, other),
        };

        match unit.seconds() {
            Some(length) => DurationValue {
                raw_seconds: count * length,
                unit: Some(unit),
                count: 0,
            },
            None => DurationValue {
                raw_seconds: 0,
                unit: Some(unit),
                count,
            },
        }
    }

    /// True if any length or unit was given.
    pub fn is_set(&self) -> bool {
        self.raw_seconds != 0 || self.unit.is_some()
    }

    pub fn raw_seconds(&self) -> i64 {
        self.raw_seconds
    }

    pub fn unit(&self) -> Option<TemporalUnit> {
        self.unit
    }

    /// A duration with a unit but no length.
    pub fn is_vague(&self) -> bool {
        self.raw_seconds == 0 && self.count == 0 && self.unit.is_some()
    }

    /// Greedy decomposition of the absolute length into fixed-size bins.
    pub fn decompose(&self) -> DecomposedDuration {
        let mut rest = self.raw_seconds.abs();
        let mut take = |size: i64| {
            let n = rest / size;
            rest %= size;
            n
        };
        let years = take(YEAR);
        let months = take(MONTH);
        let weeks = take(WEEK);
        let days = take(DAY);
        let hours = take(HOUR);
        let minutes = take(MINUTE);
        DecomposedDuration {
            years,
            months,
            weeks,
            days,
            hours,
            minutes,
            seconds: rest,
        }
    }

    /// The single largest nonzero bin as a (count, unit) pair.
    ///
    /// Weekend and weekday counts are returned as-is. A vague duration
    /// returns a count of zero with its unit.
    pub fn simple_value(&self) -> (i32, Option<TemporalUnit>) {
        if let Some(unit @ (TemporalUnit::Weekend | TemporalUnit::Weekdays)) = self.unit {
            return (self.count as i32, Some(unit));
        }
        if self.raw_seconds == 0 {
            return (0, self.unit);
        }

        let sign = self.raw_seconds.signum();
        let d = self.decompose();
        let bins = [
            (d.years, TemporalUnit::Year),
            (d.months, TemporalUnit::Month),
            (d.weeks, TemporalUnit::Week),
            (d.days, TemporalUnit::Day),
            (d.hours, TemporalUnit::Hour),
            (d.minutes, TemporalUnit::Minute),
            (d.seconds, TemporalUnit::Second),
        ];
        bins.iter()
            .find(|(n, _)| *n != 0)
            .map(|(n, unit)| ((sign * n) as i32, Some(*unit)))
            .unwrap_or((0, self.unit))
    }

    /// ISO8601 duration string: `P1DT1H1M1S`, `PTXH`, `PT0S`, `P2WE`.
    pub fn format_value(&self) -> String {
        if !self.is_set() {
            return "PT0S".to_string();
        }

        if let Some(unit @ (TemporalUnit::Weekend | TemporalUnit::Weekdays)) = self.unit {
            let suffix = if unit == TemporalUnit::Weekend { "WE" } else { "WD" };
            return if self.count == 0 {
                format!("PX{suffix}")
            } else {
                format!("P{}{suffix}", self.count)
            };
        }

        if self.raw_seconds == 0 {
            if let Some(unit) = self.unit {
                return match unit {
                    TemporalUnit::Hour => "PTXH".to_string(),
                    TemporalUnit::Minute => "PTXM".to_string(),
                    TemporalUnit::Second => "PTXS".to_string(),
                    TemporalUnit::Year => "PXY".to_string(),
                    TemporalUnit::Month => "PXM".to_string(),
                    TemporalUnit::Week => "PXW".to_string(),
                    _ => "PXD".to_string(),
                };
            }
        }

        let d = self.decompose();
        let mut out = String::new();
        if self.raw_seconds < 0 {
            out.push('-');
        }
        out.push('P');
        for (n, letter) in [(d.years, 'Y'), (d.months, 'M'), (d.weeks, 'W'), (d.days, 'D')] {
            if n != 0 {
                out.push_str(&format!("{n}{letter}"));
            }
        }
        if d.hours != 0 || d.minutes != 0 || d.seconds != 0 {
            out.push('T');
            for (n, letter) in [(d.hours, 'H'), (d.minutes, 'M'), (d.seconds, 'S')] {
                if n != 0 {
                    out.push_str(&format!("{n}{letter}"));
                }
            }
        }
        out
    }
}
