//! Field flags and the small enumerations that appear in timex dictionaries.
//!
//! Every enumeration has a fixed wire string (the value a grammar writes into
//! a dictionary and the value printed in formatted output) and a stable
//! one-byte code used by the binary blob format.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::TimexError;

bitflags! {
    /// Which semantic fields of an [`ExtendedDateTime`](crate::ExtendedDateTime) carry meaning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DateTimeParts: u32 {
        const YEAR = 1 << 0;
        const MONTH = 1 << 1;
        const DAY = 1 << 2;
        const HOUR = 1 << 3;
        const MINUTE = 1 << 4;
        const SECOND = 1 << 5;
        const WEEK = 1 << 6;
        const WEEKDAY = 1 << 7;
        const PART_OF_DAY = 1 << 8;
        const SEASON = 1 << 9;
        const PART_OF_YEAR = 1 << 10;
        const TIME_ZONE = 1 << 11;
        const DECADE = 1 << 12;
        const CENTURY = 1 << 13;
        const MILLENNIUM = 1 << 14;
        /// A two-digit year ("'97") whose century is not yet known.
        const DECADE_YEAR = 1 << 15;
        const REFERENCE = 1 << 16;
        const OFFSET_ANCHOR = 1 << 17;
        const WEEK_OF_EXPRESSION = 1 << 18;
        /// The hour is known to be AM or PM; no inference needed.
        const AM_PM_UNAMBIGUOUS = 1 << 19;

        /// Any part that names a year or a span of years.
        const ANY_YEAR = Self::YEAR.bits()
            | Self::DECADE.bits()
            | Self::CENTURY.bits()
            | Self::MILLENNIUM.bits()
            | Self::DECADE_YEAR.bits();
        /// Granularities coarser than a single year.
        const MULTI_YEAR = Self::DECADE.bits()
            | Self::CENTURY.bits()
            | Self::MILLENNIUM.bits()
            | Self::DECADE_YEAR.bits();
    }
}

bitflags! {
    /// A set of [`TemporalType`]s, used by [`TimexContext`](crate::TimexContext) to filter matches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TemporalTypes: u8 {
        const DATE = 1 << 0;
        const TIME = 1 << 1;
        const DURATION = 1 << 2;
        const SET = 1 << 3;
        const ALL = Self::DATE.bits() | Self::TIME.bits() | Self::DURATION.bits() | Self::SET.bits();
    }
}

impl Default for TemporalTypes {
    fn default() -> Self {
        TemporalTypes::ALL
    }
}

macro_rules! timex_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = ($code:literal, $text:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $code ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire string for this value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }

            /// Stable one-byte code used by the binary format.
            pub fn code(self) -> u8 {
                self as u8
            }

            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $( $code => Some($name::$variant), )+
                    _ => None,
                }
            }

            fn variant_name(self) -> &'static str {
                match self {
                    $( $name::$variant => stringify!($variant) ),+
                }
            }

            /// Case-insensitive parse of either the wire string or the variant name.
            pub fn parse(s: &str) -> Option<Self> {
                let s = s.trim();
                Self::ALL.iter().copied().find(|v| {
                    v.as_str().eq_ignore_ascii_case(s) || v.variant_name().eq_ignore_ascii_case(s)
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TimexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| TimexError::malformed(stringify!($name), s))
            }
        }
    };
}

timex_enum! {
    /// The category of a resolved value.
    TemporalType {
        /// Not yet known; [`ExtendedDateTime::create`](crate::ExtendedDateTime::create) infers it.
        None = (0, ""),
        Date = (1, "DATE"),
        Time = (2, "TIME"),
        Duration = (3, "DURATION"),
        /// A recurrence.
        Set = (4, "SET"),
    }
}

impl TemporalType {
    /// The single-member filter set for this type.
    pub fn as_filter(self) -> TemporalTypes {
        match self {
            TemporalType::None => TemporalTypes::empty(),
            TemporalType::Date => TemporalTypes::DATE,
            TemporalType::Time => TemporalTypes::TIME,
            TemporalType::Duration => TemporalTypes::DURATION,
            TemporalType::Set => TemporalTypes::SET,
        }
    }
}

timex_enum! {
    /// Units used by offsets, durations and frequencies.
    TemporalUnit {
        Year = (0, "year"),
        Month = (1, "month"),
        Week = (2, "week"),
        Day = (3, "day"),
        Hour = (4, "hour"),
        Minute = (5, "minute"),
        Second = (6, "second"),
        Weekend = (7, "weekend"),
        Weekdays = (8, "weekdays"),
        Monday = (9, "monday"),
        Tuesday = (10, "tuesday"),
        Wednesday = (11, "wednesday"),
        Thursday = (12, "thursday"),
        Friday = (13, "friday"),
        Saturday = (14, "saturday"),
        Sunday = (15, "sunday"),
        BusinessDay = (16, "businessday"),
        Decade = (17, "decade"),
        Century = (18, "century"),
        Fortnight = (19, "fortnight"),
        Quarter = (20, "quarter"),
    }
}

impl TemporalUnit {
    /// ISO day number (Monday = 1 .. Sunday = 7) for the seven weekday units.
    pub fn iso_weekday(self) -> Option<u32> {
        match self {
            TemporalUnit::Monday => Some(1),
            TemporalUnit::Tuesday => Some(2),
            TemporalUnit::Wednesday => Some(3),
            TemporalUnit::Thursday => Some(4),
            TemporalUnit::Friday => Some(5),
            TemporalUnit::Saturday => Some(6),
            TemporalUnit::Sunday => Some(7),
            _ => None,
        }
    }

    pub fn is_weekday(self) -> bool {
        self.iso_weekday().is_some()
    }

    pub fn from_iso_weekday(n: u32) -> Option<Self> {
        match n {
            1 => Some(TemporalUnit::Monday),
            2 => Some(TemporalUnit::Tuesday),
            3 => Some(TemporalUnit::Wednesday),
            4 => Some(TemporalUnit::Thursday),
            5 => Some(TemporalUnit::Friday),
            6 => Some(TemporalUnit::Saturday),
            7 => Some(TemporalUnit::Sunday),
            _ => None,
        }
    }

    pub fn from_weekday(wd: Weekday) -> Self {
        match wd {
            Weekday::Mon => TemporalUnit::Monday,
            Weekday::Tue => TemporalUnit::Tuesday,
            Weekday::Wed => TemporalUnit::Wednesday,
            Weekday::Thu => TemporalUnit::Thursday,
            Weekday::Fri => TemporalUnit::Friday,
            Weekday::Sat => TemporalUnit::Saturday,
            Weekday::Sun => TemporalUnit::Sunday,
        }
    }

    /// Hour, minute or second.
    pub fn is_time_unit(self) -> bool {
        matches!(
            self,
            TemporalUnit::Hour | TemporalUnit::Minute | TemporalUnit::Second
        )
    }

    /// Fixed length of one unit in seconds. Months are 30 days and years are
    /// 365 days; this is never real calendar math.
    pub fn seconds(self) -> Option<i64> {
        const DAY: i64 = 86_400;
        match self {
            TemporalUnit::Second => Some(1),
            TemporalUnit::Minute => Some(60),
            TemporalUnit::Hour => Some(3_600),
            TemporalUnit::Day | TemporalUnit::BusinessDay => Some(DAY),
            TemporalUnit::Week => Some(7 * DAY),
            TemporalUnit::Fortnight => Some(14 * DAY),
            TemporalUnit::Month => Some(30 * DAY),
            TemporalUnit::Quarter => Some(90 * DAY),
            TemporalUnit::Year => Some(365 * DAY),
            TemporalUnit::Decade => Some(3_650 * DAY),
            TemporalUnit::Century => Some(36_500 * DAY),
            _ => None,
        }
    }
}

timex_enum! {
    /// Named portions of a day.
    PartOfDay {
        Morning = (0, "MO"),
        MidDay = (1, "MI"),
        Afternoon = (2, "AF"),
        Evening = (3, "EV"),
        Night = (4, "NI"),
        Pm = (5, "PM"),
        DayTime = (6, "DT"),
        Noon = (7, "NO"),
        Midnight = (8, "MN"),
    }
}

impl PartOfDay {
    /// The hour most representative of this part of day, used for AM/PM
    /// disambiguation and for comparisons when no hour is set.
    pub fn approximate_hour(self) -> u32 {
        match self {
            PartOfDay::Morning => 9,
            PartOfDay::MidDay => 12,
            PartOfDay::Afternoon => 15,
            PartOfDay::Evening => 19,
            PartOfDay::Night => 22,
            PartOfDay::Pm => 17,
            PartOfDay::DayTime => 12,
            PartOfDay::Noon => 12,
            PartOfDay::Midnight => 0,
        }
    }
}

timex_enum! {
    Season {
        Spring = (0, "SP"),
        Summer = (1, "SU"),
        Fall = (2, "FA"),
        Winter = (3, "WI"),
    }
}

timex_enum! {
    /// Quarters and halves of a year.
    PartOfYear {
        FirstQuarter = (0, "Q1"),
        SecondQuarter = (1, "Q2"),
        ThirdQuarter = (2, "Q3"),
        FourthQuarter = (3, "Q4"),
        FirstHalf = (4, "H1"),
        SecondHalf = (5, "H2"),
    }
}

timex_enum! {
    /// A pure reference to the past, present or future ("now", "recently").
    DateTimeReference {
        Past = (0, "PAST_REF"),
        Present = (1, "PRESENT_REF"),
        Future = (2, "FUTURE_REF"),
    }
}

timex_enum! {
    Modifier {
        Approximately = (0, "APPROX"),
        Start = (1, "START"),
        Mid = (2, "MID"),
        End = (3, "END"),
        Before = (4, "BEFORE"),
        After = (5, "AFTER"),
        EqualOrLess = (6, "EQUAL_OR_LESS"),
        EqualOrMore = (7, "EQUAL_OR_MORE"),
        Less = (8, "LESS_THAN"),
        More = (9, "MORE_THAN"),
    }
}

timex_enum! {
    /// Direction used to resolve ambiguous references.
    Normalization {
        /// Nearest occurrence in either direction.
        Present = (0, "present"),
        Past = (1, "past"),
        Future = (2, "future"),
    }
}

timex_enum! {
    /// Policy for resolving "next Monday" / "last Friday" style offsets.
    WeekdayLogic {
        /// Natural next/last: the nearest matching day strictly after or before today.
        SimpleOffset = (0, "simple"),
        /// Strict forward/back stepping with no same-day special case.
        Programmatic = (1, "programmatic"),
        /// The current week is excluded entirely.
        WeekBoundary = (2, "week_boundary"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_wire_and_variant_names() {
        assert_eq!(PartOfDay::parse("AF"), Some(PartOfDay::Afternoon));
        assert_eq!(PartOfDay::parse("afternoon"), Some(PartOfDay::Afternoon));
        assert_eq!(TemporalUnit::parse("Monday"), Some(TemporalUnit::Monday));
        assert_eq!(TemporalUnit::parse("DAY"), Some(TemporalUnit::Day));
        assert_eq!(Season::parse("xx"), None);
    }

    #[test]
    fn test_from_str_reports_malformed_field() {
        let err = "Q7".parse::<PartOfYear>().unwrap_err();
        assert!(matches!(err, TimexError::MalformedField { .. }));
    }

    #[test]
    fn test_codes_are_stable() {
        for unit in TemporalUnit::ALL {
            assert_eq!(TemporalUnit::from_code(unit.code()), Some(*unit));
        }
        assert_eq!(TemporalUnit::from_code(200), None);
    }

    #[test]
    fn test_weekday_units() {
        assert_eq!(TemporalUnit::Sunday.iso_weekday(), Some(7));
        assert_eq!(TemporalUnit::from_weekday(Weekday::Wed), TemporalUnit::Wednesday);
        assert!(!TemporalUnit::Weekend.is_weekday());
    }

    #[test]
    fn test_any_year_covers_granularities() {
        assert!(DateTimeParts::ANY_YEAR.contains(DateTimeParts::DECADE_YEAR));
        assert!(!DateTimeParts::MULTI_YEAR.contains(DateTimeParts::YEAR));
    }
}
