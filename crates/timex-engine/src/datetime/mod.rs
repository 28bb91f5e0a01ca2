//! The resolved temporal value.
//!
//! An [`ExtendedDateTime`] is built once from a timex dictionary and a
//! [`TimexContext`]. Construction resolves every ambiguity it can (AM/PM,
//! the month of a bare day-of-month, the week of a bare weekday, offset
//! anchors) and records which fields ended up meaningful in
//! [`set_parts`](ExtendedDateTime::set_parts). The value then renders itself as
//! an ISO8601-like timex string through [`format_value`](ExtendedDateTime::format_value).
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use timex_engine::{attributes, ExtendedDateTime, TemporalType, TimexContext};
//!
//! let reference = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap().and_hms_opt(15, 0, 0).unwrap();
//! let context = TimexContext::new(reference);
//! let fields = attributes::dictionary([("HOUR", "2"), ("AMPM", "not_specified")]);
//! let value = ExtendedDateTime::create(TemporalType::Time, &fields, &context).unwrap();
//! assert_eq!(value.format_value(), "2023-01-11T14");
//! ```

mod format;
mod resolve;

use std::cmp::Ordering;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::attributes::{self, TimexDictionary};
use crate::calendar;
use crate::context::TimexContext;
use crate::duration::DurationValue;
use crate::error::Result;
use crate::matching::TimexTag;
use crate::parts::{
    DateTimeParts, DateTimeReference, Modifier, Normalization, PartOfDay, PartOfYear, Season,
    TemporalType, TemporalUnit,
};

pub use format::FormatStrategy;

/// A partially specified point in time, a duration, or a recurrence.
#[derive(Debug, Clone)]
pub struct ExtendedDateTime {
    temporal_type: TemporalType,
    set_parts: DateTimeParts,
    explicit_set_parts: DateTimeParts,
    /// Arithmetic cursor. Only the fields named in `set_parts` carry meaning.
    scratch: NaiveDateTime,
    part_of_day: Option<PartOfDay>,
    season: Option<Season>,
    part_of_year: Option<PartOfYear>,
    reference: Option<DateTimeReference>,
    time_zone: Option<String>,
    offset: Option<i32>,
    offset_unit: Option<TemporalUnit>,
    offset_anchor: Option<String>,
    compound_offset: i32,
    min_offset: i32,
    duration: DurationValue,
    modifier: Option<Modifier>,
    quantity: Option<i32>,
    frequency: Option<i32>,
    frequency_unit: Option<TemporalUnit>,
    valid_for_ranges: bool,
    input_date_was_invalid: bool,
    original: TimexDictionary,
    context: TimexContext,
    formatted: OnceLock<String>,
}

/// Every calendar field of a value, `None` where the field is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DateFields {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub hour: Option<u32>,
    pub minute: Option<u32>,
    pub second: Option<u32>,
    pub week: Option<u32>,
    pub weekday: Option<u32>,
}

/// Picks a temporal type from the keys a dictionary carries.
fn infer_temporal_type(dictionary: &TimexDictionary) -> TemporalType {
    let has = |key: &str| attributes::value(dictionary, key).is_some();

    if has(attributes::DURATION) || has(attributes::DURATION_UNIT) || has(attributes::RAW_DURATION) {
        return TemporalType::Duration;
    }
    if has(attributes::FREQUENCY) || has(attributes::QUANTITY) {
        return TemporalType::Set;
    }
    let time_offset = attributes::value(dictionary, attributes::OFFSET_UNIT)
        .and_then(TemporalUnit::parse)
        .is_some_and(TemporalUnit::is_time_unit);
    if time_offset
        || has(attributes::HOUR)
        || has(attributes::MINUTE)
        || has(attributes::SECOND)
        || has(attributes::PART_OF_DAY)
    {
        TemporalType::Time
    } else {
        TemporalType::Date
    }
}

impl ExtendedDateTime {
    fn blank(temporal_type: TemporalType, original: TimexDictionary, context: TimexContext) -> Self {
        ExtendedDateTime {
            temporal_type,
            set_parts: DateTimeParts::empty(),
            explicit_set_parts: DateTimeParts::empty(),
            scratch: context.reference_date_time,
            part_of_day: None,
            season: None,
            part_of_year: None,
            reference: None,
            time_zone: None,
            offset: None,
            offset_unit: None,
            offset_anchor: None,
            compound_offset: 0,
            min_offset: 1,
            duration: DurationValue::default(),
            modifier: None,
            quantity: None,
            frequency: None,
            frequency_unit: None,
            valid_for_ranges: true,
            input_date_was_invalid: false,
            original,
            context,
            formatted: OnceLock::new(),
        }
    }

    /// Resolve a timex dictionary against `context`.
    ///
    /// Passing [`TemporalType::None`] infers the type from the dictionary
    /// keys. A value that fails to parse is an error; a valid value that
    /// overflows the calendar ("February 31st") is not, and is reported
    /// through [`input_date_was_invalid`](Self::input_date_was_invalid).
    pub fn create(
        temporal_type: TemporalType,
        dictionary: &TimexDictionary,
        context: &TimexContext,
    ) -> Result<Self> {
        let temporal_type = match temporal_type {
            TemporalType::None => infer_temporal_type(dictionary),
            other => other,
        };
        let mut value = ExtendedDateTime::blank(temporal_type, dictionary.clone(), context.clone());
        value.resolve(dictionary)?;
        tracing::trace!(
            temporal_type = %value.temporal_type,
            set_parts = ?value.set_parts,
            invalid = value.input_date_was_invalid,
            "resolved timex dictionary"
        );
        Ok(value)
    }

    /// Combine the dictionaries of two values and resolve the result.
    ///
    /// Keys in `first` win over keys in `second`. A range hint on either side
    /// is dropped, since the merged value is a new expression.
    pub fn merge(
        first: &ExtendedDateTime,
        second: &ExtendedDateTime,
        temporal_type: TemporalType,
        context: &TimexContext,
    ) -> Result<Self> {
        let mut merged = first.original.clone();
        for (key, value) in &second.original {
            merged.entry(key.clone()).or_insert_with(|| value.clone());
        }
        merged.remove(attributes::RANGE_HINT);
        ExtendedDateTime::create(temporal_type, &merged, context)
    }

    /// Resolve the same dictionary again under a different context.
    pub fn reinterpret(&self, context: &TimexContext) -> Result<Self> {
        ExtendedDateTime::create(self.temporal_type, &self.original, context)
    }

    /// Move an explicit hour across noon. Does nothing when no hour was given.
    pub fn flip_am_pm(&mut self) {
        if !self.explicit_set_parts.contains(DateTimeParts::HOUR) {
            return;
        }
        let hours = if self.scratch.hour() < 12 { 12 } else { -12 };
        if let Some(flipped) = calendar::add_hours(self.scratch, hours) {
            self.scratch = flipped;
            self.formatted = OnceLock::new();
        }
    }

    /// Turn a duration ("for three days") into an offset from the reference
    /// instant of `context`, backwards under past normalization.
    ///
    /// Returns `Ok(None)` when there is no duration or it has no unit.
    pub fn convert_duration_into_offset(&self, context: &TimexContext) -> Result<Option<Self>> {
        if !self.duration.is_set() {
            return Ok(None);
        }
        let (count, unit) = self.duration.simple_value();
        let Some(unit) = unit else {
            return Ok(None);
        };
        let count = if context.normalization == Normalization::Past {
            -count
        } else {
            count
        };
        let count = count.to_string();
        let fields = attributes::dictionary([
            (attributes::OFFSET, count.as_str()),
            (attributes::OFFSET_UNIT, unit.as_str()),
        ]);
        ExtendedDateTime::create(TemporalType::None, &fields, context).map(Some)
    }

    // ── Field accessors ─────────────────────────────────────────────────

    fn field<T>(&self, part: DateTimeParts, read: impl FnOnce(&NaiveDateTime) -> T) -> Option<T> {
        self.set_parts.contains(part).then(|| read(&self.scratch))
    }

    pub fn year(&self) -> Option<i32> {
        self.field(DateTimeParts::YEAR, NaiveDateTime::year)
    }

    pub fn month(&self) -> Option<u32> {
        self.field(DateTimeParts::MONTH, NaiveDateTime::month)
    }

    pub fn day(&self) -> Option<u32> {
        self.field(DateTimeParts::DAY, NaiveDateTime::day)
    }

    pub fn hour(&self) -> Option<u32> {
        self.field(DateTimeParts::HOUR, NaiveDateTime::hour)
    }

    pub fn minute(&self) -> Option<u32> {
        self.field(DateTimeParts::MINUTE, NaiveDateTime::minute)
    }

    pub fn second(&self) -> Option<u32> {
        self.field(DateTimeParts::SECOND, NaiveDateTime::second)
    }

    /// ISO week number.
    pub fn week(&self) -> Option<u32> {
        self.field(DateTimeParts::WEEK, |dt| dt.iso_week().week())
    }

    /// ISO day of week, Monday = 1.
    pub fn weekday(&self) -> Option<u32> {
        self.field(DateTimeParts::WEEKDAY, |dt| dt.weekday().number_from_monday())
    }

    pub fn fields(&self) -> DateFields {
        DateFields {
            year: self.year(),
            month: self.month(),
            day: self.day(),
            hour: self.hour(),
            minute: self.minute(),
            second: self.second(),
            week: self.week(),
            weekday: self.weekday(),
        }
    }

    pub fn temporal_type(&self) -> TemporalType {
        self.temporal_type
    }

    /// Fields that are meaningful after inference.
    pub fn set_parts(&self) -> DateTimeParts {
        self.set_parts
    }

    /// Fields that were present in the input dictionary.
    pub fn explicit_set_parts(&self) -> DateTimeParts {
        self.explicit_set_parts
    }

    pub fn part_of_day(&self) -> Option<PartOfDay> {
        self.part_of_day
    }

    pub fn season(&self) -> Option<Season> {
        self.season
    }

    pub fn part_of_year(&self) -> Option<PartOfYear> {
        self.part_of_year
    }

    pub fn reference(&self) -> Option<DateTimeReference> {
        self.reference
    }

    pub fn time_zone(&self) -> Option<&str> {
        self.time_zone.as_deref()
    }

    pub fn offset(&self) -> Option<i32> {
        self.offset
    }

    pub fn offset_unit(&self) -> Option<TemporalUnit> {
        self.offset_unit
    }

    pub fn offset_anchor(&self) -> Option<&str> {
        self.offset_anchor.as_deref()
    }

    pub fn compound_offset(&self) -> i32 {
        self.compound_offset
    }

    pub fn min_offset(&self) -> i32 {
        self.min_offset
    }

    pub fn duration(&self) -> DurationValue {
        self.duration
    }

    pub fn modifier(&self) -> Option<Modifier> {
        self.modifier
    }

    pub fn quantity(&self) -> Option<i32> {
        self.quantity
    }

    pub fn frequency(&self) -> Option<i32> {
        self.frequency
    }

    pub fn frequency_unit(&self) -> Option<TemporalUnit> {
        self.frequency_unit
    }

    /// False when the grammar marked this value as unsuitable for anchoring a range.
    pub fn valid_for_ranges(&self) -> bool {
        self.valid_for_ranges
    }

    /// True when valid fields combined into an impossible date.
    pub fn input_date_was_invalid(&self) -> bool {
        self.input_date_was_invalid
    }

    /// The dictionary this value was built from.
    pub fn original_dictionary(&self) -> &TimexDictionary {
        &self.original
    }

    /// The context snapshot this value was resolved under.
    pub fn context(&self) -> &TimexContext {
        &self.context
    }

    // ── Predicates ──────────────────────────────────────────────────────

    pub fn is_offset(&self) -> bool {
        self.offset.is_some()
    }

    /// A bare "morning" or "tonight" with nothing else attached.
    pub fn is_part_of_day_only(&self) -> bool {
        self.set_parts == DateTimeParts::PART_OF_DAY
            && !self.is_offset()
            && self.temporal_type == TemporalType::Time
    }

    /// A weekday offset ("next Friday") that is not tied to an anchor date.
    pub fn is_weekday_offset_exception(&self) -> bool {
        self.offset_anchor.is_none() && self.offset_unit.is_some_and(TemporalUnit::is_weekday)
    }

    // ── Comparison ──────────────────────────────────────────────────────

    /// Field-wise comparison of `self` against `other`, over the parts both
    /// have set. `Less` means `self` comes first.
    pub fn compare_to(&self, other: &ExtendedDateTime) -> Ordering {
        0.cmp(&self.piecewise_compare(&other.scratch, other.set_parts))
    }

    /// Compare against a concrete instant, from the year down, stopping at
    /// the first field that is not set.
    pub fn incomplete_compare_to(&self, instant: &NaiveDateTime) -> Ordering {
        let cascade: [(DateTimeParts, fn(&NaiveDateTime) -> i64); 6] = [
            (DateTimeParts::YEAR, |dt| dt.year() as i64),
            (DateTimeParts::MONTH, |dt| dt.month() as i64),
            (DateTimeParts::DAY, |dt| dt.day() as i64),
            (DateTimeParts::HOUR, |dt| dt.hour() as i64),
            (DateTimeParts::MINUTE, |dt| dt.minute() as i64),
            (DateTimeParts::SECOND, |dt| dt.second() as i64),
        ];
        for (part, read) in cascade {
            if !self.set_parts.contains(part) {
                break;
            }
            let diff = read(&self.scratch) - read(instant);
            if diff != 0 {
                return diff.cmp(&0);
            }
        }
        Ordering::Equal
    }

    /// Sign of `comparison - self`, over the parts in both `set_parts` and
    /// `parts`. Positive means `comparison` is later.
    pub fn piecewise_compare(&self, comparison: &NaiveDateTime, parts: DateTimeParts) -> i32 {
        let overlap = self.set_parts & parts;
        let reference = &self.context.reference_date_time;
        let mut result: i64 = 0;

        if overlap.contains(DateTimeParts::YEAR) {
            result = (comparison.year() - self.scratch.year()) as i64;
        }
        if result == 0 && overlap.contains(DateTimeParts::MONTH) {
            result = comparison.month() as i64 - self.scratch.month() as i64;
        }
        if result == 0 && overlap.contains(DateTimeParts::WEEK) {
            if overlap.contains(DateTimeParts::YEAR) {
                result = (calendar::iso_week_year(comparison) - calendar::iso_week_year(&self.scratch)) as i64;
            }
            if result == 0 {
                result = calendar::iso_week(comparison) - calendar::iso_week(&self.scratch);
            }
        }
        if result == 0 && overlap.contains(DateTimeParts::DAY) {
            result = comparison.day() as i64 - self.scratch.day() as i64;
        }
        if result == 0 && overlap.contains(DateTimeParts::WEEKDAY) {
            // A bare weekday borrows its week, month and year from the reference.
            let own_week = if overlap.contains(DateTimeParts::WEEK) {
                calendar::iso_week(&self.scratch)
            } else {
                calendar::iso_week(reference)
            };
            let own_year = if overlap.contains(DateTimeParts::YEAR) {
                self.scratch.year()
            } else {
                reference.year()
            };
            let own_month = if overlap.contains(DateTimeParts::MONTH) {
                self.scratch.month()
            } else {
                reference.month()
            };
            let other_week = calendar::iso_week(comparison);
            let own_week_year = calendar::week_year_of(own_year, own_month, own_week);
            let other_week_year = calendar::week_year_of(comparison.year(), comparison.month(), other_week);

            result = (other_week_year - own_week_year) as i64;
            if result == 0 {
                result = other_week - own_week;
            }
            if result == 0 {
                result = calendar::iso_weekday(comparison) - calendar::iso_weekday(&self.scratch);
            }
        }
        if result == 0
            && overlap.contains(DateTimeParts::PART_OF_DAY)
            && !overlap.contains(DateTimeParts::HOUR)
        {
            if let Some(pod) = self.part_of_day {
                let approximate = pod.approximate_hour() as i64;
                let hour = comparison.hour() as i64;
                result = match self.context.normalization {
                    Normalization::Future => hour - (approximate + TIME_OF_DAY_VAGUENESS),
                    Normalization::Past => hour - (approximate - TIME_OF_DAY_VAGUENESS),
                    Normalization::Present => 0,
                };
            }
        }
        if result == 0 && overlap.contains(DateTimeParts::HOUR) {
            result = comparison.hour() as i64 - self.scratch.hour() as i64;
        }
        if result == 0 && overlap.contains(DateTimeParts::MINUTE) {
            result = comparison.minute() as i64 - self.scratch.minute() as i64;
        }
        if result == 0 && overlap.contains(DateTimeParts::SECOND) {
            result = comparison.second() as i64 - self.scratch.second() as i64;
        }
        result.signum() as i32
    }

    // ── Tag output ──────────────────────────────────────────────────────

    /// Assemble the full annotation for this value.
    pub fn to_tag(&self) -> TimexTag {
        let comment = self.format_comment();
        TimexTag {
            temporal_type: self.format_type().to_string(),
            value: self.format_value().to_string(),
            modifier: self.format_mod().map(str::to_string),
            quantity: self.format_quantity(),
            frequency: self.format_frequency(),
            comment: (!comment.is_empty()).then_some(comment),
        }
    }
}

/// Hours of slack around a part of day's approximate hour when comparing.
const TIME_OF_DAY_VAGUENESS: i64 = 3;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::WeekdayLogic;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    /// Tuesday 2023-01-10 15:00.
    fn anchor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn context() -> TimexContext {
        TimexContext::new(anchor())
    }

    fn resolve(pairs: &[(&str, &str)]) -> ExtendedDateTime {
        resolve_with(pairs, &context())
    }

    fn resolve_with(pairs: &[(&str, &str)], ctx: &TimexContext) -> ExtendedDateTime {
        let dict = attributes::dictionary(pairs.iter().copied());
        ExtendedDateTime::create(TemporalType::None, &dict, ctx).unwrap()
    }

    // ── construction ────────────────────────────────────────────────────

    #[test]
    fn test_full_date_formats_as_is() {
        let edt = resolve(&[("YEAR", "2012"), ("MONTH", "5"), ("DAY", "18")]);
        assert_eq!(edt.temporal_type(), TemporalType::Date);
        assert_eq!(edt.format_value(), "2012-05-18");
        assert_eq!(edt.fields().day, Some(18));
        assert_eq!(edt.hour(), None);
    }

    #[test]
    fn test_ambiguous_hour_infers_pm_in_future() {
        let edt = resolve(&[("HOUR", "2"), ("AMPM", "not_specified")]);
        assert_eq!(edt.temporal_type(), TemporalType::Time);
        assert_eq!(edt.hour(), Some(14));
        // 14:00 has already passed, so the next one is tomorrow.
        assert_eq!(edt.format_value(), "2023-01-11T14");
    }

    #[test]
    fn test_hour_without_ampm_marker_is_unambiguous() {
        let edt = resolve(&[("HOUR", "2")]);
        assert_eq!(edt.hour(), Some(2));
        assert!(edt.set_parts().contains(DateTimeParts::AM_PM_UNAMBIGUOUS));
        // 02:00 has passed today, so the future instance is tomorrow.
        assert_eq!(edt.format_value(), "2023-01-11T02");
    }

    #[test]
    fn test_part_of_day_picks_closer_half() {
        let edt = resolve(&[("HOUR", "8"), ("AMPM", "not_specified"), ("PART_OF_DAY", "EV")]);
        assert_eq!(edt.hour(), Some(20));
        let edt = resolve(&[("HOUR", "8"), ("AMPM", "not_specified"), ("PART_OF_DAY", "MO")]);
        assert_eq!(edt.hour(), Some(8));
    }

    #[test]
    fn test_malformed_field_is_an_error() {
        let dict = attributes::dictionary([("MONTH", "May")]);
        let err = ExtendedDateTime::create(TemporalType::Date, &dict, &context()).unwrap_err();
        assert!(matches!(err, crate::TimexError::MalformedField { .. }));

        let dict = attributes::dictionary([("OFFSET", "1"), ("OFFSET_UNIT", "lightyear")]);
        assert!(ExtendedDateTime::create(TemporalType::Date, &dict, &context()).is_err());
    }

    #[test]
    fn test_day_overflow_flags_invalid() {
        let edt = resolve(&[("YEAR", "2023"), ("MONTH", "2"), ("DAY", "31")]);
        assert!(edt.input_date_was_invalid());
    }

    #[test]
    fn test_bare_day_rolls_to_next_month_in_future() {
        // The 5th has passed in January, so the next one is in February.
        let edt = resolve(&[("DAY", "5")]);
        assert_eq!(edt.format_value(), "2023-02-05");
        let edt = resolve(&[("DAY", "20")]);
        assert_eq!(edt.format_value(), "2023-01-20");
    }

    #[test]
    fn test_bare_day_without_inference_uses_placeholders() {
        let ctx = context().with_inference(false);
        let edt = resolve_with(&[("DAY", "31")], &ctx);
        assert!(!edt.input_date_was_invalid());
        assert_eq!(edt.format_value(), "XXXX-XX-31");
    }

    #[test]
    fn test_bare_weekday_resolves_to_next_occurrence() {
        // Reference is a Tuesday; Friday is three days ahead.
        let edt = resolve(&[("WEEKDAY", "5")]);
        assert_eq!(edt.format_value(), "2023-01-13");
        let past = context().with_normalization(Normalization::Past);
        let edt = resolve_with(&[("WEEKDAY", "5")], &past);
        assert_eq!(edt.format_value(), "2023-01-06");
    }

    #[test]
    fn test_two_digit_year_uses_nearest_century() {
        let edt = resolve(&[("YEAR", "XX97")]);
        assert_eq!(edt.year(), Some(1997));
        let edt = resolve(&[("YEAR", "XX12")]);
        assert_eq!(edt.year(), Some(2012));
    }

    #[test]
    fn test_decade_and_century_forms() {
        let edt = resolve(&[("YEAR", "198X")]);
        assert!(edt.set_parts().contains(DateTimeParts::DECADE));
        assert_eq!(edt.format_value(), "198X");
        let edt = resolve(&[("YEAR", "19XX")]);
        assert_eq!(edt.format_value(), "19XX");
    }

    #[test]
    fn test_noon_and_midnight_are_printed_as_codes() {
        let edt = resolve(&[("PART_OF_DAY", "NO")]);
        assert_eq!(edt.format_value(), "2023-01-11TNO");
        let edt = resolve(&[("PART_OF_DAY", "MN")]);
        assert_eq!(edt.format_value(), "2023-01-10TMN");
    }

    #[test]
    fn test_part_of_day_start_default_time() {
        let edt = resolve(&[("PART_OF_DAY", "MO"), ("MOD", "START"), ("DAY", "20"), ("MONTH", "1")]);
        assert_eq!(edt.hour(), Some(8));
        assert_eq!(edt.format_value(), "2023-01-20T08:00:00");
        let edt = resolve(&[("PART_OF_DAY", "EV"), ("MOD", "MID")]);
        assert_eq!(edt.hour(), Some(18));
    }

    // ── offsets ─────────────────────────────────────────────────────────

    #[test]
    fn test_day_offsets() {
        let edt = resolve(&[("OFFSET", "1"), ("OFFSET_UNIT", "day")]);
        assert_eq!(edt.format_strategy(), FormatStrategy::Offset);
        assert_eq!(edt.format_value(), "2023-01-11");
        let edt = resolve(&[("OFFSET", "-2"), ("OFFSET_UNIT", "day"), ("HOUR", "17")]);
        assert_eq!(edt.format_value(), "2023-01-08T17");
    }

    #[test]
    fn test_time_offset_is_relative() {
        let edt = resolve(&[("OFFSET", "3"), ("OFFSET_UNIT", "hour")]);
        assert_eq!(edt.temporal_type(), TemporalType::Time);
        assert_eq!(edt.format_value(), "2023-01-10T18");
        assert_eq!(edt.format_comment(), "relative");
    }

    #[test]
    fn test_vague_offset_uses_context_default() {
        let edt = resolve(&[("OFFSET_UNIT", "day")]);
        assert_eq!(edt.offset(), Some(3));
        assert_eq!(edt.modifier(), Some(Modifier::Approximately));
        assert_eq!(edt.format_value(), "2023-01-13");
    }

    #[test]
    fn test_week_and_weekend_offsets() {
        // 2023-01-10 is in ISO week 2.
        let edt = resolve(&[("OFFSET", "1"), ("OFFSET_UNIT", "week")]);
        assert_eq!(edt.format_value(), "2023-W03");
        let edt = resolve(&[("OFFSET", "0"), ("OFFSET_UNIT", "weekend")]);
        assert_eq!(edt.format_value(), "2023-W02-WE");
    }

    #[test]
    fn test_week_offset_rejects_clock_time() {
        let dict = attributes::dictionary([("OFFSET", "1"), ("OFFSET_UNIT", "week"), ("HOUR", "5")]);
        assert!(ExtendedDateTime::create(TemporalType::Date, &dict, &context()).is_err());
    }

    #[test]
    fn test_next_weekday_offset() {
        let edt = resolve(&[("OFFSET", "1"), ("OFFSET_UNIT", "friday")]);
        assert_eq!(edt.format_value(), "2023-01-13");
        let week_boundary = context().with_weekday_logic(WeekdayLogic::WeekBoundary);
        let edt = resolve_with(&[("OFFSET", "1"), ("OFFSET_UNIT", "friday")], &week_boundary);
        assert_eq!(edt.format_value(), "2023-01-20");
    }

    #[test]
    fn test_business_days_skip_weekend() {
        // Friday 2023-01-13 plus one business day is Monday.
        let friday = NaiveDate::from_ymd_opt(2023, 1, 13).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let ctx = TimexContext::new(friday);
        let edt = resolve_with(&[("OFFSET", "1"), ("OFFSET_UNIT", "businessday")], &ctx);
        assert_eq!(edt.format_value(), "2023-01-16");
        let edt = resolve_with(&[("OFFSET", "-1"), ("OFFSET_UNIT", "businessday")], &ctx);
        assert_eq!(edt.format_value(), "2023-01-12");
    }

    #[test]
    fn test_month_offset_counts_from_reference() {
        let edt = resolve(&[("OFFSET", "1"), ("OFFSET_UNIT", "month")]);
        assert_eq!(edt.format_value(), "2023-02");
    }

    #[test]
    fn test_today_anchor_snaps_to_reference() {
        let edt = resolve(&[("OFFSET", "2"), ("OFFSET_UNIT", "week"), ("OFFSET_ANCHOR", "TODAY")]);
        assert_eq!(edt.format_value(), "2023-01-24");
    }

    #[test]
    fn test_month_day_anchor_with_weekday_offset() {
        // Fourth Thursday from Nov 1st; already in the future from January.
        let edt = resolve(&[
            ("OFFSET", "4"),
            ("OFFSET_UNIT", "thursday"),
            ("OFFSET_ANCHOR", "11-01"),
        ]);
        assert_eq!(edt.format_value(), "2023-11-23");
    }

    #[test]
    fn test_holiday_anchor_without_resolver_is_invalid() {
        let edt = resolve(&[("OFFSET", "0"), ("OFFSET_UNIT", "day"), ("OFFSET_ANCHOR", "EASTER")]);
        assert!(edt.input_date_was_invalid());
    }

    #[test]
    fn test_holiday_anchor_uses_resolver() {
        struct FixedHoliday;
        impl crate::HolidayResolver for FixedHoliday {
            fn resolve(
                &self,
                holiday: &str,
                scratch: NaiveDateTime,
                _context: &TimexContext,
                _year_known: bool,
                _day_offset: i32,
            ) -> Option<chrono::NaiveDate> {
                (holiday == "EASTER").then(|| NaiveDate::from_ymd_opt(scratch.year(), 4, 9)).flatten()
            }
        }
        let ctx = context().with_holiday_resolver(std::sync::Arc::new(FixedHoliday));
        let edt = resolve_with(&[("OFFSET", "1"), ("OFFSET_UNIT", "day"), ("OFFSET_ANCHOR", "EASTER")], &ctx);
        assert!(!edt.input_date_was_invalid());
        assert_eq!(edt.format_value(), "2023-04-10");
    }

    // ── durations and sets ──────────────────────────────────────────────

    #[test]
    fn test_duration_value() {
        let edt = resolve(&[("DURATION", "3"), ("DURATION_UNIT", "hour")]);
        assert_eq!(edt.temporal_type(), TemporalType::Duration);
        assert_eq!(edt.format_strategy(), FormatStrategy::Duration);
        assert_eq!(edt.format_value(), "PT3H");
        let edt = resolve(&[("DURATION", "X"), ("DURATION_UNIT", "day")]);
        assert_eq!(edt.format_value(), "PXD");
    }

    #[test]
    fn test_convert_duration_into_offset() {
        let edt = resolve(&[("DURATION", "3"), ("DURATION_UNIT", "day")]);
        let offset = edt.convert_duration_into_offset(&context()).unwrap().unwrap();
        assert_eq!(offset.format_value(), "2023-01-13");
        let past = context().with_normalization(Normalization::Past);
        let offset = edt.convert_duration_into_offset(&past).unwrap().unwrap();
        assert_eq!(offset.format_value(), "2023-01-07");
        let date = resolve(&[("DAY", "20")]);
        assert!(date.convert_duration_into_offset(&context()).unwrap().is_none());
    }

    #[test]
    fn test_recurrence_formats() {
        let every_day = resolve(&[("FREQUENCY", "1"), ("FREQ_UNIT", "day"), ("HOUR", "9")]);
        assert_eq!(every_day.temporal_type(), TemporalType::Set);
        assert_eq!(every_day.format_value(), "XXXX-XX-XXT09");
        assert_eq!(every_day.format_frequency().as_deref(), Some("1day"));
        assert_eq!(every_day.format_quantity().as_deref(), Some("1"));

        let every_tuesday = resolve(&[("FREQUENCY", "1week"), ("WEEKDAY", "2")]);
        assert_eq!(every_tuesday.format_value(), "XXXX-WXX-2");
    }

    #[test]
    fn test_legacy_duration_on_set_becomes_frequency() {
        let dict = attributes::dictionary([("DURATION", "2"), ("DURATION_UNIT", "week")]);
        let edt = ExtendedDateTime::create(TemporalType::Set, &dict, &context()).unwrap();
        assert!(!edt.duration().is_set());
        assert_eq!(edt.frequency(), Some(2));
        assert_eq!(edt.frequency_unit(), Some(TemporalUnit::Week));
    }

    #[test]
    fn test_set_hour_carries_ampm_comment() {
        let edt = resolve(&[("FREQUENCY", "1day"), ("HOUR", "7"), ("AMPM", "not_specified")]);
        assert_eq!(edt.format_comment(), "ampm");
        let tag = edt.to_tag();
        assert_eq!(tag.temporal_type, "SET");
        assert_eq!(tag.comment.as_deref(), Some("ampm"));
    }

    // ── no-inference rendering ──────────────────────────────────────────

    #[test]
    fn test_placeholders_without_inference() {
        let ctx = context().with_inference(false);
        assert_eq!(resolve_with(&[("MONTH", "3")], &ctx).format_value(), "XXXX-03");
        assert_eq!(resolve_with(&[("HOUR", "17"), ("MINUTE", "30")], &ctx).format_value(), "T17:30");
        assert_eq!(resolve_with(&[("SEASON", "SU")], &ctx).format_value(), "XXXX-SU");
        assert_eq!(
            resolve_with(&[("YEAR", "2017"), ("WEEK", "17")], &ctx).format_value(),
            "2017-W17"
        );
    }

    #[test]
    fn test_week_with_year_resolves_in_that_year() {
        let edt = resolve(&[("YEAR", "2017"), ("WEEK", "17"), ("WEEKDAY", "1")]);
        assert_eq!(edt.format_value(), "2017-04-24");
    }

    // ── merge, reinterpret, comparison ──────────────────────────────────

    #[test]
    fn test_merge_prefers_first_operand() {
        let a = resolve(&[("HOUR", "17"), ("RANGE_HINT", "1")]);
        let b = resolve(&[("HOUR", "9"), ("WEEKDAY", "1")]);
        let merged = ExtendedDateTime::merge(&a, &b, TemporalType::None, &context()).unwrap();
        assert_eq!(merged.hour(), Some(17));
        assert!(merged.valid_for_ranges());
        assert_eq!(merged.format_value(), "2023-01-16T17");
    }

    #[test]
    fn test_reinterpret_uses_new_context() {
        let edt = resolve(&[("WEEKDAY", "5")]);
        let past = edt
            .reinterpret(&context().with_normalization(Normalization::Past))
            .unwrap();
        assert_eq!(past.format_value(), "2023-01-06");
        assert_eq!(edt.format_value(), "2023-01-13");
    }

    #[test]
    fn test_flip_am_pm_resets_cached_value() {
        let mut edt = resolve(&[("HOUR", "17")]);
        assert_eq!(edt.format_value(), "2023-01-10T17");
        edt.flip_am_pm();
        assert_eq!(edt.hour(), Some(5));
        assert_eq!(edt.format_value(), "2023-01-11T05");
    }

    #[test]
    fn test_compare_and_incomplete_compare() {
        let early = resolve(&[("YEAR", "2023"), ("MONTH", "3"), ("DAY", "1")]);
        let late = resolve(&[("YEAR", "2023"), ("MONTH", "3"), ("DAY", "9")]);
        assert_eq!(early.compare_to(&late), Ordering::Less);
        assert_eq!(late.compare_to(&early), Ordering::Greater);
        assert_eq!(early.compare_to(&early), Ordering::Equal);

        let march = resolve(&[("YEAR", "2023"), ("MONTH", "3")]);
        assert_eq!(march.incomplete_compare_to(&anchor()), Ordering::Greater);
        let no_year = resolve(&[("MONTH", "3")]);
        assert_eq!(no_year.incomplete_compare_to(&anchor()), Ordering::Equal);
    }

    #[test]
    fn test_part_of_day_only_predicate() {
        let edt = resolve(&[("PART_OF_DAY", "AF")]);
        assert!(edt.is_part_of_day_only());
        let edt = resolve(&[("PART_OF_DAY", "AF"), ("WEEKDAY", "3")]);
        assert!(!edt.is_part_of_day_only());
        let edt = resolve(&[("OFFSET", "1"), ("OFFSET_UNIT", "friday")]);
        assert!(edt.is_weekday_offset_exception());
    }

    #[test]
    fn test_timezone_and_mod_annotations() {
        let edt = resolve(&[("HOUR", "9"), ("TIMEZONE", "Z"), ("MOD", "APPROX")]);
        assert_eq!(edt.format_value(), "2023-01-11T09Z");
        assert_eq!(edt.format_mod(), Some("APPROX"));
        let tag = edt.to_tag();
        assert_eq!(tag.modifier.as_deref(), Some("APPROX"));
        assert_eq!(tag.quantity, None);
    }

    proptest! {
        #[test]
        fn prop_full_date_round_trips(date in (1900i32..2100, 1u32..=12, 1u32..=28)) {
            let (y, m, d) = date;
            let (ys, ms, ds) = (y.to_string(), m.to_string(), d.to_string());
            let dict = attributes::dictionary([("YEAR", ys.as_str()), ("MONTH", ms.as_str()), ("DAY", ds.as_str())]);
            let edt = ExtendedDateTime::create(TemporalType::Date, &dict, &context()).unwrap();
            prop_assert_eq!(edt.format_value(), format!("{y:04}-{m:02}-{d:02}"));
        }
    }
}
