//! Conversion from ISO8601-like timex strings back into field dictionaries,
//! concrete calendar values and durations.
//!
//! Used for decoding annotations produced elsewhere and for re-reading values
//! this crate has already formatted, which range inference does to compare
//! two resolved ends.
//!
//! - [`iso_to_dictionary`] — `2012-05-18T14:30` to `{YEAR, MONTH, DAY, HOUR, MINUTE}`
//! - [`duration_to_dictionary`] — `P3D` to `{DURATION, DURATION_UNIT}`
//! - [`try_parse_iso_duration`] — `PT2H30M` to an exact [`DurationValue`]
//! - [`try_parse_iso_into_local_date_time`] — a fully specified string to a [`NaiveDateTime`]
//! - [`try_parse_extended_date_time`] — a whole annotation back into an [`ExtendedDateTime`]

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;

use crate::attributes::{self, TimexDictionary};
use crate::calendar;
use crate::context::TimexContext;
use crate::datetime::ExtendedDateTime;
use crate::duration::DurationValue;
use crate::error::{Result, TimexError};
use crate::parts::{DateTimeReference, PartOfDay, Season, TemporalType, TemporalUnit};

static ISO_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^P([0-9X]{1,4}Y)?([0-9X]{1,2}M)?([0-9X]{1,3}W)?([0-9X]{1,3}D)?(?:T([0-9X]{1,4}H)?([0-9X]{1,3}M)?([0-9X]{1,3}S)?)?$",
    )
    .expect("valid ISO duration regex")
});

/// Units of the capture groups of [`ISO_DURATION_RE`], in order.
const DURATION_GROUP_UNITS: [TemporalUnit; 7] = [
    TemporalUnit::Year,
    TemporalUnit::Month,
    TemporalUnit::Week,
    TemporalUnit::Day,
    TemporalUnit::Hour,
    TemporalUnit::Minute,
    TemporalUnit::Second,
];

/// Fields that are dropped from a dictionary when they are pure placeholders.
const PLACEHOLDER_FIELDS: [&str; 7] = [
    attributes::MONTH,
    attributes::DAY,
    attributes::WEEKDAY,
    attributes::WEEK,
    attributes::PART_OF_YEAR,
    attributes::SEASON,
    attributes::YEAR,
];

fn is_integer(s: &str) -> bool {
    s.parse::<i32>().is_ok()
}

fn is_all_x(s: &str) -> bool {
    s.chars().all(|c| c == 'X')
}

fn invalid(iso: &str, what: &str) -> TimexError {
    TimexError::InvalidIso(format!("{iso}: {what}"))
}

// ── dictionaries ────────────────────────────────────────────────────────

/// Decode a date/time timex value into a field dictionary.
///
/// Placeholder fields (`XXXX`, `XX`) are left out. Strings shorter than three
/// characters yield an empty dictionary.
pub fn iso_to_dictionary(iso: &str) -> TimexDictionary {
    let mut dict = TimexDictionary::new();
    if iso.len() < 3 {
        return dict;
    }

    let mut parsed = iso.to_string();
    for reference in DateTimeReference::ALL {
        let token = reference.as_str();
        if let Some(index) = parsed.find(token) {
            dict.insert(attributes::REFERENCE.to_string(), token.to_string());
            parsed.replace_range(index..index + token.len(), "");
        }
    }

    let contains_time = parsed.starts_with('T') || parsed.as_bytes().get(10) == Some(&b'T');
    let (date, time) = match parsed.split_once('T') {
        Some((date, time)) => (date, time),
        None if contains_time => ("", parsed.as_str()),
        None => (parsed.as_str(), ""),
    };

    if !date.trim().is_empty() {
        parse_date_portion(date, &mut dict);
    }
    if !time.trim().is_empty() {
        parse_time_portion(time, &mut dict);
    }
    dict
}

fn parse_date_portion(date: &str, dict: &mut TimexDictionary) {
    let mut set = |key: &str, value: &str| {
        dict.insert(key.to_string(), value.to_string());
    };
    let components: Vec<&str> = date.splitn(4, '-').collect();

    if let Some(&year) = components.first().filter(|c| c.len() == 4) {
        set(attributes::YEAR, year);
    }

    if let Some(&second) = components.get(1) {
        if second.len() == 2 {
            let key = if Season::parse(second).is_some() {
                attributes::SEASON
            } else {
                attributes::MONTH
            };
            set(key, second);
        } else if second.len() > 2 && second.is_char_boundary(1) {
            let (first, rest) = second.split_at(1);
            if second.len() == 3 && first == "W" {
                set(attributes::WEEK, rest);
            } else if (first == "Q" || first == "H") && is_integer(rest) {
                set(attributes::PART_OF_YEAR, second);
            } else if !is_integer(rest) {
                set(attributes::SEASON, second);
            }
        }
    }

    if let Some(third) = components.get(2) {
        match *third {
            "WE" => {
                set(attributes::OFFSET, "0");
                set(attributes::OFFSET_UNIT, TemporalUnit::Weekend.as_str());
            }
            "WD" => {
                set(attributes::OFFSET, "0");
                set(attributes::OFFSET_UNIT, TemporalUnit::Weekdays.as_str());
            }
            week if week.len() == 3 && week.starts_with('W') => {
                set(attributes::WEEK, week.trim_start_matches('W'));
            }
            day if day.len() == 2 => set(attributes::DAY, day),
            weekday if weekday.len() == 1 => set(attributes::WEEKDAY, weekday),
            _ => {}
        }
    }

    if let Some(&fourth) = components.get(3) {
        set(attributes::WEEKDAY, fourth);
    }

    for field in PLACEHOLDER_FIELDS {
        if dict.get(field).is_some_and(|v| is_all_x(v)) {
            dict.remove(field);
        }
    }

    // "The third Monday in May" is written XXXX-05-W03-1; resolve it as an
    // offset from the first of the month.
    let weekday = attributes::value(dict, attributes::WEEKDAY)
        .and_then(|v| v.parse::<u32>().ok())
        .and_then(TemporalUnit::from_iso_weekday);
    if let (Some(unit), true, true) = (
        weekday,
        dict.contains_key(attributes::WEEK),
        dict.contains_key(attributes::MONTH),
    ) {
        let month = dict.remove(attributes::MONTH).unwrap_or_default();
        let week = dict.remove(attributes::WEEK).unwrap_or_default();
        dict.remove(attributes::WEEKDAY);
        dict.insert(attributes::OFFSET_ANCHOR.to_string(), format!("{month}-01"));
        dict.insert(attributes::OFFSET_UNIT.to_string(), unit.as_str().to_string());
        dict.insert(attributes::OFFSET.to_string(), week);
    }
}

fn parse_time_portion(time: &str, dict: &mut TimexDictionary) {
    let mut components: Vec<String> = time.splitn(4, ':').map(str::to_string).collect();

    if let Some(last) = components.last_mut() {
        if last.len() > 2 && last.is_char_boundary(2) {
            let zone = last.split_off(2);
            dict.insert(attributes::TIME_ZONE.to_string(), zone);
        }
    }

    if let Some(first) = components.first().filter(|c| c.len() == 2 && !is_all_x(c)) {
        let key = if is_integer(first) {
            attributes::HOUR
        } else {
            attributes::PART_OF_DAY
        };
        dict.insert(key.to_string(), first.clone());
    }
    for (index, key) in [(1, attributes::MINUTE), (2, attributes::SECOND)] {
        if let Some(value) = components.get(index).filter(|c| c.len() <= 2 && is_integer(c)) {
            dict.insert(key.to_string(), value.clone());
        }
    }
}

/// Split an ISO duration into (count, unit) pieces. `None` counts are `X`.
fn duration_pieces(iso: &str) -> Vec<(Option<i64>, TemporalUnit)> {
    if iso.len() < 3 || iso.ends_with('T') {
        return Vec::new();
    }
    let Some(captures) = ISO_DURATION_RE.captures(iso) else {
        return Vec::new();
    };
    DURATION_GROUP_UNITS
        .iter()
        .enumerate()
        .filter_map(|(i, unit)| {
            let piece = captures.get(i + 1)?.as_str();
            let count = &piece[..piece.len() - 1];
            Some((count.parse::<i64>().ok(), *unit))
        })
        .collect()
}

fn total_seconds(pieces: &[(Option<i64>, TemporalUnit)]) -> Option<i64> {
    pieces.iter().try_fold(0i64, |total, (count, unit)| {
        let length = unit.seconds()?;
        total.checked_add(count.as_ref()?.checked_mul(length)?)
    })
}

/// Decode a duration timex value into a field dictionary.
///
/// A single piece keeps its unit (`P3D` is three days, `PXD` some days);
/// several pieces collapse into exact seconds.
pub fn duration_to_dictionary(iso: &str) -> TimexDictionary {
    let mut dict = TimexDictionary::new();
    if iso.trim().len() < 3 || !iso.starts_with('P') {
        return dict;
    }
    let pieces = duration_pieces(iso);
    match pieces.as_slice() {
        [] => {}
        [(count, unit)] => {
            let count = count.map_or_else(|| "X".to_string(), |c| c.to_string());
            dict.insert(attributes::DURATION.to_string(), count);
            dict.insert(attributes::DURATION_UNIT.to_string(), unit.as_str().to_string());
        }
        many => {
            if let Some(seconds) = total_seconds(many) {
                dict.insert(attributes::RAW_DURATION.to_string(), seconds.to_string());
            }
        }
    }
    dict
}

/// Parse an ISO duration into an exact length. Fails on `X` placeholders.
pub fn try_parse_iso_duration(iso: &str) -> Option<DurationValue> {
    let pieces = duration_pieces(iso);
    if pieces.is_empty() {
        return None;
    }
    total_seconds(&pieces).map(DurationValue::from_seconds)
}

// ── concrete values ─────────────────────────────────────────────────────

/// Parse a fully specified timex date/time (`2023-01-10T15:30`, `2017-W17-1`)
/// into a calendar value. Placeholders, durations and out-of-range fields
/// are errors. A part-of-day code in the hour position is accepted and ignored.
pub fn try_parse_iso_into_local_date_time(iso: &str) -> Result<NaiveDateTime> {
    if iso.trim().is_empty() || iso.starts_with('P') {
        return Err(invalid(iso, "not a date or time"));
    }
    let (date, time) = iso.split_once('T').unwrap_or((iso, ""));

    let mut dt = NaiveDateTime::default();
    dt = parse_local_date(iso, date, dt)?;
    if !time.trim().is_empty() {
        dt = parse_local_time(iso, time, dt)?;
    }
    Ok(dt)
}

fn parse_local_date(iso: &str, date: &str, mut dt: NaiveDateTime) -> Result<NaiveDateTime> {
    let overflow = || invalid(iso, "date out of range");
    let components: Vec<&str> = date.splitn(4, '-').collect();
    let mut week_format = false;

    let year = components
        .first()
        .filter(|c| c.len() == 4)
        .and_then(|c| c.parse::<i32>().ok())
        .filter(|y| *y > 1400 && *y < 3000)
        .ok_or_else(|| invalid(iso, "year is invalid or out of range"))?;
    dt = calendar::add_years(dt, (year - dt.year()) as i64).ok_or_else(overflow)?;

    if let Some(second) = components.get(1) {
        if second.len() == 2 {
            let month = second
                .parse::<i64>()
                .ok()
                .filter(|m| (1..=12).contains(m))
                .ok_or_else(|| invalid(iso, "month is invalid or out of range"))?;
            dt = calendar::add_months(dt, month - dt.month() as i64).ok_or_else(overflow)?;
        } else {
            let week = second
                .strip_prefix('W')
                .filter(|w| w.len() == 2)
                .and_then(|w| w.parse::<i64>().ok())
                .filter(|w| (1..=54).contains(w))
                .ok_or_else(|| invalid(iso, "week is invalid or out of range"))?;
            dt = calendar::add_days(dt, 7).ok_or_else(overflow)?;
            dt = calendar::add_days(dt, 7 * (week - calendar::iso_week(&dt))).ok_or_else(overflow)?;
            week_format = true;
        }
    }

    if let Some(third) = components.get(2) {
        let value = third
            .parse::<i64>()
            .ok()
            .filter(|d| (1..=31).contains(d))
            .ok_or_else(|| invalid(iso, "day is invalid or out of range"))?;
        dt = match third.len() {
            2 => calendar::add_days(dt, value - dt.day() as i64),
            1 if week_format => calendar::add_days(dt, value - calendar::iso_weekday(&dt)),
            _ => return Err(invalid(iso, "day is invalid or out of range")),
        }
        .ok_or_else(overflow)?;
    }
    Ok(dt)
}

fn parse_local_time(iso: &str, time: &str, mut dt: NaiveDateTime) -> Result<NaiveDateTime> {
    let overflow = || invalid(iso, "time out of range");
    let mut components: Vec<&str> = time.splitn(4, ':').collect();
    if let Some(last) = components.last_mut() {
        let full: &str = *last;
        if full.len() > 4 {
            *last = full.get(..2).unwrap_or(full);
        }
    }
    if components.len() > 3 {
        return Err(invalid(iso, "too many time components"));
    }

    if let Some(hour) = components.first() {
        match hour.parse::<i64>().ok().filter(|h| hour.len() == 2 && (0..24).contains(h)) {
            Some(h) => dt = calendar::add_hours(dt, h - dt.hour() as i64).ok_or_else(overflow)?,
            None if PartOfDay::parse(hour).is_some() => {}
            None => return Err(invalid(iso, "hour is invalid or out of range")),
        }
    }
    let clock_field = |raw: &str, what: &str| {
        raw.parse::<i64>()
            .ok()
            .filter(|v| raw.len() <= 2 && (0..60).contains(v))
            .ok_or_else(|| invalid(iso, what))
    };
    if let Some(raw) = components.get(1) {
        let minute = clock_field(raw, "minute is invalid or out of range")?;
        dt = calendar::add_minutes(dt, minute - dt.minute() as i64).ok_or_else(overflow)?;
    }
    if let Some(raw) = components.get(2) {
        let second = clock_field(raw, "second is invalid or out of range")?;
        dt = calendar::add_seconds(dt, second - dt.second() as i64).ok_or_else(overflow)?;
    }
    Ok(dt)
}

// ── annotations ─────────────────────────────────────────────────────────

/// Rebuild an [`ExtendedDateTime`] from the pieces of a timex annotation.
///
/// Without a context the value is read literally: no inference, and the
/// reference instant is the epoch. An unknown type or a value that decodes
/// to no fields yields `Ok(None)`. Recurrences cannot be parsed back.
pub fn try_parse_extended_date_time(
    temporal_type: &str,
    value: &str,
    modifier: &str,
    quantity: &str,
    frequency: &str,
    comment: &str,
    context: Option<&TimexContext>,
) -> Result<Option<ExtendedDateTime>> {
    let literal;
    let context = match context {
        Some(context) => context,
        None => {
            literal = TimexContext::default().with_inference(false);
            &literal
        }
    };
    let temporal_type = TemporalType::parse(temporal_type).unwrap_or(TemporalType::None);

    let mut dict = match temporal_type {
        TemporalType::Date | TemporalType::Time => {
            let mut dict = iso_to_dictionary(value);
            if comment.contains("ampm") {
                dict.insert(attributes::AM_PM.to_string(), "not_specified".to_string());
            }
            dict
        }
        TemporalType::Duration => duration_to_dictionary(value),
        TemporalType::Set => {
            return Err(TimexError::UnsupportedType(
                "parsing recurrences is not supported".to_string(),
            ))
        }
        TemporalType::None => return Ok(None),
    };
    if dict.is_empty() {
        return Ok(None);
    }

    for (key, extra) in [
        (attributes::MOD, modifier),
        (attributes::QUANTITY, quantity),
        (attributes::FREQUENCY, frequency),
    ] {
        if !extra.is_empty() {
            dict.insert(key.to_string(), extra.to_string());
        }
    }
    tracing::trace!(%value, ?dict, "decoded timex value");
    ExtendedDateTime::create(temporal_type, &dict, context).map(Some)
}

/// Rebuild a date/time value from its formatted timex string.
pub fn try_parse_iso_into_extended_date_time(
    iso: &str,
    context: &TimexContext,
) -> Result<Option<ExtendedDateTime>> {
    try_parse_extended_date_time(TemporalType::Time.as_str(), iso, "", "", "", "", Some(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn get<'a>(dict: &'a TimexDictionary, key: &str) -> Option<&'a str> {
        dict.get(key).map(String::as_str)
    }

    // ── iso_to_dictionary tests ─────────────────────────────────────────

    #[test]
    fn test_full_date_time() {
        let dict = iso_to_dictionary("2012-05-18T14:30");
        assert_eq!(get(&dict, "YEAR"), Some("2012"));
        assert_eq!(get(&dict, "MONTH"), Some("05"));
        assert_eq!(get(&dict, "DAY"), Some("18"));
        assert_eq!(get(&dict, "HOUR"), Some("14"));
        assert_eq!(get(&dict, "MINUTE"), Some("30"));
        assert_eq!(dict.len(), 5);
    }

    #[test]
    fn test_placeholders_are_dropped() {
        let dict = iso_to_dictionary("XXXX-WXX-2");
        assert_eq!(get(&dict, "WEEKDAY"), Some("2"));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_weekend_becomes_offset() {
        let dict = iso_to_dictionary("2023-W02-WE");
        assert_eq!(get(&dict, "WEEK"), Some("02"));
        assert_eq!(get(&dict, "OFFSET"), Some("0"));
        assert_eq!(get(&dict, "OFFSET_UNIT"), Some("weekend"));
    }

    #[test]
    fn test_weekday_of_month_becomes_anchor() {
        let dict = iso_to_dictionary("XXXX-05-W03-1");
        assert_eq!(get(&dict, "OFFSET_ANCHOR"), Some("05-01"));
        assert_eq!(get(&dict, "OFFSET_UNIT"), Some("monday"));
        assert_eq!(get(&dict, "OFFSET"), Some("03"));
        assert!(!dict.contains_key("MONTH"));
        assert!(!dict.contains_key("WEEK"));
        assert!(!dict.contains_key("WEEKDAY"));
    }

    #[test]
    fn test_reference_is_spliced_out() {
        let dict = iso_to_dictionary("PRESENT_REF");
        assert_eq!(get(&dict, "REFERENCE"), Some("PRESENT_REF"));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_season_part_of_year_and_part_of_day() {
        assert_eq!(get(&iso_to_dictionary("2019-SU"), "SEASON"), Some("SU"));
        assert_eq!(get(&iso_to_dictionary("2019-Q3"), "PART_OF_YEAR"), Some("Q3"));
        let dict = iso_to_dictionary("2016-09-27TMO");
        assert_eq!(get(&dict, "PART_OF_DAY"), Some("MO"));
        assert_eq!(get(&dict, "DAY"), Some("27"));
    }

    #[test]
    fn test_time_zone_suffix() {
        let dict = iso_to_dictionary("T09:15:00Z");
        assert_eq!(get(&dict, "HOUR"), Some("09"));
        assert_eq!(get(&dict, "SECOND"), Some("00"));
        assert_eq!(get(&dict, "TIMEZONE"), Some("Z"));
    }

    #[test]
    fn test_short_input_is_empty() {
        assert!(iso_to_dictionary("T9").is_empty());
    }

    // ── durations ───────────────────────────────────────────────────────

    #[test]
    fn test_single_piece_duration() {
        let dict = duration_to_dictionary("P3D");
        assert_eq!(get(&dict, "DURATION"), Some("3"));
        assert_eq!(get(&dict, "DURATION_UNIT"), Some("day"));
        let dict = duration_to_dictionary("PTXH");
        assert_eq!(get(&dict, "DURATION"), Some("X"));
        assert_eq!(get(&dict, "DURATION_UNIT"), Some("hour"));
    }

    #[test]
    fn test_multi_piece_duration_is_raw_seconds() {
        let dict = duration_to_dictionary("PT2H30M");
        assert_eq!(get(&dict, "RAW_DURATION"), Some("9000"));
        assert!(duration_to_dictionary("P1DTXH").is_empty());
    }

    #[test]
    fn test_malformed_durations() {
        assert!(duration_to_dictionary("P1DT").is_empty());
        assert!(duration_to_dictionary("PT").is_empty());
        assert!(duration_to_dictionary("3D").is_empty());
        assert_eq!(try_parse_iso_duration("PXD"), None);
        assert_eq!(
            try_parse_iso_duration("P1DT1H1M1S").map(|d| d.raw_seconds()),
            Some(90061)
        );
    }

    // ── local date time ─────────────────────────────────────────────────

    #[test]
    fn test_local_date_time() {
        let dt = try_parse_iso_into_local_date_time("2023-01-10T15:30").unwrap();
        let expected = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap().and_hms_opt(15, 30, 0).unwrap();
        assert_eq!(dt, expected);
    }

    #[test]
    fn test_local_week_date() {
        let dt = try_parse_iso_into_local_date_time("2017-W17-1").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2017, 4, 24).unwrap());
    }

    #[test]
    fn test_local_part_of_day_is_ignored() {
        let dt = try_parse_iso_into_local_date_time("2023-01-10TEV").unwrap();
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_local_rejects_invalid() {
        for iso in ["", "P3D", "1200-01-01", "2023-13", "2023-01-32", "2023-01-10T25", "XXXX-01-10"] {
            let err = try_parse_iso_into_local_date_time(iso).unwrap_err();
            assert!(matches!(err, TimexError::InvalidIso(_)), "{iso}");
        }
    }

    // ── annotations ─────────────────────────────────────────────────────

    #[test]
    fn test_extended_round_trip_without_context() {
        let edt = try_parse_extended_date_time("DATE", "2012-05-18", "", "", "", "", None)
            .unwrap()
            .unwrap();
        assert_eq!(edt.format_value(), "2012-05-18");
        assert_eq!(edt.day(), Some(18));
    }

    #[test]
    fn test_extended_ampm_comment_is_preserved() {
        let edt = try_parse_extended_date_time("TIME", "T02", "APPROX", "", "", "ampm", None)
            .unwrap()
            .unwrap();
        assert_eq!(edt.format_value(), "T02");
        assert_eq!(edt.format_comment(), "ampm");
        assert_eq!(edt.format_mod(), Some("APPROX"));
    }

    #[test]
    fn test_extended_duration() {
        let edt = try_parse_extended_date_time("DURATION", "PT3H", "", "", "", "", None)
            .unwrap()
            .unwrap();
        assert_eq!(edt.format_value(), "PT3H");
    }

    #[test]
    fn test_extended_set_is_unsupported() {
        let err = try_parse_extended_date_time("SET", "XXXX-WXX-1", "", "", "", "", None).unwrap_err();
        assert!(matches!(err, TimexError::UnsupportedType(_)));
        assert!(try_parse_extended_date_time("BOGUS", "2012", "", "", "", "", None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_iso_into_extended_uses_context() {
        let reference = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap().and_hms_opt(15, 0, 0).unwrap();
        let ctx = TimexContext::new(reference);
        let edt = try_parse_iso_into_extended_date_time("2023-01-12T16", &ctx).unwrap().unwrap();
        assert_eq!(edt.temporal_type(), TemporalType::Time);
        assert_eq!(edt.format_value(), "2023-01-12T16");
    }
}
