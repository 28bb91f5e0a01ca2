//! Dictionary parsing and inference.
//!
//! Fields are applied in a fixed order (coarse to fine, then the modifiers)
//! because later fields shift the scratch instant relative to earlier ones.

use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};

use super::ExtendedDateTime;
use crate::attributes::{self, TimexDictionary};
use crate::calendar;
use crate::duration::DurationValue;
use crate::error::{Result, TimexError};
use crate::parts::{
    DateTimeParts, DateTimeReference, Modifier, Normalization, PartOfDay, PartOfYear, Season,
    TemporalType, TemporalUnit, WeekdayLogic,
};

/// Minutes in half a day.
const HALF_DAY_MINUTES: i64 = 12 * 60;

/// Probes allowed when searching for a month that contains a bare day-of-month.
const DAY_PROBE_ATTEMPTS: u32 = 3;

static FREQUENCY_RE: std::sync::LazyLock<regex::Regex> =
    std::sync::LazyLock::new(|| regex::Regex::new(r"(\d+)(\D*)").expect("valid regex"));

/// Parse an integer field, failing on anything that is present but not a number.
fn int_field<T: FromStr>(dict: &TimexDictionary, key: &str) -> Result<Option<T>> {
    match attributes::value(dict, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TimexError::malformed(key, raw)),
    }
}

fn enum_field<T>(dict: &TimexDictionary, key: &str) -> Result<Option<T>>
where
    T: FromStr<Err = TimexError>,
{
    attributes::value(dict, key).map(T::from_str).transpose()
}

/// Classify a four-character year: `2012`, `198X` (decade), `19XX`
/// (century), `1XXX` (millennium) or `XX12` (two-digit year).
pub(crate) fn parse_year_string(s: &str) -> Option<(i32, DateTimeParts)> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() != 4 {
        return None;
    }
    let digits: Vec<bool> = chars.iter().map(char::is_ascii_digit).collect();
    let mut parts = match digits.as_slice() {
        [true, true, true, true] => DateTimeParts::YEAR,
        [true, true, true, false] => DateTimeParts::DECADE,
        [true, true, false, false] => DateTimeParts::CENTURY,
        [true, false, false, false] => DateTimeParts::MILLENNIUM,
        [false, false, true, true] => DateTimeParts::DECADE_YEAR,
        _ => DateTimeParts::empty(),
    };
    let normalized: String = chars
        .iter()
        .map(|c| if c.is_ascii_digit() { *c } else { '0' })
        .collect();
    let mut year: i32 = normalized.parse().ok()?;

    if year == 0 {
        if parts.contains(DateTimeParts::DECADE_YEAR) {
            // "XX00" is the year 2000 in the nearest century, not year zero.
            parts |= DateTimeParts::YEAR;
        } else if !parts.contains(DateTimeParts::YEAR) {
            year = 1;
        } else {
            return None;
        }
    }
    Some((year, parts))
}

impl ExtendedDateTime {
    pub(super) fn resolve(&mut self, dict: &TimexDictionary) -> Result<()> {
        self.parse_year(dict)?;
        self.parse_month(dict)?;
        self.parse_day(dict)?;
        self.parse_hour(dict)?;
        self.parse_minute(dict)?;
        self.parse_second(dict)?;
        self.parse_min_offset(dict)?;
        self.parse_week(dict)?;
        self.parse_weekday(dict)?;
        self.parse_part_of_day(dict)?;
        self.parse_time_zone(dict);
        self.parse_modifier(dict)?;
        self.parse_offset(dict)?;
        self.parse_reference(dict)?;
        self.parse_season(dict)?;
        self.parse_part_of_year(dict)?;
        self.parse_duration(dict)?;
        self.parse_quantity(dict)?;
        self.parse_frequency(dict)?;
        self.parse_week_of(dict);
        self.parse_range_hint(dict);

        self.infer_am_pm(dict)?;
        self.resolve_offset_anchor()?;
        self.apply_part_of_day_default_times()
    }

    // ── helpers ─────────────────────────────────────────────────────────

    /// Mark parts as both explicit and meaningful.
    fn mark(&mut self, parts: DateTimeParts) {
        self.set_parts |= parts;
        self.explicit_set_parts |= parts;
    }

    fn shift(&mut self, step: impl FnOnce(NaiveDateTime) -> Option<NaiveDateTime>) -> Result<()> {
        let current = self.scratch;
        self.scratch = step(current).ok_or_else(|| TimexError::OutOfRange(current.to_string()))?;
        Ok(())
    }

    fn infers(&self) -> bool {
        self.context.use_inference && self.temporal_type != TemporalType::Set
    }

    // ── calendar fields ─────────────────────────────────────────────────

    fn parse_year(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(raw) = attributes::value(dict, attributes::YEAR) else {
            return Ok(());
        };
        let (mut year, mut parts) = parse_year_string(raw.trim())
            .ok_or_else(|| TimexError::malformed(attributes::YEAR, raw))?;
        if parts.is_empty() {
            return Ok(());
        }

        if parts.contains(DateTimeParts::DECADE_YEAR) && self.context.use_inference {
            let reference = self.context.reference_date_time.year();
            year += (reference / 100) * 100;
            if year - reference > 50 {
                year -= 100;
            } else if reference - year > 50 {
                year += 100;
            }
            parts.remove(DateTimeParts::DECADE_YEAR);
            parts |= DateTimeParts::YEAR;
        }

        self.shift(|dt| calendar::add_years(dt, (year - dt.year()) as i64))?;
        self.mark(parts);
        Ok(())
    }

    fn parse_month(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(month) = int_field::<i64>(dict, attributes::MONTH)? else {
            return Ok(());
        };
        let year = self.scratch.year();
        self.shift(|dt| calendar::add_months(dt, month - dt.month() as i64))?;
        if self.scratch.year() != year {
            self.input_date_was_invalid = true;
        }
        self.mark(DateTimeParts::MONTH);
        Ok(())
    }

    fn parse_day(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(day) = int_field::<i64>(dict, attributes::DAY)? else {
            return Ok(());
        };
        let normalization = self.context.normalization;
        let reference = self.context.reference_date_time;
        let include_current = self.context.include_current_time_in_past_or_future;

        if self.set_parts.contains(DateTimeParts::MONTH)
            || (self.infers() && normalization == Normalization::Present)
        {
            let month = self.scratch.month();
            self.shift(|dt| calendar::add_days(dt, day - dt.day() as i64))?;
            if self.scratch.month() != month {
                self.input_date_was_invalid = true;
            }
        } else if self.infers() {
            if normalization == Normalization::Past && day < reference.day() as i64 {
                self.shift(|dt| calendar::add_days(dt, day - dt.day() as i64))?;
            } else {
                self.probe_month_for_day(day, normalization, reference, include_current)?;
            }
            self.set_parts |= DateTimeParts::MONTH | DateTimeParts::YEAR;
        } else {
            self.shift(|dt| calendar::add_months(dt, 1 - dt.month() as i64))?;
            self.shift(|dt| calendar::add_days(dt, day - dt.day() as i64))?;
        }

        if !(1..=31).contains(&day) {
            self.input_date_was_invalid = true;
        }
        self.mark(DateTimeParts::DAY);
        Ok(())
    }

    /// Find the nearest month in the normalization direction that has `day`.
    fn probe_month_for_day(
        &mut self,
        day: i64,
        normalization: Normalization,
        reference: NaiveDateTime,
        include_current: bool,
    ) -> Result<()> {
        let overflow = || TimexError::OutOfRange(format!("day {day} from {reference}"));
        let mut probe = self.scratch;
        let reference_day = reference.day() as i64;

        if normalization == Normalization::Future
            && (day < reference_day || (!include_current && day == reference_day))
        {
            // Mid-month of the following month.
            probe = calendar::add_days(probe, 45 - probe.day() as i64).ok_or_else(overflow)?;
        }

        let mut start_month = probe.month();
        let mut attempts = DAY_PROBE_ATTEMPTS;
        loop {
            if normalization == Normalization::Past {
                let months_over = ((probe.month() + 12 - start_month) % 12) as i64;
                let back = months_over * 30 + 15 + probe.day() as i64;
                probe = calendar::add_days(probe, -back).ok_or_else(overflow)?;
            }
            start_month = probe.month();
            probe = calendar::add_days(probe, day - probe.day() as i64).ok_or_else(overflow)?;
            attempts -= 1;
            if probe.month() == start_month || attempts == 0 {
                break;
            }
        }

        if probe.month() != start_month {
            self.input_date_was_invalid = true;
        }
        self.scratch = probe;
        Ok(())
    }

    fn parse_hour(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(hour) = int_field::<i64>(dict, attributes::HOUR)? else {
            return Ok(());
        };
        let day = self.scratch.day();
        self.shift(|dt| calendar::add_hours(dt, hour - dt.hour() as i64))?;
        if self.scratch.day() != day {
            self.input_date_was_invalid = true;
        }
        self.mark(DateTimeParts::HOUR);
        Ok(())
    }

    fn parse_minute(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(minute) = int_field::<i64>(dict, attributes::MINUTE)? else {
            return Ok(());
        };
        let hour = self.scratch.hour();
        self.shift(|dt| calendar::add_minutes(dt, minute - dt.minute() as i64))?;
        if self.scratch.hour() != hour {
            self.input_date_was_invalid = true;
        }
        self.mark(DateTimeParts::MINUTE);
        Ok(())
    }

    fn parse_second(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(second) = int_field::<i64>(dict, attributes::SECOND)? else {
            return Ok(());
        };
        let minute = self.scratch.minute();
        self.shift(|dt| calendar::add_seconds(dt, second - dt.second() as i64))?;
        if self.scratch.minute() != minute {
            self.input_date_was_invalid = true;
        }
        self.mark(DateTimeParts::SECOND);
        Ok(())
    }

    fn parse_min_offset(&mut self, dict: &TimexDictionary) -> Result<()> {
        if let Some(min_offset) = int_field::<i32>(dict, attributes::MIN_OFFSET)? {
            self.min_offset = min_offset;
        }
        Ok(())
    }

    fn parse_week(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(week) = int_field::<i64>(dict, attributes::WEEK)? else {
            return Ok(());
        };
        let year = self.scratch.year();
        let iso_week = calendar::iso_week(&self.scratch);
        let week_year = calendar::week_year_of(year, self.scratch.month(), iso_week);
        if week_year != year
            && !self
                .set_parts
                .intersects(DateTimeParts::DAY | DateTimeParts::MONTH)
        {
            // Move away from the year boundary so week arithmetic stays in `year`.
            let months = if week_year < year { 6 } else { -6 };
            self.shift(|dt| calendar::add_months(dt, months))?;
        }
        self.shift(|dt| calendar::add_days(dt, (week - calendar::iso_week(&dt)) * 7))?;
        self.mark(DateTimeParts::WEEK);
        Ok(())
    }

    fn parse_weekday(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(raw) = attributes::value(dict, attributes::WEEKDAY) else {
            return Ok(());
        };
        let weekday: i64 = raw
            .trim()
            .parse()
            .ok()
            .filter(|wd| (1..=7).contains(wd))
            .ok_or_else(|| TimexError::malformed(attributes::WEEKDAY, raw))?;

        if !dict.contains_key(attributes::WEEK) {
            let reference = self.context.reference_date_time.date();
            let normalization = self.context.normalization;
            let logic = self.context.weekday_logic;
            let min_offset = self.min_offset as i64;
            self.scratch = calendar::with_date(self.scratch, reference);
            self.shift(|dt| {
                calendar::apply_day_of_week_offset(dt, weekday, 0, normalization, logic, min_offset)
            })?;
        } else {
            self.shift(|dt| calendar::add_days(dt, weekday - calendar::iso_weekday(&dt)))?;
        }

        if self.infers() {
            self.set_parts |= DateTimeParts::YEAR | DateTimeParts::MONTH | DateTimeParts::DAY;
        }
        self.mark(DateTimeParts::WEEKDAY);
        Ok(())
    }

    fn parse_part_of_day(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(part_of_day) = enum_field::<PartOfDay>(dict, attributes::PART_OF_DAY)? else {
            return Ok(());
        };
        let clock_parts = DateTimeParts::HOUR
            | DateTimeParts::MINUTE
            | DateTimeParts::SECOND
            | DateTimeParts::AM_PM_UNAMBIGUOUS;

        if !self.set_parts.contains(DateTimeParts::HOUR) {
            let exact = match part_of_day {
                PartOfDay::Midnight => Some((23, 59, 59)),
                PartOfDay::Noon => Some((12, 0, 0)),
                _ => None,
            };
            if let Some((h, m, s)) = exact {
                self.scratch = self
                    .scratch
                    .with_hour(h)
                    .and_then(|dt| dt.with_minute(m))
                    .and_then(|dt| dt.with_second(s))
                    .unwrap_or(self.scratch);
                self.set_parts |= clock_parts;
            }
        }
        if !self.set_parts.contains(DateTimeParts::HOUR) {
            if let Some(dt) = self.scratch.with_hour(part_of_day.approximate_hour()) {
                self.scratch = dt;
            }
        }

        self.part_of_day = Some(part_of_day);
        self.mark(DateTimeParts::PART_OF_DAY);
        Ok(())
    }

    fn parse_time_zone(&mut self, dict: &TimexDictionary) {
        if let Some(zone) = dict.get(attributes::TIME_ZONE) {
            self.time_zone = Some(zone.clone());
            self.mark(DateTimeParts::TIME_ZONE);
        }
    }

    // ── modifiers and offsets ───────────────────────────────────────────

    fn parse_modifier(&mut self, dict: &TimexDictionary) -> Result<()> {
        if let Some(modifier) = enum_field::<Modifier>(dict, attributes::MOD)? {
            self.modifier = Some(modifier);
        }
        Ok(())
    }

    fn parse_offset(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(unit) = enum_field::<TemporalUnit>(dict, attributes::OFFSET_UNIT)? else {
            return Ok(());
        };

        if let Some(offset) = int_field::<i32>(dict, attributes::OFFSET)? {
            let has_clock_time = [attributes::HOUR, attributes::MINUTE, attributes::SECOND]
                .iter()
                .any(|key| dict.contains_key(*key));
            if matches!(unit, TemporalUnit::Week | TemporalUnit::Weekend) && has_clock_time {
                return Err(TimexError::UnsupportedType(format!(
                    "{unit} offset combined with a clock time"
                )));
            }
            if unit == TemporalUnit::Week && self.set_parts.contains(DateTimeParts::WEEKDAY) {
                let reference_week = calendar::iso_week(&self.context.reference_date_time);
                self.shift(|dt| calendar::add_days(dt, (reference_week - calendar::iso_week(&dt)) * 7))?;
            }
            self.offset = Some(offset);
        } else {
            self.offset = Some(self.context.vague_offset(unit));
            self.modifier = Some(Modifier::Approximately);
        }
        self.offset_unit = Some(unit);

        if let Some(anchor) = attributes::value(dict, attributes::OFFSET_ANCHOR) {
            self.offset_anchor = Some(anchor.to_string());
            self.mark(DateTimeParts::OFFSET_ANCHOR);
        }
        if let Ok(Some(compound)) = int_field::<i32>(dict, attributes::COMPOUND_OFFSET) {
            self.compound_offset = compound;
        }
        Ok(())
    }

    fn parse_reference(&mut self, dict: &TimexDictionary) -> Result<()> {
        if let Some(reference) = enum_field::<DateTimeReference>(dict, attributes::REFERENCE)? {
            self.reference = Some(reference);
            self.mark(DateTimeParts::REFERENCE);
        }
        Ok(())
    }

    fn parse_season(&mut self, dict: &TimexDictionary) -> Result<()> {
        if let Some(season) = enum_field::<Season>(dict, attributes::SEASON)? {
            self.season = Some(season);
            self.mark(DateTimeParts::SEASON);
        }
        Ok(())
    }

    fn parse_part_of_year(&mut self, dict: &TimexDictionary) -> Result<()> {
        if let Some(part) = enum_field::<PartOfYear>(dict, attributes::PART_OF_YEAR)? {
            self.part_of_year = Some(part);
            self.mark(DateTimeParts::PART_OF_YEAR);
        }
        Ok(())
    }

    // ── durations and recurrences ───────────────────────────────────────

    fn parse_duration(&mut self, dict: &TimexDictionary) -> Result<()> {
        if let Some(seconds) = int_field::<i64>(dict, attributes::RAW_DURATION)? {
            self.duration = DurationValue::from_seconds(seconds);
        } else if let Some(raw) = attributes::value(dict, attributes::DURATION) {
            // "X" and other placeholders mean an unknown count.
            let count = raw.trim().parse::<i64>().unwrap_or(0);
            let unit = enum_field::<TemporalUnit>(dict, attributes::DURATION_UNIT)?;
            self.duration = DurationValue::new(count, unit);
        } else if let Some(unit) = enum_field::<TemporalUnit>(dict, attributes::DURATION_UNIT)? {
            self.duration = DurationValue::new(0, Some(unit));
        }

        if self.temporal_type == TemporalType::Set && self.duration.is_set() {
            // Older grammars expressed "every 2 weeks" as a duration on a set.
            let (count, unit) = self.duration.simple_value();
            self.frequency = Some(count);
            self.frequency_unit = unit;
            self.duration = DurationValue::default();
        }
        Ok(())
    }

    fn parse_quantity(&mut self, dict: &TimexDictionary) -> Result<()> {
        if self.temporal_type == TemporalType::Set {
            self.quantity = Some(1);
        }
        let Some(raw) = attributes::value(dict, attributes::QUANTITY) else {
            return Ok(());
        };
        match raw.trim().parse::<i32>() {
            Ok(quantity) => self.quantity = Some(quantity),
            Err(_) if raw.eq_ignore_ascii_case("EACH") || raw.eq_ignore_ascii_case("EVERY") => {}
            Err(_) => return Err(TimexError::malformed(attributes::QUANTITY, raw)),
        }
        Ok(())
    }

    fn parse_frequency(&mut self, dict: &TimexDictionary) -> Result<()> {
        let Some(raw) = attributes::value(dict, attributes::FREQUENCY) else {
            return Ok(());
        };
        if attributes::value(dict, attributes::FREQUENCY_UNIT).is_some() {
            let count = int_field::<i32>(dict, attributes::FREQUENCY)?;
            let unit = enum_field::<TemporalUnit>(dict, attributes::FREQUENCY_UNIT)?;
            self.frequency = count;
            self.frequency_unit = unit;
            return Ok(());
        }

        let captures = FREQUENCY_RE
            .captures(raw)
            .ok_or_else(|| TimexError::malformed(attributes::FREQUENCY, raw))?;
        let count = captures[1]
            .parse::<i32>()
            .map_err(|_| TimexError::malformed(attributes::FREQUENCY, raw))?;
        self.frequency = Some(count);
        if let Some(unit) = captures.get(2).and_then(|m| TemporalUnit::parse(m.as_str().trim())) {
            self.frequency_unit = Some(unit);
        }
        Ok(())
    }

    fn parse_week_of(&mut self, dict: &TimexDictionary) {
        if attributes::value(dict, attributes::WEEK_OF).is_some() {
            self.mark(DateTimeParts::WEEK_OF_EXPRESSION);
        }
    }

    fn parse_range_hint(&mut self, dict: &TimexDictionary) {
        if attributes::value(dict, attributes::RANGE_HINT).is_some() {
            self.valid_for_ranges = false;
        }
    }

    // ── inference ───────────────────────────────────────────────────────

    /// Decide whether an hour without am/pm means the morning or the evening.
    fn infer_am_pm(&mut self, dict: &TimexDictionary) -> Result<()> {
        if self.set_parts.contains(DateTimeParts::AM_PM_UNAMBIGUOUS)
            || attributes::value(dict, attributes::HOUR).is_none()
        {
            return Ok(());
        }
        let hour = self.scratch.hour();
        if !dict.contains_key(attributes::AM_PM) || hour > 12 {
            self.mark(DateTimeParts::AM_PM_UNAMBIGUOUS);
            return Ok(());
        }
        if !self.infers() {
            return Ok(());
        }

        let reference = self.context.reference_date_time;
        let cutoff = self.context.am_pm_inference_cutoff;
        let zero_day_offset = self.offset_unit == Some(TemporalUnit::Day) && self.offset == Some(0);
        let positive_offset = self.offset_unit.is_some() && self.offset != Some(0);
        let fixed_day = self
            .set_parts
            .intersects(DateTimeParts::DAY | DateTimeParts::WEEKDAY)
            || dict.contains_key(attributes::OFFSET);
        let today = !positive_offset
            && (zero_day_offset || !fixed_day || self.scratch.ordinal() == reference.ordinal());
        let current = calendar::minute_of_day(&self.scratch);
        let now = calendar::minute_of_day(&reference);

        let shift_hours: i64 = if let Some(part_of_day) = self.part_of_day {
            let distance = |a: i64| {
                let d = (part_of_day.approximate_hour() as i64 - a).abs();
                if d > 12 { 24 - d } else { d }
            };
            self.set_parts |= DateTimeParts::AM_PM_UNAMBIGUOUS;
            tracing::debug!(?part_of_day, hour, "inferring am/pm from part of day");
            if distance(hour as i64) > distance(hour as i64 + 12) { 12 } else { 0 }
        } else {
            match self.context.normalization {
                Normalization::Future if today => {
                    if current + HALF_DAY_MINUTES <= now {
                        if hour < cutoff { 12 } else { 0 }
                    } else if current <= now {
                        12
                    } else if hour == 12 && reference.hour() == 0 && current >= now {
                        -12
                    } else {
                        0
                    }
                }
                Normalization::Past if today => {
                    if current + HALF_DAY_MINUTES <= now || (current >= now && !fixed_day) {
                        12
                    } else {
                        0
                    }
                }
                _ => {
                    if hour < cutoff { 12 } else { 0 }
                }
            }
        };

        tracing::debug!(hour, shift_hours, today, "am/pm inference");
        if shift_hours != 0 {
            self.shift(|dt| calendar::add_hours(dt, shift_hours))?;
        }
        Ok(())
    }

    /// Move the scratch instant onto the date an offset is anchored to.
    fn resolve_offset_anchor(&mut self) -> Result<()> {
        if !self.set_parts.contains(DateTimeParts::OFFSET_ANCHOR) {
            return Ok(());
        }
        let Some(anchor) = self.offset_anchor.clone().filter(|a| !a.is_empty()) else {
            return Ok(());
        };
        let date_parts = DateTimeParts::YEAR | DateTimeParts::MONTH | DateTimeParts::DAY;
        let segments: Vec<&str> = anchor.split('-').collect();
        let leading_number = segments.first().and_then(|s| s.trim().parse::<i64>().ok());

        if anchor == attributes::TODAY_ANCHOR {
            self.scratch = calendar::with_date(self.scratch, self.context.reference_date_time.date());
            self.set_parts |= date_parts;
            return Ok(());
        }

        if leading_number.is_none() {
            let day_offset = match self.offset_unit {
                Some(TemporalUnit::Day) => self.offset.unwrap_or(0),
                _ => 0,
            };
            let year_known = self.set_parts.contains(DateTimeParts::YEAR);
            let resolved = self.context.holiday_resolver.as_ref().and_then(|resolver| {
                resolver.resolve(&anchor, self.scratch, &self.context, year_known, day_offset)
            });
            match resolved {
                Some(date) => {
                    self.scratch = calendar::with_date(self.scratch, date);
                    self.set_parts |= date_parts;
                }
                None => {
                    tracing::debug!(%anchor, "unresolved holiday anchor");
                    self.input_date_was_invalid = true;
                }
            }
            return Ok(());
        }

        if let Some(month) = leading_number {
            self.shift(|dt| calendar::add_months(dt, month - dt.month() as i64))?;
            self.set_parts |= DateTimeParts::MONTH;
        }
        if let Some(day) = segments.get(1).and_then(|s| s.trim().parse::<i64>().ok()) {
            self.shift(|dt| calendar::add_days(dt, day - dt.day() as i64))?;
            self.set_parts |= DateTimeParts::DAY;
        }
        if self.compound_offset != 0 {
            self.context.use_inference = true;
        }

        if !self.set_parts.contains(DateTimeParts::YEAR) && segments.len() > 1 {
            let reference = self.context.reference_date_time;
            self.shift(|dt| calendar::add_years(dt, (reference.year() - dt.year()) as i64))?;

            let mut probe = self.scratch;
            if let Some(weekday) = self.offset_unit.and_then(TemporalUnit::iso_weekday) {
                probe = calendar::apply_day_of_week_offset(
                    probe,
                    weekday as i64,
                    self.offset.unwrap_or(0) as i64,
                    self.context.normalization,
                    WeekdayLogic::Programmatic,
                    0,
                )
                .unwrap_or(probe);
            }
            probe = calendar::add_days(probe, self.compound_offset as i64).unwrap_or(probe);

            match self.context.normalization {
                Normalization::Past if reference < probe => {
                    self.shift(|dt| calendar::add_years(dt, -1))?;
                }
                Normalization::Future if reference > probe => {
                    self.shift(|dt| calendar::add_years(dt, 1))?;
                }
                _ => {}
            }
            if self.context.use_inference {
                self.set_parts |= DateTimeParts::YEAR;
            }
        }
        Ok(())
    }

    /// Give "early morning" or "late evening" a concrete clock time.
    fn apply_part_of_day_default_times(&mut self) -> Result<()> {
        let Some(part_of_day) = self.part_of_day else {
            return Ok(());
        };
        if self.explicit_set_parts.contains(DateTimeParts::HOUR) {
            return Ok(());
        }
        let Some(range) = self.context.part_of_day_default_times.get(&part_of_day).copied() else {
            return Ok(());
        };
        let (hour, minute, second) = match self.modifier {
            Some(Modifier::Start) => (range.start.hour(), range.start.minute(), range.start.second()),
            Some(Modifier::Mid) => ((range.start.hour() + range.end.hour()) / 2, 0, 0),
            Some(Modifier::End) => (range.end.hour(), range.end.minute(), range.end.second()),
            _ => return Ok(()),
        };
        let (hour, minute, second) = (hour.to_string(), minute.to_string(), second.to_string());
        let clock = attributes::dictionary([
            (attributes::HOUR, hour.as_str()),
            (attributes::MINUTE, minute.as_str()),
            (attributes::SECOND, second.as_str()),
        ]);
        self.parse_hour(&clock)?;
        self.parse_minute(&clock)?;
        self.parse_second(&clock)
    }
}
