//! Rendering resolved values as timex strings.

use chrono::{Datelike, NaiveDateTime, Timelike};

use super::ExtendedDateTime;
use crate::attributes;
use crate::calendar;
use crate::parts::{
    DateTimeParts, Normalization, PartOfDay, TemporalType, TemporalUnit, WeekdayLogic,
};

/// How a value is turned into its timex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStrategy {
    /// `XXXX-WXX-2`, `XXXX-XX-XXT09`
    Recurrence,
    /// `P3D`, `PT2H30M`
    Duration,
    /// An offset from the reference instant, rendered as an absolute date.
    Offset,
    /// Unset fields come from the reference instant when `inference` is true,
    /// and print as `X` placeholders otherwise.
    Absolute { inference: bool },
}

fn d4(year: i32) -> String {
    format!("{year:04}")
}

fn ymd(dt: &NaiveDateTime) -> String {
    calendar::format_date(&dt.date())
}

fn ym(dt: &NaiveDateTime) -> String {
    format!("{:04}-{:02}", dt.year(), dt.month())
}

impl ExtendedDateTime {
    pub fn format_strategy(&self) -> FormatStrategy {
        if self.temporal_type == TemporalType::Set {
            FormatStrategy::Recurrence
        } else if self.duration.is_set() {
            FormatStrategy::Duration
        } else if self.offset.is_some() && self.offset_unit.is_some() {
            FormatStrategy::Offset
        } else {
            FormatStrategy::Absolute {
                inference: self.context.use_inference,
            }
        }
    }

    /// The timex value string. Computed once and cached.
    pub fn format_value(&self) -> &str {
        self.formatted.get_or_init(|| self.render())
    }

    pub fn format_type(&self) -> &'static str {
        self.temporal_type.as_str()
    }

    pub fn format_mod(&self) -> Option<&'static str> {
        self.modifier.map(|m| m.as_str())
    }

    /// `3day`, `1week`. Weekend and weekday frequencies count weeks.
    pub fn format_frequency(&self) -> Option<String> {
        let frequency = self.frequency?;
        let unit = match self.frequency_unit {
            Some(TemporalUnit::Weekend | TemporalUnit::Weekdays) => TemporalUnit::Week.as_str(),
            Some(unit) => unit.as_str(),
            None => "",
        };
        Some(format!("{frequency}{unit}"))
    }

    pub fn format_quantity(&self) -> Option<String> {
        self.quantity.map(|q| q.to_string())
    }

    /// Space-separated annotations: `weekof`, `ampm`, `relative`.
    pub fn format_comment(&self) -> String {
        let mut notes = Vec::new();
        let parts = self.set_parts;

        if parts.contains(DateTimeParts::WEEK_OF_EXPRESSION) {
            notes.push("weekof");
        }
        if (!self.context.use_inference || self.temporal_type == TemporalType::Set)
            && parts.contains(DateTimeParts::HOUR)
            && !parts.contains(DateTimeParts::AM_PM_UNAMBIGUOUS)
        {
            notes.push("ampm");
        }
        let anchored_today = parts.contains(DateTimeParts::OFFSET_ANCHOR)
            && self.offset_anchor.as_deref() == Some(attributes::TODAY_ANCHOR);
        if self.temporal_type == TemporalType::Time
            && self.offset.is_some_and(|o| o != 0)
            && self.offset_unit.is_some_and(|u| !u.is_weekday())
            && (parts.is_empty() || anchored_today)
        {
            notes.push("relative");
        }
        notes.join(" ")
    }

    fn render(&self) -> String {
        let strategy = self.format_strategy();
        let value = match strategy {
            FormatStrategy::Recurrence => self.format_placeholders(true),
            FormatStrategy::Duration => self.duration.format_value(),
            FormatStrategy::Offset => self.format_offset(),
            FormatStrategy::Absolute { inference: true } => self.format_inferred(),
            FormatStrategy::Absolute { inference: false } => self.format_placeholders(false),
        };
        tracing::trace!(?strategy, %value, "formatted timex value");
        value
    }

    // ── shared pieces ───────────────────────────────────────────────────

    /// The year as printed: full, or with `X` for decade-like precision.
    fn year_string(&self) -> Option<String> {
        let year = d4(self.scratch.year());
        let parts = self.set_parts;
        if parts.contains(DateTimeParts::YEAR) {
            Some(year)
        } else if parts.contains(DateTimeParts::DECADE) {
            Some(format!("{}X", &year[..3]))
        } else if parts.contains(DateTimeParts::CENTURY) {
            Some(format!("{}XX", &year[..2]))
        } else if parts.contains(DateTimeParts::MILLENNIUM) {
            Some(format!("{}XXX", &year[..1]))
        } else if parts.contains(DateTimeParts::DECADE_YEAR) {
            Some(format!("XX{}", &year[year.len() - 2..]))
        } else {
            None
        }
    }

    fn two_digits(&self, part: DateTimeParts, read: impl Fn(&NaiveDateTime) -> u32) -> Option<String> {
        self.set_parts
            .contains(part)
            .then(|| format!("{:02}", read(&self.scratch)))
    }

    fn is_exact_part_of_day(&self) -> bool {
        matches!(self.part_of_day, Some(PartOfDay::Noon | PartOfDay::Midnight))
    }

    /// `T15`, `T15:30`, `T15:30:00`, `TNO`, plus the time zone if any.
    fn time_part(&self, hour: &str, minute: &str, second: &str) -> String {
        let parts = self.set_parts;
        // Recurrences at clock granularity print the clock even when unset.
        let recurring = match self.temporal_type {
            TemporalType::Set => self.frequency_unit,
            _ => None,
        };
        let by = |part: DateTimeParts, unit: TemporalUnit| parts.contains(part) || recurring == Some(unit);
        let mut out = match self.part_of_day {
            Some(pod) if self.is_exact_part_of_day() => format!("T{pod}"),
            _ if by(DateTimeParts::SECOND, TemporalUnit::Second) => format!("T{hour}:{minute}:{second}"),
            _ if by(DateTimeParts::MINUTE, TemporalUnit::Minute) => format!("T{hour}:{minute}"),
            _ if by(DateTimeParts::HOUR, TemporalUnit::Hour) => format!("T{hour}"),
            Some(pod) => format!("T{pod}"),
            None => String::new(),
        };
        if parts.contains(DateTimeParts::TIME_ZONE) {
            if let Some(zone) = &self.time_zone {
                out.push_str(zone);
            }
        }
        out
    }

    /// The scratch clock time at the finest granularity that was set.
    fn scratch_clock(&self) -> String {
        let dt = &self.scratch;
        if self.set_parts.contains(DateTimeParts::SECOND) {
            format!("T{:02}:{:02}:{:02}", dt.hour(), dt.minute(), dt.second())
        } else if self.set_parts.contains(DateTimeParts::MINUTE) {
            format!("T{:02}:{:02}", dt.hour(), dt.minute())
        } else {
            format!("T{:02}", dt.hour())
        }
    }

    // ── absolute, with inference ────────────────────────────────────────

    /// The reference instant moved to the nearest period in which the set
    /// fields fall in the normalization direction.
    pub(crate) fn adjusted_reference(&self) -> NaiveDateTime {
        let reference = self.context.reference_date_time;
        let normalization = self.context.normalization;
        if normalization == Normalization::Present {
            return reference;
        }
        let future = normalization == Normalization::Future;
        let include_current = self.context.include_current_time_in_past_or_future;
        let cmp = self.piecewise_compare(&reference, DateTimeParts::all());
        let at_or_beyond = if future { cmp >= 0 } else { cmp <= 0 };
        let beyond = if future {
            cmp > 0 || (!include_current && cmp == 0)
        } else {
            cmp < 0 || (!include_current && cmp == 0)
        };
        let sign = if future { 1 } else { -1 };

        let p = self.set_parts;
        let has = |part| p.contains(part);
        let day_fixed = p.intersects(DateTimeParts::DAY | DateTimeParts::WEEKDAY);
        type Step = fn(NaiveDateTime, i64) -> Option<NaiveDateTime>;
        let rules: [(bool, bool, Step, i64); 8] = [
            (has(DateTimeParts::SECOND) && !has(DateTimeParts::MINUTE), at_or_beyond, calendar::add_minutes, 1),
            (has(DateTimeParts::MINUTE) && !has(DateTimeParts::HOUR), at_or_beyond, calendar::add_hours, 1),
            (has(DateTimeParts::HOUR) && !day_fixed, at_or_beyond, calendar::add_days, 1),
            (has(DateTimeParts::PART_OF_DAY) && !day_fixed, beyond, calendar::add_days, 1),
            (has(DateTimeParts::DAY) && !has(DateTimeParts::MONTH), beyond, calendar::add_months, 1),
            (has(DateTimeParts::WEEKDAY) && !has(DateTimeParts::DAY), beyond, calendar::add_days, 7),
            (has(DateTimeParts::WEEK) && !has(DateTimeParts::YEAR), at_or_beyond, calendar::add_years, 1),
            (has(DateTimeParts::MONTH) && !has(DateTimeParts::YEAR), beyond, calendar::add_years, 1),
        ];

        for (applies, shift, step, amount) in rules {
            if applies {
                return if shift {
                    step(reference, sign * amount).unwrap_or(reference)
                } else {
                    reference
                };
            }
        }
        reference
    }

    fn format_inferred(&self) -> String {
        let adjusted = self.adjusted_reference();
        let parts = self.set_parts;
        let pick = |part: DateTimeParts| if parts.contains(part) { &self.scratch } else { &adjusted };

        let year = self.year_string().unwrap_or_else(|| d4(adjusted.year()));
        let month = format!("{:02}", pick(DateTimeParts::MONTH).month());
        let day = format!("{:02}", pick(DateTimeParts::DAY).day());
        let week = calendar::iso_week(pick(DateTimeParts::WEEK));
        let weekday = calendar::iso_weekday(pick(DateTimeParts::WEEKDAY));

        let (week_year_num, week_year) =
            if parts.contains(DateTimeParts::YEAR) && parts.contains(DateTimeParts::MONTH) {
                let wy = calendar::week_year_of(self.scratch.year(), self.scratch.month(), week);
                (wy, d4(wy))
            } else {
                (adjusted.year(), year.clone())
            };

        let date = if parts.contains(DateTimeParts::DAY) {
            format!("{year}-{month}-{day}")
        } else if parts.contains(DateTimeParts::MONTH) {
            format!("{year}-{month}")
        } else if parts.contains(DateTimeParts::WEEKDAY) {
            calendar::week_date_to_standard(week_year_num, week, weekday)
                .map(|d| calendar::format_date(&d))
                .unwrap_or_else(|| format!("{week_year}-W{week:02}-{weekday}"))
        } else if parts.contains(DateTimeParts::WEEK) {
            format!("{week_year}-W{week:02}")
        } else if let (true, Some(poy)) = (parts.contains(DateTimeParts::PART_OF_YEAR), self.part_of_year) {
            format!("{year}-{poy}")
        } else if let (true, Some(season)) = (parts.contains(DateTimeParts::SEASON), self.season) {
            format!("{year}-{season}")
        } else if parts.intersects(DateTimeParts::ANY_YEAR) {
            year
        } else if let (true, Some(reference)) = (parts.contains(DateTimeParts::REFERENCE), self.reference) {
            return reference.to_string();
        } else {
            format!("{year}-{month}-{day}")
        };

        let clock = |part: DateTimeParts, read: fn(&NaiveDateTime) -> u32| format!("{:02}", read(pick(part)));
        let hour = clock(DateTimeParts::HOUR, |dt| dt.hour());
        let minute = clock(DateTimeParts::MINUTE, |dt| dt.minute());
        let second = clock(DateTimeParts::SECOND, |dt| dt.second());
        date + &self.time_part(&hour, &minute, &second)
    }

    // ── placeholders ────────────────────────────────────────────────────

    /// `XXXX-03`, `XXXX-WXX-2`, `T17:30`. Recurrences also print their own
    /// unit and fall back to `XXXX-XX-XX`.
    fn format_placeholders(&self, recurrence: bool) -> String {
        let parts = self.set_parts;
        let xx = || "XX".to_string();
        let year = self.year_string().unwrap_or_else(|| "XXXX".to_string());
        let month = self.two_digits(DateTimeParts::MONTH, |dt| dt.month()).unwrap_or_else(xx);
        let day = self.two_digits(DateTimeParts::DAY, |dt| dt.day()).unwrap_or_else(xx);
        let hour = self.two_digits(DateTimeParts::HOUR, |dt| dt.hour()).unwrap_or_else(xx);
        let minute = self.two_digits(DateTimeParts::MINUTE, |dt| dt.minute()).unwrap_or_else(xx);
        let second = self.two_digits(DateTimeParts::SECOND, |dt| dt.second()).unwrap_or_else(xx);
        let week = self
            .two_digits(DateTimeParts::WEEK, |dt| dt.iso_week().week())
            .unwrap_or_else(xx);
        let weekday = if parts.contains(DateTimeParts::WEEKDAY) {
            calendar::iso_weekday(&self.scratch).to_string()
        } else {
            "X".to_string()
        };
        let week_and_year = parts.contains(DateTimeParts::WEEK) && parts.contains(DateTimeParts::YEAR);
        let week_year = if week_and_year {
            d4(calendar::iso_week_year(&self.scratch))
        } else {
            year.clone()
        };

        let unit = self.frequency_unit.or_else(|| {
            if recurrence {
                None
            } else {
                self.duration.unit()
            }
        });
        let (y, m, d, w) = if recurrence {
            (year.as_str(), month.as_str(), day.as_str(), week.as_str())
        } else {
            ("XXXX", "XX", "XX", "XX")
        };

        let by_unit = match unit {
            Some(TemporalUnit::Day) => Some(format!("{y}-{m}-{d}")),
            Some(TemporalUnit::Month) if parts.contains(DateTimeParts::DAY) => Some(format!("{y}-{m}-{d}")),
            Some(TemporalUnit::Month) => Some(format!("{y}-{m}")),
            Some(TemporalUnit::Year) => Some(if parts.contains(DateTimeParts::MONTH) {
                if parts.contains(DateTimeParts::DAY) {
                    format!("{y}-{month}-{day}")
                } else {
                    format!("{y}-{month}")
                }
            } else if let Some(season) = self.season {
                format!("{y}-{season}")
            } else {
                y.to_string()
            }),
            Some(TemporalUnit::Week) if parts.contains(DateTimeParts::WEEKDAY) => {
                Some(format!("{y}-W{w}-{weekday}"))
            }
            Some(TemporalUnit::Week) => Some(format!("{y}-W{w}")),
            Some(TemporalUnit::Weekend) => Some(format!("{y}-W{w}-WE")),
            Some(TemporalUnit::Weekdays) => Some(format!("{y}-W{w}-WD")),
            _ => None,
        };

        let date = by_unit.unwrap_or_else(|| {
            if let (true, Some(poy)) = (parts.contains(DateTimeParts::PART_OF_YEAR), self.part_of_year) {
                format!("{year}-{poy}")
            } else if let (true, Some(season)) = (parts.contains(DateTimeParts::SEASON), self.season) {
                format!("{year}-{season}")
            } else if parts.intersects(DateTimeParts::WEEK | DateTimeParts::WEEKDAY) {
                let standard = (week_and_year && parts.contains(DateTimeParts::WEEKDAY))
                    .then(|| {
                        calendar::week_date_to_standard(
                            calendar::iso_week_year(&self.scratch),
                            calendar::iso_week(&self.scratch),
                            calendar::iso_weekday(&self.scratch),
                        )
                    })
                    .flatten();
                match standard {
                    Some(date) => calendar::format_date(&date),
                    None if week_and_year => format!("{week_year}-W{week}"),
                    None => format!("{week_year}-W{week}-{weekday}"),
                }
            } else if let (true, Some(reference)) = (parts.contains(DateTimeParts::REFERENCE), self.reference) {
                reference.to_string()
            } else if parts.contains(DateTimeParts::DAY) {
                format!("{year}-{month}-{day}")
            } else if parts.contains(DateTimeParts::MONTH) {
                format!("{year}-{month}")
            } else if parts.intersects(DateTimeParts::ANY_YEAR) {
                year.clone()
            } else if recurrence {
                "XXXX-XX-XX".to_string()
            } else {
                String::new()
            }
        });

        date + &self.time_part(&hour, &minute, &second)
    }

    // ── offsets ─────────────────────────────────────────────────────────

    fn format_offset(&self) -> String {
        let (Some(offset), Some(unit)) = (self.offset, self.offset_unit) else {
            return String::new();
        };
        let reference = self.context.reference_date_time;
        let parts = self.set_parts;
        let inference = self.context.use_inference;
        let normalization = self.context.normalization;
        let compound = self.compound_offset as i64;

        // Explicit fields override the reference.
        let mut base = reference;
        if parts.contains(DateTimeParts::YEAR) {
            base = calendar::add_years(base, (self.scratch.year() - base.year()) as i64).unwrap_or(base);
        }
        if parts.contains(DateTimeParts::MONTH) {
            base = calendar::add_months(base, self.scratch.month() as i64 - base.month() as i64)
                .unwrap_or(base);
        } else if parts.contains(DateTimeParts::WEEK) {
            let weeks = calendar::iso_week(&self.scratch) - calendar::iso_week(&base);
            base = calendar::add_days(base, weeks * 7).unwrap_or(base);
        }
        if parts.contains(DateTimeParts::DAY) {
            base = calendar::add_days(base, self.scratch.day() as i64 - base.day() as i64).unwrap_or(base);
        } else if parts.contains(DateTimeParts::WEEKDAY) {
            let days = calendar::iso_weekday(&self.scratch) - calendar::iso_weekday(&base);
            base = calendar::add_days(base, days).unwrap_or(base);
        }

        let (amount, unit) = match unit {
            TemporalUnit::Decade => (offset as i64 * 10, TemporalUnit::Year),
            TemporalUnit::Century => (offset as i64 * 100, TemporalUnit::Year),
            TemporalUnit::Quarter => (offset as i64 * 3, TemporalUnit::Month),
            TemporalUnit::Fortnight => (offset as i64 * 14, TemporalUnit::Day),
            other => (offset as i64, other),
        };
        let shifted = |step: fn(NaiveDateTime, i64) -> Option<NaiveDateTime>, n: i64| step(base, n).unwrap_or(base);

        let date = match unit {
            TemporalUnit::Year => {
                let dt = shifted(calendar::add_years, amount);
                let year = d4(dt.year());
                if parts.contains(DateTimeParts::DAY) {
                    ymd(&dt)
                } else if parts.contains(DateTimeParts::MONTH) {
                    ym(&dt)
                } else if let (true, Some(poy)) = (parts.contains(DateTimeParts::PART_OF_YEAR), self.part_of_year) {
                    format!("{year}-{poy}")
                } else if let (true, Some(season)) = (parts.contains(DateTimeParts::SEASON), self.season) {
                    format!("{year}-{season}")
                } else {
                    year
                }
            }
            TemporalUnit::Month => {
                let already = if inference {
                    (base.year() as i64 * 12 + base.month() as i64)
                        - (reference.year() as i64 * 12 + reference.month() as i64)
                } else {
                    0
                };
                let dt = shifted(calendar::add_months, amount - already);
                if parts.contains(DateTimeParts::DAY) {
                    ymd(&dt)
                } else {
                    ym(&dt)
                }
            }
            TemporalUnit::Week => self.format_week_offset(base, amount, compound),
            TemporalUnit::Weekend | TemporalUnit::Weekdays => {
                let dt = shifted(calendar::add_days, 7 * amount);
                let suffix = if unit == TemporalUnit::Weekend { "WE" } else { "WD" };
                format!("{:04}-W{:02}-{suffix}", calendar::iso_week_year(&dt), calendar::iso_week(&dt))
            }
            TemporalUnit::BusinessDay => ymd(&self.add_business_days(base, amount, normalization)),
            TemporalUnit::Hour => {
                let dt = shifted(calendar::add_hours, amount);
                return format!("{}T{:02}", ymd(&dt), dt.hour());
            }
            TemporalUnit::Minute => {
                let dt = shifted(calendar::add_minutes, amount);
                return format!("{}T{:02}:{:02}", ymd(&dt), dt.hour(), dt.minute());
            }
            TemporalUnit::Second => {
                let dt = shifted(calendar::add_seconds, amount);
                return format!("{}T{:02}:{:02}:{:02}", ymd(&dt), dt.hour(), dt.minute(), dt.second());
            }
            weekday if weekday.is_weekday() => {
                let dow = weekday.iso_weekday().unwrap_or(1) as i64;
                self.format_weekday_offset(base, amount, dow, compound)
            }
            _ => ymd(&shifted(calendar::add_days, amount + compound)),
        };

        let clock_parts = DateTimeParts::HOUR | DateTimeParts::MINUTE | DateTimeParts::SECOND;
        if parts.intersects(clock_parts) && !self.is_exact_part_of_day() {
            date + &self.scratch_clock()
        } else if let (true, Some(pod)) = (parts.contains(DateTimeParts::PART_OF_DAY), self.part_of_day) {
            format!("{date}T{pod}")
        } else {
            date
        }
    }

    /// "next week", "the second week of March", "a week from Tuesday".
    fn format_week_offset(&self, base: NaiveDateTime, amount: i64, compound: i64) -> String {
        let parts = self.set_parts;
        if parts.intersects(DateTimeParts::DAY | DateTimeParts::WEEKDAY) {
            let dt = calendar::add_days(base, 7 * amount + compound).unwrap_or(base);
            return ymd(&dt);
        }
        if parts.contains(DateTimeParts::MONTH) {
            let first = calendar::add_days(base, 1 - base.day() as i64).unwrap_or(base);
            let reference = self.context.reference_date_time;
            let inference = self.context.use_inference;
            let mut year = first.year();
            let weeks_out = |n: i64| calendar::add_days(first, n * 7).unwrap_or(first);
            if inference {
                match self.context.normalization {
                    Normalization::Past if weeks_out(amount - 2) > reference => year -= 1,
                    Normalization::Future if weeks_out(amount) < reference => year += 1,
                    _ => {}
                }
            }
            let year = if inference || parts.contains(DateTimeParts::YEAR) {
                d4(year)
            } else {
                "XXXX".to_string()
            };
            return format!("{year}-{:02}-W{amount:02}", first.month());
        }
        let dt = calendar::add_days(base, 7 * amount).unwrap_or(base);
        let week = calendar::iso_week(&dt);
        format!("{:04}-W{week:02}", calendar::week_year_of(dt.year(), dt.month(), week))
    }

    /// "next Friday", "the third Monday in May".
    fn format_weekday_offset(&self, dt: NaiveDateTime, amount: i64, dow: i64, compound: i64) -> String {
        let parts = self.set_parts;
        let normalization = self.context.normalization;
        let with_compound = |t: NaiveDateTime| calendar::add_days(t, compound).unwrap_or(t);

        if parts.contains(DateTimeParts::MONTH) && !parts.contains(DateTimeParts::YEAR) {
            if self.context.use_inference || amount < 0 {
                let reference = self.context.reference_date_time;
                let nth_in_month = |start: NaiveDateTime| {
                    let first = calendar::add_days(start, 1 - start.day() as i64).unwrap_or(start);
                    calendar::apply_day_of_week_offset(
                        first,
                        dow,
                        amount,
                        Normalization::Future,
                        WeekdayLogic::Programmatic,
                        0,
                    )
                    .unwrap_or(first)
                };
                let mut t = nth_in_month(dt);
                let year_shift = match normalization {
                    Normalization::Future if reference > t => 1,
                    Normalization::Past if reference < t => -1,
                    _ => 0,
                };
                if year_shift != 0 {
                    let moved = calendar::add_years(dt, year_shift).unwrap_or(dt);
                    t = nth_in_month(moved);
                }
                return ymd(&with_compound(t));
            }
            let t = calendar::apply_day_of_week_offset(
                dt,
                dow,
                amount,
                Normalization::Present,
                WeekdayLogic::Programmatic,
                0,
            )
            .unwrap_or(dt);
            let t = with_compound(t);
            return format!(
                "XXXX-{:02}-W{amount:02}-{}",
                self.scratch.month(),
                calendar::iso_weekday(&t)
            );
        }

        let logic = if parts.contains(DateTimeParts::OFFSET_ANCHOR) {
            WeekdayLogic::Programmatic
        } else {
            self.context.weekday_logic
        };
        let t = calendar::apply_day_of_week_offset(dt, dow, amount, normalization, logic, self.min_offset as i64)
            .unwrap_or(dt);
        ymd(&with_compound(t))
    }

    /// Step over `amount` working days, skipping the configured weekend.
    fn add_business_days(&self, base: NaiveDateTime, amount: i64, normalization: Normalization) -> NaiveDateTime {
        let weekend = self.context.week_definition.weekend_days();
        let (sign, steps) = if amount == 0 {
            let sign = if normalization == Normalization::Past { -1 } else { 1 };
            (sign, 1)
        } else {
            (amount.signum(), amount.abs())
        };

        let step = |dt: NaiveDateTime, days: i64| calendar::add_days(dt, days).unwrap_or(dt);
        let mut dt = base;
        for _ in 0..steps {
            if amount != 0 {
                dt = step(dt, sign);
            }
            if sign > 0 {
                for day in &weekend {
                    if calendar::iso_weekday(&dt) == *day as i64 {
                        dt = step(dt, 1);
                    }
                }
            } else {
                for day in weekend.iter().rev() {
                    if calendar::iso_weekday(&dt) == *day as i64 {
                        dt = step(dt, -1);
                    }
                }
            }
        }
        dt
    }
}
