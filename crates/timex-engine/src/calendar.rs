//! Calendar arithmetic shared by resolution and formatting.
//!
//! All helpers operate on [`NaiveDateTime`] and return `None` when a result
//! would leave chrono's representable range. Month and year arithmetic clamps
//! the day to the end of the target month (Jan 31 + 1 month = Feb 28/29).

use chrono::{Datelike, Days, Duration, Months, NaiveDate, NaiveDateTime, Timelike};

use crate::parts::{Normalization, WeekdayLogic};

const DAYS_IN_WEEK: i64 = 7;
const DAYS_IN_HALF_WEEK: i64 = 3;

/// ISO day number: Monday = 1 .. Sunday = 7.
pub fn iso_weekday(dt: &NaiveDateTime) -> i64 {
    dt.weekday().number_from_monday() as i64
}

/// ISO week number (1..=53).
pub fn iso_week(dt: &NaiveDateTime) -> i64 {
    dt.iso_week().week() as i64
}

/// The ISO week-numbering year the date belongs to.
pub fn iso_week_year(dt: &NaiveDateTime) -> i32 {
    dt.iso_week().year()
}

/// The ISO week year implied by a Gregorian year and month plus a week number.
///
/// Week 52/53 in January belongs to the previous year; week 1 in December
/// belongs to the next one.
pub fn week_year_of(year: i32, month: u32, week: i64) -> i32 {
    if month == 1 && week >= 52 {
        year - 1
    } else if month == 12 && week == 1 {
        year + 1
    } else {
        year
    }
}

pub fn add_days(dt: NaiveDateTime, days: i64) -> Option<NaiveDateTime> {
    if days >= 0 {
        dt.checked_add_days(Days::new(days as u64))
    } else {
        dt.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

pub fn add_months(dt: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        dt.checked_add_months(Months::new(magnitude))
    } else {
        dt.checked_sub_months(Months::new(magnitude))
    }
}

pub fn add_years(dt: NaiveDateTime, years: i64) -> Option<NaiveDateTime> {
    add_months(dt, years.checked_mul(12)?)
}

pub fn add_hours(dt: NaiveDateTime, hours: i64) -> Option<NaiveDateTime> {
    dt.checked_add_signed(Duration::try_hours(hours)?)
}

pub fn add_minutes(dt: NaiveDateTime, minutes: i64) -> Option<NaiveDateTime> {
    dt.checked_add_signed(Duration::try_minutes(minutes)?)
}

pub fn add_seconds(dt: NaiveDateTime, seconds: i64) -> Option<NaiveDateTime> {
    dt.checked_add_signed(Duration::try_seconds(seconds)?)
}

/// Keeps the time of day of `dt` but moves it onto `date`.
pub fn with_date(dt: NaiveDateTime, date: NaiveDate) -> NaiveDateTime {
    date.and_time(dt.time())
}

/// Minutes since midnight.
pub fn minute_of_day(dt: &NaiveDateTime) -> i64 {
    (dt.hour() * 60 + dt.minute()) as i64
}

/// Moves `dt` to the `offset`-th occurrence of the ISO weekday `target`.
///
/// An offset of zero selects the nearest occurrence (at most three days
/// away), then pushes it into the past or future according to
/// `normalization`. A nonzero offset first steps to the matching weekday in
/// the requested direction under `logic`, then jumps whole weeks. With
/// non-programmatic logic, a result within `min_offset` days of `dt` is
/// pushed one more week out.
pub fn apply_day_of_week_offset(
    dt: NaiveDateTime,
    target: i64,
    offset: i64,
    normalization: Normalization,
    logic: WeekdayLogic,
    min_offset: i64,
) -> Option<NaiveDateTime> {
    let sign = offset.signum();
    let magnitude = offset.abs();
    let current = iso_weekday(&dt);
    let mut days = target - current;

    if magnitude == 0 {
        if target - current > DAYS_IN_HALF_WEEK {
            days -= DAYS_IN_WEEK;
        } else if current - target > DAYS_IN_HALF_WEEK {
            days += DAYS_IN_WEEK;
        }

        if normalization == Normalization::Past && days >= 0 {
            days -= DAYS_IN_WEEK;
        }
        if normalization == Normalization::Future && days <= 0 {
            days += DAYS_IN_WEEK;
        }
        return add_days(dt, days);
    }

    if logic == WeekdayLogic::Programmatic {
        if sign > 0 && target < current {
            days += DAYS_IN_WEEK;
        } else if sign < 0 && target > current {
            days -= DAYS_IN_WEEK;
        }
    } else {
        if sign > 0 && target <= current {
            days += DAYS_IN_WEEK;
        } else if sign < 0 && target >= current {
            days -= DAYS_IN_WEEK;
        }

        if logic == WeekdayLogic::WeekBoundary {
            if sign > 0 && days <= DAYS_IN_WEEK - current {
                days += DAYS_IN_WEEK;
            } else if sign < 0 && days + current > 0 {
                days -= DAYS_IN_WEEK;
            }
        }

        if sign > 0 && days <= min_offset {
            days += DAYS_IN_WEEK;
        } else if sign < 0 && days >= -min_offset {
            days -= DAYS_IN_WEEK;
        }
    }

    if magnitude > 1 {
        days += DAYS_IN_WEEK * sign * (magnitude - 1);
    }
    add_days(dt, days)
}

/// Resolves an ISO (week year, week, weekday) triple to a calendar date.
pub fn week_date_to_standard(week_year: i32, week: i64, weekday: i64) -> Option<NaiveDate> {
    let mid_year = NaiveDate::from_ymd_opt(week_year, 6, 1)?;
    let shift = week - mid_year.iso_week().week() as i64;
    let in_week = mid_year.checked_add_signed(Duration::try_days(shift * DAYS_IN_WEEK)?)?;
    let shift = weekday - in_week.weekday().number_from_monday() as i64;
    in_week.checked_add_signed(Duration::try_days(shift)?)
}

/// `YYYY-MM-DD`
pub fn format_date(date: &NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_month_arithmetic_clamps_day() {
        let jan31 = at(2023, 1, 31);
        assert_eq!(add_months(jan31, 1).unwrap().date(), NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());
        assert_eq!(add_years(at(2024, 2, 29), 1).unwrap().date(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(add_months(jan31, -2).unwrap().date(), NaiveDate::from_ymd_opt(2022, 11, 30).unwrap());
    }

    #[test]
    fn test_week_year_of_boundaries() {
        assert_eq!(week_year_of(2012, 1, 52), 2011);
        assert_eq!(week_year_of(2013, 12, 1), 2014);
        assert_eq!(week_year_of(2012, 5, 18), 2012);
    }

    #[test]
    fn test_this_weekday_picks_nearest_then_normalizes() {
        // 2017-04-26 is a Wednesday.
        let wed = at(2017, 4, 26);
        let mon = apply_day_of_week_offset(wed, 1, 0, Normalization::Present, WeekdayLogic::SimpleOffset, 0).unwrap();
        assert_eq!(mon.date(), NaiveDate::from_ymd_opt(2017, 4, 24).unwrap());
        let mon_future = apply_day_of_week_offset(wed, 1, 0, Normalization::Future, WeekdayLogic::SimpleOffset, 0).unwrap();
        assert_eq!(mon_future.date(), NaiveDate::from_ymd_opt(2017, 5, 1).unwrap());
        let sun = apply_day_of_week_offset(wed, 7, 0, Normalization::Past, WeekdayLogic::SimpleOffset, 0).unwrap();
        assert_eq!(sun.date(), NaiveDate::from_ymd_opt(2017, 4, 23).unwrap());
    }

    #[test]
    fn test_next_weekday_honors_min_offset() {
        // Sunday 2017-04-23: "next Monday" with a one-day floor skips tomorrow.
        let sun = at(2017, 4, 23);
        let next = apply_day_of_week_offset(sun, 1, 1, Normalization::Future, WeekdayLogic::SimpleOffset, 1).unwrap();
        assert_eq!(next.date(), NaiveDate::from_ymd_opt(2017, 5, 1).unwrap());
        let no_floor = apply_day_of_week_offset(sun, 1, 1, Normalization::Future, WeekdayLogic::SimpleOffset, 0).unwrap();
        assert_eq!(no_floor.date(), NaiveDate::from_ymd_opt(2017, 4, 24).unwrap());
    }

    #[test]
    fn test_programmatic_counts_same_day() {
        // 2016-11-01 is a Tuesday; the 4th Thursday from Nov 1 is Thanksgiving.
        let nov1 = at(2016, 11, 1);
        let thanksgiving = apply_day_of_week_offset(nov1, 4, 4, Normalization::Future, WeekdayLogic::Programmatic, 0).unwrap();
        assert_eq!(thanksgiving.date(), NaiveDate::from_ymd_opt(2016, 11, 24).unwrap());
        // Programmatic logic treats "next Tuesday" from a Tuesday as today.
        let same = apply_day_of_week_offset(nov1, 2, 1, Normalization::Future, WeekdayLogic::Programmatic, 0).unwrap();
        assert_eq!(same.date(), nov1.date());
    }

    #[test]
    fn test_week_boundary_skips_current_week() {
        // Monday 2017-04-24: "next Friday" under week-boundary logic lands in the following week.
        let mon = at(2017, 4, 24);
        let fri = apply_day_of_week_offset(mon, 5, 1, Normalization::Future, WeekdayLogic::WeekBoundary, 0).unwrap();
        assert_eq!(fri.date(), NaiveDate::from_ymd_opt(2017, 5, 5).unwrap());
        let last = apply_day_of_week_offset(mon, 5, -1, Normalization::Past, WeekdayLogic::WeekBoundary, 0).unwrap();
        assert_eq!(last.date(), NaiveDate::from_ymd_opt(2017, 4, 21).unwrap());
    }

    #[test]
    fn test_week_date_to_standard() {
        assert_eq!(format_date(&week_date_to_standard(2017, 17, 1).unwrap()), "2017-04-24");
        assert_eq!(format_date(&week_date_to_standard(2000, 1, 1).unwrap()), "2000-01-03");
        assert_eq!(format_date(&week_date_to_standard(2002, 1, 1).unwrap()), "2001-12-31");
    }
}
