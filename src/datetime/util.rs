// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use jiff::Span;
use jiff::civil::{Date, Time, Weekday};

pub const fn start_of_day() -> Time {
    Time::constant(0, 0, 0, 0)
}

/// Using a leap second to represent the end of the day
pub const fn end_of_day() -> Time {
    Time::constant(23, 59, 59, 999_999_999)
}

/// Calendar-day stepping that treats arithmetic overflow as "off the end of
/// the supported range" instead of panicking. Steps larger than the whole
/// civil range are rejected up front so `Span` construction stays in range.
pub(crate) fn step_date(d: Date, days: i64) -> Option<Date> {
    if days.abs() > 4_000_000 {
        return None;
    }
    d.checked_add(Span::new().days(days)).ok()
}

/// Days since the Unix epoch date, usable as a week/day lattice coordinate.
pub(crate) fn epoch_days(d: Date) -> i64 {
    i64::from((d - Date::constant(1970, 1, 1)).get_days())
}

/// Number of days from `from` forward to the next `to` (0 if equal).
pub(crate) fn weekday_gap(from: Weekday, to: Weekday) -> i64 {
    i64::from((to.to_monday_zero_offset() - from.to_monday_zero_offset()).rem_euclid(7))
}

/// The day starting the week that contains `d`, for the given week start.
pub(crate) fn week_start_of(d: Date, week_start: Weekday) -> Option<Date> {
    step_date(d, -weekday_gap(week_start, d.weekday()))
}

/// Week number of `d` and the year that week belongs to.
///
/// Week 1 is the first week containing at least four days of the year, the
/// ISO 8601 rule generalized to an arbitrary week start. Days in the final
/// week of December may belong to week 1 of the following year, and early
/// January days to week 52/53 of the preceding one.
pub(crate) fn week_of_year(d: Date, week_start: Weekday) -> Option<(i8, i16)> {
    let ws = week_start_of(d, week_start)?;
    // The fourth day of the week decides which year claims it.
    let pivot = step_date(ws, 3)?;
    let year = pivot.year();
    let w1 = first_week_start(year, week_start)?;
    let week = (ws - w1).get_days() / 7 + 1;
    Some((i8::try_from(week).ok()?, year))
}

/// Number of weeks in `year` under the generalized ISO rule (52 or 53).
pub(crate) fn weeks_in_year(year: i16, week_start: Weekday) -> Option<i8> {
    let w1 = first_week_start(year, week_start)?;
    let w1_next = first_week_start(year.checked_add(1)?, week_start)?;
    i8::try_from((w1_next - w1).get_days() / 7).ok()
}

/// Start of week 1 of `year`: the week containing January 4th.
pub(crate) fn first_week_start(year: i16, week_start: Weekday) -> Option<Date> {
    week_start_of(Date::new(year, 1, 4).ok()?, week_start)
}

/// The n-th (1-based; negative counts from the end) `weekday` of the month,
/// or `None` when the month has no such day.
pub fn nth_weekday_of_month(year: i16, month: i8, n: i8, weekday: Weekday) -> Option<Date> {
    let first = Date::new(year, month, 1).ok()?;
    let days = i64::from(first.days_in_month());
    let day = if n > 0 {
        1 + weekday_gap(first.weekday(), weekday) + 7 * (i64::from(n) - 1)
    } else if n < 0 {
        let last = first.last_of_month();
        i64::from(last.day())
            - weekday_gap(weekday, last.weekday())
            - 7 * (i64::from(-n) - 1)
    } else {
        return None;
    };
    if (1..=days).contains(&day) {
        Date::new(year, month, i8::try_from(day).ok()?).ok()
    } else {
        None
    }
}

/// The n-th (1-based; negative counts from the end) `weekday` of the year.
pub fn nth_weekday_of_year(year: i16, n: i16, weekday: Weekday) -> Option<Date> {
    let first = Date::new(year, 1, 1).ok()?;
    let days = i64::from(first.days_in_year());
    let doy = if n > 0 {
        1 + weekday_gap(first.weekday(), weekday) + 7 * (i64::from(n) - 1)
    } else if n < 0 {
        let last = Date::new(year, 12, 31).ok()?;
        days - weekday_gap(weekday, last.weekday()) - 7 * (i64::from(-n) - 1)
    } else {
        return None;
    };
    if (1..=days).contains(&doy) {
        step_date(first, doy - 1)
    } else {
        None
    }
}

/// 1-based index of `d`'s weekday within its month, counted from the start
/// and from the end. The last Friday of a month has `from_end == 1`.
pub fn weekday_index_in_month(d: Date) -> (i8, i8) {
    let from_start = (d.day() - 1) / 7 + 1;
    let from_end = (d.days_in_month() - d.day()) / 7 + 1;
    (from_start, from_end)
}

/// 1-based index of `d`'s weekday within its year, from both ends.
pub fn weekday_index_in_year(d: Date) -> (i16, i16) {
    let from_start = (d.day_of_year() - 1) / 7 + 1;
    let from_end = (d.days_in_year() - d.day_of_year()) / 7 + 1;
    (from_start, from_end)
}

/// Resolve a possibly-negative day-of-month to a concrete day, or `None`
/// when the month is too short (a BYMONTHDAY=31 in April is silently empty).
pub(crate) fn resolve_month_day(day: i8, year: i16, month: i8) -> Option<i8> {
    let len = Date::new(year, month, 1).ok()?.days_in_month();
    let resolved = if day > 0 { day } else { len + 1 + day };
    (1..=len).contains(&resolved).then_some(resolved)
}

/// Resolve a possibly-negative day-of-year, or `None` when out of range.
pub(crate) fn resolve_year_day(day: i16, year: i16) -> Option<i16> {
    let len = Date::new(year, 1, 1).ok()?.days_in_year();
    let resolved = if day > 0 { day } else { len + 1 + day };
    (1..=len).contains(&resolved).then_some(resolved)
}
