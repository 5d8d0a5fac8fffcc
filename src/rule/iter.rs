// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The expansion engine behind [`RecurrenceRule`]'s queries.
//!
//! Base periods are walked on an integer lattice (years, month indexes,
//! week/day numbers, sub-day unit counts) in the rule's own zone frame, in
//! civil time. Each period is expanded to its sorted candidate set, BYSETPOS
//! selects positions, and the iterator applies the anchor bound and the
//! termination. DST is handled by doing all arithmetic on the wall clock and
//! stamping the zone back on when occurrences leave the engine.

use jiff::civil::{Date, DateTime, Time};
use jiff::tz::TimeZone;

use crate::CalDateTime;
use crate::datetime::{
    end_of_day, epoch_days, resolve_month_day, resolve_year_day, start_of_day, step_date,
    week_of_year, week_start_of, weekday_index_in_month, weekday_index_in_year, weeks_in_year,
};
use crate::rule::{PeriodType, RecurrenceRule, Termination};

const EPOCH: Date = Date::constant(1970, 1, 1);

/// Consecutive candidate-free base periods (day-granular for sub-daily
/// rules) scanned before the engine declares a rule barren. Large enough for
/// the sparsest legitimate rule (a leap-day yearly rule skips three periods;
/// a day-filtered sub-daily rule skips at most a few thousand days).
const MAX_BARREN_PERIODS: u32 = 5000;

fn is_subdaily(period: PeriodType) -> bool {
    matches!(
        period,
        PeriodType::Secondly | PeriodType::Minutely | PeriodType::Hourly
    )
}

/// Project a query instant into the rule's zone frame, as wall-clock time.
/// Date-only values lift to the start or end of their day.
fn to_frame(rule: &RecurrenceRule, t: &CalDateTime, at_end: bool) -> DateTime {
    match (rule.start.zone(), t) {
        (Some(tz), CalDateTime::Zoned(z)) => z.with_time_zone(tz.clone()).datetime(),
        _ if at_end => t.civil_end(),
        _ => t.civil(),
    }
}

/// Dress a wall-clock occurrence back up in the rule's output flavor.
fn emit(rule: &RecurrenceRule, dt: DateTime) -> Option<CalDateTime> {
    if rule.all_day {
        return Some(CalDateTime::Date(dt.date()));
    }
    match rule.start.zone() {
        Some(tz) => dt.to_zoned(tz.clone()).ok().map(CalDateTime::Zoned),
        None => Some(CalDateTime::Floating(dt)),
    }
}

fn until_civil(rule: &RecurrenceRule) -> Option<DateTime> {
    match &rule.termination {
        Termination::Until(u) => Some(to_frame(rule, u, true)),
        _ => None,
    }
}

/// Position of the base period containing `dt` on the rule's lattice.
fn period_index(rule: &RecurrenceRule, dt: DateTime) -> i64 {
    match rule.period {
        PeriodType::Yearly => i64::from(dt.year()),
        PeriodType::Monthly => i64::from(dt.year()) * 12 + i64::from(dt.month()) - 1,
        PeriodType::Weekly => {
            let ws = week_start_of(dt.date(), rule.week_start).unwrap_or_else(|| dt.date());
            epoch_days(ws).div_euclid(7)
        }
        PeriodType::Daily => epoch_days(dt.date()),
        PeriodType::Hourly => epoch_days(dt.date()) * 24 + i64::from(dt.hour()),
        PeriodType::Minutely => {
            (epoch_days(dt.date()) * 24 + i64::from(dt.hour())) * 60 + i64::from(dt.minute())
        }
        PeriodType::Secondly => {
            ((epoch_days(dt.date()) * 24 + i64::from(dt.hour())) * 60 + i64::from(dt.minute()))
                * 60
                + i64::from(dt.second())
        }
        PeriodType::None => 0,
    }
}

/// The period that *emits* `dt`. Differs from [`period_index`] only for
/// yearly rules with BYWEEKNO, where the days of a week belong to the year
/// that claims the week even when the calendar year disagrees.
fn owning_period_index(rule: &RecurrenceRule, dt: DateTime) -> i64 {
    if rule.period == PeriodType::Yearly && !rule.by_week_numbers.is_empty() {
        week_of_year(dt.date(), rule.week_start)
            .map_or_else(|| i64::from(dt.year()), |(_, year)| i64::from(year))
    } else {
        period_index(rule, dt)
    }
}

fn align_down(rule: &RecurrenceRule, idx: i64, anchor_idx: i64) -> i64 {
    let f = i64::from(rule.frequency);
    anchor_idx + (idx - anchor_idx).div_euclid(f) * f
}

fn aligned(rule: &RecurrenceRule, idx: i64, anchor_idx: i64) -> bool {
    (idx - anchor_idx).rem_euclid(i64::from(rule.frequency)) == 0
}

/// Representative start of the period at `idx`; `None` off the civil range.
/// Sub-daily bases carry the anchor's finer wall-clock components.
fn period_start(rule: &RecurrenceRule, idx: i64) -> Option<DateTime> {
    let at = rule.start.civil().time();
    match rule.period {
        PeriodType::Yearly => {
            let year = i16::try_from(idx).ok()?;
            Some(DateTime::from_parts(
                Date::new(year, 1, 1).ok()?,
                start_of_day(),
            ))
        }
        PeriodType::Monthly => {
            let year = i16::try_from(idx.div_euclid(12)).ok()?;
            let month = i8::try_from(idx.rem_euclid(12) + 1).ok()?;
            Some(DateTime::from_parts(
                Date::new(year, month, 1).ok()?,
                start_of_day(),
            ))
        }
        PeriodType::Weekly => {
            let ws = weekly_start_date(rule, idx)?;
            Some(DateTime::from_parts(ws, start_of_day()))
        }
        PeriodType::Daily => Some(DateTime::from_parts(
            step_date(EPOCH, idx)?,
            start_of_day(),
        )),
        PeriodType::Hourly => {
            let date = step_date(EPOCH, idx.div_euclid(24))?;
            let hour = i8::try_from(idx.rem_euclid(24)).ok()?;
            let time =
                Time::new(hour, at.minute(), at.second(), at.subsec_nanosecond()).ok()?;
            Some(DateTime::from_parts(date, time))
        }
        PeriodType::Minutely => {
            let date = step_date(EPOCH, idx.div_euclid(24 * 60))?;
            let rem = idx.rem_euclid(24 * 60);
            let hour = i8::try_from(rem / 60).ok()?;
            let minute = i8::try_from(rem % 60).ok()?;
            let time = Time::new(hour, minute, at.second(), at.subsec_nanosecond()).ok()?;
            Some(DateTime::from_parts(date, time))
        }
        PeriodType::Secondly => {
            let date = step_date(EPOCH, idx.div_euclid(86400))?;
            let rem = idx.rem_euclid(86400);
            let hour = i8::try_from(rem / 3600).ok()?;
            let minute = i8::try_from(rem % 3600 / 60).ok()?;
            let second = i8::try_from(rem % 60).ok()?;
            let time = Time::new(hour, minute, second, at.subsec_nanosecond()).ok()?;
            Some(DateTime::from_parts(date, time))
        }
        PeriodType::None => None,
    }
}

fn weekly_start_date(rule: &RecurrenceRule, idx: i64) -> Option<Date> {
    let anchor_ws = week_start_of(rule.start.civil().date(), rule.week_start)?;
    let rem = epoch_days(anchor_ws).rem_euclid(7);
    step_date(EPOCH, idx * 7 + rem)
}

/// The sorted, BYSETPOS-selected candidate set of one base period, not yet
/// bounded by the anchor or the termination.
fn period_candidates(rule: &RecurrenceRule, idx: i64) -> Vec<DateTime> {
    let candidates = match rule.period {
        PeriodType::Yearly => match i16::try_from(idx) {
            Ok(year) => cross(expand_yearly(rule, year), expand_times(rule)),
            Err(_) => Vec::new(),
        },
        PeriodType::Monthly => {
            match (
                i16::try_from(idx.div_euclid(12)),
                i8::try_from(idx.rem_euclid(12) + 1),
            ) {
                (Ok(year), Ok(month)) => {
                    cross(expand_monthly(rule, year, month), expand_times(rule))
                }
                _ => Vec::new(),
            }
        }
        PeriodType::Weekly => weekly_start_date(rule, idx)
            .map(|ws| cross(expand_weekly(rule, ws), expand_times(rule)))
            .unwrap_or_default(),
        PeriodType::Daily => step_date(EPOCH, idx)
            .map(|d| cross(expand_daily(rule, d), expand_times(rule)))
            .unwrap_or_default(),
        PeriodType::Hourly | PeriodType::Minutely | PeriodType::Secondly => {
            period_start(rule, idx)
                .map(|base| expand_subdaily(rule, base))
                .unwrap_or_default()
        }
        PeriodType::None => Vec::new(),
    };
    apply_set_pos(rule, candidates)
}

fn cross(dates: Vec<Date>, times: Vec<Time>) -> Vec<DateTime> {
    let mut out = Vec::with_capacity(dates.len() * times.len());
    for d in dates {
        for t in &times {
            out.push(DateTime::from_parts(d, *t));
        }
    }
    out
}

/// Wall-clock times of one base period: the BY filters at sub-day units, or
/// the anchor's own reading where a filter is absent.
fn expand_times(rule: &RecurrenceRule) -> Vec<Time> {
    if rule.all_day {
        return vec![start_of_day()];
    }
    let at = rule.start.time().unwrap_or_else(start_of_day);
    let hours: Vec<i8> = if rule.by_hours.is_empty() {
        vec![at.hour()]
    } else {
        rule.by_hours.iter().filter_map(|&h| i8::try_from(h).ok()).collect()
    };
    let minutes: Vec<i8> = if rule.by_minutes.is_empty() {
        vec![at.minute()]
    } else {
        rule.by_minutes.iter().filter_map(|&m| i8::try_from(m).ok()).collect()
    };
    // A leap second (BYSECOND=60) has no civil representation and expands to
    // nothing; anchor-default seconds keep the anchor's sub-second reading.
    let seconds: Vec<(i8, i32)> = if rule.by_seconds.is_empty() {
        vec![(at.second(), at.subsec_nanosecond())]
    } else {
        rule.by_seconds
            .iter()
            .filter(|&&s| s <= 59)
            .filter_map(|&s| i8::try_from(s).ok().map(|s| (s, 0)))
            .collect()
    };
    let mut out = Vec::with_capacity(hours.len() * minutes.len() * seconds.len());
    for &h in &hours {
        for &m in &minutes {
            for &(s, ns) in &seconds {
                if let Ok(t) = Time::new(h, m, s, ns) {
                    out.push(t);
                }
            }
        }
    }
    out
}

/// Shared date-level limit filters, used where every filter limits (daily
/// and sub-daily periods) and for the nonstandard leftover combinations of
/// the coarser periods. BYDAY offsets are ignored here.
fn day_passes_limits(rule: &RecurrenceRule, d: Date) -> bool {
    if !rule.by_months.is_empty() && !rule.by_months.contains(&d.month()) {
        return false;
    }
    if !rule.by_year_days.is_empty() && !matches_year_day(rule, d) {
        return false;
    }
    if !rule.by_month_days.is_empty() && !matches_month_day(rule, d) {
        return false;
    }
    if !rule.by_week_numbers.is_empty() && !matches_week_number(rule, d) {
        return false;
    }
    if !rule.by_days.is_empty() && !rule.by_days.iter().any(|p| p.weekday == d.weekday()) {
        return false;
    }
    true
}

fn matches_year_day(rule: &RecurrenceRule, d: Date) -> bool {
    rule.by_year_days
        .iter()
        .any(|&yd| resolve_year_day(yd, d.year()) == Some(d.day_of_year()))
}

fn matches_month_day(rule: &RecurrenceRule, d: Date) -> bool {
    rule.by_month_days
        .iter()
        .any(|&md| resolve_month_day(md, d.year(), d.month()) == Some(d.day()))
}

fn matches_week_number(rule: &RecurrenceRule, d: Date) -> bool {
    let Some((week, week_year)) = week_of_year(d, rule.week_start) else {
        return false;
    };
    let Some(total) = weeks_in_year(week_year, rule.week_start) else {
        return false;
    };
    rule.by_week_numbers.iter().any(|&wn| {
        let resolved = if wn > 0 { wn } else { total + 1 + wn };
        resolved == week
    })
}

/// Whether `d` matches a BYDAY entry, honoring ordinal offsets relative to
/// the month (`in_month`) or the year.
fn byday_matches(rule: &RecurrenceRule, d: Date, in_month: bool) -> bool {
    rule.by_days.iter().any(|p| {
        if p.weekday != d.weekday() {
            return false;
        }
        if p.offset == 0 {
            return true;
        }
        if in_month {
            let (from_start, from_end) = weekday_index_in_month(d);
            p.offset == from_start || p.offset == -from_end
        } else {
            let (from_start, from_end) = weekday_index_in_year(d);
            i16::from(p.offset) == from_start || i16::from(p.offset) == -from_end
        }
    })
}

fn expand_daily(rule: &RecurrenceRule, d: Date) -> Vec<Date> {
    if day_passes_limits(rule, d) {
        vec![d]
    } else {
        Vec::new()
    }
}

/// BYDAY expands within the week (offsets ignored, per the WEEKLY
/// ill-formedness rule); the anchor's weekday is the default. The remaining
/// date filters limit.
fn expand_weekly(rule: &RecurrenceRule, week_start: Date) -> Vec<Date> {
    let anchor_weekday = rule.start.civil().date().weekday();
    let mut out = Vec::new();
    for offset in 0..7 {
        let Some(d) = step_date(week_start, offset) else {
            break;
        };
        if rule.by_days.is_empty() {
            if d.weekday() != anchor_weekday {
                continue;
            }
        } else if !rule.by_days.iter().any(|p| p.weekday == d.weekday()) {
            continue;
        }
        if !rule.by_months.is_empty() && !rule.by_months.contains(&d.month()) {
            continue;
        }
        if !rule.by_month_days.is_empty() && !matches_month_day(rule, d) {
            continue;
        }
        if !rule.by_year_days.is_empty() && !matches_year_day(rule, d) {
            continue;
        }
        out.push(d);
    }
    out
}

/// BYMONTH limits the whole period; BYMONTHDAY and BYDAY expand within the
/// month, limiting each other when both are present; the anchor's
/// day-of-month is the default.
fn expand_monthly(rule: &RecurrenceRule, year: i16, month: i8) -> Vec<Date> {
    if !rule.by_months.is_empty() && !rule.by_months.contains(&month) {
        return Vec::new();
    }
    let Ok(first) = Date::new(year, month, 1) else {
        return Vec::new();
    };
    let has_month_days = !rule.by_month_days.is_empty();
    let has_by_days = !rule.by_days.is_empty();
    let anchor_day = rule.start.civil().date().day();
    let mut out = Vec::new();
    for day in 1..=first.days_in_month() {
        let Ok(d) = Date::new(year, month, day) else {
            continue;
        };
        if has_month_days && !matches_month_day(rule, d) {
            continue;
        }
        if has_by_days {
            if !byday_matches(rule, d, true) {
                continue;
            }
        } else if !has_month_days && day != anchor_day {
            continue;
        }
        if !rule.by_year_days.is_empty() && !matches_year_day(rule, d) {
            continue;
        }
        out.push(d);
    }
    out
}

fn yearly_day_passes(rule: &RecurrenceRule, year: i16, d: Date) -> bool {
    let has_week_numbers = !rule.by_week_numbers.is_empty();
    let has_year_days = !rule.by_year_days.is_empty();
    let has_month_days = !rule.by_month_days.is_empty();
    let has_by_days = !rule.by_days.is_empty();
    let has_months = !rule.by_months.is_empty();

    if has_week_numbers {
        let Some((week, week_year)) = week_of_year(d, rule.week_start) else {
            return false;
        };
        if week_year != year {
            return false;
        }
        let Some(total) = weeks_in_year(year, rule.week_start) else {
            return false;
        };
        let selected = rule.by_week_numbers.iter().any(|&wn| {
            let resolved = if wn > 0 { wn } else { total + 1 + wn };
            resolved == week
        });
        if !selected {
            return false;
        }
    } else if d.year() != year {
        return false;
    }
    if has_months && !rule.by_months.contains(&d.month()) {
        return false;
    }
    if has_year_days && !matches_year_day(rule, d) {
        return false;
    }
    if has_month_days && !matches_month_day(rule, d) {
        return false;
    }
    let anchor_date = rule.start.civil().date();
    if has_by_days {
        // Ordinal offsets bind to the month when BYMONTH scopes the rule,
        // to the whole year otherwise.
        if !byday_matches(rule, d, has_months) {
            return false;
        }
    } else if !has_month_days && !has_year_days {
        if has_week_numbers {
            if d.weekday() != anchor_date.weekday() {
                return false;
            }
        } else {
            if d.day() != anchor_date.day() {
                return false;
            }
            if !has_months && d.month() != anchor_date.month() {
                return false;
            }
        }
    }
    true
}

/// All filters can expand under YEARLY, so the period is evaluated as one
/// day mask over the year, padded by a week on both sides when BYWEEKNO can
/// pull in days of the adjacent calendar years.
fn expand_yearly(rule: &RecurrenceRule, year: i16) -> Vec<Date> {
    let Ok(first) = Date::new(year, 1, 1) else {
        return Vec::new();
    };
    let Ok(last) = Date::new(year, 12, 31) else {
        return Vec::new();
    };
    let (from, to) = if rule.by_week_numbers.is_empty() {
        (first, last)
    } else {
        (
            step_date(first, -6).unwrap_or(first),
            step_date(last, 6).unwrap_or(last),
        )
    };
    let mut out = Vec::new();
    let mut d = from;
    while d <= to {
        if yearly_day_passes(rule, year, d) {
            out.push(d);
        }
        match step_date(d, 1) {
            Some(next) => d = next,
            None => break,
        }
    }
    out
}

/// Sub-daily periods are single base instants; the finer units expand, the
/// coarser ones and the date filters limit.
fn expand_subdaily(rule: &RecurrenceRule, base: DateTime) -> Vec<DateTime> {
    if !day_passes_limits(rule, base.date()) {
        return Vec::new();
    }
    let t = base.time();
    if !rule.by_hours.is_empty()
        && !rule.by_hours.iter().any(|&h| i8::try_from(h).is_ok_and(|h| h == t.hour()))
    {
        return Vec::new();
    }
    let minutes: Vec<i8> = match rule.period {
        PeriodType::Hourly if !rule.by_minutes.is_empty() => rule
            .by_minutes
            .iter()
            .filter_map(|&m| i8::try_from(m).ok())
            .collect(),
        _ => {
            if !rule.by_minutes.is_empty()
                && !rule
                    .by_minutes
                    .iter()
                    .any(|&m| i8::try_from(m).is_ok_and(|m| m == t.minute()))
            {
                return Vec::new();
            }
            vec![t.minute()]
        }
    };
    let expand_seconds = matches!(rule.period, PeriodType::Hourly | PeriodType::Minutely);
    let seconds: Vec<i8> = if expand_seconds && !rule.by_seconds.is_empty() {
        rule.by_seconds
            .iter()
            .filter(|&&s| s <= 59)
            .filter_map(|&s| i8::try_from(s).ok())
            .collect()
    } else {
        if !rule.by_seconds.is_empty()
            && !rule
                .by_seconds
                .iter()
                .any(|&s| i8::try_from(s).is_ok_and(|s| s == t.second()))
        {
            return Vec::new();
        }
        vec![t.second()]
    };
    let mut out = Vec::new();
    for &m in &minutes {
        for &s in &seconds {
            if let Ok(time) = Time::new(t.hour(), m, s, t.subsec_nanosecond()) {
                out.push(DateTime::from_parts(base.date(), time));
            }
        }
    }
    out
}

/// Keep only the listed 1-based positions of the period's sorted set;
/// negative positions count from the end.
fn apply_set_pos(rule: &RecurrenceRule, candidates: Vec<DateTime>) -> Vec<DateTime> {
    if rule.by_set_pos.is_empty() || candidates.is_empty() {
        return candidates;
    }
    let len = i64::try_from(candidates.len()).unwrap_or(i64::MAX);
    let mut picked = Vec::new();
    for &p in &rule.by_set_pos {
        let i = if p > 0 {
            i64::from(p) - 1
        } else {
            i64::from(p) + len
        };
        if (0..len).contains(&i) {
            if let Ok(i) = usize::try_from(i) {
                picked.push(candidates[i]);
            }
        }
    }
    picked.sort_unstable();
    picked.dedup();
    picked
}

/// Ascending occurrence stream over the rule's wall clock.
pub(crate) struct RuleIter<'r> {
    rule: &'r RecurrenceRule,
    anchor: DateTime,
    anchor_idx: i64,
    idx: i64,
    until: Option<DateTime>,
    remaining: Option<u64>,
    pending: std::vec::IntoIter<DateTime>,
    last: Option<DateTime>,
    done: bool,
}

/// Start an occurrence stream, fast-forwarded to the period containing
/// `lower` when the termination allows it (counted rules must replay from
/// the anchor to know their position in the count).
pub(crate) fn iter_from<'r>(
    rule: &'r RecurrenceRule,
    lower: Option<DateTime>,
) -> RuleIter<'r> {
    let anchor = rule.start.civil();
    let anchor_idx = owning_period_index(rule, anchor);
    let remaining = match rule.termination {
        Termination::Count(n) => Some(u64::from(n)),
        _ => None,
    };
    let mut idx = anchor_idx;
    if remaining.is_none() {
        if let Some(lb) = lower {
            let li = owning_period_index(rule, lb);
            if li > anchor_idx {
                idx = align_down(rule, li, anchor_idx);
            }
        }
    }
    RuleIter {
        rule,
        anchor,
        anchor_idx,
        idx,
        until: until_civil(rule),
        remaining,
        pending: Vec::new().into_iter(),
        last: None,
        done: rule.period == PeriodType::None || rule.frequency == 0,
    }
}

impl RuleIter<'_> {
    /// Refill `pending` with the next non-empty period's candidates.
    fn refill(&mut self) -> bool {
        let f = i64::from(self.rule.frequency);
        let mut barren: u32 = 0;
        loop {
            if barren > MAX_BARREN_PERIODS {
                log::warn!(
                    "rule scan gave up after {MAX_BARREN_PERIODS} barren periods: {}",
                    self.rule
                );
                return false;
            }
            let Some(base) = period_start(self.rule, self.idx) else {
                return false;
            };
            // Day- and hour-filtered sub-daily rules would otherwise crawl
            // unit by unit through excluded stretches.
            if is_subdaily(self.rule.period) {
                if let Some(target) = self.subdaily_skip_target(base) {
                    if target <= self.idx {
                        return false;
                    }
                    self.idx = target;
                    barren += 1;
                    continue;
                }
            }
            let candidates = period_candidates(self.rule, self.idx);
            self.idx += f;
            if candidates.is_empty() {
                barren += 1;
                continue;
            }
            self.pending = candidates.into_iter();
            return true;
        }
    }

    fn subdaily_skip_target(&self, base: DateTime) -> Option<i64> {
        let raw = subdaily_excluded_stretch(self.rule, base)?.1;
        // Re-align onto the rule's lattice, rounding up.
        let f = i64::from(self.rule.frequency);
        let gap = raw - self.anchor_idx;
        let steps = gap.div_euclid(f) + i64::from(gap.rem_euclid(f) != 0);
        Some(self.anchor_idx + steps * f)
    }
}

/// When `base` sits in a stretch the date or clock filters exclude, the
/// index range `(start, end)` of that stretch in base-period units (end
/// exclusive); `None` when `base` is admissible.
fn subdaily_excluded_stretch(rule: &RecurrenceRule, base: DateTime) -> Option<(i64, i64)> {
    let units_per_hour = match rule.period {
        PeriodType::Hourly => 1,
        PeriodType::Minutely => 60,
        PeriodType::Secondly => 3600,
        _ => return None,
    };
    let hours = epoch_days(base.date()) * 24 + i64::from(base.hour());
    if !day_passes_limits(rule, base.date()) {
        let day_start = epoch_days(base.date()) * 24 * units_per_hour;
        let next_day = step_date(base.date(), 1)?;
        return Some((day_start, epoch_days(next_day) * 24 * units_per_hour));
    }
    if !rule.by_hours.is_empty()
        && !rule
            .by_hours
            .iter()
            .any(|&h| i8::try_from(h).is_ok_and(|h| h == base.hour()))
    {
        return Some((hours * units_per_hour, (hours + 1) * units_per_hour));
    }
    if rule.period == PeriodType::Secondly
        && !rule.by_minutes.is_empty()
        && !rule
            .by_minutes
            .iter()
            .any(|&m| i8::try_from(m).is_ok_and(|m| m == base.minute()))
    {
        let minute = hours * 60 + i64::from(base.minute());
        return Some((minute * 60, (minute + 1) * 60));
    }
    None
}

impl Iterator for RuleIter<'_> {
    type Item = DateTime;

    fn next(&mut self) -> Option<DateTime> {
        if self.done {
            return None;
        }
        loop {
            while let Some(c) = self.pending.next() {
                if c < self.anchor {
                    continue;
                }
                if let Some(u) = self.until {
                    if c > u {
                        self.done = true;
                        return None;
                    }
                }
                // Period overlap (BYWEEKNO spill) must not break ordering.
                if let Some(last) = self.last {
                    if c <= last {
                        continue;
                    }
                }
                match &mut self.remaining {
                    Some(0) => {
                        self.done = true;
                        return None;
                    }
                    Some(n) => *n -= 1,
                    None => {}
                }
                self.last = Some(c);
                return Some(c);
            }
            if !self.refill() {
                self.done = true;
                return None;
            }
        }
    }
}

pub(crate) fn recurs_at(rule: &RecurrenceRule, t: &CalDateTime) -> bool {
    if rule.period == PeriodType::None {
        return false;
    }
    if rule.all_day != t.is_date_only() {
        return false;
    }
    let c = to_frame(rule, t, false);
    let anchor = rule.start.civil();
    if c < anchor {
        return false;
    }
    if let Some(u) = until_civil(rule) {
        if c > u {
            return false;
        }
    }
    if matches!(rule.termination, Termination::Count(_)) {
        // Membership under COUNT depends on the occurrence's position.
        for occ in iter_from(rule, None) {
            if occ == c {
                return true;
            }
            if occ > c {
                return false;
            }
        }
        return false;
    }
    let anchor_idx = owning_period_index(rule, anchor);
    let idx = owning_period_index(rule, c);
    aligned(rule, idx, anchor_idx) && period_candidates(rule, idx).contains(&c)
}

pub(crate) fn recur_times_on(rule: &RecurrenceRule, date: Date, zone: &TimeZone) -> Vec<Time> {
    let day_start = DateTime::from_parts(date, start_of_day());
    let day_end = DateTime::from_parts(date, end_of_day());
    let (Ok(start), Ok(end)) = (
        day_start.to_zoned(zone.clone()),
        day_end.to_zoned(zone.clone()),
    ) else {
        return Vec::new();
    };
    let mut times: Vec<Time> = times_in_interval(
        rule,
        &CalDateTime::Zoned(start),
        &CalDateTime::Zoned(end),
    )
    .into_iter()
    .filter_map(|occ| {
        let local = occ.civil_in(zone);
        (local.date() == date).then_some(local.time())
    })
    .collect();
    times.sort_unstable();
    times.dedup();
    times
}

pub(crate) fn times_in_interval(
    rule: &RecurrenceRule,
    start: &CalDateTime,
    end: &CalDateTime,
) -> Vec<CalDateTime> {
    if rule.period == PeriodType::None {
        return Vec::new();
    }
    let s = to_frame(rule, start, false);
    let e = to_frame(rule, end, true);
    if e < s {
        return Vec::new();
    }
    let mut out = Vec::new();
    for c in iter_from(rule, Some(s)) {
        if c > e {
            break;
        }
        if c < s {
            continue;
        }
        if let Some(t) = emit(rule, c) {
            out.push(t);
        }
    }
    out
}

pub(crate) fn next_after(rule: &RecurrenceRule, after: &CalDateTime) -> Option<CalDateTime> {
    if rule.period == PeriodType::None {
        return None;
    }
    let a = to_frame(rule, after, false);
    for c in iter_from(rule, Some(a)) {
        if c > a {
            return emit(rule, c);
        }
    }
    None
}

pub(crate) fn previous_before(
    rule: &RecurrenceRule,
    before: &CalDateTime,
) -> Option<CalDateTime> {
    if rule.period == PeriodType::None {
        return None;
    }
    let b = to_frame(rule, before, false);
    let anchor = rule.start.civil();
    if b <= anchor {
        return None;
    }
    if matches!(rule.termination, Termination::Count(_)) {
        let mut last = None;
        for occ in iter_from(rule, None) {
            if occ >= b {
                break;
            }
            last = Some(occ);
        }
        return last.and_then(|c| emit(rule, c));
    }
    let until = until_civil(rule);
    let top = match until {
        Some(u) if u < b => u,
        _ => b,
    };
    let anchor_idx = owning_period_index(rule, anchor);
    let mut idx = align_down(rule, owning_period_index(rule, top), anchor_idx);
    let f = i64::from(rule.frequency);
    let mut barren: u32 = 0;
    while idx >= anchor_idx && barren <= MAX_BARREN_PERIODS {
        // Backward counterpart of the forward scan's stretch skipping.
        if is_subdaily(rule.period) {
            if let Some(base) = period_start(rule, idx) {
                if let Some((stretch_start, _)) = subdaily_excluded_stretch(rule, base) {
                    let target = align_down(rule, stretch_start - 1, anchor_idx);
                    if target < idx {
                        idx = target;
                        barren += 1;
                        continue;
                    }
                    return None;
                }
            }
        }
        let best = period_candidates(rule, idx)
            .into_iter()
            .filter(|&c| c >= anchor && c < b && until.is_none_or(|u| c <= u))
            .next_back();
        if let Some(c) = best {
            return emit(rule, c);
        }
        barren += 1;
        idx -= f;
    }
    None
}

pub(crate) fn duration_to(rule: &RecurrenceRule, t: &CalDateTime) -> i64 {
    if rule.period == PeriodType::None {
        return 0;
    }
    let c = to_frame(rule, t, false);
    let mut n = 0;
    for occ in iter_from(rule, None) {
        if occ > c {
            break;
        }
        n += 1;
    }
    n
}

pub(crate) fn last_occurrence(rule: &RecurrenceRule) -> Option<CalDateTime> {
    iter_from(rule, None).last().and_then(|c| emit(rule, c))
}
