// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The recurrence of an incidence: inclusion and exclusion rules, explicit
//! inclusion and exclusion dates, anchored at the incidence's start.

use std::cell::Cell;

use jiff::civil::{Date, DateTime, Time, Weekday};
use jiff::tz::TimeZone;

use crate::CalDateTime;
use crate::datetime::{end_of_day, same_zone, start_of_day};
use crate::kind::RecurrenceKind;
use crate::observer::{ObserverHandle, ObserverRegistry};
use crate::rule::{PeriodType, RecurrenceRule, Termination, WeekdayPos};

/// Retry bound for the candidate-then-exclude search in
/// [`Recurrence::next_datetime`], guarding against an exclusion rule that
/// extinguishes an inclusion rule.
const DEFAULT_ITERATION_BUDGET: u32 = 1000;

/// A bundle of recurrence rules, exception rules and explicit dates
/// answering when an event occurs.
///
/// Query results are reported in the recurrence's own zone frame; callers
/// project them where needed. All date and instant lists are kept sorted
/// and duplicate-free. Mutators are silent no-ops while the recurrence is
/// read-only, and every effective mutation fires one change notification.
#[derive(Debug)]
pub struct Recurrence {
    start: CalDateTime,
    all_day: bool,
    read_only: bool,
    rrules: Vec<RecurrenceRule>,
    exrules: Vec<RecurrenceRule>,
    rdates: Vec<Date>,
    exdates: Vec<Date>,
    rdatetimes: Vec<CalDateTime>,
    exdatetimes: Vec<CalDateTime>,
    cached_kind: Cell<Option<RecurrenceKind>>,
    observers: ObserverRegistry,
    iteration_budget: u32,
}

impl Recurrence {
    /// An empty recurrence anchored at `start`.
    #[must_use]
    pub fn new(start: CalDateTime) -> Self {
        let all_day = start.is_date_only();
        Recurrence {
            start,
            all_day,
            read_only: false,
            rrules: Vec::new(),
            exrules: Vec::new(),
            rdates: Vec::new(),
            exdates: Vec::new(),
            rdatetimes: Vec::new(),
            exdatetimes: Vec::new(),
            cached_kind: Cell::new(None),
            observers: ObserverRegistry::default(),
            iteration_budget: DEFAULT_ITERATION_BUDGET,
        }
    }

    /// The anchor instant (the incidence's DTSTART).
    #[must_use]
    pub fn start_datetime(&self) -> &CalDateTime {
        &self.start
    }

    /// The anchor date in the recurrence's own frame.
    #[must_use]
    pub fn start_date(&self) -> Date {
        self.start.date()
    }

    /// Re-anchor the recurrence. Every contained rule is re-anchored too,
    /// and the all-day flag follows the new anchor's flavor.
    pub fn set_start_datetime(&mut self, start: CalDateTime) {
        if self.read_only {
            return;
        }
        self.all_day = start.is_date_only();
        for rule in self.rrules.iter_mut().chain(self.exrules.iter_mut()) {
            rule.set_start(start.clone());
        }
        self.start = start;
        self.updated();
    }

    /// Whether occurrences are date-only.
    #[must_use]
    pub fn all_day(&self) -> bool {
        self.all_day
    }

    /// Switch between date-only and timed occurrences, cascading to every
    /// contained rule. Setting the current value again does nothing.
    pub fn set_all_day(&mut self, all_day: bool) {
        if self.read_only || all_day == self.all_day {
            return;
        }
        self.all_day = all_day;
        for rule in self.rrules.iter_mut().chain(self.exrules.iter_mut()) {
            rule.set_all_day(all_day);
        }
        self.updated();
    }

    /// Whether mutators are ignored.
    #[must_use]
    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Lock or unlock the recurrence against mutation.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Whether anything recurs at all: a rule or an explicit inclusion.
    #[must_use]
    pub fn recurs(&self) -> bool {
        !self.rrules.is_empty() || !self.rdates.is_empty() || !self.rdatetimes.is_empty()
    }

    /// The coarse editing category of the recurrence, derived from the
    /// first inclusion rule and memoized until the next mutation.
    #[must_use]
    pub fn kind(&self) -> RecurrenceKind {
        if let Some(kind) = self.cached_kind.get() {
            return kind;
        }
        let kind = RecurrenceKind::of_rule(self.rrules.first());
        self.cached_kind.set(Some(kind));
        kind
    }

    /// The retry bound of [`next_datetime`](Self::next_datetime) and
    /// [`previous_datetime`](Self::previous_datetime).
    #[must_use]
    pub fn iteration_budget(&self) -> u32 {
        self.iteration_budget
    }

    /// Override the exclusion retry bound. Intended for tests.
    pub fn set_iteration_budget(&mut self, budget: u32) {
        self.iteration_budget = budget;
    }

    /// Register `observer`; registering the same handle twice keeps one
    /// registration.
    pub fn add_observer(&self, observer: &ObserverHandle) {
        self.observers.add(observer);
    }

    /// Deregister `observer`; unknown handles are tolerated.
    pub fn remove_observer(&self, observer: &ObserverHandle) {
        self.observers.remove(observer);
    }

    // Rules

    /// The inclusion rules, in insertion order.
    #[must_use]
    pub fn rrules(&self) -> &[RecurrenceRule] {
        &self.rrules
    }

    /// The exclusion rules, in insertion order.
    #[must_use]
    pub fn exrules(&self) -> &[RecurrenceRule] {
        &self.exrules
    }

    /// Append an inclusion rule. The rule inherits the recurrence's all-day
    /// flag.
    pub fn add_rrule(&mut self, mut rule: RecurrenceRule) {
        if self.read_only {
            return;
        }
        rule.set_all_day(self.all_day);
        self.rrules.push(rule);
        self.updated();
    }

    /// Remove and return the inclusion rule at `index`.
    pub fn remove_rrule(&mut self, index: usize) -> Option<RecurrenceRule> {
        if self.read_only || index >= self.rrules.len() {
            return None;
        }
        let rule = self.rrules.remove(index);
        self.updated();
        Some(rule)
    }

    /// Append an exclusion rule. The rule inherits the recurrence's all-day
    /// flag.
    pub fn add_exrule(&mut self, mut rule: RecurrenceRule) {
        if self.read_only {
            return;
        }
        rule.set_all_day(self.all_day);
        self.exrules.push(rule);
        self.updated();
    }

    /// Remove and return the exclusion rule at `index`.
    pub fn remove_exrule(&mut self, index: usize) -> Option<RecurrenceRule> {
        if self.read_only || index >= self.exrules.len() {
            return None;
        }
        let rule = self.exrules.remove(index);
        self.updated();
        Some(rule)
    }

    /// Edit the inclusion rule at `index` in place. The closure's change is
    /// propagated as one notification, like any other mutation.
    pub fn update_rrule<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut RecurrenceRule) -> R,
    ) -> Option<R> {
        if self.read_only {
            return None;
        }
        let result = f(self.rrules.get_mut(index)?);
        self.updated();
        Some(result)
    }

    /// Edit the exclusion rule at `index` in place.
    pub fn update_exrule<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut RecurrenceRule) -> R,
    ) -> Option<R> {
        if self.read_only {
            return None;
        }
        let result = f(self.exrules.get_mut(index)?);
        self.updated();
        Some(result)
    }

    // Explicit dates

    /// The all-day inclusion dates, sorted.
    #[must_use]
    pub fn rdates(&self) -> &[Date] {
        &self.rdates
    }

    /// Replace the all-day inclusion dates.
    pub fn set_rdates(&mut self, dates: Vec<Date>) {
        if self.read_only {
            return;
        }
        self.rdates = sorted_unique(dates);
        self.updated();
    }

    /// Add one all-day inclusion date.
    pub fn add_rdate(&mut self, date: Date) {
        if self.read_only {
            return;
        }
        insert_sorted(&mut self.rdates, date);
        self.updated();
    }

    /// The timed inclusion instants, sorted.
    #[must_use]
    pub fn rdatetimes(&self) -> &[CalDateTime] {
        &self.rdatetimes
    }

    /// Replace the timed inclusion instants.
    pub fn set_rdatetimes(&mut self, instants: Vec<CalDateTime>) {
        if self.read_only {
            return;
        }
        self.rdatetimes = sorted_unique(instants);
        self.updated();
    }

    /// Add one timed inclusion instant.
    pub fn add_rdatetime(&mut self, instant: CalDateTime) {
        if self.read_only {
            return;
        }
        insert_sorted(&mut self.rdatetimes, instant);
        self.updated();
    }

    /// The all-day exclusion dates, sorted.
    #[must_use]
    pub fn exdates(&self) -> &[Date] {
        &self.exdates
    }

    /// Replace the all-day exclusion dates.
    pub fn set_exdates(&mut self, dates: Vec<Date>) {
        if self.read_only {
            return;
        }
        self.exdates = sorted_unique(dates);
        self.updated();
    }

    /// Add one all-day exclusion date.
    pub fn add_exdate(&mut self, date: Date) {
        if self.read_only {
            return;
        }
        insert_sorted(&mut self.exdates, date);
        self.updated();
    }

    /// The timed exclusion instants, sorted.
    #[must_use]
    pub fn exdatetimes(&self) -> &[CalDateTime] {
        &self.exdatetimes
    }

    /// Replace the timed exclusion instants.
    pub fn set_exdatetimes(&mut self, instants: Vec<CalDateTime>) {
        if self.read_only {
            return;
        }
        self.exdatetimes = sorted_unique(instants);
        self.updated();
    }

    /// Add one timed exclusion instant.
    pub fn add_exdatetime(&mut self, instant: CalDateTime) {
        if self.read_only {
            return;
        }
        insert_sorted(&mut self.exdatetimes, instant);
        self.updated();
    }

    /// Drop every rule, every explicit date and the classification cache.
    pub fn clear(&mut self) {
        if self.read_only {
            return;
        }
        self.rrules.clear();
        self.exrules.clear();
        self.rdates.clear();
        self.rdatetimes.clear();
        self.exdates.clear();
        self.exdatetimes.clear();
        self.updated();
    }

    // Queries

    /// Whether the event occurs on `date` as read in `zone`.
    #[must_use]
    pub fn recurs_on(&self, date: Date, zone: &TimeZone) -> bool {
        // Don't waste time below the start of the recurrence.
        let probe = day_end_in(date, zone);
        if probe < self.start {
            return false;
        }

        if self.exdates.binary_search(&date).is_ok() {
            return false;
        }
        // For all-day events a matching exclusion rule wipes the whole day;
        // exclusions take precedence over inclusions.
        if self.all_day && self.exrules.iter().any(|r| r.recurs_on(date, zone)) {
            return false;
        }

        if self.rdates.binary_search(&date).is_ok() {
            return true;
        }

        // Could it recur on this day at all?
        let candidate = self.start.date_in(zone) == date
            || self.rdatetimes.iter().any(|t| t.date_in(zone) == date)
            || self.rrules.iter().any(|r| r.recurs_on(date, zone));
        if !candidate {
            return false;
        }

        // Any time on this day excluded, by instant or by a timed rule?
        let exclusion_today = self.exdatetimes.iter().any(|t| t.date_in(zone) == date)
            || (!self.all_day && self.exrules.iter().any(|r| r.recurs_on(date, zone)));
        if !exclusion_today {
            return true;
        }
        // Only the full time list can settle a partially excluded day.
        !self.recur_times_on(date, zone).is_empty()
    }

    /// Whether the event occurs exactly at `t`.
    #[must_use]
    pub fn recurs_at(&self, t: &CalDateTime) -> bool {
        // Work in the recurrence's own frame for the date comparisons.
        let local = match self.start.zone() {
            Some(tz) => t.project_to(tz),
            None => t.clone(),
        };
        if self.exdatetimes.binary_search(&local).is_ok()
            || self.exdates.binary_search(&local.date()).is_ok()
        {
            return false;
        }
        if self.exrules.iter().any(|r| r.recurs_at(&local)) {
            return false;
        }
        local == self.start
            || self.rdatetimes.binary_search(&local).is_ok()
            || self.rrules.iter().any(|r| r.recurs_at(&local))
    }

    /// All wall-clock times (in `zone`) the event occurs at on `date`,
    /// ascending and unique.
    #[must_use]
    pub fn recur_times_on(&self, date: Date, zone: &TimeZone) -> Vec<Time> {
        if self.exdates.binary_search(&date).is_ok() {
            return Vec::new();
        }
        if self.all_day && self.exrules.iter().any(|r| r.recurs_on(date, zone)) {
            return Vec::new();
        }

        let mut times = Vec::new();
        if self.start.date_in(zone) == date {
            times.push(self.start.civil_in(zone).time());
        }
        for t in &self.rdatetimes {
            if t.date_in(zone) == date {
                times.push(t.civil_in(zone).time());
            }
        }
        for rule in &self.rrules {
            times.extend(rule.recur_times_on(date, zone));
        }
        times.sort_unstable();
        times.dedup();

        let mut extimes = Vec::new();
        for t in &self.exdatetimes {
            if t.date_in(zone) == date {
                extimes.push(t.civil_in(zone).time());
            }
        }
        if !self.all_day {
            for rule in &self.exrules {
                extimes.extend(rule.recur_times_on(date, zone));
            }
        }
        extimes.sort_unstable();
        extimes.dedup();

        times.retain(|t| extimes.binary_search(t).is_err());
        times
    }

    /// All occurrences within `[start, end]`, both endpoints inclusive,
    /// ascending and unique, in the recurrence's frame.
    #[must_use]
    pub fn times_in_interval(&self, start: &CalDateTime, end: &CalDateTime) -> Vec<CalDateTime> {
        let mut times: Vec<CalDateTime> = Vec::new();
        for rule in &self.rrules {
            times.extend(rule.times_in_interval(start, end));
        }
        if self.in_range(&self.start, start, end) {
            times.push(self.start.clone());
        }
        for t in &self.rdatetimes {
            if self.in_range(t, start, end) {
                times.push(t.clone());
            }
        }
        for d in &self.rdates {
            let occ = self.promote_date(*d);
            if self.in_range(&occ, start, end) {
                times.push(occ);
            }
        }
        times.sort();
        times.dedup();

        times.retain(|t| self.exdates.binary_search(&self.frame_date(t)).is_err());

        let mut extimes: Vec<CalDateTime> = Vec::new();
        for rule in &self.exrules {
            extimes.extend(rule.times_in_interval(start, end));
        }
        extimes.extend(self.exdatetimes.iter().cloned());
        extimes.sort();
        extimes.dedup();
        times.retain(|t| extimes.binary_search(t).is_err());

        times
    }

    /// The earliest occurrence strictly after `after`, or `None` when the
    /// recurrence is exhausted or the exclusion retry budget runs out.
    #[must_use]
    pub fn next_datetime(&self, after: &CalDateTime) -> Option<CalDateTime> {
        let mut cursor = after.clone();
        for _ in 0..self.iteration_budget {
            // Gather the earliest candidate from the anchor, the explicit
            // lists and every rule, then test it against the exclusions.
            let mut candidates: Vec<CalDateTime> = Vec::new();
            if self.start > cursor {
                candidates.push(self.start.clone());
            }
            let i = self.rdatetimes.partition_point(|t| t <= &cursor);
            if let Some(t) = self.rdatetimes.get(i) {
                candidates.push(t.clone());
            }
            for d in &self.rdates {
                let occ = self.promote_date(*d);
                if occ > cursor {
                    candidates.push(occ);
                    break;
                }
            }
            for rule in &self.rrules {
                if let Some(t) = rule.next_after(&cursor) {
                    candidates.push(t);
                }
            }

            let next = candidates.into_iter().min()?;
            if !self.is_excluded(&next) {
                return Some(next);
            }
            cursor = next;
        }
        log::warn!(
            "gave up finding the next occurrence after {} exclusion retries",
            self.iteration_budget
        );
        None
    }

    /// The latest occurrence strictly before `before`; the mirror of
    /// [`next_datetime`](Self::next_datetime).
    #[must_use]
    pub fn previous_datetime(&self, before: &CalDateTime) -> Option<CalDateTime> {
        let mut cursor = before.clone();
        for _ in 0..self.iteration_budget {
            let mut candidates: Vec<CalDateTime> = Vec::new();
            if self.start < cursor {
                candidates.push(self.start.clone());
            }
            let i = self.rdatetimes.partition_point(|t| t < &cursor);
            if i > 0 {
                if let Some(t) = self.rdatetimes.get(i - 1) {
                    candidates.push(t.clone());
                }
            }
            for d in self.rdates.iter().rev() {
                let occ = self.promote_date(*d);
                if occ < cursor {
                    candidates.push(occ);
                    break;
                }
            }
            for rule in &self.rrules {
                if let Some(t) = rule.previous_before(&cursor) {
                    candidates.push(t);
                }
            }

            let prev = candidates.into_iter().max()?;
            if !self.is_excluded(&prev) {
                return Some(prev);
            }
            cursor = prev;
        }
        log::warn!(
            "gave up finding the previous occurrence after {} exclusion retries",
            self.iteration_budget
        );
        None
    }

    /// The end of the whole recurrence: the latest of the anchor, the
    /// explicit inclusions and every rule's end. `None` when any rule never
    /// terminates.
    #[must_use]
    pub fn end_datetime(&self) -> Option<CalDateTime> {
        let mut ends: Vec<CalDateTime> = vec![self.start.clone()];
        if let Some(d) = self.rdates.last() {
            ends.push(self.promote_date(*d));
        }
        if let Some(t) = self.rdatetimes.last() {
            ends.push(t.clone());
        }
        for rule in &self.rrules {
            // One infinite rule makes the whole recurrence infinite.
            ends.push(rule.end_datetime()?);
        }
        ends.into_iter().max()
    }

    /// The end date of the whole recurrence.
    #[must_use]
    pub fn end_date(&self) -> Option<Date> {
        self.end_datetime().map(|t| t.date())
    }

    /// Bound the first inclusion rule (created on demand) to end on `date`.
    pub fn set_end_date(&mut self, date: Date) {
        let until = if self.all_day {
            CalDateTime::Date(date)
        } else {
            self.promote_date(date)
        };
        self.set_end_datetime(until);
    }

    /// Bound the first inclusion rule (created on demand) to end at `t`.
    pub fn set_end_datetime(&mut self, t: CalDateTime) {
        if self.read_only {
            return;
        }
        let Some(rule) = self.default_rrule_mut(true) else {
            return;
        };
        let _ = rule.set_termination(Termination::Until(t));
        self.updated();
    }

    /// Reinterpret every stored zoned instant and every rule as if its
    /// wall-clock reading always belonged to `new_zone`; see
    /// [`CalDateTime::shift_zone`]. A no-op when the zones are the same.
    pub fn shift_times(&mut self, old_zone: &TimeZone, new_zone: &TimeZone) {
        if self.read_only || same_zone(old_zone, new_zone) {
            return;
        }
        self.start = self.start.shift_zone(old_zone, new_zone);
        for t in &mut self.rdatetimes {
            *t = t.shift_zone(old_zone, new_zone);
        }
        for t in &mut self.exdatetimes {
            *t = t.shift_zone(old_zone, new_zone);
        }
        for rule in self.rrules.iter_mut().chain(self.exrules.iter_mut()) {
            rule.shift_times(old_zone, new_zone);
        }
        self.updated();
    }

    // The traditional single-rule convenience surface. These operate on the
    // first inclusion rule, the way calendar editors expect, and silently
    // ignore out-of-range input.

    /// The first rule's interval, or 0 without rules.
    #[must_use]
    pub fn frequency(&self) -> u32 {
        self.rrules.first().map_or(0, RecurrenceRule::frequency)
    }

    /// Change the first rule's interval, creating the rule on demand.
    pub fn set_frequency(&mut self, frequency: u32) {
        if self.read_only || frequency < 1 {
            return;
        }
        if let Some(rule) = self.default_rrule_mut(true) {
            let _ = rule.set_frequency(frequency);
            self.updated();
        }
    }

    /// The first rule's occurrence count, `-1` when it never ends, the
    /// derived count for an until-bounded rule, or 0 without rules.
    #[must_use]
    pub fn duration(&self) -> i64 {
        self.rrules.first().map_or(0, RecurrenceRule::duration)
    }

    /// Terminate the first rule (created on demand) after `duration`
    /// occurrences, or never for `-1`. Other values are ignored.
    pub fn set_duration(&mut self, duration: i64) {
        if self.read_only {
            return;
        }
        let termination = match u32::try_from(duration) {
            Ok(n) if n >= 1 => Termination::Count(n),
            _ if duration == -1 => Termination::Never,
            _ => return,
        };
        if let Some(rule) = self.default_rrule_mut(true) {
            let _ = rule.set_termination(termination);
            self.updated();
        }
    }

    /// The number of the first rule's occurrences at or before `t`.
    #[must_use]
    pub fn duration_to(&self, t: &CalDateTime) -> i64 {
        self.rrules.first().map_or(0, |r| r.duration_to(t))
    }

    /// The number of the first rule's occurrences up to the end of `date`.
    #[must_use]
    pub fn duration_to_date(&self, date: Date) -> i64 {
        let probe = match self.start.zone() {
            Some(tz) => day_end_in(date, tz),
            None => CalDateTime::Floating(DateTime::from_parts(date, end_of_day())),
        };
        self.duration_to(&probe)
    }

    /// The first rule's week start, defaulting to Monday.
    #[must_use]
    pub fn week_start(&self) -> Weekday {
        self.rrules
            .first()
            .map_or(Weekday::Monday, RecurrenceRule::week_start)
    }

    /// The weekdays a weekly recurrence falls on: the offset-free BYDAY
    /// entries of the first rule.
    #[must_use]
    pub fn weekly_days(&self) -> Vec<Weekday> {
        self.rrules.first().map_or_else(Vec::new, |r| {
            r.by_days()
                .iter()
                .filter(|p| p.offset == 0)
                .map(|p| p.weekday)
                .collect()
        })
    }

    /// The first rule's BYMONTHDAY list.
    #[must_use]
    pub fn month_days(&self) -> Vec<i8> {
        self.rrules
            .first()
            .map_or_else(Vec::new, |r| r.by_month_days().to_vec())
    }

    /// The first rule's BYDAY list, as monthly positions.
    #[must_use]
    pub fn month_positions(&self) -> Vec<WeekdayPos> {
        self.rrules
            .first()
            .map_or_else(Vec::new, |r| r.by_days().to_vec())
    }

    /// The first rule's BYYEARDAY list.
    #[must_use]
    pub fn year_days(&self) -> Vec<i16> {
        self.rrules
            .first()
            .map_or_else(Vec::new, |r| r.by_year_days().to_vec())
    }

    /// The days of the month a yearly recurrence falls on (its BYMONTHDAY
    /// list).
    #[must_use]
    pub fn year_dates(&self) -> Vec<i8> {
        self.rrules
            .first()
            .map_or_else(Vec::new, |r| r.by_month_days().to_vec())
    }

    /// The first rule's BYMONTH list.
    #[must_use]
    pub fn year_months(&self) -> Vec<i8> {
        self.rrules
            .first()
            .map_or_else(Vec::new, |r| r.by_months().to_vec())
    }

    /// The first rule's BYDAY list, as yearly positions.
    #[must_use]
    pub fn year_positions(&self) -> Vec<WeekdayPos> {
        self.rrules
            .first()
            .map_or_else(Vec::new, |r| r.by_days().to_vec())
    }

    /// Replace the inclusion rules with a fresh minutely rule.
    pub fn set_minutely(&mut self, frequency: u32) {
        self.set_new_recurrence_type(PeriodType::Minutely, frequency, None);
    }

    /// Replace the inclusion rules with a fresh hourly rule.
    pub fn set_hourly(&mut self, frequency: u32) {
        self.set_new_recurrence_type(PeriodType::Hourly, frequency, None);
    }

    /// Replace the inclusion rules with a fresh daily rule.
    pub fn set_daily(&mut self, frequency: u32) {
        self.set_new_recurrence_type(PeriodType::Daily, frequency, None);
    }

    /// Replace the inclusion rules with a fresh weekly rule starting its
    /// weeks on `week_start`.
    pub fn set_weekly(&mut self, frequency: u32, week_start: Weekday) {
        self.set_new_recurrence_type(PeriodType::Weekly, frequency, Some(week_start));
    }

    /// Replace the inclusion rules with a fresh monthly rule.
    pub fn set_monthly(&mut self, frequency: u32) {
        self.set_new_recurrence_type(PeriodType::Monthly, frequency, None);
    }

    /// Replace the inclusion rules with a fresh yearly rule.
    pub fn set_yearly(&mut self, frequency: u32) {
        self.set_new_recurrence_type(PeriodType::Yearly, frequency, None);
    }

    /// Add plain weekdays to the first rule's BYDAY list. The rule must
    /// already exist.
    pub fn add_weekly_days(&mut self, weekdays: &[Weekday]) {
        let positions: Vec<WeekdayPos> =
            weekdays.iter().map(|&w| WeekdayPos::every(w)).collect();
        self.add_positions(&positions);
    }

    /// Add the n-th `weekday` of the month to the first rule's BYDAY list.
    /// The rule must already exist.
    pub fn add_monthly_pos(&mut self, pos: i8, weekday: Weekday) {
        // 53 is allowed so yearly rules can share this entry point.
        if !(-53..=53).contains(&pos) {
            return;
        }
        self.add_positions(&[WeekdayPos::nth(pos, weekday)]);
    }

    /// Add a day of the month to the first rule's BYMONTHDAY list, creating
    /// the rule on demand.
    pub fn add_monthly_date(&mut self, day: i8) {
        if self.read_only || day == 0 || !(-31..=31).contains(&day) {
            return;
        }
        let Some(rule) = self.default_rrule_mut(true) else {
            return;
        };
        let mut days = rule.by_month_days().to_vec();
        if days.contains(&day) {
            return;
        }
        days.push(day);
        if rule.set_by_month_days(days).is_ok() {
            self.updated();
        }
    }

    /// Add a day number within the year to the first rule's BYYEARDAY list.
    /// The rule must already exist.
    pub fn add_yearly_day(&mut self, day: i16) {
        if self.read_only || day == 0 || !(-366..=366).contains(&day) {
            return;
        }
        let Some(rule) = self.default_rrule_mut(false) else {
            return;
        };
        let mut days = rule.by_year_days().to_vec();
        if days.contains(&day) {
            return;
        }
        days.push(day);
        if rule.set_by_year_days(days).is_ok() {
            self.updated();
        }
    }

    /// Add the day-of-month part of a yearly date; the month comes from
    /// [`add_yearly_month`](Self::add_yearly_month).
    pub fn add_yearly_date(&mut self, day: i8) {
        self.add_monthly_date(day);
    }

    /// Add a month to the first rule's BYMONTH list. The rule must already
    /// exist.
    pub fn add_yearly_month(&mut self, month: i8) {
        if self.read_only || !(1..=12).contains(&month) {
            return;
        }
        let Some(rule) = self.default_rrule_mut(false) else {
            return;
        };
        let mut months = rule.by_months().to_vec();
        if months.contains(&month) {
            return;
        }
        months.push(month);
        if rule.set_by_months(months).is_ok() {
            self.updated();
        }
    }

    /// Add the n-th `weekday` of a yearly recurrence, positioned within the
    /// year or, with BYMONTH set, within the month.
    pub fn add_yearly_pos(&mut self, pos: i8, weekday: Weekday) {
        self.add_monthly_pos(pos, weekday);
    }

    // Internal plumbing

    fn updated(&self) {
        self.cached_kind.set(None);
        self.observers.notify(self);
    }

    fn set_new_recurrence_type(
        &mut self,
        period: PeriodType,
        frequency: u32,
        week_start: Option<Weekday>,
    ) {
        if self.read_only || frequency < 1 {
            return;
        }
        let Ok(mut rule) = RecurrenceRule::new(period, frequency) else {
            return;
        };
        rule.set_start(self.start.clone());
        rule.set_all_day(self.all_day);
        if let Some(week_start) = week_start {
            rule.set_week_start(week_start);
        }
        self.rrules.clear();
        self.rrules.push(rule);
        self.updated();
    }

    fn add_positions(&mut self, positions: &[WeekdayPos]) {
        if self.read_only {
            return;
        }
        let Some(rule) = self.default_rrule_mut(false) else {
            return;
        };
        let mut by_days = rule.by_days().to_vec();
        let mut changed = false;
        for p in positions {
            if !by_days.contains(p) {
                by_days.push(*p);
                changed = true;
            }
        }
        if changed && rule.set_by_days(by_days).is_ok() {
            self.updated();
        }
    }

    fn default_rrule_mut(&mut self, create: bool) -> Option<&mut RecurrenceRule> {
        if self.rrules.is_empty() {
            if !create || self.read_only {
                return None;
            }
            let mut rule = RecurrenceRule::default();
            rule.set_start(self.start.clone());
            rule.set_all_day(self.all_day);
            self.rrules.push(rule);
        }
        self.rrules.first_mut()
    }

    /// An explicit inclusion date as an occurrence: at the anchor's time
    /// (or as a bare date for all-day recurrences), in the anchor's frame.
    fn promote_date(&self, date: Date) -> CalDateTime {
        if self.all_day {
            return CalDateTime::Date(date);
        }
        let time = self.start.time().unwrap_or_else(start_of_day);
        let dt = DateTime::from_parts(date, time);
        match self.start.zone() {
            Some(tz) => dt
                .to_zoned(tz.clone())
                .map_or(CalDateTime::Floating(dt), CalDateTime::Zoned),
            None => CalDateTime::Floating(dt),
        }
    }

    fn frame_date(&self, t: &CalDateTime) -> Date {
        match self.start.zone() {
            Some(tz) => t.date_in(tz),
            None => t.date(),
        }
    }

    /// Closed-interval membership in the recurrence's frame, lifting
    /// date-only bounds to their day boundaries.
    fn in_range(&self, t: &CalDateTime, start: &CalDateTime, end: &CalDateTime) -> bool {
        let zone = self.start.zone();
        let civil = |v: &CalDateTime, at_end: bool| match (zone, v) {
            (Some(tz), CalDateTime::Zoned(z)) => z.with_time_zone(tz.clone()).datetime(),
            _ if at_end => v.civil_end(),
            _ => v.civil(),
        };
        let ft = civil(t, false);
        civil(start, false) <= ft && ft <= civil(end, true)
    }

    fn is_excluded(&self, t: &CalDateTime) -> bool {
        self.exdates.binary_search(&self.frame_date(t)).is_ok()
            || self.exdatetimes.binary_search(t).is_ok()
            || self.exrules.iter().any(|r| r.recurs_at(t))
    }
}

impl Default for Recurrence {
    fn default() -> Self {
        Recurrence::new(CalDateTime::Floating(DateTime::ZERO))
    }
}

impl Clone for Recurrence {
    /// Deep-copies the rules and the date lists; observers are not carried
    /// over, and the classification is recomputed on demand.
    fn clone(&self) -> Self {
        Recurrence {
            start: self.start.clone(),
            all_day: self.all_day,
            read_only: self.read_only,
            rrules: self.rrules.clone(),
            exrules: self.exrules.clone(),
            rdates: self.rdates.clone(),
            exdates: self.exdates.clone(),
            rdatetimes: self.rdatetimes.clone(),
            exdatetimes: self.exdatetimes.clone(),
            cached_kind: Cell::new(None),
            observers: ObserverRegistry::default(),
            iteration_budget: self.iteration_budget,
        }
    }
}

impl PartialEq for Recurrence {
    /// Structural equality over the anchor, the flags, the four explicit
    /// lists and both rule lists; observers and caches do not participate.
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.all_day == other.all_day
            && self.read_only == other.read_only
            && self.rdates == other.rdates
            && self.exdates == other.exdates
            && self.rdatetimes == other.rdatetimes
            && self.exdatetimes == other.exdatetimes
            && self.rrules == other.rrules
            && self.exrules == other.exrules
    }
}

impl Eq for Recurrence {}

fn day_end_in(date: Date, zone: &TimeZone) -> CalDateTime {
    let dt = DateTime::from_parts(date, end_of_day());
    dt.to_zoned(zone.clone())
        .map_or(CalDateTime::Floating(dt), CalDateTime::Zoned)
}

fn sorted_unique<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort();
    values.dedup();
    values
}

fn insert_sorted<T: Ord>(list: &mut Vec<T>, value: T) {
    if let Err(i) = list.binary_search(&value) {
        list.insert(i, value);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use jiff::civil::{date, datetime};

    use super::*;
    use crate::observer::RecurrenceObserver;

    struct CountingObserver {
        notifications: u32,
    }

    impl RecurrenceObserver for CountingObserver {
        fn recurrence_updated(&mut self, _recurrence: &Recurrence) {
            self.notifications += 1;
        }
    }

    fn timed_recurrence() -> Recurrence {
        Recurrence::new(CalDateTime::Floating(datetime(2022, 3, 1, 8, 0, 0, 0)))
    }

    #[test]
    fn keeps_date_lists_sorted_and_unique() {
        let mut rec = timed_recurrence();
        rec.add_exdate(date(2022, 3, 5));
        rec.add_exdate(date(2022, 3, 2));
        rec.add_exdate(date(2022, 3, 5));
        assert_eq!(rec.exdates(), &[date(2022, 3, 2), date(2022, 3, 5)]);

        rec.set_rdates(vec![date(2022, 4, 2), date(2022, 4, 1), date(2022, 4, 2)]);
        assert_eq!(rec.rdates(), &[date(2022, 4, 1), date(2022, 4, 2)]);
    }

    #[test]
    fn read_only_mutators_are_no_ops() {
        let mut rec = timed_recurrence();
        rec.set_read_only(true);
        rec.add_rdate(date(2022, 3, 10));
        rec.set_daily(1);
        rec.set_all_day(true);
        rec.clear();
        assert!(rec.rdates().is_empty());
        assert!(rec.rrules().is_empty());
        assert!(!rec.all_day());
    }

    #[test]
    fn set_all_day_is_idempotent_and_notifies_once() {
        let mut rec = timed_recurrence();
        let counting = Rc::new(RefCell::new(CountingObserver { notifications: 0 }));
        let handle: ObserverHandle = counting.clone();
        rec.add_observer(&handle);
        rec.add_observer(&handle); // idempotent registration

        rec.set_all_day(true);
        rec.set_all_day(true);
        assert_eq!(counting.borrow().notifications, 1);
        assert!(rec.all_day());
    }

    #[test]
    fn dropping_an_observer_handle_detaches_it() {
        let mut rec = timed_recurrence();
        let observer: ObserverHandle =
            Rc::new(RefCell::new(CountingObserver { notifications: 0 }));
        rec.add_observer(&observer);
        drop(observer);
        // Must not panic or notify a dead listener.
        rec.add_rdate(date(2022, 3, 10));
    }

    #[test]
    fn mutation_invalidates_the_classification_cache() {
        let mut rec = timed_recurrence();
        rec.set_daily(1);
        assert_eq!(rec.kind(), RecurrenceKind::Daily);
        rec.set_weekly(1, Weekday::Monday);
        assert_eq!(rec.kind(), RecurrenceKind::Weekly);
    }

    #[test]
    fn set_start_cascades_to_rules() {
        let mut rec = timed_recurrence();
        rec.set_daily(1);
        let start = CalDateTime::Floating(datetime(2023, 1, 1, 10, 0, 0, 0));
        rec.set_start_datetime(start.clone());
        assert_eq!(rec.rrules()[0].start(), &start);
    }

    #[test]
    fn cloning_detaches_observers_and_rules() {
        let mut rec = timed_recurrence();
        rec.set_daily(1);
        let counting = Rc::new(RefCell::new(CountingObserver { notifications: 0 }));
        let handle: ObserverHandle = counting.clone();
        rec.add_observer(&handle);

        let mut copy = rec.clone();
        assert_eq!(copy, rec);
        copy.set_frequency(3);
        // The copy's mutation reaches neither the original nor its observers.
        assert_eq!(rec.frequency(), 1);
        assert_eq!(counting.borrow().notifications, 0);
    }

    #[test]
    fn equality_ignores_observers_and_cache() {
        let mut a = timed_recurrence();
        let mut b = timed_recurrence();
        a.set_daily(2);
        b.set_daily(2);
        let _ = a.kind();
        assert_eq!(a, b);
        b.add_exdate(date(2022, 3, 3));
        assert_ne!(a, b);
    }
}
