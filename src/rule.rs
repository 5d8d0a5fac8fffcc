// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Recurrence rules: one RFC 5545 RRULE/EXRULE and its evaluation.

mod iter;

use std::fmt::{self, Display};

use jiff::civil::{Date, Time, Weekday};
use jiff::tz::TimeZone;

use crate::CalDateTime;
use crate::datetime::{same_zone, start_of_day};
use crate::error::InvalidRule;
use crate::rule::iter::RuleIter;

/// The base unit a rule repeats in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum PeriodType {
    /// The rule never recurs.
    #[default]
    None,
    /// Repeats every `frequency` seconds.
    Secondly,
    /// Repeats every `frequency` minutes.
    Minutely,
    /// Repeats every `frequency` hours.
    Hourly,
    /// Repeats every `frequency` days.
    Daily,
    /// Repeats every `frequency` weeks.
    Weekly,
    /// Repeats every `frequency` months.
    Monthly,
    /// Repeats every `frequency` years.
    Yearly,
}

impl Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeriodType::None => "NONE",
            PeriodType::Secondly => "SECONDLY",
            PeriodType::Minutely => "MINUTELY",
            PeriodType::Hourly => "HOURLY",
            PeriodType::Daily => "DAILY",
            PeriodType::Weekly => "WEEKLY",
            PeriodType::Monthly => "MONTHLY",
            PeriodType::Yearly => "YEARLY",
        };
        f.write_str(name)
    }
}

/// A BYDAY entry: a weekday with an optional ordinal position.
///
/// An offset of 0 selects every such weekday within the base period; ±n
/// selects the n-th from the start or end of the enclosing month or year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayPos {
    /// Ordinal position, 0 for "every", in `-53..=53`.
    pub offset: i8,
    /// The day of the week.
    pub weekday: Weekday,
}

impl WeekdayPos {
    /// Every occurrence of `weekday` within the period.
    #[must_use]
    pub fn every(weekday: Weekday) -> Self {
        WeekdayPos { offset: 0, weekday }
    }

    /// The n-th `weekday` of the enclosing month or year.
    #[must_use]
    pub fn nth(offset: i8, weekday: Weekday) -> Self {
        WeekdayPos { offset, weekday }
    }

    fn sort_key(self) -> (i8, i8) {
        (self.offset, self.weekday.to_monday_zero_offset())
    }
}

impl Display for WeekdayPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset != 0 {
            write!(f, "{}", self.offset)?;
        }
        let day = match self.weekday {
            Weekday::Monday => "MO",
            Weekday::Tuesday => "TU",
            Weekday::Wednesday => "WE",
            Weekday::Thursday => "TH",
            Weekday::Friday => "FR",
            Weekday::Saturday => "SA",
            Weekday::Sunday => "SU",
        };
        f.write_str(day)
    }
}

/// How a rule stops producing occurrences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Termination {
    /// The rule recurs forever.
    #[default]
    Never,
    /// The rule emits exactly this many occurrences.
    Count(u32),
    /// The rule emits occurrences up to and including this instant.
    Until(CalDateTime),
}

impl Termination {
    /// Build a termination from codec-level COUNT and UNTIL parts.
    ///
    /// # Errors
    ///
    /// Rejects a zero count and the mutually exclusive combination.
    pub fn try_from_parts(
        count: Option<u32>,
        until: Option<CalDateTime>,
    ) -> Result<Self, InvalidRule> {
        match (count, until) {
            (Some(_), Some(_)) => Err(InvalidRule::ConflictingTermination),
            (Some(0), None) => Err(InvalidRule::ZeroCount),
            (Some(n), None) => Ok(Termination::Count(n)),
            (None, Some(t)) => Ok(Termination::Until(t)),
            (None, None) => Ok(Termination::Never),
        }
    }
}

/// One recurrence rule: frequency, base period, termination and BY-filters,
/// anchored at a start instant.
///
/// Occurrences are generated by the classical two-phase iCalendar procedure:
/// base periods are walked from the period containing the anchor at the
/// rule's interval, each period is expanded through the BY-filters (a filter
/// at a coarser unit than the frequency expands, a finer-or-equal one
/// limits), BYSETPOS selects positions from the period's sorted candidate
/// set, and termination cuts the stream off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    period: PeriodType,
    frequency: u32,
    start: CalDateTime,
    termination: Termination,
    week_start: Weekday,
    all_day: bool,
    by_seconds: Vec<u8>,
    by_minutes: Vec<u8>,
    by_hours: Vec<u8>,
    by_days: Vec<WeekdayPos>,
    by_month_days: Vec<i8>,
    by_year_days: Vec<i16>,
    by_week_numbers: Vec<i8>,
    by_months: Vec<i8>,
    by_set_pos: Vec<i16>,
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        RecurrenceRule {
            period: PeriodType::None,
            frequency: 1,
            start: CalDateTime::Floating(jiff::civil::DateTime::ZERO),
            termination: Termination::Never,
            week_start: Weekday::Monday,
            all_day: false,
            by_seconds: Vec::new(),
            by_minutes: Vec::new(),
            by_hours: Vec::new(),
            by_days: Vec::new(),
            by_month_days: Vec::new(),
            by_year_days: Vec::new(),
            by_week_numbers: Vec::new(),
            by_months: Vec::new(),
            by_set_pos: Vec::new(),
        }
    }
}

impl RecurrenceRule {
    /// A rule with the given base period and interval, anchored nowhere in
    /// particular until [`set_start`](Self::set_start) is called.
    ///
    /// # Errors
    ///
    /// Rejects a frequency below 1.
    pub fn new(period: PeriodType, frequency: u32) -> Result<Self, InvalidRule> {
        if frequency < 1 {
            return Err(InvalidRule::Frequency(frequency));
        }
        Ok(RecurrenceRule {
            period,
            frequency,
            ..RecurrenceRule::default()
        })
    }

    /// The base period unit.
    #[must_use]
    pub fn period(&self) -> PeriodType {
        self.period
    }

    /// Change the base period unit.
    pub fn set_period(&mut self, period: PeriodType) {
        self.period = period;
    }

    /// The interval between base periods.
    #[must_use]
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Change the interval between base periods.
    ///
    /// # Errors
    ///
    /// Rejects a frequency below 1.
    pub fn set_frequency(&mut self, frequency: u32) -> Result<(), InvalidRule> {
        if frequency < 1 {
            return Err(InvalidRule::Frequency(frequency));
        }
        self.frequency = frequency;
        Ok(())
    }

    /// The anchor instant; the first candidate occurrence.
    #[must_use]
    pub fn start(&self) -> &CalDateTime {
        &self.start
    }

    /// Re-anchor the rule. The all-day flag follows the anchor's flavor.
    pub fn set_start(&mut self, start: CalDateTime) {
        self.all_day = start.is_date_only();
        self.start = start;
    }

    /// How the rule terminates.
    #[must_use]
    pub fn termination(&self) -> &Termination {
        &self.termination
    }

    /// Replace the termination.
    ///
    /// # Errors
    ///
    /// Rejects a zero count.
    pub fn set_termination(&mut self, termination: Termination) -> Result<(), InvalidRule> {
        if termination == Termination::Count(0) {
            return Err(InvalidRule::ZeroCount);
        }
        self.termination = termination;
        Ok(())
    }

    /// The weekday weeks start on; affects WEEKLY expansion and week
    /// numbering. Defaults to Monday.
    #[must_use]
    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    /// Change the week start.
    pub fn set_week_start(&mut self, week_start: Weekday) {
        self.week_start = week_start;
    }

    /// Whether occurrences are date-only.
    #[must_use]
    pub fn all_day(&self) -> bool {
        self.all_day
    }

    /// Switch between date-only and timed occurrences.
    pub fn set_all_day(&mut self, all_day: bool) {
        self.all_day = all_day;
    }

    /// The BYSECOND filter.
    #[must_use]
    pub fn by_seconds(&self) -> &[u8] {
        &self.by_seconds
    }

    /// Replace the BYSECOND filter.
    ///
    /// # Errors
    ///
    /// Rejects values above 60.
    pub fn set_by_seconds(&mut self, values: Vec<u8>) -> Result<(), InvalidRule> {
        for &v in &values {
            if v > 60 {
                return Err(InvalidRule::FilterOutOfRange {
                    filter: "BYSECOND",
                    value: i32::from(v),
                });
            }
        }
        self.by_seconds = sorted_unique(values);
        Ok(())
    }

    /// The BYMINUTE filter.
    #[must_use]
    pub fn by_minutes(&self) -> &[u8] {
        &self.by_minutes
    }

    /// Replace the BYMINUTE filter.
    ///
    /// # Errors
    ///
    /// Rejects values above 59.
    pub fn set_by_minutes(&mut self, values: Vec<u8>) -> Result<(), InvalidRule> {
        for &v in &values {
            if v > 59 {
                return Err(InvalidRule::FilterOutOfRange {
                    filter: "BYMINUTE",
                    value: i32::from(v),
                });
            }
        }
        self.by_minutes = sorted_unique(values);
        Ok(())
    }

    /// The BYHOUR filter.
    #[must_use]
    pub fn by_hours(&self) -> &[u8] {
        &self.by_hours
    }

    /// Replace the BYHOUR filter.
    ///
    /// # Errors
    ///
    /// Rejects values above 23.
    pub fn set_by_hours(&mut self, values: Vec<u8>) -> Result<(), InvalidRule> {
        for &v in &values {
            if v > 23 {
                return Err(InvalidRule::FilterOutOfRange {
                    filter: "BYHOUR",
                    value: i32::from(v),
                });
            }
        }
        self.by_hours = sorted_unique(values);
        Ok(())
    }

    /// The BYDAY filter.
    #[must_use]
    pub fn by_days(&self) -> &[WeekdayPos] {
        &self.by_days
    }

    /// Replace the BYDAY filter.
    ///
    /// # Errors
    ///
    /// Rejects ordinal offsets outside `-53..=53`.
    pub fn set_by_days(&mut self, values: Vec<WeekdayPos>) -> Result<(), InvalidRule> {
        for v in &values {
            if !(-53..=53).contains(&v.offset) {
                return Err(InvalidRule::FilterOutOfRange {
                    filter: "BYDAY",
                    value: i32::from(v.offset),
                });
            }
        }
        let mut values = values;
        values.sort_by_key(|p| p.sort_key());
        values.dedup();
        self.by_days = values;
        Ok(())
    }

    /// The BYMONTHDAY filter.
    #[must_use]
    pub fn by_month_days(&self) -> &[i8] {
        &self.by_month_days
    }

    /// Replace the BYMONTHDAY filter.
    ///
    /// # Errors
    ///
    /// Rejects zero and values outside `±(1..=31)`.
    pub fn set_by_month_days(&mut self, values: Vec<i8>) -> Result<(), InvalidRule> {
        check_signed(&values, "BYMONTHDAY", 31)?;
        self.by_month_days = sorted_unique(values);
        Ok(())
    }

    /// The BYYEARDAY filter.
    #[must_use]
    pub fn by_year_days(&self) -> &[i16] {
        &self.by_year_days
    }

    /// Replace the BYYEARDAY filter.
    ///
    /// # Errors
    ///
    /// Rejects zero and values outside `±(1..=366)`.
    pub fn set_by_year_days(&mut self, values: Vec<i16>) -> Result<(), InvalidRule> {
        check_signed(&values, "BYYEARDAY", 366)?;
        self.by_year_days = sorted_unique(values);
        Ok(())
    }

    /// The BYWEEKNO filter.
    #[must_use]
    pub fn by_week_numbers(&self) -> &[i8] {
        &self.by_week_numbers
    }

    /// Replace the BYWEEKNO filter.
    ///
    /// # Errors
    ///
    /// Rejects zero and values outside `±(1..=53)`.
    pub fn set_by_week_numbers(&mut self, values: Vec<i8>) -> Result<(), InvalidRule> {
        check_signed(&values, "BYWEEKNO", 53)?;
        self.by_week_numbers = sorted_unique(values);
        Ok(())
    }

    /// The BYMONTH filter.
    #[must_use]
    pub fn by_months(&self) -> &[i8] {
        &self.by_months
    }

    /// Replace the BYMONTH filter.
    ///
    /// # Errors
    ///
    /// Rejects values outside `1..=12`.
    pub fn set_by_months(&mut self, values: Vec<i8>) -> Result<(), InvalidRule> {
        for &v in &values {
            if !(1..=12).contains(&v) {
                return Err(InvalidRule::FilterOutOfRange {
                    filter: "BYMONTH",
                    value: i32::from(v),
                });
            }
        }
        self.by_months = sorted_unique(values);
        Ok(())
    }

    /// The BYSETPOS selector.
    #[must_use]
    pub fn by_set_pos(&self) -> &[i16] {
        &self.by_set_pos
    }

    /// Replace the BYSETPOS selector.
    ///
    /// # Errors
    ///
    /// Rejects zero and values outside `±(1..=366)`.
    pub fn set_by_set_pos(&mut self, values: Vec<i16>) -> Result<(), InvalidRule> {
        check_signed(&values, "BYSETPOS", 366)?;
        self.by_set_pos = sorted_unique(values);
        Ok(())
    }

    /// True iff `t` is an occurrence of this rule: at or after the anchor,
    /// before termination, on the period lattice and admitted by every
    /// BY-filter and the BYSETPOS selection.
    #[must_use]
    pub fn recurs_at(&self, t: &CalDateTime) -> bool {
        iter::recurs_at(self, t)
    }

    /// True iff any occurrence falls on `date` when read in `zone`.
    #[must_use]
    pub fn recurs_on(&self, date: Date, zone: &TimeZone) -> bool {
        if self.all_day {
            return self.recurs_at(&CalDateTime::Date(date));
        }
        !self.recur_times_on(date, zone).is_empty()
    }

    /// All occurrence wall-clock times whose date in `zone` equals `date`,
    /// ascending.
    #[must_use]
    pub fn recur_times_on(&self, date: Date, zone: &TimeZone) -> Vec<Time> {
        if self.all_day {
            return if self.recurs_at(&CalDateTime::Date(date)) {
                vec![start_of_day()]
            } else {
                Vec::new()
            };
        }
        iter::recur_times_on(self, date, zone)
    }

    /// All occurrences within `[start, end]`, both endpoints inclusive,
    /// ascending.
    #[must_use]
    pub fn times_in_interval(&self, start: &CalDateTime, end: &CalDateTime) -> Vec<CalDateTime> {
        iter::times_in_interval(self, start, end)
    }

    /// The smallest occurrence strictly greater than `after`.
    #[must_use]
    pub fn next_after(&self, after: &CalDateTime) -> Option<CalDateTime> {
        iter::next_after(self, after)
    }

    /// The largest occurrence strictly less than `before`.
    #[must_use]
    pub fn previous_before(&self, before: &CalDateTime) -> Option<CalDateTime> {
        iter::previous_before(self, before)
    }

    /// The total number of occurrences: the count for a counted rule, `-1`
    /// for a never-ending one, the derived count for an until-bounded one,
    /// and 0 for a rule that does not recur.
    #[must_use]
    pub fn duration(&self) -> i64 {
        if self.period == PeriodType::None {
            return 0;
        }
        match &self.termination {
            Termination::Never => -1,
            Termination::Count(n) => i64::from(*n),
            Termination::Until(_) => self.iter_all().count() as i64,
        }
    }

    /// The number of occurrences at or before `t`.
    #[must_use]
    pub fn duration_to(&self, t: &CalDateTime) -> i64 {
        iter::duration_to(self, t)
    }

    /// The last instant the rule covers: the computed final occurrence for a
    /// counted rule, the until instant for an until-bounded one, `None` for
    /// a never-ending one.
    #[must_use]
    pub fn end_datetime(&self) -> Option<CalDateTime> {
        if self.period == PeriodType::None {
            return None;
        }
        match &self.termination {
            Termination::Never => None,
            Termination::Until(u) => Some(u.clone()),
            Termination::Count(_) => iter::last_occurrence(self),
        }
    }

    /// Reinterpret the anchor and the until bound as if their wall-clock
    /// readings always belonged to `new_zone`, going through `old_zone` to
    /// preserve the absolute moment of the first projection.
    pub fn shift_times(&mut self, old_zone: &TimeZone, new_zone: &TimeZone) {
        if same_zone(old_zone, new_zone) {
            return;
        }
        self.start = self.start.shift_zone(old_zone, new_zone);
        if let Termination::Until(u) = &self.termination {
            self.termination = Termination::Until(u.shift_zone(old_zone, new_zone));
        }
    }

    pub(crate) fn iter_all(&self) -> RuleIter<'_> {
        iter::iter_from(self, None)
    }
}

impl Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={};INTERVAL={}", self.period, self.frequency)?;
        match &self.termination {
            Termination::Never => {}
            Termination::Count(n) => write!(f, ";COUNT={n}")?,
            Termination::Until(u) => write!(f, ";UNTIL={u}")?,
        }
        write_list(f, "BYSECOND", &self.by_seconds)?;
        write_list(f, "BYMINUTE", &self.by_minutes)?;
        write_list(f, "BYHOUR", &self.by_hours)?;
        write_list(f, "BYDAY", &self.by_days)?;
        write_list(f, "BYMONTHDAY", &self.by_month_days)?;
        write_list(f, "BYYEARDAY", &self.by_year_days)?;
        write_list(f, "BYWEEKNO", &self.by_week_numbers)?;
        write_list(f, "BYMONTH", &self.by_months)?;
        write_list(f, "BYSETPOS", &self.by_set_pos)?;
        Ok(())
    }
}

fn write_list<T: Display>(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    values: &[T],
) -> fmt::Result {
    let mut sep = '=';
    if !values.is_empty() {
        write!(f, ";{name}")?;
        for v in values {
            write!(f, "{sep}{v}")?;
            sep = ',';
        }
    }
    Ok(())
}

fn sorted_unique<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort_unstable();
    values.dedup();
    values
}

fn check_signed<T>(values: &[T], filter: &'static str, max: i32) -> Result<(), InvalidRule>
where
    T: Copy + Into<i32>,
{
    for &v in values {
        let v: i32 = v.into();
        if v == 0 {
            return Err(InvalidRule::ZeroPosition { filter });
        }
        if v.abs() > max {
            return Err(InvalidRule::FilterOutOfRange { filter, value: v });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use jiff::civil::datetime;

    use super::*;

    #[test]
    fn rejects_zero_frequency() {
        assert_eq!(
            RecurrenceRule::new(PeriodType::Daily, 0).unwrap_err(),
            InvalidRule::Frequency(0)
        );
    }

    #[test]
    fn rejects_out_of_range_filters() {
        let mut rule = RecurrenceRule::new(PeriodType::Daily, 1).unwrap();
        assert!(rule.set_by_seconds(vec![61]).is_err());
        assert!(rule.set_by_minutes(vec![60]).is_err());
        assert!(rule.set_by_hours(vec![24]).is_err());
        assert!(rule.set_by_months(vec![13]).is_err());
        assert!(rule.set_by_month_days(vec![32]).is_err());
        assert!(rule.set_by_year_days(vec![-367]).is_err());
        assert!(rule.set_by_week_numbers(vec![54]).is_err());
        assert!(
            rule.set_by_days(vec![WeekdayPos::nth(54, Weekday::Monday)])
                .is_err()
        );
    }

    #[test]
    fn rejects_zero_positions() {
        let mut rule = RecurrenceRule::new(PeriodType::Monthly, 1).unwrap();
        assert_eq!(
            rule.set_by_set_pos(vec![0]).unwrap_err(),
            InvalidRule::ZeroPosition { filter: "BYSETPOS" }
        );
        assert!(rule.set_by_month_days(vec![0]).is_err());
        assert!(rule.set_by_year_days(vec![0]).is_err());
        assert!(rule.set_by_week_numbers(vec![0]).is_err());
    }

    #[test]
    fn rejects_conflicting_termination_parts() {
        let until = CalDateTime::Floating(datetime(2021, 6, 30, 23, 59, 0, 0));
        assert_eq!(
            Termination::try_from_parts(Some(3), Some(until)).unwrap_err(),
            InvalidRule::ConflictingTermination
        );
        assert_eq!(
            Termination::try_from_parts(Some(0), None).unwrap_err(),
            InvalidRule::ZeroCount
        );
        assert_eq!(
            Termination::try_from_parts(None, None).unwrap(),
            Termination::Never
        );
    }

    #[test]
    fn normalizes_filter_lists() {
        let mut rule = RecurrenceRule::new(PeriodType::Monthly, 1).unwrap();
        rule.set_by_month_days(vec![15, 1, 15, -1]).unwrap();
        assert_eq!(rule.by_month_days(), &[-1, 1, 15]);
    }

    #[test]
    fn set_start_follows_all_day_flavor() {
        let mut rule = RecurrenceRule::new(PeriodType::Yearly, 1).unwrap();
        rule.set_start(CalDateTime::Date(jiff::civil::date(2020, 2, 29)));
        assert!(rule.all_day());
        rule.set_start(CalDateTime::Floating(datetime(2020, 2, 29, 9, 0, 0, 0)));
        assert!(!rule.all_day());
    }

    #[test]
    fn displays_in_rrule_shape() {
        let mut rule = RecurrenceRule::new(PeriodType::Weekly, 2).unwrap();
        rule.set_by_days(vec![
            WeekdayPos::every(Weekday::Monday),
            WeekdayPos::every(Weekday::Friday),
        ])
        .unwrap();
        rule.set_termination(Termination::Count(5)).unwrap();
        assert_eq!(
            rule.to_string(),
            "FREQ=WEEKLY;INTERVAL=2;COUNT=5;BYDAY=MO,FR"
        );
    }
}
