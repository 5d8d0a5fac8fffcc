// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Coarse classification of a recurrence, for interfaces that only care
//! about the traditional editing categories.

use crate::rule::{PeriodType, RecurrenceRule};

/// The editing category a recurrence falls into, derived from its first
/// inclusion rule.
///
/// Rules using the filters the categories predate (BYSETPOS, BYWEEKNO,
/// BYSECOND, BYMINUTE, BYHOUR) classify as [`Other`](RecurrenceKind::Other).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceKind {
    /// Does not recur.
    None,
    /// Every N minutes.
    Minutely,
    /// Every N hours.
    Hourly,
    /// Every N days.
    Daily,
    /// Weekly, possibly on a set of weekdays.
    Weekly,
    /// Monthly on fixed days of the month.
    MonthlyDay,
    /// Monthly on positional weekdays (e.g. the last Friday).
    MonthlyPos,
    /// Yearly on a month-and-day date.
    YearlyMonth,
    /// Yearly on a day-of-year number.
    YearlyDay,
    /// Yearly on a positional weekday within a month.
    YearlyPos,
    /// Anything the categories above cannot express.
    Other,
}

impl RecurrenceKind {
    /// Classify a single rule; `None` input means "no rule at all".
    #[must_use]
    pub fn of_rule(rule: Option<&RecurrenceRule>) -> RecurrenceKind {
        let Some(rule) = rule else {
            return RecurrenceKind::None;
        };

        if !rule.by_set_pos().is_empty()
            || !rule.by_seconds().is_empty()
            || !rule.by_week_numbers().is_empty()
            || !rule.by_minutes().is_empty()
            || !rule.by_hours().is_empty()
        {
            return RecurrenceKind::Other;
        }

        // The categories only combine BYDAY with weekly and coarser rules,
        // BYMONTHDAY with monthly and yearly ones, BYMONTH and BYYEARDAY
        // with yearly ones.
        if !rule.by_year_days().is_empty() && rule.period() != PeriodType::Yearly
            || !rule.by_months().is_empty() && rule.period() != PeriodType::Yearly
        {
            return RecurrenceKind::Other;
        }
        if !rule.by_days().is_empty()
            && !matches!(
                rule.period(),
                PeriodType::Yearly | PeriodType::Monthly | PeriodType::Weekly
            )
        {
            return RecurrenceKind::Other;
        }

        match rule.period() {
            PeriodType::None => RecurrenceKind::None,
            PeriodType::Minutely => RecurrenceKind::Minutely,
            PeriodType::Hourly => RecurrenceKind::Hourly,
            PeriodType::Daily => RecurrenceKind::Daily,
            PeriodType::Weekly => RecurrenceKind::Weekly,
            PeriodType::Monthly => {
                if rule.by_days().is_empty() {
                    RecurrenceKind::MonthlyDay
                } else if rule.by_month_days().is_empty() {
                    RecurrenceKind::MonthlyPos
                } else {
                    // Both positional and date constraints at once.
                    RecurrenceKind::Other
                }
            }
            PeriodType::Yearly => {
                if !rule.by_days().is_empty() {
                    if rule.by_month_days().is_empty() && rule.by_year_days().is_empty() {
                        RecurrenceKind::YearlyPos
                    } else {
                        RecurrenceKind::Other
                    }
                } else if !rule.by_year_days().is_empty() {
                    if rule.by_months().is_empty() && rule.by_month_days().is_empty() {
                        RecurrenceKind::YearlyDay
                    } else {
                        RecurrenceKind::Other
                    }
                } else {
                    RecurrenceKind::YearlyMonth
                }
            }
            PeriodType::Secondly => RecurrenceKind::Other,
        }
    }
}
