// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Expansion behavior of single recurrence rules.

use aimcal_recur::{CalDateTime, PeriodType, RecurrenceRule, Termination, WeekdayPos};
use jiff::civil::{Weekday, date, datetime};
use jiff::tz::TimeZone;

fn floating(year: i16, month: i8, day: i8, hour: i8, minute: i8) -> CalDateTime {
    CalDateTime::Floating(datetime(year, month, day, hour, minute, 0, 0))
}

fn rule_at(period: PeriodType, frequency: u32, start: CalDateTime) -> RecurrenceRule {
    let mut rule = RecurrenceRule::new(period, frequency).unwrap();
    rule.set_start(start);
    rule
}

fn expand(rule: &RecurrenceRule, from: CalDateTime, to: CalDateTime) -> Vec<CalDateTime> {
    rule.times_in_interval(&from, &to)
}

#[test]
fn daily_respects_interval_and_count() {
    let mut rule = rule_at(PeriodType::Daily, 3, floating(2022, 1, 1, 6, 30));
    rule.set_termination(Termination::Count(4)).unwrap();

    let times = expand(
        &rule,
        CalDateTime::Date(date(2022, 1, 1)),
        CalDateTime::Date(date(2022, 2, 1)),
    );
    assert_eq!(
        times,
        vec![
            floating(2022, 1, 1, 6, 30),
            floating(2022, 1, 4, 6, 30),
            floating(2022, 1, 7, 6, 30),
            floating(2022, 1, 10, 6, 30),
        ]
    );
    assert_eq!(rule.duration(), 4);
    assert_eq!(rule.end_datetime(), Some(floating(2022, 1, 10, 6, 30)));
}

#[test]
fn weekly_expands_listed_weekdays() {
    // Anchored on a Wednesday; Monday of the anchor week precedes the
    // anchor and must not appear.
    let mut rule = rule_at(PeriodType::Weekly, 1, floating(2022, 6, 1, 9, 0));
    rule.set_by_days(vec![
        WeekdayPos::every(Weekday::Monday),
        WeekdayPos::every(Weekday::Wednesday),
    ])
    .unwrap();

    let times = expand(
        &rule,
        CalDateTime::Date(date(2022, 5, 30)),
        CalDateTime::Date(date(2022, 6, 12)),
    );
    assert_eq!(
        times,
        vec![
            floating(2022, 6, 1, 9, 0),
            floating(2022, 6, 6, 9, 0),
            floating(2022, 6, 8, 9, 0),
        ]
    );
}

#[test]
fn weekly_ignores_positional_offsets() {
    // A positional BYDAY on WEEKLY is ill-formed; the offset reads as 0.
    let mut with_offset = rule_at(PeriodType::Weekly, 1, floating(2022, 6, 1, 9, 0));
    with_offset
        .set_by_days(vec![WeekdayPos::nth(3, Weekday::Wednesday)])
        .unwrap();
    let mut plain = rule_at(PeriodType::Weekly, 1, floating(2022, 6, 1, 9, 0));
    plain
        .set_by_days(vec![WeekdayPos::every(Weekday::Wednesday)])
        .unwrap();

    let from = CalDateTime::Date(date(2022, 6, 1));
    let to = CalDateTime::Date(date(2022, 6, 30));
    assert_eq!(
        expand(&with_offset, from.clone(), to.clone()),
        expand(&plain, from, to)
    );
}

#[test]
fn weekly_interval_respects_week_start() {
    // Saturday anchor, freq 2. With weeks starting Sunday, the following
    // Sunday opens a new week; with Monday weeks it stays in the same one.
    let mut sunday_weeks = rule_at(PeriodType::Weekly, 2, floating(2022, 1, 8, 12, 0));
    sunday_weeks.set_week_start(Weekday::Sunday);
    sunday_weeks
        .set_by_days(vec![
            WeekdayPos::every(Weekday::Saturday),
            WeekdayPos::every(Weekday::Sunday),
        ])
        .unwrap();

    let times = expand(
        &sunday_weeks,
        CalDateTime::Date(date(2022, 1, 8)),
        CalDateTime::Date(date(2022, 1, 23)),
    );
    // Week of Jan 2 (Sun-start) holds Jan 8; next selected week begins
    // Jan 16: its Sunday (16th) and Saturday (22nd) both recur.
    assert_eq!(
        times,
        vec![
            floating(2022, 1, 8, 12, 0),
            floating(2022, 1, 16, 12, 0),
            floating(2022, 1, 22, 12, 0),
        ]
    );
}

#[test]
fn monthly_short_months_yield_no_candidate() {
    let rule = rule_at(PeriodType::Monthly, 1, floating(2021, 1, 31, 10, 0));

    let times = expand(
        &rule,
        CalDateTime::Date(date(2021, 1, 1)),
        CalDateTime::Date(date(2021, 5, 31)),
    );
    // February, and April has only 30 days.
    assert_eq!(
        times,
        vec![
            floating(2021, 1, 31, 10, 0),
            floating(2021, 3, 31, 10, 0),
            floating(2021, 5, 31, 10, 0),
        ]
    );
}

#[test]
fn monthly_negative_month_day_counts_from_the_end() {
    let mut rule = rule_at(PeriodType::Monthly, 1, floating(2021, 1, 31, 10, 0));
    rule.set_by_month_days(vec![-1]).unwrap();

    let times = expand(
        &rule,
        CalDateTime::Date(date(2021, 1, 1)),
        CalDateTime::Date(date(2021, 4, 30)),
    );
    assert_eq!(
        times,
        vec![
            floating(2021, 1, 31, 10, 0),
            floating(2021, 2, 28, 10, 0),
            floating(2021, 3, 31, 10, 0),
            floating(2021, 4, 30, 10, 0),
        ]
    );
}

#[test]
fn yearly_by_year_day() {
    let mut rule = rule_at(PeriodType::Yearly, 1, floating(2020, 1, 1, 0, 0));
    rule.set_by_year_days(vec![100]).unwrap();

    let times = expand(
        &rule,
        CalDateTime::Date(date(2020, 1, 1)),
        CalDateTime::Date(date(2021, 12, 31)),
    );
    // Day 100 falls on April 9 in a leap year, April 10 otherwise.
    assert_eq!(
        times,
        vec![floating(2020, 4, 9, 0, 0), floating(2021, 4, 10, 0, 0)]
    );
}

#[test]
fn yearly_by_week_number() {
    // Weeks numbered from Monday; the anchor weekday carries into the
    // selected week.
    let rule = {
        let mut r = rule_at(PeriodType::Yearly, 1, floating(2021, 1, 4, 9, 0));
        r.set_by_week_numbers(vec![20]).unwrap();
        r
    };
    assert_eq!(
        rule.next_after(&floating(2021, 1, 5, 0, 0)),
        Some(floating(2021, 5, 17, 9, 0))
    );
}

#[test]
fn hourly_steps_on_the_wall_clock() {
    let mut rule = rule_at(PeriodType::Hourly, 5, floating(2022, 1, 1, 22, 0));
    rule.set_termination(Termination::Count(4)).unwrap();

    let times = expand(
        &rule,
        CalDateTime::Date(date(2022, 1, 1)),
        CalDateTime::Date(date(2022, 1, 3)),
    );
    assert_eq!(
        times,
        vec![
            floating(2022, 1, 1, 22, 0),
            floating(2022, 1, 2, 3, 0),
            floating(2022, 1, 2, 8, 0),
            floating(2022, 1, 2, 13, 0),
        ]
    );
}

#[test]
fn daily_by_hour_expands_within_the_day() {
    let mut rule = rule_at(PeriodType::Daily, 1, floating(2022, 1, 1, 9, 15));
    rule.set_by_hours(vec![9, 14]).unwrap();
    rule.set_termination(Termination::Count(4)).unwrap();

    let times = expand(
        &rule,
        CalDateTime::Date(date(2022, 1, 1)),
        CalDateTime::Date(date(2022, 1, 4)),
    );
    // The anchor minute fills in the unconstrained minutes.
    assert_eq!(
        times,
        vec![
            floating(2022, 1, 1, 9, 15),
            floating(2022, 1, 1, 14, 15),
            floating(2022, 1, 2, 9, 15),
            floating(2022, 1, 2, 14, 15),
        ]
    );
}

#[test]
fn until_bound_is_inclusive() {
    let mut rule = rule_at(PeriodType::Daily, 1, floating(2022, 1, 1, 12, 0));
    rule.set_termination(Termination::Until(floating(2022, 1, 3, 12, 0)))
        .unwrap();

    let times = expand(
        &rule,
        CalDateTime::Date(date(2022, 1, 1)),
        CalDateTime::Date(date(2022, 1, 10)),
    );
    assert_eq!(times.len(), 3);
    assert_eq!(rule.duration(), 3);
    assert_eq!(rule.end_datetime(), Some(floating(2022, 1, 3, 12, 0)));
}

#[test]
fn queries_below_the_anchor_are_empty() {
    let rule = rule_at(PeriodType::Daily, 1, floating(2022, 6, 1, 8, 0));
    assert!(!rule.recurs_at(&floating(2022, 5, 31, 8, 0)));
    assert!(
        expand(
            &rule,
            CalDateTime::Date(date(2022, 5, 1)),
            CalDateTime::Date(date(2022, 5, 31)),
        )
        .is_empty()
    );
    assert_eq!(rule.previous_before(&floating(2022, 6, 1, 8, 0)), None);
}

#[test]
fn next_and_previous_walk_the_same_stream() {
    let mut rule = rule_at(PeriodType::Weekly, 1, floating(2022, 6, 1, 9, 0));
    rule.set_by_days(vec![WeekdayPos::every(Weekday::Wednesday)])
        .unwrap();

    let next = rule.next_after(&floating(2022, 6, 1, 9, 0)).unwrap();
    assert_eq!(next, floating(2022, 6, 8, 9, 0));
    assert_eq!(
        rule.previous_before(&next),
        Some(floating(2022, 6, 1, 9, 0))
    );
}

#[test]
fn recurs_at_counts_terminated_rules() {
    let mut rule = rule_at(PeriodType::Daily, 1, floating(2022, 1, 1, 8, 0));
    rule.set_termination(Termination::Count(3)).unwrap();

    assert!(rule.recurs_at(&floating(2022, 1, 3, 8, 0)));
    assert!(!rule.recurs_at(&floating(2022, 1, 4, 8, 0)));
    assert!(!rule.recurs_at(&floating(2022, 1, 3, 9, 0)));
}

#[test]
fn recur_times_on_projects_into_the_query_zone() {
    // 00:30 Berlin wall clock; read in UTC each occurrence lands late on
    // the previous calendar day.
    let berlin = TimeZone::get("Europe/Berlin").unwrap();
    let start = CalDateTime::Zoned(
        datetime(2022, 1, 10, 0, 30, 0, 0).to_zoned(berlin).unwrap(),
    );
    let rule = rule_at(PeriodType::Daily, 1, start);

    let times = rule.recur_times_on(date(2022, 1, 12), &TimeZone::UTC);
    assert_eq!(times, vec![jiff::civil::time(23, 30, 0, 0)]);
    assert!(rule.recurs_on(date(2022, 1, 12), &TimeZone::UTC));
}

#[test]
fn dst_gap_keeps_the_wall_clock() {
    let new_york = TimeZone::get("America/New_York").unwrap();
    let start = CalDateTime::Zoned(
        datetime(2020, 3, 7, 9, 0, 0, 0)
            .to_zoned(new_york.clone())
            .unwrap(),
    );
    let mut rule = rule_at(PeriodType::Daily, 1, start);
    rule.set_termination(Termination::Count(2)).unwrap();

    let times = expand(
        &rule,
        CalDateTime::Date(date(2020, 3, 7)),
        CalDateTime::Date(date(2020, 3, 9)),
    );
    assert_eq!(times.len(), 2);
    // Wall clock sticks to 09:00 across the spring-forward transition...
    assert_eq!(times[0].civil().time(), jiff::civil::time(9, 0, 0, 0));
    assert_eq!(times[1].civil().time(), jiff::civil::time(9, 0, 0, 0));
    // ...so the absolute moment shifts from 14:00 to 13:00 UTC.
    assert_eq!(times[0].project_to(&TimeZone::UTC).civil().hour(), 14);
    assert_eq!(times[1].project_to(&TimeZone::UTC).civil().hour(), 13);
}

#[test]
fn never_matching_filters_terminate() {
    let mut rule = rule_at(PeriodType::Yearly, 1, floating(2021, 1, 1, 0, 0));
    rule.set_by_months(vec![2]).unwrap();
    rule.set_by_month_days(vec![31]).unwrap();

    assert_eq!(rule.next_after(&floating(2021, 1, 1, 0, 0)), None);
    assert!(
        expand(
            &rule,
            CalDateTime::Date(date(2021, 1, 1)),
            CalDateTime::Date(date(2030, 12, 31)),
        )
        .is_empty()
    );
}
