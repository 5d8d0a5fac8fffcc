// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Aggregate behavior of [`Recurrence`]: exclusion precedence, the
//! candidate-then-exclude search, zone shifting and the single-rule
//! convenience surface.

use aimcal_recur::{
    CalDateTime, PeriodType, Recurrence, RecurrenceKind, RecurrenceRule, Termination, WeekdayPos,
};
use jiff::civil::{Weekday, date, datetime, time};
use jiff::tz::TimeZone;

fn floating(year: i16, month: i8, day: i8, hour: i8, minute: i8) -> CalDateTime {
    CalDateTime::Floating(datetime(year, month, day, hour, minute, 0, 0))
}

fn daily_recurrence(count: u32) -> Recurrence {
    let anchor = floating(2022, 3, 1, 8, 0);
    let mut recurrence = Recurrence::new(anchor.clone());
    let mut rule = RecurrenceRule::new(PeriodType::Daily, 1).unwrap();
    rule.set_start(anchor);
    rule.set_termination(Termination::Count(count)).unwrap();
    recurrence.add_rrule(rule);
    recurrence
}

#[test]
fn recurs_at_agrees_with_point_intervals() {
    let mut recurrence = daily_recurrence(5);
    recurrence.add_exdate(date(2022, 3, 3));
    recurrence.add_rdatetime(floating(2022, 3, 10, 20, 0));

    let probes = [
        floating(2022, 3, 1, 8, 0),
        floating(2022, 3, 2, 8, 0),
        floating(2022, 3, 3, 8, 0),
        floating(2022, 3, 4, 8, 0),
        floating(2022, 3, 6, 8, 0),
        floating(2022, 3, 10, 20, 0),
        floating(2022, 3, 10, 8, 0),
    ];
    for t in probes {
        let pointwise = recurrence.recurs_at(&t);
        let interval = recurrence.times_in_interval(&t, &t);
        assert_eq!(
            pointwise,
            interval.contains(&t),
            "recursAt and timesInInterval disagree at {t}"
        );
    }
}

#[test]
fn recurs_on_agrees_with_recur_times_on() {
    let mut recurrence = daily_recurrence(5);
    recurrence.add_exdate(date(2022, 3, 3));

    for day in 1..=8 {
        let d = date(2022, 3, day);
        assert_eq!(
            recurrence.recurs_on(d, &TimeZone::UTC),
            !recurrence.recur_times_on(d, &TimeZone::UTC).is_empty(),
            "recursOn and recurTimesOn disagree on {d}"
        );
    }
}

#[test]
fn interval_results_are_sorted_and_unique() {
    let mut recurrence = daily_recurrence(5);
    // Duplicate the second occurrence explicitly and add a stray instant.
    recurrence.add_rdatetime(floating(2022, 3, 2, 8, 0));
    recurrence.add_rdatetime(floating(2022, 3, 2, 18, 0));
    recurrence.add_rdate(date(2022, 3, 9));

    let times = recurrence.times_in_interval(
        &CalDateTime::Date(date(2022, 3, 1)),
        &CalDateTime::Date(date(2022, 3, 31)),
    );
    assert!(times.windows(2).all(|w| w[0] < w[1]), "not strictly ascending");
    assert_eq!(times.len(), 7);
}

#[test]
fn every_exclusion_source_wins() {
    let anchor = floating(2022, 3, 1, 8, 0);
    let mut recurrence = daily_recurrence(10);

    recurrence.add_exdate(date(2022, 3, 3));
    recurrence.add_exdatetime(floating(2022, 3, 4, 8, 0));
    let mut exrule = RecurrenceRule::new(PeriodType::Daily, 5).unwrap();
    exrule.set_start(floating(2022, 3, 5, 8, 0));
    recurrence.add_exrule(exrule);

    assert!(!recurrence.recurs_at(&floating(2022, 3, 3, 8, 0)));
    assert!(!recurrence.recurs_at(&floating(2022, 3, 4, 8, 0)));
    assert!(!recurrence.recurs_at(&floating(2022, 3, 5, 8, 0)));
    assert!(!recurrence.recurs_at(&floating(2022, 3, 10, 8, 0)));
    assert!(recurrence.recurs_at(&floating(2022, 3, 2, 8, 0)));
    // The anchor itself is an occurrence as long as nothing excludes it.
    assert!(recurrence.recurs_at(&anchor));

    let times = recurrence.times_in_interval(
        &CalDateTime::Date(date(2022, 3, 1)),
        &CalDateTime::Date(date(2022, 3, 31)),
    );
    for excluded in [
        floating(2022, 3, 3, 8, 0),
        floating(2022, 3, 4, 8, 0),
        floating(2022, 3, 5, 8, 0),
        floating(2022, 3, 10, 8, 0),
    ] {
        assert!(!times.contains(&excluded));
    }
}

#[test]
fn all_day_exclusion_rule_wipes_the_day() {
    let anchor = CalDateTime::Date(date(2022, 3, 7)); // a Monday
    let mut recurrence = Recurrence::new(anchor.clone());
    let mut rule = RecurrenceRule::new(PeriodType::Daily, 1).unwrap();
    rule.set_start(anchor.clone());
    recurrence.add_rrule(rule);

    let mut exrule = RecurrenceRule::new(PeriodType::Weekly, 1).unwrap();
    exrule.set_start(anchor);
    exrule
        .set_by_days(vec![WeekdayPos::every(Weekday::Wednesday)])
        .unwrap();
    recurrence.add_exrule(exrule);

    assert!(recurrence.recurs_on(date(2022, 3, 8), &TimeZone::UTC));
    assert!(!recurrence.recurs_on(date(2022, 3, 9), &TimeZone::UTC));
    assert!(recurrence
        .recur_times_on(date(2022, 3, 9), &TimeZone::UTC)
        .is_empty());
}

#[test]
fn next_and_previous_hop_over_exclusions() {
    let mut recurrence = daily_recurrence(10);
    recurrence.add_exdate(date(2022, 3, 3));

    assert_eq!(
        recurrence.next_datetime(&floating(2022, 3, 2, 8, 0)),
        Some(floating(2022, 3, 4, 8, 0))
    );
    assert_eq!(
        recurrence.previous_datetime(&floating(2022, 3, 4, 8, 0)),
        Some(floating(2022, 3, 2, 8, 0))
    );
    // The anchor is the floor of the backward search.
    assert_eq!(recurrence.previous_datetime(&floating(2022, 3, 1, 8, 0)), None);
}

#[test]
fn exhausted_iteration_budget_returns_none() {
    let anchor = floating(2022, 3, 1, 8, 0);
    let mut recurrence = Recurrence::new(anchor.clone());
    let mut rule = RecurrenceRule::new(PeriodType::Daily, 1).unwrap();
    rule.set_start(anchor.clone());
    recurrence.add_rrule(rule);
    // An exclusion rule identical to the inclusion rule extinguishes it.
    let mut exrule = RecurrenceRule::new(PeriodType::Daily, 1).unwrap();
    exrule.set_start(anchor);
    recurrence.add_exrule(exrule);

    recurrence.set_iteration_budget(16);
    assert_eq!(recurrence.next_datetime(&floating(2022, 3, 2, 0, 0)), None);
}

#[test]
fn shift_times_keeps_the_wall_clock_and_changes_the_zone() {
    let berlin = TimeZone::get("Europe/Berlin").unwrap();
    let new_york = TimeZone::get("America/New_York").unwrap();
    let anchor = CalDateTime::Zoned(
        datetime(2022, 5, 2, 9, 30, 0, 0)
            .to_zoned(berlin.clone())
            .unwrap(),
    );
    let mut recurrence = Recurrence::new(anchor.clone());
    let mut rule = RecurrenceRule::new(PeriodType::Daily, 1).unwrap();
    rule.set_start(anchor.clone());
    recurrence.add_rrule(rule);
    recurrence.add_rdatetime(CalDateTime::Zoned(
        datetime(2022, 5, 10, 18, 0, 0, 0).to_zoned(berlin.clone()).unwrap(),
    ));

    recurrence.shift_times(&berlin, &new_york);

    assert_eq!(
        recurrence.start_datetime().civil(),
        datetime(2022, 5, 2, 9, 30, 0, 0)
    );
    assert_eq!(
        recurrence
            .start_datetime()
            .zone()
            .and_then(TimeZone::iana_name),
        Some("America/New_York")
    );
    assert_eq!(
        recurrence.rdatetimes()[0].civil(),
        datetime(2022, 5, 10, 18, 0, 0, 0)
    );
    assert_eq!(
        recurrence.rrules()[0].start().civil(),
        datetime(2022, 5, 2, 9, 30, 0, 0)
    );

    // Shifting between equal zones is a no-op.
    let before = recurrence.clone();
    recurrence.shift_times(&new_york, &new_york);
    assert_eq!(recurrence, before);
}

#[test]
fn reinsertion_is_stable() {
    let mut recurrence = daily_recurrence(3);
    let dates = [date(2022, 5, 3), date(2022, 5, 1), date(2022, 5, 2)];
    for d in dates {
        recurrence.add_rdate(d);
    }
    let first = recurrence.rdates().to_vec();
    for d in dates {
        recurrence.add_rdate(d);
    }
    assert_eq!(recurrence.rdates(), &first[..]);
}

#[test]
fn end_is_open_while_any_rule_never_terminates() {
    let anchor = floating(2022, 3, 1, 8, 0);
    let mut recurrence = Recurrence::new(anchor.clone());
    let mut rule = RecurrenceRule::new(PeriodType::Daily, 1).unwrap();
    rule.set_start(anchor);
    recurrence.add_rrule(rule);

    assert_eq!(recurrence.end_datetime(), None);
    recurrence.update_rrule(0, |r| r.set_termination(Termination::Count(3)).unwrap());
    assert_eq!(
        recurrence.end_datetime(),
        Some(floating(2022, 3, 3, 8, 0))
    );
}

#[test]
fn rdate_beyond_the_rules_extends_the_end() {
    let mut recurrence = daily_recurrence(3);
    recurrence.add_rdate(date(2022, 6, 15));
    assert_eq!(
        recurrence.end_datetime(),
        Some(floating(2022, 6, 15, 8, 0))
    );
}

#[test]
fn legacy_surface_edits_the_first_rule() {
    let anchor = floating(2022, 3, 7, 9, 0); // a Monday
    let mut recurrence = Recurrence::new(anchor);

    recurrence.set_weekly(2, Weekday::Monday);
    recurrence.add_weekly_days(&[Weekday::Monday, Weekday::Thursday]);
    assert_eq!(recurrence.frequency(), 2);
    assert_eq!(recurrence.week_start(), Weekday::Monday);
    assert_eq!(
        recurrence.weekly_days(),
        vec![Weekday::Monday, Weekday::Thursday]
    );
    assert_eq!(recurrence.kind(), RecurrenceKind::Weekly);

    recurrence.set_monthly(1);
    recurrence.add_monthly_pos(-1, Weekday::Friday);
    assert_eq!(recurrence.kind(), RecurrenceKind::MonthlyPos);
    assert_eq!(
        recurrence.month_positions(),
        vec![WeekdayPos::nth(-1, Weekday::Friday)]
    );

    recurrence.set_yearly(1);
    recurrence.add_yearly_month(6);
    recurrence.add_yearly_date(21);
    assert_eq!(recurrence.year_months(), vec![6]);
    assert_eq!(recurrence.year_dates(), vec![21]);
    assert_eq!(recurrence.kind(), RecurrenceKind::YearlyMonth);
    assert!(recurrence.recurs_on(date(2023, 6, 21), &TimeZone::UTC));

    recurrence.set_duration(4);
    assert_eq!(recurrence.duration(), 4);
    recurrence.set_duration(-1);
    assert_eq!(recurrence.duration(), -1);

    recurrence.set_end_date(date(2030, 6, 21));
    assert_eq!(recurrence.end_date(), Some(date(2030, 6, 21)));
}

#[test]
fn set_duration_ignores_other_negatives() {
    let mut recurrence = daily_recurrence(5);
    recurrence.set_duration(-7);
    assert_eq!(recurrence.duration(), 5);
}

#[test]
fn recur_times_on_merges_and_subtracts_sources() {
    let mut recurrence = daily_recurrence(5);
    recurrence.add_rdatetime(floating(2022, 3, 2, 12, 0));
    recurrence.add_exdatetime(floating(2022, 3, 2, 8, 0));

    let times = recurrence.recur_times_on(date(2022, 3, 2), &TimeZone::UTC);
    assert_eq!(times, vec![time(12, 0, 0, 0)]);
}

#[test]
fn floating_and_zoned_queries_agree_on_dates() {
    // A floating recurrence lifts into whatever zone the caller asks in.
    let recurrence = daily_recurrence(5);
    for zone in ["UTC", "Asia/Tokyo", "America/New_York"] {
        let tz = TimeZone::get(zone).unwrap();
        assert!(recurrence.recurs_on(date(2022, 3, 2), &tz), "in {zone}");
        assert_eq!(
            recurrence.recur_times_on(date(2022, 3, 2), &tz),
            vec![time(8, 0, 0, 0)],
            "in {zone}"
        );
    }
}
