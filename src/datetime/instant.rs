// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;
use std::fmt;

use jiff::Zoned;
use jiff::civil::{Date, DateTime, Time};
use jiff::tz::TimeZone;

use crate::datetime::util::{end_of_day, start_of_day};

/// A calendar instant as it appears in iCalendar data: an all-day date, a
/// floating (zone-less) wall-clock date-time, or a zoned date-time.
///
/// Ordering follows the conventions of recurrence evaluation: two zoned
/// values compare by absolute instant; a floating value lifts into the zoned
/// side's zone (which reduces to comparing wall clocks); an all-day date
/// compares at 00:00:00 against timed values. Within one recurrence all
/// stored instants share a flavor, so mixed comparisons only arise at query
/// boundaries.
#[derive(Debug, Clone)]
pub enum CalDateTime {
    /// Date only, without time or zone.
    Date(Date),
    /// Floating wall-clock date and time, without a zone binding.
    Floating(DateTime),
    /// Date and time bound to a time zone.
    Zoned(Zoned),
}

impl CalDateTime {
    /// The date part, in the instant's own frame.
    #[must_use]
    pub fn date(&self) -> Date {
        match self {
            CalDateTime::Date(d) => *d,
            CalDateTime::Floating(dt) => dt.date(),
            CalDateTime::Zoned(zoned) => zoned.date(),
        }
    }

    /// The time part, if the instant has one.
    #[must_use]
    pub fn time(&self) -> Option<Time> {
        match self {
            CalDateTime::Date(_) => None,
            CalDateTime::Floating(dt) => Some(dt.time()),
            CalDateTime::Zoned(zoned) => Some(zoned.time()),
        }
    }

    /// The wall-clock reading, with all-day dates at the start of the day.
    #[must_use]
    pub fn civil(&self) -> DateTime {
        match self {
            CalDateTime::Date(d) => DateTime::from_parts(*d, start_of_day()),
            CalDateTime::Floating(dt) => *dt,
            CalDateTime::Zoned(zoned) => zoned.datetime(),
        }
    }

    /// The wall-clock reading, with all-day dates at the end of the day.
    #[must_use]
    pub fn civil_end(&self) -> DateTime {
        match self {
            CalDateTime::Date(d) => DateTime::from_parts(*d, end_of_day()),
            _ => self.civil(),
        }
    }

    /// The zone binding, when there is one.
    #[must_use]
    pub fn zone(&self) -> Option<&TimeZone> {
        match self {
            CalDateTime::Zoned(zoned) => Some(zoned.time_zone()),
            _ => None,
        }
    }

    /// Whether this instant carries no time component.
    #[must_use]
    pub fn is_date_only(&self) -> bool {
        matches!(self, CalDateTime::Date(_))
    }

    /// The calendar date this instant falls on when read in `zone`.
    ///
    /// Floating and all-day values are zone-agnostic and keep their own date.
    #[must_use]
    pub fn date_in(&self, zone: &TimeZone) -> Date {
        match self {
            CalDateTime::Zoned(zoned) => zoned.with_time_zone(zone.clone()).date(),
            _ => self.date(),
        }
    }

    /// The wall-clock reading of this instant in `zone`.
    #[must_use]
    pub fn civil_in(&self, zone: &TimeZone) -> DateTime {
        match self {
            CalDateTime::Zoned(zoned) => zoned.with_time_zone(zone.clone()).datetime(),
            _ => self.civil(),
        }
    }

    /// Project into `zone`, preserving the absolute moment.
    ///
    /// Floating values are interpreted as wall clock in `zone`; all-day
    /// dates are zone-agnostic and returned unchanged.
    #[must_use]
    pub fn project_to(&self, zone: &TimeZone) -> CalDateTime {
        match self {
            CalDateTime::Date(d) => CalDateTime::Date(*d),
            CalDateTime::Floating(dt) => match dt.to_zoned(zone.clone()) {
                Ok(zoned) => CalDateTime::Zoned(zoned),
                Err(_) => CalDateTime::Floating(*dt),
            },
            CalDateTime::Zoned(zoned) => {
                CalDateTime::Zoned(zoned.with_time_zone(zone.clone()))
            }
        }
    }

    /// Stamp `zone` onto this instant, preserving the wall-clock fields.
    ///
    /// This is the zone *shift* primitive: the reading stays the same, the
    /// absolute moment moves. All-day dates are returned unchanged.
    #[must_use]
    pub fn stamp_zone(&self, zone: &TimeZone) -> CalDateTime {
        match self {
            CalDateTime::Date(d) => CalDateTime::Date(*d),
            _ => match self.civil().to_zoned(zone.clone()) {
                Ok(zoned) => CalDateTime::Zoned(zoned),
                Err(_) => self.clone(),
            },
        }
    }

    /// Reinterpret a zoned instant as if its wall-clock reading always
    /// belonged to `new_zone`: project into `old_zone` preserving the
    /// moment, then stamp `new_zone` preserving the reading. Floating and
    /// all-day values are returned unchanged.
    #[must_use]
    pub fn shift_zone(&self, old_zone: &TimeZone, new_zone: &TimeZone) -> CalDateTime {
        match self {
            CalDateTime::Zoned(_) => self.project_to(old_zone).stamp_zone(new_zone),
            _ => self.clone(),
        }
    }

    fn flavor_rank(&self) -> u8 {
        match self {
            CalDateTime::Date(_) => 0,
            CalDateTime::Floating(_) => 1,
            CalDateTime::Zoned(_) => 2,
        }
    }
}

impl PartialEq for CalDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CalDateTime {}

impl PartialOrd for CalDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CalDateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (CalDateTime::Zoned(a), CalDateTime::Zoned(b)) => {
                a.timestamp().cmp(&b.timestamp())
            }
            // Mixed frames compare by wall clock, which lifts the floating
            // side into the zoned side's zone. Flavor breaks ties so the
            // order stays total and consistent with equality.
            _ => self
                .civil()
                .cmp(&other.civil())
                .then_with(|| self.flavor_rank().cmp(&other.flavor_rank())),
        }
    }
}

impl From<Date> for CalDateTime {
    fn from(d: Date) -> Self {
        CalDateTime::Date(d)
    }
}

impl From<DateTime> for CalDateTime {
    fn from(dt: DateTime) -> Self {
        CalDateTime::Floating(dt)
    }
}

impl From<Zoned> for CalDateTime {
    fn from(zoned: Zoned) -> Self {
        CalDateTime::Zoned(zoned)
    }
}

impl fmt::Display for CalDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalDateTime::Date(d) => write!(f, "{d}"),
            CalDateTime::Floating(dt) => write!(f, "{dt}"),
            CalDateTime::Zoned(zoned) => write!(f, "{zoned}"),
        }
    }
}

/// Whether two zones are known to denote the same zone.
///
/// Zones without an IANA name (fixed offsets) are never considered equal
/// here; shifting between equal fixed offsets is a wall-clock no-op anyway.
pub(crate) fn same_zone(a: &TimeZone, b: &TimeZone) -> bool {
    match (a.iana_name(), b.iana_name()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
