// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Evaluate iCalendar recurrences: given RFC 5545 recurrence rules,
//! exception rules and explicit inclusion/exclusion dates anchored at an
//! event's start, answer when the event occurs.
//!
//! The engine is a pure, deterministic library: no I/O, no global state, no
//! background work. Parsing and serializing iCalendar text lives in the
//! codec crates; this crate consumes already-decoded rule components and
//! produces instants, wall-clock times and booleans.
//!
//! ```
//! use aimcal_recur::{CalDateTime, PeriodType, Recurrence, RecurrenceRule, Termination};
//! use jiff::civil::datetime;
//!
//! let anchor = CalDateTime::Floating(datetime(2022, 3, 1, 8, 0, 0, 0));
//! let mut recurrence = Recurrence::new(anchor.clone());
//! let mut rule = RecurrenceRule::new(PeriodType::Daily, 1)?;
//! rule.set_start(anchor);
//! rule.set_termination(Termination::Count(5))?;
//! recurrence.add_rrule(rule);
//!
//! assert!(recurrence.recurs_at(&CalDateTime::Floating(datetime(2022, 3, 3, 8, 0, 0, 0))));
//! # Ok::<(), aimcal_recur::InvalidRule>(())
//! ```

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::match_bool
)]

mod datetime;
mod error;
mod kind;
mod observer;
mod recurrence;
mod rule;

pub use crate::datetime::{
    CalDateTime, nth_weekday_of_month, nth_weekday_of_year, weekday_index_in_month,
    weekday_index_in_year,
};
pub use crate::error::InvalidRule;
pub use crate::kind::RecurrenceKind;
pub use crate::observer::{ObserverHandle, RecurrenceObserver};
pub use crate::recurrence::Recurrence;
pub use crate::rule::{PeriodType, RecurrenceRule, Termination, WeekdayPos};
