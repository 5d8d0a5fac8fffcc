// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Construction-time validation errors.

use thiserror::Error;

/// A recurrence rule was given an option outside its domain.
///
/// Raised only while building or mutating a [`RecurrenceRule`]; query
/// operations never fail, they return `None`, `false` or empty lists.
///
/// [`RecurrenceRule`]: crate::RecurrenceRule
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidRule {
    /// The interval between base periods must be at least 1.
    #[error("frequency must be at least 1, got {0}")]
    Frequency(u32),

    /// A COUNT of zero occurrences is meaningless.
    #[error("count must be at least 1")]
    ZeroCount,

    /// COUNT and UNTIL cannot terminate the same rule.
    #[error("COUNT and UNTIL are mutually exclusive")]
    ConflictingTermination,

    /// A BY-filter value fell outside the range the filter accepts.
    #[error("{filter} value {value} out of range")]
    FilterOutOfRange {
        /// Name of the offending filter, e.g. `"BYMONTHDAY"`.
        filter: &'static str,
        /// The rejected value.
        value: i32,
    },

    /// Signed position filters (BYSETPOS, BYMONTHDAY, BYYEARDAY, BYWEEKNO,
    /// BYDAY offsets) have no zeroth element.
    #[error("{filter} position must not be zero")]
    ZeroPosition {
        /// Name of the offending filter.
        filter: &'static str,
    },
}
