// SPDX-FileCopyrightText: 2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

mod instant;
mod util;

pub use instant::CalDateTime;
pub use util::{
    nth_weekday_of_month, nth_weekday_of_year, weekday_index_in_month, weekday_index_in_year,
};

pub(crate) use instant::same_zone;
pub(crate) use util::{
    end_of_day, epoch_days, resolve_month_day, resolve_year_day, start_of_day, step_date,
    week_of_year, week_start_of, weeks_in_year,
};
