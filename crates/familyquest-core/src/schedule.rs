//! Recurrence evaluation: is a habit due on a given date?
//!
//! Pure functions of the habit configuration and the date; no store access.

use chrono::{Datelike, NaiveDate};

use crate::model::{Habit, Recurrence};

/// Whether `habit` is due on `date`.
///
/// Weekly-target habits are always "due" for display purposes; their goal
/// is evaluated on the weekly window, not per day.
pub fn is_due(habit: &Habit, date: NaiveDate) -> bool {
    match &habit.recurrence {
        Recurrence::Daily => true,
        Recurrence::Weekly { days } => days.contains(&date.weekday()),
        Recurrence::Custom { interval_days, anchor } => {
            let interval = (*interval_days).max(1) as i64;
            // Absent anchor defaults to the query date: the habit is
            // effectively due on that call. Documented fallback, not an error.
            let anchor = anchor.unwrap_or(date);
            (date - anchor).num_days().rem_euclid(interval) == 0
        }
        Recurrence::WeeklyTarget => true,
    }
}

/// Monday and Sunday of the ISO week containing `date`.
pub fn iso_week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64);
    (monday, monday + chrono::Duration::days(6))
}

/// Stable key for the ISO week containing `date`, e.g. `2026-W35`.
pub fn iso_week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}
