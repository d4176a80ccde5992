//! Streak tracking for one (habit, member) pair.
//!
//! Two operating modes:
//! - **advance**: incremental update right after a qualifying completion.
//! - **recompute**: full rebuild from the goal-satisfying date set, used
//!   after deletions or backdated edits that a pure incremental model
//!   cannot unwind.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::Streak;

/// Outcome of an incremental streak update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakUpdate {
    pub current: u32,
    pub longest: u32,
    /// Milestone bonus XP granted by this call only.
    pub bonus_xp: u32,
    /// Streak length that hit a milestone, if any.
    pub milestone: Option<u32>,
    /// True when the day was already recorded; nothing changed.
    pub already_counted: bool,
}

/// Milestone bonus schedule: 3 days +10, 7 days +25, 30 days and every
/// further multiple of 30 +100.
pub fn milestone_bonus(current: u32) -> u32 {
    match current {
        3 => 10,
        7 => 25,
        n if n >= 30 && n % 30 == 0 => 100,
        _ => 0,
    }
}

/// Incremental update for a qualifying completion on `today`.
///
/// Continues the streak when the last completion was yesterday, is an
/// idempotent no-op when it was today, and resets to 1 otherwise.
pub fn advance(streak: &mut Streak, today: NaiveDate) -> StreakUpdate {
    let yesterday = today - Duration::days(1);

    if streak.last_completed == Some(today) {
        return StreakUpdate {
            current: streak.current,
            longest: streak.longest,
            bonus_xp: 0,
            milestone: None,
            already_counted: true,
        };
    }

    if streak.last_completed == Some(yesterday) {
        streak.current += 1;
    } else {
        streak.current = 1;
    }
    streak.last_completed = Some(today);
    streak.longest = streak.longest.max(streak.current);

    let bonus_xp = milestone_bonus(streak.current);
    StreakUpdate {
        current: streak.current,
        longest: streak.longest,
        bonus_xp,
        milestone: (bonus_xp > 0).then_some(streak.current),
        already_counted: false,
    }
}

/// Full recomputation from the set of goal-satisfying dates.
///
/// `current` is the consecutive run ending at `today` (or at yesterday,
/// so a streak that is still extendable today is not reported as broken);
/// `longest` is the maximum run anywhere in history. History is the sole
/// source of truth; nothing is blended with previously stored values.
pub fn recompute(streak: &mut Streak, dates: &BTreeSet<NaiveDate>, today: NaiveDate) {
    streak.last_completed = dates.iter().next_back().copied();

    // Current run: walk backward from today, allowing the run to end
    // yesterday without today's completion having happened yet.
    let mut cursor = if dates.contains(&today) {
        Some(today)
    } else {
        let yesterday = today - Duration::days(1);
        dates.contains(&yesterday).then_some(yesterday)
    };
    let mut current = 0u32;
    while let Some(day) = cursor {
        if !dates.contains(&day) {
            break;
        }
        current += 1;
        cursor = day.checked_sub_days(chrono::Days::new(1));
    }
    streak.current = current;

    // Longest run over the whole history.
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;
    for &day in dates {
        run = match prev {
            Some(p) if day - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }
    streak.longest = longest;
}
