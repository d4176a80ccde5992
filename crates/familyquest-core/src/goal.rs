//! Goal evaluation: does a logged value count as a completion?
//!
//! Malformed values never fail hard. A log that does not clear its goal is
//! still persisted, just with zero XP and no streak effect.

use chrono::NaiveDate;
use serde_json::Value;

use crate::model::{Comparison, Habit, HabitKind, MemberId};

/// Extract a numeric reading from an opaque log value: either a bare
/// number or an object carrying a numeric `value` or `count` field.
pub fn numeric_reading(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    let obj = value.as_object()?;
    obj.get("value")
        .and_then(Value::as_f64)
        .or_else(|| obj.get("count").and_then(Value::as_f64))
}

/// Extract an integer scale reading in 1..=5. Out-of-range, fractional,
/// or missing readings are rejected.
pub fn scale_reading(value: Option<&Value>) -> Option<u8> {
    let n = numeric_reading(value)?;
    if n.fract() != 0.0 {
        return None;
    }
    let n = n as i64;
    (1..=5).contains(&n).then_some(n as u8)
}

/// Resolve the effective numeric target for `member` at `date`:
/// member override first, then the default target. Before
/// `goal_effective_from` there is no enforceable goal at all.
pub fn resolve_target(habit: &Habit, member: MemberId, date: NaiveDate) -> Option<f64> {
    if let Some(effective_from) = habit.goal_effective_from {
        if date < effective_from {
            return None;
        }
    }
    habit
        .goal
        .overrides
        .get(&member)
        .copied()
        .or(habit.goal.target)
}

/// The member's weekly completion target for a times-per-week habit.
/// Targets below one completion are meaningless and resolve to `None`.
pub fn weekly_target(habit: &Habit, member: MemberId, date: NaiveDate) -> Option<u32> {
    let target = resolve_target(habit, member, date)?;
    if target < 1.0 {
        return None;
    }
    Some(target as u32)
}

/// Whether a logged value satisfies the habit's goal on `date`.
///
/// For times-per-week habits the day-level answer is log-presence: every
/// recorded day extends the daily streak, while reward XP is governed by
/// the weekly aggregate (see the engine's completion flow).
pub fn counts_toward_goal(
    habit: &Habit,
    member: MemberId,
    date: NaiveDate,
    value: Option<&Value>,
) -> bool {
    match habit.kind {
        HabitKind::Boolean | HabitKind::Checklist | HabitKind::TimesPerWeek => true,
        HabitKind::Quantity => {
            let Some(target) = resolve_target(habit, member, date) else {
                return false;
            };
            let Some(reading) = numeric_reading(value) else {
                return false;
            };
            match habit.goal.comparison {
                Comparison::AtLeast => reading >= target,
                Comparison::AtMost => reading <= target,
            }
        }
        HabitKind::Scale => {
            let min = habit.goal.min_scale.unwrap_or(1);
            match scale_reading(value) {
                Some(reading) => reading >= min,
                None => false,
            }
        }
    }
}
