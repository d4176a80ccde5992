//! Shared-habit group bonus: all active members must satisfy the goal
//! independently before the group account is credited once.
//!
//! This module only answers eligibility over a slice of history; the
//! at-most-once discipline around the check-and-award lives in the engine.

use chrono::NaiveDate;

use crate::goal;
use crate::model::{CompletionLog, Habit, HabitKind, Member, Visibility};
use crate::schedule::iso_week_bounds;

/// Whether every active group member has satisfied `habit` for `date`.
///
/// `logs` must cover the habit's logs for the ISO week containing `date`
/// (a superset is fine; irrelevant rows are filtered here). Non-shared
/// habits and empty groups are never eligible, and a member with no log
/// counts as not satisfied.
pub fn group_bonus_eligible(
    habit: &Habit,
    members: &[Member],
    logs: &[CompletionLog],
    date: NaiveDate,
) -> bool {
    if habit.visibility != Visibility::Shared {
        return false;
    }
    let active: Vec<&Member> = members.iter().filter(|m| m.active).collect();
    if active.is_empty() {
        return false;
    }

    match habit.kind {
        HabitKind::TimesPerWeek => {
            // Every member must have reached their own resolved weekly
            // target within the ISO week containing `date`.
            let (week_start, week_end) = iso_week_bounds(date);
            active.iter().all(|member| {
                let Some(target) = goal::weekly_target(habit, member.id, date) else {
                    return false;
                };
                let done = logs
                    .iter()
                    .filter(|log| {
                        log.member_id == member.id
                            && log.date >= week_start
                            && log.date <= week_end
                    })
                    .count();
                done as u32 >= target
            })
        }
        _ => active.iter().all(|member| {
            logs.iter().any(|log| {
                log.member_id == member.id
                    && log.date == date
                    && goal::counts_toward_goal(habit, member.id, date, log.value.as_ref())
            })
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    use crate::model::Recurrence;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn shared_habit(kind: HabitKind, recurrence: Recurrence) -> (Habit, Member, Member) {
        let group = Uuid::new_v4();
        let a = Member::new(group, "a");
        let b = Member::new(group, "b");
        let habit = Habit::new(group, a.id, "shared", kind, recurrence, Visibility::Shared);
        (habit, a, b)
    }

    fn log_on(habit: &Habit, member: &Member, date: NaiveDate) -> CompletionLog {
        CompletionLog::new(habit.id, member.id, date, None, 0)
    }

    #[test]
    fn one_of_two_members_is_not_eligible() {
        let (habit, a, b) = shared_habit(HabitKind::Boolean, Recurrence::Daily);
        let today = d(2026, 8, 30);
        let logs = vec![log_on(&habit, &a, today)];
        assert!(!group_bonus_eligible(&habit, &[a, b], &logs, today));
    }

    #[test]
    fn both_members_logged_is_eligible() {
        let (habit, a, b) = shared_habit(HabitKind::Boolean, Recurrence::Daily);
        let today = d(2026, 8, 30);
        let logs = vec![log_on(&habit, &a, today), log_on(&habit, &b, today)];
        assert!(group_bonus_eligible(&habit, &[a, b], &logs, today));
    }

    #[test]
    fn non_shared_habit_is_never_eligible() {
        let (mut habit, a, b) = shared_habit(HabitKind::Boolean, Recurrence::Daily);
        habit.visibility = Visibility::Public;
        let today = d(2026, 8, 30);
        let logs = vec![log_on(&habit, &a, today), log_on(&habit, &b, today)];
        assert!(!group_bonus_eligible(&habit, &[a, b], &logs, today));
    }

    #[test]
    fn empty_group_is_not_eligible() {
        let (habit, _, _) = shared_habit(HabitKind::Boolean, Recurrence::Daily);
        assert!(!group_bonus_eligible(&habit, &[], &[], d(2026, 8, 30)));
    }

    #[test]
    fn inactive_members_are_ignored() {
        let (habit, a, mut b) = shared_habit(HabitKind::Boolean, Recurrence::Daily);
        b.active = false;
        let today = d(2026, 8, 30);
        let logs = vec![log_on(&habit, &a, today)];
        assert!(group_bonus_eligible(&habit, &[a, b], &logs, today));
    }

    #[test]
    fn quantity_log_below_target_does_not_satisfy() {
        let (mut habit, a, b) = shared_habit(HabitKind::Quantity, Recurrence::Daily);
        habit.goal.target = Some(8.0);
        let today = d(2026, 8, 30);
        let mut log_a = log_on(&habit, &a, today);
        log_a.value = Some(json!(8));
        let mut log_b = log_on(&habit, &b, today);
        log_b.value = Some(json!(5));
        assert!(!group_bonus_eligible(
            &habit,
            &[a.clone(), b.clone()],
            &[log_a.clone(), log_b.clone()],
            today
        ));
        log_b.value = Some(json!(9));
        assert!(group_bonus_eligible(&habit, &[a, b], &[log_a, log_b], today));
    }

    #[test]
    fn weekly_target_needs_each_member_own_target() {
        let (mut habit, a, b) = shared_habit(HabitKind::TimesPerWeek, Recurrence::WeeklyTarget);
        habit.goal.target = Some(2.0);
        habit.goal.overrides.insert(b.id, 3.0);
        // Week of 2026-08-24 (Mon) .. 2026-08-30 (Sun).
        let logs = vec![
            log_on(&habit, &a, d(2026, 8, 24)),
            log_on(&habit, &a, d(2026, 8, 25)),
            log_on(&habit, &b, d(2026, 8, 24)),
            log_on(&habit, &b, d(2026, 8, 26)),
        ];
        // a reached 2/2 but b is at 2/3.
        assert!(!group_bonus_eligible(
            &habit,
            &[a.clone(), b.clone()],
            &logs,
            d(2026, 8, 26)
        ));
        let mut logs = logs;
        logs.push(log_on(&habit, &b, d(2026, 8, 28)));
        assert!(group_bonus_eligible(&habit, &[a, b], &logs, d(2026, 8, 28)));
    }

    #[test]
    fn weekly_target_ignores_logs_outside_the_week() {
        let (mut habit, a, _) = shared_habit(HabitKind::TimesPerWeek, Recurrence::WeeklyTarget);
        habit.goal.target = Some(2.0);
        let logs = vec![
            log_on(&habit, &a, d(2026, 8, 22)), // previous week
            log_on(&habit, &a, d(2026, 8, 25)),
        ];
        assert!(!group_bonus_eligible(&habit, &[a], &logs, d(2026, 8, 25)));
    }
}
