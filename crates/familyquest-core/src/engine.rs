//! Composite engine operations.
//!
//! `record_completion` is the serialization point of the system: the
//! duplicate check, log insert, streak update, member XP award and the
//! shared-habit group bonus all run under keyed locks so a retried
//! request cannot double-credit XP and two sibling members completing
//! near-simultaneously cannot both award the group bonus.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::error::{CoreError, Result, StoreError};
use crate::events::{Event, EventSink, NullSink};
use crate::goal;
use crate::model::{
    CompletionLog, GroupId, Habit, HabitId, HabitKind, Member, MemberId, QuestId, Streak,
    Visibility, XpAccount,
};
use crate::quest::{self, QuestProgress};
use crate::schedule::{self, iso_week_bounds, iso_week_key};
use crate::store::Store;
use crate::streak::{self, StreakUpdate};
use crate::xp::{self, LevelTransition};

/// Result of `record_completion`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub log: CompletionLog,
    /// XP credited by this call (base reward plus streak bonus).
    pub xp_earned: u32,
    /// True when the day was already logged; nothing changed.
    pub duplicate: bool,
    pub streak: Option<StreakUpdate>,
    pub level_up: Option<LevelTransition>,
    /// Group XP awarded to the shared-habit group by this call.
    pub group_bonus: Option<u32>,
}

/// Per-(habit, member) stats for display.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HabitStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Completions in the current ISO week (weekly-target habits).
    pub weekly_done: Option<u32>,
    /// Resolved weekly target (weekly-target habits).
    pub weekly_target: Option<u32>,
    pub percent_week: Option<f64>,
    pub percent_month: Option<f64>,
}

/// Keyed mutual-exclusion registry. Locks are created on first use and
/// kept for the engine's lifetime; the key space (habits x members,
/// habit-periods, quests) is small for a family-sized group.
#[derive(Default)]
struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    fn acquire(&self, key: String) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self.locks.lock().map_err(|_| StoreError::Locked)?;
        Ok(Arc::clone(locks.entry(key).or_default()))
    }
}

fn lock_guard(lock: &Mutex<()>) -> std::sync::MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The habit scheduling and progress engine.
pub struct HabitEngine<S: Store> {
    store: S,
    sink: Arc<dyn EventSink>,
    locks: LockRegistry,
}

impl<S: Store> HabitEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_sink(store, Arc::new(NullSink))
    }

    pub fn with_sink(store: S, sink: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            sink,
            locks: LockRegistry::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether `habit` is due on `date`. Pure delegation.
    pub fn is_due(&self, habit: &Habit, date: NaiveDate) -> bool {
        schedule::is_due(habit, date)
    }

    fn habit(&self, id: HabitId) -> Result<Habit> {
        self.store.habit(id)?.ok_or(CoreError::HabitNotFound(id))
    }

    fn member(&self, id: MemberId) -> Result<Member> {
        self.store.member(id)?.ok_or(CoreError::MemberNotFound(id))
    }

    /// Record a completion for (habit, member, date).
    ///
    /// A malformed or goal-missing value is not rejected: the log is
    /// persisted with zero XP and leaves streaks untouched. A duplicate
    /// day returns the existing log unchanged.
    pub fn record_completion(
        &self,
        habit_id: HabitId,
        member_id: MemberId,
        date: NaiveDate,
        value: Option<serde_json::Value>,
    ) -> Result<CompletionOutcome> {
        let habit = self.habit(habit_id)?;
        if !habit.active {
            return Err(CoreError::HabitInactive(habit_id));
        }
        self.member(member_id)?;

        let pair_lock = self
            .locks
            .acquire(format!("completion:{habit_id}:{member_id}"))?;
        let _pair = lock_guard(&pair_lock);

        if let Some(existing) = self.store.log_for_day(habit_id, member_id, date)? {
            return Ok(self.duplicate_outcome(existing, habit_id, member_id)?);
        }

        let qualifies = goal::counts_toward_goal(&habit, member_id, date, value.as_ref());

        let mut xp_earned = 0u32;
        let mut streak_update = None;
        let mut recalc_anchor = None;
        if qualifies {
            xp_earned += self.base_reward(&habit, member_id, date)?;

            let mut streak = self
                .store
                .streak(habit_id, member_id)?
                .unwrap_or_else(|| Streak::new(habit_id, member_id));
            // A backdated log cannot go through the incremental update:
            // `advance` would treat it as the newest day and reset the
            // live streak. Full recompute after the insert instead,
            // anchored at the most recent completion. Milestone bonuses
            // stay on the in-order path.
            if streak.last_completed.is_some_and(|last| date < last) {
                recalc_anchor = streak.last_completed;
            } else {
                let update = streak::advance(&mut streak, date);
                self.store.put_streak(&streak)?;
                xp_earned += update.bonus_xp;
                if let Some(length) = update.milestone {
                    self.sink.emit(Event::StreakMilestone {
                        habit_id,
                        member_id,
                        length,
                        bonus_xp: update.bonus_xp,
                        at: Utc::now(),
                    });
                }
                streak_update = Some(update);
            }
        }

        let log = CompletionLog::new(habit_id, member_id, date, value, xp_earned);
        match self.store.insert_log(&log) {
            Ok(()) => {}
            Err(StoreError::DuplicateLog { .. }) => {
                // Uniqueness backstop fired despite the lock (e.g. a
                // second process): fold into the duplicate path.
                if let Some(existing) = self.store.log_for_day(habit_id, member_id, date)? {
                    return Ok(self.duplicate_outcome(existing, habit_id, member_id)?);
                }
                return Err(StoreError::DuplicateLog { date }.into());
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(anchor) = recalc_anchor {
            let recomputed = self.recalc_streak_locked(&habit, member_id, anchor)?;
            streak_update = Some(StreakUpdate {
                current: recomputed.current,
                longest: recomputed.longest,
                bonus_xp: 0,
                milestone: None,
                already_counted: false,
            });
        }

        let mut level_up = None;
        if xp_earned > 0 {
            let account = self.store.member_account(member_id)?;
            let transition = xp::apply(account.total_xp, xp_earned);
            self.store.put_member_account(
                member_id,
                XpAccount {
                    total_xp: transition.new_total,
                    level: transition.new_level,
                },
            )?;
            if transition.leveled_up {
                self.sink.emit(Event::LevelUp {
                    member_id,
                    old_level: transition.old_level,
                    new_level: transition.new_level,
                    at: Utc::now(),
                });
            }
            level_up = Some(transition);
        }

        let group_bonus = if habit.visibility == Visibility::Shared {
            self.try_award_group_bonus(&habit, date)?
        } else {
            None
        };

        Ok(CompletionOutcome {
            log,
            xp_earned,
            duplicate: false,
            streak: streak_update,
            level_up,
            group_bonus,
        })
    }

    /// Delete a day's log and fully recompute the streak from history.
    /// XP already granted for the day is not revoked.
    pub fn remove_completion(
        &self,
        habit_id: HabitId,
        member_id: MemberId,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<()> {
        let habit = self.habit(habit_id)?;

        let pair_lock = self
            .locks
            .acquire(format!("completion:{habit_id}:{member_id}"))?;
        let _pair = lock_guard(&pair_lock);

        self.store.delete_log(habit_id, member_id, date)?;
        self.recalc_streak_locked(&habit, member_id, today)?;
        Ok(())
    }

    /// Full streak recomputation for backdated edits.
    pub fn recalc_streak(
        &self,
        habit_id: HabitId,
        member_id: MemberId,
        today: NaiveDate,
    ) -> Result<Streak> {
        let habit = self.habit(habit_id)?;

        let pair_lock = self
            .locks
            .acquire(format!("completion:{habit_id}:{member_id}"))?;
        let _pair = lock_guard(&pair_lock);

        self.recalc_streak_locked(&habit, member_id, today)
    }

    /// Display stats for one (habit, member) pair.
    pub fn get_stats(
        &self,
        habit_id: HabitId,
        member_id: MemberId,
        today: NaiveDate,
    ) -> Result<HabitStats> {
        let habit = self.habit(habit_id)?;
        let logs = self.store.logs_for_member(habit_id, member_id)?;
        let satisfying = satisfying_dates(&habit, member_id, &logs);

        let mut stats = HabitStats::default();
        if let Some(streak) = self.store.streak(habit_id, member_id)? {
            stats.current_streak = streak.current;
            stats.longest_streak = streak.longest;
        }

        let (week_start, week_end) = iso_week_bounds(today);
        if habit.kind == HabitKind::TimesPerWeek {
            let done = logs
                .iter()
                .filter(|l| l.date >= week_start && l.date <= week_end)
                .count() as u32;
            stats.weekly_done = Some(done);
            stats.weekly_target = goal::weekly_target(&habit, member_id, today);
            if let Some(target) = stats.weekly_target {
                stats.percent_week = Some((done as f64 / target as f64 * 100.0).min(100.0));
            }
        } else {
            stats.percent_week = due_window_percent(&habit, &satisfying, week_start, today);
        }

        let month_start = today.with_day(1).unwrap_or(today);
        stats.percent_month = match habit.kind {
            HabitKind::TimesPerWeek => {
                // Every day counts as loggable for a weekly-target habit.
                let done = logs
                    .iter()
                    .filter(|l| l.date >= month_start && l.date <= today)
                    .count();
                let days = (today - month_start).num_days() + 1;
                Some((done as f64 / days as f64 * 100.0).min(100.0))
            }
            _ => due_window_percent(&habit, &satisfying, month_start, today),
        };

        Ok(stats)
    }

    /// Recompute a quest's progress; single-flight per quest.
    pub fn refresh_quest(&self, quest_id: QuestId) -> Result<QuestProgress> {
        let quest_lock = self.locks.acquire(format!("quest:{quest_id}"))?;
        let _flight = lock_guard(&quest_lock);

        let mut quest = self
            .store
            .quest(quest_id)?
            .ok_or(CoreError::QuestNotFound(quest_id))?;
        let logs = self
            .store
            .group_logs_in_range(quest.group_id, quest.start_date, quest.end_date)?;
        let progress = quest::refresh(&mut quest, &logs);
        self.store.upsert_quest(&quest)?;

        if progress.just_completed {
            self.sink.emit(Event::QuestCompleted {
                quest_id: quest.id,
                group_id: quest.group_id,
                at: Utc::now(),
            });
        }
        Ok(progress)
    }

    /// Refresh every still-open quest of a group whose window has not
    /// closed before `today`. Periodic-job entry point.
    pub fn refresh_group_quests(
        &self,
        group: GroupId,
        today: NaiveDate,
    ) -> Result<Vec<(QuestId, QuestProgress)>> {
        let mut results = Vec::new();
        for quest in self.store.quests_for_group(group)? {
            if quest.completed || quest.end_date < today {
                continue;
            }
            let progress = self.refresh_quest(quest.id)?;
            results.push((quest.id, progress));
        }
        Ok(results)
    }

    /// Administrative XP correction for a member account. Not part of
    /// the completion flow.
    pub fn correct_member_xp(&self, member_id: MemberId, delta: i64) -> Result<LevelTransition> {
        let member = self.member(member_id)?;
        let account = self.store.member_account(member.id)?;
        let transition = xp::apply_correction(account.total_xp, delta);
        self.store.put_member_account(
            member.id,
            XpAccount {
                total_xp: transition.new_total,
                level: transition.new_level,
            },
        )?;
        Ok(transition)
    }

    fn duplicate_outcome(
        &self,
        existing: CompletionLog,
        habit_id: HabitId,
        member_id: MemberId,
    ) -> Result<CompletionOutcome> {
        let streak = self.store.streak(habit_id, member_id)?;
        Ok(CompletionOutcome {
            xp_earned: 0,
            duplicate: true,
            streak: streak.map(|s| StreakUpdate {
                current: s.current,
                longest: s.longest,
                bonus_xp: 0,
                milestone: None,
                already_counted: true,
            }),
            level_up: None,
            group_bonus: None,
            log: existing,
        })
    }

    /// Base reward for a qualifying log. Times-per-week habits pay out
    /// exactly once per ISO week, on the log that reaches the target.
    fn base_reward(&self, habit: &Habit, member_id: MemberId, date: NaiveDate) -> Result<u32> {
        if habit.kind != HabitKind::TimesPerWeek {
            return Ok(habit.xp_reward);
        }
        let Some(target) = goal::weekly_target(habit, member_id, date) else {
            return Ok(0);
        };
        let (week_start, week_end) = iso_week_bounds(date);
        let done_before = self
            .store
            .logs_in_range(habit.id, week_start, week_end)?
            .iter()
            .filter(|l| l.member_id == member_id)
            .count() as u32;
        Ok(if done_before + 1 == target {
            habit.xp_reward
        } else {
            0
        })
    }

    /// Check-and-award for the shared-habit group bonus, serialized per
    /// (habit, day) -- or per (habit, ISO week) for weekly targets --
    /// with a persistent marker as the at-most-once backstop.
    fn try_award_group_bonus(&self, habit: &Habit, date: NaiveDate) -> Result<Option<u32>> {
        let period = match habit.kind {
            HabitKind::TimesPerWeek => iso_week_key(date),
            _ => date.to_string(),
        };
        let bonus_lock = self
            .locks
            .acquire(format!("group-bonus:{}:{period}", habit.id))?;
        let _serialized = lock_guard(&bonus_lock);

        let members = self.store.group_members(habit.group_id)?;
        let (week_start, week_end) = iso_week_bounds(date);
        let logs = self.store.logs_in_range(habit.id, week_start, week_end)?;
        if !crate::shared::group_bonus_eligible(habit, &members, &logs, date) {
            return Ok(None);
        }
        if !self.store.claim_bonus_marker(habit.id, &period)? {
            return Ok(None);
        }

        let account = self.store.group_account(habit.group_id)?;
        let transition = xp::apply(account.total_xp, habit.xp_reward);
        self.store.put_group_account(
            habit.group_id,
            XpAccount {
                total_xp: transition.new_total,
                level: transition.new_level,
            },
        )?;
        self.sink.emit(Event::GroupBonusAwarded {
            habit_id: habit.id,
            group_id: habit.group_id,
            date,
            xp: habit.xp_reward,
            at: Utc::now(),
        });
        if transition.leveled_up {
            self.sink.emit(Event::GroupLevelUp {
                group_id: habit.group_id,
                old_level: transition.old_level,
                new_level: transition.new_level,
                at: Utc::now(),
            });
        }
        Ok(Some(habit.xp_reward))
    }

    fn recalc_streak_locked(
        &self,
        habit: &Habit,
        member_id: MemberId,
        today: NaiveDate,
    ) -> Result<Streak> {
        let logs = self.store.logs_for_member(habit.id, member_id)?;
        let dates = satisfying_dates(habit, member_id, &logs);
        let mut streak = self
            .store
            .streak(habit.id, member_id)?
            .unwrap_or_else(|| Streak::new(habit.id, member_id));
        streak::recompute(&mut streak, &dates, today);
        self.store.put_streak(&streak)?;
        Ok(streak)
    }
}

/// Goal-satisfying dates for a (habit, member) log history.
fn satisfying_dates(
    habit: &Habit,
    member_id: MemberId,
    logs: &[CompletionLog],
) -> BTreeSet<NaiveDate> {
    logs.iter()
        .filter(|log| goal::counts_toward_goal(habit, member_id, log.date, log.value.as_ref()))
        .map(|log| log.date)
        .collect()
}

/// Percentage of due days in `[window_start, today]` with a satisfying
/// log. `None` when no day in the window was due.
fn due_window_percent(
    habit: &Habit,
    satisfying: &BTreeSet<NaiveDate>,
    window_start: NaiveDate,
    today: NaiveDate,
) -> Option<f64> {
    let mut due = 0u32;
    let mut done = 0u32;
    let mut day = window_start;
    while day <= today {
        if schedule::is_due(habit, day) {
            due += 1;
            if satisfying.contains(&day) {
                done += 1;
            }
        }
        day += Duration::days(1);
    }
    (due > 0).then(|| done as f64 / due as f64 * 100.0)
}
