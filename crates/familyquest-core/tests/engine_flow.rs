//! Integration tests for the composite engine flows: completion,
//! idempotency, shared-habit group bonuses, weekly targets, stats, and
//! quest refresh.

use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use familyquest_core::{
    CollectingSink, Event, GroupQuest, Habit, HabitEngine, HabitKind, Member, MemoryStore,
    Recurrence, SqliteStore, Store, Visibility,
};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

struct Family {
    engine: HabitEngine<MemoryStore>,
    sink: Arc<CollectingSink>,
    group: Uuid,
    alice: Member,
    bob: Member,
}

fn family() -> Family {
    let group = Uuid::new_v4();
    let alice = Member::new(group, "alice");
    let bob = Member::new(group, "bob");
    let store = MemoryStore::new();
    store.upsert_member(&alice).unwrap();
    store.upsert_member(&bob).unwrap();
    let sink = Arc::new(CollectingSink::new());
    let engine = HabitEngine::with_sink(store, sink.clone());
    Family { engine, sink, group, alice, bob }
}

fn add_habit(f: &Family, kind: HabitKind, recurrence: Recurrence, visibility: Visibility) -> Habit {
    let habit = Habit::new(f.group, f.alice.id, "habit", kind, recurrence, visibility);
    f.engine.store().upsert_habit(&habit).unwrap();
    habit
}

#[test]
fn boolean_completion_earns_reward_and_streak() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);

    let day1 = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 29), None)
        .unwrap();
    assert!(!day1.duplicate);
    assert_eq!(day1.xp_earned, 10);
    assert_eq!(day1.streak.unwrap().current, 1);

    let day2 = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 30), None)
        .unwrap();
    assert_eq!(day2.streak.unwrap().current, 2);

    let account = f.engine.store().member_account(f.alice.id).unwrap();
    assert_eq!(account.total_xp, 20);
}

#[test]
fn skipping_a_day_resets_the_streak() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);

    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 27), None)
        .unwrap();
    let after_gap = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 29), None)
        .unwrap();
    assert_eq!(after_gap.streak.unwrap().current, 1);
}

#[test]
fn duplicate_completion_is_a_no_op() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);
    let today = d(2026, 8, 30);

    let first = f
        .engine
        .record_completion(habit.id, f.alice.id, today, None)
        .unwrap();
    let second = f
        .engine
        .record_completion(habit.id, f.alice.id, today, None)
        .unwrap();

    assert!(second.duplicate);
    assert_eq!(second.log.id, first.log.id);
    assert_eq!(second.xp_earned, 0);
    assert_eq!(second.streak.unwrap().current, 1);

    // Totals unchanged by the retry.
    let account = f.engine.store().member_account(f.alice.id).unwrap();
    assert_eq!(account.total_xp, 10);
}

#[test]
fn streak_milestones_pay_on_the_reaching_day_only() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);

    let mut day = d(2026, 8, 1);
    let mut bonuses = Vec::new();
    for _ in 0..8 {
        let outcome = f
            .engine
            .record_completion(habit.id, f.alice.id, day, None)
            .unwrap();
        bonuses.push(outcome.streak.unwrap().bonus_xp);
        day += chrono::Duration::days(1);
    }
    assert_eq!(bonuses, vec![0, 0, 10, 0, 0, 0, 25, 0]);

    let milestones = f
        .sink
        .take()
        .into_iter()
        .filter(|e| matches!(e, Event::StreakMilestone { .. }))
        .count();
    assert_eq!(milestones, 2);
}

#[test]
fn malformed_quantity_value_persists_with_zero_xp() {
    let f = family();
    let mut habit = Habit::new(
        f.group,
        f.alice.id,
        "water",
        HabitKind::Quantity,
        Recurrence::Daily,
        Visibility::Personal,
    );
    habit.goal.target = Some(8.0);
    f.engine.store().upsert_habit(&habit).unwrap();
    let today = d(2026, 8, 30);

    let outcome = f
        .engine
        .record_completion(habit.id, f.alice.id, today, Some(json!("a lot")))
        .unwrap();
    assert_eq!(outcome.xp_earned, 0);
    assert!(outcome.streak.is_none());

    // The log row still exists.
    let log = f
        .engine
        .store()
        .log_for_day(habit.id, f.alice.id, today)
        .unwrap()
        .unwrap();
    assert_eq!(log.xp_earned, 0);
    // And the streak was not advanced.
    assert!(f.engine.store().streak(habit.id, f.alice.id).unwrap().is_none());
}

#[test]
fn quantity_boundary_values() {
    let f = family();
    let mut habit = Habit::new(
        f.group,
        f.alice.id,
        "water",
        HabitKind::Quantity,
        Recurrence::Daily,
        Visibility::Personal,
    );
    habit.goal.target = Some(8.0);
    f.engine.store().upsert_habit(&habit).unwrap();

    let hit = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 29), Some(json!(8)))
        .unwrap();
    assert_eq!(hit.xp_earned, 10);

    let miss = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 30), Some(json!(7.99)))
        .unwrap();
    assert_eq!(miss.xp_earned, 0);
}

#[test]
fn weekly_target_rewards_exactly_on_the_nth_log() {
    let f = family();
    let mut habit = Habit::new(
        f.group,
        f.alice.id,
        "gym",
        HabitKind::TimesPerWeek,
        Recurrence::WeeklyTarget,
        Visibility::Personal,
    );
    habit.goal.target = Some(3.0);
    f.engine.store().upsert_habit(&habit).unwrap();

    // Week of Mon 2026-08-24.
    let first = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 24), None)
        .unwrap();
    let second = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 25), None)
        .unwrap();
    let third = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 26), None)
        .unwrap();
    let fourth = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 27), None)
        .unwrap();

    assert_eq!(first.log.xp_earned, 0);
    assert_eq!(second.log.xp_earned, 0);
    assert_eq!(third.log.xp_earned, 10 + 10); // reward + 3-day streak bonus
    assert_eq!(fourth.log.xp_earned, 0);

    // A new week pays again on its own third log.
    for day in [d(2026, 8, 31), d(2026, 9, 1)] {
        assert_eq!(
            f.engine
                .record_completion(habit.id, f.alice.id, day, None)
                .unwrap()
                .log
                .xp_earned,
            0
        );
    }
    let next_week_third = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 9, 2), None)
        .unwrap();
    assert!(next_week_third.log.xp_earned >= 10);
}

#[test]
fn shared_habit_group_bonus_awarded_once() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Shared);
    let today = d(2026, 8, 30);

    let only_alice = f
        .engine
        .record_completion(habit.id, f.alice.id, today, None)
        .unwrap();
    assert_eq!(only_alice.group_bonus, None);
    assert_eq!(f.engine.store().group_account(f.group).unwrap().total_xp, 0);

    let both = f
        .engine
        .record_completion(habit.id, f.bob.id, today, None)
        .unwrap();
    assert_eq!(both.group_bonus, Some(10));
    assert_eq!(f.engine.store().group_account(f.group).unwrap().total_xp, 10);

    let awarded = f
        .sink
        .take()
        .into_iter()
        .filter(|e| matches!(e, Event::GroupBonusAwarded { .. }))
        .count();
    assert_eq!(awarded, 1);

    // The next day is a fresh period.
    let tomorrow = d(2026, 8, 31);
    f.engine
        .record_completion(habit.id, f.alice.id, tomorrow, None)
        .unwrap();
    let again = f
        .engine
        .record_completion(habit.id, f.bob.id, tomorrow, None)
        .unwrap();
    assert_eq!(again.group_bonus, Some(10));
    assert_eq!(f.engine.store().group_account(f.group).unwrap().total_xp, 20);
}

#[test]
fn shared_weekly_target_needs_every_member_at_their_own_target() {
    let f = family();
    let mut habit = Habit::new(
        f.group,
        f.alice.id,
        "walks",
        HabitKind::TimesPerWeek,
        Recurrence::WeeklyTarget,
        Visibility::Shared,
    );
    habit.goal.target = Some(2.0);
    habit.goal.overrides.insert(f.bob.id, 1.0);
    f.engine.store().upsert_habit(&habit).unwrap();

    // Bob reaches his target of 1 immediately; alice is at 1 of 2.
    f.engine
        .record_completion(habit.id, f.bob.id, d(2026, 8, 24), None)
        .unwrap();
    let partial = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 24), None)
        .unwrap();
    assert_eq!(partial.group_bonus, None);

    // Alice's second completion closes the week for everyone.
    let complete = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 25), None)
        .unwrap();
    assert_eq!(complete.group_bonus, Some(10));

    // More logs in the same ISO week never re-award.
    let extra = f
        .engine
        .record_completion(habit.id, f.bob.id, d(2026, 8, 26), None)
        .unwrap();
    assert_eq!(extra.group_bonus, None);
    assert_eq!(f.engine.store().group_account(f.group).unwrap().total_xp, 10);
}

#[test]
fn backfilled_completion_does_not_reset_the_live_streak() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);

    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 29), None)
        .unwrap();
    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 30), None)
        .unwrap();

    // Backfill an earlier, non-adjacent day.
    let backfill = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 25), None)
        .unwrap();
    assert_eq!(backfill.xp_earned, 10);
    let update = backfill.streak.unwrap();
    assert_eq!(update.current, 2);
    assert_eq!(update.bonus_xp, 0);

    // Stored state matches a full recomputation, not a reset.
    let streak = f.engine.store().streak(habit.id, f.alice.id).unwrap().unwrap();
    assert_eq!(streak.current, 2);
    assert_eq!(streak.longest, 2);
    assert_eq!(streak.last_completed, Some(d(2026, 8, 30)));

    let truth = f.engine.recalc_streak(habit.id, f.alice.id, d(2026, 8, 30)).unwrap();
    assert_eq!(truth.current, streak.current);
    assert_eq!(truth.longest, streak.longest);
}

#[test]
fn backfilling_a_gap_joins_the_runs() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);

    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 28), None)
        .unwrap();
    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 30), None)
        .unwrap();

    let filled = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 29), None)
        .unwrap();
    assert_eq!(filled.streak.unwrap().current, 3);

    let streak = f.engine.store().streak(habit.id, f.alice.id).unwrap().unwrap();
    assert_eq!(streak.current, 3);
    assert_eq!(streak.longest, 3);
    assert_eq!(streak.last_completed, Some(d(2026, 8, 30)));
}

#[test]
fn remove_completion_recalcs_streak_without_revoking_xp() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);
    let today = d(2026, 8, 30);

    for day in [d(2026, 8, 28), d(2026, 8, 29), today] {
        f.engine.record_completion(habit.id, f.alice.id, day, None).unwrap();
    }
    let before = f.engine.store().member_account(f.alice.id).unwrap().total_xp;
    assert_eq!(before, 40); // 3 x 10 + 3-day milestone

    f.engine
        .remove_completion(habit.id, f.alice.id, d(2026, 8, 29), today)
        .unwrap();

    let streak = f.engine.store().streak(habit.id, f.alice.id).unwrap().unwrap();
    assert_eq!(streak.current, 1); // only today remains contiguous
    assert_eq!(streak.longest, 1); // the 28-29-30 run no longer exists in history
    // XP is sticky by design.
    assert_eq!(f.engine.store().member_account(f.alice.id).unwrap().total_xp, before);
}

#[test]
fn level_up_is_reported_and_emitted() {
    let f = family();
    let mut habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);
    habit.xp_reward = 120;
    f.engine.store().upsert_habit(&habit).unwrap();

    let outcome = f
        .engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 30), None)
        .unwrap();
    let transition = outcome.level_up.unwrap();
    assert!(transition.leveled_up);
    assert_eq!(transition.new_level, 2);
    assert!(f
        .sink
        .take()
        .iter()
        .any(|e| matches!(e, Event::LevelUp { new_level: 2, .. })));
}

#[test]
fn stats_report_weekly_progress_for_weekly_target() {
    let f = family();
    let mut habit = Habit::new(
        f.group,
        f.alice.id,
        "gym",
        HabitKind::TimesPerWeek,
        Recurrence::WeeklyTarget,
        Visibility::Personal,
    );
    habit.goal.target = Some(4.0);
    f.engine.store().upsert_habit(&habit).unwrap();

    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 24), None)
        .unwrap();
    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 26), None)
        .unwrap();

    let stats = f.engine.get_stats(habit.id, f.alice.id, d(2026, 8, 27)).unwrap();
    assert_eq!(stats.weekly_done, Some(2));
    assert_eq!(stats.weekly_target, Some(4));
    assert_eq!(stats.percent_week, Some(50.0));
}

#[test]
fn stats_for_daily_habit_cover_the_due_window() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);

    // Mon and Tue of the week done, checking on Wed.
    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 24), None)
        .unwrap();
    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 25), None)
        .unwrap();

    let stats = f.engine.get_stats(habit.id, f.alice.id, d(2026, 8, 26)).unwrap();
    assert_eq!(stats.current_streak, 2);
    // 2 of 3 due days so far this week.
    let percent = stats.percent_week.unwrap();
    assert!((percent - 66.0).abs() < 1.0);
}

#[test]
fn quest_refresh_caps_and_completes_once() {
    let f = family();
    let habit = add_habit(&f, HabitKind::Boolean, Recurrence::Daily, Visibility::Personal);
    let quest = GroupQuest::new(f.group, "August", 25, d(2026, 8, 1), d(2026, 8, 31));
    f.engine.store().upsert_quest(&quest).unwrap();

    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 29), None)
        .unwrap();
    let partial = f.engine.refresh_quest(quest.id).unwrap();
    assert_eq!(partial.current_xp, 10);
    assert!(!partial.just_completed);

    f.engine
        .record_completion(habit.id, f.bob.id, d(2026, 8, 29), None)
        .unwrap();
    f.engine
        .record_completion(habit.id, f.alice.id, d(2026, 8, 30), None)
        .unwrap();
    let done = f.engine.refresh_quest(quest.id).unwrap();
    assert_eq!(done.current_xp, 25); // capped below the raw sum
    assert!(done.just_completed);

    // Deleting history afterward does not reopen the quest.
    f.engine
        .remove_completion(habit.id, f.alice.id, d(2026, 8, 29), d(2026, 8, 30))
        .unwrap();
    let after_delete = f.engine.refresh_quest(quest.id).unwrap();
    assert!(!after_delete.just_completed);
    assert_eq!(after_delete.current_xp, 25);
    assert!(f.engine.store().quest(quest.id).unwrap().unwrap().completed);

    let completions = f
        .sink
        .take()
        .into_iter()
        .filter(|e| matches!(e, Event::QuestCompleted { .. }))
        .count();
    assert_eq!(completions, 1);
}

#[test]
fn refresh_group_quests_skips_completed_and_expired() {
    let f = family();
    let open = GroupQuest::new(f.group, "open", 100, d(2026, 8, 1), d(2026, 9, 30));
    let mut finished = GroupQuest::new(f.group, "done", 10, d(2026, 8, 1), d(2026, 9, 30));
    finished.completed = true;
    let expired = GroupQuest::new(f.group, "old", 100, d(2026, 7, 1), d(2026, 7, 31));
    for q in [&open, &finished, &expired] {
        f.engine.store().upsert_quest(q).unwrap();
    }

    let refreshed = f.engine.refresh_group_quests(f.group, d(2026, 8, 30)).unwrap();
    assert_eq!(refreshed.len(), 1);
    assert_eq!(refreshed[0].0, open.id);
}

#[test]
fn engine_runs_on_sqlite_store_too() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("fq.db")).unwrap();
    let group = Uuid::new_v4();
    let alice = Member::new(group, "alice");
    store.upsert_member(&alice).unwrap();
    let habit = Habit::new(
        group,
        alice.id,
        "journal",
        HabitKind::Boolean,
        Recurrence::Daily,
        Visibility::Personal,
    );
    store.upsert_habit(&habit).unwrap();

    let engine = HabitEngine::new(store);
    engine
        .record_completion(habit.id, alice.id, d(2026, 8, 29), None)
        .unwrap();
    let outcome = engine
        .record_completion(habit.id, alice.id, d(2026, 8, 30), None)
        .unwrap();
    assert_eq!(outcome.streak.unwrap().current, 2);

    // Reopen the same file: state survived.
    drop(engine);
    let store = SqliteStore::open(dir.path().join("fq.db")).unwrap();
    let streak = store.streak(habit.id, alice.id).unwrap().unwrap();
    assert_eq!(streak.current, 2);
    assert_eq!(store.member_account(alice.id).unwrap().total_xp, 20);
}
