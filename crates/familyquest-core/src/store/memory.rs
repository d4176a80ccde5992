//! In-memory store for tests and simulations.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::model::{
    CompletionLog, GroupId, GroupQuest, Habit, HabitId, Member, MemberId, QuestId, Streak,
    XpAccount,
};

use super::Store;

#[derive(Default)]
struct Tables {
    habits: HashMap<HabitId, Habit>,
    members: HashMap<MemberId, Member>,
    logs: HashMap<(HabitId, MemberId, NaiveDate), CompletionLog>,
    streaks: HashMap<(HabitId, MemberId), Streak>,
    member_accounts: HashMap<MemberId, XpAccount>,
    group_accounts: HashMap<GroupId, XpAccount>,
    bonus_markers: HashSet<(HabitId, String)>,
    quests: HashMap<QuestId, GroupQuest>,
}

/// Hash-map tables behind one mutex.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T, StoreError> {
        let mut tables = self.tables.lock().map_err(|_| StoreError::Locked)?;
        Ok(f(&mut tables))
    }
}

impl Store for MemoryStore {
    fn habit(&self, id: HabitId) -> Result<Option<Habit>, StoreError> {
        self.with_tables(|t| t.habits.get(&id).cloned())
    }

    fn upsert_habit(&self, habit: &Habit) -> Result<(), StoreError> {
        self.with_tables(|t| {
            t.habits.insert(habit.id, habit.clone());
        })
    }

    fn habits_for_group(&self, group: GroupId) -> Result<Vec<Habit>, StoreError> {
        self.with_tables(|t| {
            let mut habits: Vec<Habit> = t
                .habits
                .values()
                .filter(|h| h.group_id == group)
                .cloned()
                .collect();
            habits.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            habits
        })
    }

    fn member(&self, id: MemberId) -> Result<Option<Member>, StoreError> {
        self.with_tables(|t| t.members.get(&id).cloned())
    }

    fn upsert_member(&self, member: &Member) -> Result<(), StoreError> {
        self.with_tables(|t| {
            t.members.insert(member.id, member.clone());
        })
    }

    fn group_members(&self, group: GroupId) -> Result<Vec<Member>, StoreError> {
        self.with_tables(|t| {
            let mut members: Vec<Member> = t
                .members
                .values()
                .filter(|m| m.group_id == group)
                .cloned()
                .collect();
            members.sort_by(|a, b| a.name.cmp(&b.name));
            members
        })
    }

    fn log_for_day(
        &self,
        habit: HabitId,
        member: MemberId,
        date: NaiveDate,
    ) -> Result<Option<CompletionLog>, StoreError> {
        self.with_tables(|t| t.logs.get(&(habit, member, date)).cloned())
    }

    fn insert_log(&self, log: &CompletionLog) -> Result<(), StoreError> {
        let key = (log.habit_id, log.member_id, log.date);
        self.with_tables(|t| {
            if t.logs.contains_key(&key) {
                return Err(StoreError::DuplicateLog { date: log.date });
            }
            t.logs.insert(key, log.clone());
            Ok(())
        })?
    }

    fn delete_log(
        &self,
        habit: HabitId,
        member: MemberId,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        self.with_tables(|t| t.logs.remove(&(habit, member, date)).is_some())
    }

    fn logs_for_member(
        &self,
        habit: HabitId,
        member: MemberId,
    ) -> Result<Vec<CompletionLog>, StoreError> {
        self.with_tables(|t| {
            let mut logs: Vec<CompletionLog> = t
                .logs
                .values()
                .filter(|l| l.habit_id == habit && l.member_id == member)
                .cloned()
                .collect();
            logs.sort_by_key(|l| l.date);
            logs
        })
    }

    fn logs_in_range(
        &self,
        habit: HabitId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompletionLog>, StoreError> {
        self.with_tables(|t| {
            let mut logs: Vec<CompletionLog> = t
                .logs
                .values()
                .filter(|l| l.habit_id == habit && l.date >= start && l.date <= end)
                .cloned()
                .collect();
            logs.sort_by_key(|l| l.date);
            logs
        })
    }

    fn group_logs_in_range(
        &self,
        group: GroupId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompletionLog>, StoreError> {
        self.with_tables(|t| {
            let member_ids: HashSet<MemberId> = t
                .members
                .values()
                .filter(|m| m.group_id == group)
                .map(|m| m.id)
                .collect();
            let mut logs: Vec<CompletionLog> = t
                .logs
                .values()
                .filter(|l| {
                    member_ids.contains(&l.member_id) && l.date >= start && l.date <= end
                })
                .cloned()
                .collect();
            logs.sort_by_key(|l| l.date);
            logs
        })
    }

    fn streak(&self, habit: HabitId, member: MemberId) -> Result<Option<Streak>, StoreError> {
        self.with_tables(|t| t.streaks.get(&(habit, member)).cloned())
    }

    fn put_streak(&self, streak: &Streak) -> Result<(), StoreError> {
        self.with_tables(|t| {
            t.streaks
                .insert((streak.habit_id, streak.member_id), streak.clone());
        })
    }

    fn member_account(&self, member: MemberId) -> Result<XpAccount, StoreError> {
        self.with_tables(|t| t.member_accounts.get(&member).copied().unwrap_or_default())
    }

    fn put_member_account(&self, member: MemberId, account: XpAccount) -> Result<(), StoreError> {
        self.with_tables(|t| {
            t.member_accounts.insert(member, account);
        })
    }

    fn group_account(&self, group: GroupId) -> Result<XpAccount, StoreError> {
        self.with_tables(|t| t.group_accounts.get(&group).copied().unwrap_or_default())
    }

    fn put_group_account(&self, group: GroupId, account: XpAccount) -> Result<(), StoreError> {
        self.with_tables(|t| {
            t.group_accounts.insert(group, account);
        })
    }

    fn claim_bonus_marker(&self, habit: HabitId, period: &str) -> Result<bool, StoreError> {
        self.with_tables(|t| t.bonus_markers.insert((habit, period.to_string())))
    }

    fn quest(&self, id: QuestId) -> Result<Option<GroupQuest>, StoreError> {
        self.with_tables(|t| t.quests.get(&id).cloned())
    }

    fn upsert_quest(&self, quest: &GroupQuest) -> Result<(), StoreError> {
        self.with_tables(|t| {
            t.quests.insert(quest.id, quest.clone());
        })
    }

    fn quests_for_group(&self, group: GroupId) -> Result<Vec<GroupQuest>, StoreError> {
        self.with_tables(|t| {
            let mut quests: Vec<GroupQuest> = t
                .quests
                .values()
                .filter(|q| q.group_id == group)
                .cloned()
                .collect();
            quests.sort_by_key(|q| q.start_date);
            quests
        })
    }
}
