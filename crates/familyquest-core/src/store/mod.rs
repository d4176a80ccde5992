//! Persistence seam for the engine.
//!
//! The engine is store-agnostic: it only needs the queries below. The
//! crate ships an in-memory store (tests, simulations) and a SQLite store.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::NaiveDate;

use crate::error::StoreError;
use crate::model::{
    CompletionLog, GroupId, GroupQuest, Habit, HabitId, Member, MemberId, QuestId, Streak,
    XpAccount,
};

/// Repository abstraction the engine operates against.
///
/// Implementations must enforce the per-(habit, member, date) uniqueness
/// of completion logs in `insert_log` (returning
/// [`StoreError::DuplicateLog`]) -- it is the final backstop when the
/// engine's serialized check-then-insert is violated.
pub trait Store: Send + Sync {
    fn habit(&self, id: HabitId) -> Result<Option<Habit>, StoreError>;
    fn upsert_habit(&self, habit: &Habit) -> Result<(), StoreError>;
    fn habits_for_group(&self, group: GroupId) -> Result<Vec<Habit>, StoreError>;

    fn member(&self, id: MemberId) -> Result<Option<Member>, StoreError>;
    fn upsert_member(&self, member: &Member) -> Result<(), StoreError>;
    fn group_members(&self, group: GroupId) -> Result<Vec<Member>, StoreError>;

    fn log_for_day(
        &self,
        habit: HabitId,
        member: MemberId,
        date: NaiveDate,
    ) -> Result<Option<CompletionLog>, StoreError>;
    fn insert_log(&self, log: &CompletionLog) -> Result<(), StoreError>;
    /// Returns whether a log existed.
    fn delete_log(
        &self,
        habit: HabitId,
        member: MemberId,
        date: NaiveDate,
    ) -> Result<bool, StoreError>;
    fn logs_for_member(
        &self,
        habit: HabitId,
        member: MemberId,
    ) -> Result<Vec<CompletionLog>, StoreError>;
    /// All logs for a habit with `start <= date <= end`, any member.
    fn logs_in_range(
        &self,
        habit: HabitId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompletionLog>, StoreError>;
    /// All logs by members of `group` with `start <= date <= end`.
    fn group_logs_in_range(
        &self,
        group: GroupId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompletionLog>, StoreError>;

    fn streak(&self, habit: HabitId, member: MemberId) -> Result<Option<Streak>, StoreError>;
    fn put_streak(&self, streak: &Streak) -> Result<(), StoreError>;

    fn member_account(&self, member: MemberId) -> Result<XpAccount, StoreError>;
    fn put_member_account(&self, member: MemberId, account: XpAccount) -> Result<(), StoreError>;
    fn group_account(&self, group: GroupId) -> Result<XpAccount, StoreError>;
    fn put_group_account(&self, group: GroupId, account: XpAccount) -> Result<(), StoreError>;

    /// Record the group bonus marker for (habit, period key). Returns
    /// false when the marker was already present -- the at-most-once
    /// backstop for the award.
    fn claim_bonus_marker(&self, habit: HabitId, period: &str) -> Result<bool, StoreError>;

    fn quest(&self, id: QuestId) -> Result<Option<GroupQuest>, StoreError>;
    fn upsert_quest(&self, quest: &GroupQuest) -> Result<(), StoreError>;
    fn quests_for_group(&self, group: GroupId) -> Result<Vec<GroupQuest>, StoreError>;
}
