//! Domain model for the FamilyQuest engine.
//!
//! Recurrence rules and goals are typed variants with explicit fields
//! rather than untyped config maps, so a missing or mistyped key cannot
//! occur past deserialization. Completion-log values stay opaque
//! (`serde_json::Value`) because their shape depends on the habit kind.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type HabitId = Uuid;
pub type MemberId = Uuid;
pub type GroupId = Uuid;
pub type QuestId = Uuid;
pub type LogId = Uuid;

/// What a logged value means for this habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitKind {
    /// Done / not done; any log counts.
    Boolean,
    /// Self-rated 1-5; counts from a configured minimum.
    Scale,
    /// Numeric reading compared against a target.
    Quantity,
    /// Item list; any log counts.
    Checklist,
    /// N completions per ISO week; reward fires on the Nth log.
    TimesPerWeek,
}

/// When a habit is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    Daily,
    Weekly { days: Vec<Weekday> },
    Custom {
        interval_days: u32,
        /// Missing anchor falls back to the query date (always due that call).
        anchor: Option<NaiveDate>,
    },
    /// Always shown; goal satisfaction is evaluated on the weekly window.
    WeeklyTarget,
}

/// Who can see and complete the habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Personal,
    Public,
    /// Group bonus when every member satisfies the goal independently.
    Shared,
}

/// Comparison operator for quantity targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    #[default]
    AtLeast,
    AtMost,
}

/// The bar a logged value must clear to count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Default numeric target (quantity reading or weekly completion count).
    pub target: Option<f64>,
    #[serde(default)]
    pub comparison: Comparison,
    /// Minimum scale value that counts (default 1).
    pub min_scale: Option<u8>,
    /// Per-member target overrides.
    #[serde(default)]
    pub overrides: HashMap<MemberId, f64>,
}

/// A recurring tracked activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub group_id: GroupId,
    pub owner_id: MemberId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: HabitKind,
    pub recurrence: Recurrence,
    pub visibility: Visibility,
    pub xp_reward: u32,
    #[serde(default)]
    pub goal: Goal,
    /// Logs dated before this are evaluated without a goal.
    #[serde(default)]
    pub goal_effective_from: Option<NaiveDate>,
    /// Habits are soft-deactivated, never hard-deleted.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Habit {
    /// Create a habit with the default reward (10 XP) and an empty goal.
    pub fn new(
        group_id: GroupId,
        owner_id: MemberId,
        name: impl Into<String>,
        kind: HabitKind,
        recurrence: Recurrence,
        visibility: Visibility,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            owner_id,
            name: name.into(),
            description: None,
            kind,
            recurrence,
            visibility,
            xp_reward: 10,
            goal: Goal::default(),
            goal_effective_from: None,
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// One day's recorded attempt at a habit by one member.
/// Unique per (habit, member, date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionLog {
    pub id: LogId,
    pub habit_id: HabitId,
    pub member_id: MemberId,
    pub date: NaiveDate,
    pub value: Option<serde_json::Value>,
    /// XP actually credited for this row. Never revised after the fact.
    pub xp_earned: u32,
    pub created_at: DateTime<Utc>,
}

impl CompletionLog {
    pub fn new(
        habit_id: HabitId,
        member_id: MemberId,
        date: NaiveDate,
        value: Option<serde_json::Value>,
        xp_earned: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            habit_id,
            member_id,
            date,
            value,
            xp_earned,
            created_at: Utc::now(),
        }
    }
}

/// Derived streak state for one (habit, member) pair.
/// Always reconstructible from the completion history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Streak {
    pub habit_id: HabitId,
    pub member_id: MemberId,
    pub current: u32,
    pub longest: u32,
    pub last_completed: Option<NaiveDate>,
}

impl Streak {
    pub fn new(habit_id: HabitId, member_id: MemberId) -> Self {
        Self {
            habit_id,
            member_id,
            current: 0,
            longest: 0,
            last_completed: None,
        }
    }
}

/// A time-boxed aggregate-XP target for a whole group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupQuest {
    pub id: QuestId,
    pub group_id: GroupId,
    pub name: String,
    pub target_xp: u32,
    /// Capped at `target_xp`; frozen once `completed`.
    pub current_xp: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Set exactly once, never cleared.
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl GroupQuest {
    pub fn new(
        group_id: GroupId,
        name: impl Into<String>,
        target_xp: u32,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            name: name.into(),
            target_xp,
            current_xp: 0,
            start_date,
            end_date,
            completed: false,
            created_at: Utc::now(),
        }
    }
}

/// XP account state shared by members and groups.
/// `level` is a cache of the level formula over `total_xp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpAccount {
    pub total_xp: u64,
    pub level: u32,
}

impl Default for XpAccount {
    fn default() -> Self {
        Self { total_xp: 0, level: 1 }
    }
}

/// A resolved group member. Identity resolution happens upstream;
/// the engine never reaches into ambient auth state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub group_id: GroupId,
    pub name: String,
    pub active: bool,
}

impl Member {
    pub fn new(group_id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            name: name.into(),
            active: true,
        }
    }
}
