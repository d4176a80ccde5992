//! SQLite-backed store.
//!
//! The `UNIQUE(habit_id, member_id, date)` constraint on completion logs
//! is the persistent backstop behind the engine's serialized
//! check-then-insert; structured columns (recurrence, goal, log values)
//! are stored as JSON text.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StoreError;
use crate::model::{
    CompletionLog, Goal, GroupId, GroupQuest, Habit, HabitId, HabitKind, Member, MemberId,
    QuestId, Recurrence, Streak, Visibility, XpAccount,
};

use super::Store;

/// Returns `~/.config/familyquest[-dev]/` based on FAMILYQUEST_ENV.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FAMILYQUEST_ENV").unwrap_or_else(|_| "production".to_string());
    let dir = if env == "dev" {
        base_dir.join("familyquest-dev")
    } else {
        base_dir.join("familyquest")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn format_kind(kind: HabitKind) -> &'static str {
    match kind {
        HabitKind::Boolean => "boolean",
        HabitKind::Scale => "scale",
        HabitKind::Quantity => "quantity",
        HabitKind::Checklist => "checklist",
        HabitKind::TimesPerWeek => "times_per_week",
    }
}

fn parse_kind(kind: &str) -> HabitKind {
    match kind {
        "scale" => HabitKind::Scale,
        "quantity" => HabitKind::Quantity,
        "checklist" => HabitKind::Checklist,
        "times_per_week" => HabitKind::TimesPerWeek,
        _ => HabitKind::Boolean,
    }
}

fn format_visibility(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Personal => "personal",
        Visibility::Public => "public",
        Visibility::Shared => "shared",
    }
}

fn parse_visibility(visibility: &str) -> Visibility {
    match visibility {
        "public" => Visibility::Public,
        "shared" => Visibility::Shared,
        _ => Visibility::Personal,
    }
}

fn parse_uuid(s: &str) -> uuid::Uuid {
    s.parse().unwrap_or_else(|_| uuid::Uuid::nil())
}

fn parse_date(s: &str) -> NaiveDate {
    s.parse()
        .unwrap_or_else(|_| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default())
}

fn parse_datetime_fallback(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn row_to_habit(row: &rusqlite::Row) -> Result<Habit, rusqlite::Error> {
    let id: String = row.get(0)?;
    let group_id: String = row.get(1)?;
    let owner_id: String = row.get(2)?;
    let kind: String = row.get(5)?;
    let recurrence_json: String = row.get(6)?;
    let visibility: String = row.get(7)?;
    let goal_json: String = row.get(9)?;
    let goal_effective_from: Option<String> = row.get(10)?;
    let created_at: String = row.get(12)?;

    Ok(Habit {
        id: parse_uuid(&id),
        group_id: parse_uuid(&group_id),
        owner_id: parse_uuid(&owner_id),
        name: row.get(3)?,
        description: row.get(4)?,
        kind: parse_kind(&kind),
        recurrence: serde_json::from_str(&recurrence_json).unwrap_or(Recurrence::Daily),
        visibility: parse_visibility(&visibility),
        xp_reward: row.get(8)?,
        goal: serde_json::from_str(&goal_json).unwrap_or_else(|_| Goal::default()),
        goal_effective_from: goal_effective_from.as_deref().map(parse_date),
        active: row.get(11)?,
        created_at: parse_datetime_fallback(&created_at),
    })
}

fn row_to_log(row: &rusqlite::Row) -> Result<CompletionLog, rusqlite::Error> {
    let id: String = row.get(0)?;
    let habit_id: String = row.get(1)?;
    let member_id: String = row.get(2)?;
    let date: String = row.get(3)?;
    let value_json: Option<String> = row.get(4)?;
    let created_at: String = row.get(6)?;

    Ok(CompletionLog {
        id: parse_uuid(&id),
        habit_id: parse_uuid(&habit_id),
        member_id: parse_uuid(&member_id),
        date: parse_date(&date),
        value: value_json.and_then(|v| serde_json::from_str(&v).ok()),
        xp_earned: row.get(5)?,
        created_at: parse_datetime_fallback(&created_at),
    })
}

fn row_to_quest(row: &rusqlite::Row) -> Result<GroupQuest, rusqlite::Error> {
    let id: String = row.get(0)?;
    let group_id: String = row.get(1)?;
    let start_date: String = row.get(5)?;
    let end_date: String = row.get(6)?;
    let created_at: String = row.get(8)?;

    Ok(GroupQuest {
        id: parse_uuid(&id),
        group_id: parse_uuid(&group_id),
        name: row.get(2)?,
        target_xp: row.get(3)?,
        current_xp: row.get(4)?,
        start_date: parse_date(&start_date),
        end_date: parse_date(&end_date),
        completed: row.get(7)?,
        created_at: parse_datetime_fallback(&created_at),
    })
}

const HABIT_COLUMNS: &str = "id, group_id, owner_id, name, description, kind, recurrence, \
     visibility, xp_reward, goal, goal_effective_from, active, created_at";
const LOG_COLUMNS: &str = "id, habit_id, member_id, date, value, xp_earned, created_at";
const QUEST_COLUMNS: &str =
    "id, group_id, name, target_xp, current_xp, start_date, end_date, completed, created_at";

/// SQLite store. The connection sits behind a mutex so the store can be
/// shared across request-handling threads.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and migrate) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    /// Open the database at `~/.config/familyquest/familyquest.db`.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(data_dir()?.join("familyquest.db"))
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Locked)?;
        f(&conn)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS habits (
                    id                  TEXT PRIMARY KEY,
                    group_id            TEXT NOT NULL,
                    owner_id            TEXT NOT NULL,
                    name                TEXT NOT NULL,
                    description         TEXT,
                    kind                TEXT NOT NULL,
                    recurrence          TEXT NOT NULL,
                    visibility          TEXT NOT NULL,
                    xp_reward           INTEGER NOT NULL DEFAULT 10,
                    goal                TEXT NOT NULL DEFAULT '{}',
                    goal_effective_from TEXT,
                    active              INTEGER NOT NULL DEFAULT 1,
                    created_at          TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS members (
                    id       TEXT PRIMARY KEY,
                    group_id TEXT NOT NULL,
                    name     TEXT NOT NULL,
                    active   INTEGER NOT NULL DEFAULT 1
                );
                CREATE TABLE IF NOT EXISTS completion_logs (
                    id         TEXT PRIMARY KEY,
                    habit_id   TEXT NOT NULL,
                    member_id  TEXT NOT NULL,
                    date       TEXT NOT NULL,
                    value      TEXT,
                    xp_earned  INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    UNIQUE(habit_id, member_id, date)
                );
                CREATE INDEX IF NOT EXISTS idx_logs_habit_date
                    ON completion_logs(habit_id, date);
                CREATE INDEX IF NOT EXISTS idx_logs_member_date
                    ON completion_logs(member_id, date);
                CREATE TABLE IF NOT EXISTS streaks (
                    habit_id       TEXT NOT NULL,
                    member_id      TEXT NOT NULL,
                    current        INTEGER NOT NULL DEFAULT 0,
                    longest        INTEGER NOT NULL DEFAULT 0,
                    last_completed TEXT,
                    PRIMARY KEY (habit_id, member_id)
                );
                CREATE TABLE IF NOT EXISTS member_accounts (
                    member_id TEXT PRIMARY KEY,
                    total_xp  INTEGER NOT NULL DEFAULT 0,
                    level     INTEGER NOT NULL DEFAULT 1
                );
                CREATE TABLE IF NOT EXISTS group_accounts (
                    group_id TEXT PRIMARY KEY,
                    total_xp INTEGER NOT NULL DEFAULT 0,
                    level    INTEGER NOT NULL DEFAULT 1
                );
                CREATE TABLE IF NOT EXISTS group_bonuses (
                    habit_id TEXT NOT NULL,
                    period   TEXT NOT NULL,
                    PRIMARY KEY (habit_id, period)
                );
                CREATE TABLE IF NOT EXISTS quests (
                    id         TEXT PRIMARY KEY,
                    group_id   TEXT NOT NULL,
                    name       TEXT NOT NULL,
                    target_xp  INTEGER NOT NULL,
                    current_xp INTEGER NOT NULL DEFAULT 0,
                    start_date TEXT NOT NULL,
                    end_date   TEXT NOT NULL,
                    completed  INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );",
            )?;
            Ok(())
        })
    }
}

impl Store for SqliteStore {
    fn habit(&self, id: HabitId) -> Result<Option<Habit>, StoreError> {
        self.with_conn(|conn| {
            let habit = conn
                .query_row(
                    &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE id = ?1"),
                    params![id.to_string()],
                    row_to_habit,
                )
                .optional()?;
            Ok(habit)
        })
    }

    fn upsert_habit(&self, habit: &Habit) -> Result<(), StoreError> {
        let recurrence = serde_json::to_string(&habit.recurrence)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        let goal = serde_json::to_string(&habit.goal)
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO habits ({HABIT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    habit.id.to_string(),
                    habit.group_id.to_string(),
                    habit.owner_id.to_string(),
                    habit.name,
                    habit.description,
                    format_kind(habit.kind),
                    recurrence,
                    format_visibility(habit.visibility),
                    habit.xp_reward,
                    goal,
                    habit.goal_effective_from.map(|d| d.to_string()),
                    habit.active,
                    habit.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    fn habits_for_group(&self, group: GroupId) -> Result<Vec<Habit>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {HABIT_COLUMNS} FROM habits WHERE group_id = ?1 ORDER BY created_at"
            ))?;
            let habits = stmt
                .query_map(params![group.to_string()], row_to_habit)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(habits)
        })
    }

    fn member(&self, id: MemberId) -> Result<Option<Member>, StoreError> {
        self.with_conn(|conn| {
            let member = conn
                .query_row(
                    "SELECT id, group_id, name, active FROM members WHERE id = ?1",
                    params![id.to_string()],
                    |row| {
                        let id: String = row.get(0)?;
                        let group_id: String = row.get(1)?;
                        Ok(Member {
                            id: parse_uuid(&id),
                            group_id: parse_uuid(&group_id),
                            name: row.get(2)?,
                            active: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(member)
        })
    }

    fn upsert_member(&self, member: &Member) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO members (id, group_id, name, active)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    member.id.to_string(),
                    member.group_id.to_string(),
                    member.name,
                    member.active,
                ],
            )?;
            Ok(())
        })
    }

    fn group_members(&self, group: GroupId) -> Result<Vec<Member>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, group_id, name, active FROM members
                 WHERE group_id = ?1 ORDER BY name",
            )?;
            let members = stmt
                .query_map(params![group.to_string()], |row| {
                    let id: String = row.get(0)?;
                    let group_id: String = row.get(1)?;
                    Ok(Member {
                        id: parse_uuid(&id),
                        group_id: parse_uuid(&group_id),
                        name: row.get(2)?,
                        active: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(members)
        })
    }

    fn log_for_day(
        &self,
        habit: HabitId,
        member: MemberId,
        date: NaiveDate,
    ) -> Result<Option<CompletionLog>, StoreError> {
        self.with_conn(|conn| {
            let log = conn
                .query_row(
                    &format!(
                        "SELECT {LOG_COLUMNS} FROM completion_logs
                         WHERE habit_id = ?1 AND member_id = ?2 AND date = ?3"
                    ),
                    params![habit.to_string(), member.to_string(), date.to_string()],
                    row_to_log,
                )
                .optional()?;
            Ok(log)
        })
    }

    fn insert_log(&self, log: &CompletionLog) -> Result<(), StoreError> {
        let value = match &log.value {
            Some(v) => Some(
                serde_json::to_string(v).map_err(|e| StoreError::QueryFailed(e.to_string()))?,
            ),
            None => None,
        };
        self.with_conn(|conn| {
            let result = conn.execute(
                &format!(
                    "INSERT INTO completion_logs ({LOG_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    log.id.to_string(),
                    log.habit_id.to_string(),
                    log.member_id.to_string(),
                    log.date.to_string(),
                    value,
                    log.xp_earned,
                    log.created_at.to_rfc3339(),
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => {
                    Err(StoreError::DuplicateLog { date: log.date })
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete_log(
        &self,
        habit: HabitId,
        member: MemberId,
        date: NaiveDate,
    ) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM completion_logs
                 WHERE habit_id = ?1 AND member_id = ?2 AND date = ?3",
                params![habit.to_string(), member.to_string(), date.to_string()],
            )?;
            Ok(affected > 0)
        })
    }

    fn logs_for_member(
        &self,
        habit: HabitId,
        member: MemberId,
    ) -> Result<Vec<CompletionLog>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM completion_logs
                 WHERE habit_id = ?1 AND member_id = ?2 ORDER BY date"
            ))?;
            let logs = stmt
                .query_map(params![habit.to_string(), member.to_string()], row_to_log)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(logs)
        })
    }

    fn logs_in_range(
        &self,
        habit: HabitId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompletionLog>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM completion_logs
                 WHERE habit_id = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date"
            ))?;
            let logs = stmt
                .query_map(
                    params![habit.to_string(), start.to_string(), end.to_string()],
                    row_to_log,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(logs)
        })
    }

    fn group_logs_in_range(
        &self,
        group: GroupId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompletionLog>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {columns} FROM completion_logs l
                 JOIN members m ON m.id = l.member_id
                 WHERE m.group_id = ?1 AND l.date >= ?2 AND l.date <= ?3
                 ORDER BY l.date",
                columns = "l.id, l.habit_id, l.member_id, l.date, l.value, l.xp_earned, \
                           l.created_at"
            ))?;
            let logs = stmt
                .query_map(
                    params![group.to_string(), start.to_string(), end.to_string()],
                    row_to_log,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(logs)
        })
    }

    fn streak(&self, habit: HabitId, member: MemberId) -> Result<Option<Streak>, StoreError> {
        self.with_conn(|conn| {
            let streak = conn
                .query_row(
                    "SELECT habit_id, member_id, current, longest, last_completed
                     FROM streaks WHERE habit_id = ?1 AND member_id = ?2",
                    params![habit.to_string(), member.to_string()],
                    |row| {
                        let habit_id: String = row.get(0)?;
                        let member_id: String = row.get(1)?;
                        let last_completed: Option<String> = row.get(4)?;
                        Ok(Streak {
                            habit_id: parse_uuid(&habit_id),
                            member_id: parse_uuid(&member_id),
                            current: row.get(2)?,
                            longest: row.get(3)?,
                            last_completed: last_completed.as_deref().map(parse_date),
                        })
                    },
                )
                .optional()?;
            Ok(streak)
        })
    }

    fn put_streak(&self, streak: &Streak) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO streaks
                 (habit_id, member_id, current, longest, last_completed)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    streak.habit_id.to_string(),
                    streak.member_id.to_string(),
                    streak.current,
                    streak.longest,
                    streak.last_completed.map(|d| d.to_string()),
                ],
            )?;
            Ok(())
        })
    }

    fn member_account(&self, member: MemberId) -> Result<XpAccount, StoreError> {
        self.with_conn(|conn| {
            let account = conn
                .query_row(
                    "SELECT total_xp, level FROM member_accounts WHERE member_id = ?1",
                    params![member.to_string()],
                    |row| {
                        Ok(XpAccount {
                            total_xp: row.get::<_, i64>(0)? as u64,
                            level: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(account.unwrap_or_default())
        })
    }

    fn put_member_account(&self, member: MemberId, account: XpAccount) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO member_accounts (member_id, total_xp, level)
                 VALUES (?1, ?2, ?3)",
                params![member.to_string(), account.total_xp as i64, account.level],
            )?;
            Ok(())
        })
    }

    fn group_account(&self, group: GroupId) -> Result<XpAccount, StoreError> {
        self.with_conn(|conn| {
            let account = conn
                .query_row(
                    "SELECT total_xp, level FROM group_accounts WHERE group_id = ?1",
                    params![group.to_string()],
                    |row| {
                        Ok(XpAccount {
                            total_xp: row.get::<_, i64>(0)? as u64,
                            level: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(account.unwrap_or_default())
        })
    }

    fn put_group_account(&self, group: GroupId, account: XpAccount) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO group_accounts (group_id, total_xp, level)
                 VALUES (?1, ?2, ?3)",
                params![group.to_string(), account.total_xp as i64, account.level],
            )?;
            Ok(())
        })
    }

    fn claim_bonus_marker(&self, habit: HabitId, period: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "INSERT OR IGNORE INTO group_bonuses (habit_id, period) VALUES (?1, ?2)",
                params![habit.to_string(), period],
            )?;
            Ok(affected > 0)
        })
    }

    fn quest(&self, id: QuestId) -> Result<Option<GroupQuest>, StoreError> {
        self.with_conn(|conn| {
            let quest = conn
                .query_row(
                    &format!("SELECT {QUEST_COLUMNS} FROM quests WHERE id = ?1"),
                    params![id.to_string()],
                    row_to_quest,
                )
                .optional()?;
            Ok(quest)
        })
    }

    fn upsert_quest(&self, quest: &GroupQuest) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO quests ({QUEST_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    quest.id.to_string(),
                    quest.group_id.to_string(),
                    quest.name,
                    quest.target_xp,
                    quest.current_xp,
                    quest.start_date.to_string(),
                    quest.end_date.to_string(),
                    quest.completed,
                    quest.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    fn quests_for_group(&self, group: GroupId) -> Result<Vec<GroupQuest>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {QUEST_COLUMNS} FROM quests WHERE group_id = ?1 ORDER BY start_date"
            ))?;
            let quests = stmt
                .query_map(params![group.to_string()], row_to_quest)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(quests)
        })
    }
}
