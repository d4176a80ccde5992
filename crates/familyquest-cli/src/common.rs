//! Shared helpers for CLI commands: store/engine setup, the local group
//! config, and member lookup by name.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use familyquest_core::store::sqlite::data_dir;
use familyquest_core::{HabitEngine, Member, SqliteStore, Store};

/// Local group identity, stored at `~/.config/familyquest/group.toml`.
/// Created with a fresh group id on first use.
#[derive(Serialize, Deserialize)]
pub struct GroupConfig {
    pub group_id: Uuid,
}

pub fn load_group() -> Result<GroupConfig, Box<dyn std::error::Error>> {
    let path = data_dir()?.join("group.toml");
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    } else {
        let config = GroupConfig { group_id: Uuid::new_v4() };
        std::fs::write(&path, toml::to_string_pretty(&config)?)?;
        Ok(config)
    }
}

pub fn open_engine() -> Result<HabitEngine<SqliteStore>, Box<dyn std::error::Error>> {
    Ok(HabitEngine::new(SqliteStore::open_default()?))
}

/// Resolve a member by name within the local group.
pub fn find_member(
    engine: &HabitEngine<SqliteStore>,
    group: Uuid,
    name: &str,
) -> Result<Member, Box<dyn std::error::Error>> {
    engine
        .store()
        .group_members(group)?
        .into_iter()
        .find(|m| m.name == name)
        .ok_or_else(|| format!("no member named '{name}'").into())
}

/// Parse a `YYYY-MM-DD` date, defaulting to today.
pub fn parse_date(date: Option<&str>) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match date {
        Some(s) => Ok(s.parse()?),
        None => Ok(Local::now().date_naive()),
    }
}
