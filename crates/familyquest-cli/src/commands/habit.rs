//! Habit management and completion commands.

use chrono::Weekday;
use clap::Subcommand;
use familyquest_core::{Habit, HabitKind, Recurrence, Store, Visibility};

use crate::common::{find_member, load_group, open_engine, parse_date};

#[derive(Subcommand)]
pub enum HabitAction {
    /// Create a new habit
    Add {
        /// Habit name
        name: String,
        /// Owner member name
        #[arg(long)]
        owner: String,
        /// Habit kind: boolean, scale, quantity, checklist, times-per-week
        #[arg(long, default_value = "boolean")]
        kind: String,
        /// Recurrence: daily, weekly, custom, weekly-target
        #[arg(long, default_value = "daily")]
        recurrence: String,
        /// Comma-separated weekdays for weekly recurrence (mon,tue,...)
        #[arg(long)]
        days: Option<String>,
        /// Interval in days for custom recurrence
        #[arg(long)]
        interval: Option<u32>,
        /// Anchor date for custom recurrence (YYYY-MM-DD)
        #[arg(long)]
        anchor: Option<String>,
        /// Visibility: personal, public, shared
        #[arg(long, default_value = "personal")]
        visibility: String,
        /// Base XP reward
        #[arg(long, default_value = "10")]
        xp: u32,
        /// Default goal target (quantity reading or weekly count)
        #[arg(long)]
        target: Option<f64>,
        /// Minimum scale value that counts
        #[arg(long)]
        min_scale: Option<u8>,
    },
    /// List habits
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List habits due today
    Today {
        /// Member name (personal habits of others are hidden)
        #[arg(long)]
        member: Option<String>,
    },
    /// Record a completion
    Complete {
        /// Habit name
        name: String,
        /// Completing member name
        #[arg(long)]
        member: String,
        /// Completion date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
        /// Logged value as JSON (e.g. 8 or '{"value": 3}')
        #[arg(long)]
        value: Option<String>,
    },
    /// Remove a completion and recalc the streak
    Uncomplete {
        /// Habit name
        name: String,
        /// Member name
        #[arg(long)]
        member: String,
        /// Completion date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Per-habit stats for a member
    Stats {
        /// Habit name
        name: String,
        /// Member name
        #[arg(long)]
        member: String,
    },
    /// Deactivate a habit (history is kept)
    Deactivate {
        /// Habit name
        name: String,
    },
}

fn parse_kind(kind: &str) -> Result<HabitKind, Box<dyn std::error::Error>> {
    match kind {
        "boolean" => Ok(HabitKind::Boolean),
        "scale" => Ok(HabitKind::Scale),
        "quantity" => Ok(HabitKind::Quantity),
        "checklist" => Ok(HabitKind::Checklist),
        "times-per-week" => Ok(HabitKind::TimesPerWeek),
        other => Err(format!("unknown habit kind: {other}").into()),
    }
}

fn parse_weekday(day: &str) -> Result<Weekday, Box<dyn std::error::Error>> {
    match day.trim().to_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        other => Err(format!("unknown weekday: {other}").into()),
    }
}

fn parse_visibility(visibility: &str) -> Result<Visibility, Box<dyn std::error::Error>> {
    match visibility {
        "personal" => Ok(Visibility::Personal),
        "public" => Ok(Visibility::Public),
        "shared" => Ok(Visibility::Shared),
        other => Err(format!("unknown visibility: {other}").into()),
    }
}

fn find_habit(
    engine: &familyquest_core::HabitEngine<familyquest_core::SqliteStore>,
    group: uuid::Uuid,
    name: &str,
) -> Result<Habit, Box<dyn std::error::Error>> {
    engine
        .store()
        .habits_for_group(group)?
        .into_iter()
        .find(|h| h.name == name && h.active)
        .ok_or_else(|| format!("no active habit named '{name}'").into())
}

pub fn run(action: HabitAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine()?;
    let group = load_group()?.group_id;

    match action {
        HabitAction::Add {
            name,
            owner,
            kind,
            recurrence,
            days,
            interval,
            anchor,
            visibility,
            xp,
            target,
            min_scale,
        } => {
            let owner = find_member(&engine, group, &owner)?;
            let recurrence = match recurrence.as_str() {
                "daily" => Recurrence::Daily,
                "weekly" => {
                    let days = days
                        .as_deref()
                        .unwrap_or("")
                        .split(',')
                        .filter(|s| !s.is_empty())
                        .map(parse_weekday)
                        .collect::<Result<Vec<_>, _>>()?;
                    Recurrence::Weekly { days }
                }
                "custom" => Recurrence::Custom {
                    interval_days: interval.unwrap_or(1),
                    anchor: anchor.as_deref().map(str::parse).transpose()?,
                },
                "weekly-target" => Recurrence::WeeklyTarget,
                other => return Err(format!("unknown recurrence: {other}").into()),
            };
            let mut habit = Habit::new(
                group,
                owner.id,
                name,
                parse_kind(&kind)?,
                recurrence,
                parse_visibility(&visibility)?,
            );
            habit.xp_reward = xp;
            habit.goal.target = target;
            habit.goal.min_scale = min_scale;
            engine.store().upsert_habit(&habit)?;
            println!("Habit created: {} ({})", habit.name, habit.id);
        }
        HabitAction::List { json } => {
            let habits = engine.store().habits_for_group(group)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&habits)?);
            } else {
                for habit in habits.iter().filter(|h| h.active) {
                    println!("{} [{:?}]", habit.name, habit.kind);
                }
            }
        }
        HabitAction::Today { member } => {
            let today = parse_date(None)?;
            let viewer = member
                .map(|name| find_member(&engine, group, &name))
                .transpose()?;
            for habit in engine.store().habits_for_group(group)? {
                if !habit.active || !engine.is_due(&habit, today) {
                    continue;
                }
                // Personal habits are visible to their owner only.
                if habit.visibility == Visibility::Personal {
                    match &viewer {
                        Some(m) if m.id == habit.owner_id => {}
                        _ => continue,
                    }
                }
                println!("{}", habit.name);
            }
        }
        HabitAction::Complete { name, member, date, value } => {
            let habit = find_habit(&engine, group, &name)?;
            let member = find_member(&engine, group, &member)?;
            let date = parse_date(date.as_deref())?;
            let value = value.as_deref().map(serde_json::from_str).transpose()?;
            let outcome = engine.record_completion(habit.id, member.id, date, value)?;
            if outcome.duplicate {
                println!("Already completed on {date}");
            } else {
                println!("Completed: +{} XP", outcome.xp_earned);
                if let Some(streak) = outcome.streak {
                    println!("Streak: {} (longest {})", streak.current, streak.longest);
                }
                if let Some(t) = outcome.level_up.filter(|t| t.leveled_up) {
                    println!("Level up! {} -> {}", t.old_level, t.new_level);
                }
                if let Some(bonus) = outcome.group_bonus {
                    println!("Family bonus: +{bonus} XP");
                }
            }
        }
        HabitAction::Uncomplete { name, member, date } => {
            let habit = find_habit(&engine, group, &name)?;
            let member = find_member(&engine, group, &member)?;
            let date = parse_date(date.as_deref())?;
            let today = parse_date(None)?;
            engine.remove_completion(habit.id, member.id, date, today)?;
            println!("Removed completion for {date}");
        }
        HabitAction::Stats { name, member } => {
            let habit = find_habit(&engine, group, &name)?;
            let member = find_member(&engine, group, &member)?;
            let today = parse_date(None)?;
            let stats = engine.get_stats(habit.id, member.id, today)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        HabitAction::Deactivate { name } => {
            let mut habit = find_habit(&engine, group, &name)?;
            habit.active = false;
            engine.store().upsert_habit(&habit)?;
            println!("Habit deactivated: {}", habit.name);
        }
    }
    Ok(())
}
