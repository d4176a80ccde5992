//! Group quest commands.

use clap::Subcommand;
use familyquest_core::{GroupQuest, Store};

use crate::common::{load_group, open_engine, parse_date};

#[derive(Subcommand)]
pub enum QuestAction {
    /// Create a group quest
    Add {
        /// Quest name
        name: String,
        /// Aggregate XP target
        #[arg(long)]
        target: u32,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,
        /// End date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        end: String,
    },
    /// List group quests
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recompute quest progress from the completion history
    Refresh {
        /// Quest name (default: all open quests)
        name: Option<String>,
    },
}

pub fn run(action: QuestAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine()?;
    let group = load_group()?.group_id;

    match action {
        QuestAction::Add { name, target, start, end } => {
            let start = parse_date(Some(&start))?;
            let end = parse_date(Some(&end))?;
            if end < start {
                return Err("quest end date precedes start date".into());
            }
            let quest = GroupQuest::new(group, name, target, start, end);
            engine.store().upsert_quest(&quest)?;
            println!("Quest created: {} ({})", quest.name, quest.id);
        }
        QuestAction::List { json } => {
            let quests = engine.store().quests_for_group(group)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&quests)?);
            } else {
                for quest in quests {
                    let state = if quest.completed { " [done]" } else { "" };
                    println!(
                        "{}: {}/{} XP ({} to {}){}",
                        quest.name,
                        quest.current_xp,
                        quest.target_xp,
                        quest.start_date,
                        quest.end_date,
                        state
                    );
                }
            }
        }
        QuestAction::Refresh { name } => {
            let today = parse_date(None)?;
            match name {
                Some(name) => {
                    let quest = engine
                        .store()
                        .quests_for_group(group)?
                        .into_iter()
                        .find(|q| q.name == name)
                        .ok_or_else(|| format!("no quest named '{name}'"))?;
                    let progress = engine.refresh_quest(quest.id)?;
                    println!("{}: {} XP", quest.name, progress.current_xp);
                    if progress.just_completed {
                        println!("Quest completed!");
                    }
                }
                None => {
                    for (id, progress) in engine.refresh_group_quests(group, today)? {
                        println!("{id}: {} XP", progress.current_xp);
                        if progress.just_completed {
                            println!("Quest completed!");
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
