//! Family member commands.

use clap::Subcommand;
use familyquest_core::{Member, Store};

use crate::common::{load_group, open_engine};

#[derive(Subcommand)]
pub enum MemberAction {
    /// Add a member to the family
    Add {
        /// Member name
        name: String,
    },
    /// List family members
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Deactivate a member (kept in history, ignored by shared habits)
    Deactivate {
        /// Member name
        name: String,
    },
}

pub fn run(action: MemberAction) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine()?;
    let group = load_group()?.group_id;

    match action {
        MemberAction::Add { name } => {
            let member = Member::new(group, name);
            engine.store().upsert_member(&member)?;
            println!("Member added: {} ({})", member.name, member.id);
        }
        MemberAction::List { json } => {
            let members = engine.store().group_members(group)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&members)?);
            } else {
                for member in members {
                    let state = if member.active { "" } else { " (inactive)" };
                    println!("{}{}", member.name, state);
                }
            }
        }
        MemberAction::Deactivate { name } => {
            let mut member = crate::common::find_member(&engine, group, &name)?;
            member.active = false;
            engine.store().upsert_member(&member)?;
            println!("Member deactivated: {}", member.name);
        }
    }
    Ok(())
}
