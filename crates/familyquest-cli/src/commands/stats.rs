//! Family XP overview.

use clap::Args;
use familyquest_core::{xp, Store};

use crate::common::{load_group, open_engine};

#[derive(Args)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(serde::Serialize)]
struct MemberOverview {
    name: String,
    level: u32,
    total_xp: u64,
    xp_to_next_level: u64,
}

pub fn run(args: StatsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let engine = open_engine()?;
    let group = load_group()?.group_id;

    let mut overview = Vec::new();
    for member in engine.store().group_members(group)? {
        if !member.active {
            continue;
        }
        let account = engine.store().member_account(member.id)?;
        overview.push(MemberOverview {
            name: member.name,
            level: account.level,
            total_xp: account.total_xp,
            xp_to_next_level: xp::xp_for_next_level(account.level, account.total_xp),
        });
    }
    let family = engine.store().group_account(group)?;

    if args.json {
        #[derive(serde::Serialize)]
        struct Output {
            members: Vec<MemberOverview>,
            family_level: u32,
            family_xp: u64,
        }
        let out = Output {
            members: overview,
            family_level: family.level,
            family_xp: family.total_xp,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for m in &overview {
            println!(
                "{}: level {} ({} XP, {} to next)",
                m.name, m.level, m.total_xp, m.xp_to_next_level
            );
        }
        println!("Family: level {} ({} XP)", family.level, family.total_xp);
    }
    Ok(())
}
