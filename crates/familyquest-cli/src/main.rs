use clap::{Parser, Subcommand};

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "familyquest-cli", version, about = "FamilyQuest CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Family member management
    Member {
        #[command(subcommand)]
        action: commands::member::MemberAction,
    },
    /// Habit management and completion
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Group quest management
    Quest {
        #[command(subcommand)]
        action: commands::quest::QuestAction,
    },
    /// XP and level overview
    Stats(commands::stats::StatsArgs),
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Member { action } => commands::member::run(action),
        Commands::Habit { action } => commands::habit::run(action),
        Commands::Quest { action } => commands::quest::run(action),
        Commands::Stats(args) => commands::stats::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
