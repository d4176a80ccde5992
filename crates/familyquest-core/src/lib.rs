//! # FamilyQuest Core Library
//!
//! Core business logic for FamilyQuest, a gamified family habit tracker.
//! The surrounding application (API transport, authentication, chat-bot
//! notifications) is a thin layer over this library.
//!
//! ## Architecture
//!
//! - **Schedule**: pure recurrence evaluation (is a habit due today?)
//! - **Goal**: does a logged value clear the habit's goal?
//! - **Streak**: incremental updates plus full recomputation for
//!   retroactive edits
//! - **XP**: one level formula for member and group accounts
//! - **Engine**: the composite completion flow with its serialization
//!   discipline, shared-habit group bonuses, and quest refresh
//! - **Store**: persistence seam with in-memory and SQLite backends
//!
//! ## Key Components
//!
//! - [`HabitEngine`]: composite operations over a [`Store`]
//! - [`SqliteStore`] / [`MemoryStore`]: shipped store backends
//! - [`EventSink`]: fire-and-forget seam for notification channels

pub mod engine;
pub mod error;
pub mod events;
pub mod goal;
pub mod model;
pub mod quest;
pub mod schedule;
pub mod shared;
pub mod store;
pub mod streak;
pub mod xp;

pub use engine::{CompletionOutcome, HabitEngine, HabitStats};
pub use error::{CoreError, Result, StoreError};
pub use events::{CollectingSink, Event, EventSink, NullSink};
pub use model::{
    Comparison, CompletionLog, Goal, GroupQuest, Habit, HabitKind, Member, Recurrence, Streak,
    Visibility, XpAccount,
};
pub use quest::QuestProgress;
pub use store::{MemoryStore, SqliteStore, Store};
pub use streak::StreakUpdate;
pub use xp::LevelTransition;
