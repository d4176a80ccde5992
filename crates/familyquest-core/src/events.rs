//! Progress events and the fire-and-forget sink seam for notification
//! channels.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::model::{GroupId, HabitId, MemberId, QuestId};

/// Progress milestones raised by the engine. Delivery is fire-and-forget:
/// a sink that drops or fails must never fail the engine call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    LevelUp {
        member_id: MemberId,
        old_level: u32,
        new_level: u32,
        at: DateTime<Utc>,
    },
    GroupLevelUp {
        group_id: GroupId,
        old_level: u32,
        new_level: u32,
        at: DateTime<Utc>,
    },
    StreakMilestone {
        habit_id: HabitId,
        member_id: MemberId,
        length: u32,
        bonus_xp: u32,
        at: DateTime<Utc>,
    },
    GroupBonusAwarded {
        habit_id: HabitId,
        group_id: GroupId,
        date: NaiveDate,
        xp: u32,
        at: DateTime<Utc>,
    },
    QuestCompleted {
        quest_id: QuestId,
        group_id: GroupId,
        at: DateTime<Utc>,
    },
}

/// Consumer seam for notification channels (chat bots, exporters).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Sink that discards everything. Default for engines without a channel.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

/// Sink that buffers events in memory, for tests and polling consumers.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all buffered events.
    pub fn take(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
