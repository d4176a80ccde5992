//! Group quest progress: pure recomputation from completion history.

use serde::{Deserialize, Serialize};

use crate::model::{CompletionLog, GroupQuest};

/// Result of a quest refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub current_xp: u32,
    /// True only on the call that flipped `completed`.
    pub just_completed: bool,
}

/// Recompute `current_xp` from the group's logs inside the quest window,
/// capped at `target_xp`. The completion flag is one-way: once set it is
/// never cleared, even if retroactive deletions shrink the raw sum.
/// Safe to call repeatedly.
pub fn refresh(quest: &mut GroupQuest, logs: &[CompletionLog]) -> QuestProgress {
    let sum: u64 = logs
        .iter()
        .filter(|log| log.date >= quest.start_date && log.date <= quest.end_date)
        .map(|log| log.xp_earned as u64)
        .sum();
    let capped = sum.min(quest.target_xp as u64) as u32;

    if quest.completed {
        // Terminal state; progress never moves backward.
        quest.current_xp = quest.current_xp.max(capped);
        return QuestProgress {
            current_xp: quest.current_xp,
            just_completed: false,
        };
    }

    quest.current_xp = capped;
    let just_completed = capped >= quest.target_xp;
    if just_completed {
        quest.completed = true;
    }
    QuestProgress {
        current_xp: quest.current_xp,
        just_completed,
    }
}
