//! XP ledger: one level formula for members and groups.
//!
//! `level(xp) = floor(sqrt(xp / 100)) + 1`, so level 1 starts at 0 XP,
//! level 2 at 100, level 3 at 400, level 4 at 900, and so on.

use serde::{Deserialize, Serialize};

/// Result of applying an XP delta to an account total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTransition {
    pub new_total: u64,
    pub old_level: u32,
    pub new_level: u32,
    pub leveled_up: bool,
}

/// Level for a cumulative XP total.
pub fn level_for_xp(total_xp: u64) -> u32 {
    (total_xp as f64 / 100.0).sqrt() as u32 + 1
}

/// XP still missing to reach the next level, floored at zero.
pub fn xp_for_next_level(level: u32, total_xp: u64) -> u64 {
    let threshold = (level as u64).pow(2) * 100;
    threshold.saturating_sub(total_xp)
}

/// Apply a non-negative XP delta. This is the only XP path in the
/// completion flow; totals are monotonic through it.
pub fn apply(total_xp: u64, delta: u32) -> LevelTransition {
    let old_level = level_for_xp(total_xp);
    let new_total = total_xp + delta as u64;
    let new_level = level_for_xp(new_total);
    LevelTransition {
        new_total,
        old_level,
        new_level,
        leveled_up: new_level > old_level,
    }
}

/// Administrative correction path. Accepts negative deltas and saturates
/// the total at zero. Not used by `record_completion`.
pub fn apply_correction(total_xp: u64, delta: i64) -> LevelTransition {
    let old_level = level_for_xp(total_xp);
    let new_total = if delta < 0 {
        total_xp.saturating_sub(delta.unsigned_abs())
    } else {
        total_xp + delta as u64
    };
    let new_level = level_for_xp(new_total);
    LevelTransition {
        new_total,
        old_level,
        new_level,
        leveled_up: new_level > old_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn level_thresholds() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(250), 2);
        assert_eq!(level_for_xp(400), 3);
        assert_eq!(level_for_xp(900), 4);
    }

    #[test]
    fn xp_needed_for_next_level() {
        // Level 2 starts at 100 and ends before 400.
        assert_eq!(xp_for_next_level(2, 250), 150);
        assert_eq!(xp_for_next_level(1, 0), 100);
        // Already past the threshold floors at zero.
        assert_eq!(xp_for_next_level(1, 150), 0);
    }

    #[test]
    fn apply_reports_level_up() {
        let t = apply(90, 20);
        assert_eq!(t.new_total, 110);
        assert_eq!(t.old_level, 1);
        assert_eq!(t.new_level, 2);
        assert!(t.leveled_up);

        let t = apply(110, 20);
        assert!(!t.leveled_up);
    }

    #[test]
    fn correction_saturates_at_zero() {
        let t = apply_correction(50, -200);
        assert_eq!(t.new_total, 0);
        assert_eq!(t.new_level, 1);
        assert!(!t.leveled_up);
    }

    proptest! {
        #[test]
        fn level_is_monotonic(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(level_for_xp(lo) <= level_for_xp(hi));
        }

        #[test]
        fn apply_never_decreases_total(total in 0u64..1_000_000, delta in 0u32..100_000) {
            let t = apply(total, delta);
            prop_assert!(t.new_total >= total);
            prop_assert_eq!(t.new_level, level_for_xp(t.new_total));
        }
    }
}
