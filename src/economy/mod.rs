//! Economy domain: resource ledger, levels, achievements, unlocks, and
//! crop balance analysis.
//!
//! The ledger and unlock engine are plain data owned by each Homestead.
//! The plugin only registers the progress events and the systems that
//! tally and log them.

use bevy::prelude::*;
use crate::shared::*;

pub mod achievements;
pub mod balance;
pub mod bonuses;
pub mod gold;
pub mod ledger;
pub mod levels;
pub mod unlocks;

pub use achievements::{AchievementRules, Progress, ACHIEVEMENTS};
pub use balance::{
    analyze_all, analyze_crop, balance_report, find_optimal_crop, find_progression_gaps,
    simulate_progression, BalanceHealth, BalanceReport, CropAnalysis,
};
pub use bonuses::{ActiveBonus, Bonuses, Reward};
pub use gold::{format_coins, EconomyStats};
pub use ledger::{LedgerChange, LevelUp, ResourceLedger, Transaction};
pub use levels::{LevelBenefit, LevelTable, XpProgress};
pub use unlocks::{UnlockEngine, UnlockEvent, UnlockState};

// ─────────────────────────────────────────────────────────────────────────────
// Plugin
// ─────────────────────────────────────────────────────────────────────────────

pub struct EconomyPlugin;

impl Plugin for EconomyPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EconomyStats>()
            .add_event::<CropHarvestedEvent>()
            .add_event::<LevelUpEvent>()
            .add_event::<CropUnlockedEvent>()
            .add_event::<AchievementUnlockedEvent>()
            .add_systems(OnEnter(HostState::Running), balance::log_balance_report)
            .add_systems(
                Update,
                (gold::track_harvest_payouts, gold::announce_progress)
                    .run_if(in_state(HostState::Running)),
            );
    }
}
