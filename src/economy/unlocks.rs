//! Unlock engine: level crop unlocks, achievements, and their rewards.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::achievements::{self, AchievementRules, Progress, ACHIEVEMENTS};
use super::bonuses::{Bonuses, Reward};
use crate::data::CropCatalog;
use crate::shared::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnlockEvent {
    Crop {
        crop_id: CropId,
        name: String,
        level: u32,
    },
    Achievement {
        id: String,
        name: String,
        description: String,
        reward: Option<Reward>,
        compound: bool,
    },
}

impl UnlockEvent {
    pub fn headline(&self) -> String {
        match self {
            UnlockEvent::Crop { name, .. } => format!("{name} unlocked!"),
            UnlockEvent::Achievement { name, reward, .. } => match reward {
                Some(reward) => format!("Achievement: {name}! Reward: {}", reward.label()),
                None => format!("Achievement: {name}!"),
            },
        }
    }
}

/// An unlock waiting to be shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub event: UnlockEvent,
    pub at: Timestamp,
    pub shown: bool,
}

/// Per-player unlock progress. Granted achievements are never revoked.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockState {
    pub progress: Progress,
    /// Achievement id to the time it was granted.
    pub granted: BTreeMap<String, Timestamp>,
    pub unlocked_crops: BTreeSet<CropId>,
    pub bonuses: Bonuses,
    pub notifications: Vec<Notification>,
}

impl UnlockState {
    /// Fresh state with the level-1 crops already open.
    pub fn for_catalog(catalog: &CropCatalog) -> Self {
        Self {
            unlocked_crops: catalog
                .list_for_level(1)
                .into_iter()
                .map(|def| def.id.clone())
                .collect(),
            ..Self::default()
        }
    }

    pub fn is_granted(&self, id: &str) -> bool {
        self.granted.contains_key(id)
    }

    pub fn is_crop_unlocked(&self, id: &str) -> bool {
        self.unlocked_crops.contains(id)
    }

    pub fn unread(&self) -> Vec<&Notification> {
        self.notifications.iter().filter(|n| !n.shown).collect()
    }

    pub fn mark_all_read(&mut self) {
        for n in &mut self.notifications {
            n.shown = true;
        }
    }

    pub fn clear_notifications(&mut self) {
        self.notifications.clear();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnlockEngine {
    pub rules: AchievementRules,
}

impl UnlockEngine {
    pub fn new(rules: AchievementRules) -> Self {
        Self { rules }
    }

    /// Grant every crop and achievement whose condition now holds.
    /// Already-granted entries are skipped, so calling this again with no
    /// new progress returns nothing and applies nothing.
    pub fn check_unlocks(
        &self,
        state: &mut UnlockState,
        level: u32,
        catalog: &CropCatalog,
        now: Timestamp,
    ) -> Vec<UnlockEvent> {
        let mut events = Vec::new();

        for def in catalog.list_for_level(level) {
            if state.unlocked_crops.insert(def.id.clone()) {
                info!("[Unlocks] {} unlocked at level {}", def.name, level);
                events.push(UnlockEvent::Crop {
                    crop_id: def.id.clone(),
                    name: def.name.clone(),
                    level: def.unlock_level,
                });
            }
        }

        for def in ACHIEVEMENTS {
            if state.is_granted(def.id) {
                continue;
            }
            if !achievements::evaluate(def, &state.progress, catalog.len(), now, &self.rules) {
                continue;
            }
            state.granted.insert(def.id.to_string(), now);
            if let Some(reward) = def.reward {
                state.bonuses.apply(reward);
            }
            info!("[Unlocks] Achievement: \"{}\" ({})", def.name, def.description);
            events.push(UnlockEvent::Achievement {
                id: def.id.to_string(),
                name: def.name.to_string(),
                description: def.description.to_string(),
                reward: def.reward,
                compound: def.requirement.is_compound(),
            });
        }

        state
            .notifications
            .extend(events.iter().cloned().map(|event| Notification {
                event,
                at: now,
                shown: false,
            }));
        events
    }

    pub fn track_harvest(&self, state: &mut UnlockState, crop: &str, profit: u64, now: Timestamp) {
        let progress = &mut state.progress;
        progress.harvest_count += 1;
        progress.total_profit = progress.total_profit.saturating_add(profit);
        progress.unique_crops.insert(crop.to_string());
        progress.speed.record(now, self.rules.speed_window);
        progress.play.record(now, self.rules.inactivity_gap);
    }

    /// A failed planting breaks the perfect streak.
    pub fn track_planting(&self, state: &mut UnlockState, success: bool, now: Timestamp) {
        let progress = &mut state.progress;
        if success {
            progress.perfect_streak += 1;
        } else {
            progress.perfect_streak = 0;
        }
        progress.play.record(now, self.rules.inactivity_gap);
    }
}
