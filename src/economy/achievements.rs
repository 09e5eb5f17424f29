//! Achievement definitions and the progress counters they are judged on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::bonuses::Reward;
use crate::shared::*;

// ═══════════════════════════════════════════════════════════════════════
// ACHIEVEMENT DEFINITIONS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    HarvestCount(u64),
    TotalProfit(u64),
    /// Every crop in the catalog harvested at least once.
    AllCropTypes,
    /// This many harvests inside the speed window.
    SpeedHarvest(u32),
    PerfectStreak(u32),
    /// Uninterrupted play for this long.
    ContinuousPlay(Duration),
}

impl Requirement {
    /// Time-windowed or streak requirements, as opposed to plain counters.
    pub fn is_compound(self) -> bool {
        matches!(
            self,
            Requirement::SpeedHarvest(_)
                | Requirement::PerfectStreak(_)
                | Requirement::ContinuousPlay(_)
        )
    }
}

/// Static description of a single achievement.
pub struct AchievementDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub requirement: Requirement,
    pub reward: Option<Reward>,
}

pub const ACHIEVEMENTS: &[AchievementDef] = &[
    AchievementDef {
        id: "first_harvest",
        name: "First Harvest",
        description: "Harvest your first crop",
        requirement: Requirement::HarvestCount(1),
        reward: None,
    },
    AchievementDef {
        id: "green_thumb",
        name: "Green Thumb",
        description: "Harvest 100 crops total",
        requirement: Requirement::HarvestCount(100),
        reward: Some(Reward::MasterGardener),
    },
    AchievementDef {
        id: "efficient_farmer",
        name: "Efficient Farmer",
        description: "Earn 1000 coins in profit",
        requirement: Requirement::TotalProfit(1000),
        reward: Some(Reward::SpeedSeeds),
    },
    AchievementDef {
        id: "crop_master",
        name: "Crop Master",
        description: "Grow every kind of crop",
        requirement: Requirement::AllCropTypes,
        reward: Some(Reward::RarityBonus),
    },
    AchievementDef {
        id: "speed_demon",
        name: "Speed Demon",
        description: "Harvest 10 crops in under 2 minutes",
        requirement: Requirement::SpeedHarvest(10),
        reward: Some(Reward::QuickGrowth),
    },
    AchievementDef {
        id: "golden_seeds",
        name: "Golden Seeds",
        description: "Plant 50 crops without any failing",
        requirement: Requirement::PerfectStreak(50),
        reward: Some(Reward::GoldenVariant),
    },
    AchievementDef {
        id: "night_farmer",
        name: "Night Farmer",
        description: "Farm for 30 minutes continuously",
        requirement: Requirement::ContinuousPlay(Duration::from_secs(30 * 60)),
        reward: Some(Reward::MoonlightCrops),
    },
];

pub fn achievement(id: &str) -> Option<&'static AchievementDef> {
    ACHIEVEMENTS.iter().find(|def| def.id == id)
}

// ═══════════════════════════════════════════════════════════════════════
// PROGRESS COUNTERS
// ═══════════════════════════════════════════════════════════════════════

/// Rolling window of quick harvests. Opens on the first harvest and
/// restarts when a harvest lands outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpeedWindow {
    pub started_at: Option<Timestamp>,
    pub count: u32,
}

impl SpeedWindow {
    pub fn record(&mut self, now: Timestamp, window: Duration) {
        match self.started_at {
            Some(start) if now.saturating_since(start) <= window => self.count += 1,
            _ => {
                self.started_at = Some(now);
                self.count = 1;
            }
        }
    }

    pub fn holds(&self, needed: u32, now: Timestamp, window: Duration) -> bool {
        match self.started_at {
            Some(start) => self.count >= needed && now.saturating_since(start) <= window,
            None => false,
        }
    }
}

/// Stretch of play with no gap longer than the inactivity limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaySession {
    pub started_at: Option<Timestamp>,
    pub last_action: Option<Timestamp>,
}

impl PlaySession {
    pub fn record(&mut self, now: Timestamp, inactivity_gap: Duration) {
        let fresh = match (self.started_at, self.last_action) {
            (Some(_), Some(last)) => now.saturating_since(last) > inactivity_gap,
            _ => true,
        };
        if fresh {
            self.started_at = Some(now);
        }
        self.last_action = Some(now);
    }

    pub fn length(&self) -> Duration {
        match (self.started_at, self.last_action) {
            (Some(start), Some(last)) => last.saturating_since(start),
            _ => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub harvest_count: u64,
    pub total_profit: u64,
    pub unique_crops: BTreeSet<CropId>,
    pub speed: SpeedWindow,
    pub perfect_streak: u32,
    pub play: PlaySession,
}

/// Windows the compound achievements are judged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementRules {
    pub speed_window: Duration,
    pub inactivity_gap: Duration,
}

impl Default for AchievementRules {
    fn default() -> Self {
        Self {
            speed_window: Duration::from_secs(120),
            inactivity_gap: Duration::from_secs(300),
        }
    }
}

/// Whether `def` is earned by `progress` right now.
pub fn evaluate(
    def: &AchievementDef,
    progress: &Progress,
    catalog_size: usize,
    now: Timestamp,
    rules: &AchievementRules,
) -> bool {
    match def.requirement {
        Requirement::HarvestCount(n) => progress.harvest_count >= n,
        Requirement::TotalProfit(n) => progress.total_profit >= n,
        Requirement::AllCropTypes => {
            catalog_size > 0 && progress.unique_crops.len() >= catalog_size
        }
        Requirement::SpeedHarvest(n) => progress.speed.holds(n, now, rules.speed_window),
        Requirement::PerfectStreak(n) => progress.perfect_streak >= n,
        Requirement::ContinuousPlay(length) => progress.play.length() >= length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_speed_window_restarts_when_expired() {
        let mut speed = SpeedWindow::default();
        let start = Timestamp::from_secs(1_000);
        for i in 0..9 {
            speed.record(start.plus(Duration::from_secs(i)), MINUTE * 2);
        }
        assert_eq!(speed.count, 9);
        speed.record(start.plus(MINUTE * 3), MINUTE * 2);
        assert_eq!(speed.count, 1, "late harvest opens a new window");
        assert_eq!(speed.started_at, Some(start.plus(MINUTE * 3)));
    }

    #[test]
    fn test_speed_demon_needs_count_inside_window() {
        let rules = AchievementRules::default();
        let def = achievement("speed_demon").unwrap();
        let mut progress = Progress::default();
        let start = Timestamp::from_secs(10);
        for i in 0..10 {
            progress.speed.record(start.plus(Duration::from_secs(i * 5)), rules.speed_window);
        }
        assert!(evaluate(def, &progress, 8, start.plus(MINUTE), &rules));
        assert!(!evaluate(def, &progress, 8, start.plus(MINUTE * 5), &rules));
    }

    #[test]
    fn test_play_session_resets_after_gap() {
        let gap = MINUTE * 5;
        let mut play = PlaySession::default();
        let t0 = Timestamp::ZERO;
        play.record(t0, gap);
        play.record(t0.plus(MINUTE * 4), gap);
        play.record(t0.plus(MINUTE * 8), gap);
        assert_eq!(play.length(), MINUTE * 8);
        play.record(t0.plus(MINUTE * 20), gap);
        assert_eq!(play.length(), Duration::ZERO);
    }

    #[test]
    fn test_crop_master_uses_catalog_size() {
        let rules = AchievementRules::default();
        let def = achievement("crop_master").unwrap();
        let mut progress = Progress::default();
        progress.unique_crops.insert("wheat".into());
        progress.unique_crops.insert("corn".into());
        assert!(evaluate(def, &progress, 2, Timestamp::ZERO, &rules));
        assert!(!evaluate(def, &progress, 8, Timestamp::ZERO, &rules));
        assert!(!evaluate(def, &Progress::default(), 0, Timestamp::ZERO, &rules));
    }

    #[test]
    fn test_compound_kinds() {
        assert!(!achievement("green_thumb").unwrap().requirement.is_compound());
        assert!(achievement("golden_seeds").unwrap().requirement.is_compound());
    }
}
