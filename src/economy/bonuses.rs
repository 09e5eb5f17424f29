//! Achievement rewards and the bonuses they leave behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Reward {
    /// +10% XP perk.
    MasterGardener,
    /// Every crop grows in 80% of its time.
    SpeedSeeds,
    /// +15% bonus reward chance perk.
    RarityBonus,
    /// The next 10 plantings grow in half the time.
    QuickGrowth,
    GoldenVariant,
    MoonlightCrops,
}

impl Reward {
    pub fn label(self) -> &'static str {
        match self {
            Reward::MasterGardener => "Master Gardener",
            Reward::SpeedSeeds => "Speed Seeds",
            Reward::RarityBonus => "Rarity Bonus",
            Reward::QuickGrowth => "Quick Growth",
            Reward::GoldenVariant => "Golden Variant",
            Reward::MoonlightCrops => "Moonlight Crops",
        }
    }
}

pub const SPEED_SEEDS_PERCENT: u32 = 80;
pub const QUICK_GROWTH_PERCENT: u32 = 50;
pub const QUICK_GROWTH_PLANTINGS: u32 = 10;

/// A bonus that runs out after a number of uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumableBonus {
    pub remaining: u32,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ActiveBonus {
    Permanent { name: &'static str, percent: u32 },
    Consumable { name: &'static str, percent: u32, remaining: u32 },
    Cosmetic { name: &'static str },
}

/// Bonuses earned from achievements.
///
/// Only growth bonuses change play: they shorten the growth time of crops
/// planted afterwards. XP and rarity perks are recorded for display and
/// leave harvest payouts at catalog value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Bonuses {
    pub xp_percent: Option<u32>,
    pub growth_percent: Option<u32>,
    pub bonus_chance_percent: Option<u32>,
    pub quick_growth: Option<ConsumableBonus>,
    pub cosmetics: BTreeSet<Reward>,
}

impl Bonuses {
    pub fn apply(&mut self, reward: Reward) {
        match reward {
            Reward::MasterGardener => self.xp_percent = Some(110),
            Reward::SpeedSeeds => self.growth_percent = Some(SPEED_SEEDS_PERCENT),
            Reward::RarityBonus => self.bonus_chance_percent = Some(15),
            Reward::QuickGrowth => {
                self.quick_growth = Some(ConsumableBonus {
                    remaining: QUICK_GROWTH_PLANTINGS,
                    percent: QUICK_GROWTH_PERCENT,
                })
            }
            Reward::GoldenVariant | Reward::MoonlightCrops => {
                self.cosmetics.insert(reward);
            }
        }
    }

    /// Growth time percentage for the next planting. Permanent boosts
    /// (level or Speed Seeds) take the best one; Quick Growth stacks on top.
    pub fn planting_percent(&self, level_percent: u32) -> u32 {
        let permanent = self
            .growth_percent
            .map_or(level_percent, |p| p.min(level_percent));
        match self.quick_growth {
            Some(quick) if quick.remaining > 0 => permanent * quick.percent / 100,
            _ => permanent,
        }
    }

    /// Use up one charge of Quick Growth, if any.
    pub fn consume_planting(&mut self) {
        if let Some(quick) = self.quick_growth.as_mut() {
            quick.remaining = quick.remaining.saturating_sub(1);
            if quick.remaining == 0 {
                self.quick_growth = None;
            }
        }
    }

    pub fn active(&self) -> Vec<ActiveBonus> {
        let mut active = Vec::new();
        if let Some(percent) = self.xp_percent {
            active.push(ActiveBonus::Permanent {
                name: Reward::MasterGardener.label(),
                percent,
            });
        }
        if let Some(percent) = self.growth_percent {
            active.push(ActiveBonus::Permanent {
                name: Reward::SpeedSeeds.label(),
                percent,
            });
        }
        if let Some(percent) = self.bonus_chance_percent {
            active.push(ActiveBonus::Permanent {
                name: Reward::RarityBonus.label(),
                percent,
            });
        }
        if let Some(quick) = self.quick_growth {
            active.push(ActiveBonus::Consumable {
                name: Reward::QuickGrowth.label(),
                percent: quick.percent,
                remaining: quick.remaining,
            });
        }
        active.extend(
            self.cosmetics
                .iter()
                .map(|r| ActiveBonus::Cosmetic { name: r.label() }),
        );
        active
    }
}

/// Scale a growth duration by a percentage, never below one millisecond.
pub fn scaled_growth(growth: Duration, percent: u32) -> Duration {
    let scaled = growth.saturating_mul(percent) / 100;
    scaled.max(Duration::from_millis(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_growth_runs_out() {
        let mut bonuses = Bonuses::default();
        bonuses.apply(Reward::QuickGrowth);
        for _ in 0..QUICK_GROWTH_PLANTINGS {
            assert_eq!(bonuses.planting_percent(100), 50);
            bonuses.consume_planting();
        }
        assert_eq!(bonuses.planting_percent(100), 100);
        assert!(bonuses.quick_growth.is_none());
    }

    #[test]
    fn test_permanent_boosts_take_best() {
        let mut bonuses = Bonuses::default();
        assert_eq!(bonuses.planting_percent(90), 90);
        bonuses.apply(Reward::SpeedSeeds);
        assert_eq!(bonuses.planting_percent(90), 80);
        bonuses.apply(Reward::QuickGrowth);
        assert_eq!(bonuses.planting_percent(90), 40);
    }

    #[test]
    fn test_scaled_growth() {
        let hour = Duration::from_secs(3600);
        assert_eq!(scaled_growth(hour, 50), Duration::from_secs(1800));
        assert_eq!(scaled_growth(Duration::ZERO, 50), Duration::from_millis(1));
    }

    #[test]
    fn test_active_lists_cosmetics() {
        let mut bonuses = Bonuses::default();
        bonuses.apply(Reward::GoldenVariant);
        bonuses.apply(Reward::MasterGardener);
        assert_eq!(bonuses.active().len(), 2);
    }
}
