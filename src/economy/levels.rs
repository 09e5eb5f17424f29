//! Level thresholds and per-level benefits.

use serde::Serialize;

use crate::shared::*;

/// Cumulative XP needed for each level, index 0 = level 1.
///
/// The first step costs 50 XP and each later step costs 20% more
/// (rounded down), up to level 50.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelTable {
    thresholds: Vec<u64>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::geometric(FIRST_LEVEL_XP, MAX_LEVEL)
    }
}

impl LevelTable {
    /// `first_step * 1.2^n` for each step n, rounded down. Worked in
    /// integer ratios (6/5) so rounding never drifts.
    pub fn geometric(first_step: u64, max_level: u32) -> Self {
        let mut thresholds = vec![0u64];
        let mut total = 0u64;
        for n in 0..max_level.saturating_sub(1) {
            let den = 5u128.saturating_pow(n);
            let g = gcd(u128::from(first_step), den).max(1);
            let step = (u128::from(first_step) / g).saturating_mul(6u128.saturating_pow(n))
                / (den / g);
            total = total.saturating_add(u64::try_from(step).unwrap_or(u64::MAX));
            thresholds.push(total);
        }
        Self { thresholds }
    }

    pub fn max_level(&self) -> u32 {
        self.thresholds.len() as u32
    }

    pub fn thresholds(&self) -> &[u64] {
        &self.thresholds
    }

    /// Cumulative XP required to reach `level`.
    pub fn threshold(&self, level: u32) -> Option<u64> {
        let index = usize::try_from(level.checked_sub(1)?).ok()?;
        self.thresholds.get(index).copied()
    }

    pub fn level_for(&self, xp: u64) -> u32 {
        self.thresholds.iter().take_while(|&&t| xp >= t).count().max(1) as u32
    }

    /// XP still needed to reach the next level, `None` at max level.
    pub fn xp_to_next(&self, xp: u64) -> Option<u64> {
        let level = self.level_for(xp);
        self.threshold(level + 1).map(|next| next.saturating_sub(xp))
    }

    pub fn progress(&self, xp: u64) -> XpProgress {
        let level = self.level_for(xp);
        let start = self.threshold(level).unwrap_or(0);
        match self.threshold(level + 1) {
            Some(end) => {
                let current = xp.saturating_sub(start);
                let needed = end.saturating_sub(start).max(1);
                XpProgress {
                    current,
                    needed,
                    percent: (current.saturating_mul(100) / needed).min(100) as u8,
                }
            }
            None => XpProgress {
                current: xp,
                needed: xp,
                percent: 100,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XpProgress {
    pub current: u64,
    pub needed: u64,
    pub percent: u8,
}

/// What reaching a level grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LevelBenefit {
    /// Informational; the crop itself unlocks through the catalog.
    CropUnlock { crop: &'static str },
    BonusCoins { amount: u64 },
    /// Crops planted from now on take this percentage of their growth time.
    GrowthBoost { percent: u32 },
    /// Recorded perk; harvest payouts stay at catalog value.
    HarvestBonus { percent: u32 },
}

impl LevelBenefit {
    pub fn for_level(level: u32) -> Option<Self> {
        let benefit = match level {
            2 => LevelBenefit::CropUnlock {
                crop: "strawberries",
            },
            3 => LevelBenefit::CropUnlock { crop: "corn" },
            4 => LevelBenefit::CropUnlock { crop: "sunflowers" },
            5 => LevelBenefit::CropUnlock { crop: "pumpkins" },
            6 => LevelBenefit::BonusCoins { amount: 100 },
            8 => LevelBenefit::GrowthBoost { percent: 90 },
            10 => LevelBenefit::BonusCoins { amount: 200 },
            12 => LevelBenefit::HarvestBonus { percent: 110 },
            15 => LevelBenefit::BonusCoins { amount: 500 },
            20 => LevelBenefit::GrowthBoost { percent: 80 },
            _ => return None,
        };
        Some(benefit)
    }

    /// Next level above `level` with a benefit.
    pub fn next_after(level: u32) -> Option<(u32, Self)> {
        (level + 1..=MAX_LEVEL).find_map(|l| Self::for_level(l).map(|b| (l, b)))
    }

    pub fn message(&self) -> String {
        match self {
            LevelBenefit::CropUnlock { crop } => format!("{} unlocked!", capitalize(crop)),
            LevelBenefit::BonusCoins { amount } => format!("Bonus: +{amount} coins!"),
            LevelBenefit::GrowthBoost { percent } => {
                format!("Crops grow {}% faster!", 100u32.saturating_sub(*percent))
            }
            LevelBenefit::HarvestBonus { percent } => format!(
                "Harvest value increased by {}%!",
                percent.saturating_sub(100)
            ),
        }
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
