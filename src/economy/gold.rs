use bevy::prelude::*;
use crate::shared::*;

/// Host-wide payout totals across every farm, for diagnostics.
#[derive(Resource, Debug, Clone, Default)]
pub struct EconomyStats {
    pub total_coins_paid: u64,
    pub total_xp_paid: u64,
    pub total_harvests: u64,
    pub level_ups: u64,
    pub achievements_granted: u64,
}

/// Folds harvest payouts into EconomyStats.
pub fn track_harvest_payouts(
    mut harvests: EventReader<CropHarvestedEvent>,
    mut stats: ResMut<EconomyStats>,
) {
    for ev in harvests.read() {
        stats.total_coins_paid = stats.total_coins_paid.saturating_add(ev.yield_.coins);
        stats.total_xp_paid = stats.total_xp_paid.saturating_add(ev.yield_.xp);
        stats.total_harvests += 1;
        debug!(
            "[Economy] {} harvested {} from plot {}: {}, {} XP",
            ev.owner,
            ev.crop_id,
            ev.slot + 1,
            format_coins(ev.yield_.coins),
            ev.yield_.xp
        );
    }
}

/// Logs level-ups and achievement grants as they happen.
pub fn announce_progress(
    mut level_ups: EventReader<LevelUpEvent>,
    mut crop_unlocks: EventReader<CropUnlockedEvent>,
    mut achievements: EventReader<AchievementUnlockedEvent>,
    mut stats: ResMut<EconomyStats>,
) {
    for ev in level_ups.read() {
        stats.level_ups += 1;
        match &ev.benefit {
            Some(benefit) => info!("[Economy] {} reached level {}: {}", ev.owner, ev.level, benefit),
            None => info!("[Economy] {} reached level {}", ev.owner, ev.level),
        }
    }
    for ev in crop_unlocks.read() {
        info!("[Economy] {} can now plant {} (level {})", ev.owner, ev.crop_id, ev.level);
    }
    for ev in achievements.read() {
        stats.achievements_granted += 1;
        info!(
            "[Achievements] {} unlocked \"{}\": {}",
            ev.owner, ev.name, ev.description
        );
    }
}

/// Format a coin amount for display (e.g. "1,234 coins").
pub fn format_coins(amount: u64) -> String {
    let unit = if amount == 1 { "coin" } else { "coins" };
    format!("{} {unit}", group_digits(amount))
}

/// Insert thousands separators: 25000 -> "25,000".
pub fn group_digits(amount: u64) -> String {
    let s = amount.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let digits: Vec<char> = s.chars().collect();
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*ch);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_coins() {
        assert_eq!(format_coins(0), "0 coins");
        assert_eq!(format_coins(1), "1 coin");
        assert_eq!(format_coins(500), "500 coins");
        assert_eq!(format_coins(1234), "1,234 coins");
        assert_eq!(format_coins(25000), "25,000 coins");
        assert_eq!(format_coins(1_000_000), "1,000,000 coins");
    }
}
