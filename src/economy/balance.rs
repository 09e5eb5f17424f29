//! Crop economics: per-crop profitability, the best crop to plant with a
//! given purse, a greedy progression simulation, and a catalog health
//! report.
//!
//! Rates are expressed per growth unit so the analysis reads the same for
//! the hour-long voice farm and the three-second browser farm. Wall-clock
//! figures (profit per minute, simulated time) use the configured unit.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::FarmConfig;
use crate::data::{CropCatalog, CropDefinition};
use crate::shared::*;

pub const MIN_PROFIT_MARGIN: f64 = 0.2;
pub const MAX_PROFIT_MARGIN: f64 = 2.0;

/// Profit per growth unit above which a crop counts as fast money.
const AGGRESSIVE_PROFIT_PER_UNIT: f64 = 3.0;
const QUICK_PROFIT_PER_UNIT: f64 = 2.5;
/// Below this share of the catalog's best rate a crop is "slow".
const EFFICIENCY_FLOOR: f64 = 0.3;
/// Below this share of its level's average rate a crop is uncompetitive.
const COMPETITIVE_FLOOR: f64 = 0.7;
const LOW_RISK_SEED_COST: u64 = 5;
const BALANCED_SCORE: f64 = 7.0;

pub fn rarity_multiplier(rarity: Rarity) -> f64 {
    match rarity {
        Rarity::Common => 1.0,
        Rarity::Uncommon => 1.2,
        Rarity::Rare => 1.5,
        Rarity::Epic => 2.0,
        Rarity::Legendary => 3.0,
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PER-CROP ANALYSIS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    AggressiveGrowth,
    QuickTurnover,
    HighMargin,
    LowRisk,
    Specialty,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    IncreaseProfit,
    ReduceProfit,
    ImproveEfficiency,
    MinorTuning,
}

impl Adjustment {
    pub fn suggestion(self) -> &'static str {
        match self {
            Adjustment::IncreaseProfit => "Raise the harvest value or lower the seed cost",
            Adjustment::ReduceProfit => "Lower the harvest value or raise the seed cost",
            Adjustment::ImproveEfficiency => "Shorten the growth time or raise the profit",
            Adjustment::MinorTuning => "Fine-tune from player feedback",
        }
    }

    pub fn priority(self) -> Priority {
        match self {
            Adjustment::IncreaseProfit => Priority::High,
            Adjustment::ReduceProfit | Adjustment::ImproveEfficiency => Priority::Medium,
            Adjustment::MinorTuning => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Profitability of one crop, judged against the rest of its catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropAnalysis {
    pub id: CropId,
    pub name: String,
    pub rarity: Rarity,
    pub unlock_level: u32,
    pub plant_cost: u64,
    pub harvest_coins: u64,
    /// Harvest coins minus seed cost. Negative for a losing crop.
    pub base_profit: i64,
    pub profit_margin: f64,
    pub growth: Duration,
    pub profit_per_unit: f64,
    pub profit_per_minute: f64,
    /// 0.0 (safe) to 1.0 (long, expensive, rare).
    pub risk: f64,
    /// 0.0 to 10.0.
    pub balance_score: f64,
    pub strategy: Strategy,
    /// Rate relative to the average of crops unlocking at the same level.
    pub competitiveness: f64,
    pub balanced: bool,
    pub adjustment: Option<Adjustment>,
}

fn base_profit(def: &CropDefinition) -> i64 {
    let coins = i64::try_from(def.harvest_yield.coins).unwrap_or(i64::MAX);
    let cost = i64::try_from(def.plant_cost).unwrap_or(i64::MAX);
    coins.saturating_sub(cost)
}

fn profit_margin(def: &CropDefinition) -> f64 {
    base_profit(def) as f64 / def.plant_cost.max(1) as f64
}

/// Coins of profit per growth unit.
pub fn profit_per_unit(def: &CropDefinition) -> f64 {
    base_profit(def) as f64 / f64::from(def.growth_units.max(1))
}

/// Catalog-wide reference points the per-crop figures are normalized by.
struct Baseline {
    longest_growth: u32,
    highest_cost: u64,
    best_rate: f64,
    level_rates: BTreeMap<u32, (f64, usize)>,
}

impl Baseline {
    fn of(crops: &[&CropDefinition]) -> Self {
        let mut level_rates: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for def in crops {
            let entry = level_rates.entry(def.unlock_level).or_default();
            entry.0 += profit_per_unit(def);
            entry.1 += 1;
        }
        Self {
            longest_growth: crops.iter().map(|d| d.growth_units).max().unwrap_or(1).max(1),
            highest_cost: crops.iter().map(|d| d.plant_cost).max().unwrap_or(1).max(1),
            best_rate: crops
                .iter()
                .map(|d| profit_per_unit(d))
                .fold(0.0, f64::max),
            level_rates,
        }
    }

    fn risk(&self, def: &CropDefinition) -> f64 {
        let time_risk = f64::from(def.growth_units) / f64::from(self.longest_growth);
        let cost_risk = def.plant_cost as f64 / self.highest_cost as f64;
        let rarity_risk = rarity_multiplier(def.rarity) - 1.0;
        ((time_risk + cost_risk + rarity_risk) / 3.0).min(1.0)
    }

    fn efficiency(&self, def: &CropDefinition) -> f64 {
        if self.best_rate <= 0.0 {
            return 0.0;
        }
        (profit_per_unit(def) / self.best_rate).max(0.0)
    }

    fn competitiveness(&self, def: &CropDefinition) -> f64 {
        let Some(&(sum, count)) = self.level_rates.get(&def.unlock_level) else {
            return 1.0;
        };
        let average = sum / count as f64;
        if count <= 1 || average <= 0.0 {
            return 1.0;
        }
        (profit_per_unit(def) / average).clamp(0.0, 2.0)
    }

    fn balance_score(&self, def: &CropDefinition) -> f64 {
        let margin = profit_margin(def);
        let risk_adjusted = margin / (1.0 + self.risk(def));
        let base = margin * 0.4 + self.efficiency(def) * 0.4 + risk_adjusted * 0.2;
        (base / rarity_multiplier(def.rarity) * 10.0).clamp(0.0, 10.0)
    }

    fn strategy(&self, def: &CropDefinition) -> Strategy {
        let margin = profit_margin(def);
        let rate = profit_per_unit(def);
        if rate > AGGRESSIVE_PROFIT_PER_UNIT && margin > 0.5 {
            Strategy::AggressiveGrowth
        } else if rate > QUICK_PROFIT_PER_UNIT {
            Strategy::QuickTurnover
        } else if margin > 1.0 {
            Strategy::HighMargin
        } else if def.plant_cost <= LOW_RISK_SEED_COST {
            Strategy::LowRisk
        } else if def.rarity != Rarity::Common {
            Strategy::Specialty
        } else {
            Strategy::Balanced
        }
    }

    fn adjustment(&self, def: &CropDefinition) -> Option<Adjustment> {
        if self.balance_score(def) >= BALANCED_SCORE {
            return None;
        }
        let margin = profit_margin(def);
        Some(if margin < MIN_PROFIT_MARGIN {
            Adjustment::IncreaseProfit
        } else if margin > MAX_PROFIT_MARGIN {
            Adjustment::ReduceProfit
        } else if self.efficiency(def) < EFFICIENCY_FLOOR {
            Adjustment::ImproveEfficiency
        } else {
            Adjustment::MinorTuning
        })
    }

    fn analyze(&self, def: &CropDefinition, time_unit: Duration) -> CropAnalysis {
        let margin = profit_margin(def);
        let growth = time_unit.saturating_mul(def.growth_units);
        let minutes = growth.as_secs_f64() / 60.0;
        let profit_per_minute = if minutes > 0.0 {
            base_profit(def) as f64 / minutes
        } else {
            0.0
        };
        CropAnalysis {
            id: def.id.clone(),
            name: def.name.clone(),
            rarity: def.rarity,
            unlock_level: def.unlock_level,
            plant_cost: def.plant_cost,
            harvest_coins: def.harvest_yield.coins,
            base_profit: base_profit(def),
            profit_margin: margin,
            growth,
            profit_per_unit: profit_per_unit(def),
            profit_per_minute,
            risk: self.risk(def),
            balance_score: self.balance_score(def),
            strategy: self.strategy(def),
            competitiveness: self.competitiveness(def),
            balanced: (MIN_PROFIT_MARGIN..=MAX_PROFIT_MARGIN).contains(&margin),
            adjustment: self.adjustment(def),
        }
    }
}

/// Analyze one catalog crop.
pub fn analyze_crop(
    catalog: &CropCatalog,
    id: &str,
    time_unit: Duration,
) -> Result<CropAnalysis, FarmError> {
    let def = catalog.get(id)?;
    Ok(Baseline::of(&catalog.list_all()).analyze(def, time_unit))
}

/// Analyze every crop, in catalog order.
pub fn analyze_all(catalog: &CropCatalog, time_unit: Duration) -> Vec<CropAnalysis> {
    let crops = catalog.list_all();
    let baseline = Baseline::of(&crops);
    crops
        .into_iter()
        .map(|def| baseline.analyze(def, time_unit))
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// PLANNING
// ═══════════════════════════════════════════════════════════════════════

/// The affordable crop with the best profit per growth unit. Ties keep the
/// earlier crop.
pub fn find_optimal_crop<'a>(
    crops: &[&'a CropDefinition],
    coins: u64,
) -> Option<&'a CropDefinition> {
    crops
        .iter()
        .copied()
        .filter(|def| def.plant_cost <= coins)
        .fold(None::<&'a CropDefinition>, |best, def| match best {
            Some(b) if profit_per_unit(def) <= profit_per_unit(b) => Some(b),
            _ => Some(def),
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionStep {
    pub level: u32,
    pub crop_id: CropId,
    pub cycles: u64,
    /// Net coins from every cycle of this step.
    pub profit: i64,
    pub time: Duration,
    pub coins_after: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionSimulation {
    pub starting_coins: u64,
    pub steps: Vec<ProgressionStep>,
    pub total_time: Duration,
    pub final_coins: u64,
}

/// Greedy play-through: at each level, spend the whole purse on the best
/// affordable crop for one growth cycle. A level with nothing affordable
/// is skipped.
pub fn simulate_progression(
    catalog: &CropCatalog,
    time_unit: Duration,
    starting_coins: u64,
    levels: u32,
) -> ProgressionSimulation {
    let mut coins = starting_coins;
    let mut steps = Vec::new();
    let mut total_time = Duration::ZERO;

    for level in 1..=levels {
        let available = catalog.list_for_level(level);
        let Some(best) = find_optimal_crop(&available, coins) else {
            continue;
        };
        let cycles = match best.plant_cost {
            0 => 1,
            cost => coins / cost,
        };
        let profit = base_profit(best).saturating_mul(i64::try_from(cycles).unwrap_or(i64::MAX));
        let time = time_unit.saturating_mul(best.growth_units);
        coins = coins.saturating_add_signed(profit);
        total_time = total_time.saturating_add(time);
        steps.push(ProgressionStep {
            level,
            crop_id: best.id.clone(),
            cycles,
            profit,
            time,
            coins_after: coins,
        });
    }

    ProgressionSimulation {
        starting_coins,
        steps,
        total_time,
        final_coins: coins,
    }
}

/// Levels between the lowest and highest unlock level that unlock nothing.
pub fn find_progression_gaps(catalog: &CropCatalog) -> Vec<u32> {
    let levels: std::collections::BTreeSet<u32> =
        catalog.list_all().iter().map(|def| def.unlock_level).collect();
    let (Some(&first), Some(&last)) = (levels.first(), levels.last()) else {
        return Vec::new();
    };
    (first..=last).filter(|level| !levels.contains(level)).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Recommendation {
    Unbalanced(Vec<CropId>),
    LimitedDiversity { strategies: usize },
    Uncompetitive(Vec<CropId>),
    ProgressionGaps(Vec<u32>),
}

impl Recommendation {
    pub fn priority(&self) -> Priority {
        match self {
            Recommendation::Unbalanced(_) => Priority::High,
            Recommendation::LimitedDiversity { .. } | Recommendation::Uncompetitive(_) => {
                Priority::Medium
            }
            Recommendation::ProgressionGaps(_) => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalanceHealth {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub total_crops: usize,
    pub average_score: f64,
    pub balanced_crops: usize,
    pub needs_adjustment: usize,
    pub average_margin: f64,
    pub average_profit_per_unit: f64,
    pub strategies: BTreeMap<Strategy, usize>,
    pub most_competitive: Option<CropId>,
    pub least_competitive: Option<CropId>,
}

impl BalanceSummary {
    fn of(crops: &[CropAnalysis]) -> Self {
        if crops.is_empty() {
            return Self::default();
        }
        let n = crops.len() as f64;
        let mut strategies = BTreeMap::new();
        for crop in crops {
            *strategies.entry(crop.strategy).or_insert(0) += 1;
        }
        let by_competitiveness = |a: &&CropAnalysis, b: &&CropAnalysis| {
            a.competitiveness.total_cmp(&b.competitiveness)
        };
        Self {
            total_crops: crops.len(),
            average_score: crops.iter().map(|c| c.balance_score).sum::<f64>() / n,
            balanced_crops: crops.iter().filter(|c| c.balanced).count(),
            needs_adjustment: crops.iter().filter(|c| c.adjustment.is_some()).count(),
            average_margin: crops.iter().map(|c| c.profit_margin).sum::<f64>() / n,
            average_profit_per_unit: crops.iter().map(|c| c.profit_per_unit).sum::<f64>() / n,
            strategies,
            most_competitive: crops.iter().max_by(by_competitiveness).map(|c| c.id.clone()),
            least_competitive: crops.iter().min_by(by_competitiveness).map(|c| c.id.clone()),
        }
    }

    pub fn health(&self) -> BalanceHealth {
        if self.total_crops == 0 {
            return BalanceHealth::NeedsImprovement;
        }
        let n = self.total_crops as f64;
        let balanced_ratio = self.balanced_crops as f64 / n;
        let settled_ratio = 1.0 - self.needs_adjustment as f64 / n;
        let health = self.average_score * 0.4 + balanced_ratio * 4.0 + settled_ratio * 2.0;
        match health {
            h if h >= 8.0 => BalanceHealth::Excellent,
            h if h >= 6.0 => BalanceHealth::Good,
            h if h >= 4.0 => BalanceHealth::Fair,
            _ => BalanceHealth::NeedsImprovement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub crops: Vec<CropAnalysis>,
    pub summary: BalanceSummary,
    pub health: BalanceHealth,
    pub recommendations: Vec<Recommendation>,
}

impl BalanceReport {
    pub fn priority_actions(&self) -> impl Iterator<Item = &Recommendation> {
        self.recommendations
            .iter()
            .filter(|r| r.priority() == Priority::High)
    }
}

pub fn balance_report(catalog: &CropCatalog, time_unit: Duration) -> BalanceReport {
    let crops = analyze_all(catalog, time_unit);
    let summary = BalanceSummary::of(&crops);
    let ids = |keep: &dyn Fn(&CropAnalysis) -> bool| -> Vec<CropId> {
        crops.iter().filter(|c| keep(c)).map(|c| c.id.clone()).collect()
    };

    let mut recommendations = Vec::new();
    let unbalanced = ids(&|c| !c.balanced);
    if !unbalanced.is_empty() {
        recommendations.push(Recommendation::Unbalanced(unbalanced));
    }
    if !crops.is_empty() && summary.strategies.len() < 3 {
        recommendations.push(Recommendation::LimitedDiversity {
            strategies: summary.strategies.len(),
        });
    }
    let uncompetitive = ids(&|c| c.competitiveness < COMPETITIVE_FLOOR);
    if !uncompetitive.is_empty() {
        recommendations.push(Recommendation::Uncompetitive(uncompetitive));
    }
    let gaps = find_progression_gaps(catalog);
    if !gaps.is_empty() {
        recommendations.push(Recommendation::ProgressionGaps(gaps));
    }

    BalanceReport {
        health: summary.health(),
        crops,
        summary,
        recommendations,
    }
}

/// Logs the catalog's balance once the host is running.
pub fn log_balance_report(catalog: Res<CropCatalog>, config: Res<FarmConfig>) {
    let report = balance_report(&catalog, config.time_unit());
    info!(
        "[Economy] Crop balance {:?}: {}/{} balanced, average score {:.1}",
        report.health,
        report.summary.balanced_crops,
        report.summary.total_crops,
        report.summary.average_score
    );
    for crop in &report.crops {
        let Some(adjustment) = crop.adjustment else {
            continue;
        };
        match adjustment.priority() {
            Priority::High => warn!("[Economy] {}: {}", crop.name, adjustment.suggestion()),
            _ => debug!("[Economy] {}: {}", crop.name, adjustment.suggestion()),
        }
    }
    for recommendation in &report.recommendations {
        match recommendation.priority() {
            Priority::High => warn!("[Economy] Balance: {recommendation:?}"),
            _ => debug!("[Economy] Balance: {recommendation:?}"),
        }
    }
}
