//! Homestead: one player's farm, ledger, and unlock progress, plus the
//! player-level operations adapters call.
//!
//! Every operation first brings crop timers up to `now`, so callers never
//! see a crop that should be Ready but is not.

mod repository;

pub use repository::FarmRepository;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::FarmConfig;
use crate::data::CropCatalog;
use crate::economy::bonuses::scaled_growth;
use crate::economy::{
    ActiveBonus, AchievementRules, LevelUp, ResourceLedger, UnlockEngine, UnlockEvent,
    UnlockState, XpProgress,
};
use crate::farming::{
    catch_up, harvest, resume, ClearTarget, CropInstance, Farm, HarvestReport, SlotCounts,
    SlotTarget, WaterReport,
};
use crate::shared::*;

// ═══════════════════════════════════════════════════════════════════════
// CONTEXT
// ═══════════════════════════════════════════════════════════════════════

/// Read-only collaborators every homestead operation needs.
#[derive(Clone, Copy)]
pub struct FarmContext<'a> {
    pub config: &'a FarmConfig,
    pub catalog: &'a CropCatalog,
}

impl<'a> FarmContext<'a> {
    pub fn new(config: &'a FarmConfig, catalog: &'a CropCatalog) -> Self {
        Self { config, catalog }
    }

    pub fn engine(&self) -> UnlockEngine {
        UnlockEngine::new(AchievementRules {
            speed_window: self.config.speed_window(),
            inactivity_gap: self.config.inactivity_gap(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlantOutcome {
    pub slot: usize,
    pub crop_id: CropId,
    pub crop_name: String,
    pub ready_at: Timestamp,
    pub growth: Duration,
    pub cost: u64,
    pub coins_left: u64,
    pub unlocks: Vec<UnlockEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestOutcome {
    pub report: HarvestReport,
    pub coins: u64,
    pub experience: u64,
    pub level: u32,
    pub level_ups: Vec<LevelUp>,
    pub unlocks: Vec<UnlockEvent>,
}

impl HarvestOutcome {
    pub fn leveled_up(&self) -> bool {
        !self.level_ups.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub slot: usize,
    pub crop_id: CropId,
    pub state: CropState,
    pub remaining: Duration,
}

/// Everything a "check my farm" readout needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FarmStatus {
    pub owner: OwnerId,
    pub level: u32,
    pub coins: u64,
    pub experience: u64,
    pub xp_progress: XpProgress,
    pub xp_to_next_level: Option<u64>,
    pub counts: SlotCounts,
    pub slots: Vec<SlotStatus>,
    pub next_ready_in: Option<Duration>,
    pub available_crops: Vec<CropId>,
    pub next_unlock_level: Option<u32>,
    pub total_harvests: u64,
    pub achievements: Vec<String>,
    pub bonuses: Vec<ActiveBonus>,
    pub net_profit: i64,
    pub efficiency: u64,
}

/// The state a save file carries, already migrated to the current shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomesteadSnapshot {
    pub farm: Farm,
    pub ledger: ResourceLedger,
    #[serde(default)]
    pub unlocks: UnlockState,
}

// ═══════════════════════════════════════════════════════════════════════
// HOMESTEAD
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Homestead {
    pub farm: Farm,
    pub ledger: ResourceLedger,
    pub unlocks: UnlockState,
}

impl Homestead {
    pub fn new(owner: OwnerId, ctx: FarmContext<'_>, now: Timestamp) -> Self {
        Self {
            farm: Farm::new(owner, ctx.config.slot_count, now),
            ledger: ResourceLedger::new(ctx.config.starting_coins, ctx.config.history_cap),
            unlocks: UnlockState::for_catalog(ctx.catalog),
        }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.farm.owner
    }

    fn capacity(&self, config: &FarmConfig) -> usize {
        let slots = self.farm.slot_count();
        config.crop_cap.map_or(slots, |cap| cap.min(slots))
    }

    /// Plant `crop_id`, in `slot` or the first empty slot.
    pub fn plant(
        &mut self,
        ctx: FarmContext<'_>,
        slot: Option<usize>,
        crop_id: &str,
        now: Timestamp,
    ) -> Result<PlantOutcome, FarmError> {
        self.check_growth(now);
        let engine = ctx.engine();
        let result = self.try_plant(ctx, slot, crop_id, now);
        engine.track_planting(&mut self.unlocks, result.is_ok(), now);
        let mut outcome = result?;
        outcome.unlocks =
            engine.check_unlocks(&mut self.unlocks, self.ledger.level(), ctx.catalog, now);
        Ok(outcome)
    }

    fn try_plant(
        &mut self,
        ctx: FarmContext<'_>,
        slot: Option<usize>,
        crop_id: &str,
        now: Timestamp,
    ) -> Result<PlantOutcome, FarmError> {
        if let Some(slot) = slot {
            self.farm.validate_slot(slot)?;
        }
        let def = ctx.catalog.get(crop_id)?;
        let level = self.ledger.level();
        if def.unlock_level > level {
            return Err(FarmError::CropLocked {
                crop: def.id.clone(),
                required_level: def.unlock_level,
                level,
            });
        }
        let slot = self.farm.reserve(slot, self.capacity(ctx.config))?;

        let cost = match ctx.config.cost_model {
            CostModel::Free => 0,
            CostModel::SeedCost => def.plant_cost,
        };
        if cost > 0 {
            self.ledger
                .spend(ResourceKind::Coins, cost, &format!("plant_{}", def.id), now)?;
        }

        let percent = self
            .unlocks
            .bonuses
            .planting_percent(self.ledger.growth_percent());
        let base = ctx.config.growth_duration(def.growth_units);
        let growth = if percent == 100 {
            base
        } else {
            scaled_growth(base, percent)
        };
        self.unlocks.bonuses.consume_planting();

        let crop = CropInstance::new(def.id.clone(), now, growth);
        let ready_at = crop.ready_at;
        self.farm.place(slot, crop);
        info!(
            "[Farming] {} planted {} in plot {}, ready in {}s",
            self.farm.owner,
            def.id,
            slot + 1,
            growth.as_secs()
        );

        Ok(PlantOutcome {
            slot,
            crop_id: def.id.clone(),
            crop_name: def.name.clone(),
            ready_at,
            growth,
            cost,
            coins_left: self.ledger.coins,
            unlocks: Vec::new(),
        })
    }

    pub fn water(
        &mut self,
        ctx: FarmContext<'_>,
        target: &SlotTarget,
        now: Timestamp,
    ) -> Result<WaterReport, FarmError> {
        self.check_growth(now);
        let report = self.farm.water(target, now, ctx.config.time_unit())?;
        debug!(
            "[Farming] {} watered {} crop(s), {} nearly ready",
            self.farm.owner,
            report.watered.len(),
            report.nearly_ready
        );
        Ok(report)
    }

    /// Ripen crops whose timers have run out by `now`. Idempotent.
    pub fn check_growth(&mut self, now: Timestamp) -> Vec<usize> {
        catch_up(&mut self.farm, now)
    }

    pub fn harvest(
        &mut self,
        ctx: FarmContext<'_>,
        target: &SlotTarget,
        now: Timestamp,
    ) -> Result<HarvestOutcome, FarmError> {
        self.check_growth(now);
        let report = harvest::harvest(
            &mut self.farm,
            target,
            ctx.catalog,
            ctx.config.harvest_mode,
            now,
        )?;

        let engine = ctx.engine();
        for crop in &report.crops {
            engine.track_harvest(&mut self.unlocks, &crop.crop_id, crop.profit, now);
        }
        self.ledger.total_harvests += report.count() as u64;

        if report.total.coins > 0 {
            self.ledger
                .add(ResourceKind::Coins, report.total.coins, "harvest", now)?;
        }
        let level_ups = if report.total.xp > 0 {
            self.ledger
                .add(ResourceKind::Experience, report.total.xp, "harvest", now)?
                .level_ups
        } else {
            Vec::new()
        };
        let unlocks =
            engine.check_unlocks(&mut self.unlocks, self.ledger.level(), ctx.catalog, now);

        info!(
            "[Farming] {} harvested {} crop(s): +{} coins, +{} XP",
            self.farm.owner,
            report.count(),
            report.total.coins,
            report.total.xp
        );
        Ok(HarvestOutcome {
            report,
            coins: self.ledger.coins,
            experience: self.ledger.experience,
            level: self.ledger.level(),
            level_ups,
            unlocks,
        })
    }

    pub fn clear(&mut self, target: &ClearTarget, now: Timestamp) -> Result<usize, FarmError> {
        self.check_growth(now);
        self.farm.clear(target)
    }

    /// Apply an absence of `elapsed`, capped at `now`.
    pub fn reconcile(&mut self, elapsed: Duration, now: Timestamp) -> Vec<usize> {
        resume(&mut self.farm, elapsed, now)
    }

    pub fn status(&mut self, ctx: FarmContext<'_>, now: Timestamp) -> FarmStatus {
        self.check_growth(now);
        let level = self.ledger.level();
        let slots = self
            .farm
            .crops()
            .map(|(slot, crop)| SlotStatus {
                slot,
                crop_id: crop.crop_id.clone(),
                state: crop.state,
                remaining: crop.remaining(now),
            })
            .collect();
        FarmStatus {
            owner: self.farm.owner.clone(),
            level,
            coins: self.ledger.coins,
            experience: self.ledger.experience,
            xp_progress: self.ledger.xp_progress(),
            xp_to_next_level: self.ledger.xp_to_next_level(),
            counts: self.farm.counts(),
            slots,
            next_ready_in: self.farm.next_ready_at().map(|t| t.saturating_since(now)),
            available_crops: ctx
                .catalog
                .list_for_level(level)
                .into_iter()
                .map(|d| d.id.clone())
                .collect(),
            next_unlock_level: ctx.catalog.next_unlock_level(level),
            total_harvests: self.farm.total_harvests,
            achievements: self.unlocks.granted.keys().cloned().collect(),
            bonuses: self.unlocks.bonuses.active(),
            net_profit: self.ledger.net_profit(),
            efficiency: self.ledger.efficiency(),
        }
    }

    /// Start over with a fresh farm for the same owner.
    pub fn reset(&mut self, ctx: FarmContext<'_>, now: Timestamp) {
        info!("[Farming] Resetting farm for {}", self.farm.owner);
        *self = Self::new(self.farm.owner.clone(), ctx, now);
    }

    pub fn export(&self) -> HomesteadSnapshot {
        HomesteadSnapshot {
            farm: self.farm.clone(),
            ledger: self.ledger.clone(),
            unlocks: self.unlocks.clone(),
        }
    }

    /// Rebuild a homestead from a migrated snapshot. The level is
    /// recomputed from experience and crop ids are checked against the
    /// catalog.
    pub fn import(
        snapshot: HomesteadSnapshot,
        ctx: FarmContext<'_>,
        now: Timestamp,
    ) -> Result<Self, FarmError> {
        let HomesteadSnapshot {
            farm,
            mut ledger,
            mut unlocks,
        } = snapshot;
        if farm.slot_count() == 0 {
            return Err(FarmError::Serialization {
                reason: "farm has no slots".to_string(),
            });
        }
        if let Some((slot, crop)) = farm.crops().find(|(_, c)| !ctx.catalog.contains(&c.crop_id)) {
            return Err(FarmError::Serialization {
                reason: format!("plot {} holds unknown crop '{}'", slot + 1, crop.crop_id),
            });
        }
        ledger.normalize(ctx.config.history_cap);
        for def in ctx.catalog.list_for_level(ledger.level()) {
            unlocks.unlocked_crops.insert(def.id.clone());
        }

        let mut homestead = Self {
            farm,
            ledger,
            unlocks,
        };
        homestead.check_growth(now);
        Ok(homestead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::builtin_catalog;

    const HOUR: Duration = Duration::from_secs(3600);

    fn free_config() -> FarmConfig {
        FarmConfig {
            cost_model: CostModel::Free,
            ..FarmConfig::default()
        }
    }

    #[test]
    fn test_plant_water_grow_harvest() {
        let config = free_config();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let t0 = Timestamp::from_secs(1_000);
        let mut home = Homestead::new(OwnerId::new("ada"), ctx, t0);

        let planted = home.plant(ctx, Some(0), "tomatoes", t0).unwrap();
        assert_eq!(planted.ready_at, t0.plus(HOUR * 4));
        assert_eq!(planted.cost, 0);

        home.water(ctx, &SlotTarget::Slot(0), t0).unwrap();
        home.check_growth(t0.plus(HOUR * 3));
        assert_eq!(
            home.farm.slot(0).unwrap().map(|c| c.state),
            Some(CropState::Growing)
        );

        let harvested = home
            .harvest(ctx, &SlotTarget::Slot(0), t0.plus(HOUR * 4))
            .unwrap();
        assert_eq!(harvested.report.total, HarvestYield { coins: 18, xp: 10 });
        assert_eq!(home.ledger.experience, 10);
        assert_eq!(home.ledger.coins, 68);
        assert!(home.unlocks.is_granted("first_harvest"));

        let again = home.harvest(ctx, &SlotTarget::Slot(0), t0.plus(HOUR * 5));
        assert_eq!(again.unwrap_err(), FarmError::NoCrops { crop: None });
    }

    #[test]
    fn test_plant_error_order() {
        let config = FarmConfig {
            crop_cap: Some(1),
            ..FarmConfig::default()
        };
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let mut home = Homestead::new(OwnerId::new("ada"), ctx, Timestamp::ZERO);

        assert!(matches!(
            home.plant(ctx, Some(99), "mandrake", Timestamp::ZERO),
            Err(FarmError::InvalidSlot { .. })
        ));
        assert!(matches!(
            home.plant(ctx, Some(0), "mandrake", Timestamp::ZERO),
            Err(FarmError::UnknownCrop { .. })
        ));
        assert_eq!(
            home.plant(ctx, Some(0), "pumpkins", Timestamp::ZERO),
            Err(FarmError::CropLocked {
                crop: "pumpkins".into(),
                required_level: 5,
                level: 1
            })
        );
        home.plant(ctx, Some(0), "wheat", Timestamp::ZERO).unwrap();
        assert_eq!(
            home.plant(ctx, Some(0), "wheat", Timestamp::ZERO),
            Err(FarmError::FarmFull { capacity: 1 })
        );
        assert_eq!(home.unlocks.progress.perfect_streak, 0);
    }

    #[test]
    fn test_seed_cost_charged_and_refused() {
        let config = FarmConfig::default();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let mut home = Homestead::new(OwnerId::new("ada"), ctx, Timestamp::ZERO);

        for slot in 0..6 {
            home.plant(ctx, Some(slot), "tomatoes", Timestamp::ZERO).unwrap();
        }
        assert_eq!(home.ledger.coins, 2);
        let err = home
            .plant(ctx, Some(6), "tomatoes", Timestamp::ZERO)
            .unwrap_err();
        assert_eq!(
            err,
            FarmError::InsufficientFunds {
                kind: ResourceKind::Coins,
                needed: 8,
                available: 2
            }
        );
        assert_eq!(home.farm.slot(6), Ok(None), "failed plant leaves slot empty");
    }

    #[test]
    fn test_import_recomputes_level_and_rejects_unknown_crops() {
        let config = free_config();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let mut home = Homestead::new(OwnerId::new("ada"), ctx, Timestamp::ZERO);
        home.plant(ctx, Some(0), "wheat", Timestamp::ZERO).unwrap();
        home.ledger.experience = 200;

        let restored = Homestead::import(home.export(), ctx, Timestamp::ZERO).unwrap();
        assert_eq!(restored.ledger.level(), 4);
        assert!(restored.unlocks.is_crop_unlocked("sunflowers"));

        let mut bad = home.export();
        bad.farm = Farm::new(OwnerId::new("ada"), 2, Timestamp::ZERO);
        bad.farm.place(1, CropInstance::new("mandrake", Timestamp::ZERO, HOUR));
        assert!(matches!(
            Homestead::import(bad, ctx, Timestamp::ZERO),
            Err(FarmError::Serialization { .. })
        ));
    }

    #[test]
    fn test_status_readout() {
        let config = free_config();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let mut home = Homestead::new(OwnerId::new("ada"), ctx, Timestamp::ZERO);
        home.plant(ctx, None, "lettuce", Timestamp::ZERO).unwrap();
        home.plant(ctx, None, "wheat", Timestamp::ZERO).unwrap();

        let status = home.status(ctx, Timestamp::ZERO.plus(HOUR * 2));
        assert_eq!(status.counts.ready, 1);
        assert_eq!(status.counts.planted, 1);
        assert_eq!(status.next_ready_in, Some(HOUR * 3));
        assert_eq!(status.available_crops.len(), 4);
        assert_eq!(status.next_unlock_level, Some(2));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let config = free_config();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let mut home = Homestead::new(OwnerId::new("ada"), ctx, Timestamp::ZERO);
        home.plant(ctx, None, "lettuce", Timestamp::ZERO).unwrap();
        home.reset(ctx, Timestamp::ZERO);
        assert_eq!(home, Homestead::new(OwnerId::new("ada"), ctx, Timestamp::ZERO));
    }
}
