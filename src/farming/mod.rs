//! Farming domain: crop lifecycle, the slot grid, harvest, offline catch-up.
//!
//! The plain-data pieces (CropInstance, Farm, harvest, reconcile) are
//! driven by Homestead. FarmCorePlugin hosts them inside the app: a
//! periodic tick that ripens every loaded farm, resume handling for hosts
//! that were suspended, and the event-driven command API an interactive
//! front-end talks to.

use bevy::prelude::*;

use crate::config::FarmConfig;
use crate::data::CropCatalog;
use crate::economy::{LevelUp, UnlockEvent};
use crate::homestead::{FarmContext, FarmRepository, FarmStatus, HarvestOutcome, PlantOutcome};
use crate::shared::*;

pub mod crops;
pub mod farm;
pub mod harvest;
pub mod reconcile;

pub use crops::CropInstance;
pub use farm::{ClearTarget, Farm, SlotCounts, SlotTarget, WaterReport};
pub use harvest::{HarvestReport, HarvestedCrop};
pub use reconcile::{catch_up, reconcile, resume};

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// A player action sent by a front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FarmCommand {
    Plant { slot: Option<usize>, crop: CropId },
    Water(SlotTarget),
    Harvest(SlotTarget),
    Clear(ClearTarget),
    Status,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FarmCommandOutput {
    Planted(PlantOutcome),
    Watered(WaterReport),
    Harvested(HarvestOutcome),
    Cleared(usize),
    Status(Box<FarmStatus>),
    Reset,
}

#[derive(Event, Debug, Clone)]
pub struct FarmCommandEvent {
    pub owner: OwnerId,
    pub command: FarmCommand,
}

/// One result per FarmCommandEvent, in the order the commands were read.
#[derive(Event, Debug, Clone)]
pub struct FarmCommandResultEvent {
    pub owner: OwnerId,
    pub command: FarmCommand,
    pub result: Result<FarmCommandOutput, FarmError>,
}

/// Drives the periodic growth check.
#[derive(Resource, Debug)]
pub struct FarmTickTimer(pub Timer);

// ─────────────────────────────────────────────────────────────────────────────
// Plugin
// ─────────────────────────────────────────────────────────────────────────────

pub struct FarmCorePlugin;

impl Plugin for FarmCorePlugin {
    fn build(&self, app: &mut App) {
        let interval = app
            .world()
            .get_resource::<FarmConfig>()
            .map_or(1.0, |c| c.tick_interval_secs);

        app.init_resource::<FarmConfig>()
            .init_resource::<FarmClock>()
            .init_resource::<FarmRepository>()
            .insert_resource(FarmTickTimer(Timer::from_seconds(
                interval.max(0.01),
                TimerMode::Repeating,
            )))
            .add_event::<FarmCommandEvent>()
            .add_event::<FarmCommandResultEvent>()
            .add_event::<ResumeEvent>()
            .add_event::<CropsReadyEvent>()
            .add_event::<CropHarvestedEvent>()
            .add_event::<LevelUpEvent>()
            .add_event::<CropUnlockedEvent>()
            .add_event::<AchievementUnlockedEvent>()
            .add_systems(
                Update,
                (handle_resume, farm_tick, handle_farm_commands)
                    .chain()
                    .run_if(in_state(HostState::Running)),
            );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Systems
// ─────────────────────────────────────────────────────────────────────────────

/// Ripens crops on every loaded farm once per tick interval.
pub fn farm_tick(
    time: Res<Time>,
    mut timer: ResMut<FarmTickTimer>,
    clock: Res<FarmClock>,
    repo: Res<FarmRepository>,
    mut ready_events: EventWriter<CropsReadyEvent>,
) {
    timer.0.tick(time.delta());
    if !timer.0.just_finished() {
        return;
    }
    for (owner, slots) in repo.catch_up_all(clock.now()) {
        debug!("[Farming] {} crop(s) ready for {owner}", slots.len());
        ready_events.send(CropsReadyEvent { owner, slots });
    }
}

/// Applies the time a suspended host missed in one jump per farm. Short
/// absences are left to the regular tick.
pub fn handle_resume(
    mut resumes: EventReader<ResumeEvent>,
    config: Res<FarmConfig>,
    clock: Res<FarmClock>,
    repo: Res<FarmRepository>,
    mut ready_events: EventWriter<CropsReadyEvent>,
) {
    let now = clock.now();
    for ev in resumes.read() {
        if ev.elapsed < config.offline_threshold() {
            debug!("[Farming] Resume after {:?}, below offline threshold", ev.elapsed);
            continue;
        }
        let ripened = match &ev.owner {
            Some(owner) => repo
                .reconcile(owner, ev.elapsed, now)
                .map(|slots| vec![(owner.clone(), slots)])
                .unwrap_or_default(),
            None => repo.reconcile_all(ev.elapsed, now),
        };
        info!(
            "[Farming] Resumed after {}s away, {} farm(s) had crops ripen",
            ev.elapsed.as_secs(),
            ripened.iter().filter(|(_, slots)| !slots.is_empty()).count()
        );
        for (owner, slots) in ripened {
            if !slots.is_empty() {
                ready_events.send(CropsReadyEvent { owner, slots });
            }
        }
    }
}

/// Runs queued player commands against their farms and publishes results
/// plus any harvest, level, and unlock notifications they produced.
#[allow(clippy::too_many_arguments)]
pub fn handle_farm_commands(
    mut commands: EventReader<FarmCommandEvent>,
    config: Res<FarmConfig>,
    catalog: Res<CropCatalog>,
    clock: Res<FarmClock>,
    repo: Res<FarmRepository>,
    mut results: EventWriter<FarmCommandResultEvent>,
    mut harvested: EventWriter<CropHarvestedEvent>,
    mut level_ups: EventWriter<LevelUpEvent>,
    mut crop_unlocks: EventWriter<CropUnlockedEvent>,
    mut achievements: EventWriter<AchievementUnlockedEvent>,
) {
    let ctx = FarmContext::new(&config, &catalog);
    for ev in commands.read() {
        let now = clock.now();
        let result = repo.with_farm(&ev.owner, ctx, now, |home| match &ev.command {
            FarmCommand::Plant { slot, crop } => {
                home.plant(ctx, *slot, crop, now).map(FarmCommandOutput::Planted)
            }
            FarmCommand::Water(target) => {
                home.water(ctx, target, now).map(FarmCommandOutput::Watered)
            }
            FarmCommand::Harvest(target) => {
                home.harvest(ctx, target, now).map(FarmCommandOutput::Harvested)
            }
            FarmCommand::Clear(target) => home.clear(target, now).map(FarmCommandOutput::Cleared),
            FarmCommand::Status => Ok(FarmCommandOutput::Status(Box::new(home.status(ctx, now)))),
            FarmCommand::Reset => {
                home.reset(ctx, now);
                Ok(FarmCommandOutput::Reset)
            }
        });

        match &result {
            Ok(FarmCommandOutput::Planted(outcome)) => {
                publish_unlocks(&ev.owner, &outcome.unlocks, &mut crop_unlocks, &mut achievements);
            }
            Ok(FarmCommandOutput::Harvested(outcome)) => {
                for crop in &outcome.report.crops {
                    harvested.send(CropHarvestedEvent {
                        owner: ev.owner.clone(),
                        crop_id: crop.crop_id.clone(),
                        slot: crop.slot,
                        yield_: crop.yield_,
                    });
                }
                publish_level_ups(&ev.owner, &outcome.level_ups, &mut level_ups);
                publish_unlocks(&ev.owner, &outcome.unlocks, &mut crop_unlocks, &mut achievements);
            }
            Ok(_) => {}
            Err(err) if err.is_integrity_failure() => {
                warn!("[Farming] {} {:?} failed: {err}", ev.owner, ev.command);
            }
            Err(err) => debug!("[Farming] {} {:?} refused: {err}", ev.owner, ev.command),
        }

        results.send(FarmCommandResultEvent {
            owner: ev.owner.clone(),
            command: ev.command.clone(),
            result,
        });
    }
}

fn publish_level_ups(owner: &OwnerId, gained: &[LevelUp], writer: &mut EventWriter<LevelUpEvent>) {
    for level_up in gained {
        writer.send(LevelUpEvent {
            owner: owner.clone(),
            level: level_up.level,
            benefit: level_up.benefit.as_ref().map(|b| b.message()),
        });
    }
}

fn publish_unlocks(
    owner: &OwnerId,
    unlocks: &[UnlockEvent],
    crop_unlocks: &mut EventWriter<CropUnlockedEvent>,
    achievements: &mut EventWriter<AchievementUnlockedEvent>,
) {
    for unlock in unlocks {
        match unlock {
            UnlockEvent::Crop { crop_id, level, .. } => {
                crop_unlocks.send(CropUnlockedEvent {
                    owner: owner.clone(),
                    crop_id: crop_id.clone(),
                    level: *level,
                });
            }
            UnlockEvent::Achievement {
                id,
                name,
                description,
                ..
            } => {
                achievements.send(AchievementUnlockedEvent {
                    owner: owner.clone(),
                    achievement_id: id.clone(),
                    name: name.clone(),
                    description: description.clone(),
                });
            }
        }
    }
}
