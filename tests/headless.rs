//! Headless integration tests for Sproutvale.
//!
//! These tests exercise the farm core and its Bevy plugins without a
//! window. They use Bevy's `MinimalPlugins` to tick the app, drive time
//! through a `ManualClock`, and verify the crop lifecycle, progression,
//! and persistence loops end to end.
//!
//! Run with: `cargo test --test headless`

use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use bevy::time::TimeUpdateStrategy;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use sproutvale::config::FarmConfig;
use sproutvale::data::{builtin_catalog, CropCatalog};
use sproutvale::economy::{EconomyStats, LevelBenefit, LevelTable, ResourceLedger};
use sproutvale::farming::{
    reconcile, FarmCommand, FarmCommandEvent, FarmCommandOutput, FarmCommandResultEvent,
    SlotTarget,
};
use sproutvale::homestead::{FarmContext, FarmRepository, Homestead};
use sproutvale::save::{MemorySaveStore, SaveCompleteEvent, SaveRequestEvent, SaveStore};
use sproutvale::shared::*;
use sproutvale::SproutvalePlugin;

const HOUR: Duration = Duration::from_secs(3600);
const T0: Timestamp = Timestamp(1_700_000_000_000);

// ─────────────────────────────────────────────────────────────────────────────
// Test App Builder
// ─────────────────────────────────────────────────────────────────────────────

fn free_config() -> FarmConfig {
    FarmConfig {
        cost_model: CostModel::Free,
        ..FarmConfig::default()
    }
}

/// Builds a headless app with every farm plugin, a hand-driven clock, and
/// an in-memory save store. Returns the clock and store so tests can move
/// time and inspect saves.
fn build_test_app() -> (App, ManualClock, Arc<MemorySaveStore>) {
    let clock = ManualClock::starting_at(T0);
    let store = Arc::new(MemorySaveStore::default());

    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(StatesPlugin);
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(250)));
    app.insert_resource(free_config());
    app.insert_resource(FarmClock::new(clock.clone()));
    app.insert_resource(FarmRepository::with_store(store.clone()));
    app.add_plugins(SproutvalePlugin);

    // First update enters Loading and fills the catalog; second applies Running.
    app.update();
    app.update();

    (app, clock, store)
}

fn send_command(app: &mut App, owner: &str, command: FarmCommand) -> FarmCommandResultEvent {
    app.world_mut().send_event(FarmCommandEvent {
        owner: OwnerId::new(owner),
        command,
    });
    app.update();
    let mut results: Vec<FarmCommandResultEvent> = app
        .world_mut()
        .resource_mut::<Events<FarmCommandResultEvent>>()
        .drain()
        .collect();
    assert_eq!(results.len(), 1, "exactly one result per command");
    results.remove(0)
}

fn drain<E: Event>(app: &mut App) -> Vec<E> {
    app.world_mut().resource_mut::<Events<E>>().drain().collect()
}

fn plant(slot: usize, crop: &str) -> FarmCommand {
    FarmCommand::Plant {
        slot: Some(slot),
        crop: crop.to_string(),
    }
}

#[test]
fn test_headless_boot_reaches_running_with_catalog() {
    let (mut app, _clock, _store) = build_test_app();

    let state = app.world().resource::<State<HostState>>();
    assert_eq!(state.get(), &HostState::Running, "Loading should hand over to Running");
    assert_eq!(app.world().resource::<CropCatalog>().len(), 8);

    // Smoke: run a small frame budget without panic.
    for _ in 0..120 {
        app.update();
    }
    assert_eq!(app.world().resource::<State<HostState>>().get(), &HostState::Running);
}

// ─────────────────────────────────────────────────────────────────────────────
// Command API (ECS integration)
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_plant_command_creates_farm_and_reports_outcome() {
    let (mut app, _clock, _store) = build_test_app();

    let result = send_command(&mut app, "ada", plant(0, "tomatoes"));
    let Ok(FarmCommandOutput::Planted(outcome)) = result.result else {
        panic!("expected a planting, got {:?}", result.result);
    };
    assert_eq!(outcome.slot, 0);
    assert_eq!(outcome.ready_at, T0.plus(HOUR * 4));
    assert_eq!(app.world().resource::<FarmRepository>().len(), 1);
}

#[test]
fn test_rejected_command_returns_error_without_side_effects() {
    let (mut app, _clock, _store) = build_test_app();

    let result = send_command(&mut app, "ada", plant(0, "pumpkins"));
    assert!(matches!(result.result, Err(FarmError::CropLocked { .. })));

    let status = send_command(&mut app, "ada", FarmCommand::Status);
    let Ok(FarmCommandOutput::Status(status)) = status.result else {
        panic!("expected a status readout");
    };
    assert_eq!(status.counts.empty, DEFAULT_SLOT_COUNT);
    assert_eq!(status.coins, STARTING_COINS);
}

#[test]
fn test_harvest_command_emits_progress_events() {
    let (mut app, clock, _store) = build_test_app();

    for slot in 0..9 {
        let result = send_command(&mut app, "ada", plant(slot, "lettuce"));
        assert!(result.result.is_ok());
    }
    clock.advance(HOUR * 2);
    let result = send_command(&mut app, "ada", FarmCommand::Harvest(SlotTarget::All));
    let Ok(FarmCommandOutput::Harvested(outcome)) = result.result else {
        panic!("expected a harvest, got {:?}", result.result);
    };
    assert_eq!(outcome.report.count(), 9);
    assert_eq!(outcome.experience, 54);
    assert_eq!(outcome.level, 2);
    // One more frame so the economy systems see this frame's events.
    app.update();

    let harvested = drain::<CropHarvestedEvent>(&mut app);
    assert_eq!(harvested.len(), 9);
    let level_ups = drain::<LevelUpEvent>(&mut app);
    assert_eq!(level_ups.len(), 1);
    assert_eq!(level_ups[0].level, 2);
    assert_eq!(level_ups[0].benefit.as_deref(), Some("Strawberries unlocked!"));
    let unlocked = drain::<CropUnlockedEvent>(&mut app);
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].crop_id, "strawberries");
    let achievements = drain::<AchievementUnlockedEvent>(&mut app);
    assert!(achievements.iter().any(|a| a.achievement_id == "first_harvest"));

    let stats = app.world().resource::<EconomyStats>();
    assert_eq!(stats.total_harvests, 9);
    assert_eq!(stats.total_coins_paid, 72);
}

#[test]
fn test_owners_do_not_share_farms() {
    let (mut app, _clock, _store) = build_test_app();

    send_command(&mut app, "ada", plant(0, "wheat"));
    let result = send_command(&mut app, "bo", plant(0, "wheat"));
    assert!(result.result.is_ok(), "slot 0 is free on bo's farm");
    assert_eq!(app.world().resource::<FarmRepository>().len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tick and resume
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_tick_ripens_crops_and_announces_them() {
    let (mut app, clock, _store) = build_test_app();

    send_command(&mut app, "ada", plant(3, "lettuce"));
    drain::<CropsReadyEvent>(&mut app);

    clock.advance(HOUR * 2);
    // 250 ms per frame, one-second tick interval.
    let mut ready = Vec::new();
    for _ in 0..8 {
        app.update();
        ready.extend(drain::<CropsReadyEvent>(&mut app));
    }

    assert_eq!(ready.len(), 1, "ripening is announced once");
    assert_eq!(ready[0].owner, OwnerId::new("ada"));
    assert_eq!(ready[0].slots, vec![3]);
}

#[test]
fn test_resume_reconciles_in_one_jump() {
    let (mut app, clock, _store) = build_test_app();

    send_command(&mut app, "ada", plant(0, "carrots"));
    clock.advance(HOUR * 3);
    app.world_mut().send_event(ResumeEvent {
        owner: Some(OwnerId::new("ada")),
        elapsed: HOUR * 3,
    });
    app.update();

    let ready = drain::<CropsReadyEvent>(&mut app);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].slots, vec![0]);
}

#[test]
fn test_resume_after_tick_does_not_count_absence_twice() {
    let (mut app, clock, _store) = build_test_app();

    // Wheat takes five hours.
    send_command(&mut app, "ada", plant(0, "wheat"));
    clock.advance(HOUR * 3);
    // The tick sees the wake-up first and observes the farm at T0+3h.
    for _ in 0..8 {
        app.update();
    }
    app.world_mut().send_event(ResumeEvent {
        owner: Some(OwnerId::new("ada")),
        elapsed: HOUR * 3,
    });
    app.update();
    assert!(drain::<CropsReadyEvent>(&mut app).is_empty());

    let farm = app
        .world()
        .resource::<FarmRepository>()
        .get(&OwnerId::new("ada"))
        .unwrap();
    let home = farm.lock().unwrap();
    assert_eq!(home.farm.slot(0).unwrap().unwrap().state, CropState::Planted);
    assert_eq!(home.farm.last_observed_at, T0.plus(HOUR * 3));
}

#[test]
fn test_short_resume_is_left_to_the_tick() {
    let (mut app, _clock, _store) = build_test_app();

    send_command(&mut app, "ada", plant(0, "carrots"));
    app.world_mut().send_event(ResumeEvent {
        owner: None,
        elapsed: Duration::from_secs(1),
    });
    app.update();
    assert!(drain::<CropsReadyEvent>(&mut app).is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_save_request_writes_every_loaded_farm() {
    let (mut app, _clock, store) = build_test_app();

    send_command(&mut app, "ada", plant(0, "wheat"));
    send_command(&mut app, "bo", plant(1, "corn"));
    app.world_mut().send_event(SaveRequestEvent { owner: None });
    app.update();

    let complete = drain::<SaveCompleteEvent>(&mut app);
    assert_eq!(complete.len(), 2);
    assert!(complete.iter().all(|c| c.success));
    assert_eq!(store.len(), 2);
    assert!(store.load(&OwnerId::new("ada")).unwrap().is_some());
}

#[test]
fn test_saved_farm_is_restored_after_offline_time() {
    let config = free_config();
    let catalog = builtin_catalog();
    let ctx = FarmContext::new(&config, &catalog);
    let store = Arc::new(MemorySaveStore::default());

    let first = FarmRepository::with_store(store.clone());
    first
        .with_farm(&OwnerId::new("ada"), ctx, T0, |home| {
            home.plant(ctx, Some(0), "tomatoes", T0)
        })
        .unwrap();
    assert_eq!(sproutvale::save::save_all(&first, T0), 1);

    // A new host comes up five hours later.
    let second = FarmRepository::with_store(store);
    let state = second.with_farm(&OwnerId::new("ada"), ctx, T0.plus(HOUR * 5), |home| {
        home.farm.slot(0).unwrap().map(|c| c.state)
    });
    assert_eq!(state, Some(CropState::Ready));
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios: tomatoes through one full lifecycle, then a large XP award
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_scenario_tomato_lifecycle() {
    let config = free_config();
    let catalog = builtin_catalog();
    let ctx = FarmContext::new(&config, &catalog);
    let mut home = Homestead::new(OwnerId::new("ada"), ctx, T0);

    // 1. plant into slot 0
    let planted = home.plant(ctx, Some(0), "tomatoes", T0).unwrap();
    let crop = home.farm.slot(0).unwrap().unwrap();
    assert_eq!(crop.state, CropState::Planted);
    assert_eq!(planted.ready_at, T0.plus(HOUR * 4));
    assert_eq!(planted.cost, 0);

    // 2. water, then check before the timer runs out
    home.water(ctx, &SlotTarget::Slot(0), T0).unwrap();
    assert_eq!(home.farm.slot(0).unwrap().unwrap().state, CropState::Growing);
    assert!(home.check_growth(T0.plus(HOUR * 3)).is_empty());
    assert_eq!(home.farm.slot(0).unwrap().unwrap().state, CropState::Growing);

    // 3. four units later it is ready
    assert_eq!(home.check_growth(T0.plus(HOUR * 4)), vec![0]);
    assert_eq!(home.farm.slot(0).unwrap().unwrap().state, CropState::Ready);

    // 4. harvest pays the catalog yield
    let xp_before = home.ledger.experience;
    let harvested = home
        .harvest(ctx, &SlotTarget::Slot(0), T0.plus(HOUR * 4))
        .unwrap();
    assert_eq!(harvested.report.total, HarvestYield { coins: 18, xp: 10 });
    assert_eq!(home.ledger.experience, xp_before + 10);
    assert_eq!(home.farm.slot(0).unwrap().unwrap().state, CropState::Harvested);

    // 5. a second harvest never pays twice
    let coins = home.ledger.coins;
    let again = home.harvest(ctx, &SlotTarget::Slot(0), T0.plus(HOUR * 5));
    assert_eq!(again.unwrap_err(), FarmError::NoCrops { crop: None });
    assert_eq!(home.ledger.coins, coins);
}

#[test]
fn test_scenario_tomato_lifecycle_with_auto_clear() {
    let config = FarmConfig {
        harvest_mode: HarvestMode::AutoClear,
        ..free_config()
    };
    let catalog = builtin_catalog();
    let ctx = FarmContext::new(&config, &catalog);
    let mut home = Homestead::new(OwnerId::new("ada"), ctx, T0);

    home.plant(ctx, Some(0), "tomatoes", T0).unwrap();
    home.harvest(ctx, &SlotTarget::Slot(0), T0.plus(HOUR * 4))
        .unwrap();
    assert_eq!(home.farm.slot(0), Ok(None), "auto-clear empties the slot");
    assert_eq!(
        home.harvest(ctx, &SlotTarget::Slot(0), T0.plus(HOUR * 5)),
        Err(FarmError::NoCrops { crop: None })
    );
}

#[test]
fn test_scenario_large_xp_award_jumps_levels_in_order() {
    let mut ledger = ResourceLedger::new(STARTING_COINS, TRANSACTION_HISTORY_CAP);

    let change = ledger
        .add(ResourceKind::Experience, 500, "quest", T0)
        .unwrap();
    assert_eq!(ledger.level(), 7, "500 XP clears the 495 threshold");

    let levels: Vec<u32> = change.level_ups.iter().map(|l| l.level).collect();
    assert_eq!(levels, vec![2, 3, 4, 5, 6, 7]);
    assert_eq!(
        change.level_ups[4].benefit,
        Some(LevelBenefit::BonusCoins { amount: 100 })
    );
    assert_eq!(ledger.coins, STARTING_COINS + 100, "level 6 bonus paid once");

    // Re-adding nothing crosses no threshold, so nothing is paid again.
    let change = ledger.add(ResourceKind::Experience, 1, "quest", T0).unwrap();
    assert!(change.level_ups.is_empty());
    assert_eq!(ledger.coins, STARTING_COINS + 100);
}

#[test]
fn test_achievement_grant_is_idempotent() {
    let config = free_config();
    let catalog = builtin_catalog();
    let ctx = FarmContext::new(&config, &catalog);
    let mut home = Homestead::new(OwnerId::new("ada"), ctx, T0);
    home.plant(ctx, Some(0), "lettuce", T0).unwrap();
    let outcome = home
        .harvest(ctx, &SlotTarget::Slot(0), T0.plus(HOUR * 2))
        .unwrap();
    assert!(home.unlocks.is_granted("first_harvest"));
    assert!(!outcome.unlocks.is_empty());

    let before = home.unlocks.clone();
    let engine = ctx.engine();
    let again = engine.check_unlocks(&mut home.unlocks, home.ledger.level(), &catalog, T0);
    assert!(again.is_empty());
    assert_eq!(home.unlocks, before);
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

fn crop_ids() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["wheat", "tomatoes", "carrots", "lettuce"])
}

proptest! {
    #[test]
    fn prop_level_matches_experience_after_every_award(
        awards in prop::collection::vec(1u64..5_000, 1..40)
    ) {
        let table = LevelTable::default();
        let mut ledger = ResourceLedger::new(STARTING_COINS, TRANSACTION_HISTORY_CAP);
        for amount in awards {
            let before = ledger.level();
            let change = ledger.add(ResourceKind::Experience, amount, "award", T0).unwrap();
            prop_assert_eq!(ledger.level(), table.level_for(ledger.experience));
            let gained: Vec<u32> = change.level_ups.iter().map(|l| l.level).collect();
            let expected: Vec<u32> = (before + 1..=ledger.level()).collect();
            prop_assert_eq!(gained, expected);
        }
    }

    #[test]
    fn prop_offline_jump_matches_incremental_ticks(
        crop in crop_ids(),
        steps in 1u64..24,
        step_minutes in 1u64..120,
    ) {
        let config = free_config();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let mut online = Homestead::new(OwnerId::new("ada"), ctx, T0);
        online.plant(ctx, Some(0), crop, T0).unwrap();
        let mut offline = online.clone();

        let step = Duration::from_secs(step_minutes * 60);
        for _ in 0..steps {
            reconcile(&mut online.farm, step);
        }
        reconcile(&mut offline.farm, step * steps as u32);

        prop_assert_eq!(online.farm, offline.farm);
    }

    #[test]
    fn prop_ready_iff_timer_elapsed(
        crop in crop_ids(),
        water_after_mins in prop::option::of(0u64..600),
        check_after_mins in 0u64..600,
    ) {
        let config = free_config();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let mut home = Homestead::new(OwnerId::new("ada"), ctx, T0);
        let ready_at = home.plant(ctx, Some(0), crop, T0).unwrap().ready_at;

        let check_at = T0.plus(Duration::from_secs(check_after_mins * 60));
        if let Some(mins) = water_after_mins {
            let water_at = T0.plus(Duration::from_secs(mins * 60));
            if water_at < check_at {
                let _ = home.water(ctx, &SlotTarget::Slot(0), water_at);
            }
        }
        home.check_growth(check_at);

        let crop = home.farm.slot(0).unwrap().unwrap();
        prop_assert_eq!(crop.ready_at, ready_at);
        prop_assert_eq!(crop.state == CropState::Ready, check_at >= ready_at);
    }

    #[test]
    fn prop_growth_check_is_idempotent(
        crop in crop_ids(),
        after_mins in 0u64..600,
    ) {
        let config = free_config();
        let catalog = builtin_catalog();
        let ctx = FarmContext::new(&config, &catalog);
        let mut home = Homestead::new(OwnerId::new("ada"), ctx, T0);
        home.plant(ctx, Some(0), crop, T0).unwrap();

        let now = T0.plus(Duration::from_secs(after_mins * 60));
        home.check_growth(now);
        let once = home.clone();
        prop_assert!(home.check_growth(now).is_empty());
        prop_assert_eq!(home, once);
    }
}
