//! Shared types, resources, events, and states for Sproutvale.
//!
//! This is the type contract. Every domain module imports from here.
//! No domain imports another domain's internals except through the
//! `Homestead` facade.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════
// HOST STATE: top-level state machine
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, States, Default)]
pub enum HostState {
    #[default]
    Loading,
    Running,
}

// ═══════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════

/// Crop ids are plain strings so catalogs stay data-driven.
pub type CropId = String;

/// Opaque identifier of the player who owns a farm.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// TIME
// ═══════════════════════════════════════════════════════════════════════

/// Milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000))
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn plus(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration_millis(duration)))
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}ms", self.0)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Source of "now" for every time-dependent operation.
pub trait GameClock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(not(target_arch = "wasm32"))]
impl GameClock for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Timestamp(duration_millis(d)))
            .unwrap_or(Timestamp::ZERO)
    }
}

#[cfg(target_arch = "wasm32")]
impl GameClock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.time_origin() + p.now())
            .unwrap_or(0.0);
        Timestamp(millis.max(0.0) as u64)
    }
}

/// Hand-driven clock for tests and deterministic simulations.
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(start.0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(duration_millis(by), Ordering::SeqCst);
    }

    pub fn set(&self, to: Timestamp) {
        self.millis.store(to.0, Ordering::SeqCst);
    }
}

impl GameClock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.millis.load(Ordering::SeqCst))
    }
}

/// The clock every farm-touching system reads.
#[derive(Resource, Clone)]
pub struct FarmClock(pub Arc<dyn GameClock>);

impl FarmClock {
    pub fn new(clock: impl GameClock) -> Self {
        Self(Arc::new(clock))
    }

    pub fn now(&self) -> Timestamp {
        self.0.now()
    }
}

impl Default for FarmClock {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// CROPS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Lifecycle state of an occupied slot. An empty slot has no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropState {
    Planted,
    Growing,
    Ready,
    Harvested,
}

impl CropState {
    /// Planted or Growing: still waiting on its timer.
    pub fn is_pending(self) -> bool {
        matches!(self, CropState::Planted | CropState::Growing)
    }
}

impl fmt::Display for CropState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CropState::Planted => "planted",
            CropState::Growing => "growing",
            CropState::Ready => "ready",
            CropState::Harvested => "harvested",
        };
        f.write_str(label)
    }
}

/// What one harvest of a crop pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HarvestYield {
    pub coins: u64,
    pub xp: u64,
}

impl std::ops::AddAssign for HarvestYield {
    fn add_assign(&mut self, rhs: Self) {
        self.coins = self.coins.saturating_add(rhs.coins);
        self.xp = self.xp.saturating_add(rhs.xp);
    }
}

/// How a harvested slot returns to Empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HarvestMode {
    /// Harvested slots stay `Harvested` until an explicit clear.
    #[default]
    KeepUntilCleared,
    /// Harvested slots are emptied immediately.
    AutoClear,
}

/// Whether planting charges the crop's seed cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CostModel {
    Free,
    #[default]
    SeedCost,
}

// ═══════════════════════════════════════════════════════════════════════
// RESOURCES (ledger kinds)
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Coins,
    Experience,
    /// Derived from experience; readable but never added to or spent.
    Level,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::Coins => "coins",
            ResourceKind::Experience => "experience",
            ResourceKind::Level => "level",
        };
        f.write_str(label)
    }
}

impl FromStr for ResourceKind {
    type Err = FarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coins" | "money" | "gold" => Ok(ResourceKind::Coins),
            "xp" | "experience" => Ok(ResourceKind::Experience),
            "level" => Ok(ResourceKind::Level),
            other => Err(FarmError::UnknownResource {
                name: other.to_string(),
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════

/// Why a harvest request found nothing ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotReadyReason {
    #[error("{count} crop(s) still growing")]
    StillGrowing { count: usize },
    #[error("nothing of that kind was planted")]
    NeverPlanted,
}

/// Every failure a farm operation can report. Most are routine gameplay
/// outcomes; only `Validation` and `Serialization` signal bad data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FarmError {
    #[error("unknown crop '{crop}'")]
    UnknownCrop { crop: CropId },
    #[error("slot {slot} is out of range (farm has {slot_count} slots)")]
    InvalidSlot { slot: usize, slot_count: usize },
    #[error("slot {slot} is already occupied")]
    SlotOccupied { slot: usize },
    #[error("nothing to harvest: {reason}")]
    NotReady { reason: NotReadyReason },
    #[error("no crops{}", .crop.as_ref().map(|c| format!(" of type '{c}'")).unwrap_or_default())]
    NoCrops { crop: Option<CropId> },
    #[error("need {needed} {kind} but only {available} available")]
    InsufficientFunds {
        kind: ResourceKind,
        needed: u64,
        available: u64,
    },
    #[error("farm is full ({capacity} crops)")]
    FarmFull { capacity: usize },
    #[error("'{crop}' unlocks at level {required_level} (currently level {level})")]
    CropLocked {
        crop: CropId,
        required_level: u32,
        level: u32,
    },
    #[error("slot {slot} cannot be watered while {state}")]
    NotWaterable { slot: usize, state: CropState },
    #[error("{kind} amount must be positive")]
    InvalidAmount { kind: ResourceKind },
    #[error("{kind} cannot be changed that way")]
    DerivedResource { kind: ResourceKind },
    #[error("unknown resource '{name}'")]
    UnknownResource { name: String },
    #[error("invalid crop data: {reason}")]
    Validation { reason: String },
    #[error("unreadable save data: {reason}")]
    Serialization { reason: String },
}

impl FarmError {
    /// Bad catalog or save data rather than a gameplay outcome.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            FarmError::Validation { .. } | FarmError::Serialization { .. }
        )
    }

    /// The remedy an adapter should offer the player.
    pub fn suggestion(&self) -> String {
        match self {
            FarmError::UnknownCrop { .. } => "Pick a crop from the seed list.".to_string(),
            FarmError::InvalidSlot { slot_count, .. } => {
                format!("Choose a plot between 1 and {slot_count}.")
            }
            FarmError::SlotOccupied { .. } => {
                "That plot is taken. Try an empty one, or clear it first.".to_string()
            }
            FarmError::NotReady {
                reason: NotReadyReason::StillGrowing { .. },
            } => "Water your crops and check back a little later.".to_string(),
            FarmError::NotReady {
                reason: NotReadyReason::NeverPlanted,
            } => "Plant some seeds first, then water them.".to_string(),
            FarmError::NoCrops { .. } => "Plant some seeds to get started.".to_string(),
            FarmError::InsufficientFunds {
                needed, available, ..
            } => format!(
                "You are {} coins short. Harvest a few crops to earn more.",
                needed.saturating_sub(*available)
            ),
            FarmError::FarmFull { .. } => {
                "Harvest or clear some crops to make room.".to_string()
            }
            FarmError::CropLocked { required_level, .. } => {
                format!("Keep harvesting to reach level {required_level}.")
            }
            FarmError::NotWaterable { .. } => {
                "Only crops that are still growing need water.".to_string()
            }
            FarmError::InvalidAmount { .. }
            | FarmError::DerivedResource { .. }
            | FarmError::UnknownResource { .. } => "Try that again.".to_string(),
            FarmError::Validation { .. } => "Check the crop data file.".to_string(),
            FarmError::Serialization { .. } => {
                "Your save could not be read, so a fresh farm was started.".to_string()
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

/// Crops that finished growing during a tick or a resume.
#[derive(Event, Debug, Clone)]
pub struct CropsReadyEvent {
    pub owner: OwnerId,
    pub slots: Vec<usize>,
}

#[derive(Event, Debug, Clone)]
pub struct CropHarvestedEvent {
    pub owner: OwnerId,
    pub crop_id: CropId,
    pub slot: usize,
    pub yield_: HarvestYield,
}

#[derive(Event, Debug, Clone)]
pub struct LevelUpEvent {
    pub owner: OwnerId,
    pub level: u32,
    pub benefit: Option<String>,
}

#[derive(Event, Debug, Clone)]
pub struct CropUnlockedEvent {
    pub owner: OwnerId,
    pub crop_id: CropId,
    pub level: u32,
}

#[derive(Event, Debug, Clone)]
pub struct AchievementUnlockedEvent {
    pub owner: OwnerId,
    pub achievement_id: String,
    pub name: String,
    pub description: String,
}

/// The host came back after being away (tab visible again, process
/// resumed). `owner: None` resumes every loaded farm.
#[derive(Event, Debug, Clone)]
pub struct ResumeEvent {
    pub owner: Option<OwnerId>,
    pub elapsed: Duration,
}

// ═══════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════

pub const DEFAULT_SLOT_COUNT: usize = 25; // 5x5 grid
pub const STARTING_COINS: u64 = 50;
pub const MAX_LEVEL: u32 = 50;
pub const FIRST_LEVEL_XP: u64 = 50;
pub const TRANSACTION_HISTORY_CAP: usize = 100;
pub const SAVE_SCHEMA_VERSION: u32 = 3;
