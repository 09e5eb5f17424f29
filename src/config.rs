//! Runtime configuration, loaded from a RON file.
//!
//! Every field has a default, so a missing file or a partial file is fine.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::shared::*;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    pub slot_count: usize,
    /// Maximum crops in the ground at once. `None` means only the slot
    /// count limits planting.
    pub crop_cap: Option<usize>,
    pub harvest_mode: HarvestMode,
    pub cost_model: CostModel,
    /// Wall-clock length of one crop growth unit.
    pub time_unit_secs: u64,
    pub starting_coins: u64,
    pub history_cap: usize,
    pub tick_interval_secs: f32,
    pub autosave_interval_secs: f32,
    /// Resumes shorter than this are treated as a normal tick.
    pub offline_threshold_secs: u64,
    pub speed_window_secs: u64,
    pub inactivity_gap_secs: u64,
    pub save_dir: PathBuf,
    /// Optional RON crop catalog that replaces the built-in crops.
    pub catalog_path: Option<PathBuf>,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            crop_cap: None,
            harvest_mode: HarvestMode::default(),
            cost_model: CostModel::default(),
            time_unit_secs: 3600,
            starting_coins: STARTING_COINS,
            history_cap: TRANSACTION_HISTORY_CAP,
            tick_interval_secs: 1.0,
            autosave_interval_secs: 30.0,
            offline_threshold_secs: 5,
            speed_window_secs: 120,
            inactivity_gap_secs: 300,
            save_dir: PathBuf::from("saves"),
            catalog_path: None,
        }
    }
}

impl FarmConfig {
    /// Browser demo settings: three-second growth units and auto-clearing
    /// plots.
    pub fn browser() -> Self {
        Self {
            time_unit_secs: 3,
            harvest_mode: HarvestMode::AutoClear,
            ..Self::default()
        }
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the config, falling back to defaults if the file is missing or
    /// malformed.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                info!("[Config] Loaded {}", path.display());
                config
            }
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                info!("[Config] {} not found, using defaults", path.display());
                Self::default()
            }
            Err(err) => {
                warn!("[Config] {err}; using defaults");
                Self::default()
            }
        }
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_secs(self.time_unit_secs.max(1))
    }

    /// Growth duration for a crop of `units` time units.
    pub fn growth_duration(&self, units: u32) -> Duration {
        self.time_unit().saturating_mul(units)
    }

    pub fn offline_threshold(&self) -> Duration {
        Duration::from_secs(self.offline_threshold_secs)
    }

    pub fn speed_window(&self) -> Duration {
        Duration::from_secs(self.speed_window_secs)
    }

    pub fn inactivity_gap(&self) -> Duration {
        Duration::from_secs(self.inactivity_gap_secs)
    }
}
