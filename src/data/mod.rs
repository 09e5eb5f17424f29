//! Data layer: the crop catalog and the plugin that fills it at startup.
//!
//! The plugin runs in OnEnter(HostState::Loading), fills the CropCatalog
//! from the built-in crop table (or the catalog file named in FarmConfig),
//! then moves the host into HostState::Running. Nothing else seeds the
//! catalog.

mod crops;

pub use crops::{builtin_catalog, populate_crops};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::FarmConfig;
use crate::shared::*;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropDefinition {
    pub id: CropId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Time units until ready. Converted to wall time by FarmConfig.
    pub growth_units: u32,
    pub plant_cost: u64,
    pub harvest_yield: HarvestYield,
    pub unlock_level: u32,
    pub rarity: Rarity,
}

impl CropDefinition {
    /// Coins earned per harvest beyond the seed cost.
    pub fn profit(&self) -> u64 {
        self.harvest_yield.coins.saturating_sub(self.plant_cost)
    }
}

/// Registry of every plantable crop, keyed by id.
#[derive(Resource, Debug, Clone, Default)]
pub struct CropCatalog {
    crops: HashMap<CropId, CropDefinition>,
}

impl CropCatalog {
    pub fn get(&self, id: &str) -> Result<&CropDefinition, FarmError> {
        self.crops.get(id).ok_or_else(|| FarmError::UnknownCrop {
            crop: id.to_string(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.crops.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.crops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }

    /// Add a definition, rejecting malformed or duplicate entries.
    pub fn insert(&mut self, def: CropDefinition) -> Result<(), FarmError> {
        let reason = if def.id.trim().is_empty() {
            Some("crop id is empty".to_string())
        } else if def.name.trim().is_empty() {
            Some(format!("crop '{}' has no name", def.id))
        } else if def.growth_units == 0 {
            Some(format!("crop '{}' has zero growth time", def.id))
        } else if def.unlock_level == 0 {
            Some(format!("crop '{}' has unlock level 0", def.id))
        } else if self.crops.contains_key(&def.id) {
            Some(format!("crop '{}' is defined twice", def.id))
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(FarmError::Validation { reason });
        }
        self.crops.insert(def.id.clone(), def);
        Ok(())
    }

    /// All crops, ordered by unlock level then id.
    pub fn list_all(&self) -> Vec<&CropDefinition> {
        let mut list: Vec<&CropDefinition> = self.crops.values().collect();
        list.sort_by(|a, b| {
            a.unlock_level
                .cmp(&b.unlock_level)
                .then_with(|| a.id.cmp(&b.id))
        });
        list
    }

    /// Crops available to a player at `level`.
    pub fn list_for_level(&self, level: u32) -> Vec<&CropDefinition> {
        self.list_all()
            .into_iter()
            .filter(|def| def.unlock_level <= level)
            .collect()
    }

    /// Crops that become available exactly at `level`.
    pub fn unlocked_at(&self, level: u32) -> Vec<&CropDefinition> {
        self.list_all()
            .into_iter()
            .filter(|def| def.unlock_level == level)
            .collect()
    }

    /// The next level above `level` that unlocks a crop, if any.
    pub fn next_unlock_level(&self, level: u32) -> Option<u32> {
        self.crops
            .values()
            .map(|def| def.unlock_level)
            .filter(|&l| l > level)
            .min()
    }

    pub fn profit(&self, id: &str) -> Result<u64, FarmError> {
        self.get(id).map(CropDefinition::profit)
    }

    /// Parse a RON list of definitions through the same validation as
    /// `insert`.
    pub fn from_ron_str(text: &str) -> Result<Self, FarmError> {
        let defs: Vec<CropDefinition> =
            ron::from_str(text).map_err(|e| FarmError::Validation {
                reason: format!("catalog parse failed: {e}"),
            })?;
        let mut catalog = Self::default();
        for def in defs {
            catalog.insert(def)?;
        }
        Ok(catalog)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin
// ─────────────────────────────────────────────────────────────────────────────

pub struct DataPlugin;

impl Plugin for DataPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CropCatalog>()
            .add_systems(OnEnter(HostState::Loading), load_catalog);
    }
}

fn load_catalog(
    config: Option<Res<FarmConfig>>,
    mut catalog: ResMut<CropCatalog>,
    mut next_state: ResMut<NextState<HostState>>,
) {
    let from_file = config
        .as_ref()
        .and_then(|c| c.catalog_path.as_ref())
        .and_then(|path| match std::fs::read_to_string(path) {
            Ok(text) => match CropCatalog::from_ron_str(&text) {
                Ok(loaded) => Some(loaded),
                Err(err) => {
                    warn!("[Data] {} rejected: {err}", path.display());
                    None
                }
            },
            Err(err) => {
                warn!("[Data] Could not read {}: {err}", path.display());
                None
            }
        });

    match from_file {
        Some(loaded) => *catalog = loaded,
        None if catalog.is_empty() => populate_crops(&mut catalog),
        None => {}
    }
    info!("[Data] Crops loaded: {}", catalog.len());

    next_state.set(HostState::Running);
}
