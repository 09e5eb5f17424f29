use super::{CropCatalog, CropDefinition};
use crate::shared::*;

/// Populate the CropCatalog with the built-in crops.
///
/// Growth is in time units (one hour for the voice host, three seconds for
/// the browser demo). Four starter crops are open at level 1; levels 2-5
/// each unlock one more.
pub fn populate_crops(catalog: &mut CropCatalog) {
    let crops = [
        // ── Starter Crops ───────────────────────────────────────────────────
        crop(
            "wheat",
            "Wheat",
            "Golden grain that sways in the breeze.",
            5,
            5,
            (12, 8),
            1,
            Rarity::Common,
        ),
        crop(
            "tomatoes",
            "Tomatoes",
            "Plump red tomatoes, sweet off the vine.",
            4,
            8,
            (18, 10),
            1,
            Rarity::Common,
        ),
        crop(
            "carrots",
            "Carrots",
            "Crunchy orange roots.",
            3,
            6,
            (14, 8),
            1,
            Rarity::Common,
        ),
        crop(
            "lettuce",
            "Lettuce",
            "Crisp leaves, quick to grow.",
            2,
            3,
            (8, 6),
            1,
            Rarity::Common,
        ),
        // ── Level Unlocks ───────────────────────────────────────────────────
        crop(
            "strawberries",
            "Strawberries",
            "Juicy berries that sell well at market.",
            5,
            15,
            (30, 12),
            2,
            Rarity::Uncommon,
        ),
        crop(
            "corn",
            "Corn",
            "Tall stalks of sweet corn.",
            6,
            12,
            (25, 15),
            3,
            Rarity::Uncommon,
        ),
        crop(
            "sunflowers",
            "Sunflowers",
            "Bright blooms that follow the sun.",
            7,
            10,
            (22, 14),
            4,
            Rarity::Uncommon,
        ),
        crop(
            "pumpkins",
            "Pumpkins",
            "Big orange pumpkins, slow but valuable.",
            8,
            20,
            (45, 20),
            5,
            Rarity::Rare,
        ),
    ];

    for def in crops {
        let id = def.id.clone();
        if let Err(err) = catalog.insert(def) {
            bevy::log::warn!("[Data] Skipping built-in crop '{id}': {err}");
        }
    }
}

/// A fresh catalog holding only the built-in crops.
pub fn builtin_catalog() -> CropCatalog {
    let mut catalog = CropCatalog::default();
    populate_crops(&mut catalog);
    catalog
}

#[allow(clippy::too_many_arguments)]
fn crop(
    id: &str,
    name: &str,
    description: &str,
    growth_units: u32,
    plant_cost: u64,
    (coins, xp): (u64, u64),
    unlock_level: u32,
    rarity: Rarity,
) -> CropDefinition {
    CropDefinition {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        growth_units,
        plant_cost,
        harvest_yield: HarvestYield { coins, xp },
        unlock_level,
        rarity,
    }
}
