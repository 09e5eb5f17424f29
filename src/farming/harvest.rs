//! Harvest: pick Ready slots, pay out their catalog yield, mark them done.

use serde::Serialize;

use super::farm::{Farm, SlotTarget};
use crate::data::CropCatalog;
use crate::shared::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestedCrop {
    pub slot: usize,
    pub crop_id: CropId,
    pub yield_: HarvestYield,
    /// Coins above the seed cost, for profit tracking.
    pub profit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HarvestReport {
    pub crops: Vec<HarvestedCrop>,
    pub total: HarvestYield,
    /// Crops matching the request that are still growing.
    pub still_growing: usize,
}

impl HarvestReport {
    pub fn count(&self) -> usize {
        self.crops.len()
    }

    /// Harvested crop ids with how many of each, in first-seen order.
    pub fn by_crop(&self) -> Vec<(CropId, usize)> {
        let mut grouped: Vec<(CropId, usize)> = Vec::new();
        for crop in &self.crops {
            match grouped.iter_mut().find(|(id, _)| *id == crop.crop_id) {
                Some((_, n)) => *n += 1,
                None => grouped.push((crop.crop_id.clone(), 1)),
            }
        }
        grouped
    }
}

/// Harvest every Ready slot selected by `target`.
///
/// All selected crops are looked up before any slot changes, so an
/// unknown crop id leaves the farm untouched.
pub fn harvest(
    farm: &mut Farm,
    target: &SlotTarget,
    catalog: &CropCatalog,
    mode: HarvestMode,
    now: Timestamp,
) -> Result<HarvestReport, FarmError> {
    let slots = farm.harvestable(target)?;

    let mut planned = Vec::with_capacity(slots.len());
    for slot in slots {
        let Some(crop) = farm.slot(slot)? else {
            continue;
        };
        let def = catalog.get(&crop.crop_id)?;
        planned.push((slot, def.harvest_yield, def.profit()));
    }

    let mut report = HarvestReport::default();
    for (slot, yield_, profit) in planned {
        if let Some(crop_id) = farm.take_harvest(slot, now, mode) {
            report.total += yield_;
            report.crops.push(HarvestedCrop {
                slot,
                crop_id,
                yield_,
                profit,
            });
        }
    }

    report.still_growing = farm
        .crops()
        .filter(|(index, crop)| {
            crop.is_pending()
                && match target {
                    SlotTarget::Slot(slot) => slot == index,
                    SlotTarget::All => true,
                    SlotTarget::Crop(id) => crop.crop_id == *id,
                }
        })
        .count();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::builtin_catalog;
    use crate::farming::crops::CropInstance;
    use std::time::Duration;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_harvest_pays_catalog_yield_once() {
        let catalog = builtin_catalog();
        let mut farm = Farm::new(OwnerId::new("ada"), 4, Timestamp::ZERO);
        farm.place(0, CropInstance::new("tomatoes", Timestamp::ZERO, HOUR * 4));
        farm.place(1, CropInstance::new("tomatoes", Timestamp::ZERO, HOUR * 4));
        farm.place(2, CropInstance::new("pumpkins", Timestamp::ZERO, HOUR * 8));
        let later = Timestamp::ZERO.plus(HOUR * 4);
        farm.check_growth(later);

        let report = harvest(
            &mut farm,
            &SlotTarget::All,
            &catalog,
            HarvestMode::KeepUntilCleared,
            later,
        )
        .unwrap();
        assert_eq!(report.count(), 2);
        assert_eq!(report.total, HarvestYield { coins: 36, xp: 20 });
        assert_eq!(report.by_crop(), vec![("tomatoes".to_string(), 2)]);
        assert_eq!(report.still_growing, 1);

        let again = harvest(
            &mut farm,
            &SlotTarget::Slot(0),
            &catalog,
            HarvestMode::KeepUntilCleared,
            later,
        );
        assert_eq!(again, Err(FarmError::NoCrops { crop: None }));
    }

    #[test]
    fn test_unknown_crop_leaves_farm_untouched() {
        let catalog = builtin_catalog();
        let mut farm = Farm::new(OwnerId::new("ada"), 2, Timestamp::ZERO);
        farm.place(0, CropInstance::new("wheat", Timestamp::ZERO, HOUR));
        farm.place(1, CropInstance::new("mandrake", Timestamp::ZERO, HOUR));
        farm.check_growth(Timestamp::ZERO.plus(HOUR));
        let before = farm.clone();

        let result = harvest(
            &mut farm,
            &SlotTarget::All,
            &catalog,
            HarvestMode::AutoClear,
            Timestamp::ZERO.plus(HOUR),
        );
        assert!(matches!(result, Err(FarmError::UnknownCrop { .. })));
        assert_eq!(farm, before);
    }
}
