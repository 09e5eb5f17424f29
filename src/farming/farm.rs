//! The farm aggregate: a fixed-length row of slots for one owner.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::crops::CropInstance;
use crate::shared::*;

/// Which slots a water or harvest request applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotTarget {
    Slot(usize),
    All,
    Crop(CropId),
}

impl SlotTarget {
    pub fn crop_filter(&self) -> Option<&CropId> {
        match self {
            SlotTarget::Crop(id) => Some(id),
            _ => None,
        }
    }

    fn matches(&self, index: usize, crop: &CropInstance) -> bool {
        match self {
            SlotTarget::Slot(slot) => *slot == index,
            SlotTarget::All => true,
            SlotTarget::Crop(id) => crop.crop_id == *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearTarget {
    Slot(usize),
    AllHarvested,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WaterReport {
    pub watered: Vec<usize>,
    /// Watered crops due within one time unit.
    pub nearly_ready: usize,
}

/// Per-state slot counts, used for status readouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SlotCounts {
    pub empty: usize,
    pub planted: usize,
    pub growing: usize,
    pub ready: usize,
    pub harvested: usize,
}

impl SlotCounts {
    /// Crops still in the ground and not yet harvested.
    pub fn active(&self) -> usize {
        self.planted + self.growing + self.ready
    }

    pub fn pending(&self) -> usize {
        self.planted + self.growing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    pub owner: OwnerId,
    slots: Vec<Option<CropInstance>>,
    pub last_observed_at: Timestamp,
    pub total_harvests: u64,
}

impl Farm {
    pub fn new(owner: OwnerId, slot_count: usize, now: Timestamp) -> Self {
        Self {
            owner,
            slots: vec![None; slot_count],
            last_observed_at: now,
            total_harvests: 0,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<CropInstance>] {
        &self.slots
    }

    pub fn validate_slot(&self, slot: usize) -> Result<(), FarmError> {
        if slot < self.slots.len() {
            Ok(())
        } else {
            Err(FarmError::InvalidSlot {
                slot,
                slot_count: self.slots.len(),
            })
        }
    }

    pub fn slot(&self, slot: usize) -> Result<Option<&CropInstance>, FarmError> {
        self.validate_slot(slot)?;
        Ok(self.slots[slot].as_ref())
    }

    pub(crate) fn slot_mut(&mut self, slot: usize) -> Option<&mut CropInstance> {
        self.slots.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn crops(&self) -> impl Iterator<Item = (usize, &CropInstance)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|c| (i, c)))
    }

    pub fn counts(&self) -> SlotCounts {
        let mut counts = SlotCounts::default();
        for slot in &self.slots {
            match slot.as_ref().map(|c| c.state) {
                None => counts.empty += 1,
                Some(CropState::Planted) => counts.planted += 1,
                Some(CropState::Growing) => counts.growing += 1,
                Some(CropState::Ready) => counts.ready += 1,
                Some(CropState::Harvested) => counts.harvested += 1,
            }
        }
        counts
    }

    /// Pick the slot a new crop goes into without changing anything.
    /// With no slot given, the first empty slot is used.
    pub fn reserve(&self, slot: Option<usize>, capacity: usize) -> Result<usize, FarmError> {
        if let Some(slot) = slot {
            self.validate_slot(slot)?;
        }
        if self.counts().active() >= capacity {
            return Err(FarmError::FarmFull { capacity });
        }
        match slot {
            Some(slot) if self.slots[slot].is_some() => Err(FarmError::SlotOccupied { slot }),
            Some(slot) => Ok(slot),
            None => self
                .slots
                .iter()
                .position(Option::is_none)
                .ok_or(FarmError::FarmFull {
                    capacity: self.slots.len(),
                }),
        }
    }

    /// Put a crop into a slot previously returned by `reserve`.
    pub(crate) fn place(&mut self, slot: usize, crop: CropInstance) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(crop);
        }
    }

    pub fn water(
        &mut self,
        target: &SlotTarget,
        now: Timestamp,
        nearly_window: Duration,
    ) -> Result<WaterReport, FarmError> {
        if let SlotTarget::Slot(slot) = target {
            match self.slot(*slot)? {
                None => return Err(FarmError::NoCrops { crop: None }),
                Some(crop) if !crop.is_pending() => {
                    return Err(FarmError::NotWaterable {
                        slot: *slot,
                        state: crop.state,
                    })
                }
                Some(_) => {}
            }
        }

        let mut report = WaterReport::default();
        for (index, entry) in self.slots.iter_mut().enumerate() {
            let Some(crop) = entry.as_mut() else {
                continue;
            };
            if !target.matches(index, crop) || crop.water(now).is_err() {
                continue;
            }
            report.watered.push(index);
            if crop.is_nearly_ready(now, nearly_window) {
                report.nearly_ready += 1;
            }
        }

        if report.watered.is_empty() {
            return Err(FarmError::NoCrops {
                crop: target.crop_filter().cloned(),
            });
        }
        Ok(report)
    }

    /// Ripen every pending crop whose timer has elapsed at `now`.
    /// Returns the slots that changed; calling it twice changes nothing.
    pub fn check_growth(&mut self, now: Timestamp) -> Vec<usize> {
        let mut ripened = Vec::new();
        for (index, entry) in self.slots.iter_mut().enumerate() {
            if let Some(crop) = entry.as_mut() {
                if crop.advance(now) {
                    ripened.push(index);
                }
            }
        }
        ripened
    }

    /// Ready slots selected by `target`, or the reason there are none.
    pub fn harvestable(&self, target: &SlotTarget) -> Result<Vec<usize>, FarmError> {
        if let SlotTarget::Slot(slot) = target {
            return match self.slot(*slot)? {
                Some(crop) if crop.is_ready() => Ok(vec![*slot]),
                Some(crop) if crop.is_pending() => Err(FarmError::NotReady {
                    reason: NotReadyReason::StillGrowing { count: 1 },
                }),
                _ => Err(FarmError::NoCrops { crop: None }),
            };
        }

        let live: Vec<(usize, &CropInstance)> = self
            .crops()
            .filter(|(_, crop)| crop.state != CropState::Harvested)
            .collect();
        if live.is_empty() {
            return Err(FarmError::NoCrops { crop: None });
        }

        let matching: Vec<&(usize, &CropInstance)> = live
            .iter()
            .filter(|(index, crop)| target.matches(*index, crop))
            .collect();
        let ready: Vec<usize> = matching
            .iter()
            .filter(|(_, crop)| crop.is_ready())
            .map(|(index, _)| *index)
            .collect();
        if !ready.is_empty() {
            return Ok(ready);
        }

        let reason = if matching.is_empty() {
            NotReadyReason::NeverPlanted
        } else {
            NotReadyReason::StillGrowing {
                count: matching.len(),
            }
        };
        Err(FarmError::NotReady { reason })
    }

    /// Harvest one Ready slot. Returns the crop id, or None if the slot
    /// was not Ready.
    pub(crate) fn take_harvest(
        &mut self,
        slot: usize,
        now: Timestamp,
        mode: HarvestMode,
    ) -> Option<CropId> {
        let entry = self.slots.get_mut(slot)?;
        let crop = entry.as_mut()?;
        if !crop.harvest(now) {
            return None;
        }
        let crop_id = crop.crop_id.clone();
        if mode == HarvestMode::AutoClear {
            *entry = None;
        }
        self.total_harvests += 1;
        Some(crop_id)
    }

    /// Empty Harvested slots. Returns how many were cleared.
    pub fn clear(&mut self, target: &ClearTarget) -> Result<usize, FarmError> {
        let is_harvested =
            |entry: &Option<CropInstance>| matches!(entry, Some(c) if c.state == CropState::Harvested);
        match target {
            ClearTarget::Slot(slot) => {
                self.validate_slot(*slot)?;
                if is_harvested(&self.slots[*slot]) {
                    self.slots[*slot] = None;
                    Ok(1)
                } else {
                    Ok(0)
                }
            }
            ClearTarget::AllHarvested => {
                let mut cleared = 0;
                for entry in self.slots.iter_mut() {
                    if is_harvested(entry) {
                        *entry = None;
                        cleared += 1;
                    }
                }
                Ok(cleared)
            }
        }
    }

    /// Earliest pending ready time, for "next crop in ..." readouts.
    pub fn next_ready_at(&self) -> Option<Timestamp> {
        self.crops()
            .filter(|(_, c)| c.is_pending())
            .map(|(_, c)| c.ready_at)
            .min()
    }
}
