//! A single planted crop and its timing rules.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::shared::*;

/// One crop in one slot. `ready_at` is fixed when the crop is planted and
/// nothing afterwards moves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropInstance {
    pub crop_id: CropId,
    pub state: CropState,
    pub planted_at: Timestamp,
    pub watered_at: Option<Timestamp>,
    pub ready_at: Timestamp,
    #[serde(default)]
    pub harvested_at: Option<Timestamp>,
}

impl CropInstance {
    pub fn new(crop_id: impl Into<CropId>, now: Timestamp, growth: Duration) -> Self {
        Self {
            crop_id: crop_id.into(),
            state: CropState::Planted,
            planted_at: now,
            watered_at: None,
            ready_at: now.plus(growth),
            harvested_at: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == CropState::Ready
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Still waiting and due within `window` of `now`.
    pub fn is_nearly_ready(&self, now: Timestamp, window: Duration) -> bool {
        self.is_pending() && self.ready_at <= now.plus(window)
    }

    /// Time left until ready, zero once due.
    pub fn remaining(&self, now: Timestamp) -> Duration {
        self.ready_at.saturating_since(now)
    }

    /// Mark watered. Only Planted or Growing crops take water.
    pub fn water(&mut self, now: Timestamp) -> Result<(), CropState> {
        if !self.is_pending() {
            return Err(self.state);
        }
        self.watered_at = Some(now);
        self.state = CropState::Growing;
        Ok(())
    }

    /// Move to Ready if the timer has elapsed. Returns true on the
    /// transition, false if nothing changed.
    pub fn advance(&mut self, now: Timestamp) -> bool {
        if self.is_pending() && now >= self.ready_at {
            self.state = CropState::Ready;
            true
        } else {
            false
        }
    }

    /// Mark harvested. Returns false unless the crop was Ready.
    pub fn harvest(&mut self, now: Timestamp) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.state = CropState::Harvested;
        self.harvested_at = Some(now);
        true
    }
}
