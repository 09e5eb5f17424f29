//! Per-owner homestead storage with one lock per farm.

use bevy::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use super::{FarmContext, Homestead};
use crate::save::{load_or_default, SaveStore};
use crate::shared::*;

type SharedHomestead = Arc<Mutex<Homestead>>;

/// Every loaded homestead, keyed by owner.
///
/// Each farm sits behind its own mutex, so operations on different owners
/// run in parallel and operations on one owner are serialized. A farm not
/// yet in memory is loaded from the save store on first access, or
/// created fresh.
#[derive(Resource, Default)]
pub struct FarmRepository {
    farms: RwLock<HashMap<OwnerId, SharedHomestead>>,
    store: Option<Arc<dyn SaveStore>>,
}

fn lock(farm: &Mutex<Homestead>) -> MutexGuard<'_, Homestead> {
    farm.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FarmRepository {
    pub fn with_store(store: Arc<dyn SaveStore>) -> Self {
        Self {
            farms: RwLock::default(),
            store: Some(store),
        }
    }

    pub fn store(&self) -> Option<&Arc<dyn SaveStore>> {
        self.store.as_ref()
    }

    pub fn get(&self, owner: &OwnerId) -> Option<SharedHomestead> {
        self.farms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner)
            .cloned()
    }

    /// The owner's homestead, loading or creating it on first access.
    pub fn get_or_create(
        &self,
        owner: &OwnerId,
        ctx: FarmContext<'_>,
        now: Timestamp,
    ) -> SharedHomestead {
        if let Some(farm) = self.get(owner) {
            return farm;
        }
        // Store I/O happens outside the map lock; a racing loader for the
        // same owner loses and its copy is dropped.
        let loaded = Arc::new(Mutex::new(self.load_or_new(owner, ctx, now)));
        let mut farms = self.farms.write().unwrap_or_else(PoisonError::into_inner);
        farms.entry(owner.clone()).or_insert(loaded).clone()
    }

    fn load_or_new(&self, owner: &OwnerId, ctx: FarmContext<'_>, now: Timestamp) -> Homestead {
        match &self.store {
            Some(store) => load_or_default(store.as_ref(), owner, ctx, now),
            None => {
                info!("[Farming] New farm for {owner}");
                Homestead::new(owner.clone(), ctx, now)
            }
        }
    }

    /// Run `f` with the owner's homestead locked.
    pub fn with_farm<R>(
        &self,
        owner: &OwnerId,
        ctx: FarmContext<'_>,
        now: Timestamp,
        f: impl FnOnce(&mut Homestead) -> R,
    ) -> R {
        let farm = self.get_or_create(owner, ctx, now);
        let mut guard = lock(&farm);
        f(&mut guard)
    }

    /// Replace whatever is loaded for this owner.
    pub fn insert(&self, homestead: Homestead) {
        let owner = homestead.owner().clone();
        self.farms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner, Arc::new(Mutex::new(homestead)));
    }

    pub fn remove(&self, owner: &OwnerId) -> Option<SharedHomestead> {
        self.farms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(owner)
    }

    pub fn owners(&self) -> Vec<OwnerId> {
        let mut owners: Vec<OwnerId> = self
            .farms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        owners.sort();
        owners
    }

    pub fn len(&self) -> usize {
        self.farms.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot_handles(&self) -> Vec<(OwnerId, SharedHomestead)> {
        self.farms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(owner, farm)| (owner.clone(), farm.clone()))
            .collect()
    }

    /// Bring every loaded farm up to `now`. Returns the slots that
    /// ripened, per owner, skipping owners where nothing changed.
    pub fn catch_up_all(&self, now: Timestamp) -> Vec<(OwnerId, Vec<usize>)> {
        self.snapshot_handles()
            .into_iter()
            .filter_map(|(owner, farm)| {
                let ripened = lock(&farm).check_growth(now);
                (!ripened.is_empty()).then_some((owner, ripened))
            })
            .collect()
    }

    /// Advance one owner's farm by `elapsed` in a single jump, never past
    /// `now`.
    pub fn reconcile(
        &self,
        owner: &OwnerId,
        elapsed: Duration,
        now: Timestamp,
    ) -> Option<Vec<usize>> {
        self.get(owner).map(|farm| lock(&farm).reconcile(elapsed, now))
    }

    /// Advance every loaded farm by `elapsed`, never past `now`.
    pub fn reconcile_all(&self, elapsed: Duration, now: Timestamp) -> Vec<(OwnerId, Vec<usize>)> {
        self.snapshot_handles()
            .into_iter()
            .filter_map(|(owner, farm)| {
                let ripened = lock(&farm).reconcile(elapsed, now);
                (!ripened.is_empty()).then_some((owner, ripened))
            })
            .collect()
    }

    /// Read-only visit of every loaded farm, one lock at a time.
    pub fn for_each(&self, mut f: impl FnMut(&Homestead)) {
        for (_, farm) in self.snapshot_handles() {
            f(&lock(&farm));
        }
    }
}
