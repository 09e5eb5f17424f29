//! Per-player resource ledger: coins, experience, and the derived level.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::levels::{LevelBenefit, LevelTable, XpProgress};
use crate::shared::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Add,
    Spend,
}

/// Diagnostic record of one ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub resource: ResourceKind,
    pub amount: u64,
    /// Source for additions, purpose for spending.
    pub note: String,
    pub at: Timestamp,
    pub balance_after: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelUp {
    pub level: u32,
    pub benefit: Option<LevelBenefit>,
}

/// Result of an `add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerChange {
    pub kind: ResourceKind,
    pub amount: u64,
    pub balance: u64,
    /// Levels gained by this change, lowest first.
    pub level_ups: Vec<LevelUp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLedger {
    pub coins: u64,
    pub experience: u64,
    level: u32,
    pub total_harvests: u64,
    pub total_spent: u64,
    pub total_earned: u64,
    history: VecDeque<Transaction>,
    history_cap: usize,
    #[serde(skip)]
    table: LevelTable,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new(STARTING_COINS, TRANSACTION_HISTORY_CAP)
    }
}

impl ResourceLedger {
    pub fn new(starting_coins: u64, history_cap: usize) -> Self {
        Self {
            coins: starting_coins,
            experience: 0,
            level: 1,
            total_harvests: 0,
            total_spent: 0,
            total_earned: 0,
            history: VecDeque::new(),
            history_cap,
            table: LevelTable::default(),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn get(&self, kind: ResourceKind) -> u64 {
        match kind {
            ResourceKind::Coins => self.coins,
            ResourceKind::Experience => self.experience,
            ResourceKind::Level => u64::from(self.level),
        }
    }

    pub fn can_afford(&self, kind: ResourceKind, amount: u64) -> bool {
        self.get(kind) >= amount
    }

    /// Add coins or experience. Experience recomputes the level, and every
    /// level gained applies its benefit once, lowest level first.
    pub fn add(
        &mut self,
        kind: ResourceKind,
        amount: u64,
        source: &str,
        now: Timestamp,
    ) -> Result<LedgerChange, FarmError> {
        if amount == 0 {
            return Err(FarmError::InvalidAmount { kind });
        }
        let balance = match kind {
            ResourceKind::Coins => {
                self.coins = self.coins.saturating_add(amount);
                self.total_earned = self.total_earned.saturating_add(amount);
                self.coins
            }
            ResourceKind::Experience => {
                self.experience = self.experience.saturating_add(amount);
                self.experience
            }
            ResourceKind::Level => return Err(FarmError::DerivedResource { kind }),
        };
        self.record(TransactionKind::Add, kind, amount, source, now, balance);

        let level_ups = if kind == ResourceKind::Experience {
            self.apply_level_ups(now)
        } else {
            Vec::new()
        };

        Ok(LedgerChange {
            kind,
            amount,
            balance: self.get(kind),
            level_ups,
        })
    }

    /// Spend coins. Leaves the ledger untouched on any error.
    pub fn spend(
        &mut self,
        kind: ResourceKind,
        amount: u64,
        purpose: &str,
        now: Timestamp,
    ) -> Result<u64, FarmError> {
        if amount == 0 {
            return Err(FarmError::InvalidAmount { kind });
        }
        if kind != ResourceKind::Coins {
            return Err(FarmError::DerivedResource { kind });
        }
        if self.coins < amount {
            return Err(FarmError::InsufficientFunds {
                kind,
                needed: amount,
                available: self.coins,
            });
        }
        self.coins -= amount;
        self.total_spent = self.total_spent.saturating_add(amount);
        self.record(TransactionKind::Spend, kind, amount, purpose, now, self.coins);
        Ok(self.coins)
    }

    fn apply_level_ups(&mut self, now: Timestamp) -> Vec<LevelUp> {
        let new_level = self.table.level_for(self.experience);
        let mut level_ups = Vec::new();
        while self.level < new_level {
            self.level += 1;
            let benefit = LevelBenefit::for_level(self.level);
            if let Some(LevelBenefit::BonusCoins { amount }) = benefit {
                let source = format!("level_{}_bonus", self.level);
                self.coins = self.coins.saturating_add(amount);
                self.total_earned = self.total_earned.saturating_add(amount);
                self.record(
                    TransactionKind::Add,
                    ResourceKind::Coins,
                    amount,
                    &source,
                    now,
                    self.coins,
                );
            }
            info!(
                "[Economy] Level up! Now level {}{}",
                self.level,
                benefit
                    .map(|b| format!(" ({})", b.message()))
                    .unwrap_or_default()
            );
            level_ups.push(LevelUp {
                level: self.level,
                benefit,
            });
        }
        level_ups
    }

    fn record(
        &mut self,
        kind: TransactionKind,
        resource: ResourceKind,
        amount: u64,
        note: &str,
        at: Timestamp,
        balance_after: u64,
    ) {
        self.history.push_front(Transaction {
            kind,
            resource,
            amount,
            note: note.to_string(),
            at,
            balance_after,
        });
        self.history.truncate(self.history_cap);
    }

    /// Most recent transactions, newest first.
    pub fn history(&self, limit: usize) -> Vec<&Transaction> {
        self.history.iter().take(limit).collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn xp_progress(&self) -> XpProgress {
        self.table.progress(self.experience)
    }

    pub fn xp_to_next_level(&self) -> Option<u64> {
        self.table.xp_to_next(self.experience)
    }

    pub fn next_level_benefit(&self) -> Option<(u32, LevelBenefit)> {
        LevelBenefit::next_after(self.level)
    }

    /// Growth-time percentage granted by levels reached so far.
    pub fn growth_percent(&self) -> u32 {
        (2..=self.level)
            .filter_map(|l| match LevelBenefit::for_level(l) {
                Some(LevelBenefit::GrowthBoost { percent }) => Some(percent),
                _ => None,
            })
            .min()
            .unwrap_or(100)
    }

    pub fn net_profit(&self) -> i64 {
        let earned = i64::try_from(self.total_earned).unwrap_or(i64::MAX);
        let spent = i64::try_from(self.total_spent).unwrap_or(i64::MAX);
        earned.saturating_sub(spent)
    }

    /// Earned as a percentage of spent.
    pub fn efficiency(&self) -> u64 {
        if self.total_spent == 0 {
            return if self.total_earned > 0 { 100 } else { 0 };
        }
        self.total_earned.saturating_mul(100) / self.total_spent
    }

    /// Recompute the level from experience after loading saved data.
    /// Benefits are not re-applied.
    pub fn normalize(&mut self, history_cap: usize) {
        self.history_cap = history_cap;
        self.history.truncate(history_cap);
        let level = self.table.level_for(self.experience);
        if level != self.level {
            warn!(
                "[Economy] Saved level {} does not match {} XP; using level {}",
                self.level, self.experience, level
            );
            self.level = level;
        }
    }

    pub fn reset(&mut self, starting_coins: u64) {
        *self = Self::new(starting_coins, self.history_cap);
    }
}
