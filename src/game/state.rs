//! Game State
//!
//! One player's simulation: resource balance, owned item counts, the derived
//! production rate, and the accrual/purchase transitions over them.
//!
//! The balance is held as an `f64` so fractional per-second production
//! accumulates correctly; everything player-visible goes through
//! [`Game::display_balance`], which truncates to a whole number.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};

use crate::game::catalog::{Catalog, ItemKind};
use crate::COST_GROWTH_RATIO;

// =============================================================================
// OWNER ID
// =============================================================================

/// Opaque stable player identifier, the unique key in the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(pub u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// PLAYER HANDLE
// =============================================================================

/// Reference to the player's view in the external presentation layer.
///
/// The engine stores and forwards this; it never interprets it. The resend
/// path replaces it wholesale, nothing else touches it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerHandle {
    /// Player-facing name, used on the leaderboard.
    pub display_name: String,
    /// Identifier of the player's game message/view.
    pub message_id: u64,
}

// =============================================================================
// GAME
// =============================================================================

/// Errors from game state transitions.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GameError {
    /// Purchase cost exceeds the current balance. The game is unchanged.
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds {
        /// Total cost of the rejected purchase.
        needed: u64,
        /// Balance at the time of the request.
        available: u64,
    },
}

/// One player's game.
#[derive(Debug, Clone)]
pub struct Game {
    owner: OwnerId,
    handle: PlayerHandle,
    balance: f64,
    owned: BTreeMap<ItemKind, u64>,
    rate: f64,
    created_at: DateTime<Utc>,
    last_accrual_at: DateTime<Utc>,
}

impl Game {
    /// Start a fresh game: zero balance, nothing owned.
    pub fn new(owner: OwnerId, handle: PlayerHandle, now: DateTime<Utc>) -> Game {
        Game {
            owner,
            handle,
            balance: 0.0,
            owned: ItemKind::ALL.into_iter().map(|k| (k, 0)).collect(),
            rate: 0.0,
            created_at: now,
            last_accrual_at: now,
        }
    }

    /// Rebuild a game from persisted parts. Counts for kinds absent from
    /// `owned` default to zero; the production rate is recomputed from the
    /// catalog rather than trusted from storage.
    pub fn from_parts(
        catalog: &Catalog,
        owner: OwnerId,
        handle: PlayerHandle,
        balance: f64,
        owned: BTreeMap<ItemKind, u64>,
        created_at: DateTime<Utc>,
        last_accrual_at: DateTime<Utc>,
    ) -> Game {
        let owned: BTreeMap<ItemKind, u64> = ItemKind::ALL
            .into_iter()
            .map(|k| (k, owned.get(&k).copied().unwrap_or(0)))
            .collect();
        let rate = production_rate(catalog, &owned);
        Game {
            owner,
            handle,
            balance: balance.max(0.0),
            owned,
            rate,
            created_at,
            last_accrual_at,
        }
    }

    /// The registry key this game belongs to.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// The stored presentation handle.
    pub fn handle(&self) -> &PlayerHandle {
        &self.handle
    }

    /// Replace the presentation handle (the resend path). Game state is
    /// untouched.
    pub fn set_handle(&mut self, handle: PlayerHandle) {
        self.handle = handle;
    }

    /// When this game was first created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When accrual last advanced.
    pub fn last_accrual_at(&self) -> DateTime<Utc> {
        self.last_accrual_at
    }

    /// Exact internal balance, fraction included.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// The externally visible resource count: the balance truncated to a
    /// whole number. All affordability checks use this value.
    pub fn display_balance(&self) -> u64 {
        self.balance.floor() as u64
    }

    /// Cached production rate in resource units per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// How many units of `kind` this game owns.
    pub fn owned_count(&self, kind: ItemKind) -> u64 {
        self.owned.get(&kind).copied().unwrap_or(0)
    }

    /// All owned counts, every kind present.
    pub fn owned(&self) -> &BTreeMap<ItemKind, u64> {
        &self.owned
    }

    /// Total price of the next `quantity` units of `kind`.
    ///
    /// The n-th unit of a kind costs `base * r^(n-1)` with `r = 1.1`; summing
    /// that series and taking ceilings of the two cumulative totals keeps
    /// rounding from compounding across large purchases:
    ///
    /// ```text
    /// cost = ceil(base * r^(owned+quantity) / (r-1)) - ceil(base * r^owned / (r-1))
    /// ```
    ///
    /// `quantity == 0` always costs 0.
    pub fn cost(&self, catalog: &Catalog, kind: ItemKind, quantity: u64) -> u64 {
        let base = catalog.lookup(kind).base_price as f64;
        let owned = self.owned_count(kind);
        let cumulative =
            |n: u64| (base * COST_GROWTH_RATIO.powf(n as f64) / (COST_GROWTH_RATIO - 1.0)).ceil();
        (cumulative(owned + quantity) - cumulative(owned)) as u64
    }

    /// Largest `q <= requested` whose cost fits the current balance.
    ///
    /// Walks down from `requested` one step at a time: the discrete cost
    /// curve has no closed-form inverse that agrees with the per-quantity
    /// ceilings, so anything cleverer risks disagreeing with [`Game::cost`].
    /// Never returns below 0 (a zero-quantity purchase is free).
    pub fn affordable_quantity(&self, catalog: &Catalog, kind: ItemKind, requested: u64) -> u64 {
        let balance = self.display_balance();
        let mut quantity = requested;
        while quantity > 0 && self.cost(catalog, kind, quantity) > balance {
            quantity -= 1;
        }
        quantity
    }

    /// Buy `quantity` units of `kind`.
    ///
    /// On success the cost is deducted, the owned count incremented, and the
    /// production rate recomputed; the total cost paid is returned. On
    /// [`GameError::InsufficientFunds`] the game is left exactly as it was.
    /// `quantity == 0` trivially succeeds at cost 0.
    pub fn purchase(
        &mut self,
        catalog: &Catalog,
        kind: ItemKind,
        quantity: u64,
    ) -> Result<u64, GameError> {
        let cost = self.cost(catalog, kind, quantity);
        if self.display_balance() < cost {
            return Err(GameError::InsufficientFunds {
                needed: cost,
                available: self.display_balance(),
            });
        }

        self.balance -= cost as f64;
        *self.owned.entry(kind).or_insert(0) += quantity;
        self.rate = production_rate(catalog, &self.owned);
        Ok(cost)
    }

    /// A direct player click: exactly one resource unit, no time involved.
    pub fn manual_increment(&mut self) {
        self.balance += 1.0;
    }

    /// Advance passive production up to `now`.
    ///
    /// Elapsed time is truncated to whole seconds and `last_accrual_at` only
    /// advances by the truncated amount, so the sub-second remainder is
    /// carried into the next call. Calling twice within the same second is a
    /// no-op the second time, as is any `now` at or before `last_accrual_at`.
    pub fn accrue(&mut self, now: DateTime<Utc>) {
        let dt = (now - self.last_accrual_at).num_seconds();
        if dt <= 0 {
            return;
        }
        self.balance += self.rate * dt as f64;
        self.last_accrual_at += Duration::seconds(dt);
    }

    #[cfg(test)]
    pub(crate) fn set_balance_for_test(&mut self, balance: f64) {
        self.balance = balance;
    }
}

/// Catalog-weighted sum of owned counts: no per-kind special cases.
fn production_rate(catalog: &Catalog, owned: &BTreeMap<ItemKind, u64>) -> f64 {
    catalog
        .kinds()
        .map(|kind| catalog.lookup(kind).rate * owned.get(&kind).copied().unwrap_or(0) as f64)
        .sum()
}
