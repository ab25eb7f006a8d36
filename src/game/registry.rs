//! Game Registry
//!
//! The shared map of all active games, keyed by owner. The map itself sits
//! behind an `RwLock` taken only for structural changes (create, remove) and
//! to snapshot the membership; each game sits behind its own `Mutex`, so a
//! purchase and a concurrent tick never interleave on the same game while
//! unrelated owners proceed in parallel.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::game::state::{Game, OwnerId, PlayerHandle};

/// Registry errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// A game already exists for this owner.
    #[error("owner {0} already has a game")]
    AlreadyExists(OwnerId),

    /// No game exists for this owner.
    #[error("owner {0} has no game")]
    NotFound(OwnerId),
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: u32,
    /// Owner of the ranked game.
    pub owner: OwnerId,
    /// Player-facing name from the stored handle.
    pub display_name: String,
    /// Display balance at snapshot time.
    pub balance: u64,
}

impl LeaderboardEntry {
    /// Balance with thousands separators, e.g. `1,234,567`.
    pub fn formatted_balance(&self) -> String {
        format_thousands(self.balance)
    }
}

/// Render `n` with `,` thousands separators.
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// The concurrency-safe collection of all active games.
#[derive(Debug, Default)]
pub struct Registry {
    games: RwLock<BTreeMap<OwnerId, Arc<Mutex<Game>>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Start a new game for `owner`.
    pub async fn create(
        &self,
        owner: OwnerId,
        handle: PlayerHandle,
        now: DateTime<Utc>,
    ) -> Result<Arc<Mutex<Game>>, RegistryError> {
        let mut games = self.games.write().await;
        if games.contains_key(&owner) {
            return Err(RegistryError::AlreadyExists(owner));
        }
        let game = Arc::new(Mutex::new(Game::new(owner, handle, now)));
        games.insert(owner, Arc::clone(&game));
        Ok(game)
    }

    /// Insert an already-built game (snapshot restore). Replaces any
    /// existing entry for the same owner.
    pub async fn insert(&self, game: Game) {
        let mut games = self.games.write().await;
        games.insert(game.owner(), Arc::new(Mutex::new(game)));
    }

    /// Look up the game for `owner`.
    ///
    /// The returned handle outlives the map lock: callers lock the game
    /// itself for the duration of their mutation, and a concurrent `remove`
    /// only unlinks the entry without disturbing them.
    pub async fn get(&self, owner: OwnerId) -> Result<Arc<Mutex<Game>>, RegistryError> {
        let games = self.games.read().await;
        games
            .get(&owner)
            .cloned()
            .ok_or(RegistryError::NotFound(owner))
    }

    /// Remove the game for `owner`.
    pub async fn remove(&self, owner: OwnerId) -> Result<(), RegistryError> {
        let mut games = self.games.write().await;
        games
            .remove(&owner)
            .map(|_| ())
            .ok_or(RegistryError::NotFound(owner))
    }

    /// Whether `owner` has a game.
    pub async fn contains(&self, owner: OwnerId) -> bool {
        self.games.read().await.contains_key(&owner)
    }

    /// Number of active games.
    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    /// Whether there are no active games.
    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }

    /// Visit every game once, in owner order.
    ///
    /// The membership is snapshotted up front and the map lock released
    /// before any game is locked: games created or removed mid-pass are
    /// picked up (or dropped) on the next pass, and the visitor holds only
    /// one per-game lock at a time.
    pub async fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&mut Game),
    {
        for game in self.snapshot_members().await {
            let mut game = game.lock().await;
            visit(&mut game);
        }
    }

    /// Top games by display balance.
    ///
    /// Descending by balance, ties broken by ascending owner id so repeated
    /// calls over unchanged state always agree; at most `limit` rows, ranks
    /// starting at 1.
    pub async fn ranked_snapshot(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let mut rows = Vec::new();
        for game in self.snapshot_members().await {
            let game = game.lock().await;
            rows.push((game.owner(), game.handle().display_name.clone(), game.display_balance()));
        }

        rows.sort_by_key(|(owner, _, balance)| (std::cmp::Reverse(*balance), *owner));
        rows.truncate(limit);

        rows.into_iter()
            .enumerate()
            .map(|(i, (owner, display_name, balance))| LeaderboardEntry {
                rank: i as u32 + 1,
                owner,
                display_name,
                balance,
            })
            .collect()
    }

    /// Clone out the current membership under a short read lock.
    async fn snapshot_members(&self) -> Vec<Arc<Mutex<Game>>> {
        let games = self.games.read().await;
        games.values().cloned().collect()
    }
}
