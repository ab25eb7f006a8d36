//! Snapshot Codec
//!
//! Serializes the registry to the save-file record format and rebuilds it on
//! startup, applying one catch-up accrual per game to cover the wall-clock
//! time elapsed since the snapshot was written.
//!
//! File shape (see `store.rs` for the I/O):
//!
//! ```json
//! {
//!   "games": {
//!     "<ownerId>": {
//!       "message-id": 123, "display-name": "player",
//!       "time-started": 1700000000000, "sweets": 41.5,
//!       "cursor": 3, "grandma": 1, ...
//!     }
//!   },
//!   "last-saved": 1700000300000
//! }
//! ```
//!
//! An empty object `{}` is a valid file: no games, never saved. A file
//! without `last-saved` carries no usable snapshot time, so its entries are
//! skipped rather than caught up from an unknown instant.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::game::catalog::{Catalog, ItemKind};
use crate::game::registry::Registry;
use crate::game::state::{Game, OwnerId, PlayerHandle};

// =============================================================================
// RECORD TYPES
// =============================================================================

/// Persisted form of one game.
///
/// Owned counts are flattened into the record under each kind's storage name
/// ("cursor", "alchemy lab", ...). The balance is rounded to one decimal on
/// write: display truncates to whole units anyway, and one decimal keeps the
/// first catch-up accrual after a reload close enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Stored presentation handle: message/view id.
    #[serde(rename = "message-id")]
    pub message_id: u64,
    /// Stored presentation handle: display name.
    #[serde(rename = "display-name")]
    pub display_name: String,
    /// Game creation time, epoch milliseconds.
    #[serde(rename = "time-started")]
    pub time_started: i64,
    /// Balance rounded to one decimal place.
    pub sweets: f64,
    /// Owned counts keyed by kind storage name.
    #[serde(flatten)]
    pub counts: BTreeMap<String, u64>,
}

impl GameRecord {
    /// Capture a game as a record.
    pub fn from_game(game: &Game) -> GameRecord {
        GameRecord {
            message_id: game.handle().message_id,
            display_name: game.handle().display_name.clone(),
            time_started: game.created_at().timestamp_millis(),
            sweets: (game.balance() * 10.0).round() / 10.0,
            counts: game
                .owned()
                .iter()
                .map(|(kind, count)| (kind.storage_name().to_string(), *count))
                .collect(),
        }
    }

    /// Owned counts as kinds. Names outside the catalog are ignored; kinds
    /// missing from the record count as zero.
    pub fn owned_counts(&self) -> BTreeMap<ItemKind, u64> {
        ItemKind::ALL
            .into_iter()
            .map(|kind| {
                let count = self
                    .counts
                    .get(kind.storage_name())
                    .copied()
                    .unwrap_or(0);
                (kind, count)
            })
            .collect()
    }
}

/// The whole persisted registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    /// One record per game, keyed by owner id rendered as a decimal string.
    #[serde(default)]
    pub games: BTreeMap<String, GameRecord>,
    /// When the snapshot was taken, epoch milliseconds. Absent until the
    /// first save ever completes.
    #[serde(rename = "last-saved", default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<i64>,
}

// =============================================================================
// IDENTITY RESOLUTION
// =============================================================================

/// Failure to resolve one stored owner back to a live handle.
#[derive(Debug, Clone, thiserror::Error)]
#[error("identity resolution failed for owner {owner}: {reason}")]
pub struct IdentityError {
    /// The owner whose entry could not be resolved.
    pub owner: OwnerId,
    /// Human-readable cause.
    pub reason: String,
}

/// Maps a stored owner id and handle back to a live presentation handle on
/// load.
///
/// Failure is per-entry: the loader logs it, drops that entry, and carries
/// on with the rest of the file.
pub trait IdentityResolver: Send + Sync {
    /// Produce a live handle for `owner`, given the handle as it was stored.
    fn resolve(&self, owner: OwnerId, stored: &PlayerHandle) -> Result<PlayerHandle, IdentityError>;
}

/// Resolver that trusts the stored handle as-is. Used when the engine runs
/// without a live presentation backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoredHandleResolver;

impl IdentityResolver for StoredHandleResolver {
    fn resolve(
        &self,
        _owner: OwnerId,
        stored: &PlayerHandle,
    ) -> Result<PlayerHandle, IdentityError> {
        Ok(stored.clone())
    }
}

// =============================================================================
// SNAPSHOT / RESTORE
// =============================================================================

/// Capture the registry as a save file stamped `now`.
///
/// Games are visited one at a time; nothing holds more than one per-game
/// lock, so mutations racing the pass land in either this snapshot or the
/// next one. Both outcomes are corrected by catch-up on the next load.
pub async fn snapshot(registry: &Registry, now: DateTime<Utc>) -> SaveFile {
    let mut games = BTreeMap::new();
    registry
        .for_each(|game| {
            games.insert(game.owner().to_string(), GameRecord::from_game(game));
        })
        .await;

    SaveFile {
        games,
        last_saved: Some(now.timestamp_millis()),
    }
}

/// Rebuild games from a save file, caught up to `now`.
///
/// Per entry: parse the owner key, resolve the stored handle, rebuild the
/// counts, recompute the production rate from the catalog, then run exactly
/// one accrual from the snapshot time to `now`. Any per-entry failure is
/// logged and that entry skipped; it never aborts the rest of the file.
pub fn restore_games(
    save: &SaveFile,
    catalog: &Catalog,
    resolver: &dyn IdentityResolver,
    now: DateTime<Utc>,
) -> Vec<Game> {
    let Some(saved_ms) = save.last_saved else {
        if !save.games.is_empty() {
            warn!(
                entries = save.games.len(),
                "save file has games but no last-saved stamp; skipping all entries"
            );
        }
        return Vec::new();
    };

    let Some(saved_at) = Utc.timestamp_millis_opt(saved_ms).single() else {
        warn!(last_saved = saved_ms, "save file has unreadable last-saved stamp");
        return Vec::new();
    };

    let mut games = Vec::with_capacity(save.games.len());
    for (key, record) in &save.games {
        let Ok(raw) = key.parse::<u64>() else {
            warn!(key = %key, "skipping save entry with malformed owner id");
            continue;
        };
        let owner = OwnerId(raw);

        let stored = PlayerHandle {
            display_name: record.display_name.clone(),
            message_id: record.message_id,
        };
        let handle = match resolver.resolve(owner, &stored) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(%owner, error = %err, "skipping save entry: identity resolution failed");
                continue;
            }
        };

        let created_at = Utc
            .timestamp_millis_opt(record.time_started)
            .single()
            .unwrap_or(saved_at);

        let mut game = Game::from_parts(
            catalog,
            owner,
            handle,
            record.sweets,
            record.owned_counts(),
            created_at,
            saved_at,
        );
        game.accrue(now);
        games.push(game);
    }

    info!(
        restored = games.len(),
        skipped = save.games.len() - games.len(),
        "restored games from snapshot"
    );
    games
}

/// Rebuild a whole registry from a save file, caught up to `now`.
pub async fn restore(
    save: &SaveFile,
    catalog: &Catalog,
    resolver: &dyn IdentityResolver,
    now: DateTime<Utc>,
) -> Registry {
    let registry = Registry::new();
    for game in restore_games(save, catalog, resolver, now) {
        registry.insert(game).await;
    }
    registry
}
