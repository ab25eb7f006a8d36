//! Engine
//!
//! Ties the catalog, registry, and persistence together behind the command
//! entry points the interaction layer calls, plus the two background tasks:
//! the per-second accrual ticker and the periodic snapshot writer.
//!
//! String input (item names) is validated here, once, at the boundary;
//! everything below works on typed kinds. Per-owner failures stay local to
//! that owner's request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::game::catalog::{Catalog, ItemKind};
use crate::game::registry::{LeaderboardEntry, Registry, RegistryError};
use crate::game::state::{GameError, OwnerId, PlayerHandle};
use crate::persist::codec::{restore_games, snapshot, IdentityResolver};
use crate::persist::store::{read_save_file, write_save_file, PersistError};

/// Engine errors, the union of everything a command entry point can report.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Purchase request named an item outside the catalog.
    #[error("unknown item \"{0}\"")]
    UnknownKind(String),

    /// Registry rejected the request.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Game state transition failed.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// What a purchase request actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseOutcome {
    /// The kind purchased.
    pub kind: ItemKind,
    /// Quantity asked for (after normalization).
    pub requested: u64,
    /// Quantity actually bought after clamping to the balance. Zero means
    /// nothing was affordable; the presentation layer reports that as a
    /// failed purchase.
    pub bought: u64,
    /// Total price paid.
    pub cost: u64,
}

/// The game-state engine.
pub struct Engine {
    catalog: Catalog,
    registry: Registry,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine with an empty registry.
    pub fn new(catalog: Catalog, config: EngineConfig) -> Engine {
        Engine {
            catalog,
            registry: Registry::new(),
            config,
        }
    }

    /// The loaded item catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The active-game registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Command entry points
    // -------------------------------------------------------------------------

    /// Start a new game for `owner`.
    pub async fn new_game(&self, owner: OwnerId, handle: PlayerHandle) -> Result<(), EngineError> {
        self.registry.create(owner, handle, Utc::now()).await?;
        info!(%owner, "new game started");
        Ok(())
    }

    /// Handle a purchase request.
    ///
    /// The item name is resolved against the catalog, the quantity is
    /// normalized to its absolute value, then clamped down to what the
    /// balance covers before buying. A request that affords nothing comes
    /// back with `bought == 0` rather than an error.
    pub async fn purchase(
        &self,
        owner: OwnerId,
        item_name: &str,
        requested: i64,
    ) -> Result<PurchaseOutcome, EngineError> {
        let kind = ItemKind::from_name(item_name)
            .ok_or_else(|| EngineError::UnknownKind(item_name.to_string()))?;
        let requested = requested.unsigned_abs();

        let game = self.registry.get(owner).await?;
        let mut game = game.lock().await;

        let bought = game.affordable_quantity(&self.catalog, kind, requested);
        let cost = game.purchase(&self.catalog, kind, bought)?;
        debug!(%owner, %kind, requested, bought, cost, "purchase applied");

        Ok(PurchaseOutcome {
            kind,
            requested,
            bought,
            cost,
        })
    }

    /// Handle a click. Returns the display balance after the increment.
    pub async fn manual_increment(&self, owner: OwnerId) -> Result<u64, EngineError> {
        let game = self.registry.get(owner).await?;
        let mut game = game.lock().await;
        game.manual_increment();
        Ok(game.display_balance())
    }

    /// Quit `owner`'s game. The removal is persisted right away so the
    /// entry doesn't resurrect on restart.
    pub async fn quit(&self, owner: OwnerId) -> Result<(), EngineError> {
        self.registry.remove(owner).await?;
        info!(%owner, "game quit");
        self.save_or_warn().await;
        Ok(())
    }

    /// Re-bind `owner`'s presentation handle (the resend path). Game state
    /// is untouched; the new handle is persisted right away.
    pub async fn rebind_handle(
        &self,
        owner: OwnerId,
        handle: PlayerHandle,
    ) -> Result<(), EngineError> {
        {
            let game = self.registry.get(owner).await?;
            let mut game = game.lock().await;
            game.set_handle(handle);
        }
        self.save_or_warn().await;
        Ok(())
    }

    /// Current leaderboard, capped at the configured size.
    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.registry
            .ranked_snapshot(self.config.leaderboard_size)
            .await
    }

    // -------------------------------------------------------------------------
    // Background work
    // -------------------------------------------------------------------------

    /// One accrual pass over every active game.
    pub async fn tick(&self, now: DateTime<Utc>) {
        self.registry.for_each(|game| game.accrue(now)).await;
    }

    /// Snapshot the registry to the save file.
    pub async fn save(&self, now: DateTime<Utc>) -> Result<(), PersistError> {
        let file = snapshot(&self.registry, now).await;
        write_save_file(&self.config.save_path, &file)
    }

    /// Load the save file into the registry, catching every game up to
    /// `now`. Returns how many games were restored.
    ///
    /// An unreadable or corrupt save file is logged and the engine starts
    /// empty; losing a snapshot costs some offline progress, not the
    /// process. Only catalog load is allowed to stop startup.
    pub async fn load(&self, resolver: &dyn IdentityResolver, now: DateTime<Utc>) -> usize {
        let file = match read_save_file(&self.config.save_path) {
            Ok(file) => file,
            Err(err) => {
                error!(
                    path = %self.config.save_path.display(),
                    error = %err,
                    "save file unreadable; starting with an empty registry"
                );
                return 0;
            }
        };
        let games = restore_games(&file, &self.catalog, resolver, now);
        let count = games.len();
        for game in games {
            self.registry.insert(game).await;
        }
        count
    }

    /// Spawn the accrual ticker and the autosave loop. Both run until the
    /// process shuts down; snapshot failures are logged and retried on the
    /// next cycle.
    pub fn spawn_background_tasks(self: Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let ticker = {
            let engine = Arc::clone(&self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(engine.config.tick_interval);
                interval.tick().await; // immediate first tick
                loop {
                    interval.tick().await;
                    engine.tick(Utc::now()).await;
                }
            })
        };

        let autosaver = {
            let engine = self;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(engine.config.autosave_interval);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    engine.save_or_warn().await;
                }
            })
        };

        (ticker, autosaver)
    }

    /// Best-effort final snapshot, bounded by the shutdown grace period. A
    /// miss is absorbed by catch-up on the next start.
    pub async fn shutdown(&self) {
        match tokio::time::timeout(self.config.shutdown_grace, self.save(Utc::now())).await {
            Ok(Ok(())) => info!("final snapshot written"),
            Ok(Err(err)) => error!(error = %err, "final snapshot failed"),
            Err(_) => error!("final snapshot timed out"),
        }
    }

    async fn save_or_warn(&self) {
        if let Err(err) = self.save(Utc::now()).await {
            warn!(error = %err, "snapshot write failed; retrying on next cycle");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_engine(dir: &tempfile::TempDir) -> Engine {
        let config = EngineConfig {
            save_path: dir.path().join("saves.json"),
            ..EngineConfig::default()
        };
        Engine::new(Catalog::load().unwrap(), config)
    }

    fn handle(name: &str) -> PlayerHandle {
        PlayerHandle {
            display_name: name.into(),
            message_id: 10,
        }
    }

    #[tokio::test]
    async fn new_game_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        let owner = OwnerId(1);

        engine.new_game(owner, handle("p")).await.unwrap();
        let err = engine.new_game(owner, handle("p")).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Registry(RegistryError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn commands_without_a_game_report_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        let owner = OwnerId(404);

        assert!(matches!(
            engine.manual_increment(owner).await,
            Err(EngineError::Registry(RegistryError::NotFound(_)))
        ));
        assert!(matches!(
            engine.purchase(owner, "cursor", 1).await,
            Err(EngineError::Registry(RegistryError::NotFound(_)))
        ));
        assert!(matches!(
            engine.quit(owner).await,
            Err(EngineError::Registry(RegistryError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn unknown_item_is_rejected_at_the_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        let owner = OwnerId(2);
        engine.new_game(owner, handle("p")).await.unwrap();

        let err = engine.purchase(owner, "gingerbread house", 1).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownKind(_)));
    }

    #[tokio::test]
    async fn purchase_clamps_to_what_the_balance_covers() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        let owner = OwnerId(3);
        engine.new_game(owner, handle("p")).await.unwrap();

        // 32 clicks: enough for two cursors (15 + 17), not three.
        for _ in 0..32 {
            engine.manual_increment(owner).await.unwrap();
        }

        let outcome = engine.purchase(owner, "cursor", 10).await.unwrap();
        assert_eq!(outcome.kind, ItemKind::Cursor);
        assert_eq!(outcome.requested, 10);
        assert_eq!(outcome.bought, 2);
        assert_eq!(outcome.cost, 32);

        // Broke now: the same request affords nothing and buys nothing.
        let outcome = engine.purchase(owner, "cursor", 10).await.unwrap();
        assert_eq!(outcome.bought, 0);
        assert_eq!(outcome.cost, 0);
    }

    #[tokio::test]
    async fn negative_quantities_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        let owner = OwnerId(4);
        engine.new_game(owner, handle("p")).await.unwrap();
        for _ in 0..15 {
            engine.manual_increment(owner).await.unwrap();
        }

        let outcome = engine.purchase(owner, "cursor", -1).await.unwrap();
        assert_eq!(outcome.requested, 1);
        assert_eq!(outcome.bought, 1);
    }

    #[tokio::test]
    async fn quit_persists_the_removal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        engine.new_game(OwnerId(5), handle("a")).await.unwrap();
        engine.new_game(OwnerId(6), handle("b")).await.unwrap();

        engine.quit(OwnerId(5)).await.unwrap();

        let file = read_save_file(&engine.config.save_path).unwrap();
        assert!(!file.games.contains_key("5"));
        assert!(file.games.contains_key("6"));
        assert!(file.last_saved.is_some());
    }

    #[tokio::test]
    async fn rebind_handle_changes_nothing_else() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        let owner = OwnerId(7);
        engine.new_game(owner, handle("old")).await.unwrap();
        for _ in 0..5 {
            engine.manual_increment(owner).await.unwrap();
        }

        engine
            .rebind_handle(
                owner,
                PlayerHandle {
                    display_name: "new".into(),
                    message_id: 11,
                },
            )
            .await
            .unwrap();

        let game = engine.registry().get(owner).await.unwrap();
        let game = game.lock().await;
        assert_eq!(game.handle().display_name, "new");
        assert_eq!(game.handle().message_id, 11);
        assert_eq!(game.display_balance(), 5);
    }

    #[tokio::test]
    async fn tick_accrues_every_game() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        let owner = OwnerId(8);
        engine.new_game(owner, handle("p")).await.unwrap();
        for _ in 0..15 {
            engine.manual_increment(owner).await.unwrap();
        }
        engine.purchase(owner, "cursor", 1).await.unwrap();

        let game = engine.registry().get(owner).await.unwrap();
        let last = game.lock().await.last_accrual_at();
        engine.tick(last + Duration::seconds(50)).await;

        assert_eq!(game.lock().await.display_balance(), 5);
    }

    #[tokio::test]
    async fn corrupt_save_file_starts_the_engine_empty() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        std::fs::write(&engine.config.save_path, "{ not valid json").unwrap();

        let restored = engine
            .load(&crate::persist::StoredHandleResolver, Utc::now())
            .await;
        assert_eq!(restored, 0);
        assert!(engine.registry().is_empty().await);

        // The engine keeps running: new games work and the next save
        // replaces the bad file.
        let owner = OwnerId(11);
        engine.new_game(owner, handle("p")).await.unwrap();
        engine.save(Utc::now()).await.unwrap();
        let file = read_save_file(&engine.config.save_path).unwrap();
        assert!(file.games.contains_key("11"));
    }

    #[tokio::test]
    async fn save_then_load_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);
        let owner = OwnerId(9);
        engine.new_game(owner, handle("p")).await.unwrap();
        for _ in 0..40 {
            engine.manual_increment(owner).await.unwrap();
        }
        engine.purchase(owner, "cursor", 1).await.unwrap();

        let now = Utc::now();
        engine.save(now).await.unwrap();

        let fresh = test_engine(&dir);
        let restored = fresh.load(&crate::persist::StoredHandleResolver, now).await;
        assert_eq!(restored, 1);

        let game = fresh.registry().get(owner).await.unwrap();
        let game = game.lock().await;
        assert_eq!(game.display_balance(), 25);
        assert_eq!(game.owned_count(ItemKind::Cursor), 1);
    }
}
