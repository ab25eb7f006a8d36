//! Game Engine Core
//!
//! The simulation itself: the item catalog, per-player game state with the
//! cost curve and accrual rules, and the concurrency-safe registry of all
//! active games.

pub mod catalog;
pub mod registry;
pub mod state;

pub use catalog::{Catalog, CatalogEntry, CatalogError, ItemKind};
pub use registry::{LeaderboardEntry, Registry, RegistryError};
pub use state::{Game, GameError, OwnerId, PlayerHandle};
