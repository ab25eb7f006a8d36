//! # Sweet Forge
//!
//! Per-player incremental-resource ("idle clicker") simulation engine with
//! periodic persistence. Players accumulate a resource passively through
//! owned production items and actively through clicks; a background ticker
//! advances every game once per second, and the whole registry is
//! snapshotted to disk so offline time is credited on the next start.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SWEET FORGE                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Simulation core                           │
//! │  ├── catalog.rs  - Immutable item table (kinds, prices,      │
//! │  │                 production rates)                         │
//! │  ├── state.rs    - Per-player game: balance, owned counts,   │
//! │  │                 cost curve, purchase, accrual             │
//! │  └── registry.rs - Shared map of active games with per-owner │
//! │                    locking; leaderboard ranking              │
//! │                                                              │
//! │  persist/        - Snapshots                                 │
//! │  ├── codec.rs    - Record format, offline catch-up on load   │
//! │  └── store.rs    - Save-file I/O (atomic rewrite)            │
//! │                                                              │
//! │  engine/         - Command entry points, ticker, autosave    │
//! │  config.rs       - Deployment knobs                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! The registry map sits behind an `RwLock` taken only for structural
//! changes; every game has its own `Mutex`, so mutations on one game are
//! mutually exclusive while different owners proceed in parallel. The
//! ticker, the autosaver, and interaction handlers all go through the same
//! per-game locks, never holding more than one at a time.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod engine;
pub mod game;
pub mod persist;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{Engine, EngineError, PurchaseOutcome};
pub use game::catalog::{Catalog, CatalogEntry, CatalogError, ItemKind};
pub use game::registry::{LeaderboardEntry, Registry, RegistryError};
pub use game::state::{Game, GameError, OwnerId, PlayerHandle};
pub use persist::codec::{IdentityResolver, SaveFile, StoredHandleResolver};
pub use persist::store::PersistError;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Geometric growth ratio of the per-unit price curve: the n-th unit of a
/// kind costs `base_price * COST_GROWTH_RATIO^(n-1)`.
pub const COST_GROWTH_RATIO: f64 = 1.1;
