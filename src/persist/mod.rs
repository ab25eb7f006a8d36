//! Persistence
//!
//! Snapshot format for the registry, the reconciliation performed on load
//! (offline catch-up accrual), and the save-file I/O around them.

pub mod codec;
pub mod store;

pub use codec::{
    restore, restore_games, snapshot, GameRecord, IdentityError, IdentityResolver, SaveFile,
    StoredHandleResolver,
};
pub use store::{read_save_file, write_save_file, PersistError};
