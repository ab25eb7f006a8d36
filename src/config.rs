//! Engine Configuration
//!
//! Deployment knobs with sensible defaults, overridable through
//! `SWEET_FORGE_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Where the snapshot file lives.
    pub save_path: PathBuf,
    /// How often the accrual ticker runs.
    pub tick_interval: Duration,
    /// How often the registry is snapshotted to disk.
    pub autosave_interval: Duration,
    /// How long the final shutdown snapshot may take before it is abandoned.
    pub shutdown_grace: Duration,
    /// Maximum number of leaderboard rows.
    pub leaderboard_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_path: PathBuf::from("saves.json"),
            tick_interval: Duration::from_secs(1),
            autosave_interval: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(5),
            leaderboard_size: 10,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by environment variables:
    /// `SWEET_FORGE_SAVE_PATH`, `SWEET_FORGE_TICK_SECS`,
    /// `SWEET_FORGE_AUTOSAVE_SECS`, `SWEET_FORGE_SHUTDOWN_GRACE_SECS`,
    /// `SWEET_FORGE_LEADERBOARD_SIZE`. Unparseable values are logged and
    /// keep the default.
    pub fn from_env() -> EngineConfig {
        let mut config = EngineConfig::default();

        if let Ok(path) = std::env::var("SWEET_FORGE_SAVE_PATH") {
            config.save_path = PathBuf::from(path);
        }
        if let Some(secs) = env_u64("SWEET_FORGE_TICK_SECS") {
            config.tick_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_u64("SWEET_FORGE_AUTOSAVE_SECS") {
            config.autosave_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = env_u64("SWEET_FORGE_SHUTDOWN_GRACE_SECS") {
            config.shutdown_grace = Duration::from_secs(secs);
        }
        if let Some(size) = env_u64("SWEET_FORGE_LEADERBOARD_SIZE") {
            config.leaderboard_size = size as usize;
        }

        config
    }
}

fn env_u64(name: &str) -> Option<u64> {
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(var = name, value = %value, "ignoring unparseable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_policy() {
        let config = EngineConfig::default();
        assert_eq!(config.save_path, PathBuf::from("saves.json"));
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.autosave_interval, Duration::from_secs(300));
        assert_eq!(config.leaderboard_size, 10);
    }
}
