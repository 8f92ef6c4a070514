//! Configuration resolution for Rentboard.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (platform config dir, e.g. ~/.config/rentboard/settings.json)
//! 3. Project config (.rentboard/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete Rentboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Database location.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. `None` resolves to the platform
    /// config dir at startup.
    pub path: Option<PathBuf>,
}

/// Scheduler timing and batching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between match-scan ticks.
    pub match_interval_secs: u64,
    /// Seconds between maintenance ticks.
    pub maintenance_interval_secs: u64,
    /// Page size for the watermark scan.
    pub batch_size: u32,
    /// Wall-clock budget for a single tick; a timed-out tick is a failed tick.
    pub tick_timeout_secs: u64,
    /// Lease time-to-live. Must exceed the tick timeout so a crashed holder
    /// is taken over at the next interval.
    pub lease_ttl_secs: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            match_interval_secs: 10 * 60,
            maintenance_interval_secs: 6 * 60 * 60,
            batch_size: 100,
            tick_timeout_secs: 60,
            lease_ttl_secs: 180,
        }
    }
}

/// Delivery worker pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Seconds between delivery sweeps.
    pub sweep_interval_secs: u64,
    /// Pause between individual sends, to avoid flooding the transport.
    pub throttle_ms: u64,
    /// Maximum notifications handled per sweep.
    pub batch_size: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            throttle_ms: 100,
            batch_size: 50,
        }
    }
}

/// Submission validation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Lowest accepted listing price.
    pub min_price: f64,
    /// Highest accepted listing price.
    pub max_price: f64,
    /// Cap on pending+approved ads per owner.
    pub max_ads_per_user: u32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            min_price: 0.0,
            max_price: 1_000_000.0,
            max_ads_per_user: 10,
        }
    }
}

/// Maintenance retention windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Read notifications older than this many days are purged.
    pub purge_read_after_days: i64,
    /// Saved searches with no match for this many days are deactivated.
    pub deactivate_queries_after_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            purge_read_after_days: 7,
            deactivate_queries_after_days: 30,
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            let global = load_config_file(&global_path)?;
            merge_config(&mut config, global);
        }
    }

    // Load project config
    if let Some(dir) = project_dir {
        let project_path = dir.join(".rentboard").join("settings.json");
        if project_path.exists() {
            let project = load_config_file(&project_path)?;
            merge_config(&mut config, project);
        }
    }

    // Apply environment overrides
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rentboard").join("settings.json"))
}

/// Default database path when none is configured.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".rentboard").join("rentboard.db"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn merge_config(base: &mut Config, overlay: Config) {
    if overlay.database.path.is_some() {
        base.database.path = overlay.database.path;
    }
    base.scheduler = overlay.scheduler;
    base.delivery = overlay.delivery;
    base.moderation = overlay.moderation;
    base.retention = overlay.retention;
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("RENTBOARD_DB_PATH") {
        config.database.path = Some(PathBuf::from(val));
    }
    if let Ok(val) = std::env::var("RENTBOARD_MATCH_INTERVAL_SECS") {
        if let Ok(n) = val.parse() {
            config.scheduler.match_interval_secs = n;
        }
    }
    if let Ok(val) = std::env::var("RENTBOARD_BATCH_SIZE") {
        if let Ok(n) = val.parse() {
            config.scheduler.batch_size = n;
        }
    }
    if let Ok(val) = std::env::var("RENTBOARD_DELIVERY_THROTTLE_MS") {
        if let Ok(n) = val.parse() {
            config.delivery.throttle_ms = n;
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_ten_minute_interval() {
        let config = Config::default();
        assert_eq!(config.scheduler.match_interval_secs, 600);
    }

    #[test]
    fn default_lease_outlives_tick_timeout() {
        let config = Config::default();
        assert!(config.scheduler.lease_ttl_secs as u64 > config.scheduler.tick_timeout_secs);
    }

    #[test]
    fn default_price_bounds() {
        let config = Config::default();
        assert_eq!(config.moderation.min_price, 0.0);
        assert_eq!(config.moderation.max_price, 1_000_000.0);
    }

    #[test]
    fn merge_prefers_overlay_sections() {
        let mut base = Config::default();
        let mut overlay = Config::default();
        overlay.scheduler.match_interval_secs = 60;
        overlay.database.path = Some(PathBuf::from("/tmp/x.db"));
        merge_config(&mut base, overlay);
        assert_eq!(base.scheduler.match_interval_secs, 60);
        assert_eq!(base.database.path, Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn merge_keeps_base_db_path_when_overlay_unset() {
        let mut base = Config::default();
        base.database.path = Some(PathBuf::from("/var/lib/rentboard.db"));
        merge_config(&mut base, Config::default());
        assert_eq!(base.database.path, Some(PathBuf::from("/var/lib/rentboard.db")));
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut config = Config::default();
        config.scheduler.batch_size = 25;
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = load_config_file(&path).unwrap();
        assert_eq!(loaded.scheduler.batch_size, 25);
    }

    #[test]
    fn config_file_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_config_file(&path).is_err());
    }
}
