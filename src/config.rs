//! Configuration and data-directory management.
//!
//! Encore stores its library database in the platform-standard data
//! directory:
//! - Linux: `~/.local/share/encore/`
//! - macOS: `~/Library/Application Support/encore/`
//! - Windows: `%APPDATA%\encore\`
//!
//! Embedders that manage their own storage location can bypass this module
//! entirely and hand [`crate::app::App`] an explicit path.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::DEFAULT_BACKUP_INTERVAL;

/// Returns the encore data directory, creating it if needed.
///
/// # Errors
///
/// Fails when the platform data directory cannot be determined or the
/// subdirectory cannot be created.
pub fn default_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().context("could not determine system data directory")?;

    let encore_dir = data_dir.join("encore");
    std::fs::create_dir_all(&encore_dir).with_context(|| {
        format!(
            "failed to create encore data directory at {}",
            encore_dir.display()
        )
    })?;

    Ok(encore_dir)
}

/// Returns the default library database path inside [`default_data_dir`].
pub fn default_db_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("library.db"))
}

/// Engine tuning knobs, with the defaults the engine ships with.
///
/// All of these have sane defaults; embedders usually only touch the
/// rebuild thresholds when testing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum runtime-graph age before a background rebuild, in seconds.
    pub max_runtime_graph_age_secs: u64,
    /// Maximum accumulated volatile mutations before a background rebuild.
    pub max_runtime_graph_diff: f64,
    /// Lower bound of the selector's concentration band.
    pub gini_low: f64,
    /// Upper bound of the selector's concentration band.
    pub gini_high: f64,
    /// Selector top-K knob.
    pub top_k: i64,
    /// Seconds between full database backups.
    pub backup_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_runtime_graph_age_secs: 60 * 60,
            max_runtime_graph_diff: 50.0,
            gini_low: 0.35,
            gini_high: 0.6,
            top_k: 10,
            backup_interval_secs: DEFAULT_BACKUP_INTERVAL.as_secs(),
        }
    }
}

impl EngineConfig {
    /// Maximum runtime-graph age as a [`Duration`].
    #[must_use]
    pub fn max_runtime_graph_age(&self) -> Duration {
        Duration::from_secs(self.max_runtime_graph_age_secs)
    }

    /// Backup interval as a [`Duration`].
    #[must_use]
    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_runtime_graph_age(), Duration::from_secs(3600));
        assert_eq!(config.max_runtime_graph_diff, 50.0);
        assert_eq!(config.gini_low, 0.35);
        assert_eq!(config.gini_high, 0.6);
        assert_eq!(config.top_k, 10);
        assert_eq!(config.backup_interval(), Duration::from_secs(20 * 60));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = EngineConfig {
            max_runtime_graph_diff: 5.0,
            ..EngineConfig::default()
        };
        let encoded = serde_json::to_string(&config).expect("config should encode");
        let decoded: EngineConfig = serde_json::from_str(&encoded).expect("config should decode");
        assert_eq!(decoded.max_runtime_graph_diff, 5.0);
        assert_eq!(decoded.top_k, config.top_k);
    }

    #[test]
    fn test_default_db_path_points_into_data_dir() {
        let path = default_db_path().expect("default db path");
        assert!(path.is_absolute());
        assert!(path.to_string_lossy().contains("encore"));
        assert!(path.to_string_lossy().ends_with("library.db"));
    }
}
