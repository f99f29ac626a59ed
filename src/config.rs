use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::session::SessionConfig;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub relfinder: RelfinderConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Store location and logging
#[derive(Debug, Clone, Deserialize)]
pub struct RelfinderConfig {
    /// SQLite file holding `graph_nodes` and `entity_relations`.
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Path search engine tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,
    /// Partial paths kept queued at once; longer paths are dropped past it.
    #[serde(default = "default_max_frontier")]
    pub max_frontier: usize,
    /// Upper bound on a single search; no bound when absent.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_neighbor_cache_capacity")]
    pub neighbor_cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_paths: default_max_paths(),
            max_frontier: default_max_frontier(),
            timeout_ms: None,
            neighbor_cache_capacity: default_neighbor_cache_capacity(),
        }
    }
}

fn default_max_paths() -> usize {
    64
}

fn default_max_frontier() -> usize {
    100_000
}

fn default_neighbor_cache_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RELFINDER_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("RELFINDER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.relfinder.db_path.as_os_str().is_empty() {
            anyhow::bail!("relfinder.db_path must not be empty");
        }

        if self.session.refresh_interval_ms == 0 {
            anyhow::bail!("session.refresh_interval_ms must be greater than 0");
        }

        if self.session.max_depth == 0 {
            anyhow::bail!("session.max_depth must be greater than 0");
        }

        if self.search.max_paths == 0 {
            anyhow::bail!("search.max_paths must be greater than 0");
        }

        if self.search.max_frontier == 0 {
            anyhow::bail!("search.max_frontier must be greater than 0");
        }

        if self.search.timeout_ms == Some(0) {
            anyhow::bail!("search.timeout_ms must be greater than 0 when set");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.relfinder.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize tests that mutate the process-wide RELFINDER_CONFIG variable.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const FULL_CONFIG: &str = r#"
[relfinder]
db_path = "./graph.db"
log_level = "debug"

[session]
refresh_interval_ms = 250
max_depth = 4

[search]
max_paths = 10
max_frontier = 500
timeout_ms = 30000
neighbor_cache_capacity = 16
"#;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_toml_str("[relfinder]\ndb_path = \"g.db\"\n").unwrap();
        assert_eq!(config.session.refresh_interval_ms, 500);
        assert_eq!(config.session.max_depth, 6);
        assert_eq!(config.search.max_paths, 64);
        assert_eq!(config.search.max_frontier, 100_000);
        assert_eq!(config.search.timeout_ms, None);
        assert_eq!(config.relfinder.log_level, "info");
    }

    #[test]
    fn test_config_full() {
        let config = Config::from_toml_str(FULL_CONFIG).unwrap();
        assert_eq!(config.db_path(), Path::new("./graph.db"));
        assert_eq!(config.session.refresh_interval_ms, 250);
        assert_eq!(config.session.max_depth, 4);
        assert_eq!(config.search.max_paths, 10);
        assert_eq!(config.search.max_frontier, 500);
        assert_eq!(config.search.timeout_ms, Some(30000));
        assert_eq!(config.search.neighbor_cache_capacity, 16);
    }

    #[test]
    fn test_config_rejects_zero_depth() {
        let err = Config::from_toml_str(
            "[relfinder]\ndb_path = \"g.db\"\n[session]\nmax_depth = 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn test_config_rejects_zero_refresh_interval() {
        let err = Config::from_toml_str(
            "[relfinder]\ndb_path = \"g.db\"\n[session]\nrefresh_interval_ms = 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("refresh_interval_ms"));
    }

    #[test]
    fn test_config_rejects_zero_frontier() {
        let err = Config::from_toml_str(
            "[relfinder]\ndb_path = \"g.db\"\n[search]\nmax_frontier = 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_frontier"));
    }

    #[test]
    fn test_config_missing_section() {
        assert!(Config::from_toml_str("[session]\nmax_depth = 3\n").is_err());
    }

    #[test]
    fn test_config_load_from_env_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("relfinder.toml");
        fs::write(&config_path, FULL_CONFIG).unwrap();

        let original = std::env::var("RELFINDER_CONFIG").ok();
        std::env::set_var("RELFINDER_CONFIG", &config_path);
        let config = Config::load();
        std::env::remove_var("RELFINDER_CONFIG");
        if let Some(v) = original {
            std::env::set_var("RELFINDER_CONFIG", v);
        }

        let config = config.unwrap();
        assert_eq!(config.relfinder.log_level, "debug");
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let original = std::env::var("RELFINDER_CONFIG").ok();
        std::env::set_var("RELFINDER_CONFIG", "nonexistent.toml");
        let config = Config::load();
        assert!(config.is_err());
        std::env::remove_var("RELFINDER_CONFIG");
        if let Some(v) = original {
            std::env::set_var("RELFINDER_CONFIG", v);
        }
    }
}
