use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ModelsyncConfig {
    /// Path to the directory holding modelsync's data
    pub data_dir: String,

    /// Explicit path of the shared database file, overrides `data_dir`
    pub database_path: Option<String>,

    /// TTL for cached schema snapshots in seconds (default: 30)
    pub snapshot_cache_ttl_secs: u64,

    /// Bound on a single database round trip in seconds (default: 10)
    pub statement_timeout_secs: u64,
}

const EMPTY_CONFIG: &str = r#"### modelsync configuration file

### directory for data used by modelsync
# data_dir = "~/.modelsync"

### shared database file, defaults to <data_dir>/modelsync.sqlite3
# database_path = "/var/lib/app/shared.sqlite3"

### schema snapshot cache TTL (in seconds), 0 disables caching
# snapshot_cache_ttl_secs = 30

### timeout for a single introspection or DDL round trip (in seconds)
# statement_timeout_secs = 10
"#;

impl Default for ModelsyncConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.modelsync", home_dir),
            database_path: None,
            snapshot_cache_ttl_secs: 30,
            statement_timeout_secs: 10,
        }
    }
}

impl ModelsyncConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<ModelsyncConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.modelsync/modelsync.toml as the configuration file path
        let modelsync_dir = default_dir()?;

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(modelsync_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create modelsync directory: {}", e))?;
                let p = format!("{}/modelsync.toml", modelsync_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of MODELSYNC)
        // E.g., `MODELSYNC_DATA_DIR=/tmp/ms ./modelsync` would set the data directory
        builder = builder.add_source(config::Environment::with_prefix("MODELSYNC"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<ModelsyncConfig> {
        let defaults = ModelsyncConfig::default();

        // Parse data directory
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => {
                let dir = default_dir()?;
                std::fs::create_dir_all(dir.as_str())
                    .map_err(|e| anyhow!("Unable to create data directory: {}", e))?;
                dir
            }
        };

        let database_path = config
            .get("database_path")
            .filter(|p| !p.trim().is_empty())
            .map(|p| expand_home(p));

        let snapshot_cache_ttl_secs = config
            .get("snapshot_cache_ttl_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.snapshot_cache_ttl_secs);

        // A zero timeout would fail every round trip
        let statement_timeout_secs = config
            .get("statement_timeout_secs")
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(defaults.statement_timeout_secs);

        Ok(ModelsyncConfig {
            data_dir,
            database_path,
            snapshot_cache_ttl_secs,
            statement_timeout_secs,
        })
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        match &self.database_path {
            Some(p) => p.clone(),
            None => {
                let data_dir = self.data_dir.trim_end_matches('/');
                format!("{}/modelsync.sqlite3", data_dir)
            }
        }
    }

    /// Get snapshot cache TTL as Duration
    pub fn snapshot_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_cache_ttl_secs)
    }

    /// Get statement timeout as Duration
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let sqlite_path = self.sqlite_path();
        let status = if Path::new(&sqlite_path).exists() {
            "exists"
        } else {
            "not created"
        };
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {} ({})", sqlite_path, status),
            format!(
                "Snapshot TTL:       {} seconds",
                self.snapshot_cache_ttl_secs
            ),
            format!("Statement Timeout:  {} seconds", self.statement_timeout_secs),
        ]
        .join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.modelsync/modelsync.toml", home_dir)
    }
}

fn default_dir() -> Result<String> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow!("Could not find home directory"))?
        .to_str()
        .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
        .to_owned();
    Ok(format!("{}/.modelsync", home_dir))
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}/{}", home.to_string_lossy(), rest),
        _ => path.to_string(),
    }
}
