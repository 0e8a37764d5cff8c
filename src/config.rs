use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::detection::correlation::DEFAULT_WINDOW_SECONDS;

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "BAYANI_DB";

/// Environment variable overriding the simulator's hub URL
pub const HUB_URL_ENV: &str = "HUB_URL";

/// Configuration for the BayaniHub hub and tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Alert store configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Ingestion limits
    #[serde(default)]
    pub ingest: IngestConfig,
    /// Correlation configuration
    #[serde(default)]
    pub correlation: CorrelationConfig,
    /// Baseline anomaly scorer configuration
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Site simulator configuration
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the hub listens on
    pub bind_address: String,
    /// Upper bound on the store work behind a single request
    pub request_timeout_secs: u64,
}

/// Alert store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
}

/// Ingestion limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum length in characters of `site_id` and `event_type`
    pub max_field_len: usize,
    /// Maximum length in characters of a submitted timestamp
    pub max_timestamp_len: usize,
}

/// Correlation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Maximum distance in seconds between two coordinated alerts
    pub window_seconds: i64,
}

/// Baseline anomaly scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Per-feature baseline mean
    pub baseline_mean: Vec<f64>,
    /// Per-feature baseline standard deviation
    pub baseline_std: Vec<f64>,
}

/// Site simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Alert ingestion endpoint of the hub
    pub hub_url: String,
    /// Minimum pause between two events
    pub min_interval_secs: f64,
    /// Maximum pause between two events
    pub max_interval_secs: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_path: PathBuf::from("bayanihub.db"),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            max_field_len: 50,
            max_timestamp_len: 64,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        CorrelationConfig {
            window_seconds: DEFAULT_WINDOW_SECONDS,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        // Features are [event count, jitter in 0..1]
        ScoringConfig {
            baseline_mean: vec![2.0, 0.5],
            baseline_std: vec![2.0, 0.29],
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            hub_url: "http://localhost:5000/alerts".to_string(),
            min_interval_secs: 5.0,
            max_interval_secs: 10.0,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load from `path` if it exists, otherwise use defaults, then apply
    /// environment overrides
    pub fn load_or_default(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if path.exists() {
            Config::from_file(path)?
        } else {
            log::warn!("Config file {:?} not found, using defaults", path);
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `BAYANI_DB` and `HUB_URL` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(db_path) = std::env::var(DB_PATH_ENV) {
            if !db_path.trim().is_empty() {
                self.storage.db_path = PathBuf::from(db_path);
            }
        }
        if let Ok(hub_url) = std::env::var(HUB_URL_ENV) {
            if !hub_url.trim().is_empty() {
                self.simulator.hub_url = hub_url;
            }
        }
    }
}
