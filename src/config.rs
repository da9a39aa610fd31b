use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL (`DATABASE_URL` overrides)
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub stuck_monitor: StuckMonitorConfig,
}

/// JetStream intake configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StreamConfig {
    pub nats_url: String,
    pub stream_name: String,
    pub subject: String,
    /// Durable consumer shared by every worker process (the consumer group)
    pub durable_name: String,
    pub ack_wait_secs: u64,
    pub max_deliver: i64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            stream_name: "TRANSACTIONS".to_string(),
            subject: "TransactionsCreated".to_string(),
            durable_name: "settlement-workers".to_string(),
            ack_wait_secs: 30,
            max_deliver: 5,
        }
    }
}

/// Settlement behaviour
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SettlementConfig {
    /// Fractional digits of the ledger's minor unit
    pub ledger_decimals: u32,
    /// Balance CAS conflicts tolerated per leg before giving up
    pub max_balance_retries: u32,
    /// Cancel instead of leaving PROCESSING when a participant is missing
    pub cancel_on_missing_account: bool,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            ledger_decimals: 2,
            max_balance_retries: 16,
            cancel_on_missing_account: false,
        }
    }
}

/// Stuck-transfer monitor
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StuckMonitorConfig {
    pub enabled: bool,
    pub scan_interval_secs: u64,
    pub stale_threshold_secs: u64,
    pub batch_size: usize,
}

impl Default for StuckMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_secs: 30,
            stale_threshold_secs: 300,
            batch_size: 100,
        }
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        Self::from_file(&format!("config/{}.yaml", env))
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let mut config = Self::from_yaml(&content)?;
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.postgres_url = Some(url);
        }
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
