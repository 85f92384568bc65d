//! Configuration for primm-daemon

use primm_progress::ProgressConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Grading, reward and reconciliation settings
    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: true,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage, optionally seeded from a JSON catalog file
    Memory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed_file: Option<PathBuf>,
    },

    /// PostgreSQL storage
    Postgres {
        url: String,

        #[serde(default = "default_pool_size")]
        max_connections: u32,

        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory { seed_file: None }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: built-in defaults, then the optional file, then
    /// `PRIMM_` environment variables (`PRIMM_PROGRESS__REWARD_POLICY=...`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PRIMM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primm_progress::RewardPolicy;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(matches!(config.storage, StorageConfig::Memory { seed_file: None }));
        assert_eq!(config.progress.investigate_min_chars, 20);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert!(config.server.enable_cors);
        assert_eq!(
            config.progress.reward_policy,
            RewardPolicy::EveryCorrectSubmission
        );
        assert_eq!(config.progress.reconcile.max_attempts, 5);
    }

    #[test]
    fn test_postgres_section_deserializes() {
        let config: DaemonConfig = serde_json::from_value(serde_json::json!({
            "storage": { "type": "postgres", "url": "postgres://localhost/primm" },
            "progress": { "reward_policy": "first_completion" }
        }))
        .unwrap();

        match config.storage {
            StorageConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            } => {
                assert_eq!(url, "postgres://localhost/primm");
                assert_eq!(max_connections, 10);
                assert_eq!(connect_timeout_secs, 5);
            }
            other => panic!("unexpected storage config {other:?}"),
        }
        assert_eq!(config.progress.reward_policy, RewardPolicy::FirstCompletion);
    }
}
