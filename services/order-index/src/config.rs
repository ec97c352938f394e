//! Engine configuration
//!
//! Loaded from a TOML file or from `ORDER_INDEX_*` environment variables
//! (after reading a `.env` file if one is present).
//!
//! ```toml
//! log_filter = "order_index=debug"
//!
//! [backend]
//! kind = "postgres"
//! url = "postgres://localhost/orders"
//! max_connections = 16
//! statement_timeout_ms = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_BACKEND: &str = "ORDER_INDEX_BACKEND";
pub const ENV_DATABASE_URL: &str = "ORDER_INDEX_DATABASE_URL";
pub const ENV_MAX_CONNECTIONS: &str = "ORDER_INDEX_MAX_CONNECTIONS";
pub const ENV_STATEMENT_TIMEOUT_MS: &str = "ORDER_INDEX_STATEMENT_TIMEOUT_MS";
pub const ENV_LOCK_TIMEOUT_MS: &str = "ORDER_INDEX_LOCK_TIMEOUT_MS";
pub const ENV_LOG: &str = "ORDER_INDEX_LOG";

pub const DEFAULT_LOG_FILTER: &str = "order_index=info";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be set when the postgres backend is selected")]
    Missing { key: &'static str },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: BackendConfig,
    /// Default tracing filter; `RUST_LOG` overrides it
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    Memory(MemoryConfig),
    Postgres(PostgresConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory(MemoryConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub lock_timeout_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { lock_timeout_ms: 5_000 }
    }
}

impl MemoryConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_statement_timeout_ms() -> u64 {
    5_000
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            statement_timeout_ms: default_statement_timeout_ms(),
        }
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables take defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_kind = lookup(ENV_BACKEND).unwrap_or_else(|| "memory".to_string());
        let backend = match backend_kind.trim().to_ascii_lowercase().as_str() {
            "memory" => {
                let mut memory = MemoryConfig::default();
                if let Some(ms) = parse_var(&lookup, ENV_LOCK_TIMEOUT_MS)? {
                    memory.lock_timeout_ms = ms;
                }
                BackendConfig::Memory(memory)
            }
            "postgres" | "postgresql" => {
                let url = lookup(ENV_DATABASE_URL).ok_or(ConfigError::Missing { key: ENV_DATABASE_URL })?;
                let mut postgres = PostgresConfig::new(url);
                if let Some(n) = parse_var(&lookup, ENV_MAX_CONNECTIONS)? {
                    postgres.max_connections = n;
                }
                if let Some(ms) = parse_var(&lookup, ENV_STATEMENT_TIMEOUT_MS)? {
                    postgres.statement_timeout_ms = ms;
                }
                BackendConfig::Postgres(postgres)
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: ENV_BACKEND,
                    value: backend_kind,
                })
            }
        };

        let config = EngineConfig {
            backend,
            log_filter: lookup(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Install the global subscriber with `log_filter` as the default filter.
    /// Returns false if one was already installed.
    pub fn init_tracing(&self) -> bool {
        crate::telemetry::init_tracing(&self.log_filter)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.backend {
            BackendConfig::Memory(memory) => {
                if memory.lock_timeout_ms == 0 {
                    return Err(ConfigError::Invalid("lock_timeout_ms must be positive".into()));
                }
            }
            BackendConfig::Postgres(postgres) => {
                if postgres.url.trim().is_empty() {
                    return Err(ConfigError::Invalid("postgres url is empty".into()));
                }
                if postgres.max_connections == 0 {
                    return Err(ConfigError::Invalid("max_connections must be positive".into()));
                }
                if postgres.statement_timeout_ms == 0 {
                    return Err(ConfigError::Invalid("statement_timeout_ms must be positive".into()));
                }
            }
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}
