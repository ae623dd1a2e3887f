use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Upper bounds for the hold settings; larger values are configuration mistakes.
pub const MAX_HOLD_TTL_SECONDS: u64 = 86_400;
pub const MAX_SWEEP_INTERVAL_SECONDS: u64 = 3_600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

// Top-level configuration container
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub holds: HoldConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Where seat state lives.
#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    /// In-process only, optionally seeded from a JSON file.
    Memory { seed_file: Option<String> },
    /// Postgres for charts and sales, Redis for holds.
    Persistent {
        database: DatabaseConfig,
        redis: RedisConfig,
        seed_file: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldConfig {
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl HoldConfig {
    pub fn ttl(&self) -> Result<chrono::Duration, ConfigError> {
        let invalid = || ConfigError::Invalid { key: "HOLD_TTL_SECONDS", value: self.ttl_seconds.to_string() };
        if self.ttl_seconds == 0 || self.ttl_seconds > MAX_HOLD_TTL_SECONDS {
            return Err(invalid());
        }
        let seconds = i64::try_from(self.ttl_seconds).map_err(|_| invalid())?;
        chrono::Duration::try_seconds(seconds).ok_or_else(invalid)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let seed_file = lookup("SEED_FILE").filter(|path| !path.is_empty());

        let storage = match lookup("STORAGE_BACKEND").as_deref().unwrap_or("memory") {
            "memory" => StorageConfig::Memory { seed_file },
            "persistent" => StorageConfig::Persistent {
                database: DatabaseConfig {
                    url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                    pool_size: parse_or(&lookup, "DB_POOL_SIZE", 20)?,
                },
                redis: RedisConfig {
                    url: lookup("REDIS_URL").ok_or(ConfigError::Missing("REDIS_URL"))?,
                },
                seed_file,
            },
            other => {
                return Err(ConfigError::Invalid { key: "STORAGE_BACKEND", value: other.to_string() });
            }
        };

        let holds = HoldConfig {
            ttl_seconds: parse_bounded(&lookup, "HOLD_TTL_SECONDS", 300, MAX_HOLD_TTL_SECONDS)?,
            sweep_interval_seconds: parse_bounded(&lookup, "SWEEP_INTERVAL_SECONDS", 30, MAX_SWEEP_INTERVAL_SECONDS)?,
        };

        Ok(Config {
            app: AppConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "PORT", 8000)?,
                rust_log: lookup("RUST_LOG").unwrap_or_else(|| "seat_holds=debug,tower_http=debug".to_string()),
                log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?,
            },
            storage,
            holds,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Like `parse_or`, but only accepts `1..=max`.
fn parse_bounded(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let value = parse_or(lookup, key, default)?;
    if value == 0 || value > max {
        return Err(ConfigError::Invalid { key, value: value.to_string() });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_memory_storage() {
        let config = config(&[]).unwrap();
        assert!(matches!(config.storage, StorageConfig::Memory { seed_file: None }));
        assert_eq!(config.app.port, 8000);
        assert_eq!(config.holds.ttl().unwrap(), chrono::Duration::seconds(300));
        assert_eq!(config.holds.sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.app.log_format, LogFormat::Pretty);
    }

    #[test]
    fn persistent_storage_needs_urls() {
        assert_eq!(
            config(&[("STORAGE_BACKEND", "persistent")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        let config = config(&[
            ("STORAGE_BACKEND", "persistent"),
            ("DATABASE_URL", "postgres://localhost/seats"),
            ("REDIS_URL", "redis://localhost"),
            ("DB_POOL_SIZE", "5"),
        ])
        .unwrap();
        match config.storage {
            StorageConfig::Persistent { database, .. } => assert_eq!(database.pool_size, 5),
            StorageConfig::Memory { .. } => panic!("expected persistent storage"),
        }
    }

    #[test]
    fn rejects_bad_numbers() {
        assert_eq!(
            config(&[("PORT", "eighty")]).unwrap_err(),
            ConfigError::Invalid { key: "PORT", value: "eighty".to_string() }
        );
        assert!(config(&[("HOLD_TTL_SECONDS", "0")]).is_err());
        assert!(config(&[("STORAGE_BACKEND", "sqlite")]).is_err());
    }

    #[test]
    fn hold_settings_are_bounded() {
        assert_eq!(
            config(&[("HOLD_TTL_SECONDS", "18446744073709551615")]).unwrap_err(),
            ConfigError::Invalid { key: "HOLD_TTL_SECONDS", value: "18446744073709551615".to_string() }
        );
        assert!(config(&[("HOLD_TTL_SECONDS", "10000000000000")]).is_err());
        assert!(config(&[("HOLD_TTL_SECONDS", "86401")]).is_err());
        assert!(config(&[("SWEEP_INTERVAL_SECONDS", "0")]).is_err());
        assert!(config(&[("SWEEP_INTERVAL_SECONDS", "3601")]).is_err());

        let config = config(&[("HOLD_TTL_SECONDS", "86400")]).unwrap();
        assert_eq!(config.holds.ttl().unwrap(), chrono::Duration::days(1));
    }

    #[test]
    fn ttl_rejects_hand_built_out_of_range_values() {
        let holds = HoldConfig { ttl_seconds: u64::MAX, sweep_interval_seconds: 30 };
        assert!(holds.ttl().is_err());
    }
}
