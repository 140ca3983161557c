//! Configuration management for the Zeppelin service
//!
//! Settings come from an optional TOML file, then `ZEPPELIN_*` environment
//! overrides, then validation.

use crate::errors::{ConfigResult, ConfigurationError};
use crate::games::game_config::GameConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Top-level service configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub channel: ChannelConfig,
    pub game: GameConfig,
    pub registration: RegistrationPolicy,
    pub logging: LoggingConfig,
}

/// HTTP/WebSocket surface
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub heartbeat_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
            heartbeat_interval_secs: 30,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    JsonFile,
}

/// Ledger persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::JsonFile,
            data_file: "./data/ledger.json".to_string(),
        }
    }
}

/// Streaming-platform channel lookup
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel slug whose follower count decides the registration bonus
    pub slug: Option<String>,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            slug: None,
            api_base_url: "https://kick.com/api/v1".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Starting balance rules for newly registered viewers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationPolicy {
    pub follower_threshold: u64,
    pub bonus_balance: Decimal,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            follower_threshold: 100,
            bonus_balance: dec!(1000),
        }
    }
}

impl RegistrationPolicy {
    pub fn initial_balance(&self, follower_count: u64) -> Decimal {
        if follower_count >= self.follower_threshold {
            self.bonus_balance
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "zeppelin=info,tower_http=info".to_string(),
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> ConfigResult<AppConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => AppConfig::default(),
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> ConfigResult<AppConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(&self, config: &mut AppConfig) -> ConfigResult<()> {
        if let Ok(host) = env::var("ZEPPELIN_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("ZEPPELIN_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "ZEPPELIN_PORT".to_string(),
                value: port,
                reason: "Invalid port number".to_string(),
            })?;
        }

        if let Ok(backend) = env::var("ZEPPELIN_STORAGE_BACKEND") {
            config.storage.backend = match backend.as_str() {
                "memory" => StorageBackend::Memory,
                "json_file" | "json" => StorageBackend::JsonFile,
                _ => {
                    return Err(ConfigurationError::InvalidValue {
                        field: "ZEPPELIN_STORAGE_BACKEND".to_string(),
                        value: backend,
                        reason: "Expected 'memory' or 'json_file'".to_string(),
                    })
                }
            };
        }
        if let Ok(data_file) = env::var("ZEPPELIN_DATA_FILE") {
            config.storage.data_file = data_file;
        }

        if let Ok(slug) = env::var("ZEPPELIN_CHANNEL") {
            config.channel.slug = Some(slug).filter(|s| !s.trim().is_empty());
        }

        if let Ok(filter) = env::var("ZEPPELIN_LOG") {
            config.logging.filter = filter;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self, config: &AppConfig) -> ConfigResult<()> {
        if config.server.port == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "server.port".to_string(),
                value: "0".to_string(),
                reason: "Port cannot be zero".to_string(),
            });
        }

        if config.server.request_timeout_secs == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "server.request_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "Timeout must be at least one second".to_string(),
            });
        }

        if config.storage.backend == StorageBackend::JsonFile && config.storage.data_file.is_empty() {
            return Err(ConfigurationError::MissingRequired("storage.data_file".to_string()));
        }

        if config.registration.bonus_balance < Decimal::ZERO {
            return Err(ConfigurationError::InvalidValue {
                field: "registration.bonus_balance".to_string(),
                value: config.registration.bonus_balance.to_string(),
                reason: "Bonus cannot be negative".to_string(),
            });
        }

        config.game.validate().map_err(|e| ConfigurationError::InvalidValue {
            field: "game".to_string(),
            value: format!(
                "{}/{}/{}",
                config.game.win_rate, config.game.min_multiplier, config.game.max_multiplier
            ),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, config: &AppConfig, path: &str) -> ConfigResult<()> {
        let toml_string = toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, toml_string)
            .map_err(|e| ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)))
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &str) -> ConfigResult<()> {
    ConfigLoader::new().save(&AppConfig::default(), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.registration.follower_threshold, 100);
        assert_eq!(config.registration.bonus_balance, dec!(1000));
        assert!(ConfigLoader::new().validate(&config).is_ok());
    }

    #[test]
    fn test_registration_policy() {
        let policy = RegistrationPolicy::default();
        assert_eq!(policy.initial_balance(99), Decimal::ZERO);
        assert_eq!(policy.initial_balance(100), dec!(1000));
        assert_eq!(policy.initial_balance(5_000), dec!(1000));
    }

    #[test]
    fn test_config_validation() {
        let loader = ConfigLoader::new();
        let mut config = AppConfig::default();

        config.server.port = 0;
        assert!(loader.validate(&config).is_err());

        config.server.port = 8080;
        config.game.win_rate = dec!(75);
        assert!(loader.validate(&config).is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [registration]
            follower_threshold = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.registration.follower_threshold, 50);
        assert_eq!(config.registration.bonus_balance, dec!(1000));
        assert_eq!(config.game, GameConfig::default());
    }

    #[test]
    fn test_save_and_load_config() -> ConfigResult<()> {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        let mut original = AppConfig::default();
        original.storage.backend = StorageBackend::Memory;
        original.channel.slug = Some("zeppelin_tv".to_string());

        let loader = ConfigLoader::new();
        loader.save(&original, path)?;
        let loaded = ConfigLoader::new().with_path(path).load_from_file(path)?;

        assert_eq!(loaded.storage.backend, StorageBackend::Memory);
        assert_eq!(loaded.channel.slug.as_deref(), Some("zeppelin_tv"));
        assert_eq!(loaded.game, original.game);
        Ok(())
    }
}
