use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

const PROJECT_CONFIG: &str = ".cadre/config.yaml";
const LOCAL_CONFIG: &str = ".cadre/local.yaml";
const ENV_PREFIX: &str = "CADRE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid fleet size: {0}. Must be between 1 and 100 agents")]
    InvalidFleetSize(usize),

    #[error("Invalid agent_timeout_secs: {0}. Must be positive")]
    InvalidAgentTimeout(u64),

    #[error("Invalid poll_interval_ms: {0}. Must be positive")]
    InvalidPollInterval(u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Issue sync is enabled but tracker.owner and tracker.repo are not both set")]
    MissingTracker,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .cadre/config.yaml (project config)
    /// 3. .cadre/local.yaml (project local overrides, optional)
    /// 4. Environment variables (`CADRE_*` prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        Self::load_with(None)
    }

    /// Like [`load`](Self::load), with an explicit file replacing
    /// `.cadre/config.yaml` when given.
    pub fn load_with(path: Option<&Path>) -> Result<Config> {
        let primary = path.unwrap_or_else(|| Path::new(PROJECT_CONFIG));
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(primary))
            .merge(Yaml::file(LOCAL_CONFIG))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, without local or
    /// environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let total = config.fleet.total_agents();
        if total == 0 || total > 100 {
            return Err(ConfigError::InvalidFleetSize(total));
        }

        if config.scheduler.agent_timeout_secs == 0 {
            return Err(ConfigError::InvalidAgentTimeout(0));
        }
        if config.scheduler.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(0));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(0));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.sync.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(0));
        }
        if config.sync.initial_backoff_ms >= config.sync.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.sync.initial_backoff_ms,
                config.sync.max_backoff_ms,
            ));
        }
        if config.sync.latency_window == 0 {
            return Err(ConfigError::ValidationFailed(
                "sync.latency_window must be at least 1".to_string(),
            ));
        }
        if config.sync.enabled && (config.tracker.owner.is_empty() || config.tracker.repo.is_empty()) {
            return Err(ConfigError::MissingTracker);
        }
        if config.tracker.requests_per_hour == 0 {
            return Err(ConfigError::ValidationFailed(
                "tracker.requests_per_hour must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{LogFormat, Persona};
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.fleet.total_agents(), 4);
        assert_eq!(config.database.path, ".cadre/cadre.db");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "fleet:\n  agents:\n    developer: 5\n    qa: 2\nlogging:\n  level: debug\n  format: json"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.fleet.agents.get(&Persona::Developer), Some(&5));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scheduler:\n  poll_interval_ms: 500").unwrap();

        temp_env::with_vars(
            [
                ("CADRE_SCHEDULER__POLL_INTERVAL_MS", Some("75")),
                ("CADRE_CACHE__ENABLED", Some("false")),
            ],
            || {
                let config = ConfigLoader::load_with(Some(file.path())).unwrap();
                assert_eq!(config.scheduler.poll_interval_ms, 75);
                assert!(!config.cache.enabled);
            },
        );
    }

    #[test]
    fn test_validate_empty_fleet() {
        let mut config = Config::default();
        config.fleet.agents.clear();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidFleetSize(0))
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.sync.initial_backoff_ms = 5000;
        config.sync.max_backoff_ms = 1000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(5000, 1000))
        ));
    }

    #[test]
    fn test_validate_sync_requires_tracker() {
        let mut config = Config::default();
        config.sync.enabled = true;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::MissingTracker)
        ));

        config.tracker.owner = "acme".into();
        config.tracker.repo = "app".into();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".into();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }
}
