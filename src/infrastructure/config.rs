//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrent_tasks: {0}. Must be between 1 and 1024")]
    InvalidMaxConcurrent(usize),

    #[error("Invalid role capacity for {0}: capacity cannot be 0")]
    InvalidRoleCapacity(String),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error("Invalid task_timeout_secs: {0}. Cannot be 0")]
    InvalidTaskTimeout(u64),

    #[error("Invalid stress_load_threshold: {0}. Must be in (0, 1]")]
    InvalidStressThreshold(f64),

    #[error("Invalid interval: {0} must be positive")]
    InvalidInterval(&'static str),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. taskweave.yaml in the working directory
    /// 3. Environment variables (`TASKWEAVE_*` prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("taskweave.yaml"))
            .merge(Env::prefixed("TASKWEAVE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
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

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.max_concurrent_tasks == 0 || config.max_concurrent_tasks > 1024 {
            return Err(ConfigError::InvalidMaxConcurrent(
                config.max_concurrent_tasks,
            ));
        }

        for (role, capacity) in &config.role_capacity {
            if *capacity == 0 {
                return Err(ConfigError::InvalidRoleCapacity(role.clone()));
            }
        }

        if config.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(config.max_retries));
        }

        if config.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidTaskTimeout(config.task_timeout_secs));
        }

        if config.stress_load_threshold <= 0.0 || config.stress_load_threshold > 1.0 {
            return Err(ConfigError::InvalidStressThreshold(
                config.stress_load_threshold,
            ));
        }

        if config.health_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("health_interval_ms"));
        }
        if config.optimizer_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("optimizer_interval_ms"));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.max_concurrent_tasks, 8);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let config = Config {
            max_concurrent_tasks: 0,
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConcurrent(0)
        ));
    }

    #[test]
    fn test_validate_zero_role_capacity() {
        let mut config = Config::default();
        config
            .role_capacity
            .insert("communication".to_string(), 0);
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidRoleCapacity(_)
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "loud"),
            other => panic!("expected InvalidLogLevel, got {other}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_validate_stress_threshold_bounds() {
        let mut config = Config::default();
        config.stress_load_threshold = 0.0;
        assert!(ConfigLoader::validate(&config).is_err());
        config.stress_load_threshold = 1.5;
        assert!(ConfigLoader::validate(&config).is_err());
        config.stress_load_threshold = 1.0;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_load_from_file_merges_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "max_concurrent_tasks: 4\nlogging:\n  level: debug"
        )
        .unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.logging.level, "debug");
        // Untouched fields keep their defaults.
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "max_retries: 0").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
