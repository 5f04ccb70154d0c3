//! services/cli/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Whether the tool runs for development or for real use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "dev" | "development" => Some(Environment::Development),
            "prod" | "production" => Some(Environment::Production),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "dev",
            Environment::Production => "prod",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub base_dir: PathBuf,
    pub questions_path: PathBuf,
    pub results_path: PathBuf,
    pub log_path: PathBuf,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    pub llm_min_interval: Duration,
    pub llm_fallback_on_error: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Environment and Storage Locations ---
        let environment = match lookup("LEARNING_TOOL_ENV") {
            Some(value) => Environment::parse(&value).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "LEARNING_TOOL_ENV".to_string(),
                    format!("'{}' is not one of dev, development, prod, production", value),
                )
            })?,
            None => Environment::Development,
        };

        let base_dir = lookup("LEARNING_TOOL_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let questions_path = path_or(&lookup, "QUESTIONS_PATH", &base_dir, "questions.json");
        let results_path = path_or(&lookup, "RESULTS_PATH", &base_dir, "results.txt");
        let log_path = path_or(&lookup, "LOG_FILE", &base_dir, "study.log");

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Key (as optional) ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());

        // --- Load Language Model Settings ---
        let llm_model = lookup("LLM_MODEL").unwrap_or_else(|| "gpt-4.1-mini".to_string());
        let llm_timeout = Duration::from_secs(parse_or(&lookup, "LLM_TIMEOUT_SECS", 30u64)?);
        let llm_max_retries = parse_or(&lookup, "LLM_MAX_RETRIES", 3u32)?;
        let llm_min_interval =
            Duration::from_millis(parse_or(&lookup, "LLM_MIN_INTERVAL_MS", 1000u64)?);
        let llm_fallback_on_error = parse_or(&lookup, "LLM_FALLBACK_ON_ERROR", false)?;

        Ok(Self {
            environment,
            base_dir,
            questions_path,
            results_path,
            log_path,
            log_level,
            openai_api_key,
            llm_model,
            llm_timeout,
            llm_max_retries,
            llm_min_interval,
            llm_fallback_on_error,
        })
    }
}

fn path_or<F>(lookup: &F, key: &str, base_dir: &Path, file_name: &str) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| base_dir.join(file_name))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.questions_path, PathBuf::from("./questions.json"));
        assert_eq!(config.results_path, PathBuf::from("./results.txt"));
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.llm_model, "gpt-4.1-mini");
        assert_eq!(config.llm_timeout, Duration::from_secs(30));
        assert_eq!(config.llm_max_retries, 3);
        assert_eq!(config.llm_min_interval, Duration::from_millis(1000));
        assert!(!config.llm_fallback_on_error);
    }

    #[test]
    fn paths_follow_the_base_dir_unless_overridden() {
        let config = config_from(&[
            ("LEARNING_TOOL_BASE_DIR", "/tmp/study"),
            ("RESULTS_PATH", "/var/scores.txt"),
        ])
        .unwrap();

        assert_eq!(config.questions_path, PathBuf::from("/tmp/study/questions.json"));
        assert_eq!(config.results_path, PathBuf::from("/var/scores.txt"));
        assert_eq!(config.log_path, PathBuf::from("/tmp/study/study.log"));
    }

    #[test]
    fn production_and_llm_settings_are_read() {
        let config = config_from(&[
            ("LEARNING_TOOL_ENV", "Production"),
            ("OPENAI_API_KEY", "sk-test"),
            ("LLM_MODEL", "gpt-4o-mini"),
            ("LLM_MAX_RETRIES", "5"),
            ("LLM_FALLBACK_ON_ERROR", "true"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm_model, "gpt-4o-mini");
        assert_eq!(config.llm_max_retries, 5);
        assert!(config.llm_fallback_on_error);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = config_from(&[("OPENAI_API_KEY", "  ")]).unwrap();
        assert_eq!(config.openai_api_key, None);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config_from(&[("LEARNING_TOOL_ENV", "staging")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "LEARNING_TOOL_ENV"));

        let err = config_from(&[("LLM_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref var, _) if var == "LLM_TIMEOUT_SECS"));
    }
}
