//! TOML-based configuration for nlq.
//!
//! Supports a config file (nlq.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [translation]
//! confidence_epsilon = 0.05
//! similarity_threshold = 0.7
//! max_clarification_rounds = 1
//! default_row_limit = 1000
//! dialect = "tsql"
//! parameter_marker = "@"
//! parameter_prefix = "p"
//! extraction_timeout_ms = 5000
//!
//! [knowledge]
//! catalog_path = "${NLQ_HOME}/catalog.toml"
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use crate::sql::dialect::Dialect;

/// Bind-parameter markers the generated SQL may use.
pub const PARAMETER_MARKERS: [&str; 3] = ["@", ":", "$"];

static PARAMETER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").unwrap());

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub translation: TranslationSettings,
    pub knowledge: KnowledgeSettings,
}

/// Tuning for extraction, clarification and SQL generation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationSettings {
    /// Two candidates closer than this are ambiguous.
    pub confidence_epsilon: f64,

    /// Candidates scoring below this are discarded (0.0 to 1.0).
    pub similarity_threshold: f64,

    /// Clarification rounds allowed before a query fails.
    pub max_clarification_rounds: u32,

    /// Row limit applied when the question names none.
    pub default_row_limit: u64,

    pub dialect: Dialect,

    /// Placeholder marker written before parameter names (`@p1`, `:p1`).
    pub parameter_marker: String,

    pub parameter_prefix: String,

    /// Upper bound on one call to the entity recognizer.
    pub extraction_timeout_ms: u64,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            confidence_epsilon: 0.05,
            similarity_threshold: 0.7,
            max_clarification_rounds: 1,
            default_row_limit: 1000,
            dialect: Dialect::default(),
            parameter_marker: "@".to_string(),
            parameter_prefix: "p".to_string(),
            extraction_timeout_ms: 5000,
        }
    }
}

impl TranslationSettings {
    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.confidence_epsilon.is_finite() || self.confidence_epsilon < 0.0 {
            return Err(SettingsError::InvalidConfig(format!(
                "confidence_epsilon must be a non-negative number, got {}",
                self.confidence_epsilon
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(SettingsError::InvalidConfig(format!(
                "similarity_threshold must be between 0 and 1, got {}",
                self.similarity_threshold
            )));
        }
        if self.default_row_limit == 0 {
            return Err(SettingsError::InvalidConfig(
                "default_row_limit must be greater than zero".to_string(),
            ));
        }
        if !PARAMETER_MARKERS.contains(&self.parameter_marker.as_str()) {
            return Err(SettingsError::InvalidConfig(format!(
                "parameter_marker must be one of {}, got '{}'",
                PARAMETER_MARKERS.join(" "),
                self.parameter_marker
            )));
        }
        if !PARAMETER_PREFIX_RE.is_match(&self.parameter_prefix) {
            return Err(SettingsError::InvalidConfig(format!(
                "parameter_prefix must start with a letter or '_' and contain only word characters, got '{}'",
                self.parameter_prefix
            )));
        }
        Ok(())
    }
}

/// Where the catalog comes from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    /// Catalog TOML file (supports ${ENV_VAR} expansion). The built-in
    /// gaming catalog is used when unset.
    pub catalog_path: Option<String>,
}

impl KnowledgeSettings {
    pub fn resolved_catalog_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.catalog_path
            .as_deref()
            .map(|p| expand_env_vars(p).map(PathBuf::from))
            .transpose()
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.translation.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `NLQ_CONFIG`
    /// 2. `./nlq.toml`
    /// 3. `~/.config/nlq/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("NLQ_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("nlq.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("nlq").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
