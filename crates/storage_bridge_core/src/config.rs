//! Bridge configuration and `sync` seed defaults.
//!
//! # Responsibility
//! - Own the default contents of the `sync` namespace.
//! - Resolve logging and seed overrides from the environment or a JSON file.
//!
//! # Invariants
//! - `SeedConfig::default()` reproduces the shipped `options` record.
//! - Every feature flag key carries the `feature:` prefix.
//! - Blank environment values are ignored, never treated as overrides.

use crate::model::value::{StoredValue, ValueMap};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Env var overriding the log level (`trace|debug|info|warn|error`).
pub const ENV_LOG_LEVEL: &str = "STORAGE_BRIDGE_LOG_LEVEL";
/// Env var overriding the absolute log directory.
pub const ENV_LOG_DIR: &str = "STORAGE_BRIDGE_LOG_DIR";
/// Env var replacing the feature flag list (comma-separated).
pub const ENV_FEATURE_FLAGS: &str = "STORAGE_BRIDGE_FEATURE_FLAGS";

/// Top-level key of the seeded `sync` record.
pub const OPTIONS_KEY: &str = "options";
pub const OPTION_CUSTOM_CSS: &str = "customCSS";
pub const OPTION_PERSONAL_TOKEN: &str = "personalToken";
pub const OPTION_LOGGING: &str = "logging";

/// Feature flags seeded as `false` on startup.
pub const DEFAULT_FEATURE_FLAGS: &[&str] = &[
    "feature:recently-pushed-branches-enhancements",
    "feature:mark-unread",
    "feature:more-dropdown",
    "feature:pinned-issues-update-time",
    "feature:releases-tab",
    "feature:split-issue-pr-search-results",
    "feature:tags-dropdown",
];

static FEATURE_FLAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^feature:[a-z0-9][a-z0-9-]*$").expect("valid feature flag regex"));

/// Defaults written into the `sync` namespace at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub custom_css: String,
    pub logging: bool,
    pub feature_flags: Vec<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            custom_css: String::new(),
            logging: true,
            feature_flags: DEFAULT_FEATURE_FLAGS
                .iter()
                .map(|flag| flag.to_string())
                .collect(),
        }
    }
}

impl SeedConfig {
    /// Builds the initial `sync` contents.
    ///
    /// `personal_token` is read from the settings provider by the caller.
    pub fn build_sync_seed(&self, personal_token: &str) -> ValueMap {
        let mut options = ValueMap::new();
        options.insert(
            OPTION_CUSTOM_CSS.to_string(),
            StoredValue::from(self.custom_css.as_str()),
        );
        options.insert(
            OPTION_PERSONAL_TOKEN.to_string(),
            StoredValue::from(personal_token),
        );
        options.insert(OPTION_LOGGING.to_string(), StoredValue::Bool(self.logging));
        for flag in &self.feature_flags {
            options.insert(flag.clone(), StoredValue::Bool(false));
        }

        let mut seed = ValueMap::new();
        seed.insert(OPTIONS_KEY.to_string(), StoredValue::Record(options));
        seed
    }
}

/// Verbosity of the bridge log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    /// Parses a level name; case and surrounding whitespace are ignored.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConfigError::InvalidLogLevel(raw.trim().to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// `debug` in debug builds, `info` in release builds.
impl Default for LogLevel {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Info
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub seed: SeedConfig,
    pub log_level: LogLevel,
    /// Absolute directory for rolling log files; `None` leaves logging off.
    pub log_dir: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            seed: SeedConfig::default(),
            log_level: LogLevel::default(),
            log_dir: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults with process environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Parses a JSON config document; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides resolved through `lookup` (usually the environment).
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            self.log_level = LogLevel::parse(&level)?;
        }
        if let Some(dir) = non_blank(lookup(ENV_LOG_DIR)) {
            self.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(flags) = non_blank(lookup(ENV_FEATURE_FLAGS)) {
            self.seed.feature_flags = flags
                .split(',')
                .map(str::trim)
                .filter(|flag| !flag.is_empty())
                .map(str::to_string)
                .collect();
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks feature flag shape.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(flag) = self
            .seed
            .feature_flags
            .iter()
            .find(|flag| !FEATURE_FLAG_RE.is_match(flag))
        {
            return Err(ConfigError::InvalidFeatureFlag(flag.clone()));
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Configuration resolution errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidLogLevel(String),
    InvalidFeatureFlag(String),
    Parse(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLogLevel(value) => {
                write!(f, "unsupported log level `{value}`; expected trace|debug|info|warn|error")
            }
            Self::InvalidFeatureFlag(value) => {
                write!(f, "feature flag must match `feature:<kebab-name>`: {value}")
            }
            Self::Parse(message) => write!(f, "invalid bridge config: {message}"),
        }
    }
}

impl Error for ConfigError {}
