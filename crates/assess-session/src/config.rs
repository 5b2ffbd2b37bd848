//! Configuration types for the assessment session.
//!
//! Configuration is read from an `assess.json` file in camelCase. Every field
//! has a default, so a missing file yields a usable development setup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "assess.json";

/// Backend origin used in development when `apiBaseUrl` is unset.
pub const DEFAULT_DEV_BASE_URL: &str = "http://localhost:8000";

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_candidate_id() -> String {
    "candidate-1".to_string()
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_max_code_length() -> usize {
    50_000
}

fn default_output_dir() -> String {
    ".".to_string()
}

const fn default_true() -> bool {
    true
}

/// Main configuration for an assessment session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backend origin, e.g. `https://assess.example.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Path prefix for every endpoint.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Candidate identity sent with every call.
    #[serde(default = "default_candidate_id")]
    pub candidate_id: String,

    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,

    /// Fall back to the built-in demo assessment when loading fails.
    #[serde(default)]
    pub demo_fallback: bool,

    /// How repeated submissions for one question are treated.
    #[serde(default)]
    pub submit_policy: SubmitPolicy,

    /// Timer tick cadence in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Maximum accepted code length in characters.
    #[serde(default = "default_max_code_length")]
    pub max_code_length: usize,

    /// End-of-session report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_prefix: default_api_prefix(),
            candidate_id: default_candidate_id(),
            environment: Environment::default(),
            demo_fallback: false,
            submit_policy: SubmitPolicy::default(),
            tick_interval_ms: default_tick_interval_ms(),
            request_timeout_seconds: default_request_timeout(),
            max_code_length: default_max_code_length(),
            report: ReportConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `assess.json` exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            SessionError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `assess.json` from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ConfigParseError` for unreadable files or invalid
    /// JSON, and `SessionError::ConfigValidationError` for invalid values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(SessionError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| SessionError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ConfigValidationError` on the first failed check.
    pub fn validate(&self) -> Result<()> {
        if self.candidate_id.trim().is_empty() {
            return Err(SessionError::config_validation(
                "candidateId must not be empty",
                "Set candidateId in your assess.json or pass --candidate",
            ));
        }

        if self.environment == Environment::Production {
            if self.api_base_url.is_none() {
                return Err(SessionError::config_validation(
                    "apiBaseUrl is required in production",
                    "Set apiBaseUrl to the assessment service origin in your assess.json",
                ));
            }
            if self.demo_fallback {
                return Err(SessionError::config_validation(
                    "demoFallback is only allowed in development",
                    "Remove demoFallback or set environment to \"development\"",
                ));
            }
        }

        if let Some(url) = &self.api_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SessionError::config_validation(
                    format!("apiBaseUrl '{url}' must start with http:// or https://"),
                    "Use a full origin such as http://localhost:8000",
                ));
            }
        }

        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(SessionError::config_validation(
                format!("apiPrefix '{}' must start with '/'", self.api_prefix),
                "Use a prefix such as \"/api/v1\", or \"\" for none",
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err(SessionError::config_validation(
                "tickIntervalMs must be greater than 0",
                "Set tickIntervalMs to 1000 for a one-second countdown",
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(SessionError::config_validation(
                "requestTimeoutSeconds must be greater than 0",
                "Set requestTimeoutSeconds to at least 1 in your assess.json",
            ));
        }

        if self.max_code_length == 0 {
            return Err(SessionError::config_validation(
                "maxCodeLength must be greater than 0",
                "Set maxCodeLength to 50000 to match the backend limit",
            ));
        }

        if self.report.output_dir.trim().is_empty() {
            return Err(SessionError::config_validation(
                "report.outputDir must not be empty",
                "Provide a valid output directory in your assess.json (use '.' for current directory)",
            ));
        }

        Ok(())
    }

    /// Returns the backend origin, falling back to localhost in development.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_DEV_BASE_URL)
    }

    /// Returns the timer cadence.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Returns the HTTP request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Returns `true` if load failures may fall back to demo data.
    #[must_use]
    pub fn demo_fallback_enabled(&self) -> bool {
        self.demo_fallback && self.environment == Environment::Development
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    /// Local development (default).
    #[default]
    Development,
    /// Production deployment.
    Production,
}

impl Environment {
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid environment '{s}': expected one of 'development', 'production'"
            ))
        })
    }
}

impl Serialize for Environment {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Development => "development",
            Self::Production => "production",
        };
        serializer.serialize_str(s)
    }
}

/// Policy for repeated submissions of the same question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitPolicy {
    /// Every submission before the deadline supersedes the previous one (default).
    #[default]
    Resubmit,
    /// The first successful submission of a question is final.
    LockOnFirst,
}

impl SubmitPolicy {
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "resubmit" => Some(Self::Resubmit),
            "lockonfirst" | "lock_on_first" | "lock-on-first" => Some(Self::LockOnFirst),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for SubmitPolicy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid submit policy '{s}': expected one of 'resubmit', 'lockOnFirst'"
            ))
        })
    }
}

impl Serialize for SubmitPolicy {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Resubmit => "resubmit",
            Self::LockOnFirst => "lockOnFirst",
        };
        serializer.serialize_str(s)
    }
}

/// End-of-session report settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    /// Whether a report is written when the session ends.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory the report files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            output_dir: default_output_dir(),
        }
    }
}
