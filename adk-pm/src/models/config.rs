//! Configuration management for the product-management pipeline.
//!
//! This module provides configuration structures for:
//! - Stage readiness thresholds
//! - Publisher endpoints and retry budget
//! - Telemetry and console verbosity
//! - Overall pipeline configuration
//!
//! ## Validation
//!
//! All configuration is validated on startup to fail fast with descriptive errors.
//! Use `PmConfig::from_env()` to load and validate configuration from environment
//! variables, or use the builder pattern with `.build()` for programmatic configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Maximum allowed publish retries.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Maximum allowed team size for sprint planning.
pub const MAX_TEAM_SIZE: u32 = 50;

/// Maximum allowed number of sprints in a plan.
pub const MAX_TOTAL_SPRINTS: u32 = 26;

/// Maximum number of kept revisions per stage.
pub const MAX_REVISIONS_LIMIT: usize = 100;

/// Maximum publish timeout (ten minutes).
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Validation error with context and suggestions.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field that failed validation
    pub field: String,
    /// Description of the error
    pub message: String,
    /// Suggested fix or valid values
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, ". {}", suggestion)?;
        }
        Ok(())
    }
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion to the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::error::Error for ValidationError {}

/// Console verbosity.
///
/// Each level includes everything shown by the levels below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    /// Only errors and final status
    Minimal,
    /// Human-readable progress
    #[default]
    Normal,
    /// Routing decisions and publish attempts
    Verbose,
    /// Full internal state
    Debug,
}

impl DebugLevel {
    pub fn is_minimal(self) -> bool {
        self == DebugLevel::Minimal
    }

    /// Normal or above.
    pub fn is_normal(self) -> bool {
        self >= DebugLevel::Normal
    }

    /// Verbose or above.
    pub fn is_verbose(self) -> bool {
        self >= DebugLevel::Verbose
    }

    /// Debug only.
    pub fn is_debug(self) -> bool {
        self == DebugLevel::Debug
    }

    /// Default tracing filter directive for this level.
    pub fn filter_directive(self) -> &'static str {
        match self {
            DebugLevel::Minimal => "adk_pm=error",
            DebugLevel::Normal => "adk_pm=warn",
            DebugLevel::Verbose => "adk_pm=info",
            DebugLevel::Debug => "adk_pm=debug",
        }
    }
}

impl FromStr for DebugLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minimal" | "quiet" => Ok(DebugLevel::Minimal),
            "normal" => Ok(DebugLevel::Normal),
            "verbose" => Ok(DebugLevel::Verbose),
            "debug" => Ok(DebugLevel::Debug),
            other => Err(ValidationError::new(
                "debug_level",
                format!("Invalid debug level '{}'", other),
            )
            .with_suggestion("Use one of: minimal, normal, verbose, debug")),
        }
    }
}

impl std::fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DebugLevel::Minimal => write!(f, "minimal"),
            DebugLevel::Normal => write!(f, "normal"),
            DebugLevel::Verbose => write!(f, "verbose"),
            DebugLevel::Debug => write!(f, "debug"),
        }
    }
}

/// Thresholds a stage artifact must meet to be marked ready for the next step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadinessThresholds {
    /// Minimum core features on a refined idea
    #[serde(default = "default_min_core_features")]
    pub min_core_features: usize,
    /// Minimum target users on a refined idea
    #[serde(default = "default_min_target_users")]
    pub min_target_users: usize,
    /// Ideas with fewer words than this trigger clarifying questions
    #[serde(default = "default_min_idea_words")]
    pub min_idea_words: usize,
    /// Minimum user stories
    #[serde(default = "default_min_stories")]
    pub min_stories: usize,
    /// Minimum MVP stories
    #[serde(default = "default_min_mvp_stories")]
    pub min_mvp_stories: usize,
    /// Minimum success metrics on a PRD
    #[serde(default = "default_min_success_metrics")]
    pub min_success_metrics: usize,
}

fn default_min_core_features() -> usize {
    3
}

fn default_min_target_users() -> usize {
    1
}

fn default_min_idea_words() -> usize {
    5
}

fn default_min_stories() -> usize {
    5
}

fn default_min_mvp_stories() -> usize {
    3
}

fn default_min_success_metrics() -> usize {
    1
}

impl Default for ReadinessThresholds {
    fn default() -> Self {
        Self {
            min_core_features: default_min_core_features(),
            min_target_users: default_min_target_users(),
            min_idea_words: default_min_idea_words(),
            min_stories: default_min_stories(),
            min_mvp_stories: default_min_mvp_stories(),
            min_success_metrics: default_min_success_metrics(),
        }
    }
}

impl ReadinessThresholds {
    /// Validate the thresholds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.min_mvp_stories > self.min_stories {
            return Err(ValidationError::new(
                "readiness.min_mvp_stories",
                format!(
                    "MVP story minimum {} exceeds total story minimum {}",
                    self.min_mvp_stories, self.min_stories
                ),
            )
            .with_suggestion("Keep min_mvp_stories less than or equal to min_stories"));
        }

        if self.min_idea_words == 0 {
            return Err(ValidationError::new(
                "readiness.min_idea_words",
                "Minimum idea length must be greater than 0",
            )
            .with_suggestion("Use at least 1 (recommended: 5)"));
        }

        Ok(())
    }
}

/// Publisher endpoints and retry budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishConfig {
    /// Maximum retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on the retry delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Per-attempt timeout; a timeout counts as a failure
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Endpoint receiving PRD documents
    #[serde(default)]
    pub document_store_url: Option<String>,
    /// Endpoint receiving sprint plans
    #[serde(default)]
    pub issue_tracker_url: Option<String>,
    /// Endpoint receiving visual boards
    #[serde(default)]
    pub whiteboard_url: Option<String>,
    /// Bearer token sent to every endpoint
    #[serde(default, skip_serializing)]
    pub api_token: Option<String>,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    4_000
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_ms: default_timeout_ms(),
            document_store_url: None,
            issue_tracker_url: None,
            whiteboard_url: None,
            api_token: None,
        }
    }
}

impl PublishConfig {
    /// Validate publish settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ValidationError::new(
                "publish.max_retries",
                format!(
                    "Max retries {} exceeds limit of {}",
                    self.max_retries, MAX_RETRIES_LIMIT
                ),
            )
            .with_suggestion(format!("Use a value between 0 and {}", MAX_RETRIES_LIMIT)));
        }

        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ValidationError::new(
                "publish.timeout_ms",
                format!("Timeout {}ms is out of range", self.timeout_ms),
            )
            .with_suggestion(format!("Use a value between 1 and {}", MAX_TIMEOUT_MS)));
        }

        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ValidationError::new(
                "publish.initial_backoff_ms",
                "Initial backoff cannot exceed the maximum backoff",
            )
            .with_suggestion("Lower ADK_PM_PUBLISH_INITIAL_BACKOFF_MS or raise ADK_PM_PUBLISH_MAX_BACKOFF_MS"));
        }

        validate_url("publish.document_store_url", self.document_store_url.as_deref())?;
        validate_url("publish.issue_tracker_url", self.issue_tracker_url.as_deref())?;
        validate_url("publish.whiteboard_url", self.whiteboard_url.as_deref())?;

        Ok(())
    }
}

fn validate_url(field: &str, url: Option<&str>) -> Result<(), ValidationError> {
    let Some(url) = url else {
        return Ok(());
    };

    if url.is_empty() {
        return Err(ValidationError::new(field, "URL cannot be empty if specified")
            .with_suggestion("Either unset the variable or provide a URL like 'https://example.com/hook'"));
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::new(
            field,
            format!("URL '{}' must start with http:// or https://", url),
        )
        .with_suggestion("Use a valid URL like 'https://example.com/hook'"));
    }

    Ok(())
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryConfig {
    /// Whether telemetry is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Service name reported on metrics
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Whether metrics are recorded
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_true() -> bool {
    true
}

fn default_service_name() -> String {
    "adk-pm".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: default_service_name(),
            enable_metrics: true,
            log_level: default_log_level(),
        }
    }
}

impl TelemetryConfig {
    /// Create from environment variables.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(enabled) = lookup("ADK_PM_TELEMETRY_ENABLED") {
            config.enabled = enabled.to_lowercase() == "true";
        }
        if let Some(name) = lookup("ADK_PM_SERVICE_NAME") {
            config.service_name = name;
        }
        if let Some(metrics) = lookup("ADK_PM_ENABLE_METRICS") {
            config.enable_metrics = metrics.to_lowercase() == "true";
        }
        if let Some(level) = lookup("ADK_PM_LOG_LEVEL") {
            config.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate telemetry config.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::new(
                "log_level",
                format!("Invalid log level '{}'", self.log_level),
            )
            .with_suggestion(format!("Valid log levels: {:?}", valid_levels)));
        }

        if self.service_name.is_empty() {
            return Err(ValidationError::new(
                "service_name",
                "Service name cannot be empty",
            )
            .with_suggestion("Set ADK_PM_SERVICE_NAME or use default 'adk-pm'"));
        }

        Ok(())
    }
}

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PmConfig {
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Stage readiness thresholds
    #[serde(default)]
    pub readiness: ReadinessThresholds,
    /// Publisher configuration
    #[serde(default)]
    pub publish: PublishConfig,
    /// Directory holding persisted sessions
    #[serde(default = "default_session_dir")]
    pub session_dir: String,
    /// Overwritten artifacts kept per stage
    #[serde(default = "default_max_revisions")]
    pub max_revisions: usize,
    /// Console verbosity
    #[serde(default)]
    pub debug_level: DebugLevel,
}

fn default_session_dir() -> String {
    ".adk-pm/sessions".to_string()
}

fn default_max_revisions() -> usize {
    5
}

impl Default for PmConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            readiness: ReadinessThresholds::default(),
            publish: PublishConfig::default(),
            session_dir: default_session_dir(),
            max_revisions: default_max_revisions(),
            debug_level: DebugLevel::default(),
        }
    }
}

impl PmConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PmConfigBuilder {
        PmConfigBuilder::default()
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// ## Environment Variables
    ///
    /// - `ADK_PM_SESSION_DIR` - Session directory (default: .adk-pm/sessions)
    /// - `ADK_PM_MAX_REVISIONS` - Revisions kept per stage (default: 5)
    /// - `ADK_PM_DEBUG_LEVEL` - minimal, normal, verbose or debug
    /// - `ADK_PM_PUBLISH_MAX_RETRIES` - Publish retries (default: 2)
    /// - `ADK_PM_PUBLISH_INITIAL_BACKOFF_MS` - First retry delay (default: 250)
    /// - `ADK_PM_PUBLISH_MAX_BACKOFF_MS` - Retry delay cap (default: 4000)
    /// - `ADK_PM_PUBLISH_TIMEOUT_MS` - Per-attempt timeout (default: 10000)
    /// - `ADK_PM_DOCUMENT_STORE_URL`, `ADK_PM_ISSUE_TRACKER_URL`,
    ///   `ADK_PM_WHITEBOARD_URL` - Publisher endpoints
    /// - `ADK_PM_API_TOKEN` - Bearer token for publishers
    /// - `ADK_PM_MIN_STORIES`, `ADK_PM_MIN_MVP_STORIES`,
    ///   `ADK_PM_MIN_CORE_FEATURES` - Readiness thresholds
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Used by `from_env` and by tests that should not touch the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            telemetry: TelemetryConfig::from_lookup(&lookup)?,
            ..Default::default()
        };

        if let Some(dir) = lookup("ADK_PM_SESSION_DIR") {
            config.session_dir = dir;
        }
        if let Some(value) = lookup("ADK_PM_MAX_REVISIONS") {
            config.max_revisions = parse_number("max_revisions", "ADK_PM_MAX_REVISIONS", &value)?;
        }
        if let Some(value) = lookup("ADK_PM_DEBUG_LEVEL") {
            config.debug_level = value.parse()?;
        }

        if let Some(value) = lookup("ADK_PM_PUBLISH_MAX_RETRIES") {
            config.publish.max_retries =
                parse_number("publish.max_retries", "ADK_PM_PUBLISH_MAX_RETRIES", &value)?;
        }
        if let Some(value) = lookup("ADK_PM_PUBLISH_INITIAL_BACKOFF_MS") {
            config.publish.initial_backoff_ms = parse_number(
                "publish.initial_backoff_ms",
                "ADK_PM_PUBLISH_INITIAL_BACKOFF_MS",
                &value,
            )?;
        }
        if let Some(value) = lookup("ADK_PM_PUBLISH_MAX_BACKOFF_MS") {
            config.publish.max_backoff_ms =
                parse_number("publish.max_backoff_ms", "ADK_PM_PUBLISH_MAX_BACKOFF_MS", &value)?;
        }
        if let Some(value) = lookup("ADK_PM_PUBLISH_TIMEOUT_MS") {
            config.publish.timeout_ms =
                parse_number("publish.timeout_ms", "ADK_PM_PUBLISH_TIMEOUT_MS", &value)?;
        }
        config.publish.document_store_url = lookup("ADK_PM_DOCUMENT_STORE_URL");
        config.publish.issue_tracker_url = lookup("ADK_PM_ISSUE_TRACKER_URL");
        config.publish.whiteboard_url = lookup("ADK_PM_WHITEBOARD_URL");
        config.publish.api_token = lookup("ADK_PM_API_TOKEN");

        if let Some(value) = lookup("ADK_PM_MIN_STORIES") {
            config.readiness.min_stories =
                parse_number("readiness.min_stories", "ADK_PM_MIN_STORIES", &value)?;
        }
        if let Some(value) = lookup("ADK_PM_MIN_MVP_STORIES") {
            config.readiness.min_mvp_stories =
                parse_number("readiness.min_mvp_stories", "ADK_PM_MIN_MVP_STORIES", &value)?;
        }
        if let Some(value) = lookup("ADK_PM_MIN_CORE_FEATURES") {
            config.readiness.min_core_features =
                parse_number("readiness.min_core_features", "ADK_PM_MIN_CORE_FEATURES", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration settings.
    ///
    /// Returns a descriptive error with suggestions on failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.telemetry.validate()?;
        self.readiness.validate()?;
        self.publish.validate()?;

        if self.session_dir.trim().is_empty() {
            return Err(ValidationError::new("session_dir", "Session directory cannot be empty")
                .with_suggestion("Set ADK_PM_SESSION_DIR to a directory path"));
        }

        if self.session_dir.contains('\0') {
            return Err(ValidationError::new(
                "session_dir",
                "Session directory contains null bytes",
            )
            .with_suggestion("Remove null characters from the path"));
        }

        if self.max_revisions > MAX_REVISIONS_LIMIT {
            return Err(ValidationError::new(
                "max_revisions",
                format!(
                    "Max revisions {} exceeds limit of {}",
                    self.max_revisions, MAX_REVISIONS_LIMIT
                ),
            )
            .with_suggestion(format!("Use a value between 0 and {}", MAX_REVISIONS_LIMIT)));
        }

        Ok(())
    }
}

fn parse_number<T>(field: &str, var: &str, value: &str) -> Result<T, ValidationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        ValidationError::new(field, format!("Invalid {} '{}': {}", var, value, e))
            .with_suggestion("Use a non-negative integer")
    })
}

/// Builder for PmConfig with fluent API.
#[derive(Debug, Clone, Default)]
pub struct PmConfigBuilder {
    config: PmConfig,
}

impl PmConfigBuilder {
    /// Set the telemetry configuration.
    pub fn telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Set the readiness thresholds.
    pub fn readiness(mut self, readiness: ReadinessThresholds) -> Self {
        self.config.readiness = readiness;
        self
    }

    /// Set the publisher configuration.
    pub fn publish(mut self, publish: PublishConfig) -> Self {
        self.config.publish = publish;
        self
    }

    /// Set the session directory.
    pub fn session_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.session_dir = dir.into();
        self
    }

    /// Set the number of kept revisions per stage.
    pub fn max_revisions(mut self, revisions: usize) -> Self {
        self.config.max_revisions = revisions;
        self
    }

    /// Set the console verbosity.
    pub fn debug_level(mut self, level: DebugLevel) -> Self {
        self.config.debug_level = level;
        self
    }

    /// Build the configuration, validating it first.
    pub fn build(self) -> Result<PmConfig, ValidationError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration without validation.
    pub fn build_unchecked(self) -> PmConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PmConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.readiness.min_stories, 5);
        assert_eq!(config.readiness.min_mvp_stories, 3);
        assert_eq!(config.debug_level, DebugLevel::Normal);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = PmConfig::from_lookup(lookup_from(&[
            ("ADK_PM_SESSION_DIR", "/tmp/pm"),
            ("ADK_PM_MAX_REVISIONS", "9"),
            ("ADK_PM_DEBUG_LEVEL", "verbose"),
            ("ADK_PM_PUBLISH_MAX_RETRIES", "4"),
            ("ADK_PM_DOCUMENT_STORE_URL", "https://docs.example.com/pages"),
        ]))
        .unwrap();

        assert_eq!(config.session_dir, "/tmp/pm");
        assert_eq!(config.max_revisions, 9);
        assert_eq!(config.debug_level, DebugLevel::Verbose);
        assert_eq!(config.publish.max_retries, 4);
        assert_eq!(
            config.publish.document_store_url.as_deref(),
            Some("https://docs.example.com/pages")
        );
    }

    #[test]
    fn test_from_lookup_rejects_garbage_numbers() {
        let err = PmConfig::from_lookup(lookup_from(&[("ADK_PM_MAX_REVISIONS", "lots")]))
            .unwrap_err();
        assert_eq!(err.field, "max_revisions");
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_publish_retry_limit() {
        let config = PmConfig::builder()
            .publish(PublishConfig {
                max_retries: MAX_RETRIES_LIMIT + 1,
                ..Default::default()
            })
            .build();
        assert!(config.is_err());
    }

    #[test]
    fn test_publish_url_validation() {
        let publish = PublishConfig {
            whiteboard_url: Some("ftp://boards".to_string()),
            ..Default::default()
        };
        let err = publish.validate().unwrap_err();
        assert_eq!(err.field, "publish.whiteboard_url");
    }

    #[test]
    fn test_readiness_validation() {
        let readiness = ReadinessThresholds {
            min_stories: 2,
            min_mvp_stories: 3,
            ..Default::default()
        };
        assert!(readiness.validate().is_err());
    }

    #[test]
    fn test_debug_level_ordering() {
        assert!(DebugLevel::Debug.is_verbose());
        assert!(DebugLevel::Verbose.is_normal());
        assert!(!DebugLevel::Minimal.is_normal());
        assert!(!DebugLevel::Verbose.is_debug());
        assert!("loud".parse::<DebugLevel>().is_err());
    }

    #[test]
    fn test_api_token_not_serialized() {
        let publish = PublishConfig {
            api_token: Some("secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&publish).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("max_revisions", "too many").with_suggestion("use 5");
        assert_eq!(err.to_string(), "max_revisions: too many. use 5");
    }
}
