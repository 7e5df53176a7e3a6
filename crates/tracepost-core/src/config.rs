//! Configuration module for Tracepost.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! [`ReporterConfig`] is the resolved, validated subset a crash reporter is
//! installed with.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{DomainError, Endpoint, SlotPath};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Tracepost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL crash reports are POSTed to.
    pub endpoint: Option<String>,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
    pub logging: LoggingConfig,
    pub app: AppConfig,
}

/// Local storage settings for the crash record slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of application-local storage.
    pub root: PathBuf,
    /// Slot directory, relative to `root`. Must be set together with `file_name`.
    pub path: Option<String>,
    /// Slot file name. Must be set together with `path`.
    pub file_name: Option<String>,
}

/// HTTP delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Request timeout in seconds, applied by the transport.
    pub timeout_secs: u64,
    /// `User-Agent` header; defaults to `tracepost/<version>`.
    pub user_agent: Option<String>,
    /// How long a panicking thread waits for delivery before running the
    /// previous panic hook.
    pub forward_wait_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Application identity settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Version reported as `package_version`. `None` uses the crate version.
    pub version: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/tracepost/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("tracepost")
            .join("config.yaml")
    }

    /// Resolve the reporter settings from this configuration.
    ///
    /// A partially specified slot (only `path` or only `file_name`) falls
    /// back to the default slot with a warning.
    pub fn reporter_config(&self) -> Result<ReporterConfig, DomainError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(DomainError::MissingEndpoint)?;

        Ok(ReporterConfig::from_parts(
            Endpoint::parse(endpoint)?,
            self.slot_path(),
        ))
    }

    /// The crash record slot this configuration points at.
    pub fn slot_path(&self) -> SlotPath {
        match (&self.storage.path, &self.storage.file_name) {
            (None, None) => SlotPath::default(),
            (path, file_name) => resolve_slot(path.as_deref(), file_name.as_deref()),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("tracepost"),
            path: None,
            file_name: None,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: None,
            forward_wait_secs: 45,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"delivery.timeout_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- endpoint ---
        match self.endpoint.as_deref() {
            None => errors.push(ValidationError {
                field: "endpoint".into(),
                message: "is required".into(),
            }),
            Some(url) => {
                if let Err(e) = Endpoint::parse(url) {
                    errors.push(ValidationError {
                        field: "endpoint".into(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // --- storage ---
        match (&self.storage.path, &self.storage.file_name) {
            (None, None) => {}
            (Some(path), Some(file_name)) => {
                if let Err(e) = SlotPath::new(path.as_str(), file_name.as_str()) {
                    errors.push(ValidationError {
                        field: "storage.path".into(),
                        message: e.to_string(),
                    });
                }
            }
            (Some(_), None) => errors.push(ValidationError {
                field: "storage.file_name".into(),
                message: "must be set together with storage.path".into(),
            }),
            (None, Some(_)) => errors.push(ValidationError {
                field: "storage.path".into(),
                message: "must be set together with storage.file_name".into(),
            }),
        }

        // --- delivery ---
        if self.delivery.timeout_secs == 0 {
            errors.push(ValidationError {
                field: "delivery.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.delivery.forward_wait_secs == 0 {
            errors.push(ValidationError {
                field: "delivery.forward_wait_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ReporterConfig
// ---------------------------------------------------------------------------

/// Resolved settings a crash reporter is installed with.
///
/// Captured once at construction; each reporter owns its own copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    endpoint: Endpoint,
    slot: SlotPath,
}

impl ReporterConfig {
    /// Reporter for `url` using the default slot `stacktraces/stack.txt`.
    pub fn new(url: &str) -> Result<Self, DomainError> {
        Ok(Self {
            endpoint: Endpoint::parse(url)?,
            slot: SlotPath::default(),
        })
    }

    /// Reporter for `url` with a custom slot.
    ///
    /// `path` and `file_name` are only honoured together. If either is
    /// missing or invalid, a warning is logged and the default slot is used;
    /// a partial override never happens.
    pub fn with_storage(
        url: &str,
        path: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            endpoint: Endpoint::parse(url)?,
            slot: resolve_slot(path, file_name),
        })
    }

    pub fn from_parts(endpoint: Endpoint, slot: SlotPath) -> Self {
        Self { endpoint, slot }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn slot(&self) -> &SlotPath {
        &self.slot
    }
}

/// Slot for an optional path and file name, honoured only together.
fn resolve_slot(path: Option<&str>, file_name: Option<&str>) -> SlotPath {
    match (path, file_name) {
        (Some(path), Some(file_name)) => match SlotPath::new(path, file_name) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(error = %e, "Invalid storage location, using default values instead");
                SlotPath::default()
            }
        },
        _ => {
            warn!("Storage path and file name must both be given, using default values instead");
            SlotPath::default()
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use tracepost_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .endpoint("https://crash.example.com/submit")
///     .delivery_timeout_secs(10)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = Some(url.into());
        self
    }

    // --- storage ---

    pub fn storage_root(mut self, root: PathBuf) -> Self {
        self.config.storage.root = root;
        self
    }

    pub fn storage_slot(mut self, path: impl Into<String>, file_name: impl Into<String>) -> Self {
        self.config.storage.path = Some(path.into());
        self.config.storage.file_name = Some(file_name.into());
        self
    }

    // --- delivery ---

    pub fn delivery_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.delivery.timeout_secs = seconds;
        self
    }

    pub fn delivery_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.delivery.user_agent = Some(user_agent.into());
        self
    }

    pub fn delivery_forward_wait_secs(mut self, seconds: u64) -> Self {
        self.config.delivery.forward_wait_secs = seconds;
        self
    }

    // --- logging / app ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn app_version(mut self, version: impl Into<String>) -> Self {
        self.config.app.version = Some(version.into());
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(cfg.endpoint.is_none());
        assert!(cfg.storage.root.to_string_lossy().contains("tracepost"));
        assert!(cfg.storage.path.is_none());
        assert!(cfg.storage.file_name.is_none());
        assert_eq!(cfg.delivery.timeout_secs, 30);
        assert_eq!(cfg.delivery.forward_wait_secs, 45);
        assert!(cfg.delivery.user_agent.is_none());
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.app.version.is_none());
    }

    #[test]
    fn default_config_only_misses_endpoint() {
        let errors = Config::default().validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "endpoint");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
endpoint: "https://crash.example.com/submit"
storage:
  root: /tmp/tracepost-test
  path: crashes
  file_name: last.txt
delivery:
  timeout_secs: 5
  user_agent: "game/2.0"
  forward_wait_secs: 8
logging:
  level: debug
app:
  version: "2.0.1"
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(
            cfg.endpoint.as_deref(),
            Some("https://crash.example.com/submit")
        );
        assert_eq!(cfg.storage.root, PathBuf::from("/tmp/tracepost-test"));
        assert_eq!(cfg.storage.path.as_deref(), Some("crashes"));
        assert_eq!(cfg.storage.file_name.as_deref(), Some("last.txt"));
        assert_eq!(cfg.delivery.timeout_secs, 5);
        assert_eq!(cfg.delivery.user_agent.as_deref(), Some("game/2.0"));
        assert_eq!(cfg.delivery.forward_wait_secs, 8);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.app.version.as_deref(), Some("2.0.1"));
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_partial_yaml_fills_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"endpoint: http://localhost:9000/crash\n")
            .unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.delivery.timeout_secs, 30);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.delivery.timeout_secs, 30);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        let result = Config::load(tmp.path());
        assert!(result.is_err());
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("tracepost/config.yaml"));
    }

    // -- Validation --

    #[test]
    fn validate_catches_bad_endpoint() {
        let cfg = ConfigBuilder::new().endpoint("ftp://example.com").build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "endpoint"));
    }

    #[test]
    fn validate_catches_half_configured_slot() {
        let mut cfg = ConfigBuilder::new().endpoint("https://x.test/c").build();
        cfg.storage.path = Some("crashes".into());
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "storage.file_name"));

        cfg.storage.path = None;
        cfg.storage.file_name = Some("last.txt".into());
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "storage.path"));
    }

    #[test]
    fn validate_catches_escaping_slot() {
        let cfg = ConfigBuilder::new()
            .endpoint("https://x.test/c")
            .storage_slot("../elsewhere", "stack.txt")
            .build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "storage.path"));
    }

    #[test]
    fn validate_catches_zero_durations_and_bad_level() {
        let cfg = ConfigBuilder::new()
            .endpoint("https://x.test/c")
            .delivery_timeout_secs(0)
            .delivery_forward_wait_secs(0)
            .logging_level("verbose")
            .build();
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"delivery.timeout_secs".to_string()));
        assert!(fields.contains(&"delivery.forward_wait_secs".to_string()));
        assert!(fields.contains(&"logging.level".to_string()));
    }

    #[test]
    fn build_validated_reports_errors() {
        let result = ConfigBuilder::new().build_validated();
        assert!(result.is_err());

        let result = ConfigBuilder::new()
            .endpoint("https://x.test/c")
            .build_validated();
        assert!(result.is_ok());
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "delivery.timeout_secs".into(),
            message: "must be greater than 0".into(),
        };
        assert_eq!(err.to_string(), "delivery.timeout_secs: must be greater than 0");
    }

    // -- ReporterConfig --

    #[test]
    fn reporter_config_uses_default_slot() {
        let rc = ReporterConfig::new("https://x.test/c").unwrap();
        assert_eq!(rc.slot(), &SlotPath::default());
        assert_eq!(rc.endpoint().as_str(), "https://x.test/c");
    }

    #[test]
    fn reporter_config_rejects_bad_url() {
        assert!(ReporterConfig::new("nope").is_err());
        assert!(ReporterConfig::with_storage("nope", Some("a"), Some("b")).is_err());
    }

    #[test]
    fn reporter_config_custom_slot() {
        let rc = ReporterConfig::with_storage("https://x.test/c", Some("crashes"), Some("last.txt"))
            .unwrap();
        assert_eq!(rc.slot().dir(), "crashes");
        assert_eq!(rc.slot().file_name(), "last.txt");
    }

    #[test]
    fn reporter_config_partial_override_falls_back_to_both_defaults() {
        let rc = ReporterConfig::with_storage("https://x.test/c", None, Some("last.txt")).unwrap();
        assert_eq!(rc.slot().dir(), "stacktraces");
        assert_eq!(rc.slot().file_name(), "stack.txt");

        let rc = ReporterConfig::with_storage("https://x.test/c", Some("crashes"), None).unwrap();
        assert_eq!(rc.slot().dir(), "stacktraces");
        assert_eq!(rc.slot().file_name(), "stack.txt");

        let rc = ReporterConfig::with_storage("https://x.test/c", None, None).unwrap();
        assert_eq!(rc.slot(), &SlotPath::default());
    }

    #[test]
    fn reporter_config_invalid_slot_falls_back() {
        let rc = ReporterConfig::with_storage("https://x.test/c", Some("/abs"), Some("x.txt"))
            .unwrap();
        assert_eq!(rc.slot(), &SlotPath::default());
    }

    #[test]
    fn config_resolves_reporter_config() {
        let cfg = ConfigBuilder::new()
            .endpoint("https://x.test/c")
            .storage_slot("crashes", "last.txt")
            .build();
        let rc = cfg.reporter_config().unwrap();
        assert_eq!(rc.slot().relative_path(), PathBuf::from("crashes/last.txt"));

        let missing = Config::default().reporter_config();
        assert_eq!(missing.unwrap_err(), DomainError::MissingEndpoint);
    }

    #[test]
    fn config_slot_path_without_endpoint() {
        assert_eq!(Config::default().slot_path(), SlotPath::default());

        let mut cfg = ConfigBuilder::new().storage_slot("crashes", "last.txt").build();
        assert_eq!(cfg.slot_path().relative_path(), PathBuf::from("crashes/last.txt"));

        cfg.storage.file_name = None;
        assert_eq!(cfg.slot_path(), SlotPath::default());
    }
}
