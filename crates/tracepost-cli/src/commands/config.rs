//! Config command - View and manage Tracepost configuration
//!
//! Provides the `tracepost config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracepost_core::config::Config;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

/// Keys accepted by `config set`, with a short description each
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("endpoint", "URL crash reports are POSTed to"),
    ("storage.root", "Local storage root directory"),
    ("storage.path", "Slot directory, relative to the root"),
    ("storage.file_name", "Slot file name"),
    ("delivery.timeout_secs", "Request timeout in seconds"),
    ("delivery.user_agent", "User-Agent header value"),
    ("delivery.forward_wait_secs", "Seconds a crashing thread waits for delivery"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("app.version", "Version reported with each crash"),
];

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "delivery.timeout_secs")
        key: String,
        /// New value; an empty string clears optional keys
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Set { key, value } => execute_set(config_path, key, value, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
        }
    }
}

fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config = Config::load_or_default(config_path);

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_set(config_path: &Path, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let mut config = Config::load_or_default(config_path);

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, description) in SUPPORTED_KEYS {
                formatter.info(&format!("  {:<28} - {}", name, description));
            }
        }
        return Ok(());
    }

    let errors = blocking_errors(&config, key);

    if !errors.is_empty() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "errors": errors,
            }));
        } else {
            formatter.error(&format!(
                "Invalid value for '{}': {}",
                key,
                errors.join("; ")
            ));
        }
        return Ok(());
    }

    save_config(&config, config_path)?;

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {} = {}", key, value));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }

    Ok(())
}

/// Validation errors that keep `config set <key>` from saving.
///
/// A missing endpoint and a half-set slot pair are fine while the file is
/// still being filled in one key at a time; `config validate` still reports
/// both.
fn blocking_errors(config: &Config, key: &str) -> Vec<String> {
    let slot_incomplete = config.storage.path.is_some() != config.storage.file_name.is_some();

    config
        .validate()
        .iter()
        .filter(|e| e.field != "endpoint" || key == "endpoint")
        .filter(|e| !(slot_incomplete && is_slot_key(&e.field)))
        .map(|e| e.to_string())
        .collect()
}

fn is_slot_key(field: &str) -> bool {
    field == "storage.path" || field == "storage.file_name"
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            let message = if config_path.exists() {
                format!("Failed to parse configuration: {}", e)
            } else {
                "Configuration file not found".to_string()
            };

            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
                formatter.info(&format!("File: {}", config_path.display()));
                formatter.info("Run 'tracepost config set endpoint <url>' to create one.");
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    Ok(())
}

fn save_config(config: &Config, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(config_path, yaml).context("Failed to write configuration file")?;
    Ok(())
}

/// Apply a dot-notation `key = value` to `config`.
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "endpoint" => config.endpoint = optional(value),
        "storage.root" => config.storage.root = PathBuf::from(value),
        "storage.path" => config.storage.path = optional(value),
        "storage.file_name" => config.storage.file_name = optional(value),
        "delivery.timeout_secs" => config.delivery.timeout_secs = parse_u64(key, value)?,
        "delivery.user_agent" => config.delivery.user_agent = optional(value),
        "delivery.forward_wait_secs" => {
            config.delivery.forward_wait_secs = parse_u64(key, value)?
        }
        "logging.level" => config.logging.level = value.to_string(),
        "app.version" => config.app.version = optional(value),
        _ => anyhow::bail!("unknown configuration key"),
    }
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .with_context(|| format!("{} expects a whole number of seconds, got '{}'", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_endpoint() {
        let mut config = Config::default();
        apply_config_value(&mut config, "endpoint", "https://crash.example.com/c").unwrap();
        assert_eq!(config.endpoint.as_deref(), Some("https://crash.example.com/c"));

        apply_config_value(&mut config, "endpoint", "").unwrap();
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_apply_storage_keys() {
        let mut config = Config::default();
        apply_config_value(&mut config, "storage.root", "/var/lib/game").unwrap();
        apply_config_value(&mut config, "storage.path", "crashes").unwrap();
        apply_config_value(&mut config, "storage.file_name", "last.txt").unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/var/lib/game"));
        assert_eq!(config.slot_path().relative_path(), PathBuf::from("crashes/last.txt"));
    }

    #[test]
    fn test_apply_delivery_keys() {
        let mut config = Config::default();
        apply_config_value(&mut config, "delivery.timeout_secs", "12").unwrap();
        apply_config_value(&mut config, "delivery.forward_wait_secs", "20").unwrap();
        apply_config_value(&mut config, "delivery.user_agent", "game/1.0").unwrap();

        assert_eq!(config.delivery.timeout_secs, 12);
        assert_eq!(config.delivery.forward_wait_secs, 20);
        assert_eq!(config.delivery.user_agent.as_deref(), Some("game/1.0"));
    }

    #[test]
    fn test_apply_logging_and_app() {
        let mut config = Config::default();
        apply_config_value(&mut config, "logging.level", "debug").unwrap();
        apply_config_value(&mut config, "app.version", "4.2.0").unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.app.version.as_deref(), Some("4.2.0"));
    }

    #[test]
    fn test_apply_unknown_key_fails() {
        let mut config = Config::default();
        assert!(apply_config_value(&mut config, "storage.size", "1").is_err());
    }

    #[test]
    fn test_apply_invalid_number_fails() {
        let mut config = Config::default();
        assert!(apply_config_value(&mut config, "delivery.timeout_secs", "soon").is_err());
        assert!(apply_config_value(&mut config, "delivery.forward_wait_secs", "-1").is_err());
        assert_eq!(config.delivery.timeout_secs, 30);
    }

    #[test]
    fn test_supported_keys_are_applicable() {
        for (key, _) in SUPPORTED_KEYS {
            let mut config = Config::default();
            let value = if key.ends_with("_secs") { "5" } else { "x" };
            assert!(apply_config_value(&mut config, key, value).is_ok(), "{key}");
        }
    }

    #[test]
    fn test_blocking_errors_allow_half_set_slot() {
        let mut config = Config::default();
        apply_config_value(&mut config, "storage.path", "crashes").unwrap();
        assert!(blocking_errors(&config, "storage.path").is_empty());
        assert!(blocking_errors(&config, "logging.level").is_empty());
        assert!(!config.validate().is_empty());

        apply_config_value(&mut config, "storage.file_name", "../last.txt").unwrap();
        let errors = blocking_errors(&config, "storage.file_name");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("storage.path"));
    }

    #[test]
    fn test_blocking_errors_keep_other_fields() {
        let mut config = Config::default();
        apply_config_value(&mut config, "storage.path", "crashes").unwrap();
        apply_config_value(&mut config, "delivery.timeout_secs", "0").unwrap();

        let errors = blocking_errors(&config, "delivery.timeout_secs");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("delivery.timeout_secs"));
    }

    #[test]
    fn test_set_slot_one_key_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        execute_set(&path, "endpoint", "https://crash.example.com/c", OutputFormat::Json).unwrap();
        execute_set(&path, "storage.path", "crashes", OutputFormat::Json).unwrap();
        execute_set(&path, "storage.file_name", "last.txt", OutputFormat::Json).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.storage.path.as_deref(), Some("crashes"));
        assert_eq!(loaded.storage.file_name.as_deref(), Some("last.txt"));
        assert!(loaded.validate().is_empty());
        assert_eq!(loaded.slot_path().relative_path(), PathBuf::from("crashes/last.txt"));

        execute_set(&path, "storage.path", "", OutputFormat::Json).unwrap();
        execute_set(&path, "storage.file_name", "", OutputFormat::Json).unwrap();

        let cleared = Config::load(&path).unwrap();
        assert!(cleared.storage.path.is_none());
        assert!(cleared.storage.file_name.is_none());
    }

    #[test]
    fn test_save_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.yaml");

        let mut config = Config::default();
        apply_config_value(&mut config, "endpoint", "https://crash.example.com/c").unwrap();
        save_config(&config, &path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.endpoint, config.endpoint);
        assert!(loaded.validate().is_empty());
    }
}
