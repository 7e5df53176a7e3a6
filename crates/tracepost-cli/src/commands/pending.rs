//! Pending command - Manage the pending crash record
//!
//! Provides the `tracepost pending` CLI command with subcommands:
//! - `show`: Display the record waiting for delivery
//! - `send`: Deliver it now, clearing it once the endpoint answers 200
//! - `clear`: Remove it without sending

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Subcommand;
use tokio::sync::oneshot;
use tracepost_core::config::Config;
use tracepost_core::ports::{DeliveryOutcome, DeliveryRequest, IRuntimeIdentity, ITransport};
use tracepost_reporter::{
    HttpTransport, LocalFileStorage, ProcessIdentity, SlotDeletion, StorageSlot,
    TransportSettings,
};
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

/// Pending record subcommands
#[derive(Debug, Subcommand)]
pub enum PendingCommand {
    /// Show the pending crash record
    Show,
    /// Send the pending crash record now
    Send,
    /// Delete the pending crash record without sending it
    Clear,
}

impl PendingCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let config = Config::load_or_default(config_path);

        match self {
            PendingCommand::Show => execute_show(&config, format),
            PendingCommand::Send => execute_send(&config, format).await,
            PendingCommand::Clear => execute_clear(&config, format),
        }
    }
}

fn execute_show(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let location = slot_file(config);

    let Some(record) = open_slot(config).read() else {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "pending": false,
                "path": location.display().to_string(),
            }));
        } else {
            formatter.info("No pending crash record.");
        }
        return Ok(());
    };

    let modified = modified_time(&location);

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "pending": true,
            "path": location.display().to_string(),
            "modified": modified,
            "size_bytes": record.len(),
            "record": record,
        }));
    } else {
        formatter.success("Pending crash record");
        formatter.field("Path", &location.display().to_string());
        if let Some(modified) = &modified {
            formatter.field("Modified", modified);
        }
        formatter.field("Size", &format!("{} B", record.len()));
        formatter.info("");
        formatter.block(&record);
    }

    Ok(())
}

async fn execute_send(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let reporter_config = config
        .reporter_config()
        .context("An endpoint must be configured to send crash reports")?;
    let slot = open_slot(config);

    let Some(record) = slot.read() else {
        formatter.info("No pending crash record.");
        return Ok(());
    };

    let identity = ProcessIdentity::from_config_version(config.app.version.as_deref());
    let transport = HttpTransport::new(TransportSettings::from_config(&config.delivery))
        .context("Failed to start the delivery worker")?;

    info!(endpoint = %reporter_config.endpoint(), "Sending pending crash record");

    let request = DeliveryRequest::crash_report(
        reporter_config.endpoint().clone(),
        identity.platform().to_string(),
        identity.app_version(),
        record.clone(),
    );
    let (tx, rx) = oneshot::channel();
    transport.submit(
        request,
        Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
    );
    let outcome = rx.await.unwrap_or(DeliveryOutcome::Cancelled);

    let deletion = if outcome.is_acknowledged() {
        Some(
            slot.delete_if_unchanged(&record)
                .context("Failed to clear the delivered crash record")?,
        )
    } else {
        None
    };
    let cleared = deletion == Some(SlotDeletion::Deleted);

    if format.is_json() {
        let mut summary = outcome_summary(&outcome);
        summary["cleared"] = serde_json::json!(cleared);
        formatter.print_json(&summary);
        return Ok(());
    }

    match &outcome {
        DeliveryOutcome::Completed { status: 200 } if cleared => {
            formatter.success("Crash record sent and cleared");
        }
        DeliveryOutcome::Completed { status: 200 } => {
            formatter.success("Crash record sent");
            if let Some(note) = deletion.and_then(cleanup_note) {
                formatter.info(note);
            }
        }
        DeliveryOutcome::Completed { status } => {
            formatter.error(&format!("Endpoint answered with status {}", status));
            formatter.info("The record is kept for the next attempt.");
        }
        DeliveryOutcome::Failed(e) => {
            formatter.error(&format!("Delivery failed: {:#}", e));
            formatter.info("The record is kept for the next attempt.");
        }
        DeliveryOutcome::Cancelled => {
            formatter.warn("Delivery was cancelled, the record is kept");
        }
    }

    Ok(())
}

/// Explains why an acknowledged record was not cleared.
fn cleanup_note(deletion: SlotDeletion) -> Option<&'static str> {
    match deletion {
        SlotDeletion::Deleted => None,
        SlotDeletion::Replaced => Some("A newer crash record is still pending."),
        SlotDeletion::Absent => Some("The stored record was already gone."),
    }
}

fn execute_clear(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let slot = open_slot(config);

    let existed = slot.read().is_some();
    if existed {
        slot.delete();
    }
    let cleared = existed && slot.read().is_none();

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "cleared": cleared,
            "path": slot_file(config).display().to_string(),
        }));
    } else if cleared {
        formatter.success("Pending crash record cleared");
    } else if existed {
        formatter.error("Failed to delete the pending crash record");
    } else {
        formatter.info("No pending crash record.");
    }

    Ok(())
}

fn open_slot(config: &Config) -> StorageSlot {
    StorageSlot::new(
        Arc::new(LocalFileStorage::new(config.storage.root.clone())),
        config.slot_path(),
    )
}

fn slot_file(config: &Config) -> PathBuf {
    config.storage.root.join(config.slot_path().relative_path())
}

fn modified_time(path: &Path) -> Option<String> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(
        DateTime::<Local>::from(modified)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    )
}

fn outcome_summary(outcome: &DeliveryOutcome) -> serde_json::Value {
    let (status, error) = match outcome {
        DeliveryOutcome::Completed { status } => (Some(*status), None),
        DeliveryOutcome::Failed(e) => (None, Some(format!("{:#}", e))),
        DeliveryOutcome::Cancelled => (None, None),
    };
    serde_json::json!({
        "sent": outcome.is_acknowledged(),
        "outcome": outcome.label(),
        "status": status,
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use tracepost_core::config::ConfigBuilder;

    use super::*;

    fn config_in(root: &Path) -> Config {
        ConfigBuilder::new()
            .endpoint("http://127.0.0.1:9/crash")
            .storage_root(root.to_path_buf())
            .build()
    }

    #[test]
    fn test_slot_file_uses_root_and_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        assert_eq!(slot_file(&config), dir.path().join("stacktraces/stack.txt"));

        config.storage.path = Some("crashes".to_string());
        config.storage.file_name = Some("last.txt".to_string());
        assert_eq!(slot_file(&config), dir.path().join("crashes/last.txt"));
    }

    #[test]
    fn test_open_slot_reads_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        assert!(open_slot(&config).read().is_none());

        let file = slot_file(&config);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "Panic boom\n").unwrap();

        assert_eq!(open_slot(&config).read().as_deref(), Some("Panic boom\n"));
        assert!(modified_time(&file).is_some());
    }

    #[test]
    fn test_clear_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        open_slot(&config).write("Panic boom\n");

        execute_clear(&config, OutputFormat::Json).unwrap();
        assert!(!slot_file(&config).exists());
    }

    #[test]
    fn test_modified_time_missing_file() {
        assert!(modified_time(Path::new("/nonexistent/stack.txt")).is_none());
    }

    #[test]
    fn test_cleanup_note() {
        assert!(cleanup_note(SlotDeletion::Deleted).is_none());
        assert!(cleanup_note(SlotDeletion::Replaced).unwrap().contains("newer"));
        assert!(cleanup_note(SlotDeletion::Absent).unwrap().contains("already gone"));
    }

    #[test]
    fn test_outcome_summary() {
        let summary = outcome_summary(&DeliveryOutcome::Completed { status: 200 });
        assert_eq!(summary["sent"], true);
        assert_eq!(summary["outcome"], "acknowledged");
        assert_eq!(summary["status"], 200);

        let summary = outcome_summary(&DeliveryOutcome::Failed(anyhow::anyhow!("refused")));
        assert_eq!(summary["sent"], false);
        assert_eq!(summary["outcome"], "failed");
        assert!(summary["status"].is_null());
        assert_eq!(summary["error"], "refused");
    }
}
