//! Tracepost Reporter - Crash capture and delivery
//!
//! Provides:
//! - `CrashReporter`: process fault handler keeping one pending crash record
//! - `HttpTransport`: form POST delivery on a dedicated worker thread
//! - `LocalFileStorage` / `StorageSlot`: the on-disk crash record slot
//! - `PanicHookBridge`: Rust panic hook as the process fault hook
//! - `ProcessIdentity`: platform and version reported with each crash
//! - `ReporterMetrics`: Prometheus counters for captures and deliveries

pub mod identity;
pub mod metrics;
pub mod panic_hook;
pub mod reporter;
pub mod storage;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tracepost_core::config::Config;

pub use identity::{detect_platform, ProcessIdentity};
pub use metrics::ReporterMetrics;
pub use panic_hook::{capture_panic, PanicHookBridge};
pub use reporter::{Collaborators, CrashReporter, HandlerChain};
pub use storage::{LocalFileStorage, SlotDeletion, StorageSlot};
pub use transport::{HttpTransport, TransportError, TransportSettings};

/// Installs a crash reporter with the default adapters for `config`.
///
/// Crashes are Rust panics, stored under `storage.root` and posted with
/// `reqwest`. Returns `Ok(None)` when the platform cannot trap faults.
///
/// # Errors
///
/// Fails if no valid endpoint is configured, or if the delivery worker
/// cannot be started.
pub fn install_crash_reporter(config: &Config) -> anyhow::Result<Option<Arc<CrashReporter>>> {
    let reporter_config = config.reporter_config()?;

    let transport = HttpTransport::new(TransportSettings::from_config(&config.delivery))?;
    let collaborators = Collaborators::new(
        Arc::new(transport),
        Arc::new(LocalFileStorage::new(config.storage.root.clone())),
        Arc::new(ProcessIdentity::from_config_version(
            config.app.version.as_deref(),
        )),
        Arc::new(PanicHookBridge::new(Duration::from_secs(
            config.delivery.forward_wait_secs,
        ))),
    )
    .with_metrics(Arc::new(ReporterMetrics::new()?));

    Ok(CrashReporter::install(reporter_config, collaborators))
}
