//! The crash reporter
//!
//! [`CrashReporter`] installs itself as the process fault handler, keeps the
//! latest crash in a single storage slot and delivers it to a remote
//! endpoint. A record stays pending until the endpoint answers with HTTP
//! 200; pending records are resubmitted when the next process installs a
//! reporter.
//!
//! Once a crash has been handled, whatever the delivery outcome, it is
//! forwarded exactly once to the handler that was active before
//! installation.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tracepost_core::config::ReporterConfig;
use tracepost_core::domain::{CapturedError, CrashRecord, ThreadIdentity};
use tracepost_core::ports::{
    DeliveryOutcome, DeliveryRequest, IExceptionHook, IFaultHandler, ILocalStorage,
    IRuntimeIdentity, ITransport,
};

use crate::metrics::ReporterMetrics;
use crate::storage::{SlotDeletion, StorageSlot};

// ============================================================================
// Collaborators
// ============================================================================

/// External services a [`CrashReporter`] is installed with.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn ITransport>,
    pub storage: Arc<dyn ILocalStorage>,
    pub identity: Arc<dyn IRuntimeIdentity>,
    pub hook: Arc<dyn IExceptionHook>,
    pub metrics: Option<Arc<ReporterMetrics>>,
}

impl Collaborators {
    pub fn new(
        transport: Arc<dyn ITransport>,
        storage: Arc<dyn ILocalStorage>,
        identity: Arc<dyn IRuntimeIdentity>,
        hook: Arc<dyn IExceptionHook>,
    ) -> Self {
        Self {
            transport,
            storage,
            identity,
            hook,
            metrics: None,
        }
    }

    /// Record captures and delivery outcomes in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<ReporterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

// ============================================================================
// HandlerChain
// ============================================================================

/// The fault handler that was active before the reporter was installed.
///
/// Restoring it is a plain delegation call; the reporter stays installed.
pub struct HandlerChain {
    previous: Option<Arc<dyn IFaultHandler>>,
}

impl HandlerChain {
    pub fn new(previous: Option<Arc<dyn IFaultHandler>>) -> Self {
        Self { previous }
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    /// Hands a crash to the previous handler, if there was one.
    pub fn delegate(&self, thread: &ThreadIdentity, error: &CapturedError) {
        match &self.previous {
            Some(handler) => handler.uncaught(thread, error),
            None => debug!(thread = %thread, "No previous fault handler to forward to"),
        }
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerChain")
            .field("has_previous", &self.has_previous())
            .finish()
    }
}

/// Forwards one captured crash down the chain, exactly once.
///
/// Runs when explicitly consumed or, failing that, when dropped, so a
/// delivery callback that is never invoked still forwards.
struct ForwardOnce {
    chain: Arc<HandlerChain>,
    crash: Option<(ThreadIdentity, CapturedError)>,
}

impl ForwardOnce {
    fn new(chain: Arc<HandlerChain>, thread: ThreadIdentity, error: CapturedError) -> Self {
        Self {
            chain,
            crash: Some((thread, error)),
        }
    }

    fn run(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some((thread, error)) = self.crash.take() {
            self.chain.delegate(&thread, &error);
        }
    }
}

impl Drop for ForwardOnce {
    fn drop(&mut self) {
        self.fire();
    }
}

// ============================================================================
// Delivery handling
// ============================================================================

/// State shared with delivery callbacks, which may run on any thread.
struct DeliveryContext {
    slot: StorageSlot,
    chain: Arc<HandlerChain>,
    metrics: Option<Arc<ReporterMetrics>>,
}

impl DeliveryContext {
    /// Terminal handling of one delivery: act on the outcome, then forward.
    fn complete(&self, delivered: &str, outcome: DeliveryOutcome, forward: Option<ForwardOnce>) {
        if let Some(metrics) = &self.metrics {
            metrics.record_delivery(outcome.label());
        }

        if let Err(e) = self.interpret(delivered, outcome) {
            error!(error = %e, "Failed to process crash report response");
        }

        if let Some(forward) = forward {
            forward.run();
        }
    }

    fn interpret(&self, delivered: &str, outcome: DeliveryOutcome) -> anyhow::Result<()> {
        match outcome {
            DeliveryOutcome::Completed { status: 200 } => {
                let slot = self.slot.slot_path();
                match self.slot.delete_if_unchanged(delivered)? {
                    SlotDeletion::Deleted => info!(slot = %slot, "Stacktrace successfully sent"),
                    SlotDeletion::Replaced => info!(
                        slot = %slot,
                        "Stacktrace successfully sent, a newer crash record is still pending"
                    ),
                    SlotDeletion::Absent => info!(
                        slot = %slot,
                        "Stacktrace successfully sent, no stored crash record to clear"
                    ),
                }
            }
            DeliveryOutcome::Completed { status } => {
                warn!(status, "Crash report was not acknowledged, keeping it for the next start");
            }
            DeliveryOutcome::Failed(e) => {
                warn!(error = %e, "Failed to send crash report, keeping it for the next start");
            }
            DeliveryOutcome::Cancelled => {
                warn!("Crash report delivery was cancelled, keeping it for the next start");
            }
        }
        Ok(())
    }
}

// ============================================================================
// CrashReporter
// ============================================================================

/// Process fault handler that persists and delivers crash reports.
pub struct CrashReporter {
    config: ReporterConfig,
    identity: Arc<dyn IRuntimeIdentity>,
    transport: Arc<dyn ITransport>,
    context: Arc<DeliveryContext>,
}

impl CrashReporter {
    /// Installs a reporter as the active fault handler.
    ///
    /// Returns `None` without touching anything when the platform cannot
    /// trap process faults. Otherwise the previously active handler is
    /// remembered for forwarding, and a record left pending by an earlier
    /// run is resubmitted right away.
    pub fn install(config: ReporterConfig, collaborators: Collaborators) -> Option<Arc<Self>> {
        let Collaborators {
            transport,
            storage,
            identity,
            hook,
            metrics,
        } = collaborators;

        let platform = identity.platform();
        if !platform.supports_fault_trapping() {
            info!(%platform, "Fault trapping is not supported on this platform, crash reporter not installed");
            return None;
        }

        let chain = Arc::new(HandlerChain::new(hook.current_handler()));
        let slot = StorageSlot::new(storage, config.slot().clone());
        let pending = slot.read();

        let reporter = Arc::new(Self {
            config,
            identity,
            transport,
            context: Arc::new(DeliveryContext {
                slot,
                chain,
                metrics,
            }),
        });

        hook.set_current_handler(reporter.clone());
        info!(
            endpoint = %reporter.config.endpoint(),
            slot = %reporter.config.slot(),
            "Crash reporter installed"
        );

        if let Some(text) = pending {
            reporter.retry_pending(text);
        }

        Some(reporter)
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&Arc<ReporterMetrics>> {
        self.context.metrics.as_ref()
    }

    /// Resubmits a record left by an earlier run. Nothing is forwarded.
    fn retry_pending(&self, text: String) {
        info!(slot = %self.config.slot(), "Found a pending crash record, sending it again");
        if let Some(metrics) = &self.context.metrics {
            metrics.record_startup_retry();
        }
        self.submit(text, None);
    }

    fn submit(&self, text: String, forward: Option<ForwardOnce>) {
        let request = DeliveryRequest::crash_report(
            self.config.endpoint().clone(),
            self.identity.platform().to_string(),
            self.identity.app_version(),
            text.clone(),
        );

        let context = Arc::clone(&self.context);
        self.transport.submit(
            request,
            Box::new(move |outcome| context.complete(&text, outcome, forward)),
        );
    }
}

impl IFaultHandler for CrashReporter {
    fn uncaught(&self, thread: &ThreadIdentity, error: &CapturedError) {
        let record = CrashRecord::capture(thread.clone(), error.clone());
        if let Some(metrics) = &self.context.metrics {
            metrics.record_crash_captured();
        }

        error!(thread = %record.thread(), "Uncaught fault\n{}", record.rendered_text());
        self.context.slot.write(record.rendered_text());

        let (text, thread, error) = record.into_parts();
        let forward = ForwardOnce::new(Arc::clone(&self.context.chain), thread, error);
        self.submit(text, Some(forward));
    }
}

impl std::fmt::Debug for CrashReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashReporter")
            .field("config", &self.config)
            .field("chain", &self.context.chain)
            .finish()
    }
}
