//! HTTP delivery of crash reports
//!
//! [`HttpTransport`] implements [`ITransport`] on top of `reqwest`. Requests
//! are executed by a dedicated delivery thread that owns a current-thread
//! tokio runtime, so submitting works from any thread, including one that
//! is in the middle of a panic, and does not depend on the application's
//! own runtime still making progress.
//!
//! Every submission resolves its callback exactly once: with the HTTP
//! status, with a transport failure, or with `Cancelled` when the worker
//! shuts down first.

use std::sync::Mutex;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracepost_core::config::DeliveryConfig;
use tracepost_core::ports::{DeliveryCallback, DeliveryOutcome, DeliveryRequest, ITransport};

/// Name of the delivery worker thread
pub const WORKER_THREAD_NAME: &str = "tracepost-delivery";

/// Errors raised by the HTTP transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The delivery worker has shut down
    #[error("Delivery worker is not running")]
    WorkerStopped,

    /// The delivery worker could not be started
    #[error("Failed to start delivery worker: {0}")]
    Runtime(#[from] std::io::Error),
}

// ============================================================================
// Settings
// ============================================================================

/// Client settings for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Whole-request timeout
    pub timeout: Duration,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl TransportSettings {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(default_user_agent),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("tracepost/{}", env!("CARGO_PKG_VERSION"))
}

// ============================================================================
// Completion guard
// ============================================================================

/// Owns a delivery callback and guarantees it runs exactly once.
///
/// Dropping an unresolved completion reports [`DeliveryOutcome::Cancelled`].
struct Completion {
    callback: Option<DeliveryCallback>,
}

impl Completion {
    fn new(callback: DeliveryCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    fn complete(mut self, outcome: DeliveryOutcome) {
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(DeliveryOutcome::Cancelled);
        }
    }
}

struct Job {
    request: DeliveryRequest,
    completion: Completion,
}

// ============================================================================
// HttpTransport
// ============================================================================

/// `reqwest`-backed [`ITransport`] with its own delivery thread.
pub struct HttpTransport {
    sender: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl HttpTransport {
    /// Builds the HTTP client and starts the delivery thread.
    pub fn new(settings: TransportSettings) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent)
            .build()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                runtime.block_on(run_worker(client, receiver, token));
                // Dropping the runtime drops unfinished deliveries, which
                // resolves their completions as cancelled.
            })?;
        let worker_id = worker.thread().id();

        Ok(Self {
            sender,
            shutdown,
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    /// Stops the delivery thread and waits for it to exit.
    ///
    /// Deliveries still in flight resolve as cancelled; later submissions
    /// fail immediately.
    pub fn shutdown(&self) {
        self.shutdown.cancel();

        // A callback running on the worker must not wait for itself.
        if std::thread::current().id() == self.worker_id {
            return;
        }

        let handle = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Delivery worker exited with a panic");
            }
        }
    }
}

impl ITransport for HttpTransport {
    fn submit(&self, request: DeliveryRequest, on_complete: DeliveryCallback) {
        let job = Job {
            request,
            completion: Completion::new(on_complete),
        };

        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            warn!(url = %job.request.url, "Delivery worker is not running, report not sent");
            job.completion
                .complete(DeliveryOutcome::Failed(TransportError::WorkerStopped.into()));
        }
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("running", &!self.shutdown.is_cancelled())
            .finish()
    }
}

// ============================================================================
// Worker
// ============================================================================

async fn run_worker(
    client: Client,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    shutdown: CancellationToken,
) {
    debug!("Delivery worker started");

    loop {
        tokio::select! {
            job = receiver.recv() => match job {
                Some(job) => {
                    tokio::spawn(deliver(client.clone(), job, shutdown.clone()));
                }
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }

    debug!("Delivery worker stopping");
}

async fn deliver(client: Client, job: Job, shutdown: CancellationToken) {
    let Job {
        request,
        completion,
    } = job;

    let outcome = tokio::select! {
        result = send(&client, &request) => match result {
            Ok(status) => DeliveryOutcome::Completed { status },
            Err(e) => DeliveryOutcome::Failed(e.into()),
        },
        _ = shutdown.cancelled() => DeliveryOutcome::Cancelled,
    };

    debug!(url = %request.url, outcome = outcome.label(), "Crash report delivery finished");
    completion.complete(outcome);
}

async fn send(client: &Client, request: &DeliveryRequest) -> Result<u16, TransportError> {
    let response = client
        .post(request.url.as_url().clone())
        .form(&request.form)
        .send()
        .await?;
    Ok(response.status().as_u16())
}
