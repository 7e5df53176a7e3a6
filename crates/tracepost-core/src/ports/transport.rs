//! Network transport port (driven/secondary port)
//!
//! This module defines the interface for submitting a crash report to the
//! remote collection endpoint.
//!
//! ## Design Notes
//!
//! - Submission never blocks the caller. The result arrives through a
//!   [`DeliveryCallback`], which may run on a different thread.
//! - The callback is an `FnOnce`, so an implementation can invoke it at
//!   most once; the contract is that it is invoked exactly once, with
//!   exactly one [`DeliveryOutcome`].
//! - Requests are always POSTed as `application/x-www-form-urlencoded`.
//! - Timeouts belong to the transport; callers impose none.

use crate::domain::Endpoint;

/// Form field carrying the runtime platform identifier
pub const FIELD_PACKAGE_NAME: &str = "package_name";

/// Form field carrying the application version
pub const FIELD_PACKAGE_VERSION: &str = "package_version";

/// Form field carrying the rendered crash text
pub const FIELD_STACKTRACE: &str = "stacktrace";

/// A form POST to the collection endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    /// Target URL
    pub url: Endpoint,
    /// Form parameters, in submission order
    pub form: Vec<(String, String)>,
}

impl DeliveryRequest {
    /// Build the crash report form for `stacktrace`.
    pub fn crash_report(
        url: Endpoint,
        platform: impl Into<String>,
        app_version: impl Into<String>,
        stacktrace: impl Into<String>,
    ) -> Self {
        Self {
            url,
            form: vec![
                (FIELD_PACKAGE_NAME.to_string(), platform.into()),
                (FIELD_PACKAGE_VERSION.to_string(), app_version.into()),
                (FIELD_STACKTRACE.to_string(), stacktrace.into()),
            ],
        }
    }

    /// Look up a form field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Terminal result of one submission
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The server answered with an HTTP status
    Completed {
        /// HTTP status code
        status: u16,
    },
    /// No response was obtained (DNS, connect, timeout, ...)
    Failed(anyhow::Error),
    /// The submission was cancelled before completing
    Cancelled,
}

impl DeliveryOutcome {
    /// Whether the server acknowledged the report (exactly HTTP 200)
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, DeliveryOutcome::Completed { status: 200 })
    }

    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Completed { status: 200 } => "acknowledged",
            DeliveryOutcome::Completed { .. } => "rejected",
            DeliveryOutcome::Failed(_) => "failed",
            DeliveryOutcome::Cancelled => "cancelled",
        }
    }
}

/// Completion callback receiving the outcome of a submission
pub type DeliveryCallback = Box<dyn FnOnce(DeliveryOutcome) + Send + 'static>;

/// Port trait for submitting crash reports
pub trait ITransport: Send + Sync {
    /// Submit `request` asynchronously; `on_complete` receives the outcome.
    fn submit(&self, request: DeliveryRequest, on_complete: DeliveryCallback);
}
