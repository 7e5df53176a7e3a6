//! Process-wide fault hook port
//!
//! Models the runtime's "uncaught fault" hook: one active handler per
//! process, which can be read and replaced. A reporter reads the current
//! handler, installs itself, and later delegates to the one it replaced.
//!
//! ## Threading
//!
//! Handlers are invoked on the faulting thread and may be invoked from
//! several threads, so implementations must be thread-safe.

use std::sync::Arc;

use crate::domain::{CapturedError, ThreadIdentity};

/// Receiver of uncaught faults
pub trait IFaultHandler: Send + Sync {
    /// Called when a thread dies from an unhandled fault.
    ///
    /// Must not panic.
    fn uncaught(&self, thread: &ThreadIdentity, error: &CapturedError);
}

/// The process-wide hook holding the active fault handler
pub trait IExceptionHook: Send + Sync {
    /// The currently active handler, if any
    fn current_handler(&self) -> Option<Arc<dyn IFaultHandler>>;

    /// Make `handler` the active handler
    fn set_current_handler(&self, handler: Arc<dyn IFaultHandler>);
}
