//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The crash reporter depends on these interfaces;
//! their implementations live in `tracepost-reporter` (or in test doubles).
//!
//! ## Ports Overview
//!
//! - [`ITransport`] - Asynchronous form POST with a completion callback
//! - [`ILocalStorage`] - Application-local text files
//! - [`IRuntimeIdentity`] - Platform and application version
//! - [`IExceptionHook`] / [`IFaultHandler`] - Process-wide fault hook

pub mod exception_hook;
pub mod local_storage;
pub mod runtime_identity;
pub mod transport;

pub use exception_hook::{IExceptionHook, IFaultHandler};
pub use local_storage::ILocalStorage;
pub use runtime_identity::IRuntimeIdentity;
pub use transport::{
    DeliveryCallback, DeliveryOutcome, DeliveryRequest, ITransport, FIELD_PACKAGE_NAME,
    FIELD_PACKAGE_VERSION, FIELD_STACKTRACE,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_at_port_root() {
        assert_eq!(FIELD_PACKAGE_NAME, "package_name");
        assert_eq!(FIELD_PACKAGE_VERSION, "package_version");
        assert_eq!(FIELD_STACKTRACE, "stacktrace");
    }
}
