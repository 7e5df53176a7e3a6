//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mostly validation failures of configuration-derived values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The collection endpoint is not an absolute http(s) URL
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// No collection endpoint was configured
    #[error("No endpoint configured")]
    MissingEndpoint,

    /// Storage directory or file name is empty, absolute, or escapes the root
    #[error("Invalid storage path: {0}")]
    InvalidStoragePath(String),
}
