//! Domain entities and business logic
//!
//! This module contains the core domain types for Tracepost:
//! - Crash capture types and the text rendering of a crash
//! - Newtypes for validated configuration values
//! - Runtime platform classification
//! - Domain-specific error types

pub mod crash;
pub mod errors;
pub mod newtypes;
pub mod platform;

// Re-export commonly used types
pub use crash::{CapturedError, CrashRecord, StackFrame, ThreadIdentity};
pub use errors::DomainError;
pub use newtypes::*;
pub use platform::Platform;
