//! Tracepost Core - Crash record domain and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `CrashRecord`, `CapturedError`, `StackFrame`, `ThreadIdentity`
//! - **Validated values** - `Endpoint`, `SlotPath`, `Platform`
//! - **Port definitions** - Traits for adapters: `ITransport`, `ILocalStorage`,
//!   `IRuntimeIdentity`, `IExceptionHook`, `IFaultHandler`
//! - **Configuration** - YAML-backed `Config` and the resolved `ReporterConfig`
//!
//! # Architecture
//!
//! The domain module has no I/O. Ports define the trait interfaces that the
//! `tracepost-reporter` crate implements (HTTP delivery, file storage, the
//! panic hook) and that tests replace with in-memory doubles.

pub mod config;
pub mod domain;
pub mod ports;
