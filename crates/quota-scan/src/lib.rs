//! # Quota Scan
//!
//! Polls the Bromo Tengger Semeru booking site for the daily climbing quota
//! of one site and month, and tells whether a given date is listed and
//! still bookable. Provides the HTTP transport, the quota table parser, the
//! target date matcher and the polling loops built on top of them.

/// Polling state machine: single check, bounded loops and the indefinite watch
mod executor;
pub use executor::*;

/// Matching parsed records against the requested date
mod matcher;
pub use matcher::*;

/// Quota table markup parsing
mod parser;
pub use parser::*;

/// Events emitted while polling
mod poll_events;
pub use poll_events::*;

/// Types and errors shared by the scan engine
mod scan_types;
pub use scan_types::*;

/// HTTP transport with retry, timeouts and optional IPv4 pinning
mod transport;
pub use transport::*;
