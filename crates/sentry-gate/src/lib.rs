//! Sentry Gate
//!
//! Decides whether error-reporting telemetry may run at all, and — once it
//! runs — which captured errors are worth transmitting. The reporting client
//! itself is an opaque collaborator behind the [`ReportingClient`] trait; this
//! crate owns only the decision logic around it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Host process                        │
//! └──────────────────────────────────────────────────────────┘
//!                │ config + metadata lookup
//!                ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                      Sentry Gate                          │
//! │  ┌───────────────┐   ┌──────────────┐   ┌─────────────┐  │
//! │  │ EnablementGate │ → │ Registration │ → │ Admission   │  │
//! │  │ (opt-out chain)│   │ (tags, user) │   │ Filter      │  │
//! │  └───────────────┘   └──────────────┘   └─────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//!                │ events that pass the filter
//!                ▼
//!       ┌─────────────────────────────┐
//!       │  Reporting client transport │
//!       └─────────────────────────────┘
//! ```
//!
//! The gate runs once at startup: a fixed, ordered chain of opt-out checks
//! against the plugin configuration, the process environment and a handful of
//! host metadata objects. Every metadata fetch is awaited in sequence and a
//! failed fetch is treated as "object absent", never as a hard failure. If the
//! gate accepts, the admission filter is installed as a synchronous per-event
//! hook for the remaining lifetime of the process.

pub mod config;
pub mod event;
pub mod filter;
pub mod gate;
pub mod metadata;
pub mod plugin;
pub mod registration;
pub mod reporter;

pub use config::*;
pub use event::*;
pub use filter::*;
pub use gate::*;
pub use metadata::*;
pub use plugin::*;
pub use registration::*;
pub use reporter::*;

use thiserror::Error;

/// Errors surfaced by the plugin.
///
/// Only the configuration variants are produced by the gate itself; a
/// [`Lookup`](PluginError::Lookup) error is what an [`ObjectLookup`]
/// implementation returns and is always swallowed during gate evaluation.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("error reporting disabled by user")]
    DisabledByUser,
    #[error("invalid plugin definition: no dsn provided, disable error reporting")]
    MissingDsn,
    #[error("metadata lookup failed: {0}")]
    Lookup(String),
}

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;
