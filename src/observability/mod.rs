//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher / Chat Notifier produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges via the metrics facade)
//!     → tracing.rs (per-session spans carrying the session id and path)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or LOG_LEVEL)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Failures on the call path are logged, never spoken to the caller
//! - Metrics are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
pub mod tracing;
