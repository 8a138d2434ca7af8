//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! net / http / pipeline produce:
//!     → logging.rs (structured log events, connection_id on every line)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
