//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting and routing → process exits
//! ```
//!
//! # Design Decisions
//! - Shutdown is a broadcast so any number of loops can observe it
//! - In-flight connections are not drained; unanswered requests have no deadline

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
