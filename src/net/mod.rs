//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (identity, addresses, state machine)
//!     → table.rs (registered before any byte is read)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Accepted → ReceivingRequest → AwaitingResponse → SendingResponse → Closed
//!     (any state → Closed on disconnect or socket error)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - One request and one response per connection; no keep-alive
//! - Table entries are owned by a guard so teardown happens exactly once

pub mod connection;
pub mod listener;
pub mod table;

pub use connection::{ConnectionId, ConnectionState, SocketInfo};
pub use listener::{Listener, ListenerError};
pub use table::{ConnectionTable, Delivery, Registration};
