//! HTTP ingress adapter for a message-passing pipeline.
//!
//! Accepts HTTP connections, turns each request into a pipeline message
//! stamped with the connection's identity, and writes the correlated response
//! message back to the originating connection.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod message;
pub mod net;
pub mod observability;
pub mod pipeline;

pub use config::IngressConfig;
pub use http::IngressServer;
pub use lifecycle::Shutdown;
pub use message::{Message, Payload};
