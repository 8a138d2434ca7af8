//! Pipeline plumbing around the ingress adapter.
//!
//! # Data Flow
//! ```text
//! IngressServer ──request port──▶ downstream stage(s)
//!       ▲                               │
//!       └──────── response port ◀───────┘
//! ```
//!
//! The real pipeline engine lives outside this crate; only its send/receive
//! contract is modelled here. `echo.rs` is a stand-in downstream stage.

pub mod echo;
pub mod port;

pub use echo::EchoStage;
pub use port::{channel, InputPort, OutputPort, PortClosed};
