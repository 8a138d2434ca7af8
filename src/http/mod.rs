//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net)
//!     → server.rs (accept, register in connection table)
//!     → connection.rs (one hyper HTTP/1 exchange per connection)
//!         → request.rs (collect body, build message fields)
//!         → Request message on the request port
//!         ... downstream pipeline ...
//!     → server.rs (Response message from the response port, matched by provenance)
//!         → connection.rs → response.rs (defaults + overlay → hyper::Response)
//!     → Send to client, close
//! ```

pub mod connection;
pub mod request;
pub mod response;
pub mod server;

pub use connection::{ExchangeContext, HttpConnection, Teardown};
pub use request::{RequestError, RequestLimits};
pub use response::ResponseHead;
pub use server::{IngressError, IngressServer};
