//! Connection identity, state machine and socket metadata.
//!
//! # Responsibilities
//! - Generate process-unique connection IDs (also the correlation context)
//! - Track connection state
//!   (Accepted → ReceivingRequest → AwaitingResponse → SendingResponse → Closed)
//! - Decode peer/local addresses, falling back to sentinels

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Placeholder for an address that could not be decoded.
pub const UNKNOWN_IP: &str = "?.?.?.?";
/// Placeholder for a port that could not be decoded.
pub const UNKNOWN_PORT: &str = "?";

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse the string form produced by `Display`.
    ///
    /// Returns `None` for anything this process could not have issued.
    pub fn parse(context: &str) -> Option<Self> {
        context
            .strip_prefix("conn-")
            .and_then(|n| n.parse::<u64>().ok())
            .map(Self)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, addresses not yet decoded.
    Accepted = 0,
    /// Reading and parsing the single request.
    ReceivingRequest = 1,
    /// Request emitted; waiting for the correlated response.
    AwaitingResponse = 2,
    /// Writing the response to the peer.
    SendingResponse = 3,
    /// Terminal.
    Closed = 4,
}

impl From<u8> for ConnectionState {
    fn from(val: u8) -> Self {
        match val {
            0 => ConnectionState::Accepted,
            1 => ConnectionState::ReceivingRequest,
            2 => ConnectionState::AwaitingResponse,
            3 => ConnectionState::SendingResponse,
            _ => ConnectionState::Closed,
        }
    }
}

/// Shared, atomically updated [`ConnectionState`].
///
/// The connection task writes it; the table hands out read access.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ConnectionState::Accepted as u8)))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from(self.0.load(Ordering::Acquire))
    }

    /// Move to `next`. `Closed` is terminal and never left.
    pub fn set(&self, next: ConnectionState) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ConnectionState::Closed as u8).then_some(next as u8)
            });
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort client and server endpoint strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketInfo {
    pub client_ip: String,
    pub client_port: String,
    pub server_ip: String,
    pub server_port: String,
}

impl SocketInfo {
    /// Decode peer and local addresses; a failed lookup yields the sentinels.
    pub fn from_addrs(peer: io::Result<SocketAddr>, local: io::Result<SocketAddr>) -> Self {
        let (client_ip, client_port) = split_addr(peer);
        let (server_ip, server_port) = split_addr(local);
        Self {
            client_ip,
            client_port,
            server_ip,
            server_port,
        }
    }

    pub fn from_stream(stream: &tokio::net::TcpStream) -> Self {
        Self::from_addrs(stream.peer_addr(), stream.local_addr())
    }

    /// All four fields set to the sentinels.
    pub fn unknown() -> Self {
        Self::from_addrs(
            Err(io::ErrorKind::NotConnected.into()),
            Err(io::ErrorKind::NotConnected.into()),
        )
    }

    pub fn client(&self) -> String {
        format!("{}:{}", self.client_ip, self.client_port)
    }

    pub fn server(&self) -> String {
        format!("{}:{}", self.server_ip, self.server_port)
    }
}

fn split_addr(addr: io::Result<SocketAddr>) -> (String, String) {
    match addr {
        Ok(addr) => (addr.ip().to_string(), addr.port().to_string()),
        Err(_) => (UNKNOWN_IP.to_string(), UNKNOWN_PORT.to_string()),
    }
}
