//! Live connection table.
//!
//! # Responsibilities
//! - Map connection identity → live connection
//! - Hand a response to exactly one waiting connection, at most once
//! - Remove entries when connections tear down, from any path
//!
//! # Design Decisions
//! - `DashMap` is the single-writer-per-key guard the multi-threaded runtime needs
//! - Each entry owns a one-shot sender; taking it is what makes delivery at-most-once
//! - Removal is driven by [`Registration`]'s `Drop`, so it cannot be skipped or doubled

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::message::Message;
use crate::net::connection::{ConnectionId, ConnectionState, StateCell};
use crate::observability::metrics;

/// Receives the response (or `None` for pure defaults) destined for one connection.
pub type ResponseReceiver = oneshot::Receiver<Option<Message>>;

#[derive(Debug)]
struct ConnectionEntry {
    state: StateCell,
    responder: Option<oneshot::Sender<Option<Message>>>,
}

/// Outcome of [`ConnectionTable::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the connection's send path.
    Delivered,
    /// No live connection with that identity.
    NotFound,
    /// The connection already received its response.
    AlreadyAnswered,
    /// The connection task stopped listening before deregistering.
    ConnectionGone,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }

    /// Metric label for a dropped delivery.
    pub fn as_str(&self) -> &'static str {
        match self {
            Delivery::Delivered => "delivered",
            Delivery::NotFound => "not_found",
            Delivery::AlreadyAnswered => "already_answered",
            Delivery::ConnectionGone => "connection_gone",
        }
    }
}

/// Table of currently open connections keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTable {
    entries: Arc<DashMap<ConnectionId, ConnectionEntry>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection. The returned guard removes it again when dropped.
    pub fn register(&self, id: ConnectionId) -> (Registration, ResponseReceiver) {
        let (tx, rx) = oneshot::channel();
        let state = StateCell::new();

        let replaced = self.entries.insert(
            id,
            ConnectionEntry {
                state: state.clone(),
                responder: Some(tx),
            },
        );
        if replaced.is_none() {
            metrics::connection_opened();
        }

        let registration = Registration {
            id,
            state,
            table: self.clone(),
        };
        (registration, rx)
    }

    /// Hand `message` to the connection registered under `id`.
    ///
    /// Never blocks and never errors; the result only says what happened.
    pub fn deliver(&self, id: ConnectionId, message: Option<Message>) -> Delivery {
        let responder = match self.entries.get_mut(&id) {
            Some(mut entry) => entry.responder.take(),
            None => return Delivery::NotFound,
        };

        match responder {
            Some(tx) => match tx.send(message) {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::ConnectionGone,
            },
            None => Delivery::AlreadyAnswered,
        }
    }

    /// Remove `id`. Returns `false` if it was not present.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            metrics::connection_closed();
        }
        removed
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current state of a live connection.
    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.entries.get(&id).map(|entry| entry.state.get())
    }

    /// Identities of all live connections, in no particular order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }
}

/// Proof of a table entry, held by the connection task.
///
/// Dropping it marks the connection `Closed` and removes the entry.
#[derive(Debug)]
pub struct Registration {
    id: ConnectionId,
    state: StateCell,
    table: ConnectionTable,
}

impl Registration {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub fn set_state(&self, next: ConnectionState) {
        self.state.set(next);
    }

    /// Tear down now. Safe to call more than once; later calls are no-ops.
    pub fn close(&self) -> bool {
        self.state.set(ConnectionState::Closed);
        self.table.deregister(self.id)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.close() {
            tracing::trace!(connection_id = %self.id, "Connection deregistered");
        }
    }
}
