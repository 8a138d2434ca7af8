//! Ingress server: listener, connection table and response routing.
//!
//! # Responsibilities
//! - Bind the configured listener and accept connections
//! - Register each connection before any byte is read
//! - Forward Request messages on the request port (via each connection)
//! - Route Response messages from the response port back to their connection
//!
//! # Design Decisions
//! - Correlation reads every provenance event stamped with this server's stage id
//! - Unroutable responses are dropped silently; a late response is an expected race
//! - No timeout: an unanswered connection stays open until the peer leaves

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, Sleep};

use crate::config::IngressConfig;
use crate::http::connection::{ExchangeContext, HttpConnection};
use crate::http::request::RequestLimits;
use crate::message::{Message, StageId};
use crate::net::connection::{ConnectionId, SocketInfo};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::table::{ConnectionTable, Delivery};
use crate::observability::metrics;
use crate::pipeline::port::{InputPort, OutputPort};

/// Pause after a failed accept so a persistent error such as fd exhaustion does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Accept pause that runs as its own `select!` branch, so routing continues meanwhile.
struct AcceptBackoff {
    sleep: Pin<Box<Sleep>>,
    paused: bool,
}

impl AcceptBackoff {
    fn new() -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(Duration::ZERO)),
            paused: false,
        }
    }

    fn pause(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + ACCEPT_ERROR_BACKOFF);
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    async fn expired(&mut self) {
        self.sleep.as_mut().await;
        self.paused = false;
    }
}

/// Error type for running the server.
#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

struct Shared {
    config: IngressConfig,
    connections: ConnectionTable,
    exchange: ExchangeContext,
}

/// HTTP ingress stage. Cheap to clone; clones share one connection table.
#[derive(Clone)]
pub struct IngressServer {
    shared: Arc<Shared>,
}

impl IngressServer {
    /// Set up a server with a fresh stage identity. Performs no I/O.
    pub fn configure(config: IngressConfig, request_port: OutputPort) -> Self {
        Self::with_stage_id(config, request_port, StageId::new())
    }

    /// Set up a server with a caller-chosen stage identity.
    pub fn with_stage_id(config: IngressConfig, request_port: OutputPort, stage_id: StageId) -> Self {
        let exchange = ExchangeContext {
            stage_id,
            request_port,
            limits: RequestLimits::from(&config.http),
            server_name: Arc::from(config.http.server_name.as_str()),
        };

        Self {
            shared: Arc::new(Shared {
                config,
                connections: ConnectionTable::new(),
                exchange,
            }),
        }
    }

    pub fn stage_id(&self) -> StageId {
        self.shared.exchange.stage_id
    }

    pub fn config(&self) -> &IngressConfig {
        &self.shared.config
    }

    /// Live connections.
    pub fn connections(&self) -> &ConnectionTable {
        &self.shared.connections
    }

    /// Bind the configured listener.
    pub async fn start(&self) -> Result<Listener, ListenerError> {
        Listener::bind(&self.shared.config.listener).await
    }

    /// Bind, then serve until shutdown.
    pub async fn run(&self, responses: InputPort, shutdown: broadcast::Receiver<()>) -> Result<(), IngressError> {
        let listener = self.start().await?;
        self.serve(listener, responses, shutdown).await
    }

    /// Accept connections and route responses until `shutdown` fires.
    ///
    /// A closed response port stops routing but not accepting.
    pub async fn serve(
        &self,
        listener: Listener,
        mut responses: InputPort,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngressError> {
        if let Ok(address) = listener.local_addr() {
            tracing::info!(
                address = %address,
                stage_id = %self.stage_id(),
                "HTTP ingress starting"
            );
        }

        let mut responses_open = true;
        let mut shutdown_open = true;
        let mut backoff = AcceptBackoff::new();
        loop {
            let accept_paused = backoff.is_paused();
            tokio::select! {
                signal = shutdown.recv(), if shutdown_open => match signal {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        tracing::info!("Shutdown signal received");
                        break;
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("Shutdown handle dropped; serving until the process exits");
                        shutdown_open = false;
                    }
                },
                () = backoff.expired(), if accept_paused => {
                    tracing::debug!("Resuming accept after backoff");
                }
                accepted = listener.accept(), if !accept_paused => match accepted {
                    Ok((stream, _peer, permit)) => {
                        let info = SocketInfo::from_stream(&stream);
                        self.spawn_connection(stream, info, Some(permit));
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        backoff.pause();
                    }
                    Err(e) => return Err(e.into()),
                },
                message = responses.recv(), if responses_open => match message {
                    Some(message) => {
                        self.on_inbound_message(message);
                    }
                    None => {
                        tracing::warn!("Response port closed; responses can no longer be routed");
                        responses_open = false;
                    }
                },
            }
        }

        tracing::info!(open_connections = self.connections().len(), "HTTP ingress stopped");
        Ok(())
    }

    /// Register `stream` as a new connection and drive it on its own task.
    ///
    /// Also the entry point for transports other than the bound listener.
    pub fn accept_stream<S>(&self, stream: S, info: SocketInfo) -> ConnectionId
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.spawn_connection(stream, info, None)
    }

    fn spawn_connection<S>(&self, stream: S, info: SocketInfo, permit: Option<ConnectionPermit>) -> ConnectionId
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = ConnectionId::new();
        let (registration, responses) = self.shared.connections.register(id);
        metrics::record_connection_accepted();

        tracing::debug!(
            connection_id = %id,
            client = %info.client(),
            server = %info.server(),
            "Connection opened"
        );

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let _permit = permit;
            HttpConnection::new(stream, info, registration, responses)
                .run(&shared.exchange)
                .await;
        });
        id
    }

    /// Route one message from the response port.
    ///
    /// Non-response messages are ignored. A response goes to every live
    /// connection named by a provenance event from this stage. Returns the
    /// number of connections it was delivered to.
    pub fn on_inbound_message(&self, message: Message) -> usize {
        tracing::trace!(data_type = message.data_type_name(), "Received message");
        if message.as_response().is_none() {
            return 0;
        }

        let targets: Vec<String> = message
            .contexts_for(self.stage_id())
            .map(str::to_string)
            .collect();

        let mut delivered = 0;
        for context in targets {
            let outcome = match ConnectionId::parse(&context) {
                Some(id) => self.shared.connections.deliver(id, Some(message.clone())),
                None => Delivery::NotFound,
            };

            if outcome.is_delivered() {
                tracing::debug!(connection_id = %context, "Found connection for response");
                delivered += 1;
            } else {
                tracing::trace!(connection_id = %context, outcome = outcome.as_str(), "Response not routable");
                metrics::record_response_dropped(outcome.as_str());
            }
        }
        delivered
    }

    /// Send the default response (200, empty body) to `id`.
    pub fn respond_default(&self, id: ConnectionId) -> Delivery {
        self.shared.connections.deliver(id, None)
    }
}
