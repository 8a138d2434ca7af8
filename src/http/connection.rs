//! Per-connection HTTP exchange.
//!
//! # Responsibilities
//! - Serve exactly one request over the socket with hyper's HTTP/1 connection
//! - Emit it as a Request message stamped with the connection identity
//! - Wait for the correlated response, hand it to hyper and close
//!
//! # Design Decisions
//! - Waiting is purely reactive: the service future parks on a one-shot receiver
//! - hyper watches the socket while the service is pending; a peer EOF ends the
//!   connection and drops the pending exchange
//! - Every exit path drops the [`Registration`], which removes the table entry

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::http::request::{read_request, ParsedRequest, RequestError, RequestLimits};
use crate::http::response::ResponseHead;
use crate::message::{HttpRequest, Message, Payload, ProcessingEvent, StageId};
use crate::net::connection::{ConnectionId, ConnectionState, SocketInfo};
use crate::net::table::{Registration, ResponseReceiver};
use crate::observability::metrics;
use crate::pipeline::port::{OutputPort, PortClosed};

/// Settings and ports shared by every connection of one server.
#[derive(Debug, Clone)]
pub struct ExchangeContext {
    pub stage_id: StageId,
    pub request_port: OutputPort,
    pub limits: RequestLimits,
    pub server_name: Arc<str>,
}

/// Why an exchange ended without producing a response.
#[derive(Debug, thiserror::Error)]
pub enum Teardown {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Port(#[from] PortClosed),
    #[error("response channel dropped")]
    Abandoned,
    #[error("connection already served its request")]
    AlreadyServed,
}

/// Build the Request message for a parsed request.
///
/// `event` is completed with the connection identity as its context.
pub fn build_request_message(
    request: ParsedRequest,
    info: &SocketInfo,
    mut event: ProcessingEvent,
    id: ConnectionId,
) -> Message {
    let ParsedRequest { head, content } = request;

    let data = HttpRequest {
        client_ip: info.client_ip.clone(),
        client_port: info.client_port.clone(),
        server_ip: info.server_ip.clone(),
        server_port: info.server_port.clone(),
        method: head.method,
        uri: head.uri,
        query_string: head.query_string,
        protocol: head.protocol,
        headers: head.headers,
        content,
    };

    event.complete(id.to_string());
    Message {
        provenance: vec![event],
        data: Payload::HttpRequest(data),
    }
}

/// State shared between the connection task and its service.
struct Exchange {
    ctx: ExchangeContext,
    info: SocketInfo,
    registration: Registration,
    responses: Mutex<Option<ResponseReceiver>>,
}

impl Exchange {
    async fn handle(&self, request: Request<Incoming>) -> Result<Response<Full<Bytes>>, Teardown> {
        let id = self.registration.id();
        let event = ProcessingEvent::begin(self.ctx.stage_id);
        let responses = self
            .responses
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(Teardown::AlreadyServed)?;

        let request = read_request(request, &self.ctx.limits).await?;
        tracing::debug!(
            connection_id = %id,
            client = %self.info.client(),
            server = %self.info.server(),
            method = %request.head.method,
            uri = %request.head.uri,
            "Received HTTP request"
        );

        let method = request.head.method.clone();
        let message = build_request_message(request, &self.info, event, id);
        self.ctx.request_port.send_message(message)?;
        metrics::record_request_emitted(&method);

        self.registration.set_state(ConnectionState::AwaitingResponse);
        let response = responses.await.map_err(|_| Teardown::Abandoned)?;

        self.registration.set_state(ConnectionState::SendingResponse);
        let head = ResponseHead::from_message(&self.ctx.server_name, response.as_ref());
        tracing::debug!(
            connection_id = %id,
            client = %self.info.client(),
            status = head.status_code,
            "Sending HTTP response"
        );
        metrics::record_response_sent(head.status_code);

        Ok(head.into_response())
    }
}

/// One accepted socket, from first byte to close.
pub struct HttpConnection<S> {
    stream: S,
    info: SocketInfo,
    registration: Registration,
    responses: ResponseReceiver,
}

impl<S> HttpConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, info: SocketInfo, registration: Registration, responses: ResponseReceiver) -> Self {
        Self {
            stream,
            info,
            registration,
            responses,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.registration.id()
    }

    /// Drive the connection to `Closed`.
    pub async fn run(self, ctx: &ExchangeContext) {
        let id = self.id();
        let client = self.info.client();
        self.registration.set_state(ConnectionState::ReceivingRequest);

        let exchange = Arc::new(Exchange {
            ctx: ctx.clone(),
            info: self.info,
            registration: self.registration,
            responses: Mutex::new(Some(self.responses)),
        });

        let service = {
            let exchange = Arc::clone(&exchange);
            service_fn(move |request| {
                let exchange = Arc::clone(&exchange);
                async move { exchange.handle(request).await }
            })
        };

        match ctx
            .limits
            .http1_builder()
            .serve_connection(TokioIo::new(self.stream), service)
            .await
        {
            Ok(()) => {
                tracing::debug!(connection_id = %id, client = %client, "Connection closed");
            }
            Err(e) => {
                tracing::debug!(
                    connection_id = %id,
                    client = %client,
                    error = %e,
                    "Disconnected from HTTP client"
                );
            }
        }

        exchange.registration.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::HttpResponse;
    use crate::net::table::{ConnectionTable, Delivery};
    use crate::pipeline::port::{channel, InputPort};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn context(limits: RequestLimits) -> (ExchangeContext, InputPort) {
        let (request_port, requests) = channel();
        let ctx = ExchangeContext {
            stage_id: StageId::new(),
            request_port,
            limits,
            server_name: Arc::from("test-ingress"),
        };
        (ctx, requests)
    }

    fn spawn_connection(
        table: &ConnectionTable,
        ctx: &ExchangeContext,
    ) -> (ConnectionId, DuplexStream, tokio::task::JoinHandle<()>) {
        let (client, server) = tokio::io::duplex(8192);
        let id = ConnectionId::new();
        let (registration, responses) = table.register(id);
        let ctx = ctx.clone();
        let task = tokio::spawn(async move {
            HttpConnection::new(server, SocketInfo::unknown(), registration, responses)
                .run(&ctx)
                .await;
        });
        (id, client, task)
    }

    async fn finished(task: tokio::task::JoinHandle<()>) {
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("connection task did not finish")
            .expect("connection task panicked");
    }

    #[tokio::test]
    async fn request_is_stamped_and_response_written() {
        let table = ConnectionTable::new();
        let (ctx, mut requests) = context(RequestLimits::default());
        let (id, mut client, task) = spawn_connection(&table, &ctx);

        client
            .write_all(b"GET /widgets?id=3 HTTP/1.1\r\nX-Test: 1\r\n\r\n")
            .await
            .unwrap();

        let request = requests.recv().await.unwrap();
        let payload = request.as_request().unwrap();
        assert_eq!(payload.uri, "/widgets");
        assert_eq!(payload.headers.get("X-Test").map(String::as_str), Some("1"));
        assert_eq!(payload.client_ip, "?.?.?.?");
        assert_eq!(request.provenance.len(), 1);
        assert_eq!(request.contexts_for(ctx.stage_id).collect::<Vec<_>>(), vec![id.to_string()]);
        assert_eq!(table.state(id), Some(ConnectionState::AwaitingResponse));

        let mut reply = request.clone();
        reply.data = Payload::HttpResponse(HttpResponse::new(201, "ok").with_header("X-Created", "true"));
        assert!(table.deliver(id, Some(reply)).is_delivered());

        let mut written = String::new();
        client.read_to_string(&mut written).await.unwrap();
        assert!(written.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(written.contains("X-Created: true\r\n"));
        assert!(written.contains("Server: test-ingress\r\n"));
        assert!(written.contains("Connection: close\r\n"));
        assert!(written.ends_with("\r\n\r\nok"));

        finished(task).await;
        assert!(!table.contains(id));
    }

    #[tokio::test]
    async fn default_response_when_message_absent() {
        let table = ConnectionTable::new();
        let (ctx, mut requests) = context(RequestLimits::default());
        let (id, mut client, task) = spawn_connection(&table, &ctx);

        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        requests.recv().await.unwrap();
        assert!(table.deliver(id, None).is_delivered());

        let mut written = String::new();
        client.read_to_string(&mut written).await.unwrap();
        assert!(written.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(written.contains("Content-Type: text/html\r\n"));
        assert!(written.contains("Server: test-ingress\r\n"));
        assert!(written.contains("Content-Length: 0\r\n"));
        assert!(written.ends_with("\r\n\r\n"));
        finished(task).await;
    }

    #[tokio::test]
    async fn unknown_status_written_with_empty_reason() {
        let table = ConnectionTable::new();
        let (ctx, mut requests) = context(RequestLimits::default());
        let (id, mut client, task) = spawn_connection(&table, &ctx);

        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let request = requests.recv().await.unwrap();
        let mut reply = request.clone();
        reply.data = Payload::HttpResponse(HttpResponse::new(599, ""));
        assert!(table.deliver(id, Some(reply)).is_delivered());

        let mut written = String::new();
        client.read_to_string(&mut written).await.unwrap();
        assert!(written.starts_with("HTTP/1.1 599 \r\n"));
        finished(task).await;
    }

    #[tokio::test]
    async fn chunked_body_is_decoded() {
        let table = ConnectionTable::new();
        let (ctx, mut requests) = context(RequestLimits::default());
        let (_id, mut client, _task) = spawn_connection(&table, &ctx);

        client
            .write_all(b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n")
            .await
            .unwrap();

        let request = requests.recv().await.unwrap();
        assert_eq!(&request.as_request().unwrap().content[..], b"Wikipedia");
    }

    #[tokio::test]
    async fn disconnect_while_awaiting_deregisters() {
        let table = ConnectionTable::new();
        let (ctx, mut requests) = context(RequestLimits::default());
        let (id, mut client, task) = spawn_connection(&table, &ctx);

        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        requests.recv().await.unwrap();
        assert!(table.contains(id));

        drop(client);
        finished(task).await;

        assert!(!table.contains(id));
        assert_eq!(table.deliver(id, None), Delivery::NotFound);
    }

    #[tokio::test]
    async fn malformed_request_closes_without_emitting() {
        let table = ConnectionTable::new();
        let (ctx, mut requests) = context(RequestLimits::default());
        let (id, mut client, task) = spawn_connection(&table, &ctx);

        client.write_all(b"GET / HTTP/1.1\r\nBad Header\r\n\r\n").await.unwrap();
        finished(task).await;

        let mut written = Vec::new();
        client.read_to_end(&mut written).await.unwrap();
        assert!(written.starts_with(b"HTTP/1.1 400"));
        assert!(requests.try_recv().is_none());
        assert!(!table.contains(id));
    }

    #[tokio::test]
    async fn oversized_chunk_size_closes_without_emitting() {
        let table = ConnectionTable::new();
        let (ctx, mut requests) = context(RequestLimits::default());
        let (id, mut client, task) = spawn_connection(&table, &ctx);

        client
            .write_all(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\nfffffffffffffffd\r\nxx")
            .await
            .unwrap();
        drop(client);

        finished(task).await;
        assert!(requests.try_recv().is_none());
        assert!(!table.contains(id));
    }

    #[tokio::test]
    async fn chunk_past_body_limit_closes_without_emitting() {
        let table = ConnectionTable::new();
        let (ctx, mut requests) = context(RequestLimits {
            max_body_bytes: 8,
            ..Default::default()
        });
        let (id, mut client, task) = spawn_connection(&table, &ctx);

        client
            .write_all(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n10\r\n0123456789abcdef\r\n0\r\n\r\n")
            .await
            .unwrap();

        finished(task).await;
        assert!(requests.try_recv().is_none());
        assert!(!table.contains(id));
    }

    #[tokio::test]
    async fn closed_request_port_tears_down() {
        let table = ConnectionTable::new();
        let (ctx, requests) = context(RequestLimits::default());
        drop(requests);
        let (id, mut client, task) = spawn_connection(&table, &ctx);

        client.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        finished(task).await;
        assert!(!table.contains(id));
    }
}
