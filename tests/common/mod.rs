//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use http_ingress::config::IngressConfig;
use http_ingress::lifecycle::Shutdown;
use http_ingress::message::Message;
use http_ingress::net::ConnectionId;
use http_ingress::pipeline::{self, InputPort, OutputPort};
use http_ingress::IngressServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

pub const SERVER_NAME: &str = "ingress-it";

/// A running ingress server with the downstream side of both ports.
pub struct TestIngress {
    pub addr: SocketAddr,
    pub server: IngressServer,
    /// Request messages emitted by the server.
    pub requests: InputPort,
    /// Feed Response messages back to the server.
    pub responses: OutputPort,
    pub shutdown: Shutdown,
    pub task: JoinHandle<()>,
}

/// Start a server on an ephemeral loopback port.
pub async fn start_ingress() -> TestIngress {
    let mut config = IngressConfig::default();
    config.listener.port = 0;
    config.http.server_name = SERVER_NAME.to_string();

    let (request_port, requests) = pipeline::channel();
    let (responses, response_input) = pipeline::channel();
    let server = IngressServer::configure(config, request_port);

    let listener = server.start().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let serving = server.clone();
    let task = tokio::spawn(async move {
        serving.serve(listener, response_input, server_shutdown).await.unwrap();
    });

    TestIngress {
        addr,
        server,
        requests,
        responses,
        shutdown,
        task,
    }
}

/// Open a connection and write `raw` without closing the write half.
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    stream
}

/// Read until the server closes the connection.
pub async fn read_response(mut stream: TcpStream) -> String {
    let mut out = String::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut out))
        .await
        .expect("response not received in time")
        .unwrap();
    out
}

/// Next request message, failing the test after a few seconds.
pub async fn next_request(requests: &mut InputPort) -> Message {
    tokio::time::timeout(Duration::from_secs(5), requests.recv())
        .await
        .expect("no request emitted in time")
        .expect("request port closed")
}

/// Connection identity carried by a request message from `server`.
pub fn connection_of(server: &IngressServer, message: &Message) -> ConnectionId {
    let context = message
        .contexts_for(server.stage_id())
        .next()
        .expect("request not stamped by server");
    ConnectionId::parse(context).expect("context is not a connection id")
}

/// Poll `condition` until it holds or a few seconds pass.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Build a Response message that reuses `request`'s provenance.
pub fn reply_to(request: &Message, response: http_ingress::message::HttpResponse) -> Message {
    Message {
        provenance: request.provenance.clone(),
        data: http_ingress::Payload::HttpResponse(response),
    }
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
