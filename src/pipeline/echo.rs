//! Echo stage: answers every request with a JSON description of itself.

use serde_json::json;

use crate::message::{HttpRequest, HttpResponse, Message, Payload};
use crate::pipeline::port::{InputPort, OutputPort};

/// Downstream stand-in that turns requests into responses.
///
/// The request's provenance is copied unchanged so the ingress server can
/// correlate the response.
pub struct EchoStage {
    requests: InputPort,
    responses: OutputPort,
}

impl EchoStage {
    pub fn new(requests: InputPort, responses: OutputPort) -> Self {
        Self { requests, responses }
    }

    /// Build the response message for one inbound message.
    ///
    /// Returns `None` for anything that is not a request.
    pub fn respond(message: &Message) -> Option<Message> {
        let request = message.as_request()?;
        let response = HttpResponse::new(200, describe(request).to_string())
            .with_header("Content-Type", "application/json");

        Some(Message {
            provenance: message.provenance.clone(),
            data: Payload::HttpResponse(response),
        })
    }

    /// Run until the request port closes or the response port is dropped.
    pub async fn run(mut self) {
        while let Some(message) = self.requests.recv().await {
            let Some(response) = Self::respond(&message) else {
                tracing::trace!(data_type = message.data_type_name(), "Echo stage ignoring message");
                continue;
            };

            if let Err(e) = self.responses.send_message(response) {
                tracing::warn!(error = %e, "Echo stage stopping");
                break;
            }
        }
    }
}

fn describe(request: &HttpRequest) -> serde_json::Value {
    json!({
        "method": request.method,
        "uri": request.uri,
        "query_string": request.query_string,
        "protocol": request.protocol,
        "client": format!("{}:{}", request.client_ip, request.client_port),
        "headers": request.headers,
        "content": String::from_utf8_lossy(&request.content),
    })
}
