//! Response construction.
//!
//! # Responsibilities
//! - Start from the default response (200, empty body, Content-Type + Server)
//! - Overlay status, content and headers from a Response message
//! - Build the `hyper::Response` the connection hands back to hyper
//!
//! # Design Decisions
//! - Header overrides match names case-insensitively; new names are appended
//! - Content-Length and Connection are framing owned by hyper, never taken from the message
//! - Headers that are not valid HTTP tokens/values are dropped, not escaped

use bytes::Bytes;
use http_body_util::Full;
use hyper::ext::ReasonPhrase;
use hyper::header::{HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use hyper::{Response, StatusCode};

use crate::message::{HttpResponse, Message};

pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// The logical response a connection will write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status_code: u16,
    /// Logical headers in output order. Framing headers are not included.
    pub headers: Vec<(String, String)>,
    pub content: String,
}

impl ResponseHead {
    /// Status 200, empty body, `Content-Type: text/html` and `Server: <server_name>`.
    pub fn defaults(server_name: &str) -> Self {
        Self {
            status_code: 200,
            headers: vec![
                ("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string()),
                ("Server".to_string(), server_name.to_string()),
            ],
            content: String::new(),
        }
    }

    /// Defaults overlaid with the message's response payload, if any.
    pub fn from_message(server_name: &str, message: Option<&Message>) -> Self {
        let mut head = Self::defaults(server_name);
        if let Some(response) = message.and_then(Message::as_response) {
            head.overlay(response);
        }
        head
    }

    pub fn overlay(&mut self, response: &HttpResponse) {
        self.status_code = response.status_code;
        self.content.clone_from(&response.content);

        // Sorted for a stable header order on the wire.
        let mut headers: Vec<_> = response.headers.iter().collect();
        headers.sort();
        for (name, value) in headers {
            self.set_header(name, value);
        }
    }

    /// Replace a header with the same name (any case) or append a new one.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(slot) => *slot = (name.to_string(), value.to_string()),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Build the response hyper writes. hyper adds `Content-Length`.
    ///
    /// Unregistered codes keep an empty reason phrase. A code hyper cannot
    /// represent (outside 100..=999) is sent as 500.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status_code).unwrap_or_else(|_| {
            tracing::warn!(status_code = self.status_code, "Response status out of range, sending 500");
            StatusCode::INTERNAL_SERVER_ERROR
        });

        let mut response = Response::new(Full::new(Bytes::from(self.content)));
        *response.status_mut() = status;
        if status.canonical_reason().is_none() {
            response.extensions_mut().insert(ReasonPhrase::from_static(b""));
        }

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            let (Ok(parsed), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) else {
                tracing::debug!(header = %name, "Dropping invalid response header");
                continue;
            };
            if is_framing(&parsed) {
                continue;
            }
            headers.insert(parsed, value);
        }
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        response
    }
}

fn is_framing(name: &HeaderName) -> bool {
    name == CONTENT_LENGTH || name == CONNECTION || name == TRANSFER_ENCODING
}
