//! Request reading.
//!
//! # Responsibilities
//! - Configure the HTTP/1 connection (hyper) with the configured limits
//! - Collect the request body up to `max_body_bytes`
//! - Convert the parsed request into the fields carried by a Request message
//!
//! # Design Decisions
//! - hyper owns the wire: request line, headers, Content-Length and chunked framing
//! - Exactly one request per connection; keep-alive is disabled
//! - Header names arrive lowercased from hyper and are recorded in Title-Case;
//!   duplicates are last-write-wins

use std::collections::HashMap;
use std::error::Error as StdError;

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::Request;

use crate::config::HttpConfig;

/// Smallest read buffer hyper accepts for a connection.
pub const MIN_HEAD_BYTES: usize = 8192;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Error type for request reading.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),
    #[error("failed to read request body: {0}")]
    Body(BoxError),
}

/// Size limits applied while reading a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub max_head_bytes: usize,
    pub max_headers: usize,
    pub max_body_bytes: usize,
}

impl RequestLimits {
    /// HTTP/1 server settings for a single close-delimited exchange.
    pub fn http1_builder(&self) -> http1::Builder {
        let mut builder = http1::Builder::new();
        builder
            .keep_alive(false)
            .title_case_headers(true)
            .auto_date_header(false)
            .max_headers(self.max_headers)
            .max_buf_size(self.max_head_bytes.max(MIN_HEAD_BYTES));
        builder
    }
}

impl From<&HttpConfig> for RequestLimits {
    fn from(config: &HttpConfig) -> Self {
        Self {
            max_head_bytes: config.max_head_bytes,
            max_headers: config.max_headers,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

/// Request line and headers, as carried by a Request message.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHead {
    pub method: String,
    pub uri: String,
    pub query_string: String,
    pub protocol: String,
    pub headers: HashMap<String, String>,
}

impl RequestHead {
    pub fn from_parts(parts: &hyper::http::request::Parts) -> Self {
        let mut headers = HashMap::with_capacity(parts.headers.len());
        for (name, value) in &parts.headers {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers.insert(title_case(name.as_str()), value);
        }

        Self {
            method: parts.method.as_str().to_string(),
            uri: parts.uri.path().to_string(),
            query_string: parts.uri.query().unwrap_or_default().to_string(),
            protocol: format!("{:?}", parts.version),
            headers,
        }
    }
}

/// A complete request: head plus collected body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub head: RequestHead,
    pub content: Bytes,
}

/// Collect the body of `request`, failing once it passes `max_body_bytes`.
pub async fn read_request<B>(request: Request<B>, limits: &RequestLimits) -> Result<ParsedRequest, RequestError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = request.into_parts();
    let head = RequestHead::from_parts(&parts);

    let content = Limited::new(body, limits.max_body_bytes)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                RequestError::BodyTooLarge(limits.max_body_bytes)
            } else {
                RequestError::Body(e)
            }
        })?
        .to_bytes();

    Ok(ParsedRequest { head, content })
}

/// `x-forwarded-for` → `X-Forwarded-For`
fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        out.push(if upper { c.to_ascii_uppercase() } else { c });
        upper = c == '-';
    }
    out
}
