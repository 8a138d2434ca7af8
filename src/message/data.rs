//! HTTP payload types.

use std::collections::HashMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An inbound HTTP request as seen by downstream stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub client_ip: String,
    pub client_port: String,
    pub server_ip: String,
    pub server_port: String,

    pub method: String,
    /// Path portion of the request target.
    pub uri: String,
    /// Text after the first `?`, empty when absent.
    pub query_string: String,
    pub protocol: String,
    /// Wire-spelled header names; duplicates resolved last-write-wins.
    pub headers: HashMap<String, String>,
    pub content: Bytes,
}

/// A response produced by a downstream stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_status_code() -> u16 {
    200
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status_code: default_status_code(),
            content: String::new(),
            headers: HashMap::new(),
        }
    }
}

impl HttpResponse {
    pub fn new(status_code: u16, content: impl Into<String>) -> Self {
        Self {
            status_code,
            content: content.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
