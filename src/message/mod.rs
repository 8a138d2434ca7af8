//! Pipeline message envelope.
//!
//! # Data Flow
//! ```text
//! Connection parses request
//!     → data.rs (HttpRequest payload)
//!     → provenance.rs (ProcessingEvent stamped with connection id)
//!     → Message sent on the request port
//!
//! Downstream stage answers
//!     → Message with HttpResponse payload, provenance echoed unchanged
//!     → Server scans provenance for its own stage id
//! ```
//!
//! # Design Decisions
//! - The envelope is plain data; routing logic lives in the http server
//! - Every type is serde-serializable so messages can leave the process
//! - Correlation relies only on provenance, never on payload fields

pub mod data;
pub mod provenance;

use serde::{Deserialize, Serialize};

pub use data::{HttpRequest, HttpResponse};
pub use provenance::{ProcessingEvent, StageId};

/// Payload carried by a [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    HttpRequest(HttpRequest),
    HttpResponse(HttpResponse),
    /// Any payload type this adapter does not interpret.
    Other {
        data_type_name: String,
        data: serde_json::Value,
    },
}

impl Payload {
    pub const HTTP_REQUEST: &'static str = "http.request";
    pub const HTTP_RESPONSE: &'static str = "http.response";

    /// Stable type name of this payload.
    pub fn data_type_name(&self) -> &str {
        match self {
            Payload::HttpRequest(_) => Self::HTTP_REQUEST,
            Payload::HttpResponse(_) => Self::HTTP_RESPONSE,
            Payload::Other { data_type_name, .. } => data_type_name,
        }
    }
}

/// A message envelope: typed payload plus its provenance trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub provenance: Vec<ProcessingEvent>,
    pub data: Payload,
}

impl Message {
    /// Create a message with an empty provenance trail.
    pub fn new(data: Payload) -> Self {
        Self {
            provenance: Vec::new(),
            data,
        }
    }

    pub fn data_type_name(&self) -> &str {
        self.data.data_type_name()
    }

    /// Response payload, if this message carries one.
    pub fn as_response(&self) -> Option<&HttpResponse> {
        match &self.data {
            Payload::HttpResponse(response) => Some(response),
            _ => None,
        }
    }

    pub fn as_request(&self) -> Option<&HttpRequest> {
        match &self.data {
            Payload::HttpRequest(request) => Some(request),
            _ => None,
        }
    }

    /// Contexts of every provenance event stamped by `stage_id`, in trail order.
    ///
    /// Events without a context are skipped.
    pub fn contexts_for(&self, stage_id: StageId) -> impl Iterator<Item = &str> + '_ {
        self.provenance
            .iter()
            .filter(move |event| event.stage_id == stage_id)
            .filter_map(|event| event.context.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped(stage_id: StageId, context: &str) -> ProcessingEvent {
        let mut event = ProcessingEvent::begin(stage_id);
        event.complete(context);
        event
    }

    #[test]
    fn contexts_for_scans_whole_trail() {
        let mine = StageId::new();
        let other = StageId::new();

        let mut message = Message::new(Payload::HttpResponse(HttpResponse::default()));
        message.provenance.push(stamped(other, "conn-1"));
        message.provenance.push(stamped(mine, "conn-2"));
        message.provenance.push(ProcessingEvent::begin(mine));
        message.provenance.push(stamped(mine, "conn-3"));

        let contexts: Vec<&str> = message.contexts_for(mine).collect();
        assert_eq!(contexts, vec!["conn-2", "conn-3"]);
    }

    #[test]
    fn data_type_names() {
        let request = Message::new(Payload::HttpRequest(HttpRequest::default()));
        assert_eq!(request.data_type_name(), "http.request");
        assert!(request.as_response().is_none());

        let other = Message::new(Payload::Other {
            data_type_name: "log.record".into(),
            data: serde_json::json!({"line": "x"}),
        });
        assert_eq!(other.data_type_name(), "log.record");
    }

    #[test]
    fn response_json_fills_defaults() {
        let stage_id = StageId::new();
        let json = serde_json::json!({
            "provenance": [{
                "stage_id": stage_id,
                "context": "conn-9",
                "started_at": {"secs_since_epoch": 1, "nanos_since_epoch": 0},
            }],
            "data": {"type": "http_response", "data": {"content": "ok"}},
        });

        let message: Message = serde_json::from_value(json).unwrap();
        let response = message.as_response().unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.content, "ok");
        assert!(response.headers.is_empty());
        assert_eq!(message.contexts_for(stage_id).collect::<Vec<_>>(), vec!["conn-9"]);
    }
}
