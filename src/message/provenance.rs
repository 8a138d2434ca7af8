//! Provenance trail entries.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a pipeline stage instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(Uuid);

impl StageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for StageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Record of one stage touching a message.
///
/// `context` is opaque to everyone except the stage that wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingEvent {
    pub stage_id: StageId,
    #[serde(default)]
    pub context: Option<String>,
    pub started_at: SystemTime,
    #[serde(default)]
    pub completed_at: Option<SystemTime>,
}

impl ProcessingEvent {
    /// Start an event for `stage_id` at the current time.
    pub fn begin(stage_id: StageId) -> Self {
        Self {
            stage_id,
            context: None,
            started_at: SystemTime::now(),
            completed_at: None,
        }
    }

    /// Attach the correlation context and stamp completion time.
    pub fn complete(&mut self, context: impl Into<String>) {
        self.context = Some(context.into());
        self.completed_at = Some(SystemTime::now());
    }
}
