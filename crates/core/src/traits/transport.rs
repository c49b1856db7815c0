//! Call transport collaborator
//!
//! Speech-to-text and text-to-speech live behind the transport: the core only
//! ever sees final transcribed utterances and hands back reply text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    CallStarted { call_id: String },
    /// Final transcript of one caller utterance; may be empty (silence)
    Utterance { call_id: String, text: String },
    /// Caller hung up
    CallEnded { call_id: String },
}

#[async_trait]
pub trait CallTransport: Send {
    /// Next event, or `None` when the transport is exhausted
    async fn next_event(&mut self) -> Result<Option<TransportEvent>>;

    async fn send_reply(&mut self, call_id: &str, text: &str) -> Result<()>;
}
