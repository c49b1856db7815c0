//! Specialist transfer collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;
use crate::error::Result;

/// Why the call is being handed off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferTrigger {
    Crisis { pattern: String },
    /// Caller accepted the human fallback after repeated misunderstandings
    HumanFallback { stage: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub call_id: String,
    pub transcript: Vec<Turn>,
    pub trigger: TransferTrigger,
}

/// Hands the live call to a person.
///
/// Invoked fire-and-forget: the call ends without waiting for the ack.
#[async_trait]
pub trait SpecialistTransfer: Send + Sync + 'static {
    async fn request_transfer(&self, request: TransferRequest) -> Result<()>;
}
