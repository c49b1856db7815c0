//! Insurance verification collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationResult {
    Accepted { copay_usd: Option<u32> },
    NotAccepted,
    InvalidMemberId,
}

#[async_trait]
pub trait InsuranceVerifier: Send + Sync + 'static {
    async fn verify(&self, payer_id: &str, member_id: &str) -> Result<VerificationResult>;
}
