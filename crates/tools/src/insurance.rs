//! Stub payer verification
//!
//! Stands in for a real eligibility check until a payer integration exists.

use async_trait::async_trait;

use intake_config::InsurancePolicy;
use intake_core::{InsuranceVerifier, Result, VerificationResult};

/// Copay quoted for in-network plans
pub const DEFAULT_COPAY_USD: u32 = 30;

pub struct StubInsuranceVerifier {
    policy: InsurancePolicy,
    copay_usd: u32,
}

impl StubInsuranceVerifier {
    pub fn new(policy: InsurancePolicy) -> Self {
        Self {
            policy,
            copay_usd: DEFAULT_COPAY_USD,
        }
    }

    pub fn with_copay(mut self, copay_usd: u32) -> Self {
        self.copay_usd = copay_usd;
        self
    }

    fn is_valid_member_id(&self, member_id: &str) -> bool {
        let alnum: Vec<char> = member_id
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        alnum.len() >= self.policy.min_member_id_len && alnum.iter().any(char::is_ascii_digit)
    }

    fn is_out_of_network(&self, payer_id: &str) -> bool {
        let payer = payer_id.to_lowercase();
        self.policy
            .not_accepted
            .iter()
            .any(|p| payer.contains(&p.to_lowercase()))
    }
}

impl Default for StubInsuranceVerifier {
    fn default() -> Self {
        Self::new(InsurancePolicy::default())
    }
}

#[async_trait]
impl InsuranceVerifier for StubInsuranceVerifier {
    async fn verify(&self, payer_id: &str, member_id: &str) -> Result<VerificationResult> {
        let result = if !self.is_valid_member_id(member_id) {
            VerificationResult::InvalidMemberId
        } else if self.is_out_of_network(payer_id) {
            VerificationResult::NotAccepted
        } else {
            VerificationResult::Accepted {
                copay_usd: Some(self.copay_usd),
            }
        };

        tracing::info!(payer = payer_id, result = ?result, "Stub insurance verification");
        Ok(result)
    }
}
