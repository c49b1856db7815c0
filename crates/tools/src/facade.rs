//! Typed access to every collaborator the call flow touches
//!
//! Each call is bounded by the configured tool timeout; an elapsed timeout
//! becomes a `ToolCallFailure` like any other collaborator error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use intake_config::IntakePolicy;
use intake_core::{
    AppointmentSlot, DateRange, Error, InsuranceVerifier, ReservationResult, Result,
    SchedulingProvider, SpecialistTransfer, TransferRequest, VerificationResult,
};

use crate::calendar::InMemoryCalendar;
use crate::insurance::StubInsuranceVerifier;
use crate::transfer::TransferDesk;

const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub struct IntakeTools {
    scheduler: Arc<dyn SchedulingProvider>,
    insurance: Arc<dyn InsuranceVerifier>,
    transfer: Arc<dyn SpecialistTransfer>,
    timeout: Duration,
}

impl IntakeTools {
    pub fn new(
        scheduler: Arc<dyn SchedulingProvider>,
        insurance: Arc<dyn InsuranceVerifier>,
        transfer: Arc<dyn SpecialistTransfer>,
    ) -> Self {
        Self {
            scheduler,
            insurance,
            transfer,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// In-memory calendar, stub verifier and logging transfer desk
    pub fn in_memory(policy: &IntakePolicy) -> Result<Self> {
        let calendar = InMemoryCalendar::from_roster(&policy.scheduling.roster)?;
        Ok(Self::new(
            Arc::new(calendar),
            Arc::new(StubInsuranceVerifier::new(policy.insurance.clone())),
            Arc::new(TransferDesk::new()),
        ))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn timed<T>(&self, tool: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::warn!(tool, error = %e, "Tool call failed");
                Err(match e {
                    Error::ToolCallFailure { .. } => e,
                    other => Error::tool(tool, other.to_string()),
                })
            }
            Err(_elapsed) => {
                tracing::warn!(tool, timeout_ms = self.timeout.as_millis() as u64, "Tool call timed out");
                Err(Error::tool(
                    tool,
                    format!("timed out after {}ms", self.timeout.as_millis()),
                ))
            }
        }
    }

    pub async fn find_slots(&self, range: DateRange) -> Result<Vec<AppointmentSlot>> {
        self.timed("list_available_slots", self.scheduler.list_available_slots(range))
            .await
    }

    pub async fn reserve(&self, slot_id: &str, session_id: &str) -> Result<ReservationResult> {
        self.timed("reserve_slot", self.scheduler.reserve_slot(slot_id, session_id))
            .await
    }

    pub async fn confirm(&self, session_id: &str) -> Result<String> {
        self.timed("confirm_reservation", self.scheduler.confirm(session_id))
            .await
    }

    pub async fn release(&self, session_id: &str) -> Result<()> {
        self.timed("release_reservation", self.scheduler.release(session_id))
            .await
    }

    pub async fn verify(&self, provider: &str, member_id: &str) -> Result<VerificationResult> {
        self.timed("verify_insurance", self.insurance.verify(provider, member_id))
            .await
    }

    /// Hand the call off without waiting for the acknowledgement
    pub fn spawn_transfer(&self, request: TransferRequest) -> JoinHandle<()> {
        let transfer = self.transfer.clone();
        let timeout = self.timeout;
        let call_id = request.call_id.clone();

        tokio::spawn(async move {
            match tokio::time::timeout(timeout, transfer.request_transfer(request)).await {
                Ok(Ok(())) => tracing::debug!(call_id = %call_id, "Transfer acknowledged"),
                Ok(Err(e)) => tracing::error!(call_id = %call_id, error = %e, "Transfer request failed"),
                Err(_) => tracing::error!(call_id = %call_id, "Transfer request timed out"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use intake_core::{TransferTrigger, Turn};

    struct SlowVerifier;

    #[async_trait]
    impl InsuranceVerifier for SlowVerifier {
        async fn verify(&self, _payer_id: &str, _member_id: &str) -> Result<VerificationResult> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(VerificationResult::NotAccepted)
        }
    }

    struct DownVerifier;

    #[async_trait]
    impl InsuranceVerifier for DownVerifier {
        async fn verify(&self, _payer_id: &str, _member_id: &str) -> Result<VerificationResult> {
            Err(Error::Transport("connection refused".into()))
        }
    }

    fn tools_with(insurance: Arc<dyn InsuranceVerifier>) -> IntakeTools {
        IntakeTools::new(
            Arc::new(InMemoryCalendar::default()),
            insurance,
            Arc::new(TransferDesk::new()),
        )
        .with_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_timeout_is_tool_failure() {
        let tools = tools_with(Arc::new(SlowVerifier));
        let err = tools.verify("Aetna", "5550123").await.unwrap_err();
        assert!(matches!(err, Error::ToolCallFailure { ref tool, .. } if tool == "verify_insurance"));
    }

    #[tokio::test]
    async fn test_collaborator_errors_are_tool_failures() {
        let tools = tools_with(Arc::new(DownVerifier));
        let err = tools.verify("Aetna", "5550123").await.unwrap_err();
        assert_eq!(err.code(), "tool_call_failure");
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let tools = IntakeTools::in_memory(&IntakePolicy::default()).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let slots = tools.find_slots(DateRange::starting_at(monday, 7)).await.unwrap();
        assert_eq!(slots.len(), 6);

        let result = tools.reserve(&slots[0].id, "call-1").await.unwrap();
        assert!(matches!(result, ReservationResult::Reserved { .. }));
        assert!(tools.confirm("call-1").await.unwrap().starts_with("APT-"));
    }

    #[tokio::test]
    async fn test_spawn_transfer_does_not_block() {
        let desk = Arc::new(TransferDesk::new());
        let tools = IntakeTools::new(
            Arc::new(InMemoryCalendar::default()),
            Arc::new(StubInsuranceVerifier::default()),
            desk.clone(),
        );
        let handle = tools.spawn_transfer(TransferRequest {
            call_id: "call-9".into(),
            transcript: vec![Turn::caller("I can't do this anymore")],
            trigger: TransferTrigger::Crisis {
                pattern: "can't do this anymore".into(),
            },
        });
        handle.await.unwrap();
        assert_eq!(desk.len(), 1);
    }
}
