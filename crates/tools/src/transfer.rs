//! Transfer desk
//!
//! Logs handoffs and keeps them for inspection. A telephony bridge would
//! replace this with a warm transfer to the on-call specialist.

use async_trait::async_trait;
use parking_lot::Mutex;

use intake_core::{Result, SpecialistTransfer, TransferRequest, TransferTrigger};

#[derive(Default)]
pub struct TransferDesk {
    requests: Mutex<Vec<TransferRequest>>,
}

impl TransferDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

#[async_trait]
impl SpecialistTransfer for TransferDesk {
    async fn request_transfer(&self, request: TransferRequest) -> Result<()> {
        match &request.trigger {
            TransferTrigger::Crisis { pattern } => tracing::warn!(
                call_id = %request.call_id,
                pattern = %pattern,
                turns = request.transcript.len(),
                "Crisis transfer requested"
            ),
            TransferTrigger::HumanFallback { stage } => tracing::info!(
                call_id = %request.call_id,
                stage = %stage,
                turns = request.transcript.len(),
                "Human transfer requested"
            ),
        }
        self.requests.lock().push(request);
        Ok(())
    }
}
