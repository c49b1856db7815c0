//! Collaborator traits for the intake core
//!
//! Everything outside the call-flow logic is reached through these traits so
//! it can be swapped or mocked:
//!
//! ```text
//!   CallTransport      - utterances in, reply text out (STT/TTS live here)
//!   ReasoningEngine    - optional language model: phrasing + typed tool calls
//!   SchedulingProvider - calendar lookup and atomic reservation
//!   InsuranceVerifier  - payer/member verification
//!   TraceSink          - per-turn span export
//!   SpecialistTransfer - hand the call to a person
//! ```

mod insurance;
mod observability;
mod reasoning;
mod scheduling;
mod transfer;
mod transport;

pub use insurance::{InsuranceVerifier, VerificationResult};
pub use observability::{TraceSink, TraceSpan};
pub use reasoning::{ReasoningEngine, ReasoningOutput, ReasoningRequest, ToolInvocation};
pub use scheduling::{ReservationResult, SchedulingProvider};
pub use transfer::{SpecialistTransfer, TransferRequest, TransferTrigger};
pub use transport::{CallTransport, TransportEvent};
