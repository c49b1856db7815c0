//! Core types and collaborator traits for the clinic intake line
//!
//! This crate provides foundational types used across all other crates:
//! - Intake stages and call outcomes
//! - Slot model (status, symptoms, duration, location, appointment, insurance)
//! - Appointment slots and date ranges
//! - Conversation turns and the crisis escalation record
//! - Error taxonomy
//! - Collaborator traits (transport, reasoning, scheduling, insurance, tracing, transfer)

pub mod appointment;
pub mod conversation;
pub mod error;
pub mod slots;
pub mod stage;
pub mod traits;

pub use appointment::{format_time, AppointmentSlot, DateRange};
pub use conversation::{render_transcript, CrisisEscalationRecord, Turn, TurnRole};
pub use error::{Error, Result};
pub use slots::{
    InsuranceDecision, IntakeSlots, PatientStatus, Slot, SlotName, SlotState, SlotValue,
};
pub use stage::{CallOutcome, IntakeStage};

pub use traits::{
    CallTransport, InsuranceVerifier, ReasoningEngine, ReasoningOutput, ReasoningRequest,
    ReservationResult, SchedulingProvider, SpecialistTransfer, ToolInvocation, TraceSink,
    TraceSpan, TransferRequest, TransferTrigger, TransportEvent, VerificationResult,
};
