//! Outputs of the transition function
//!
//! Effects are performed by the agent in order. At most one effect per
//! transition needs a collaborator result; its outcome comes back as the next
//! `Event`.

use serde::Serialize;

use intake_core::{CallOutcome, DateRange, SlotName, SlotValue};
use intake_text_processing::TimePreference;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Reply { text: String },
    FillSlot { value: SlotValue },
    WaiveSlot { slot: SlotName },
    FindSlots {
        range: DateRange,
        preference: TimePreference,
    },
    ReserveSlot { slot_id: String },
    VerifyInsurance { provider: String, member_id: String },
    ConfirmReservation,
    ReleaseReservation,
    ConsultReasoning { guidance: String },
    TransferCrisis { pattern: String },
    TransferHuman,
    EndCall { outcome: CallOutcome },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply { text: text.into() }
    }

    pub fn fill(value: SlotValue) -> Self {
        Effect::FillSlot { value }
    }

    /// The agent must feed a result event back before the turn ends
    pub fn awaits_result(&self) -> bool {
        matches!(
            self,
            Effect::FindSlots { .. }
                | Effect::ReserveSlot { .. }
                | Effect::VerifyInsurance { .. }
                | Effect::ConfirmReservation
                | Effect::ConsultReasoning { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Effect::Reply { .. } => "reply",
            Effect::FillSlot { .. } => "fill_slot",
            Effect::WaiveSlot { .. } => "waive_slot",
            Effect::FindSlots { .. } => "find_slots",
            Effect::ReserveSlot { .. } => "reserve_slot",
            Effect::VerifyInsurance { .. } => "verify_insurance",
            Effect::ConfirmReservation => "confirm_reservation",
            Effect::ReleaseReservation => "release_reservation",
            Effect::ConsultReasoning { .. } => "consult_reasoning",
            Effect::TransferCrisis { .. } => "transfer_crisis",
            Effect::TransferHuman => "transfer_human",
            Effect::EndCall { .. } => "end_call",
        }
    }
}

/// What kind of step a transition was, for traces and session flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// A slot was filled or the sub-phase moved on
    Advanced,
    /// Waiting on a collaborator
    Pending,
    /// Failed extraction, same question again
    Reprompt,
    /// Off-topic utterance redirected
    Redirect,
    HandoffOffered,
    Crisis,
    RejectedScope,
    Closed,
    /// Nothing to do for this event in this phase
    Ignored,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Advanced => "advanced",
            StepKind::Pending => "pending",
            StepKind::Reprompt => "reprompt",
            StepKind::Redirect => "redirect",
            StepKind::HandoffOffered => "handoff_offered",
            StepKind::Crisis => "crisis",
            StepKind::RejectedScope => "rejected_scope",
            StepKind::Closed => "closed",
            StepKind::Ignored => "ignored",
        }
    }
}
