//! Call state: the phase the conversation is in plus per-call counters

use chrono::NaiveDate;
use serde::Serialize;

use intake_core::{AppointmentSlot, CallOutcome, InsuranceDecision, IntakeStage};
use intake_text_processing::TimePreference;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Status,
    Symptoms,
    Duration,
    Location,
    Schedule(SchedulePhase),
    Insurance(InsurancePhase),
    /// Repeated failures; caller was offered a human
    HandoffOffered { resume: Box<Phase> },
    Closed(CallOutcome),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SchedulePhase {
    AwaitingDate,
    /// Calendar lookup in flight
    Searching {
        requested: NaiveDate,
        preference: TimePreference,
    },
    /// Slot proposed, waiting for yes/no
    AwaitingConfirmation {
        slot: AppointmentSlot,
        alternatives: Vec<AppointmentSlot>,
    },
    /// Reservation in flight
    Reserving {
        slot: AppointmentSlot,
        alternatives: Vec<AppointmentSlot>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum InsurancePhase {
    AwaitingDecision,
    AwaitingDetails {
        provider: Option<String>,
        member_id: Option<String>,
    },
    /// Payer check in flight
    Verifying { provider: String, member_id: String },
    AwaitingSelfPay,
    /// Booking confirmation in flight
    Booking { decision: InsuranceDecision },
}

impl Phase {
    pub fn stage(&self) -> IntakeStage {
        match self {
            Phase::Status => IntakeStage::Status,
            Phase::Symptoms => IntakeStage::Symptoms,
            Phase::Duration => IntakeStage::Duration,
            Phase::Location => IntakeStage::Location,
            Phase::Schedule(_) => IntakeStage::Schedule,
            Phase::Insurance(_) => IntakeStage::Insurance,
            Phase::HandoffOffered { resume } => resume.stage(),
            Phase::Closed(_) => IntakeStage::Closed,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Phase::Closed(_))
    }

    pub fn outcome(&self) -> Option<CallOutcome> {
        match self {
            Phase::Closed(outcome) => Some(*outcome),
            _ => None,
        }
    }

    /// Waiting on a collaborator rather than the caller
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Phase::Schedule(SchedulePhase::Searching { .. })
                | Phase::Schedule(SchedulePhase::Reserving { .. })
                | Phase::Insurance(InsurancePhase::Verifying { .. })
                | Phase::Insurance(InsurancePhase::Booking { .. })
        )
    }

    /// Short label for logs and snapshots
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Status => "status",
            Phase::Symptoms => "symptoms",
            Phase::Duration => "duration",
            Phase::Location => "location",
            Phase::Schedule(SchedulePhase::AwaitingDate) => "schedule.awaiting_date",
            Phase::Schedule(SchedulePhase::Searching { .. }) => "schedule.searching",
            Phase::Schedule(SchedulePhase::AwaitingConfirmation { .. }) => {
                "schedule.awaiting_confirmation"
            }
            Phase::Schedule(SchedulePhase::Reserving { .. }) => "schedule.reserving",
            Phase::Insurance(InsurancePhase::AwaitingDecision) => "insurance.awaiting_decision",
            Phase::Insurance(InsurancePhase::AwaitingDetails { .. }) => "insurance.awaiting_details",
            Phase::Insurance(InsurancePhase::Verifying { .. }) => "insurance.verifying",
            Phase::Insurance(InsurancePhase::AwaitingSelfPay) => "insurance.awaiting_self_pay",
            Phase::Insurance(InsurancePhase::Booking { .. }) => "insurance.booking",
            Phase::HandoffOffered { .. } => "handoff_offered",
            Phase::Closed(_) => "closed",
        }
    }
}

/// Everything the transition function reads and writes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineState {
    pub phase: Phase,
    /// Consecutive failed extractions at the current stage
    pub failures: u8,
    /// Slot this call holds in the calendar, if any
    pub held: Option<AppointmentSlot>,
}

impl MachineState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Status,
            failures: 0,
            held: None,
        }
    }

    pub fn at(phase: Phase) -> Self {
        Self {
            phase,
            ..Self::new()
        }
    }

    pub fn stage(&self) -> IntakeStage {
        self.phase.stage()
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handoff_reports_resumed_stage() {
        let phase = Phase::HandoffOffered {
            resume: Box::new(Phase::Schedule(SchedulePhase::AwaitingDate)),
        };
        assert_eq!(phase.stage(), IntakeStage::Schedule);
        assert!(!phase.is_closed());
        assert_eq!(phase.label(), "handoff_offered");
    }

    #[test]
    fn test_in_flight_phases() {
        let verifying = Phase::Insurance(InsurancePhase::Verifying {
            provider: "Aetna".into(),
            member_id: "5550123".into(),
        });
        assert!(verifying.is_in_flight());
        assert!(!Phase::Insurance(InsurancePhase::AwaitingSelfPay).is_in_flight());
        assert_eq!(
            Phase::Closed(CallOutcome::Scheduled).outcome(),
            Some(CallOutcome::Scheduled)
        );
    }
}
