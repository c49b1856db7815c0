//! Intake stages and call outcomes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Intake stages, in the order the caller walks through them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStage {
    /// New or returning patient
    #[default]
    Status,
    /// What the caller is struggling with
    Symptoms,
    /// How long it has been going on
    Duration,
    /// Where the caller is located
    Location,
    /// Picking an appointment
    Schedule,
    /// Insurance or self-pay
    Insurance,
    /// Terminal
    Closed,
}

impl IntakeStage {
    pub const ALL: [IntakeStage; 7] = [
        IntakeStage::Status,
        IntakeStage::Symptoms,
        IntakeStage::Duration,
        IntakeStage::Location,
        IntakeStage::Schedule,
        IntakeStage::Insurance,
        IntakeStage::Closed,
    ];

    pub fn ordinal(&self) -> u8 {
        *self as u8
    }

    /// The stage that follows this one. `Closed` is absorbing.
    pub fn next(&self) -> IntakeStage {
        match self {
            IntakeStage::Status => IntakeStage::Symptoms,
            IntakeStage::Symptoms => IntakeStage::Duration,
            IntakeStage::Duration => IntakeStage::Location,
            IntakeStage::Location => IntakeStage::Schedule,
            IntakeStage::Schedule => IntakeStage::Insurance,
            IntakeStage::Insurance | IntakeStage::Closed => IntakeStage::Closed,
        }
    }

    /// Stages only move forward; staying put is allowed.
    pub fn can_transition_to(&self, target: IntakeStage) -> bool {
        target >= *self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IntakeStage::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeStage::Status => "status",
            IntakeStage::Symptoms => "symptoms",
            IntakeStage::Duration => "duration",
            IntakeStage::Location => "location",
            IntakeStage::Schedule => "schedule",
            IntakeStage::Insurance => "insurance",
            IntakeStage::Closed => "closed",
        }
    }
}

impl fmt::Display for IntakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// Appointment booked (insured or self-pay)
    Scheduled,
    /// Intake completed but the caller declined to pay
    Unscheduled,
    /// Physical ailment, outside the clinic's scope
    RejectedScope,
    /// Crisis indicator, handed to a specialist
    TransferredCrisis,
    /// Caller accepted the human-transfer fallback
    TransferredHuman,
    /// Caller hung up before the intake finished
    Abandoned,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Scheduled => "scheduled",
            CallOutcome::Unscheduled => "unscheduled",
            CallOutcome::RejectedScope => "rejected_scope",
            CallOutcome::TransferredCrisis => "transferred_crisis",
            CallOutcome::TransferredHuman => "transferred_human",
            CallOutcome::Abandoned => "abandoned",
        }
    }

    /// Whether the call ended by a handoff to a person
    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            CallOutcome::TransferredCrisis | CallOutcome::TransferredHuman
        )
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        for pair in IntakeStage::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), pair[1]);
        }
        assert_eq!(IntakeStage::Closed.next(), IntakeStage::Closed);
    }

    #[test]
    fn test_no_regression() {
        assert!(IntakeStage::Schedule.can_transition_to(IntakeStage::Schedule));
        assert!(IntakeStage::Schedule.can_transition_to(IntakeStage::Closed));
        assert!(!IntakeStage::Schedule.can_transition_to(IntakeStage::Location));
    }

    #[test]
    fn test_outcome_serde() {
        let json = serde_json::to_string(&CallOutcome::TransferredCrisis).unwrap();
        assert_eq!(json, "\"transferred_crisis\"");
        assert!(CallOutcome::TransferredHuman.is_transfer());
        assert!(!CallOutcome::Scheduled.is_transfer());
    }
}
