//! Per-call session state
//!
//! One `CallSession` per call. The agent mutates it once per event; the
//! machine state inside only ever moves forward through the stages.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use intake_core::{
    CallOutcome, CrisisEscalationRecord, IntakeSlots, IntakeStage, SlotName, SlotValue, Turn,
};

use crate::machine::{MachineState, Phase};

#[derive(Debug, Clone)]
pub struct CallSession {
    call_id: String,
    call_date: NaiveDate,
    state: MachineState,
    slots: IntakeSlots,
    crisis: Option<CrisisEscalationRecord>,
    scope_violation: bool,
    turns: u32,
    history: Vec<Turn>,
    booking_reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>, call_date: NaiveDate) -> Self {
        Self {
            call_id: call_id.into(),
            call_date,
            state: MachineState::new(),
            slots: IntakeSlots::new(),
            crisis: None,
            scope_violation: false,
            turns: 0,
            history: Vec::new(),
            booking_reference: None,
            created_at: Utc::now(),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Anchor for relative dates
    pub fn call_date(&self) -> NaiveDate {
        self.call_date
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn phase(&self) -> &Phase {
        &self.state.phase
    }

    pub fn stage(&self) -> IntakeStage {
        self.state.stage()
    }

    pub fn slots(&self) -> &IntakeSlots {
        &self.slots
    }

    pub fn crisis_flag(&self) -> bool {
        self.crisis.is_some()
    }

    pub fn crisis_record(&self) -> Option<&CrisisEscalationRecord> {
        self.crisis.as_ref()
    }

    pub fn scope_violation(&self) -> bool {
        self.scope_violation
    }

    pub fn turn_count(&self) -> u32 {
        self.turns
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.state.phase.is_closed()
    }

    pub fn outcome(&self) -> Option<CallOutcome> {
        self.state.phase.outcome()
    }

    pub fn booking_reference(&self) -> Option<&str> {
        self.booking_reference.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Caller turn counter; returns the new turn id
    pub(crate) fn begin_turn(&mut self, text: &str) -> u32 {
        self.turns += 1;
        let stage = self.stage();
        self.history.push(Turn::caller(text).with_stage(stage));
        self.turns
    }

    pub(crate) fn record_reply(&mut self, text: &str) {
        let stage = self.stage();
        self.history.push(Turn::agent(text).with_stage(stage));
    }

    /// Returns `false` when the slot was already confirmed and kept its value
    pub(crate) fn fill(&mut self, value: SlotValue) -> bool {
        let name = value.name();
        let applied = self.slots.apply(value);
        if !applied {
            tracing::debug!(call_id = %self.call_id, slot = name.as_str(), "Slot already confirmed");
        }
        applied
    }

    pub(crate) fn waive(&mut self, name: SlotName) {
        tracing::debug!(call_id = %self.call_id, slot = name.as_str(), "Slot waived");
        self.slots.waive(name);
    }

    /// Take the next machine state. A regression is refused and logged.
    pub(crate) fn advance(&mut self, next: MachineState) {
        if next.stage() < self.stage() {
            tracing::error!(
                call_id = %self.call_id,
                from = %self.stage(),
                to = %next.stage(),
                "Refusing stage regression"
            );
            return;
        }
        self.state = next;
    }

    pub(crate) fn flag_crisis(&mut self, record: CrisisEscalationRecord) {
        // first record wins; the flag is never cleared
        if self.crisis.is_none() {
            self.crisis = Some(record);
        }
    }

    pub(crate) fn flag_scope_violation(&mut self) {
        self.scope_violation = true;
    }

    pub(crate) fn set_booking_reference(&mut self, reference: String) {
        self.booking_reference = Some(reference);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            call_id: self.call_id.clone(),
            call_date: self.call_date,
            stage: self.stage(),
            phase: self.state.phase.label(),
            outcome: self.outcome(),
            failures: self.state.failures,
            crisis_flag: self.crisis_flag(),
            crisis: self.crisis.clone(),
            scope_violation: self.scope_violation,
            turns: self.turns,
            slots: self.slots.clone(),
            booking_reference: self.booking_reference.clone(),
            history: self.history.clone(),
            created_at: self.created_at,
        }
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub call_id: String,
    pub call_date: NaiveDate,
    pub stage: IntakeStage,
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CallOutcome>,
    pub failures: u8,
    pub crisis_flag: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crisis: Option<CrisisEscalationRecord>,
    pub scope_violation: bool,
    pub turns: u32,
    pub slots: IntakeSlots,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_reference: Option<String>,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::SchedulePhase;
    use intake_core::PatientStatus;

    fn session() -> CallSession {
        CallSession::new("call-1", NaiveDate::from_ymd_opt(2024, 6, 3).unwrap())
    }

    #[test]
    fn test_stage_regression_refused() {
        let mut s = session();
        s.advance(MachineState::at(Phase::Schedule(SchedulePhase::AwaitingDate)));
        s.advance(MachineState::at(Phase::Symptoms));
        assert_eq!(s.stage(), IntakeStage::Schedule);
    }

    #[test]
    fn test_confirmed_slot_not_overwritten() {
        let mut s = session();
        assert!(s.fill(SlotValue::Status(PatientStatus::New)));
        assert!(!s.fill(SlotValue::Status(PatientStatus::Returning)));
        assert_eq!(s.slots().status.value(), Some(&PatientStatus::New));
    }

    #[test]
    fn test_crisis_flag_sticks() {
        let mut s = session();
        s.flag_crisis(CrisisEscalationRecord::new("end my life", "end my life", IntakeStage::Status));
        s.flag_crisis(CrisisEscalationRecord::new("suicide", "suicide", IntakeStage::Status));
        assert!(s.crisis_flag());
        assert_eq!(s.crisis_record().unwrap().matched_pattern, "end my life");
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut s = session();
        s.begin_turn("new patient");
        let json = serde_json::to_value(s.snapshot()).unwrap();
        assert_eq!(json["stage"], "status");
        assert_eq!(json["turns"], 1);
        assert_eq!(json["history"][0]["role"], "caller");
        assert!(json.get("outcome").is_none());
    }
}
