//! Slot model for the intake call
//!
//! Each slot is filled only by its own stage handler. Once a slot is
//! confirmed, `fill` leaves it untouched. A confirmed slot can only be
//! waived, which the call does when it gives a held appointment back.

use serde::{Deserialize, Serialize};

use crate::appointment::AppointmentSlot;
use crate::stage::IntakeStage;

/// Lifecycle of a single slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    #[default]
    Unfilled,
    Filled,
    Confirmed,
    Waived,
}

/// A named value collected during the call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot<T> {
    value: Option<T>,
    state: SlotState,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            state: SlotState::Unfilled,
        }
    }
}

impl<T> Slot<T> {
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn is_filled(&self) -> bool {
        matches!(self.state, SlotState::Filled | SlotState::Confirmed)
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == SlotState::Confirmed
    }

    /// Fill the slot. Returns `false` (and keeps the old value) if it is confirmed.
    pub fn fill(&mut self, value: T) -> bool {
        if self.is_confirmed() {
            return false;
        }
        self.value = Some(value);
        self.state = SlotState::Filled;
        true
    }

    /// Fill and confirm in one step
    pub fn fill_confirmed(&mut self, value: T) -> bool {
        if self.fill(value) {
            self.state = SlotState::Confirmed;
            true
        } else {
            false
        }
    }

    pub fn confirm(&mut self) {
        if self.value.is_some() {
            self.state = SlotState::Confirmed;
        }
    }

    pub fn waive(&mut self) {
        self.value = None;
        self.state = SlotState::Waived;
    }
}

/// Slot names, one per data-collecting stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    Status,
    Symptoms,
    Duration,
    Location,
    Appointment,
    Insurance,
}

impl SlotName {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::Status => "status",
            SlotName::Symptoms => "symptoms",
            SlotName::Duration => "duration",
            SlotName::Location => "location",
            SlotName::Appointment => "appointment",
            SlotName::Insurance => "insurance",
        }
    }

    /// Stage that owns this slot
    pub fn stage(&self) -> IntakeStage {
        match self {
            SlotName::Status => IntakeStage::Status,
            SlotName::Symptoms => IntakeStage::Symptoms,
            SlotName::Duration => IntakeStage::Duration,
            SlotName::Location => IntakeStage::Location,
            SlotName::Appointment => IntakeStage::Schedule,
            SlotName::Insurance => IntakeStage::Insurance,
        }
    }
}

/// New or returning patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    New,
    Returning,
}

impl PatientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatientStatus::New => "new",
            PatientStatus::Returning => "returning",
        }
    }
}

/// How the caller will pay for the visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InsuranceDecision {
    Insured {
        provider: String,
        member_id: String,
        copay_usd: Option<u32>,
    },
    SelfPay {
        amount_usd: u32,
    },
    Declined,
}

/// Typed value for a slot fill, used by transition effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "slot", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
    Status(PatientStatus),
    Symptoms(String),
    Duration(String),
    Location(String),
    Appointment(AppointmentSlot),
    Insurance(InsuranceDecision),
}

impl SlotValue {
    pub fn name(&self) -> SlotName {
        match self {
            SlotValue::Status(_) => SlotName::Status,
            SlotValue::Symptoms(_) => SlotName::Symptoms,
            SlotValue::Duration(_) => SlotName::Duration,
            SlotValue::Location(_) => SlotName::Location,
            SlotValue::Appointment(_) => SlotName::Appointment,
            SlotValue::Insurance(_) => SlotName::Insurance,
        }
    }
}

/// All slots collected during one call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeSlots {
    pub status: Slot<PatientStatus>,
    pub symptoms: Slot<String>,
    pub duration: Slot<String>,
    pub location: Slot<String>,
    pub appointment: Slot<AppointmentSlot>,
    pub insurance: Slot<InsuranceDecision>,
}

impl IntakeSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a confirmed fill. Returns `false` when the slot was already confirmed.
    pub fn apply(&mut self, value: SlotValue) -> bool {
        match value {
            SlotValue::Status(v) => self.status.fill_confirmed(v),
            SlotValue::Symptoms(v) => self.symptoms.fill_confirmed(v),
            SlotValue::Duration(v) => self.duration.fill_confirmed(v),
            SlotValue::Location(v) => self.location.fill_confirmed(v),
            SlotValue::Appointment(v) => self.appointment.fill_confirmed(v),
            SlotValue::Insurance(v) => self.insurance.fill_confirmed(v),
        }
    }

    /// Clear a slot that no longer holds, keeping the record that it was decided
    pub fn waive(&mut self, name: SlotName) {
        match name {
            SlotName::Status => self.status.waive(),
            SlotName::Symptoms => self.symptoms.waive(),
            SlotName::Duration => self.duration.waive(),
            SlotName::Location => self.location.waive(),
            SlotName::Appointment => self.appointment.waive(),
            SlotName::Insurance => self.insurance.waive(),
        }
    }

    pub fn state_of(&self, name: SlotName) -> SlotState {
        match name {
            SlotName::Status => self.status.state(),
            SlotName::Symptoms => self.symptoms.state(),
            SlotName::Duration => self.duration.state(),
            SlotName::Location => self.location.state(),
            SlotName::Appointment => self.appointment.state(),
            SlotName::Insurance => self.insurance.state(),
        }
    }

    /// Flat name/value view for prompts and snapshots
    pub fn summary(&self) -> Vec<(SlotName, String)> {
        let mut out = Vec::new();
        if let Some(v) = self.status.value() {
            out.push((SlotName::Status, v.as_str().to_string()));
        }
        if let Some(v) = self.symptoms.value() {
            out.push((SlotName::Symptoms, v.clone()));
        }
        if let Some(v) = self.duration.value() {
            out.push((SlotName::Duration, v.clone()));
        }
        if let Some(v) = self.location.value() {
            out.push((SlotName::Location, v.clone()));
        }
        if let Some(v) = self.appointment.value() {
            out.push((SlotName::Appointment, v.describe()));
        }
        if let Some(v) = self.insurance.value() {
            let text = match v {
                InsuranceDecision::Insured { provider, .. } => format!("insured ({provider})"),
                InsuranceDecision::SelfPay { amount_usd } => format!("self_pay (${amount_usd})"),
                InsuranceDecision::Declined => "declined".to_string(),
            };
            out.push((SlotName::Insurance, text));
        }
        out
    }
}
