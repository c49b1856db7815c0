//! Caller-facing prompt templates
//!
//! Templates use `{name}` placeholders filled by `PromptsConfig::render`.

use serde::{Deserialize, Serialize};

use intake_core::IntakeStage;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub greeting: String,
    pub ask_status: String,
    pub ask_symptoms: String,
    pub ask_duration: String,
    pub ask_location: String,
    pub ask_schedule: String,
    pub ask_specific_day: String,
    /// `{slot}`
    pub propose_slot: String,
    /// `{requested}`, `{slot}`
    pub propose_alternative: String,
    /// `{slot}`
    pub slot_taken: String,
    pub no_availability: String,
    pub calendar_unavailable: String,
    pub ask_insurance: String,
    pub ask_insurance_details: String,
    pub ask_provider: String,
    pub ask_member_id: String,
    pub invalid_member_id: String,
    /// `{amount}`
    pub offer_self_pay: String,
    /// `{amount}`
    pub insurance_not_accepted: String,
    /// `{amount}`
    pub verification_unavailable: String,
    /// `{slot}`, `{booking}`, `{copay}`
    pub booked_insured: String,
    /// `{slot}`, `{booking}`, `{amount}`
    pub booked_self_pay: String,
    pub booking_failed: String,
    pub unscheduled: String,
    pub scope_rejection: String,
    pub irrelevant: String,
    pub repeat: String,
    pub handoff_offer: String,
    pub handoff_declined: String,
    pub human_transfer: String,
    pub crisis: String,
    /// `{city}`, `{doctors}`
    pub nearby_doctors: String,
    pub telehealth_only: String,
    /// `{clinic}`, `{date}`
    pub system_prompt: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello, thank you for calling Orchard Clinic. Are you a new or returning patient?".into(),
            ask_status: "Are you a new or returning patient?".into(),
            ask_symptoms: "Thank you. Could you tell me a little about what you've been experiencing?".into(),
            ask_duration: "I'm sorry you're going through that. How long have you been experiencing this?".into(),
            ask_location: "Which city are you calling from?".into(),
            ask_schedule: "What day would work best for your appointment?".into(),
            ask_specific_day: "Could you give me a specific day, like tomorrow or next Monday?".into(),
            propose_slot: "The nearest opening is {slot}. Would you like me to book it?".into(),
            propose_alternative: "We don't have openings on {requested}. The next best option is {slot}. Would you like me to book it?".into(),
            slot_taken: "That time was just taken. The next opening is {slot}. Would you like that one instead?".into(),
            no_availability: "I don't see any openings around then. Is there another day that works for you?".into(),
            calendar_unavailable: "I couldn't reach our calendar just now. Could you tell me the day again?".into(),
            ask_insurance: "Will you be using insurance for this visit?".into(),
            ask_insurance_details: "Great. Who is your insurance provider, and what is your member ID?".into(),
            ask_provider: "Who is your insurance provider?".into(),
            ask_member_id: "What is the member ID on your insurance card?".into(),
            invalid_member_id: "That member ID doesn't look right. Could you read it to me again?".into(),
            offer_self_pay: "No problem. Our self-pay rate is ${amount} per session. Would you like to book at that rate?".into(),
            insurance_not_accepted: "I'm sorry, we weren't able to accept that plan. Our self-pay rate is ${amount} per session. Would you like to book at that rate?".into(),
            verification_unavailable: "I couldn't reach the insurance verification service. Our self-pay rate is ${amount} per session. Would you like to book at that rate?".into(),
            booked_insured: "Your insurance is active with a ${copay} co-pay. You're all set for {slot}. Your booking reference is {booking}.".into(),
            booked_self_pay: "You're all set for {slot} at the self-pay rate of ${amount}. Your booking reference is {booking}.".into(),
            booking_failed: "I wasn't able to finalize the booking. Let me connect you with a member of our staff.".into(),
            unscheduled: "I understand. We haven't booked anything, and you can call back any time. Take care.".into(),
            scope_rejection: "I'm sorry, Orchard Clinic only provides mental health care. For a physical injury or illness, please contact your doctor or urgent care. Take care.".into(),
            irrelevant: "I'm not sure, but let's get you booked.".into(),
            repeat: "Could you please repeat that?".into(),
            handoff_offer: "I'm having trouble understanding. Would you like me to transfer you to a member of our staff?".into(),
            handoff_declined: "Okay, let's keep going.".into(),
            human_transfer: "Connecting you to a member of our staff now. Please stay on the line.".into(),
            crisis: "I'm here with you. I am connecting you to a crisis specialist right now. Are you safe right now?".into(),
            nearby_doctors: "Thanks. Near {city} we have {doctors}.".into(),
            telehealth_only: "Thanks. We don't have specialists near you, but tele-consultation is available.".into(),
            system_prompt: "You are the intake coordinator for {clinic}. Today is {date}. \
                You only help with mental health care. Ask one question at a time, be calm, \
                empathetic and brief. Never confirm a booking yourself; use the tools provided."
                .into(),
        }
    }
}

impl PromptsConfig {
    /// Fill `{key}` placeholders
    pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
        vars.iter().fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), value)
        })
    }

    /// The question that collects the given stage's slot
    pub fn stage_question(&self, stage: IntakeStage) -> &str {
        match stage {
            IntakeStage::Status => &self.ask_status,
            IntakeStage::Symptoms => &self.ask_symptoms,
            IntakeStage::Duration => &self.ask_duration,
            IntakeStage::Location => &self.ask_location,
            IntakeStage::Schedule => &self.ask_schedule,
            IntakeStage::Insurance => &self.ask_insurance,
            IntakeStage::Closed => "",
        }
    }
}
