//! Inputs to the transition function

use intake_core::{AppointmentSlot, ReasoningOutput, ReservationResult, Result, VerificationResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Final transcript of one caller utterance
    Utterance(String),
    SlotsFound(Result<Vec<AppointmentSlot>>),
    ReservationDone(Result<ReservationResult>),
    VerificationDone(Result<VerificationResult>),
    /// Booking reference, or why the booking could not be confirmed
    BookingDone(Result<String>),
    /// `None` when the engine failed or is not configured
    ReasoningDone(Option<ReasoningOutput>),
    HangUp,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Utterance(_) => "utterance",
            Event::SlotsFound(_) => "slots_found",
            Event::ReservationDone(_) => "reservation_done",
            Event::VerificationDone(_) => "verification_done",
            Event::BookingDone(_) => "booking_done",
            Event::ReasoningDone(_) => "reasoning_done",
            Event::HangUp => "hang_up",
        }
    }
}
