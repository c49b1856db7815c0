//! Scheduling collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::appointment::{AppointmentSlot, DateRange};
use crate::error::Result;

/// Result of an atomic check-and-reserve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReservationResult {
    Reserved { slot: AppointmentSlot },
    /// This session already holds the slot; nothing changed
    AlreadyHeld { slot: AppointmentSlot },
    /// Another session got there first
    Conflict { slot_id: String },
}

/// Calendar access for the Schedule stage
///
/// `reserve_slot` must be a single atomic check-and-reserve: two sessions
/// racing for the same slot see exactly one `Reserved`. A session holds at
/// most one reservation; reserving a new slot drops the previous hold.
#[async_trait]
pub trait SchedulingProvider: Send + Sync + 'static {
    async fn list_available_slots(&self, range: DateRange) -> Result<Vec<AppointmentSlot>>;

    async fn reserve_slot(&self, slot_id: &str, session_id: &str) -> Result<ReservationResult>;

    /// Turn the session's hold into a booking. Returns the booking reference.
    async fn confirm(&self, session_id: &str) -> Result<String>;

    /// Drop the session's hold, if any
    async fn release(&self, session_id: &str) -> Result<()>;
}
