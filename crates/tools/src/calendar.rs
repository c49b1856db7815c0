//! In-memory clinic calendar
//!
//! Slots are generated from the weekly doctor roster. Holds and bookings live
//! behind one mutex so `reserve_slot` is a single check-and-reserve.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use parking_lot::Mutex;
use std::collections::HashMap;

use intake_config::{ConfigError, DoctorRoster};
use intake_core::{
    AppointmentSlot, DateRange, Error, ReservationResult, Result, SchedulingProvider,
};

const TOOL: &str = "calendar";

#[derive(Debug, Clone)]
struct WeeklySlot {
    doctor: String,
    specialty: String,
    weekday: Weekday,
    time: NaiveTime,
}

#[derive(Debug, Default)]
struct CalendarState {
    /// session id -> held slot
    holds: HashMap<String, AppointmentSlot>,
    /// slot id -> booking reference
    booked: HashMap<String, String>,
}

impl CalendarState {
    fn holder_of(&self, slot_id: &str) -> Option<&str> {
        self.holds
            .iter()
            .find(|(_, slot)| slot.id == slot_id)
            .map(|(session, _)| session.as_str())
    }

    fn is_taken(&self, slot_id: &str) -> bool {
        self.booked.contains_key(slot_id) || self.holder_of(slot_id).is_some()
    }
}

pub struct InMemoryCalendar {
    weekly: Vec<WeeklySlot>,
    state: Mutex<CalendarState>,
}

impl InMemoryCalendar {
    pub fn from_roster(roster: &DoctorRoster) -> std::result::Result<Self, ConfigError> {
        let mut weekly = roster
            .entries
            .iter()
            .map(|entry| {
                Ok(WeeklySlot {
                    doctor: entry.doctor.clone(),
                    specialty: entry.specialty.clone(),
                    weekday: entry.parsed_weekday()?,
                    time: entry.parsed_time()?,
                })
            })
            .collect::<std::result::Result<Vec<_>, ConfigError>>()?;
        weekly.sort_by_key(|s| (s.weekday.num_days_from_monday(), s.time));

        Ok(Self {
            weekly,
            state: Mutex::new(CalendarState::default()),
        })
    }

    /// Every roster slot on a day, taken or not
    fn slots_on(&self, date: NaiveDate) -> impl Iterator<Item = AppointmentSlot> + '_ {
        self.weekly
            .iter()
            .filter(move |w| w.weekday == date.weekday())
            .map(move |w| AppointmentSlot::new(&w.doctor, &w.specialty, date, w.time))
    }

    fn lookup(&self, slot_id: &str) -> Option<AppointmentSlot> {
        let date = slot_id
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())?;
        self.slots_on(date).find(|slot| slot.id == slot_id)
    }

    /// Mark a slot as booked outside this line (front desk, another channel)
    pub fn mark_booked(&self, slot_id: &str, reference: &str) {
        self.state
            .lock()
            .booked
            .insert(slot_id.to_string(), reference.to_string());
    }

    pub fn held_by(&self, session_id: &str) -> Option<AppointmentSlot> {
        self.state.lock().holds.get(session_id).cloned()
    }

    pub fn booking_for(&self, slot_id: &str) -> Option<String> {
        self.state.lock().booked.get(slot_id).cloned()
    }

    pub fn hold_count(&self) -> usize {
        self.state.lock().holds.len()
    }
}

impl Default for InMemoryCalendar {
    fn default() -> Self {
        Self::from_roster(&DoctorRoster::default())
            .unwrap_or_else(|_| Self {
                weekly: Vec::new(),
                state: Mutex::new(CalendarState::default()),
            })
    }
}

#[async_trait]
impl SchedulingProvider for InMemoryCalendar {
    async fn list_available_slots(&self, range: DateRange) -> Result<Vec<AppointmentSlot>> {
        let state = self.state.lock();
        let slots: Vec<AppointmentSlot> = range
            .days()
            .flat_map(|date| self.slots_on(date))
            .filter(|slot| !state.is_taken(&slot.id))
            .collect();

        tracing::debug!(
            start = %range.start,
            end = %range.end,
            available = slots.len(),
            "Listed calendar slots"
        );
        Ok(slots)
    }

    async fn reserve_slot(&self, slot_id: &str, session_id: &str) -> Result<ReservationResult> {
        let slot = self
            .lookup(slot_id)
            .ok_or_else(|| Error::tool(TOOL, format!("unknown slot {slot_id}")))?;

        let mut state = self.state.lock();
        if let Some(held) = state.holds.get(session_id) {
            if held.id == slot_id {
                return Ok(ReservationResult::AlreadyHeld { slot: held.clone() });
            }
        }
        if state.is_taken(slot_id) {
            tracing::info!(slot_id, session_id, "Slot already taken");
            return Ok(ReservationResult::Conflict {
                slot_id: slot_id.to_string(),
            });
        }

        if let Some(previous) = state.holds.insert(session_id.to_string(), slot.clone()) {
            tracing::debug!(session_id, previous = %previous.id, "Replaced previous hold");
        }
        tracing::info!(slot_id, session_id, "Slot reserved");
        Ok(ReservationResult::Reserved { slot })
    }

    async fn confirm(&self, session_id: &str) -> Result<String> {
        let mut state = self.state.lock();
        let slot = state
            .holds
            .remove(session_id)
            .ok_or_else(|| Error::tool(TOOL, format!("no reservation held by {session_id}")))?;

        let reference = booking_reference();
        state.booked.insert(slot.id.clone(), reference.clone());
        tracing::info!(slot_id = %slot.id, session_id, reference = %reference, "Appointment booked");
        Ok(reference)
    }

    async fn release(&self, session_id: &str) -> Result<()> {
        if let Some(slot) = self.state.lock().holds.remove(session_id) {
            tracing::info!(slot_id = %slot.id, session_id, "Reservation released");
        }
        Ok(())
    }
}

fn booking_reference() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("APT-{}", id[..8].to_uppercase())
}
