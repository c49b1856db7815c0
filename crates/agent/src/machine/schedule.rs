//! Schedule stage: resolve a day, propose a slot, reserve it

use chrono::NaiveDate;

use intake_config::PromptsConfig;
use intake_core::{AppointmentSlot, DateRange, ReservationResult, SlotValue, ToolInvocation};
use intake_text_processing::{classify_affirmation, Affirmation, DateResolution, TimePreference};

use super::{
    Effect, Event, InsurancePhase, IntakeMachine, MachineState, Phase, SchedulePhase, StepKind,
    Transition,
};

/// Alternatives kept for the "slot was just taken" path
const MAX_ALTERNATIVES: usize = 4;

impl IntakeMachine {
    pub(super) fn on_schedule_utterance(
        &self,
        state: &MachineState,
        phase: &SchedulePhase,
        call_date: NaiveDate,
        text: &str,
    ) -> Transition {
        match phase {
            SchedulePhase::AwaitingDate => match self.classifiers.dates.resolve(text, call_date) {
                DateResolution::Resolved {
                    date, preference, ..
                } => self.search(state, date, preference),
                DateResolution::Unparseable => self.consult_or_fail(state, text),
            },
            SchedulePhase::AwaitingConfirmation { slot, alternatives } => {
                match classify_affirmation(text) {
                    Affirmation::Yes => self.pending(
                        state,
                        Phase::Schedule(SchedulePhase::Reserving {
                            slot: slot.clone(),
                            alternatives: alternatives.clone(),
                        }),
                        Effect::ReserveSlot {
                            slot_id: slot.id.clone(),
                        },
                    ),
                    answer => match self.classifiers.dates.resolve(text, call_date) {
                        // "no, how about Thursday"
                        DateResolution::Resolved {
                            date, preference, ..
                        } => self.search(state, date, preference),
                        DateResolution::Unparseable if answer == Affirmation::No => self
                            .advance(state, Phase::Schedule(SchedulePhase::AwaitingDate))
                            .with(Effect::reply(&self.prompts().ask_schedule)),
                        DateResolution::Unparseable => self.fail(state, text),
                    },
                }
            }
            SchedulePhase::Searching { .. } | SchedulePhase::Reserving { .. } => {
                Transition::ignored(state)
            }
        }
    }

    pub(super) fn on_schedule_result(&self, state: &MachineState, event: Event) -> Transition {
        let Phase::Schedule(phase) = &state.phase else {
            return Transition::ignored(state);
        };

        match (phase, event) {
            (SchedulePhase::Searching { requested, preference }, Event::SlotsFound(Ok(slots))) => {
                self.propose(state, *requested, *preference, slots)
            }
            (SchedulePhase::Searching { .. }, Event::SlotsFound(Err(e))) => {
                tracing::warn!(error = %e, "Availability lookup failed");
                self.fail_at(
                    state,
                    Phase::Schedule(SchedulePhase::AwaitingDate),
                    self.prompts().calendar_unavailable.clone(),
                )
            }
            (
                SchedulePhase::Reserving { .. },
                Event::ReservationDone(Ok(
                    ReservationResult::Reserved { slot } | ReservationResult::AlreadyHeld { slot },
                )),
            ) => {
                let mut t = self
                    .advance(state, Phase::Insurance(InsurancePhase::AwaitingDecision))
                    .with(Effect::fill(SlotValue::Appointment(slot.clone())))
                    .with(Effect::reply(&self.prompts().ask_insurance));
                t.next.held = Some(slot);
                t
            }
            (
                SchedulePhase::Reserving { alternatives, .. },
                Event::ReservationDone(Ok(ReservationResult::Conflict { slot_id })),
            ) => {
                tracing::info!(slot_id = %slot_id, "Slot taken by another caller");
                let mut remaining = alternatives.clone();
                if remaining.is_empty() {
                    return self
                        .advance(state, Phase::Schedule(SchedulePhase::AwaitingDate))
                        .with(Effect::reply(&self.prompts().no_availability));
                }
                let next = remaining.remove(0);
                let reply = PromptsConfig::render(&self.prompts().slot_taken, &[("slot", &next.describe())]);
                Transition::new(
                    MachineState {
                        phase: Phase::Schedule(SchedulePhase::AwaitingConfirmation {
                            slot: next,
                            alternatives: remaining,
                        }),
                        failures: state.failures,
                        held: state.held.clone(),
                    },
                    StepKind::Advanced,
                )
                .with(Effect::reply(reply))
            }
            (SchedulePhase::Reserving { .. }, Event::ReservationDone(Err(e))) => {
                tracing::warn!(error = %e, "Reservation failed");
                self.fail_at(
                    state,
                    Phase::Schedule(SchedulePhase::AwaitingDate),
                    self.prompts().calendar_unavailable.clone(),
                )
            }
            _ => Transition::ignored(state),
        }
    }

    pub(super) fn schedule_from_tool_call(
        &self,
        state: &MachineState,
        call_date: NaiveDate,
        call: ToolInvocation,
    ) -> Transition {
        if let ToolInvocation::CheckAvailability { date } = &call {
            let resolved = match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
                Ok(date) => Some((date, TimePreference::Any)),
                Err(_) => match self.classifiers.dates.resolve(date, call_date) {
                    DateResolution::Resolved {
                        date, preference, ..
                    } => Some((date, preference)),
                    DateResolution::Unparseable => None,
                },
            };
            if let Some((date, preference)) = resolved {
                return self.search(state, date, preference);
            }
        }
        tracing::debug!(tool = call.name(), "Reasoning tool call not usable at schedule");
        let reply = self.clarification(&state.phase);
        self.fail_at(state, state.phase.clone(), reply)
    }

    fn search(&self, state: &MachineState, date: NaiveDate, preference: TimePreference) -> Transition {
        let range = DateRange::starting_at(date, self.policy.scheduling.search_horizon_days);
        self.pending(
            state,
            Phase::Schedule(SchedulePhase::Searching {
                requested: date,
                preference,
            }),
            Effect::FindSlots { range, preference },
        )
    }

    fn propose(
        &self,
        state: &MachineState,
        requested: NaiveDate,
        preference: TimePreference,
        slots: Vec<AppointmentSlot>,
    ) -> Transition {
        let Some((slot, alternatives)) = pick_slot(slots, requested, preference) else {
            return self
                .advance(state, Phase::Schedule(SchedulePhase::AwaitingDate))
                .with(Effect::reply(&self.prompts().no_availability));
        };

        let prompts = self.prompts();
        let reply = if slot.date == requested {
            PromptsConfig::render(&prompts.propose_slot, &[("slot", &slot.describe())])
        } else {
            let requested = requested.format("%A, %B %-d").to_string();
            PromptsConfig::render(
                &prompts.propose_alternative,
                &[("requested", &requested), ("slot", &slot.describe())],
            )
        };

        self.advance(
            state,
            Phase::Schedule(SchedulePhase::AwaitingConfirmation { slot, alternatives }),
        )
        .with(Effect::reply(reply))
    }
}

/// Earliest slot on or after `requested` honoring the time preference, else
/// the earliest at all. Remaining slots come back preference-first.
fn pick_slot(
    mut slots: Vec<AppointmentSlot>,
    requested: NaiveDate,
    preference: TimePreference,
) -> Option<(AppointmentSlot, Vec<AppointmentSlot>)> {
    slots.retain(|s| s.date >= requested);
    slots.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));

    let index = slots
        .iter()
        .position(|s| preference.matches(s.time))
        .unwrap_or(0);
    if slots.is_empty() {
        return None;
    }
    let chosen = slots.remove(index);

    slots.sort_by_key(|s| !preference.matches(s.time));
    slots.truncate(MAX_ALTERNATIVES);
    Some((chosen, slots))
}
