//! Intake state machine
//!
//! Pure transition table: `(state, event) -> Transition { next, effects }`.
//! No IO happens here. Every turn runs the crisis detector first, then the
//! scope filter, then the handler for the current phase.

mod effect;
mod event;
mod insurance;
mod schedule;
mod state;

pub use effect::{Effect, StepKind};
pub use event::Event;
pub use state::{InsurancePhase, MachineState, Phase, SchedulePhase};

use chrono::NaiveDate;
use std::sync::Arc;

use intake_config::{IntakePolicy, PromptsConfig};
use intake_core::{CallOutcome, ReasoningOutput, SlotName, SlotValue};
use intake_text_processing::{
    classify_affirmation, Affirmation, Classifiers, CrisisAssessment, ScopeClass, SlotExtractor,
};

/// Result of one step
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: MachineState,
    pub effects: Vec<Effect>,
    pub step: StepKind,
}

impl Transition {
    fn new(next: MachineState, step: StepKind) -> Self {
        Self {
            next,
            effects: Vec::new(),
            step,
        }
    }

    fn ignored(state: &MachineState) -> Self {
        Self::new(state.clone(), StepKind::Ignored)
    }

    fn with(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Give a held slot back; the appointment slot no longer names a booking
    fn releasing(self, held: bool) -> Self {
        if !held {
            return self;
        }
        self.with(Effect::ReleaseReservation).with(Effect::WaiveSlot {
            slot: SlotName::Appointment,
        })
    }

    /// Concatenated reply text of this step
    pub fn reply(&self) -> String {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Reply { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct IntakeMachine {
    policy: Arc<IntakePolicy>,
    classifiers: Arc<Classifiers>,
    reasoning_enabled: bool,
}

impl IntakeMachine {
    pub fn new(policy: Arc<IntakePolicy>) -> Self {
        let classifiers = Arc::new(Classifiers::from_policy(&policy));
        Self {
            policy,
            classifiers,
            reasoning_enabled: false,
        }
    }

    /// Consult the reasoning engine when extraction fails at Schedule or Insurance
    pub fn with_reasoning(mut self, enabled: bool) -> Self {
        self.reasoning_enabled = enabled;
        self
    }

    pub fn policy(&self) -> &IntakePolicy {
        &self.policy
    }

    pub fn greeting(&self) -> &str {
        &self.prompts().greeting
    }

    fn prompts(&self) -> &PromptsConfig {
        &self.policy.prompts
    }

    pub fn transition(&self, state: &MachineState, call_date: NaiveDate, event: Event) -> Transition {
        if state.phase.is_closed() {
            return Transition::ignored(state);
        }

        match event {
            Event::HangUp => self.close(state, CallOutcome::Abandoned, None, StepKind::Closed),
            Event::Utterance(text) => self.on_utterance(state, call_date, &text),
            Event::ReasoningDone(output) => self.on_reasoning(state, call_date, output),
            other => match &state.phase {
                Phase::Schedule(_) => self.on_schedule_result(state, other),
                Phase::Insurance(_) => self.on_insurance_result(state, other),
                _ => Transition::ignored(state),
            },
        }
    }

    fn on_utterance(&self, state: &MachineState, call_date: NaiveDate, text: &str) -> Transition {
        if let CrisisAssessment::Crisis { matched_pattern } = self.classifiers.crisis.detect(text) {
            return self.crisis(state, matched_pattern);
        }

        let in_handoff = matches!(state.phase, Phase::HandoffOffered { .. });
        match self.classifiers.scope.classify(text, state.stage()) {
            ScopeClass::PhysicalAilment { keyword } => {
                tracing::info!(keyword = %keyword, "Physical ailment, outside clinic scope");
                let reply = self.prompts().scope_rejection.clone();
                return self.close(state, CallOutcome::RejectedScope, Some(reply), StepKind::RejectedScope);
            }
            ScopeClass::Irrelevant { keyword } if !in_handoff => {
                tracing::debug!(keyword = %keyword, "Off-topic utterance redirected");
                let reply = format!("{} {}", self.prompts().irrelevant, self.question(&state.phase));
                return Transition::new(state.clone(), StepKind::Redirect).with(Effect::reply(reply));
            }
            _ => {}
        }

        let slots = &self.classifiers.slots;
        match &state.phase {
            Phase::Status => match slots.status(text) {
                Some(status) => self
                    .advance(state, Phase::Symptoms)
                    .with(Effect::fill(SlotValue::Status(status)))
                    .with(Effect::reply(&self.prompts().ask_symptoms)),
                None => self.fail(state, text),
            },
            Phase::Symptoms => match slots.symptoms(text) {
                Some(symptoms) => self
                    .advance(state, Phase::Duration)
                    .with(Effect::fill(SlotValue::Symptoms(symptoms)))
                    .with(Effect::reply(&self.prompts().ask_duration)),
                None => self.fail(state, text),
            },
            Phase::Duration => match slots.duration(text).or_else(|| free_text(text)) {
                Some(duration) => self
                    .advance(state, Phase::Location)
                    .with(Effect::fill(SlotValue::Duration(duration)))
                    .with(Effect::reply(&self.prompts().ask_location)),
                None => self.fail(state, text),
            },
            Phase::Location => match slots.location(text) {
                Some(city) => {
                    let reply = format!("{} {}", self.nearby_ack(&city), self.prompts().ask_schedule);
                    self.advance(state, Phase::Schedule(SchedulePhase::AwaitingDate))
                        .with(Effect::fill(SlotValue::Location(city)))
                        .with(Effect::reply(reply))
                }
                None => self.fail(state, text),
            },
            Phase::Schedule(sub) => self.on_schedule_utterance(state, sub, call_date, text),
            Phase::Insurance(sub) => self.on_insurance_utterance(state, sub, text),
            Phase::HandoffOffered { resume } => self.on_handoff_answer(state, resume, text),
            Phase::Closed(_) => Transition::ignored(state),
        }
    }

    fn on_handoff_answer(&self, state: &MachineState, resume: &Phase, text: &str) -> Transition {
        match classify_affirmation(text) {
            Affirmation::No => {
                let reply = format!("{} {}", self.prompts().handoff_declined, self.question(resume));
                self.advance(state, resume.clone()).with(Effect::reply(reply))
            }
            // yes, or anything we still can't make out
            Affirmation::Yes | Affirmation::Unclear => self.transfer_to_human(state, &self.prompts().human_transfer),
        }
    }

    fn on_reasoning(
        &self,
        state: &MachineState,
        call_date: NaiveDate,
        output: Option<ReasoningOutput>,
    ) -> Transition {
        match (&state.phase, output) {
            (Phase::Schedule(SchedulePhase::AwaitingDate), Some(ReasoningOutput::ToolCall(call))) => {
                self.schedule_from_tool_call(state, call_date, call)
            }
            (Phase::Insurance(_), Some(ReasoningOutput::ToolCall(call))) => {
                self.insurance_from_tool_call(state, call)
            }
            (Phase::Schedule(_) | Phase::Insurance(_), Some(ReasoningOutput::Text(text))) => {
                self.fail_at(state, state.phase.clone(), text)
            }
            (Phase::Schedule(_) | Phase::Insurance(_), _) => {
                let reply = self.clarification(&state.phase);
                self.fail_at(state, state.phase.clone(), reply)
            }
            _ => Transition::ignored(state),
        }
    }

    fn crisis(&self, state: &MachineState, pattern: String) -> Transition {
        tracing::warn!(pattern = %pattern, stage = %state.stage(), "Crisis indicator matched");
        let next = MachineState {
            phase: Phase::Closed(CallOutcome::TransferredCrisis),
            failures: state.failures,
            held: None,
        };

        Transition::new(next, StepKind::Crisis)
            .with(Effect::reply(&self.prompts().crisis))
            .with(Effect::TransferCrisis { pattern })
            .releasing(state.held.is_some())
            .with(Effect::EndCall {
                outcome: CallOutcome::TransferredCrisis,
            })
    }

    fn transfer_to_human(&self, state: &MachineState, reply: &str) -> Transition {
        Transition::new(
            MachineState {
                phase: Phase::Closed(CallOutcome::TransferredHuman),
                failures: state.failures,
                held: None,
            },
            StepKind::Closed,
        )
        .with(Effect::reply(reply))
        .with(Effect::TransferHuman)
        .releasing(state.held.is_some())
        .with(Effect::EndCall {
            outcome: CallOutcome::TransferredHuman,
        })
    }

    /// End the call; anything short of a booking gives the held slot back
    fn close(
        &self,
        state: &MachineState,
        outcome: CallOutcome,
        reply: Option<String>,
        step: StepKind,
    ) -> Transition {
        let keep_hold = outcome == CallOutcome::Scheduled;
        let mut t = Transition::new(
            MachineState {
                phase: Phase::Closed(outcome),
                failures: state.failures,
                held: if keep_hold { state.held.clone() } else { None },
            },
            step,
        );
        if let Some(reply) = reply {
            t = t.with(Effect::reply(reply));
        }
        t.releasing(!keep_hold && state.held.is_some())
            .with(Effect::EndCall { outcome })
    }

    /// Move to `phase` after a successful extraction
    fn advance(&self, state: &MachineState, phase: Phase) -> Transition {
        Transition::new(
            MachineState {
                phase,
                failures: 0,
                held: state.held.clone(),
            },
            StepKind::Advanced,
        )
    }

    /// Wait on a collaborator without touching the failure count
    fn pending(&self, state: &MachineState, phase: Phase, effect: Effect) -> Transition {
        Transition::new(
            MachineState {
                phase,
                failures: state.failures,
                held: state.held.clone(),
            },
            StepKind::Pending,
        )
        .with(effect)
    }

    fn fail(&self, state: &MachineState, text: &str) -> Transition {
        let reply = if SlotExtractor::is_unintelligible(text) {
            format!("{} {}", self.prompts().repeat, self.question(&state.phase))
        } else {
            self.clarification(&state.phase)
        };
        self.fail_at(state, state.phase.clone(), reply)
    }

    /// Count a failed extraction; the cap turns it into a handoff offer
    fn fail_at(&self, state: &MachineState, phase: Phase, reply: String) -> Transition {
        let failures = state.failures.saturating_add(1);
        if failures >= self.policy.retries.max_consecutive_failures {
            tracing::info!(stage = %phase.stage(), failures, "Retry cap reached, offering human transfer");
            return Transition::new(
                MachineState {
                    phase: Phase::HandoffOffered {
                        resume: Box::new(phase),
                    },
                    failures,
                    held: state.held.clone(),
                },
                StepKind::HandoffOffered,
            )
            .with(Effect::reply(&self.prompts().handoff_offer));
        }

        Transition::new(
            MachineState {
                phase,
                failures,
                held: state.held.clone(),
            },
            StepKind::Reprompt,
        )
        .with(Effect::reply(reply))
    }

    /// Failed extraction at a phase the reasoning engine may help with
    fn consult_or_fail(&self, state: &MachineState, text: &str) -> Transition {
        if self.reasoning_enabled && !SlotExtractor::is_unintelligible(text) {
            let guidance = self.clarification(&state.phase);
            return self.pending(state, state.phase.clone(), Effect::ConsultReasoning { guidance });
        }
        self.fail(state, text)
    }

    /// The question that collects what `phase` is waiting for
    pub fn question(&self, phase: &Phase) -> String {
        let prompts = self.prompts();
        match phase {
            Phase::Status => prompts.ask_status.clone(),
            Phase::Symptoms => prompts.ask_symptoms.clone(),
            Phase::Duration => prompts.ask_duration.clone(),
            Phase::Location => prompts.ask_location.clone(),
            Phase::Schedule(SchedulePhase::AwaitingDate | SchedulePhase::Searching { .. }) => {
                prompts.ask_schedule.clone()
            }
            Phase::Schedule(
                SchedulePhase::AwaitingConfirmation { slot, .. } | SchedulePhase::Reserving { slot, .. },
            ) => PromptsConfig::render(&prompts.propose_slot, &[("slot", &slot.describe())]),
            Phase::Insurance(InsurancePhase::AwaitingDecision) => prompts.ask_insurance.clone(),
            Phase::Insurance(InsurancePhase::AwaitingDetails {
                provider,
                member_id,
            }) => match (provider, member_id) {
                (None, Some(_)) => prompts.ask_provider.clone(),
                (Some(_), None) => prompts.ask_member_id.clone(),
                _ => prompts.ask_insurance_details.clone(),
            },
            Phase::Insurance(InsurancePhase::Verifying { .. }) => prompts.ask_insurance_details.clone(),
            Phase::Insurance(InsurancePhase::AwaitingSelfPay | InsurancePhase::Booking { .. }) => {
                self.render_amount(&prompts.offer_self_pay)
            }
            Phase::HandoffOffered { .. } => prompts.handoff_offer.clone(),
            Phase::Closed(_) => String::new(),
        }
    }

    /// Re-prompt for an answer we heard but could not use
    fn clarification(&self, phase: &Phase) -> String {
        match phase {
            Phase::Schedule(SchedulePhase::AwaitingDate) => self.prompts().ask_specific_day.clone(),
            other => self.question(other),
        }
    }

    fn render_amount(&self, template: &str) -> String {
        PromptsConfig::render(template, &[("amount", &self.policy.self_pay.amount_usd.to_string())])
    }

    fn nearby_ack(&self, city: &str) -> String {
        let prompts = self.prompts();
        match self.policy.scheduling.roster.nearby_doctors(city) {
            Some(doctors) if !doctors.is_empty() => PromptsConfig::render(
                &prompts.nearby_doctors,
                &[("city", city), ("doctors", &doctors.join(" and "))],
            ),
            _ => prompts.telehealth_only.clone(),
        }
    }
}

/// Any intelligible answer of two or more words
fn free_text(text: &str) -> Option<String> {
    let trimmed = text.trim().trim_end_matches(['.', '!']).trim();
    if SlotExtractor::is_unintelligible(trimmed) || trimmed.split_whitespace().count() < 2 {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{IntakeStage, PatientStatus};

    pub(super) fn machine() -> IntakeMachine {
        IntakeMachine::new(Arc::new(IntakePolicy::default()))
    }

    pub(super) fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    pub(super) fn say(m: &IntakeMachine, state: &MachineState, text: &str) -> Transition {
        m.transition(state, june(3), Event::Utterance(text.to_string()))
    }

    #[test]
    fn test_status_advances_to_symptoms() {
        let m = machine();
        let t = say(&m, &MachineState::new(), "I'm a new patient");
        assert_eq!(t.next.phase, Phase::Symptoms);
        assert_eq!(t.step, StepKind::Advanced);
        assert_eq!(
            t.effects[0],
            Effect::fill(SlotValue::Status(PatientStatus::New))
        );
        assert!(t.reply().contains("what you've been experiencing"));
    }

    #[test]
    fn test_physical_ailment_closes_without_transfer() {
        let m = machine();
        let t = say(&m, &MachineState::new(), "I think I broke my arm");
        assert_eq!(t.next.phase, Phase::Closed(CallOutcome::RejectedScope));
        assert_eq!(t.step, StepKind::RejectedScope);
        assert!(!t
            .effects
            .iter()
            .any(|e| matches!(e, Effect::TransferCrisis { .. } | Effect::TransferHuman)));
        assert!(t.reply().contains("only provides mental health care"));
    }

    #[test]
    fn test_crisis_wins_at_any_stage() {
        let m = machine();
        for phase in [
            Phase::Status,
            Phase::Duration,
            Phase::Schedule(SchedulePhase::AwaitingDate),
            Phase::Insurance(InsurancePhase::AwaitingSelfPay),
        ] {
            let t = say(&m, &MachineState::at(phase), "I want to end my life");
            assert_eq!(t.next.phase, Phase::Closed(CallOutcome::TransferredCrisis));
            assert_eq!(
                t.effects[1],
                Effect::TransferCrisis {
                    pattern: "end my life".into()
                }
            );
            assert!(!t.effects.iter().any(|e| matches!(e, Effect::FillSlot { .. })));
        }
    }

    #[test]
    fn test_crisis_releases_held_slot() {
        let m = machine();
        let mut state = MachineState::at(Phase::Insurance(InsurancePhase::AwaitingDecision));
        state.held = Some(intake_core::AppointmentSlot::new(
            "Dr. Lee",
            "Bipolar",
            june(10),
            chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        ));
        let t = say(&m, &state, "I can't do this anymore, I want to hurt myself");
        assert!(t.effects.contains(&Effect::ReleaseReservation));
        assert!(t.effects.contains(&Effect::WaiveSlot {
            slot: SlotName::Appointment
        }));
        assert_eq!(t.next.held, None);

        let hung_up = m.transition(&state, june(3), Event::HangUp);
        assert_eq!(
            hung_up.effects,
            vec![
                Effect::ReleaseReservation,
                Effect::WaiveSlot {
                    slot: SlotName::Appointment
                },
                Effect::EndCall {
                    outcome: CallOutcome::Abandoned
                },
            ]
        );
    }

    #[test]
    fn test_irrelevant_redirects_without_counting() {
        let m = machine();
        let state = MachineState::at(Phase::Duration);
        let t = say(&m, &state, "did you see the football game last night");
        assert_eq!(t.step, StepKind::Redirect);
        assert_eq!(t.next, state);
        assert_eq!(
            t.reply(),
            "I'm not sure, but let's get you booked. I'm sorry you're going through that. How long have you been experiencing this?"
        );
    }

    #[test]
    fn test_two_failures_offer_handoff() {
        let m = machine();
        let first = say(&m, &MachineState::new(), "um");
        assert_eq!(first.step, StepKind::Reprompt);
        assert_eq!(first.next.failures, 1);
        assert!(first.reply().starts_with("Could you please repeat that?"));

        let second = say(&m, &first.next, "[inaudible]");
        assert_eq!(second.step, StepKind::HandoffOffered);
        assert_eq!(
            second.next.phase,
            Phase::HandoffOffered {
                resume: Box::new(Phase::Status)
            }
        );
        assert_eq!(second.next.stage(), IntakeStage::Status);
    }

    #[test]
    fn test_handoff_yes_transfers_and_no_resumes() {
        let m = machine();
        let offered = MachineState {
            phase: Phase::HandoffOffered {
                resume: Box::new(Phase::Symptoms),
            },
            failures: 2,
            held: None,
        };

        let yes = say(&m, &offered, "yes please");
        assert_eq!(yes.next.phase, Phase::Closed(CallOutcome::TransferredHuman));
        assert!(yes.effects.contains(&Effect::TransferHuman));

        let no = say(&m, &offered, "no, let's keep going");
        assert_eq!(no.next.phase, Phase::Symptoms);
        assert_eq!(no.next.failures, 0);
        assert!(no.reply().starts_with("Okay, let's keep going."));

        let mumble = say(&m, &offered, "hmm");
        assert_eq!(mumble.next.phase, Phase::Closed(CallOutcome::TransferredHuman));
    }

    #[test]
    fn test_location_acknowledges_nearby_doctors() {
        let m = machine();
        let t = say(&m, &MachineState::at(Phase::Location), "I'm in Delhi");
        assert_eq!(t.next.phase, Phase::Schedule(SchedulePhase::AwaitingDate));
        assert_eq!(
            t.reply(),
            "Thanks. Near Delhi we have Dr. Puckett and Dr. Shah. What day would work best for your appointment?"
        );

        let far = say(&m, &MachineState::at(Phase::Location), "calling from Pune");
        assert!(far.reply().contains("tele-consultation"));
    }

    #[test]
    fn test_hang_up_abandons() {
        let m = machine();
        let t = m.transition(&MachineState::at(Phase::Symptoms), june(3), Event::HangUp);
        assert_eq!(t.next.phase, Phase::Closed(CallOutcome::Abandoned));
        assert_eq!(
            t.effects,
            vec![Effect::EndCall {
                outcome: CallOutcome::Abandoned
            }]
        );
    }

    #[test]
    fn test_closed_ignores_everything() {
        let m = machine();
        let closed = MachineState::at(Phase::Closed(CallOutcome::Scheduled));
        let t = say(&m, &closed, "I want to end my life");
        assert_eq!(t.step, StepKind::Ignored);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_stage_never_regresses_over_a_script() {
        let m = machine();
        let script = [
            "new", "um", "I feel anxious all the time", "the weather is nice", "three weeks",
            "", "Mumbai", "hmm", "no",
        ];
        let mut state = MachineState::new();
        for line in script {
            let t = say(&m, &state, line);
            assert!(t.next.stage() >= state.stage(), "regressed on {line:?}");
            state = t.next;
        }
    }
}
