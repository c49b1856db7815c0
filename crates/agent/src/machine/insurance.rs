//! Insurance negotiation
//!
//! Collects payer and member ID, verifies them, and falls back to the
//! self-pay rate when the caller has no insurance or the plan is rejected.
//! Booking is only confirmed once a decision exists.

use intake_config::PromptsConfig;
use intake_core::{
    CallOutcome, InsuranceDecision, SlotValue, ToolInvocation, VerificationResult,
};
use intake_text_processing::{classify_affirmation, member_id, Affirmation, InsuranceReply};

use super::{
    Effect, Event, InsurancePhase, IntakeMachine, MachineState, Phase, StepKind, Transition,
};

impl IntakeMachine {
    pub(super) fn on_insurance_utterance(
        &self,
        state: &MachineState,
        phase: &InsurancePhase,
        text: &str,
    ) -> Transition {
        let classifier = &self.classifiers.insurance;
        match phase {
            InsurancePhase::AwaitingDecision => match classifier.classify(text) {
                InsuranceReply::Accept {
                    provider,
                    member_id,
                } => self.collect_details(state, provider, member_id),
                InsuranceReply::Refuse => self.offer_self_pay(state, &self.prompts().offer_self_pay),
                InsuranceReply::Unclear => self.consult_or_fail(state, text),
            },
            InsurancePhase::AwaitingDetails {
                provider,
                member_id: known_id,
            } => {
                let new_provider = classifier.provider(text);
                let new_id = member_id(text);
                if new_provider.is_none() && new_id.is_none() {
                    if classifier.is_refusal(text) {
                        return self.offer_self_pay(state, &self.prompts().offer_self_pay);
                    }
                    return self.consult_or_fail(state, text);
                }
                self.collect_details(
                    state,
                    new_provider.or_else(|| provider.clone()),
                    new_id.or_else(|| known_id.clone()),
                )
            }
            InsurancePhase::AwaitingSelfPay => match classify_affirmation(text) {
                Affirmation::Yes => self.book(state, self.self_pay()),
                Affirmation::No => self.decline(state),
                Affirmation::Unclear => match classifier.classify(text) {
                    // caller found their card after all
                    InsuranceReply::Accept {
                        provider,
                        member_id,
                    } if provider.is_some() || member_id.is_some() => {
                        self.collect_details(state, provider, member_id)
                    }
                    _ => self.fail(state, text),
                },
            },
            InsurancePhase::Verifying { .. } | InsurancePhase::Booking { .. } => {
                Transition::ignored(state)
            }
        }
    }

    pub(super) fn on_insurance_result(&self, state: &MachineState, event: Event) -> Transition {
        let Phase::Insurance(phase) = &state.phase else {
            return Transition::ignored(state);
        };

        match (phase, event) {
            (
                InsurancePhase::Verifying {
                    provider,
                    member_id,
                },
                Event::VerificationDone(Ok(result)),
            ) => match result {
                VerificationResult::Accepted { copay_usd } => self.book(
                    state,
                    InsuranceDecision::Insured {
                        provider: provider.clone(),
                        member_id: member_id.clone(),
                        copay_usd,
                    },
                ),
                VerificationResult::NotAccepted => {
                    tracing::info!(provider = %provider, "Plan not accepted, offering self-pay");
                    self.offer_self_pay(state, &self.prompts().insurance_not_accepted)
                }
                VerificationResult::InvalidMemberId => self.fail_at(
                    state,
                    Phase::Insurance(InsurancePhase::AwaitingDetails {
                        provider: Some(provider.clone()),
                        member_id: None,
                    }),
                    self.prompts().invalid_member_id.clone(),
                ),
            },
            (InsurancePhase::Verifying { .. }, Event::VerificationDone(Err(e))) => {
                tracing::warn!(error = %e, "Insurance verification unavailable");
                self.offer_self_pay(state, &self.prompts().verification_unavailable)
            }
            (InsurancePhase::Booking { decision }, Event::BookingDone(Ok(reference))) => {
                let reply = self.booked_reply(state, decision, &reference);
                self.close(state, CallOutcome::Scheduled, Some(reply), StepKind::Closed)
            }
            (InsurancePhase::Booking { .. }, Event::BookingDone(Err(e))) => {
                tracing::error!(error = %e, "Booking confirmation failed");
                self.transfer_to_human(state, &self.prompts().booking_failed)
            }
            _ => Transition::ignored(state),
        }
    }

    pub(super) fn insurance_from_tool_call(&self, state: &MachineState, call: ToolInvocation) -> Transition {
        let awaiting_answer = matches!(
            state.phase,
            Phase::Insurance(InsurancePhase::AwaitingDecision | InsurancePhase::AwaitingDetails { .. })
        );
        match call {
            ToolInvocation::VerifyInsurance {
                provider,
                member_id,
            } if awaiting_answer && !provider.trim().is_empty() && !member_id.trim().is_empty() => {
                self.verify(state, provider, member_id)
            }
            other => {
                tracing::debug!(tool = other.name(), "Reasoning tool call not usable at insurance");
                let reply = self.clarification(&state.phase);
                self.fail_at(state, state.phase.clone(), reply)
            }
        }
    }

    fn collect_details(
        &self,
        state: &MachineState,
        provider: Option<String>,
        member_id: Option<String>,
    ) -> Transition {
        match (provider, member_id) {
            (Some(provider), Some(member_id)) => self.verify(state, provider, member_id),
            (provider, member_id) => {
                let phase = Phase::Insurance(InsurancePhase::AwaitingDetails {
                    provider,
                    member_id,
                });
                let reply = self.question(&phase);
                self.advance(state, phase).with(Effect::reply(reply))
            }
        }
    }

    fn verify(&self, state: &MachineState, provider: String, member_id: String) -> Transition {
        self.pending(
            state,
            Phase::Insurance(InsurancePhase::Verifying {
                provider: provider.clone(),
                member_id: member_id.clone(),
            }),
            Effect::VerifyInsurance {
                provider,
                member_id,
            },
        )
    }

    fn offer_self_pay(&self, state: &MachineState, template: &str) -> Transition {
        self.advance(state, Phase::Insurance(InsurancePhase::AwaitingSelfPay))
            .with(Effect::reply(self.render_amount(template)))
    }

    fn self_pay(&self) -> InsuranceDecision {
        InsuranceDecision::SelfPay {
            amount_usd: self.policy.self_pay.amount_usd,
        }
    }

    /// Record the decision, then confirm the held reservation
    fn book(&self, state: &MachineState, decision: InsuranceDecision) -> Transition {
        let mut t = self.pending(
            state,
            Phase::Insurance(InsurancePhase::Booking {
                decision: decision.clone(),
            }),
            Effect::fill(SlotValue::Insurance(decision)),
        );
        t.effects.push(Effect::ConfirmReservation);
        t
    }

    fn decline(&self, state: &MachineState) -> Transition {
        let reply = self.prompts().unscheduled.clone();
        let mut t = self.close(state, CallOutcome::Unscheduled, Some(reply), StepKind::Closed);
        t.effects
            .insert(0, Effect::fill(SlotValue::Insurance(InsuranceDecision::Declined)));
        t
    }

    fn booked_reply(&self, state: &MachineState, decision: &InsuranceDecision, reference: &str) -> String {
        let slot = state
            .held
            .as_ref()
            .map(|s| s.describe())
            .unwrap_or_default();
        let prompts = self.prompts();
        match decision {
            InsuranceDecision::Insured { copay_usd, .. } => {
                let copay = copay_usd.unwrap_or(0).to_string();
                PromptsConfig::render(
                    &prompts.booked_insured,
                    &[("copay", &copay), ("slot", &slot), ("booking", reference)],
                )
            }
            InsuranceDecision::SelfPay { amount_usd } => PromptsConfig::render(
                &prompts.booked_self_pay,
                &[
                    ("slot", &slot),
                    ("amount", &amount_usd.to_string()),
                    ("booking", reference),
                ],
            ),
            InsuranceDecision::Declined => prompts.unscheduled.clone(),
        }
    }
}
