//! Intake agent
//!
//! Runs the transition table for one call: feeds each caller utterance into
//! the machine, performs the effects it asks for (calendar, insurance,
//! reasoning, transfers) and feeds the results back in until the turn settles.
//! Every turn is exported as one span with children for each transition and
//! tool call.

use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use intake_config::{IntakePolicy, Settings};
use intake_core::{
    CallOutcome, CrisisEscalationRecord, IntakeStage, ReasoningEngine, ReasoningOutput,
    ReasoningRequest, Result as CoreResult, ToolInvocation, TraceSink, TraceSpan, TransferRequest,
    TransferTrigger, TurnRole,
};
use intake_tools::IntakeTools;

use crate::machine::{Effect, Event, IntakeMachine, StepKind, Transition};
use crate::session::CallSession;
use crate::trace::LogTraceSink;
use crate::AgentError;

/// Upper bound on machine steps per caller turn
const MAX_STEPS_PER_TURN: usize = 8;

const TRACE_EMIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Agent events, for observers that want more than the reply text
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Reply { call_id: String, text: String },
    StageChanged {
        call_id: String,
        from: IntakeStage,
        to: IntakeStage,
    },
    ToolCall { call_id: String, name: String },
    ToolResult {
        call_id: String,
        name: String,
        success: bool,
    },
    Transferred {
        call_id: String,
        trigger: TransferTrigger,
    },
    CallClosed { call_id: String, outcome: CallOutcome },
}

/// What the caller hears after one turn
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TurnReply {
    pub reply: String,
    pub stage: IntakeStage,
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<CallOutcome>,
}

impl TurnReply {
    fn from_session(session: &CallSession, reply: String) -> Self {
        Self {
            reply,
            stage: session.stage(),
            closed: session.is_closed(),
            outcome: session.outcome(),
        }
    }
}

pub struct IntakeAgent {
    policy: Arc<IntakePolicy>,
    machine: IntakeMachine,
    tools: IntakeTools,
    reasoning: Option<Arc<dyn ReasoningEngine>>,
    trace: Arc<dyn TraceSink>,
    event_tx: broadcast::Sender<AgentEvent>,
}

impl IntakeAgent {
    pub fn new(policy: Arc<IntakePolicy>, tools: IntakeTools) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            machine: IntakeMachine::new(policy.clone()),
            policy,
            tools,
            reasoning: None,
            trace: Arc::new(LogTraceSink),
            event_tx,
        }
    }

    /// Wire everything from settings: in-memory calendar, stub verifier,
    /// transfer desk, and the reasoning backend when enabled
    pub fn from_settings(settings: &Settings, policy: Arc<IntakePolicy>) -> Result<Self, AgentError> {
        let tools = IntakeTools::in_memory(&policy)?
            .with_timeout(Duration::from_secs(settings.tools.timeout_secs));
        let mut agent = Self::new(policy.clone(), tools);
        if let Some(engine) = intake_llm::create_reasoning_engine(&settings.reasoning, &policy)? {
            agent = agent.with_reasoning(engine);
        }
        Ok(agent)
    }

    pub fn with_reasoning(mut self, engine: Arc<dyn ReasoningEngine>) -> Self {
        tracing::info!(model = engine.model_name(), "Reasoning fallback enabled");
        self.machine = self.machine.with_reasoning(true);
        self.reasoning = Some(engine);
        self
    }

    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace = sink;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_tx.subscribe()
    }

    pub fn policy(&self) -> &IntakePolicy {
        &self.policy
    }

    pub fn tools(&self) -> &IntakeTools {
        &self.tools
    }

    pub fn machine(&self) -> &IntakeMachine {
        &self.machine
    }

    /// Open a call; returns the session and the greeting
    pub fn start_call(&self, call_id: Option<String>, call_date: NaiveDate) -> (CallSession, String) {
        let call_id = call_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut session = CallSession::new(call_id, call_date);
        let greeting = self.machine.greeting().to_string();
        session.record_reply(&greeting);

        metrics::counter!("intake_calls_started_total").increment(1);
        tracing::info!(call_id = %session.call_id(), call_date = %call_date, "Call started");
        (session, greeting)
    }

    /// Handle one caller utterance
    pub async fn handle_utterance(
        &self,
        session: &mut CallSession,
        text: &str,
    ) -> Result<TurnReply, AgentError> {
        if session.is_closed() {
            return Err(AgentError::SessionClosed(session.call_id().to_string()));
        }

        let started = Instant::now();
        let turn = session.begin_turn(text);
        let stage = session.stage();
        tracing::debug!(call_id = %session.call_id(), turn, stage = %stage, "Caller turn");

        let mut span = TraceSpan::start(session.call_id(), turn, "conversation-turn")
            .with_attribute("stage", stage.as_str())
            .with_attribute("input_chars", text.chars().count().to_string());

        let (replies, step) = self
            .drive(session, Event::Utterance(text.to_string()), &mut span)
            .await;

        span.set_attribute("stage_after", session.stage().as_str());
        self.emit_span(span.finish(step.as_str())).await;

        metrics::counter!("intake_turns_total").increment(1);
        metrics::histogram!("intake_turn_latency_seconds").record(started.elapsed().as_secs_f64());

        Ok(TurnReply::from_session(session, replies.join(" ")))
    }

    /// Caller hung up. Idempotent on closed calls.
    pub async fn hang_up(&self, session: &mut CallSession) -> Result<TurnReply, AgentError> {
        if session.is_closed() {
            return Ok(TurnReply::from_session(session, String::new()));
        }

        let mut span = TraceSpan::start(session.call_id(), session.turn_count(), "hang-up")
            .with_attribute("stage", session.stage().as_str());
        let (_, step) = self.drive(session, Event::HangUp, &mut span).await;
        self.emit_span(span.finish(step.as_str())).await;

        Ok(TurnReply::from_session(session, String::new()))
    }

    /// Step the machine until no effect is waiting on a result
    async fn drive(
        &self,
        session: &mut CallSession,
        first: Event,
        span: &mut TraceSpan,
    ) -> (Vec<String>, StepKind) {
        let mut replies = Vec::new();
        let mut event = first;
        let mut last_step = StepKind::Ignored;

        for _ in 0..MAX_STEPS_PER_TURN {
            let from = session.state().clone();
            let mut step_span = span
                .child("stage-transition")
                .with_attribute("event", event.name())
                .with_attribute("from", from.phase.label());

            let transition = self.machine.transition(&from, session.call_date(), event);
            step_span.set_attribute("to", transition.next.phase.label());
            span.push_child(step_span.finish(transition.step.as_str()));

            let Transition {
                next,
                effects,
                step,
            } = transition;
            if step != StepKind::Pending {
                last_step = step;
            }
            if step == StepKind::RejectedScope {
                session.flag_scope_violation();
            }

            session.advance(next);
            if from.stage() != session.stage() {
                self.publish(AgentEvent::StageChanged {
                    call_id: session.call_id().to_string(),
                    from: from.stage(),
                    to: session.stage(),
                });
            }

            let mut follow_up = None;
            for effect in effects {
                if let Some(result) = self.perform(session, effect, from.stage(), span, &mut replies).await {
                    follow_up = Some(result);
                }
            }

            match follow_up {
                Some(next_event) => event = next_event,
                None => return (replies, last_step),
            }
        }

        tracing::error!(call_id = %session.call_id(), "Turn did not settle, giving up");
        (replies, last_step)
    }

    /// Perform one effect; returns the event to feed back, if any
    async fn perform(
        &self,
        session: &mut CallSession,
        effect: Effect,
        stage_before: IntakeStage,
        span: &mut TraceSpan,
        replies: &mut Vec<String>,
    ) -> Option<Event> {
        let call_id = session.call_id().to_string();
        match effect {
            Effect::Reply { text } => {
                session.record_reply(&text);
                self.publish(AgentEvent::Reply {
                    call_id,
                    text: text.clone(),
                });
                replies.push(text);
                None
            }
            Effect::FillSlot { value } => {
                session.fill(value);
                None
            }
            Effect::WaiveSlot { slot } => {
                session.waive(slot);
                None
            }
            Effect::FindSlots { range, .. } => {
                let result = self
                    .tool_call(span, &call_id, ToolInvocation::CHECK_AVAILABILITY, self.tools.find_slots(range))
                    .await;
                Some(Event::SlotsFound(result))
            }
            Effect::ReserveSlot { slot_id } => {
                let result = self
                    .tool_call(span, &call_id, "reserve_slot", self.tools.reserve(&slot_id, &call_id))
                    .await;
                Some(Event::ReservationDone(result))
            }
            Effect::VerifyInsurance {
                provider,
                member_id,
            } => {
                let result = self
                    .tool_call(
                        span,
                        &call_id,
                        ToolInvocation::VERIFY_INSURANCE,
                        self.tools.verify(&provider, &member_id),
                    )
                    .await;
                Some(Event::VerificationDone(result))
            }
            Effect::ConfirmReservation => {
                let result = self
                    .tool_call(span, &call_id, ToolInvocation::CONFIRM_APPOINTMENT, self.tools.confirm(&call_id))
                    .await;
                if let Ok(reference) = &result {
                    session.set_booking_reference(reference.clone());
                }
                Some(Event::BookingDone(result))
            }
            Effect::ReleaseReservation => {
                // a failed release leaves an orphan hold; the call still ends
                if let Err(e) = self
                    .tool_call(span, &call_id, "release_slot", self.tools.release(&call_id))
                    .await
                {
                    metrics::counter!("intake_release_failures_total").increment(1);
                    tracing::error!(call_id = %call_id, error = %e, "Held slot not released");
                }
                None
            }
            Effect::ConsultReasoning { guidance } => {
                Some(Event::ReasoningDone(self.consult(session, guidance, span).await))
            }
            Effect::TransferCrisis { pattern } => {
                let utterance = session
                    .history()
                    .iter()
                    .rev()
                    .find(|t| t.role == TurnRole::Caller)
                    .map(|t| t.content.clone())
                    .unwrap_or_default();
                session.flag_crisis(CrisisEscalationRecord::new(utterance, pattern.clone(), stage_before));
                metrics::counter!("intake_crisis_escalations_total").increment(1);
                tracing::warn!(call_id = %call_id, pattern = %pattern, stage = %stage_before, "Crisis escalation");
                span.set_attribute("crisis_pattern", pattern.clone());
                self.transfer(session, TransferTrigger::Crisis { pattern });
                None
            }
            Effect::TransferHuman => {
                self.transfer(
                    session,
                    TransferTrigger::HumanFallback {
                        stage: stage_before.as_str().to_string(),
                    },
                );
                None
            }
            Effect::EndCall { outcome } => {
                self.end_call(session, outcome).await;
                None
            }
        }
    }

    /// Run a collaborator call under a child span
    async fn tool_call<T>(
        &self,
        span: &mut TraceSpan,
        call_id: &str,
        name: &str,
        call: impl Future<Output = CoreResult<T>>,
    ) -> CoreResult<T> {
        self.publish(AgentEvent::ToolCall {
            call_id: call_id.to_string(),
            name: name.to_string(),
        });

        let child = span.child(format!("tool:{name}"));
        let result = call.await;
        let child = match &result {
            Ok(_) => child.finish("ok"),
            Err(e) => {
                tracing::warn!(call_id = %call_id, tool = name, error = %e, "Tool call failed");
                child.with_attribute("error", e.to_string()).finish("error")
            }
        };
        span.push_child(child);

        self.publish(AgentEvent::ToolResult {
            call_id: call_id.to_string(),
            name: name.to_string(),
            success: result.is_ok(),
        });
        result
    }

    async fn consult(
        &self,
        session: &CallSession,
        guidance: String,
        span: &mut TraceSpan,
    ) -> Option<ReasoningOutput> {
        let engine = self.reasoning.as_ref()?;
        let stage = session.stage();
        let request = ReasoningRequest {
            call_id: session.call_id().to_string(),
            call_date: session.call_date(),
            stage,
            history: session.history().to_vec(),
            slots: session.slots().summary(),
            guidance,
            allowed_tools: allowed_tools(stage),
        };

        let child = span
            .child("reasoning")
            .with_attribute("model", engine.model_name());
        match engine.respond(request).await {
            Ok(output) => {
                let kind = match &output {
                    ReasoningOutput::Text(_) => "text",
                    ReasoningOutput::ToolCall(call) => call.name(),
                };
                span.push_child(child.finish(kind));
                Some(output)
            }
            Err(e) => {
                tracing::warn!(call_id = %session.call_id(), error = %e, "Reasoning fallback failed");
                span.push_child(child.with_attribute("error", e.to_string()).finish("error"));
                None
            }
        }
    }

    /// Fire-and-forget handoff with the transcript so far
    fn transfer(&self, session: &CallSession, trigger: TransferTrigger) {
        let request = TransferRequest {
            call_id: session.call_id().to_string(),
            transcript: session.history().to_vec(),
            trigger: trigger.clone(),
        };
        drop(self.tools.spawn_transfer(request));
        self.publish(AgentEvent::Transferred {
            call_id: session.call_id().to_string(),
            trigger,
        });
    }

    async fn end_call(&self, session: &CallSession, outcome: CallOutcome) {
        metrics::counter!("intake_calls_closed_total", "outcome" => outcome.as_str()).increment(1);
        tracing::info!(
            call_id = %session.call_id(),
            outcome = outcome.as_str(),
            turns = session.turn_count(),
            "Call closed"
        );

        let value = if outcome == CallOutcome::Scheduled { 1.0 } else { 0.0 };
        if let Err(e) = self.trace.score(session.call_id(), "session_completed", value).await {
            tracing::warn!(call_id = %session.call_id(), error = %e, "Score export failed");
            metrics::counter!("intake_trace_emit_failures_total").increment(1);
        }

        self.publish(AgentEvent::CallClosed {
            call_id: session.call_id().to_string(),
            outcome,
        });
    }

    /// Export failures are logged and counted, never surfaced
    async fn emit_span(&self, span: TraceSpan) {
        let call_id = span.call_id.clone();
        let failure = match tokio::time::timeout(TRACE_EMIT_TIMEOUT, self.trace.emit(span)).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}s", TRACE_EMIT_TIMEOUT.as_secs()),
        };
        tracing::warn!(call_id = %call_id, error = %failure, "Trace export failed");
        metrics::counter!("intake_trace_emit_failures_total").increment(1);
    }

    fn publish(&self, event: AgentEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

/// Tools the reasoning engine may request at a stage
pub fn allowed_tools(stage: IntakeStage) -> Vec<&'static str> {
    match stage {
        IntakeStage::Schedule => vec![ToolInvocation::CHECK_AVAILABILITY],
        IntakeStage::Insurance => vec![ToolInvocation::VERIFY_INSURANCE],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> IntakeAgent {
        let policy = Arc::new(IntakePolicy::default());
        let tools = IntakeTools::in_memory(&policy).unwrap();
        IntakeAgent::new(policy, tools)
    }

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    #[test]
    fn test_start_call_greets() {
        let (session, greeting) = agent().start_call(Some("call-7".into()), june(3));
        assert_eq!(
            greeting,
            "Hello, thank you for calling Orchard Clinic. Are you a new or returning patient?"
        );
        assert_eq!(session.call_id(), "call-7");
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.stage(), IntakeStage::Status);
    }

    #[test]
    fn test_allowed_tools_by_stage() {
        assert_eq!(allowed_tools(IntakeStage::Schedule), vec!["check_availability"]);
        assert_eq!(allowed_tools(IntakeStage::Insurance), vec!["verify_insurance"]);
        assert!(allowed_tools(IntakeStage::Symptoms).is_empty());
    }

    #[tokio::test]
    async fn test_closed_session_rejects_turns() {
        let agent = agent();
        let (mut session, _) = agent.start_call(None, june(3));
        let reply = agent.handle_utterance(&mut session, "I broke my arm").await.unwrap();
        assert!(reply.closed);
        assert_eq!(reply.outcome, Some(CallOutcome::RejectedScope));
        assert!(session.scope_violation());

        let err = agent.handle_utterance(&mut session, "hello?").await.unwrap_err();
        assert!(matches!(err, AgentError::SessionClosed(_)));
    }

    #[tokio::test]
    async fn test_events_published() {
        let agent = agent();
        let mut events = agent.subscribe();
        let (mut session, _) = agent.start_call(Some("call-9".into()), june(3));
        agent.handle_utterance(&mut session, "returning").await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            AgentEvent::StageChanged {
                call_id: "call-9".into(),
                from: IntakeStage::Status,
                to: IntakeStage::Symptoms
            }
        );
        assert!(matches!(events.recv().await.unwrap(), AgentEvent::Reply { .. }));
    }
}
