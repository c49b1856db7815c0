//! End-to-end call flows through the agent with in-memory collaborators

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

use intake_agent::{CallSession, IntakeAgent, MemoryTraceSink, TurnReply};
use intake_config::IntakePolicy;
use intake_core::{
    AppointmentSlot, CallOutcome, DateRange, Error, InsuranceDecision, InsuranceVerifier,
    IntakeStage, ReasoningEngine, ReasoningOutput, ReasoningRequest, ReservationResult, Result,
    SchedulingProvider, SlotState, ToolInvocation, TraceSink, TraceSpan, TransferTrigger,
    VerificationResult,
};
use intake_tools::{InMemoryCalendar, IntakeTools, StubInsuranceVerifier, TransferDesk};

struct Harness {
    agent: Arc<IntakeAgent>,
    calendar: Arc<InMemoryCalendar>,
    desk: Arc<TransferDesk>,
    sink: Arc<MemoryTraceSink>,
}

fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
}

fn build(verifier: Option<Arc<dyn InsuranceVerifier>>, engine: Option<Arc<dyn ReasoningEngine>>) -> Harness {
    let policy = Arc::new(IntakePolicy::default());
    let calendar = Arc::new(InMemoryCalendar::from_roster(&policy.scheduling.roster).unwrap());
    let desk = Arc::new(TransferDesk::new());
    let sink = Arc::new(MemoryTraceSink::new());
    let verifier = verifier
        .unwrap_or_else(|| -> Arc<dyn InsuranceVerifier> {
            Arc::new(StubInsuranceVerifier::new(policy.insurance.clone()))
        });

    let tools = IntakeTools::new(calendar.clone(), verifier, desk.clone())
        .with_timeout(Duration::from_millis(200));
    let mut agent = IntakeAgent::new(policy, tools).with_trace_sink(sink.clone());
    if let Some(engine) = engine {
        agent = agent.with_reasoning(engine);
    }

    Harness {
        agent: Arc::new(agent),
        calendar,
        desk,
        sink,
    }
}

fn harness() -> Harness {
    build(None, None)
}

impl Harness {
    fn start(&self, call_id: &str) -> CallSession {
        self.agent.start_call(Some(call_id.to_string()), june(3)).0
    }

    async fn say(&self, session: &mut CallSession, text: &str) -> TurnReply {
        self.agent.handle_utterance(session, text).await.unwrap()
    }

    /// Status through Location
    async fn reach_schedule(&self, session: &mut CallSession) {
        self.say(session, "Hi, I'm a new patient").await;
        self.say(session, "I've been feeling really anxious and I can't sleep").await;
        self.say(session, "about three weeks").await;
        let reply = self.say(session, "I live in Delhi").await;
        assert_eq!(reply.stage, IntakeStage::Schedule);
    }

    /// Through a reserved slot on Monday, June 10 at 9:00 AM
    async fn reach_insurance(&self, session: &mut CallSession) {
        self.reach_schedule(session).await;
        self.say(session, "next week").await;
        let reply = self.say(session, "yes").await;
        assert_eq!(reply.stage, IntakeStage::Insurance);
    }
}

async fn settle_transfers() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_insured_caller_is_booked() {
    let h = harness();
    let mut session = h.start("call-insured");
    let mut last_stage = session.stage();

    let script = [
        ("Hi, I'm a new patient", IntakeStage::Symptoms),
        ("I've been feeling really anxious and I can't sleep", IntakeStage::Duration),
        ("about three weeks", IntakeStage::Location),
        ("I live in Delhi", IntakeStage::Schedule),
        ("next week", IntakeStage::Schedule),
        ("yes", IntakeStage::Insurance),
        ("Yes, Aetna, member ID AET5550123", IntakeStage::Closed),
    ];
    let mut replies = Vec::new();
    for (line, stage) in script {
        let reply = h.say(&mut session, line).await;
        assert_eq!(reply.stage, stage, "after {line:?}");
        assert!(reply.stage >= last_stage);
        last_stage = reply.stage;
        replies.push(reply);
    }

    assert!(replies[3].reply.contains("Dr. Puckett and Dr. Shah"));
    assert_eq!(
        replies[4].reply,
        "The nearest opening is Monday, June 10 at 9:00 AM with Dr. Lee. Would you like me to book it?"
    );
    let last = replies.last().unwrap();
    assert_eq!(last.outcome, Some(CallOutcome::Scheduled));
    assert!(last.reply.contains("$30 co-pay"));

    let reference = session.booking_reference().unwrap().to_string();
    assert!(reference.starts_with("APT-"));
    assert!(last.reply.contains(&reference));
    assert_eq!(
        h.calendar.booking_for("2024-06-10T0900-dr-lee"),
        Some(reference)
    );
    assert_eq!(
        session.slots().insurance.value(),
        Some(&InsuranceDecision::Insured {
            provider: "Aetna".into(),
            member_id: "AET5550123".into(),
            copay_usd: Some(30),
        })
    );
    assert!(h.desk.is_empty());
}

#[tokio::test]
async fn test_proposal_waits_for_yes() {
    let h = harness();
    let mut session = h.start("call-next-week");
    h.reach_schedule(&mut session).await;

    let reply = h.say(&mut session, "sometime next week").await;
    assert!(reply.reply.ends_with("Would you like me to book it?"));
    assert_eq!(session.slots().appointment.state(), SlotState::Unfilled);
    assert_eq!(h.calendar.hold_count(), 0);

    h.say(&mut session, "yes please").await;
    let held = session.slots().appointment.value().unwrap();
    assert!(held.date >= june(10));
    assert_eq!(h.calendar.held_by("call-next-week").as_ref(), Some(held));
}

#[tokio::test]
async fn test_far_future_offset_reprompts() {
    let h = harness();
    let mut session = h.start("call-far-future");
    h.reach_schedule(&mut session).await;

    let reply = h.say(&mut session, "in 1000000000 days").await;
    assert_eq!(reply.stage, IntakeStage::Schedule);
    assert_eq!(
        reply.reply,
        "Could you give me a specific day, like tomorrow or next Monday?"
    );
    assert_eq!(session.state().failures, 1);
    assert_eq!(h.calendar.hold_count(), 0);
}

#[tokio::test]
async fn test_unavailable_day_offers_alternative() {
    let h = harness();
    let mut session = h.start("call-sunday");
    h.reach_schedule(&mut session).await;

    let reply = h.say(&mut session, "Sundays are best for me").await;
    assert_eq!(
        reply.reply,
        "We don't have openings on Sunday, June 9. The next best option is Monday, June 10 at 9:00 AM with Dr. Lee. Would you like me to book it?"
    );
}

#[tokio::test]
async fn test_self_harm_transfers_to_crisis_specialist() {
    let h = harness();
    let mut session = h.start("call-crisis");
    h.say(&mut session, "returning").await;

    let reply = h
        .say(&mut session, "I don't know if I can do this anymore. I might hurt myself.")
        .await;
    assert_eq!(reply.outcome, Some(CallOutcome::TransferredCrisis));
    assert!(reply.reply.starts_with("I'm here with you."));
    assert!(session.crisis_flag());
    assert_eq!(session.crisis_record().unwrap().stage, IntakeStage::Symptoms);
    assert_eq!(session.slots().symptoms.state(), SlotState::Unfilled);

    settle_transfers().await;
    let requests = h.desk.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].trigger,
        TransferTrigger::Crisis {
            pattern: "hurt myself".into()
        }
    );
    assert!(requests[0].transcript.len() >= 4);
}

#[tokio::test]
async fn test_indirect_self_harm_phrasing_escalates() {
    let h = harness();
    for (i, text) in [
        "I just want to end it all",
        "honestly I wanna die",
        "I don't want to be alive anymore",
        "I've been thinking of hanging myself",
    ]
    .into_iter()
    .enumerate()
    {
        let mut session = h.start(&format!("call-indirect-{i}"));
        h.say(&mut session, "new patient").await;

        let reply = h.say(&mut session, text).await;
        assert_eq!(reply.outcome, Some(CallOutcome::TransferredCrisis), "{text}");
        assert!(session.crisis_flag(), "{text}");
        assert_eq!(session.slots().symptoms.state(), SlotState::Unfilled, "{text}");
    }

    settle_transfers().await;
    assert_eq!(h.desk.requests().len(), 4);
}

#[tokio::test]
async fn test_crisis_at_schedule_releases_hold() {
    let h = harness();
    let mut session = h.start("call-crisis-late");
    h.reach_insurance(&mut session).await;
    assert_eq!(h.calendar.hold_count(), 1);

    let reply = h.say(&mut session, "I have a plan to end my life tonight").await;
    assert_eq!(reply.outcome, Some(CallOutcome::TransferredCrisis));
    assert_eq!(h.calendar.hold_count(), 0);
    assert_eq!(session.slots().appointment.state(), SlotState::Waived);
    assert_eq!(session.snapshot().slots.appointment.value(), None);

    // terminal: nothing more is collected
    assert!(h.agent.handle_utterance(&mut session, "Aetna 5550123").await.is_err());
    assert!(session.crisis_flag());
}

#[tokio::test]
async fn test_physical_ailments_are_rejected() {
    let h = harness();

    let mut arm = h.start("call-arm");
    let reply = h.say(&mut arm, "I think I broke my arm").await;
    assert_eq!(reply.outcome, Some(CallOutcome::RejectedScope));
    assert!(arm.scope_violation());

    let mut flu = h.start("call-flu");
    h.say(&mut flu, "new").await;
    let reply = h.say(&mut flu, "I have the flu and a fever").await;
    assert_eq!(reply.outcome, Some(CallOutcome::RejectedScope));
    assert!(reply.reply.contains("only provides mental health care"));

    for (i, text) in [
        "I have broken bones",
        "I have a bad laceration on my hand",
        "I hurt my bone playing",
    ]
    .into_iter()
    .enumerate()
    {
        let mut session = h.start(&format!("call-injury-{i}"));
        h.say(&mut session, "returning").await;
        let reply = h.say(&mut session, text).await;
        assert_eq!(reply.outcome, Some(CallOutcome::RejectedScope), "{text}");
        assert_eq!(session.slots().symptoms.state(), SlotState::Unfilled, "{text}");
    }

    settle_transfers().await;
    assert!(h.desk.is_empty());
}

#[tokio::test]
async fn test_no_insurance_self_pay_booked() {
    let h = harness();
    let mut session = h.start("call-self-pay");
    h.reach_insurance(&mut session).await;

    let offer = h.say(&mut session, "I don't have insurance").await;
    assert_eq!(
        offer.reply,
        "No problem. Our self-pay rate is $250 per session. Would you like to book at that rate?"
    );

    let done = h.say(&mut session, "yes").await;
    assert_eq!(done.outcome, Some(CallOutcome::Scheduled));
    assert!(done.reply.contains("self-pay rate of $250"));
    assert_eq!(
        session.slots().insurance.value(),
        Some(&InsuranceDecision::SelfPay { amount_usd: 250 })
    );
}

#[tokio::test]
async fn test_declining_self_pay_leaves_unscheduled() {
    let h = harness();
    let mut session = h.start("call-decline");
    h.reach_insurance(&mut session).await;

    h.say(&mut session, "no insurance").await;
    let done = h.say(&mut session, "no thanks").await;
    assert_eq!(done.outcome, Some(CallOutcome::Unscheduled));
    assert_eq!(h.calendar.hold_count(), 0);
    assert_eq!(session.slots().appointment.state(), SlotState::Waived);
    assert_eq!(
        session.slots().insurance.value(),
        Some(&InsuranceDecision::Declined)
    );
}

#[tokio::test]
async fn test_two_unintelligible_turns_offer_human() {
    let h = harness();
    let mut session = h.start("call-mumble");

    let first = h.say(&mut session, "um").await;
    assert_eq!(
        first.reply,
        "Could you please repeat that? Are you a new or returning patient?"
    );
    let second = h.say(&mut session, "[inaudible]").await;
    assert_eq!(
        second.reply,
        "I'm having trouble understanding. Would you like me to transfer you to a member of our staff?"
    );
    assert!(!second.closed);

    let done = h.say(&mut session, "yes").await;
    assert_eq!(done.outcome, Some(CallOutcome::TransferredHuman));

    settle_transfers().await;
    assert_eq!(
        h.desk.requests()[0].trigger,
        TransferTrigger::HumanFallback {
            stage: "status".into()
        }
    );
}

#[tokio::test]
async fn test_rereserving_does_not_duplicate_hold() {
    let h = harness();
    let mut session = h.start("call-dup");
    h.reach_insurance(&mut session).await;

    let again = h
        .calendar
        .reserve_slot("2024-06-10T0900-dr-lee", "call-dup")
        .await
        .unwrap();
    assert!(matches!(again, intake_core::ReservationResult::AlreadyHeld { .. }));
    assert_eq!(h.calendar.hold_count(), 1);
}

#[tokio::test]
async fn test_second_caller_gets_next_opening() {
    let h = harness();
    let mut first = h.start("call-a");
    let mut second = h.start("call-b");
    h.reach_schedule(&mut first).await;
    h.reach_schedule(&mut second).await;
    h.say(&mut first, "next week").await;
    h.say(&mut second, "next week").await;

    let (a, b) = tokio::join!(
        h.agent.handle_utterance(&mut first, "yes"),
        h.agent.handle_utterance(&mut second, "yes"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    let winners = [&a, &b]
        .iter()
        .filter(|r| r.stage == IntakeStage::Insurance)
        .count();
    assert_eq!(winners, 1);

    let loser = if a.stage == IntakeStage::Insurance { &b } else { &a };
    assert!(loser
        .reply
        .starts_with("That time was just taken. The next opening is Monday, June 10 at 9:30 AM with Dr. Puckett."));
    assert_eq!(h.calendar.hold_count(), 1);
}

#[tokio::test]
async fn test_hang_up_releases_reservation() {
    let h = harness();
    let mut session = h.start("call-hangup");
    h.reach_insurance(&mut session).await;
    assert!(h.calendar.held_by("call-hangup").is_some());

    let reply = h.agent.hang_up(&mut session).await.unwrap();
    assert_eq!(reply.outcome, Some(CallOutcome::Abandoned));
    assert!(h.calendar.held_by("call-hangup").is_none());
    assert_eq!(session.slots().appointment.state(), SlotState::Waived);

    // second hang-up is a no-op
    assert!(h.agent.hang_up(&mut session).await.is_ok());
}

/// Calendar that books normally but cannot drop a hold
struct StuckCalendar(Arc<InMemoryCalendar>);

#[async_trait]
impl SchedulingProvider for StuckCalendar {
    async fn list_available_slots(&self, range: DateRange) -> Result<Vec<AppointmentSlot>> {
        self.0.list_available_slots(range).await
    }

    async fn reserve_slot(&self, slot_id: &str, session_id: &str) -> Result<ReservationResult> {
        self.0.reserve_slot(slot_id, session_id).await
    }

    async fn confirm(&self, session_id: &str) -> Result<String> {
        self.0.confirm(session_id).await
    }

    async fn release(&self, _session_id: &str) -> Result<()> {
        Err(Error::tool("release_slot", "calendar offline"))
    }
}

#[tokio::test]
async fn test_failed_release_still_ends_call() {
    let policy = Arc::new(IntakePolicy::default());
    let calendar = Arc::new(InMemoryCalendar::from_roster(&policy.scheduling.roster).unwrap());
    let tools = IntakeTools::new(
        Arc::new(StuckCalendar(calendar.clone())),
        Arc::new(StubInsuranceVerifier::new(policy.insurance.clone())),
        Arc::new(TransferDesk::new()),
    );
    let h = Harness {
        agent: Arc::new(IntakeAgent::new(policy, tools)),
        calendar,
        desk: Arc::new(TransferDesk::new()),
        sink: Arc::new(MemoryTraceSink::new()),
    };
    let mut session = h.start("call-stuck");
    h.reach_insurance(&mut session).await;

    let reply = h.agent.hang_up(&mut session).await.unwrap();
    assert_eq!(reply.outcome, Some(CallOutcome::Abandoned));
    assert_eq!(session.slots().appointment.state(), SlotState::Waived);
    // the orphan hold is left for the calendar to expire
    assert_eq!(h.calendar.hold_count(), 1);
}

struct BrokenSink;

#[async_trait]
impl TraceSink for BrokenSink {
    async fn emit(&self, _span: TraceSpan) -> Result<()> {
        Err(Error::ObservabilityFailure("collector unreachable".into()))
    }

    async fn score(&self, _call_id: &str, _name: &str, _value: f64) -> Result<()> {
        Err(Error::ObservabilityFailure("collector unreachable".into()))
    }
}

#[tokio::test]
async fn test_trace_failure_does_not_fail_turn() {
    let policy = Arc::new(IntakePolicy::default());
    let tools = IntakeTools::in_memory(&policy).unwrap();
    let agent = IntakeAgent::new(policy, tools).with_trace_sink(Arc::new(BrokenSink));

    let (mut session, _) = agent.start_call(None, june(3));
    let reply = agent.handle_utterance(&mut session, "new patient").await.unwrap();
    assert_eq!(reply.stage, IntakeStage::Symptoms);

    let reply = agent.handle_utterance(&mut session, "I sprained my wrist").await.unwrap();
    assert!(reply.closed);
}

#[tokio::test]
async fn test_turn_spans_nest_tool_calls() {
    let h = harness();
    let mut session = h.start("call-trace");
    h.reach_insurance(&mut session).await;
    h.say(&mut session, "I'll pay myself").await;
    h.say(&mut session, "sure").await;

    let spans = h.sink.spans();
    assert_eq!(spans.len() as u32, session.turn_count());
    assert!(spans.iter().all(|s| s.name == "conversation-turn" && s.call_id == "call-trace"));
    assert_eq!(spans[0].turn_id, 1);

    let booking = spans.last().unwrap();
    let children: Vec<&str> = booking.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        children,
        vec!["stage-transition", "tool:confirm_appointment", "stage-transition"]
    );
    assert_eq!(booking.outcome, "closed");

    assert_eq!(
        h.sink.scores(),
        vec![("call-trace".to_string(), "session_completed".to_string(), 1.0)]
    );
}

struct DownVerifier;

#[async_trait]
impl InsuranceVerifier for DownVerifier {
    async fn verify(&self, _provider: &str, _member_id: &str) -> Result<VerificationResult> {
        Err(Error::Transport("payer gateway 503".into()))
    }
}

#[tokio::test]
async fn test_verification_outage_falls_back_to_self_pay() {
    let h = build(Some(Arc::new(DownVerifier)), None);
    let mut session = h.start("call-outage");
    h.reach_insurance(&mut session).await;

    let reply = h.say(&mut session, "My insurance is Cigna, ID CG778812").await;
    assert!(reply
        .reply
        .starts_with("I couldn't reach the insurance verification service. Our self-pay rate is $250"));
    assert_eq!(reply.stage, IntakeStage::Insurance);
}

struct ScriptedEngine {
    output: Option<ReasoningOutput>,
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn respond(&self, request: ReasoningRequest) -> Result<ReasoningOutput> {
        assert_eq!(request.allowed_tools, vec![ToolInvocation::CHECK_AVAILABILITY]);
        assert_eq!(request.call_date, june(3));
        self.output
            .clone()
            .ok_or_else(|| Error::Reasoning("rate limited".into()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[tokio::test]
async fn test_reasoning_resolves_vague_date() {
    let engine = ScriptedEngine {
        output: Some(ReasoningOutput::ToolCall(ToolInvocation::CheckAvailability {
            date: "2024-06-12".into(),
        })),
    };
    let h = build(None, Some(Arc::new(engine)));
    let mut session = h.start("call-llm");
    h.reach_schedule(&mut session).await;

    let reply = h.say(&mut session, "whenever my sister can drive me").await;
    assert_eq!(
        reply.reply,
        "The nearest opening is Wednesday, June 12 at 2:00 PM with Dr. Lee. Would you like me to book it?"
    );
}

#[tokio::test]
async fn test_reasoning_failure_reprompts() {
    let h = build(None, Some(Arc::new(ScriptedEngine { output: None })));
    let mut session = h.start("call-llm-down");
    h.reach_schedule(&mut session).await;

    let reply = h.say(&mut session, "whenever my sister can drive me").await;
    assert_eq!(
        reply.reply,
        "Could you give me a specific day, like tomorrow or next Monday?"
    );
    assert_eq!(session.state().failures, 1);
}
