//! Drives calls from a `CallTransport`
//!
//! The transport delivers final utterances; the runner keeps one session per
//! call id and sends each reply back through the transport.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use intake_core::{CallTransport, Result as CoreResult, TransportEvent};

use crate::agent::IntakeAgent;
use crate::session::{CallSession, SessionSnapshot};
use crate::AgentError;

pub struct CallRunner<T: CallTransport> {
    agent: Arc<IntakeAgent>,
    transport: T,
    call_date: NaiveDate,
}

impl<T: CallTransport> CallRunner<T> {
    pub fn new(agent: Arc<IntakeAgent>, transport: T, call_date: NaiveDate) -> Self {
        Self {
            agent,
            transport,
            call_date,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run until the transport is exhausted. Calls still open at that point
    /// are treated as hung up. Returns a snapshot of every finished call.
    pub async fn run(&mut self) -> Result<Vec<SessionSnapshot>, AgentError> {
        let mut sessions: HashMap<String, CallSession> = HashMap::new();
        let mut finished = Vec::new();

        while let Some(event) = self.transport.next_event().await? {
            match event {
                TransportEvent::CallStarted { call_id } => {
                    let (session, greeting) = self.agent.start_call(Some(call_id.clone()), self.call_date);
                    self.transport.send_reply(&call_id, &greeting).await?;
                    sessions.insert(call_id, session);
                }
                TransportEvent::Utterance { call_id, text } => {
                    let Some(session) = sessions.get_mut(&call_id) else {
                        tracing::warn!(call_id = %call_id, "Utterance for unknown call");
                        continue;
                    };
                    if session.is_closed() {
                        tracing::debug!(call_id = %call_id, "Ignoring utterance after close");
                        continue;
                    }
                    let turn = self.agent.handle_utterance(session, &text).await?;
                    if !turn.reply.is_empty() {
                        self.transport.send_reply(&call_id, &turn.reply).await?;
                    }
                }
                TransportEvent::CallEnded { call_id } => {
                    if let Some(mut session) = sessions.remove(&call_id) {
                        self.agent.hang_up(&mut session).await?;
                        finished.push(session.snapshot());
                    }
                }
            }
        }

        for (_, mut session) in sessions.drain() {
            self.agent.hang_up(&mut session).await?;
            finished.push(session.snapshot());
        }
        Ok(finished)
    }
}

/// Replays a fixed script as one call and records the replies
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    events: VecDeque<TransportEvent>,
    replies: Vec<(String, String)>,
}

impl ScriptedTransport {
    pub fn new<S: Into<String>>(call_id: &str, utterances: impl IntoIterator<Item = S>) -> Self {
        let mut events = VecDeque::new();
        events.push_back(TransportEvent::CallStarted {
            call_id: call_id.to_string(),
        });
        events.extend(utterances.into_iter().map(|text| TransportEvent::Utterance {
            call_id: call_id.to_string(),
            text: text.into(),
        }));
        events.push_back(TransportEvent::CallEnded {
            call_id: call_id.to_string(),
        });
        Self {
            events,
            replies: Vec::new(),
        }
    }

    /// One utterance per line. Lines starting with `#` are skipped; an empty
    /// line is silence.
    pub fn from_script(call_id: &str, script: &str) -> Self {
        Self::new(
            call_id,
            script
                .lines()
                .filter(|line| !line.trim_start().starts_with('#'))
                .map(|line| line.trim().to_string()),
        )
    }

    pub fn replies(&self) -> &[(String, String)] {
        &self.replies
    }
}

#[async_trait]
impl CallTransport for ScriptedTransport {
    async fn next_event(&mut self) -> CoreResult<Option<TransportEvent>> {
        Ok(self.events.pop_front())
    }

    async fn send_reply(&mut self, call_id: &str, text: &str) -> CoreResult<()> {
        self.replies.push((call_id.to_string(), text.to_string()));
        Ok(())
    }
}
