//! Conversation turns and the crisis escalation record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::IntakeStage;

/// Turn role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// The person on the phone
    Caller,
    /// The intake agent
    Agent,
    System,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::Caller => "caller",
            TurnRole::Agent => "agent",
            TurnRole::System => "system",
        }
    }
}

/// A single utterance in the call transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Stage the call was in when this was spoken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<IntakeStage>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            stage: None,
        }
    }

    pub fn caller(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Caller, content)
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Agent, content)
    }

    pub fn with_stage(mut self, stage: IntakeStage) -> Self {
        self.stage = Some(stage);
        self
    }
}

/// Render a transcript as "role: text" lines
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.as_str(), t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Created when a crisis indicator matches. Terminal for the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisEscalationRecord {
    pub utterance: String,
    pub matched_pattern: String,
    pub stage: IntakeStage,
    pub detected_at: DateTime<Utc>,
}

impl CrisisEscalationRecord {
    pub fn new(
        utterance: impl Into<String>,
        matched_pattern: impl Into<String>,
        stage: IntakeStage,
    ) -> Self {
        Self {
            utterance: utterance.into(),
            matched_pattern: matched_pattern.into(),
            stage,
            detected_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_transcript() {
        let turns = vec![
            Turn::agent("Are you a new or returning patient?"),
            Turn::caller("new").with_stage(IntakeStage::Status),
        ];
        assert_eq!(
            render_transcript(&turns),
            "agent: Are you a new or returning patient?\ncaller: new"
        );
        assert_eq!(turns[1].stage, Some(IntakeStage::Status));
    }
}
