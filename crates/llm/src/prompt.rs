//! Prompt Building
//!
//! Turns the call state into a chat message list for the reasoning backend.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use intake_config::PromptsConfig;
use intake_core::{IntakeStage, SlotName, Turn, TurnRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        match turn.role {
            TurnRole::Caller => Message::user(&turn.content),
            TurnRole::Agent => Message::assistant(&turn.content),
            TurnRole::System => Message::system(&turn.content),
        }
    }
}

pub struct PromptBuilder {
    messages: Vec<Message>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn system_prompt(mut self, prompts: &PromptsConfig, clinic: &str, date: NaiveDate) -> Self {
        let date = date.format("%A, %B %-d, %Y").to_string();
        self.messages.push(Message::system(PromptsConfig::render(
            &prompts.system_prompt,
            &[("clinic", clinic), ("date", &date)],
        )));
        self
    }

    /// What has been collected so far
    pub fn with_slots(mut self, slots: &[(SlotName, String)]) -> Self {
        if !slots.is_empty() {
            let lines: Vec<String> = slots
                .iter()
                .map(|(name, value)| format!("- {}: {}", name.as_str(), value))
                .collect();
            self.messages.push(Message::system(format!(
                "## Collected so far\n{}",
                lines.join("\n")
            )));
        }
        self
    }

    pub fn with_history(mut self, history: &[Turn]) -> Self {
        self.messages.extend(history.iter().map(Message::from));
        self
    }

    pub fn with_stage_guidance(mut self, stage: IntakeStage, guidance: &str) -> Self {
        self.messages.push(Message::system(format!(
            "## Current stage: {}\n{}",
            stage.as_str(),
            guidance
        )));
        self
    }

    pub fn build(self) -> Vec<Message> {
        self.messages
    }

    /// Drops the oldest non-system messages until the estimate fits
    pub fn build_with_limit(self, max_tokens: usize) -> Vec<Message> {
        let current_tokens = self.estimate_tokens();
        if current_tokens <= max_tokens {
            return self.messages;
        }

        let (system_msgs, conv_msgs): (Vec<_>, Vec<_>) = self
            .messages
            .into_iter()
            .partition(|m| matches!(m.role, Role::System));

        let system_tokens: usize = system_msgs.iter().map(|m| estimate(&m.content)).sum();
        let available = max_tokens.saturating_sub(system_tokens);

        let mut kept: Vec<Message> = Vec::new();
        let mut used = 0;
        for msg in conv_msgs.into_iter().rev() {
            let tokens = estimate(&msg.content);
            if used + tokens > available {
                break;
            }
            used += tokens;
            kept.push(msg);
        }
        kept.reverse();

        tracing::debug!(
            before = current_tokens,
            after = system_tokens + used,
            kept = kept.len(),
            "Prompt history truncated"
        );

        let mut result = system_msgs;
        result.extend(kept);
        result
    }

    pub fn estimate_tokens(&self) -> usize {
        self.messages.iter().map(|m| estimate(&m.content)).sum()
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Rough count: four characters per token
fn estimate(content: &str) -> usize {
    content.chars().count().max(1).div_ceil(4)
}
