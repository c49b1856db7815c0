//! Error taxonomy shared by every intake crate

use thiserror::Error;

/// Intake errors
///
/// None of these are fatal to the process. Each one maps to a caller-facing
/// branch of the call flow (re-prompt, rejection, transfer, fallback).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Extraction failed for the current stage (silence, mumbling, gibberish)
    #[error("Unintelligible input at {stage}")]
    UnintelligibleInput { stage: String },

    /// Caller described a physical ailment outside the clinic's scope
    #[error("Out of scope: {reason}")]
    OutOfScopeRejection { reason: String },

    /// Crisis indicator matched; the call must be handed off
    #[error("Crisis detected (pattern: {pattern})")]
    CrisisDetected { pattern: String },

    /// The proposed slot was taken between proposal and reservation
    #[error("Scheduling conflict on slot {slot_id}")]
    SchedulingConflict { slot_id: String },

    /// A collaborator tool was unreachable, timed out or returned garbage
    #[error("Tool '{tool}' failed: {message}")]
    ToolCallFailure { tool: String, message: String },

    /// Trace export failed; logged and counted, never surfaced to the caller
    #[error("Observability failure: {0}")]
    ObservabilityFailure(String),

    #[error("Session {0} is closed")]
    SessionClosed(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Reasoning error: {0}")]
    Reasoning(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolCallFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Short stable code used in traces and metrics labels
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnintelligibleInput { .. } => "unintelligible_input",
            Error::OutOfScopeRejection { .. } => "out_of_scope",
            Error::CrisisDetected { .. } => "crisis_detected",
            Error::SchedulingConflict { .. } => "scheduling_conflict",
            Error::ToolCallFailure { .. } => "tool_call_failure",
            Error::ObservabilityFailure(_) => "observability_failure",
            Error::SessionClosed(_) => "session_closed",
            Error::SessionNotFound(_) => "session_not_found",
            Error::Transport(_) => "transport",
            Error::Reasoning(_) => "reasoning",
            Error::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::tool("verify_insurance", "timed out");
        assert_eq!(err.to_string(), "Tool 'verify_insurance' failed: timed out");
        assert_eq!(err.code(), "tool_call_failure");
    }
}
