//! Intake call flow
//!
//! - `machine`: pure transition table over explicit call phases
//! - `session`: per-call state (slots, flags, transcript)
//! - `agent`: performs machine effects against the collaborators and traces each turn
//! - `runner`: drives calls from a `CallTransport`

pub mod agent;
pub mod machine;
pub mod runner;
pub mod session;
pub mod trace;

pub use agent::{allowed_tools, AgentEvent, IntakeAgent, TurnReply};
pub use machine::{
    Effect, Event, InsurancePhase, IntakeMachine, MachineState, Phase, SchedulePhase, StepKind,
    Transition,
};
pub use runner::{CallRunner, ScriptedTransport};
pub use session::{CallSession, SessionSnapshot};
pub use trace::{LogTraceSink, MemoryTraceSink};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Call {0} is already closed")]
    SessionClosed(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Reasoning error: {0}")]
    Reasoning(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<intake_core::Error> for AgentError {
    fn from(err: intake_core::Error) -> Self {
        use intake_core::Error;
        match err {
            Error::SessionClosed(id) => AgentError::SessionClosed(id),
            Error::ToolCallFailure { .. } | Error::SchedulingConflict { .. } => {
                AgentError::Tool(err.to_string())
            }
            Error::Reasoning(msg) => AgentError::Reasoning(msg),
            Error::Transport(msg) => AgentError::Transport(msg),
            Error::Config(msg) => AgentError::Config(msg),
            other => AgentError::Internal(other.to_string()),
        }
    }
}

impl From<intake_llm::LlmError> for AgentError {
    fn from(err: intake_llm::LlmError) -> Self {
        intake_core::Error::from(err).into()
    }
}

impl From<intake_tools::ToolError> for AgentError {
    fn from(err: intake_tools::ToolError) -> Self {
        AgentError::Tool(err.to_string())
    }
}
