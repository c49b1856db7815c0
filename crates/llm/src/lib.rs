//! Reasoning backend for the intake line
//!
//! Features:
//! - OpenAI-compatible chat completions with native function calling
//! - Prompt building from call state with history truncation
//! - Adapter to the core `ReasoningEngine` trait producing typed tool calls

pub mod adapter;
pub mod backend;
pub mod factory;
pub mod prompt;

pub use adapter::ReasoningAdapter;
pub use backend::{
    parse_completion, ChatCompletionsBackend, ChatCompletionsConfig, Completion, LlmBackend,
    ParsedToolCall,
};
pub use factory::create_reasoning_engine;
pub use prompt::{Message, PromptBuilder, Role};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for intake_core::Error {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(msg) => intake_core::Error::Config(msg),
            other => intake_core::Error::Reasoning(other.to_string()),
        }
    }
}
