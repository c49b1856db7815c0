//! Adapter from a chat backend to the core `ReasoningEngine` trait

use async_trait::async_trait;
use std::sync::Arc;

use intake_config::PromptsConfig;
use intake_core::{ReasoningEngine, ReasoningOutput, ReasoningRequest, ToolInvocation};
use intake_tools::{intake_tool_schemas, ToolSchema};

use crate::backend::LlmBackend;
use crate::prompt::PromptBuilder;
use crate::LlmError;

/// Context budget for history, in estimated tokens
const DEFAULT_CONTEXT_TOKENS: usize = 3000;

pub struct ReasoningAdapter {
    backend: Arc<dyn LlmBackend>,
    prompts: PromptsConfig,
    clinic_name: String,
    tools: Vec<ToolSchema>,
    context_tokens: usize,
}

impl ReasoningAdapter {
    pub fn new(backend: Arc<dyn LlmBackend>, prompts: PromptsConfig, clinic_name: impl Into<String>) -> Self {
        Self {
            backend,
            prompts,
            clinic_name: clinic_name.into(),
            tools: intake_tool_schemas(),
            context_tokens: DEFAULT_CONTEXT_TOKENS,
        }
    }

    pub fn with_context_tokens(mut self, tokens: usize) -> Self {
        self.context_tokens = tokens;
        self
    }

    fn tools_for(&self, allowed: &[&'static str]) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .filter(|t| allowed.contains(&t.name.as_str()))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReasoningEngine for ReasoningAdapter {
    async fn respond(&self, request: ReasoningRequest) -> intake_core::Result<ReasoningOutput> {
        let messages = PromptBuilder::new()
            .system_prompt(&self.prompts, &self.clinic_name, request.call_date)
            .with_slots(&request.slots)
            .with_history(&request.history)
            .with_stage_guidance(request.stage, &request.guidance)
            .build_with_limit(self.context_tokens);
        let tools = self.tools_for(&request.allowed_tools);

        let completion = self.backend.complete(&messages, &tools).await?;

        // only the first permitted call is honored; the agent runs one tool per turn
        if let Some(call) = completion
            .tool_calls
            .iter()
            .find(|c| request.allowed_tools.contains(&c.name.as_str()))
        {
            let invocation = ToolInvocation::from_name_and_args(&call.name, &call.arguments)?;
            tracing::debug!(call_id = %request.call_id, tool = invocation.name(), "Model requested tool");
            return Ok(ReasoningOutput::ToolCall(invocation));
        }

        match completion.text {
            Some(text) => Ok(ReasoningOutput::Text(text)),
            None => Err(LlmError::InvalidResponse("empty completion".to_string()).into()),
        }
    }

    fn model_name(&self) -> &str {
        self.backend.model_name()
    }
}
