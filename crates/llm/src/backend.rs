//! Chat backends
//!
//! `ChatCompletionsBackend` speaks the OpenAI chat-completions wire format
//! with native function calling. Groq, OpenAI, vLLM and Ollama's
//! OpenAI-compatible endpoint all accept it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use intake_config::ReasoningConfig;
use intake_tools::ToolSchema;

use crate::prompt::Message;
use crate::LlmError;

#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    /// Full chat-completions URL
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ChatCompletionsConfig {
    pub fn from_settings(settings: &ReasoningConfig) -> Result<Self, LlmError> {
        let api_key = settings.resolved_api_key().unwrap_or_default();
        let local = settings.endpoint.starts_with("http://localhost")
            || settings.endpoint.starts_with("http://127.0.0.1");
        if api_key.is_empty() && !local {
            return Err(LlmError::Configuration(format!(
                "API key required for {} (set {})",
                settings.endpoint, settings.api_key_env
            )));
        }

        Ok(Self {
            endpoint: settings.endpoint.clone(),
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout: Duration::from_millis(settings.timeout_ms),
        })
    }
}

/// Tool call returned by the model, arguments still as JSON
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: Option<String>,
    pub tool_calls: Vec<ParsedToolCall>,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<Completion, LlmError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatFunction,
}

#[derive(Debug, Deserialize)]
struct ChatFunction {
    name: String,
    /// JSON-encoded object, per the wire format
    arguments: String,
}

/// Decode a chat-completions response body
pub fn parse_completion(body: &str) -> Result<Completion, LlmError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            let arguments = if call.function.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    LlmError::InvalidResponse(format!(
                        "bad arguments for {}: {}",
                        call.function.name, e
                    ))
                })?
            };
            Ok(ParsedToolCall {
                name: call.function.name,
                arguments,
            })
        })
        .collect::<Result<Vec<_>, LlmError>>()?;

    Ok(Completion {
        text: choice
            .message
            .content
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        tool_calls,
        finish_reason: choice.finish_reason,
    })
}

pub struct ChatCompletionsBackend {
    config: ChatCompletionsConfig,
    client: Client,
}

impl ChatCompletionsBackend {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LlmBackend for ChatCompletionsBackend {
    async fn complete(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<Completion, LlmError> {
        let start = std::time::Instant::now();
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools: tools.iter().map(ToolSchema::to_function_definition).collect(),
            tool_choice: (!tools.is_empty()).then_some("auto"),
        };

        let mut builder = self.client.post(&self.config.endpoint).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let completion = parse_completion(&body)?;
        tracing::debug!(
            model = %self.config.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            tool_calls = completion.tool_calls.len(),
            finish_reason = ?completion.finish_reason,
            "Chat completion received"
        );
        Ok(completion)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_completion() {
        let body = json!({
            "choices": [{
                "message": {"role": "assistant", "content": " Which day suits you best? "},
                "finish_reason": "stop"
            }]
        })
        .to_string();

        let completion = parse_completion(&body).unwrap();
        assert_eq!(completion.text.as_deref(), Some("Which day suits you best?"));
        assert!(completion.tool_calls.is_empty());
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_tool_call_completion() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "check_availability",
                            "arguments": "{\"date\": \"2024-06-12\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })
        .to_string();

        let completion = parse_completion(&body).unwrap();
        assert_eq!(completion.text, None);
        assert_eq!(
            completion.tool_calls,
            vec![ParsedToolCall {
                name: "check_availability".into(),
                arguments: json!({"date": "2024-06-12"}),
            }]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_completion(r#"{"choices": []}"#),
            Err(LlmError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion("not json"),
            Err(LlmError::InvalidResponse(_))
        ));
        let bad_args = json!({
            "choices": [{
                "message": {"content": null, "tool_calls": [{
                    "function": {"name": "verify_insurance", "arguments": "{oops"}
                }]},
                "finish_reason": "tool_calls"
            }]
        })
        .to_string();
        assert!(parse_completion(&bad_args).is_err());
    }

    #[test]
    fn test_config_requires_key_for_remote() {
        let settings = ReasoningConfig {
            api_key: None,
            api_key_env: "INTAKE_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..ReasoningConfig::default()
        };
        assert!(ChatCompletionsConfig::from_settings(&settings).is_err());

        let local = ReasoningConfig {
            endpoint: "http://localhost:11434/v1/chat/completions".into(),
            api_key_env: "INTAKE_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..ReasoningConfig::default()
        };
        assert!(ChatCompletionsConfig::from_settings(&local).is_ok());
    }
}
