//! Reasoning engine construction from settings

use std::sync::Arc;

use intake_config::{IntakePolicy, ReasoningConfig};
use intake_core::ReasoningEngine;

use crate::adapter::ReasoningAdapter;
use crate::backend::{ChatCompletionsBackend, ChatCompletionsConfig};
use crate::LlmError;

/// `None` when reasoning is disabled; the call flow then runs on the
/// deterministic extractors alone.
pub fn create_reasoning_engine(
    settings: &ReasoningConfig,
    policy: &IntakePolicy,
) -> Result<Option<Arc<dyn ReasoningEngine>>, LlmError> {
    if !settings.enabled {
        tracing::info!("Reasoning backend disabled");
        return Ok(None);
    }

    let config = ChatCompletionsConfig::from_settings(settings)?;
    let backend = ChatCompletionsBackend::new(config)?;
    tracing::info!(
        endpoint = %settings.endpoint,
        model = %settings.model,
        "Reasoning backend configured"
    );

    Ok(Some(Arc::new(ReasoningAdapter::new(
        Arc::new(backend),
        policy.prompts.clone(),
        policy.clinic_name.clone(),
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_yields_none() {
        let engine =
            create_reasoning_engine(&ReasoningConfig::default(), &IntakePolicy::default()).unwrap();
        assert!(engine.is_none());
    }

    #[test]
    fn test_enabled_local_endpoint() {
        let settings = ReasoningConfig {
            enabled: true,
            endpoint: "http://localhost:11434/v1/chat/completions".into(),
            model: "llama3.2".into(),
            api_key_env: "INTAKE_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..ReasoningConfig::default()
        };
        let engine = create_reasoning_engine(&settings, &IntakePolicy::default())
            .unwrap()
            .unwrap();
        assert_eq!(engine.model_name(), "llama3.2");
    }
}
