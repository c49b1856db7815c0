//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Relaxed validation, warnings only
    #[default]
    Development,
    Staging,
    /// All validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Optional language-model fallback
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    /// Path to the call-flow policy (YAML)
    #[serde(default = "default_policy_path")]
    pub policy_path: String,
}

fn default_policy_path() -> String {
    "config/policy.yaml".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: RuntimeEnvironment::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            reasoning: ReasoningConfig::default(),
            tools: ToolsConfig::default(),
            policy_path: default_policy_path(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_reasoning()?;

        if self.tools.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "tools.timeout_secs",
                "Tool timeout must be at least 1 second",
            ));
        }

        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "Port cannot be 0"));
        }

        if self.server.max_sessions == 0 {
            return Err(ConfigError::invalid(
                "server.max_sessions",
                "Must allow at least one concurrent call",
            ));
        }

        if self.server.timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "server.timeout_seconds",
                "Request timeout cannot be 0",
            ));
        }

        if self.environment.is_production()
            && self.server.cors_enabled
            && self.server.cors_origins.is_empty()
        {
            tracing::warn!("CORS enabled in production with no origins configured");
        }

        Ok(())
    }

    fn validate_reasoning(&self) -> Result<(), ConfigError> {
        let reasoning = &self.reasoning;
        if !reasoning.enabled {
            return Ok(());
        }

        if reasoning.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid(
                "reasoning.endpoint",
                "Endpoint is required when reasoning is enabled",
            ));
        }

        if !(0.0..=2.0).contains(&reasoning.temperature) {
            return Err(ConfigError::invalid(
                "reasoning.temperature",
                format!("Must be between 0.0 and 2.0, got {}", reasoning.temperature),
            ));
        }

        if self.environment.is_strict() && reasoning.resolved_api_key().is_none() {
            return Err(ConfigError::invalid(
                "reasoning.api_key",
                format!(
                    "API key required in {:?} (set reasoning.api_key or {})",
                    self.environment, reasoning.api_key_env
                ),
            ));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent calls
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_sessions() -> usize {
    100
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_sessions: default_max_sessions(),
            timeout_seconds: default_timeout(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    /// Export per-turn spans to the trace sink
    #[serde(default = "default_true")]
    pub tracing_enabled: bool,

    /// OTLP endpoint for traces
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_service_name() -> String {
    "orchard-clinic-intake".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            tracing_enabled: true,
            otlp_endpoint: None,
            service_name: default_service_name(),
            metrics_enabled: true,
        }
    }
}

/// OpenAI-compatible chat completions backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Inline key; prefer `api_key_env`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_reasoning_timeout")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.2
}
fn default_reasoning_timeout() -> u64 {
    8000
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_ms: default_reasoning_timeout(),
        }
    }
}

impl ReasoningConfig {
    /// Inline key first, then the configured environment variable
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }
}

/// Collaborator tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-call timeout for scheduling and insurance tools
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

fn default_tool_timeout() -> u64 {
    5
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (INTAKE__ prefix, `__` separator)
/// 2. config/{env}.{toml,yaml} (if env specified)
/// 3. config/default.{toml,yaml}
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("INTAKE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.policy_path, "config/policy.yaml");
        assert!(!settings.reasoning.enabled);
        assert_eq!(settings.reasoning.model, "llama-3.3-70b-versatile");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_server_validation() {
        let mut settings = Settings::default();

        settings.server.port = 0;
        assert!(settings.validate_server().is_err());
        settings.server.port = 8080;

        settings.server.max_sessions = 0;
        assert!(settings.validate_server().is_err());
        settings.server.max_sessions = 10;

        settings.server.timeout_seconds = 0;
        assert!(settings.validate_server().is_err());
        settings.server.timeout_seconds = 30;

        assert!(settings.validate_server().is_ok());
    }

    #[test]
    fn test_reasoning_validation() {
        let mut settings = Settings::default();
        settings.reasoning.enabled = true;
        settings.reasoning.api_key = Some("test-key".to_string());

        settings.reasoning.temperature = 3.0;
        assert!(settings.validate_reasoning().is_err());
        settings.reasoning.temperature = 0.2;

        settings.reasoning.endpoint = " ".to_string();
        assert!(settings.validate_reasoning().is_err());
        settings.reasoning.endpoint = default_endpoint();

        assert!(settings.validate_reasoning().is_ok());
    }

    #[test]
    fn test_production_requires_api_key() {
        let mut settings = Settings::default();
        settings.environment = RuntimeEnvironment::Production;
        settings.reasoning.enabled = true;
        settings.reasoning.api_key_env = "INTAKE_TEST_UNSET_KEY_VAR".to_string();
        assert!(settings.validate_reasoning().is_err());

        settings.reasoning.api_key = Some("secret".to_string());
        assert!(settings.validate_reasoning().is_ok());
    }

    #[test]
    fn test_zero_tool_timeout_rejected() {
        let mut settings = Settings::default();
        settings.tools.timeout_secs = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "tools.timeout_secs"
        ));
    }
}
