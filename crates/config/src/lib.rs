//! Configuration management for the clinic intake line
//!
//! Two layers:
//! - `Settings`: process settings (server, observability, reasoning backend,
//!   tool timeouts). Loaded from `config/default.*`, `config/{env}.*` and
//!   `INTAKE__*` environment variables.
//! - `IntakePolicy`: call-flow policy data (crisis and scope keyword sets,
//!   self-pay rate, retry cap, prompts, doctor roster). Loaded from
//!   `config/policy.yaml`; compiled-in defaults when the file is absent.

pub mod policy;
pub mod prompts;
pub mod roster;
pub mod settings;

pub use policy::{
    load_policy, CrisisPolicy, InsurancePolicy, IntakePolicy, RetryPolicy, SchedulingPolicy,
    ScopePolicy, SelfPayPolicy,
};
pub use prompts::PromptsConfig;
pub use roster::{DoctorRoster, RosterEntry};
pub use settings::{
    load_settings, ObservabilityConfig, ReasoningConfig, RuntimeEnvironment, ServerConfig,
    Settings, ToolsConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for intake_core::Error {
    fn from(err: ConfigError) -> Self {
        intake_core::Error::Config(err.to_string())
    }
}
