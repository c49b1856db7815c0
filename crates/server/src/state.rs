//! Application State
//!
//! Shared state across all handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;

use intake_agent::IntakeAgent;
use intake_config::{load_policy, IntakePolicy, Settings};

use crate::session::SessionManager;
use crate::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub agent: Arc<IntakeAgent>,
    pub sessions: Arc<SessionManager>,
    /// Prometheus render handle; `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(settings: Settings, agent: IntakeAgent) -> Self {
        let agent = Arc::new(agent);
        let sessions = SessionManager::with_config(
            agent.clone(),
            settings.server.max_sessions,
            Duration::from_secs(1800),
            Duration::from_secs(300),
        );
        Self {
            settings: Arc::new(settings),
            agent,
            sessions: Arc::new(sessions),
            metrics: None,
        }
    }

    /// Load the policy file named in settings and wire the agent from it
    pub fn from_settings(settings: Settings) -> Result<Self, ServerError> {
        let policy = Arc::new(load_policy(&settings.policy_path)?);
        let agent = IntakeAgent::from_settings(&settings, policy)?;
        Ok(Self::new(settings, agent))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn policy(&self) -> &IntakePolicy {
        self.agent.policy()
    }
}
