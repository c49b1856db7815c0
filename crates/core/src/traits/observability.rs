//! Trace export collaborator
//!
//! One span per caller turn, with children for the stage transition and any
//! tool calls made while handling it. Export failures never fail the turn.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSpan {
    pub call_id: String,
    pub turn_id: u32,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Short outcome tag, e.g. "advanced", "reprompt", "crisis", "ok", "error"
    pub outcome: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TraceSpan>,
}

impl TraceSpan {
    /// Open a span now; call `finish` to stamp the end time and outcome
    pub fn start(call_id: impl Into<String>, turn_id: u32, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            call_id: call_id.into(),
            turn_id,
            name: name.into(),
            started_at: now,
            ended_at: now,
            outcome: String::new(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        Self::start(self.call_id.clone(), self.turn_id, name)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn push_child(&mut self, child: TraceSpan) {
        self.children.push(child);
    }

    pub fn finish(mut self, outcome: impl Into<String>) -> Self {
        self.ended_at = Utc::now();
        self.outcome = outcome.into();
        self
    }

    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

#[async_trait]
pub trait TraceSink: Send + Sync + 'static {
    async fn emit(&self, span: TraceSpan) -> Result<()>;

    /// Session-level score attached after the call ends
    async fn score(&self, _call_id: &str, _name: &str, _value: f64) -> Result<()> {
        Ok(())
    }
}
