//! Reasoning collaborator
//!
//! The reasoning engine phrases replies and can request typed tool calls. The
//! state machine decides what happens; the engine only helps interpret input
//! the deterministic extractors could not handle.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::Turn;
use crate::error::{Error, Result};
use crate::slots::SlotName;
use crate::stage::IntakeStage;

/// Typed tool call contract shared by the reasoning backend and the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolInvocation {
    /// Look up free slots around a day; `date` is ISO or a spoken expression
    CheckAvailability { date: String },
    VerifyInsurance { provider: String, member_id: String },
    ConfirmAppointment { slot_id: String },
    /// The model believes the caller is in crisis
    DetectCrisis { reason: String },
}

impl ToolInvocation {
    pub const CHECK_AVAILABILITY: &'static str = "check_availability";
    pub const VERIFY_INSURANCE: &'static str = "verify_insurance";
    pub const CONFIRM_APPOINTMENT: &'static str = "confirm_appointment";
    pub const DETECT_CRISIS: &'static str = "detect_crisis";

    pub fn name(&self) -> &'static str {
        match self {
            ToolInvocation::CheckAvailability { .. } => Self::CHECK_AVAILABILITY,
            ToolInvocation::VerifyInsurance { .. } => Self::VERIFY_INSURANCE,
            ToolInvocation::ConfirmAppointment { .. } => Self::CONFIRM_APPOINTMENT,
            ToolInvocation::DetectCrisis { .. } => Self::DETECT_CRISIS,
        }
    }

    /// Build a typed invocation from a function name and JSON arguments
    pub fn from_name_and_args(name: &str, args: &Value) -> Result<Self> {
        let field = |key: &str| -> Result<String> {
            args.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| Error::tool(name, format!("missing argument '{key}'")))
        };

        match name {
            Self::CHECK_AVAILABILITY => Ok(Self::CheckAvailability {
                date: field("date")?,
            }),
            Self::VERIFY_INSURANCE => Ok(Self::VerifyInsurance {
                provider: field("provider")?,
                member_id: field("member_id")?,
            }),
            Self::CONFIRM_APPOINTMENT => Ok(Self::ConfirmAppointment {
                slot_id: field("slot_id")?,
            }),
            Self::DETECT_CRISIS => Ok(Self::DetectCrisis {
                reason: field("reason").unwrap_or_default(),
            }),
            other => Err(Error::tool(other, "unknown tool")),
        }
    }
}

/// Input for one reasoning call
#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub call_id: String,
    /// Anchor for relative dates the model resolves
    pub call_date: NaiveDate,
    pub stage: IntakeStage,
    pub history: Vec<Turn>,
    pub slots: Vec<(SlotName, String)>,
    /// What the agent needs from the caller right now
    pub guidance: String,
    /// Tools the engine may request at this stage
    pub allowed_tools: Vec<&'static str>,
}

/// What the engine decided to do
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningOutput {
    Text(String),
    ToolCall(ToolInvocation),
}

#[async_trait]
pub trait ReasoningEngine: Send + Sync + 'static {
    async fn respond(&self, request: ReasoningRequest) -> Result<ReasoningOutput>;

    fn model_name(&self) -> &str;
}
