//! Tool Registry
//!
//! Name-addressed tools with schema validation and per-tool timeouts. The
//! reasoning backend and the server see tools through here; the call flow
//! itself uses the typed `IntakeTools` facade.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use intake_config::IntakePolicy;
use intake_core::{
    DateRange, ReservationResult, ToolInvocation, TransferRequest, TransferTrigger,
    VerificationResult,
};
use intake_text_processing::{AmbiguityResolver, DateResolution};

use crate::facade::IntakeTools;
use crate::schema::{self, ToolSchema};

/// Default timeout for tool execution
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 5;

/// Session id used when a registry caller does not supply one
const ANONYMOUS_SESSION: &str = "registry";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Tool '{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("Tool execution failed: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn timeout(tool: &str, secs: u64) -> Self {
        Self::Timeout {
            tool: tool.to_string(),
            secs,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<intake_core::Error> for ToolError {
    fn from(err: intake_core::Error) -> Self {
        ToolError::internal(err.to_string())
    }
}

impl From<ToolError> for intake_core::Error {
    fn from(err: ToolError) -> Self {
        let tool = match &err {
            ToolError::Timeout { tool, .. } => tool.clone(),
            _ => "registry".to_string(),
        };
        intake_core::Error::tool(tool, err.to_string())
    }
}

/// Structured tool result
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: Value,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn json(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: json!({ "error": message.into() }),
            is_error: true,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError>;

    fn name(&self) -> String {
        self.schema().name
    }

    fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        match self.schema().input_schema.missing_required(arguments) {
            Some(field) => Err(ToolError::invalid_params(format!(
                "missing required field '{field}'"
            ))),
            None => Ok(()),
        }
    }

    fn timeout_secs(&self) -> u64 {
        DEFAULT_TOOL_TIMEOUT_SECS
    }
}

/// Tool executor trait
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError>;

    fn list_tools(&self) -> Vec<ToolSchema>;

    fn get_tool(&self, name: &str) -> Option<ToolSchema>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name(), Arc::new(tool));
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a typed invocation, e.g. one requested by the reasoning backend
    pub async fn invoke(&self, call: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let arguments = serde_json::to_value(call)
            .map_err(|e| ToolError::internal(e.to_string()))?;
        self.execute(call.name(), arguments).await
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, arguments: Value) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::not_found(format!("Tool not found: {}", name)))?;

        tool.validate(&arguments)?;

        let timeout_secs = tool.timeout_secs();
        tracing::trace!(tool = name, timeout_secs, "Executing tool with timeout");

        match tokio::time::timeout(Duration::from_secs(timeout_secs), tool.execute(arguments)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ToolError::timeout(name, timeout_secs)),
        }
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    fn get_tool(&self, name: &str) -> Option<ToolSchema> {
        self.tools.get(name).map(|t| t.schema())
    }
}

fn str_arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments.get(key).and_then(Value::as_str).map(str::trim)
}

pub struct CheckAvailabilityTool {
    tools: IntakeTools,
    horizon_days: u32,
    resolver: AmbiguityResolver,
}

impl CheckAvailabilityTool {
    pub fn new(tools: IntakeTools, horizon_days: u32) -> Self {
        Self {
            tools,
            horizon_days,
            resolver: AmbiguityResolver::new(),
        }
    }

    fn resolve_date(&self, text: &str, anchor: NaiveDate) -> Option<NaiveDate> {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(date);
        }
        match self.resolver.resolve(text, anchor) {
            DateResolution::Resolved { date, .. } => Some(date),
            DateResolution::Unparseable => None,
        }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn schema(&self) -> ToolSchema {
        schema::check_availability_schema()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let text = str_arg(&arguments, "date").unwrap_or_default();
        let anchor = str_arg(&arguments, "anchor")
            .and_then(|a| NaiveDate::parse_from_str(a, "%Y-%m-%d").ok())
            .unwrap_or_else(|| Utc::now().date_naive());

        let Some(date) = self.resolve_date(text, anchor) else {
            return Ok(ToolOutput::error(format!("could not understand date '{text}'")));
        };

        let slots = self
            .tools
            .find_slots(DateRange::starting_at(date, self.horizon_days))
            .await?;
        let listed: Vec<Value> = slots
            .iter()
            .map(|slot| {
                json!({
                    "slot_id": slot.id,
                    "doctor": slot.doctor,
                    "specialty": slot.specialty,
                    "description": slot.describe(),
                })
            })
            .collect();

        Ok(ToolOutput::json(json!({
            "date": date.to_string(),
            "slots": listed,
        })))
    }
}

pub struct VerifyInsuranceTool {
    tools: IntakeTools,
}

impl VerifyInsuranceTool {
    pub fn new(tools: IntakeTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for VerifyInsuranceTool {
    fn schema(&self) -> ToolSchema {
        schema::verify_insurance_schema()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let provider = str_arg(&arguments, "provider").unwrap_or_default();
        let member_id = str_arg(&arguments, "member_id").unwrap_or_default();

        let output = match self.tools.verify(provider, member_id).await? {
            VerificationResult::Accepted { copay_usd } => json!({
                "status": "accepted",
                "copay_usd": copay_usd,
            }),
            VerificationResult::NotAccepted => json!({ "status": "not_accepted" }),
            VerificationResult::InvalidMemberId => json!({ "status": "invalid_member_id" }),
        };
        Ok(ToolOutput::json(output))
    }
}

pub struct ConfirmAppointmentTool {
    tools: IntakeTools,
}

impl ConfirmAppointmentTool {
    pub fn new(tools: IntakeTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for ConfirmAppointmentTool {
    fn schema(&self) -> ToolSchema {
        schema::confirm_appointment_schema()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let slot_id = str_arg(&arguments, "slot_id").unwrap_or_default();
        let session_id = str_arg(&arguments, "session_id").unwrap_or(ANONYMOUS_SESSION);

        let output = match self.tools.reserve(slot_id, session_id).await? {
            ReservationResult::Reserved { slot } | ReservationResult::AlreadyHeld { slot } => {
                json!({
                    "status": "held",
                    "slot_id": slot.id,
                    "description": slot.describe(),
                })
            }
            ReservationResult::Conflict { slot_id } => {
                return Ok(ToolOutput::error(format!("slot {slot_id} is no longer available")));
            }
        };
        Ok(ToolOutput::json(output))
    }
}

pub struct DetectCrisisTool {
    tools: IntakeTools,
}

impl DetectCrisisTool {
    pub fn new(tools: IntakeTools) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Tool for DetectCrisisTool {
    fn schema(&self) -> ToolSchema {
        schema::detect_crisis_schema()
    }

    async fn execute(&self, arguments: Value) -> Result<ToolOutput, ToolError> {
        let reason = str_arg(&arguments, "reason").unwrap_or_default().to_string();
        let call_id = str_arg(&arguments, "session_id")
            .unwrap_or(ANONYMOUS_SESSION)
            .to_string();

        self.tools.spawn_transfer(TransferRequest {
            call_id,
            transcript: Vec::new(),
            trigger: TransferTrigger::Crisis { pattern: reason },
        });
        Ok(ToolOutput::json(json!({ "status": "transfer_requested" })))
    }
}

/// Registry with every intake tool wired to the given collaborators
pub fn create_intake_registry(tools: &IntakeTools, policy: &IntakePolicy) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(CheckAvailabilityTool::new(
        tools.clone(),
        policy.scheduling.search_horizon_days,
    ));
    registry.register(VerifyInsuranceTool::new(tools.clone()));
    registry.register(ConfirmAppointmentTool::new(tools.clone()));
    registry.register(DetectCrisisTool::new(tools.clone()));

    tracing::info!(
        clinic = %policy.clinic_name,
        tool_count = registry.len(),
        "Created intake tool registry"
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        let policy = IntakePolicy::default();
        let tools = IntakeTools::in_memory(&policy).unwrap();
        create_intake_registry(&tools, &policy)
    }

    #[test]
    fn test_registry_lists_all_contracts() {
        let registry = registry();
        assert_eq!(registry.len(), 4);
        let names: Vec<String> = registry.list_tools().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "check_availability",
                "confirm_appointment",
                "detect_crisis",
                "verify_insurance"
            ]
        );
        assert!(registry.get_tool("verify_insurance").is_some());
    }

    #[tokio::test]
    async fn test_unknown_tool_and_missing_params() {
        let registry = registry();
        assert!(matches!(
            registry.execute("book_flight", json!({})).await,
            Err(ToolError::NotFound(_))
        ));
        assert!(matches!(
            registry
                .execute("verify_insurance", json!({"provider": "Aetna"}))
                .await,
            Err(ToolError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_check_availability_with_spoken_date() {
        let registry = registry();
        let output = registry
            .execute(
                "check_availability",
                json!({"date": "next week", "anchor": "2024-06-03"}),
            )
            .await
            .unwrap();
        assert!(!output.is_error);
        assert_eq!(output.content["date"], "2024-06-10");
        assert_eq!(
            output.content["slots"][0]["slot_id"],
            "2024-06-10T0900-dr-lee"
        );
    }

    #[tokio::test]
    async fn test_invoke_typed_call() {
        let registry = registry();
        let output = registry
            .invoke(&ToolInvocation::VerifyInsurance {
                provider: "Aetna".into(),
                member_id: "5550123".into(),
            })
            .await
            .unwrap();
        assert_eq!(output.content["status"], "accepted");
        assert_eq!(output.content["copay_usd"], 30);
    }

    #[tokio::test]
    async fn test_confirm_appointment_conflict_is_error_output() {
        let registry = registry();
        let args = json!({"slot_id": "2024-06-11T1100-dr-shah", "session_id": "call-1"});
        let first = registry.execute("confirm_appointment", args).await.unwrap();
        assert_eq!(first.content["status"], "held");

        let second = registry
            .execute(
                "confirm_appointment",
                json!({"slot_id": "2024-06-11T1100-dr-shah", "session_id": "call-2"}),
            )
            .await
            .unwrap();
        assert!(second.is_error);
    }

    #[test]
    fn test_tool_error_converts_to_tool_failure() {
        let err: intake_core::Error = ToolError::timeout("verify_insurance", 5).into();
        assert!(matches!(
            err,
            intake_core::Error::ToolCallFailure { ref tool, .. } if tool == "verify_insurance"
        ));
    }
}
