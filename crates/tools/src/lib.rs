//! Intake tools
//!
//! Collaborator implementations for the call flow plus a name-addressed tool
//! registry. Tool schemas are shared with the reasoning backend.

pub mod calendar;
pub mod facade;
pub mod insurance;
pub mod registry;
pub mod schema;
pub mod transfer;

pub use calendar::InMemoryCalendar;
pub use facade::IntakeTools;
pub use insurance::{StubInsuranceVerifier, DEFAULT_COPAY_USD};
pub use registry::{
    create_intake_registry, CheckAvailabilityTool, ConfirmAppointmentTool, DetectCrisisTool,
    Tool, ToolError, ToolExecutor, ToolOutput, ToolRegistry, VerifyInsuranceTool,
};
pub use schema::{intake_tool_schemas, InputSchema, PropertySchema, ToolSchema};
pub use transfer::TransferDesk;
