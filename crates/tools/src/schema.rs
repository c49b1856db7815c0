//! Tool schemas
//!
//! JSON-schema shaped descriptions of the typed tool contracts. The reasoning
//! backend advertises them as function definitions; the server lists them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use intake_core::ToolInvocation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: InputSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// OpenAI-style `{"type": "function", "function": {...}}` definition
    pub fn to_function_definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl InputSchema {
    pub fn object() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn property(mut self, name: &str, schema: PropertySchema, required: bool) -> Self {
        self.properties.insert(name.to_string(), schema);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Check required string fields are present and non-empty
    pub fn missing_required(&self, arguments: &Value) -> Option<String> {
        self.required
            .iter()
            .find(|field| {
                arguments
                    .get(field.as_str())
                    .and_then(Value::as_str)
                    .map(|s| s.trim().is_empty())
                    .unwrap_or(true)
            })
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub prop_type: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl PropertySchema {
    pub fn string(description: &str) -> Self {
        Self {
            prop_type: "string".to_string(),
            description: description.to_string(),
            format: None,
        }
    }

    pub fn date(description: &str) -> Self {
        Self {
            format: Some("date".to_string()),
            ..Self::string(description)
        }
    }
}

pub fn check_availability_schema() -> ToolSchema {
    ToolSchema::new(
        ToolInvocation::CHECK_AVAILABILITY,
        "List open appointment slots starting from a day the caller asked for",
        InputSchema::object().property(
            "date",
            PropertySchema::string("Day the caller asked for, ISO date or spoken form such as 'next Tuesday'"),
            true,
        ),
    )
}

pub fn verify_insurance_schema() -> ToolSchema {
    ToolSchema::new(
        ToolInvocation::VERIFY_INSURANCE,
        "Verify the caller's insurance with the payer",
        InputSchema::object()
            .property("provider", PropertySchema::string("Insurance provider name"), true)
            .property("member_id", PropertySchema::string("Member ID on the insurance card"), true),
    )
}

pub fn confirm_appointment_schema() -> ToolSchema {
    ToolSchema::new(
        ToolInvocation::CONFIRM_APPOINTMENT,
        "Hold an appointment slot for this caller once they said yes",
        InputSchema::object()
            .property("slot_id", PropertySchema::string("Slot id from check_availability"), true)
            .property("session_id", PropertySchema::string("Call id holding the slot"), false),
    )
}

pub fn detect_crisis_schema() -> ToolSchema {
    ToolSchema::new(
        ToolInvocation::DETECT_CRISIS,
        "Escalate to a crisis specialist when the caller may be at risk of self-harm",
        InputSchema::object()
            .property("reason", PropertySchema::string("What the caller said that indicates risk"), true)
            .property("session_id", PropertySchema::string("Call id to transfer"), false),
    )
}

/// Every tool contract, in a stable order
pub fn intake_tool_schemas() -> Vec<ToolSchema> {
    vec![
        check_availability_schema(),
        verify_insurance_schema(),
        confirm_appointment_schema(),
        detect_crisis_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_definition_shape() {
        let def = verify_insurance_schema().to_function_definition();
        assert_eq!(def["type"], "function");
        assert_eq!(def["function"]["name"], "verify_insurance");
        assert_eq!(def["function"]["parameters"]["type"], "object");
        assert_eq!(
            def["function"]["parameters"]["required"],
            json!(["provider", "member_id"])
        );
    }

    #[test]
    fn test_missing_required() {
        let schema = verify_insurance_schema().input_schema;
        assert_eq!(
            schema.missing_required(&json!({"provider": "Aetna"})),
            Some("member_id".to_string())
        );
        assert_eq!(
            schema.missing_required(&json!({"provider": "Aetna", "member_id": " "})),
            Some("member_id".to_string())
        );
        assert_eq!(
            schema.missing_required(&json!({"provider": "Aetna", "member_id": "AB12345"})),
            None
        );
    }

    #[test]
    fn test_schema_names_match_contracts() {
        let names: Vec<String> = intake_tool_schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                ToolInvocation::CHECK_AVAILABILITY,
                ToolInvocation::VERIFY_INSURANCE,
                ToolInvocation::CONFIRM_APPOINTMENT,
                ToolInvocation::DETECT_CRISIS,
            ]
        );
    }
}
