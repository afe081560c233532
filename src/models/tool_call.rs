use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppError;

/// Top-level body the voice platform posts to the webhook.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub message: Option<ServerMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "tool-calls")]
    ToolCalls {
        #[serde(rename = "toolCalls")]
        tool_calls: Vec<ToolCall>,
    },
    /// Status updates, transcripts, end-of-call reports and the like.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CreateArgs {
    pub user_phone: Option<String>,
    pub user_name: Option<String>,
    pub purpose: Option<String>,
    pub start_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PhoneArgs {
    pub user_phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RescheduleArgs {
    pub user_phone: Option<String>,
    pub new_time: Option<String>,
}

/// A tool call validated against the argument schema of its function.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    Create(CreateArgs),
    Cancel(PhoneArgs),
    List(PhoneArgs),
    Reschedule(RescheduleArgs),
    Unknown(String),
}

impl ToolRequest {
    pub fn name(&self) -> &str {
        match self {
            ToolRequest::Create(_) => "createAppointment",
            ToolRequest::Cancel(_) => "cancelAppointment",
            ToolRequest::List(_) => "listAppointments",
            ToolRequest::Reschedule(_) => "rescheduleAppointment",
            ToolRequest::Unknown(name) => name,
        }
    }
}

impl TryFrom<&FunctionCall> for ToolRequest {
    type Error = AppError;

    fn try_from(call: &FunctionCall) -> Result<Self, Self::Error> {
        let request = match call.name.as_str() {
            "createAppointment" => ToolRequest::Create(parse_arguments(call)?),
            "cancelAppointment" => ToolRequest::Cancel(parse_arguments(call)?),
            "listAppointments" => ToolRequest::List(parse_arguments(call)?),
            "rescheduleAppointment" => ToolRequest::Reschedule(parse_arguments(call)?),
            other => ToolRequest::Unknown(other.to_string()),
        };
        Ok(request)
    }
}

// Some assistants send arguments as a JSON-encoded string instead of an object.
fn parse_arguments<T: DeserializeOwned + Default>(call: &FunctionCall) -> Result<T, AppError> {
    let invalid = |e: serde_json::Error| {
        AppError::InvalidPayload(format!("bad arguments for {}: {e}", call.name))
    };

    match &call.arguments {
        Value::Null => Ok(T::default()),
        Value::String(raw) if raw.trim().is_empty() => Ok(T::default()),
        Value::String(raw) => serde_json::from_str(raw).map_err(invalid),
        value @ Value::Object(_) => serde_json::from_value(value.clone()).map_err(invalid),
        _ => Err(AppError::InvalidPayload(format!(
            "arguments for {} must be an object",
            call.name
        ))),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolResults {
    pub results: Vec<ToolResult>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_call_id: String,
    pub result: String,
}
