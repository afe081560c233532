pub mod appointment;
pub mod tool_call;

pub use appointment::{Appointment, AppointmentStatus, NewAppointment};
pub use tool_call::{
    CreateArgs, FunctionCall, PhoneArgs, RescheduleArgs, ServerMessage, ToolCall, ToolRequest,
    ToolResult, ToolResults, WebhookPayload,
};
