use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;

use crate::errors::AppError;
use crate::models::{ServerMessage, ToolRequest, ToolResult, ToolResults, WebhookPayload};
use crate::services::booking::{self, BookingError};
use crate::state::AppState;

/// POST /vapi/webhook
///
/// Only the first entry of `toolCalls` is answered. Booking outcomes, failures
/// included, always come back as a 200 with a sentence for the caller; only a
/// payload that does not match the envelope schema is rejected.
pub async fn vapi_webhook(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidPayload(e.body_text()))?;

    let tool_calls = match payload.message {
        Some(ServerMessage::ToolCalls { tool_calls }) => tool_calls,
        _ => return Ok(Json(serde_json::json!({ "status": "ok" })).into_response()),
    };

    let call = tool_calls
        .into_iter()
        .next()
        .ok_or_else(|| AppError::InvalidPayload("toolCalls is empty".to_string()))?;
    let request = ToolRequest::try_from(&call.function)?;

    tracing::info!(tool = request.name(), tool_call_id = %call.id, "tool call received");

    let result = run_tool(&state, &request);

    Ok(Json(ToolResults {
        results: vec![ToolResult {
            tool_call_id: call.id,
            result,
        }],
    })
    .into_response())
}

fn run_tool(state: &AppState, request: &ToolRequest) -> String {
    let now = Utc::now().naive_utc();

    // The guard spans the conflict check and the write that follows it.
    match state.db.lock() {
        Ok(db) => booking::handle(&db, request, now),
        Err(_) => booking::reply(
            request.name(),
            Err(BookingError::Storage(anyhow::anyhow!("database lock poisoned"))),
        ),
    }
}
