//! HTTP Endpoints
//!
//! Text transport for the intake line: start a call, post caller utterances,
//! inspect or hang up a call.

use axum::{
    extract::{Json, Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use intake_agent::{SessionSnapshot, TurnReply};
use intake_core::IntakeStage;
use intake_tools::intake_tool_schemas;

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ServerError;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.settings.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);
    let timeout = Duration::from_secs(server.timeout_seconds);

    Router::new()
        .route("/api/calls", post(start_call).get(list_calls))
        .route("/api/calls/:id", get(get_call).delete(end_call))
        .route("/api/calls/:id/utterances", post(post_utterance))
        .route("/api/tools", get(list_tools))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Disabled CORS is permissive; an empty or invalid origin list falls back
/// to localhost:3000
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    if parsed_origins.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods(methods)
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods(methods)
        .allow_headers(Any)
}

#[derive(Debug, Default, Deserialize)]
struct StartCallRequest {
    #[serde(default)]
    caller_id: Option<String>,
    /// Anchor for relative dates; today (UTC) when omitted
    #[serde(default)]
    call_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct StartCallResponse {
    call_id: String,
    reply: String,
    stage: IntakeStage,
}

/// POST /api/calls
async fn start_call(
    State(state): State<AppState>,
    body: Option<Json<StartCallRequest>>,
) -> Result<(StatusCode, Json<StartCallResponse>), ServerError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    state.sessions.ensure_capacity().await?;

    let call_date = request.call_date.unwrap_or_else(|| Utc::now().date_naive());
    let (session, greeting) = state.agent.start_call(None, call_date);
    let stage = session.stage();
    let entry = state.sessions.insert(session)?;
    tracing::info!(
        call_id = %entry.id,
        caller_id = request.caller_id.as_deref().unwrap_or("unknown"),
        "Call opened over HTTP"
    );

    Ok((
        StatusCode::CREATED,
        Json(StartCallResponse {
            call_id: entry.id.clone(),
            reply: greeting,
            stage,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct UtteranceRequest {
    text: String,
}

/// POST /api/calls/:id/utterances
async fn post_utterance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UtteranceRequest>,
) -> Result<Json<TurnReply>, ServerError> {
    let entry = state.sessions.get(&id)?;
    entry.touch();

    let mut session = entry.call.lock().await;
    let reply = state.agent.handle_utterance(&mut session, &request.text).await?;
    Ok(Json(reply))
}

/// GET /api/calls/:id
async fn get_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ServerError> {
    let entry = state.sessions.get(&id)?;
    let session = entry.call.lock().await;
    Ok(Json(session.snapshot()))
}

/// DELETE /api/calls/:id: caller hung up
async fn end_call(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ServerError> {
    let entry = state
        .sessions
        .remove(&id)
        .ok_or_else(|| ServerError::NotFound(id.clone()))?;

    let mut session = entry.call.lock().await;
    state.agent.hang_up(&mut session).await?;
    Ok(Json(session.snapshot()))
}

/// GET /api/calls
async fn list_calls(State(state): State<AppState>) -> Json<serde_json::Value> {
    let calls = state.sessions.list();
    Json(serde_json::json!({
        "calls": calls,
        "count": calls.len(),
        "max": state.sessions.max_sessions(),
    }))
}

/// GET /api/tools: schemas offered to the reasoning backend
async fn list_tools() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "tools": intake_tool_schemas() }))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "clinic": state.policy().clinic_name,
        "calls": state.sessions.count(),
        "reasoning_enabled": state.settings.reasoning.enabled,
        "metrics_enabled": state.metrics.is_some(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_agent::IntakeAgent;
    use intake_config::{IntakePolicy, Settings};
    use intake_tools::IntakeTools;
    use std::sync::Arc;

    #[test]
    fn test_router_creation() {
        let policy = Arc::new(IntakePolicy::default());
        let agent = IntakeAgent::new(policy.clone(), IntakeTools::in_memory(&policy).unwrap());
        let _ = create_router(AppState::new(Settings::default(), agent));
    }

    #[test]
    fn test_cors_fallbacks() {
        let _ = build_cors_layer(&[], true);
        let _ = build_cors_layer(&["not a header\n".to_string()], true);
        let _ = build_cors_layer(&[], false);
    }
}
