//! HTTP surface. Handlers only translate between JSON and the moderator or
//! agents.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    routing::{get, post}
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::agents::translation::{INTEREST_AREAS, supported_languages};
use crate::agents::{BatchChatReply, BatchChatRequest, ChatReply, ChatRequest};
use crate::errors::{ServiceError, ServiceResult};
use crate::moderator::{AnalysisReport, AnalyzeOptions};
use crate::telemetry::PipelineTelemetry;
use gateway::GatewayStatus;

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/batch", post(chat_batch_handler))
        .route("/chat/voice", post(chat_voice_handler))
        .route("/chat/history", get(chat_history_handler))
        .route("/chat/clear", post(chat_clear_handler))
        .route("/rate_limit/status", get(rate_limit_status_handler))
        .route("/rate_limit/reset", post(rate_limit_reset_handler))
        .route("/languages", get(languages_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeParams {
    pub language: Option<String>,
    /// Comma-separated interest areas
    pub interests: Option<String>
}

impl AnalyzeParams {
    fn into_options(self) -> AnalyzeOptions {
        AnalyzeOptions {
            language: self.language.filter(|l| !l.trim().is_empty()),
            interests: self
                .interests
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionParams {
    pub session_id: String
}

/// Spoken reply on the wire; `audio_base64` is null when the reply is text only.
#[derive(Debug, Serialize)]
pub struct SpokenReplyBody {
    pub session_id: String,
    pub reply: String,
    pub audio_base64: Option<String>,
    pub audio_content_type: Option<&'static str>
}

async fn analyze_handler(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeParams>,
    body: Bytes
) -> ServiceResult<Json<AnalysisReport>> {
    PipelineTelemetry::record_request("analyze");
    if body.is_empty() {
        return Err(ServiceError::InvalidRequest("empty document body".to_string()));
    }
    let report = state
        .moderator
        .analyze(&body, params.into_options())
        .await
        .map_err(|err| {
            let err = ServiceError::from(err);
            PipelineTelemetry::record_error("analyze", err.error_code());
            err
        })?;
    Ok(Json(report))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>
) -> ServiceResult<Json<ChatReply>> {
    PipelineTelemetry::record_request("chat");
    let reply = state.agents.conversation.reply(request).await?;
    Ok(Json(reply))
}

async fn chat_batch_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchChatRequest>
) -> ServiceResult<Json<BatchChatReply>> {
    PipelineTelemetry::record_request("chat_batch");
    let reply = state.agents.conversation.batch_reply(request).await?;
    Ok(Json(reply))
}

async fn chat_voice_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>
) -> ServiceResult<Json<SpokenReplyBody>> {
    PipelineTelemetry::record_request("chat_voice");
    let spoken = state.agents.conversation.spoken_reply(request).await?;
    let audio_base64 = spoken.audio.map(|bytes| STANDARD.encode(bytes));
    Ok(Json(SpokenReplyBody {
        session_id: spoken.session_id,
        reply: spoken.reply,
        audio_content_type: audio_base64.as_ref().map(|_| "audio/mpeg"),
        audio_base64
    }))
}

async fn chat_history_handler(
    State(state): State<AppState>,
    Query(params): Query<SessionParams>
) -> ServiceResult<Json<Value>> {
    let turns = state.agents.conversation.history(&params.session_id).await?;
    Ok(Json(json!({
        "session_id": params.session_id,
        "turns": turns
    })))
}

async fn chat_clear_handler(
    State(state): State<AppState>,
    Json(params): Json<SessionParams>
) -> ServiceResult<Json<Value>> {
    state.agents.conversation.clear(&params.session_id).await?;
    Ok(Json(json!({
        "session_id": params.session_id,
        "cleared": true
    })))
}

async fn rate_limit_status_handler(State(state): State<AppState>) -> Json<GatewayStatus> {
    Json(state.gateway.status())
}

async fn rate_limit_reset_handler(State(state): State<AppState>) -> Json<Value> {
    state.gateway.reset();
    Json(json!({
        "status": "reset",
        "gateway": state.gateway.status()
    }))
}

async fn languages_handler() -> Json<Value> {
    Json(json!({
        "languages": supported_languages(),
        "interests": INTEREST_AREAS
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "circuit": state.gateway.breaker().state().as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
