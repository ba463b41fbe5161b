use crate::error::ApiError;
use crate::schema::{WebhookPayload, WebhookResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::Uri;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use uuid::Uuid;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/api/v1/webhook", put(receive_webhook))
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/api/v1/sessions", get(list_sessions))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.store().len(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// PUT /api/v1/webhook - handle one inbound chat message.
///
/// Processing runs on its own task so a client that hangs up mid-request
/// does not cut the conversation update short.
async fn receive_webhook(
    State(state): State<AppState>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let Json(payload) = payload?;
    let request_id = Uuid::new_v4();
    tracing::info!(
        %request_id,
        chat_id = %payload.chat_id,
        from_me = payload.from_me,
        body = %payload.body,
        "Webhook received"
    );

    let chat_id = payload.chat_id.clone();
    let conversations = state.conversations.clone();
    let outcome = tokio::spawn(async move { conversations.handle(payload.into()).await })
        .await
        .map_err(|e| {
            tracing::error!(%request_id, chat_id = %chat_id, error = %e, "Webhook processing failed");
            ApiError::internal("Erro interno ao processar a solicitação.")
        })?;

    Ok(Json(outcome.into()))
}

async fn list_sessions(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.store().summaries();
    Json(json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {uri}"))
}
