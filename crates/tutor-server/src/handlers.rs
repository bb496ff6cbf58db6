//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use tutor_core::{
    ConfigPatch, ConversationStore, Orchestrator, ProviderKind, ToolActivity, TutorConfig,
    TutorError, transcript,
};

use crate::state::{AppState, SharedStore};

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: ProviderKind,
    pub model: String,
    pub tools: usize,
    pub conversations: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub conversation_id: String,
    pub provider: ProviderKind,
    pub model: String,
    pub rounds: usize,
    pub round_limit_reached: bool,
    pub tool_activity: Vec<ToolActivity>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub message_count: usize,
    pub max_history: usize,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct UndoResponse {
    pub removed: bool,
    pub message_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub active: ProviderKind,
    pub model: String,
    pub fallback_from: Option<ProviderKind>,
    pub available: Vec<ProviderKind>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchProviderRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn from_tutor_error(e: &TutorError) -> ApiError {
    match e {
        TutorError::Validation(_) | TutorError::Parse(_) | TutorError::Json(_) => {
            api_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.to_string())
        }
        TutorError::ProviderUnavailable(_) => {
            api_error(StatusCode::CONFLICT, "PROVIDER_UNAVAILABLE", e.to_string())
        }
        TutorError::Cancelled => {
            api_error(StatusCode::SERVICE_UNAVAILABLE, "CANCELLED", e.to_string())
        }
        _ => api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", e.to_string()),
    }
}

async fn existing(state: &AppState, id: &str) -> Result<SharedStore, ApiError> {
    state.conversations.get(id).await.ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Conversation '{id}' not found"),
        )
    })
}

fn describe(id: &str, store: &ConversationStore) -> ConversationResponse {
    ConversationResponse {
        conversation_id: id.to_string(),
        message_count: store.count(),
        max_history: store.max_history(),
        summary: store.summary(),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (provider, model) = {
        let selector = state.selector.read().await;
        (selector.active_kind(), selector.provider().model().to_string())
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider,
        model,
        tools: state.tools.len(),
        conversations: state.conversations.len().await,
    })
}

/// Run one conversational turn
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "EMPTY_MESSAGE",
            "Message must not be empty",
        ));
    }

    let conversation_id = payload
        .conversation_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Snapshot the selection so a concurrent switch affects only later turns
    let (kind, provider, config, role) = {
        let selector = state.selector.read().await;
        (
            selector.active_kind(),
            selector.provider(),
            selector.config().orchestrator_config(),
            selector.config().role.clone(),
        )
    };
    let system_prompt = state.prompts.lock().await.system_prompt(&role);

    let orchestrator = Orchestrator::new(provider.clone(), state.tools.clone(), config);
    let store = state.conversations.get_or_create(&conversation_id).await;
    let mut store = store.lock().await;

    let shutdown = state.shutdown.clone();
    let outcome = orchestrator
        .run_turn_until(&mut store, &payload.message, &system_prompt, async move {
            shutdown.notified().await;
        })
        .await
        .map_err(|e| {
            tracing::warn!(conversation = %conversation_id, error = %e, "Turn did not complete");
            from_tutor_error(&e)
        })?;

    tracing::info!(
        conversation = %conversation_id,
        provider = %kind,
        rounds = outcome.rounds,
        "Turn complete"
    );

    Ok(Json(ChatResponse {
        message: outcome.text,
        conversation_id,
        provider: kind,
        model: provider.model().to_string(),
        rounds: outcome.rounds,
        round_limit_reached: outcome.round_limit_reached,
        tool_activity: outcome.activity,
    }))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let store = existing(&state, &id).await?;
    let store = store.lock().await;
    Ok(Json(describe(&id, &store)))
}

pub async fn clear_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let store = existing(&state, &id).await?;
    let mut store = store.lock().await;
    store.clear();
    state.conversations.remove(&id).await;
    tracing::info!(conversation = %id, "Conversation deleted");
    Ok(Json(describe(&id, &store)))
}

pub async fn undo_last(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UndoResponse>, ApiError> {
    let store = existing(&state, &id).await?;
    let mut store = store.lock().await;
    let removed = store.remove_last();
    Ok(Json(UndoResponse {
        removed,
        message_count: store.count(),
    }))
}

/// Export as JSON lines
pub async fn export_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = existing(&state, &id).await?;
    let body = transcript::to_jsonl(&*store.lock().await).map_err(|e| from_tutor_error(&e))?;
    Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], body))
}

/// Replace a conversation with the messages of a JSON-lines transcript
pub async fn import_transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<ConversationResponse>, ApiError> {
    let mut store = ConversationStore::new();
    let loaded = transcript::from_jsonl(&body, &mut store).map_err(|e| from_tutor_error(&e))?;
    tracing::info!(conversation = %id, loaded, "Conversation resumed from transcript");

    let response = describe(&id, &store);
    state.conversations.replace(&id, store).await;
    Ok(Json(response))
}

pub async fn get_provider(State(state): State<AppState>) -> Json<ProviderStatus> {
    let selector = state.selector.read().await;
    Json(ProviderStatus {
        active: selector.active_kind(),
        model: selector.provider().model().to_string(),
        fallback_from: selector.active().fallback_from,
        available: selector.available_kinds(),
    })
}

pub async fn switch_provider(
    State(state): State<AppState>,
    Json(payload): Json<SwitchProviderRequest>,
) -> Result<Json<ProviderStatus>, ApiError> {
    let mut selector = state.selector.write().await;
    if !selector.switch(&payload.name) {
        return Err(api_error(
            StatusCode::CONFLICT,
            "PROVIDER_UNAVAILABLE",
            format!(
                "Provider '{}' is not available. Available: {}",
                payload.name,
                selector
                    .available_kinds()
                    .iter()
                    .map(|k| k.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ));
    }

    Ok(Json(ProviderStatus {
        active: selector.active_kind(),
        model: selector.provider().model().to_string(),
        fallback_from: None,
        available: selector.available_kinds(),
    }))
}

pub async fn get_config(State(state): State<AppState>) -> Json<TutorConfig> {
    Json(state.selector.read().await.config().clone())
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(patch): Json<ConfigPatch>,
) -> Result<Json<TutorConfig>, ApiError> {
    let mut selector = state.selector.write().await;
    let config = selector.update_config(&patch).map_err(|e| {
        tracing::warn!(error = %e, "Rejected configuration change");
        from_tutor_error(&e)
    })?;
    Ok(Json(config.clone()))
}
