//! HTTP server for the chat pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Run one conversation turn through the pipeline |
//! | `GET`  | `/health` | Liveness probe |
//! | `GET`  | `/models/info` | Configured generation backend |
//!
//! # Error Contract
//!
//! Error responses carry a single `detail` field:
//!
//! ```json
//! { "detail": "Last message must be from user" }
//! ```
//!
//! Client-input errors (empty conversation, trailing assistant message)
//! return 400; anything unexpected from the pipeline returns 500 with the
//! failure description embedded. A bad request never takes the process
//! down.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! chat clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::chat::{ChatOrchestrator, INVALID_CONVERSATION};
use crate::config::Config;
use crate::models::{ChatRequest, ChatResponse};

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor. Both fields are immutable after startup.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    orchestrator: Arc<ChatOrchestrator>,
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and serves until the
/// process is terminated. The orchestrator must already be assembled —
/// construction (index seeding, backend selection) happens before the
/// first request is accepted.
pub async fn run_server(config: &Config, orchestrator: Arc<ChatOrchestrator>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .route("/models/info", get(handle_models_info))
        .layer(cors)
        .with_state(state);

    println!("chat-guardian listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error body; the field name matches the original service's wire
/// contract.
#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(detail: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        detail: detail.into(),
    }
}

/// Constructs a 500 Internal Server Error.
fn server_error(detail: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: detail.into(),
    }
}

/// Maps pipeline errors to HTTP statuses. Conversation-shape problems are
/// the caller's fault; everything else is reported as a processing failure
/// with the description embedded.
fn classify_chat_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains(INVALID_CONVERSATION) {
        bad_request(msg)
    } else {
        server_error(format!("Error processing request: {:#}", err))
    }
}

// ============ POST /chat ============

/// Handler for `POST /chat`.
///
/// Runs the conversation through retrieve → format → generate → validate
/// and returns the moderated reply with cited sources. `max_tokens` falls
/// back to the configured default when absent.
async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let max_tokens = request
        .max_tokens
        .unwrap_or(state.config.generation.max_tokens);

    let response = state
        .orchestrator
        .handle(&request.messages, max_tokens)
        .await
        .map_err(classify_chat_error)?;

    Ok(Json(response))
}

// ============ GET /health ============

/// Handler for `GET /health`. Always healthy while the process serves.
async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ============ GET /models/info ============

/// JSON response body for `GET /models/info`.
#[derive(Serialize)]
struct ModelInfoResponse {
    model_type: String,
    model_name: String,
}

/// Handler for `GET /models/info`.
///
/// Reports the generation backend that was actually constructed at startup
/// (after any local→mock fallback), never re-reading the environment.
async fn handle_models_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    let (model_type, model_name) = state.orchestrator.model_info();
    Json(ModelInfoResponse {
        model_type: model_type.to_string(),
        model_name: model_name.to_string(),
    })
}
