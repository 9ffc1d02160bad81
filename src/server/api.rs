use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{Agent, AskRequest, ConversationHistory, ToolCallRecord, Usage};
use crate::config::Settings;
use crate::tools::ToolSchema;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i64>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_enable_tools")]
    pub enable_tools: bool,
    #[serde(default)]
    pub tool_names: Option<Vec<String>>,
}

fn default_enable_tools() -> bool {
    true
}

impl QuestionRequest {
    fn into_ask(self) -> Result<AskRequest, ApiError> {
        if self.question.is_empty() {
            return Err(ApiError::Validation("question: must not be empty".to_string()));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ApiError::Validation(format!(
                    "temperature: must be between 0.0 and 2.0, got {}",
                    t
                )));
            }
        }
        let max_tokens = match self.max_tokens {
            Some(n) if n <= 0 => {
                return Err(ApiError::Validation(format!("max_tokens: must be positive, got {}", n)));
            }
            Some(n) => Some(u32::try_from(n).map_err(|_| {
                ApiError::Validation(format!("max_tokens: too large, got {}", n))
            })?),
            None => None,
        };

        Ok(AskRequest {
            question: self.question,
            session_id: self.session_id,
            temperature: self.temperature,
            max_tokens,
            system_prompt: self.system_prompt,
            enable_tools: self.enable_tools,
            tool_names: self.tool_names,
            registry: None,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub session_id: String,
    pub model: String,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCallRecord>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub openai_configured: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub schema: ToolSchema,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolsListResponse {
    pub tools: Vec<ToolInfo>,
    pub count: usize,
}

enum ApiError {
    Validation(String),
    Rejection(JsonRejection),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Rejection(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    agent: Arc<Agent>,
    settings: Arc<Settings>,
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "Colloquy API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Conversational Q&A with tool calling",
        "endpoints": {
            "health": "/health",
            "ask": "/api/v1/ask",
            "history": "/api/v1/sessions/{session_id}/history",
            "sessions": "/api/v1/sessions",
            "clear": "/api/v1/sessions/{session_id}",
            "tools": "/api/v1/tools"
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        openai_configured: state.settings.openai_configured(),
    })
}

async fn ask_question(
    State(state): State<AppState>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(payload) = payload.map_err(ApiError::Rejection)?;
    let request = payload.into_ask()?;

    let outcome = state.agent.ask(request).await.map_err(|e| {
        tracing::error!("ask failed: {}", e);
        ApiError::Internal(format!("Error processing question: {}", e))
    })?;

    Ok(Json(AnswerResponse {
        answer: outcome.answer,
        session_id: outcome.session_id,
        model: state.agent.model_name().to_string(),
        usage: outcome.usage,
        tool_calls: outcome.tool_calls,
        timestamp: Utc::now(),
    }))
}

async fn session_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ConversationHistory>, ApiError> {
    state
        .agent
        .history(&session_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", session_id)))
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.agent.list_sessions())
}

async fn clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.agent.delete_session(&session_id) {
        return Err(ApiError::NotFound(format!("Session {} not found", session_id)));
    }
    Ok(Json(json!({
        "message": format!("Session {} cleared successfully", session_id),
        "session_id": session_id,
    })))
}

async fn list_tools(State(state): State<AppState>) -> Json<ToolsListResponse> {
    let tools: Vec<ToolInfo> = state
        .agent
        .registry()
        .list()
        .iter()
        .map(|tool| ToolInfo {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            schema: tool.schema(),
        })
        .collect();
    let count = tools.len();
    Json(ToolsListResponse { tools, count })
}

pub fn router(agent: Arc<Agent>, settings: Settings) -> Router {
    let state = AppState {
        agent,
        settings: Arc::new(settings),
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v1/ask", post(ask_question))
        .route("/api/v1/sessions", get(list_sessions))
        .route("/api/v1/sessions/:session_id", axum::routing::delete(clear_session))
        .route("/api/v1/sessions/:session_id/history", get(session_history))
        .route("/api/v1/tools", get(list_tools))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(settings: Settings, agent: Arc<Agent>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", settings.api_host, settings.api_port);
    let app = router(agent, settings);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Colloquy server listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
