//! HTTP API over the agent

mod api;

pub use api::{router, run_server, AnswerResponse, HealthResponse, QuestionRequest, ToolInfo, ToolsListResponse};
