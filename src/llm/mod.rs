//! Chat-completion model interface
//!
//! The orchestration loop only talks to [`ChatModel`]. [`OpenAiProvider`]
//! implements it over an OpenAI-compatible HTTP API; [`ScriptedModel`]
//! replays canned responses.

pub mod error;
pub mod openai;
pub mod scripted;

pub use error::{ProviderError, ProviderErrorKind};
pub use openai::OpenAiProvider;
pub use scripted::ScriptedModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::types::{ToolCallRequest, Usage, WireMessage};
use crate::tools::ToolSchema;

/// One round's request to the model
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl From<String> for FinishReason {
    fn from(s: String) -> Self {
        match s.as_str() {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Other(s),
        }
    }
}

impl From<FinishReason> for String {
    fn from(reason: FinishReason) -> Self {
        match reason {
            FinishReason::Stop => "stop".to_string(),
            FinishReason::Length => "length".to_string(),
            FinishReason::ToolCalls => "tool_calls".to_string(),
            FinishReason::ContentFilter => "content_filter".to_string(),
            FinishReason::Other(s) => s,
        }
    }
}

/// The assistant message of one round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// One round's response. `usage` covers this round only.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub finish_reason: FinishReason,
    pub message: AssistantReply,
    pub usage: Usage,
}

impl ChatResponse {
    /// Final answer with no tool requests
    pub fn text(content: impl Into<String>, usage: Usage) -> Self {
        Self {
            finish_reason: FinishReason::Stop,
            message: AssistantReply {
                content: Some(content.into()),
                tool_calls: Vec::new(),
            },
            usage,
        }
    }

    /// Response asking for the given tool calls
    pub fn tool_calls(calls: Vec<ToolCallRequest>, usage: Usage) -> Self {
        Self {
            finish_reason: FinishReason::ToolCalls,
            message: AssistantReply {
                content: None,
                tool_calls: calls,
            },
            usage,
        }
    }

    /// True when the model stopped to have tools run
    pub fn wants_tools(&self) -> bool {
        self.finish_reason == FinishReason::ToolCalls && !self.message.tool_calls.is_empty()
    }
}

/// Chat-completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}
