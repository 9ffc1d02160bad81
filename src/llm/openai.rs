//! OpenAI-compatible chat-completions client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::{AssistantReply, ChatModel, ChatRequest, ChatResponse, FinishReason, ProviderError};
use crate::agent::types::{ToolCallRequest, Usage};
use crate::error::{ColloquyError, ColloquyResult};

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// HTTPS is required for remote hosts; plain HTTP only for localhost.
fn validate_base_url(base_url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(base_url)
        .map_err(|e| format!("Invalid base_url '{}': {}", base_url, e))?;

    let host = parsed.host_str().unwrap_or("");
    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            let is_localhost = matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1");
            if is_localhost {
                warn!("Using unencrypted HTTP for local model server at '{}'", base_url);
                Ok(())
            } else {
                Err(format!(
                    "HTTP is not allowed for remote URLs (base_url: '{}'). Use HTTPS.",
                    base_url
                ))
            }
        }
        scheme => Err(format!(
            "Unsupported URL scheme '{}' in base_url '{}'",
            scheme, base_url
        )),
    }
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str) -> ColloquyResult<Self> {
        validate_base_url(base_url).map_err(ColloquyError::Configuration)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ColloquyError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

#[async_trait]
impl ChatModel for OpenAiProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        info!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, Vec::len),
            "Calling chat completions"
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("HTTP request failed: {}", e);
                ProviderError::network(&e)
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| ProviderError::network(&e))?;

        if !status.is_success() {
            error!(status = %status, "Provider API error: {}", text);
            return Err(ProviderError::from_status(status.as_u16(), &text));
        }
        debug!("Provider response: {}", text);

        let body: CompletionBody = serde_json::from_str(&text)
            .map_err(|e| ProviderError::malformed(format!("could not decode response: {}", e)))?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::malformed("no choices in response"))?;

        Ok(ChatResponse {
            finish_reason: choice.finish_reason.unwrap_or(FinishReason::Stop),
            message: AssistantReply {
                content: choice.message.content,
                tool_calls: choice.message.tool_calls.unwrap_or_default(),
            },
            usage: body.usage.unwrap_or_default(),
        })
    }
}
