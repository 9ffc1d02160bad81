//! Classified model-provider failures

use std::fmt;

use thiserror::Error;

/// Why a model call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// 401/403, bad key or permissions
    Auth,
    /// 402, quota exhausted
    Billing,
    /// 429
    RateLimit,
    /// 404 or unknown model
    NotFound,
    /// 408 or the request timed out locally
    Timeout,
    /// Connection refused, DNS failure, reset
    Network,
    /// 5xx
    ServerError,
    /// 2xx with a body we could not use
    MalformedResponse,
    Unknown,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Auth => "authentication failed",
            ProviderErrorKind::Billing => "billing or quota problem",
            ProviderErrorKind::RateLimit => "rate limited",
            ProviderErrorKind::NotFound => "not found",
            ProviderErrorKind::Timeout => "timed out",
            ProviderErrorKind::Network => "network error",
            ProviderErrorKind::ServerError => "provider server error",
            ProviderErrorKind::MalformedResponse => "malformed response",
            ProviderErrorKind::Unknown => "unexpected error",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone)]
#[error("{kind}{}: {message}", .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => ProviderErrorKind::Auth,
            402 => ProviderErrorKind::Billing,
            404 => ProviderErrorKind::NotFound,
            408 => ProviderErrorKind::Timeout,
            429 => ProviderErrorKind::RateLimit,
            500..=599 => ProviderErrorKind::ServerError,
            _ => ProviderErrorKind::Unknown,
        };

        Self {
            kind,
            status: Some(status),
            message: extract_message(body),
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else {
            ProviderErrorKind::Network
        };
        Self::new(kind, err.to_string())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedResponse, message)
    }
}

/// Pull `error.message` out of an OpenAI-style error body, falling back to
/// a truncated copy of the raw text.
fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
    }
    truncate(body, 300)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
