//! Error types for colloquy operations

use thiserror::Error;

use crate::llm::ProviderError;

/// Main error type for colloquy operations
#[derive(Error, Debug)]
pub enum ColloquyError {
    /// No tool registered under the requested name
    #[error("Tool '{0}' not found in registry")]
    ToolNotFound(String),

    /// Arguments do not satisfy the tool's declared parameter schema
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The tool's own action failed
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Session not found
    #[error("Session {0} not found")]
    SessionNotFound(String),

    /// A message violates the role/field invariants
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Upstream model call failed
    #[error("Model provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model kept requesting tools past the configured round limit
    #[error("Tool loop exceeded {0} rounds without a final answer")]
    ToolLoopExceeded(usize),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ColloquyError {
    fn from(err: serde_json::Error) -> Self {
        ColloquyError::Serialization(err.to_string())
    }
}

/// Result type alias for colloquy operations
pub type ColloquyResult<T> = Result<T, ColloquyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ColloquyError::ToolNotFound("unknown_tool".to_string());
        assert_eq!(err.to_string(), "Tool 'unknown_tool' not found in registry");

        let err = ColloquyError::SessionNotFound("abc".to_string());
        assert_eq!(err.to_string(), "Session abc not found");

        let err = ColloquyError::InvalidArguments {
            tool: "get_weather".to_string(),
            reason: "missing required property 'location'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid arguments for tool 'get_weather': missing required property 'location'"
        );
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: ColloquyError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, ColloquyError::Serialization(_)));
    }
}
