//! Error Types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool arguments failed schema validation
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed upstream
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Tool did not answer within its deadline
    #[error("Tool timed out: {0}")]
    ToolTimeout(String),

    /// Conversation invariant violated (orphaned or unknown tool call ids)
    #[error("Conversation error: {0}")]
    Conversation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }

    /// Tool failure kind this error becomes when folded into a tool result
    pub const fn tool_failure_kind(&self) -> ToolFailureKind {
        match self {
            Self::ToolValidation(_) => ToolFailureKind::InvalidArguments,
            Self::ToolTimeout(_) => ToolFailureKind::Timeout,
            _ => ToolFailureKind::Upstream,
        }
    }
}

/// Failure kinds a tool invocation can report back to the model.
///
/// These never abort the orchestration loop; they travel as data inside
/// [`ToolResult`](crate::tool::ToolResult).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    /// No tool with the requested name is registered
    UnknownTool,
    /// Required argument missing or of the wrong shape
    InvalidArguments,
    /// The tool did not answer in time
    Timeout,
    /// The upstream service behind the tool failed
    Upstream,
}

impl std::fmt::Display for ToolFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidArguments => "invalid_arguments",
            Self::Timeout => "timeout",
            Self::Upstream => "upstream",
        };
        f.write_str(s)
    }
}

/// Fatal errors surfaced by a model gateway to the orchestration loop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Backend unreachable or refusing requests; retryable with backoff
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Backend answered with something that is neither text nor well-formed tool calls
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelUnavailable(_))
    }
}

impl From<AgentError> for GatewayError {
    fn from(err: AgentError) -> Self {
        if err.is_retryable() {
            Self::ModelUnavailable(err.to_string())
        } else {
            Self::MalformedResponse(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            AgentError::ToolTimeout("x".into()).tool_failure_kind(),
            ToolFailureKind::Timeout
        );
        assert_eq!(
            AgentError::ToolValidation("x".into()).tool_failure_kind(),
            ToolFailureKind::InvalidArguments
        );
        assert_eq!(
            AgentError::ToolExecution("x".into()).tool_failure_kind(),
            ToolFailureKind::Upstream
        );
    }

    #[test]
    fn test_gateway_classification() {
        let err: GatewayError = AgentError::ProviderUnavailable("down".into()).into();
        assert!(err.is_retryable());

        let err: GatewayError = AgentError::Provider("garbage".into()).into();
        assert!(matches!(err, GatewayError::MalformedResponse(_)));

        let err: GatewayError = AgentError::Config("bad".into()).into();
        assert!(!err.is_retryable());
    }
}
