//! Error Types for Travel Tools

use agent_core::AgentError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TravelError>;

#[derive(Error, Debug)]
pub enum TravelError {
    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("No results for '{0}'")]
    NotFound(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<TravelError> for AgentError {
    fn from(err: TravelError) -> Self {
        match err {
            TravelError::InvalidInput(_) | TravelError::UnsupportedCurrency(_) => {
                Self::ToolValidation(err.to_string())
            }
            TravelError::Network(ref e) if e.is_timeout() => Self::ToolTimeout(err.to_string()),
            _ => Self::ToolExecution(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ToolFailureKind;

    #[test]
    fn test_failure_kinds() {
        let invalid: AgentError = TravelError::UnsupportedCurrency("XYZ".into()).into();
        assert_eq!(invalid.tool_failure_kind(), ToolFailureKind::InvalidArguments);

        let upstream: AgentError = TravelError::Upstream {
            service: "OpenWeatherMap",
            status: 503,
            message: "busy".into(),
        }
        .into();
        assert_eq!(upstream.tool_failure_kind(), ToolFailureKind::Upstream);
        assert!(upstream.to_string().contains("OpenWeatherMap returned 503"));
    }
}
