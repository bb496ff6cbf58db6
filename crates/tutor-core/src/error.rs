//! Error Types

use thiserror::Error;

/// Result type alias for tutor operations
pub type Result<T> = std::result::Result<T, TutorError>;

/// Tutor error types
#[derive(Error, Debug)]
pub enum TutorError {
    /// Invalid or missing settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No usable backend
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Network failure or timeout talking to a provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Bad or missing credential
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Provider backpressure
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Vendor API returned an error status
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool ran but failed (missing file, sandbox escape, ...)
    #[error("{0}")]
    ToolExecution(String),

    /// Malformed configuration value
    #[error("Validation error: {0}")]
    Validation(String),

    /// Undecodable provider response or transcript line
    #[error("Parse error: {0}")]
    Parse(String),

    /// Tool round cap reached
    #[error("Maximum tool rounds ({0}) reached")]
    MaxRounds(usize),

    /// Turn interrupted by the caller
    #[error("Turn cancelled")]
    Cancelled,

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TutorError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::RateLimited(_) | Self::Transport(_)
        )
    }

    /// Convert to the conversational reply shown in place of a model answer
    pub fn user_message(&self, provider: &str) -> String {
        match self {
            Self::ProviderUnavailable(_) => {
                format!("{provider} client not available. Please check your API key.")
            }
            Self::Authentication(hint) => {
                format!("I need a valid {provider} API key. {hint}")
            }
            Self::RateLimited(_) => {
                "I'm getting rate limited. Please wait a moment before trying again.".into()
            }
            Self::Transport(msg) => format!("{provider} error: could not reach the service ({msg})"),
            Self::Provider(msg) | Self::Parse(msg) => format!("{provider} error: {msg}"),
            Self::MaxRounds(max) => format!(
                "[error] Stopped after {max} rounds of tool calls without a final answer. Please try a more specific question."
            ),
            Self::Cancelled => "[error] The request was cancelled.".into(),
            other => format!("{provider} error: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let auth = TutorError::Authentication(
            "Please check your OPENAI_API_KEY environment variable.".into(),
        );
        assert_eq!(
            auth.user_message("OpenAI"),
            "I need a valid OpenAI API key. Please check your OPENAI_API_KEY environment variable."
        );

        let rate = TutorError::RateLimited("429".into());
        assert!(rate.user_message("Claude").contains("rate limited"));
        assert!(rate.is_retryable());

        let api = TutorError::Provider("500 Internal Server Error".into());
        assert!(api.user_message("Claude").starts_with("Claude error:"));
        assert!(!api.is_retryable());
    }
}
