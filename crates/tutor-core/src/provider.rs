//! LLM Provider Strategy Pattern
//!
//! Defines a common interface for all LLM providers so the orchestrator works
//! with any backend without code changes. The set of vendors is closed
//! ([`ProviderKind`]); every vendor sits behind [`LlmProvider`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tutor_core::provider::LlmProvider;
//!
//! // Errors never escape `call`; they come back as answer text
//! let response = provider.call(&messages, system_prompt, &tools).await;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};
use crate::message::Message;
use crate::tool::{ToolCallRequest, ToolDefinition};

/// Known provider backends, in fallback priority order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "claude", alias = "anthropic")]
    Anthropic,
}

impl ProviderKind {
    /// Fixed priority order used by fallback selection
    pub const ALL: [Self; 2] = [Self::OpenAi, Self::Anthropic];

    /// Configuration name
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "claude",
        }
    }

    /// Name used in user-facing text
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Claude",
        }
    }

    /// Environment variable holding the credential
    pub const fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Anthropic => "claude-sonnet-4-20250514",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "claude" | "anthropic" => Ok(Self::Anthropic),
            other => Err(TutorError::Configuration(format!(
                "Unsupported provider: {other}. Available: openai, claude"
            ))),
        }
    }
}

/// Per-provider generation settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Which backend
    pub kind: ProviderKind,

    /// Model identifier (e.g., "gpt-4o", "claude-sonnet-4-20250514")
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature, 0.0 to 2.0
    pub temperature: f32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: kind.default_model().into(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TutorError::Validation(format!(
                "temperature must be between 0.0 and 2.0 (got {})",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(TutorError::Validation("max_tokens must be greater than 0".into()));
        }
        if self.model.trim().is_empty() {
            return Err(TutorError::Validation("model must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(TutorError::Validation("timeout must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// Normalized provider response
///
/// An empty `tool_calls` list means `text` is a final answer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated text (may be empty when only tools were requested)
    pub text: String,

    /// Requested tool invocations, in emission order
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Model that generated this response
    #[serde(default)]
    pub model: Option<String>,

    /// Token usage statistics (if available)
    #[serde(default)]
    pub usage: Option<TokenUsage>,

    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

impl ProviderResponse {
    /// A final answer with no tool requests
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_tool_calls(text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: text.into(),
            tool_calls,
            finish_reason: Some(FinishReason::ToolUse),
            ..Default::default()
        }
    }

    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// Strategy trait for LLM providers
///
/// Implement [`LlmProvider::complete`] with typed errors; the provided
/// [`LlmProvider::call`] turns any failure into a conversational answer.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Name used in user-facing text (e.g., "OpenAI")
    fn name(&self) -> &str;

    /// Model identifier sent with each request
    fn model(&self) -> &str;

    /// True when the credential is present and the client initialized
    fn is_available(&self) -> bool;

    /// Send one request and normalize the response
    async fn complete(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ProviderResponse>;

    /// Like `complete`, but failures become a final answer explaining them
    async fn call(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> ProviderResponse {
        if !self.is_available() {
            let err = TutorError::ProviderUnavailable(self.name().to_string());
            return ProviderResponse::text(err.user_message(self.name()));
        }

        match self.complete(messages, system_prompt, tools).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(provider = %self.name(), error = %e, "Provider call failed");
                let mut response = ProviderResponse::text(e.user_message(self.name()));
                response.finish_reason = Some(FinishReason::Error);
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider {
        available: bool,
    }

    #[async_trait]
    impl LlmProvider for FailingProvider {
        fn name(&self) -> &str {
            "OpenAI"
        }

        fn model(&self) -> &str {
            "gpt-test"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _system_prompt: &str,
            _tools: &[ToolDefinition],
        ) -> Result<ProviderResponse> {
            Err(TutorError::Authentication(
                "Please check your OPENAI_API_KEY environment variable.".into(),
            ))
        }
    }

    #[test]
    fn test_provider_config_validation() {
        let mut config = ProviderConfig::new(ProviderKind::OpenAi);
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "gpt-3.5-turbo");

        config.temperature = 2.5;
        assert!(matches!(config.validate(), Err(TutorError::Validation(_))));

        config.temperature = 0.0;
        config.max_tokens = 0;
        assert!(matches!(config.validate(), Err(TutorError::Validation(_))));
    }

    #[test]
    fn test_provider_kind_names() {
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!(" OpenAI ".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("ollama".parse::<ProviderKind>().is_err());
        assert_eq!(serde_json::to_string(&ProviderKind::Anthropic).unwrap(), "\"claude\"");
    }

    #[tokio::test]
    async fn test_call_turns_errors_into_answers() {
        let provider = FailingProvider { available: true };
        let response = provider.call(&[Message::user("hi")], "sys", &[]).await;
        assert!(response.is_final());
        assert!(response.text.starts_with("I need a valid OpenAI API key."));
        assert_eq!(response.finish_reason, Some(FinishReason::Error));

        let offline = FailingProvider { available: false };
        let response = offline.call(&[], "sys", &[]).await;
        assert_eq!(
            response.text,
            "OpenAI client not available. Please check your API key."
        );
    }
}
