//! OpenAI Chat Completions Provider
//!
//! Implementation of `LlmProvider` for `POST {base}/v1/chat/completions`
//! with native function calling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tutor_core::{
    error::{Result, TutorError},
    message::{Message, Role},
    provider::{FinishReason, LlmProvider, ProviderConfig, ProviderKind, ProviderResponse, TokenUsage},
    tool::{ToolCallRequest, ToolDefinition},
};

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionSpec,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded argument object
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

// ============================================================================
// Provider
// ============================================================================

/// OpenAI LLM provider
pub struct OpenAiProvider {
    client: Option<Client>,
    api_key: Option<String>,
    base_url: String,
    config: ProviderConfig,
}

impl OpenAiProvider {
    /// Create a provider; a missing key makes it unavailable, not an error
    pub fn new(config: ProviderConfig, api_key: Option<String>) -> Self {
        Self {
            client: http::build_client(ProviderKind::OpenAi, config.timeout_secs),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            config,
        }
    }

    /// Point at a compatible endpoint instead of api.openai.com
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request<'a>(
        &'a self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> ChatCompletionRequest<'a> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system_prompt.is_empty() {
            wire.push(WireMessage {
                role: "system",
                content: Some(system_prompt.to_string()),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }
        wire.extend(messages.iter().map(convert_message));

        let tools: Vec<WireTool> = tools
            .iter()
            .map(|t| WireTool {
                kind: "function",
                function: WireFunctionSpec {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.json_schema(),
                },
            })
            .collect();
        let tool_choice = (!tools.is_empty()).then_some("auto");

        ChatCompletionRequest {
            model: &self.config.model,
            messages: wire,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools,
            tool_choice,
        }
    }

    fn convert_response(response: ChatCompletionResponse) -> Result<ProviderResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TutorError::Parse("No choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments = parse_arguments(&call.function.arguments);
                if call.id.is_empty() {
                    ToolCallRequest::with_generated_id(call.function.name, arguments)
                } else {
                    ToolCallRequest::new(call.id, call.function.name, arguments)
                }
            })
            .collect();

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            model: response.model,
            usage: response.usage,
            finish_reason: choice.finish_reason.as_deref().map(finish_reason),
        })
    }
}

fn convert_message(message: &Message) -> WireMessage {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let tool_calls: Vec<WireToolCall> = message
        .tool_calls
        .iter()
        .map(|call| WireToolCall {
            id: call.id.clone(),
            kind: function_type(),
            function: WireFunctionCall {
                name: call.name.clone(),
                arguments: match &call.arguments {
                    Value::String(raw) => raw.clone(),
                    Value::Null => "{}".into(),
                    other => other.to_string(),
                },
            },
        })
        .collect();

    // An assistant turn that only requests tools carries null content
    let content = if message.content.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(message.content.clone())
    };

    WireMessage {
        role,
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
    }
}

/// Decode argument text; undecodable text is kept as a JSON string
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "length" => FinishReason::Length,
        "tool_calls" | "function_call" => FinishReason::ToolUse,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        ProviderKind::OpenAi.display_name()
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_available(&self) -> bool {
        self.client.is_some() && self.api_key.is_some()
    }

    async fn complete(
        &self,
        messages: &[Message],
        system_prompt: &str,
        tools: &[ToolDefinition],
    ) -> Result<ProviderResponse> {
        let (Some(client), Some(api_key)) = (&self.client, &self.api_key) else {
            return Err(TutorError::ProviderUnavailable(self.name().into()));
        };

        let request = self.build_request(messages, system_prompt, tools);
        tracing::debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion"
        );

        let response = client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error(&e))?;

        let body: ChatCompletionResponse = http::decode(ProviderKind::OpenAi, response).await?;
        Self::convert_response(body)
    }
}
