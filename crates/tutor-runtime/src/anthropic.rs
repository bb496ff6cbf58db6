//! Anthropic Messages Provider
//!
//! Implementation of `LlmProvider` for `POST {base}/v1/messages`. The system
//! prompt travels as a top-level field, tool requests as `tool_use` blocks
//! and tool results as `tool_result` blocks inside a user message.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tutor_core::{
    error::{Result, TutorError},
    message::{Message, Role},
    provider::{FinishReason, LlmProvider, ProviderConfig, ProviderKind, ProviderResponse, TokenUsage},
    tool::{ToolCallRequest, ToolDefinition},
};

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block types this client does not use (thinking, images, ...)
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// ============================================================================
// Provider
// ============================================================================

/// Anthropic (Claude) LLM provider
pub struct AnthropicProvider {
    client: Option<Client>,
    api_key: Option<String>,
    base_url: String,
    config: ProviderConfig,
}

impl AnthropicProvider {
    /// Create a provider; a missing key makes it unavailable, not an error
    pub fn new(config: ProviderConfig, api_key: Option<String>) -> Self {
        Self {
            client: http::build_client(ProviderKind::Anthropic, config.timeout_secs),
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            config,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_request<'a>(
        &'a self,
        messages: &[Message],
        system_prompt: &'a str,
        tools: &[ToolDefinition],
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: system_prompt,
            messages: convert_messages(messages),
            tools: tools
                .iter()
                .map(|t| WireTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.json_schema(),
                })
                .collect(),
        }
    }

    fn convert_response(response: MessagesResponse) -> ProviderResponse {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text: part } => text.push_str(&part),
                ContentBlock::ToolUse { id, name, input } if id.is_empty() => {
                    tool_calls.push(ToolCallRequest::with_generated_id(name, input));
                }
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCallRequest::new(id, name, input));
                }
                ContentBlock::ToolResult { .. } | ContentBlock::Other => {}
            }
        }

        ProviderResponse {
            text,
            tool_calls,
            model: response.model,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            }),
            finish_reason: response.stop_reason.as_deref().map(finish_reason),
        }
    }
}

/// Map the conversation onto alternating user/assistant messages.
///
/// Consecutive tool results are merged into a single user message. System
/// messages are dropped; the system prompt is sent separately.
fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
    let mut wire: Vec<WireMessage> = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            Role::System => {}
            Role::User => wire.push(WireMessage {
                role: "user",
                content: vec![ContentBlock::Text {
                    text: message.content.clone(),
                }],
            }),
            Role::Assistant => {
                let mut content = Vec::with_capacity(message.tool_calls.len() + 1);
                if !message.content.is_empty() {
                    content.push(ContentBlock::Text {
                        text: message.content.clone(),
                    });
                }
                content.extend(message.tool_calls.iter().map(|call| ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: match &call.arguments {
                        Value::Object(_) => call.arguments.clone(),
                        _ => json!({}),
                    },
                }));
                if !content.is_empty() {
                    wire.push(WireMessage {
                        role: "assistant",
                        content,
                    });
                }
            }
            Role::Tool => {
                let block = ContentBlock::ToolResult {
                    tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                    content: message.content.clone(),
                };
                match wire.last_mut() {
                    Some(last) if is_tool_result_message(last) => last.content.push(block),
                    _ => wire.push(WireMessage {
                        role: "user",
                        content: vec![block],
                    }),
                }
            }
        }
    }

    wire
}

fn is_tool_result_message(message: &WireMessage) -> bool {
    message.role == "user"
        && message
            .content
            .iter()
            .all(|b| matches!(b, ContentBlock::ToolResult { .. }))
}

fn finish_reason(reason: &str) -> FinishReason {
    match reason {
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolUse,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        ProviderKind::Anthropic.display_name()
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
            "Sending messages request"
        );

        let response = client
            .post(self.endpoint())
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error(&e))?;

        let body: MessagesResponse = http::decode(ProviderKind::Anthropic, response).await?;
        Ok(Self::convert_response(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> AnthropicProvider {
        AnthropicProvider::new(ProviderConfig::new(ProviderKind::Anthropic), Some("sk-ant-test".into()))
            .with_base_url(server.uri())
    }

    #[test]
    fn test_request_shape_merges_tool_results() {
        let provider = AnthropicProvider::new(ProviderConfig::new(ProviderKind::Anthropic), None);
        let messages = vec![
            Message::user("what is in here?"),
            Message::assistant_tool_calls(
                "Let me look.",
                vec![
                    ToolCallRequest::new("tu_1", "list_files", json!({})),
                    ToolCallRequest::new("tu_2", "read_file", Value::String("{bad".into())),
                ],
            ),
            Message::tool("Contents of .:", "tu_1"),
            Message::tool("Error: Invalid JSON arguments for read_file", "tu_2"),
        ];
        let tools = vec![ToolDefinition {
            name: "list_files".into(),
            description: "List files".into(),
            parameters: Vec::new(),
        }];

        let body = serde_json::to_value(provider.build_request(&messages, "Be Socratic.", &tools)).unwrap();

        assert_eq!(body["system"], "Be Socratic.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"][0], json!({"type": "text", "text": "Let me look."}));
        assert_eq!(body["messages"][1]["content"][1]["type"], "tool_use");
        assert_eq!(body["messages"][1]["content"][2]["input"], json!({}));

        let results = &body["messages"][2];
        assert_eq!(results["role"], "user");
        assert_eq!(results["content"][0]["type"], "tool_result");
        assert_eq!(results["content"][0]["tool_use_id"], "tu_1");
        assert_eq!(results["content"][1]["tool_use_id"], "tu_2");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn test_empty_system_prompt_is_omitted() {
        let provider = AnthropicProvider::new(ProviderConfig::new(ProviderKind::Anthropic), None);
        let body = serde_json::to_value(provider.build_request(&[Message::user("hi")], "", &[])).unwrap();
        assert!(body.get("system").is_none());
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_tool_use_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-ant-test"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(json!({"model": "claude-sonnet-4-20250514", "system": "sys"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "model": "claude-sonnet-4-20250514",
                "content": [
                    {"type": "thinking", "thinking": "hmm", "signature": "x"},
                    {"type": "text", "text": "Checking "},
                    {"type": "text", "text": "the directory."},
                    {"type": "tool_use", "id": "toolu_1", "name": "list_files", "input": {"directory": "src"}}
                ],
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 10, "output_tokens": 4}
            })))
            .mount(&server)
            .await;

        let response = provider(&server)
            .complete(&[Message::user("list src")], "sys", &[])
            .await
            .unwrap();

        assert_eq!(response.text, "Checking the directory.");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "toolu_1");
        assert_eq!(response.tool_calls[0].str_argument("directory"), Some("src"));
        assert_eq!(response.finish_reason, Some(FinishReason::ToolUse));
        assert_eq!(response.usage.unwrap().total_tokens, 14);
    }

    #[tokio::test]
    async fn test_overloaded_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529).set_body_json(json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let err = provider(&server).complete(&[Message::user("hi")], "", &[]).await.unwrap_err();
        assert!(matches!(err, TutorError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_server_error_becomes_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "type": "error",
                "error": {"type": "api_error", "message": "Internal server error"}
            })))
            .mount(&server)
            .await;

        let answer = provider(&server).call(&[Message::user("hi")], "", &[]).await;
        assert_eq!(
            answer.text,
            "Claude error: 500 Internal Server Error: Internal server error"
        );
        assert_eq!(answer.finish_reason, Some(FinishReason::Error));
    }

    #[tokio::test]
    async fn test_auth_failure_names_env_var() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let answer = provider(&server).call(&[Message::user("hi")], "", &[]).await;
        assert_eq!(
            answer.text,
            "I need a valid Claude API key. Please check your ANTHROPIC_API_KEY environment variable."
        );
    }
}
