//! OpenAI Provider Implementation
//!
//! Implements the `LLMProvider` trait for the Chat Completions API of OpenAI
//! or any compatible endpoint, handling message conversion, tool calls and
//! error classification.
//!
//! # Example
//!
//! ```rust,ignore
//! use aptoclaw::providers::{openai::OpenAIProvider, ChatOptions, LLMProvider};
//! use aptoclaw::session::Message;
//!
//! async fn example() {
//!     let provider = OpenAIProvider::new("your-api-key", "gpt-4-turbo");
//!
//!     let messages = vec![
//!         Message::system("You are a helpful agent."),
//!         Message::user("Hello!"),
//!     ];
//!
//!     let response = provider
//!         .chat(messages, vec![], None, ChatOptions::default())
//!         .await
//!         .unwrap();
//!
//!     println!("OpenAI: {}", response.content);
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result};
use crate::session::{Message, Role};

use super::{
    parse_provider_error, ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition,
    Usage,
};

/// The OpenAI API endpoint URL.
pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// OpenAI API Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest {
    id: String,
    r#type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: String,
    function: OpenAIFunctionDef,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// ============================================================================
// OpenAI API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallResponse {
    id: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
}

// ============================================================================
// OpenAI Provider
// ============================================================================

/// OpenAI-compatible chat-completions provider.
pub struct OpenAIProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl OpenAIProvider {
    /// Provider against the public OpenAI endpoint.
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_base_url(api_key, OPENAI_API_URL, model)
    }

    /// Provider against any OpenAI-compatible endpoint.
    pub fn with_base_url(api_key: &str, api_base: &str, model: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });
        Self::with_client(api_key, api_base, model, client)
    }

    pub fn with_client(api_key: &str, api_base: &str, model: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        }
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert AptoClaw messages to OpenAI API format.
fn convert_messages(messages: Vec<Message>) -> Vec<OpenAIMessage> {
    messages
        .into_iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            }
            .to_string();

            let tool_calls = msg.tool_calls.filter(|tcs| !tcs.is_empty()).map(|tcs| {
                tcs.into_iter()
                    .map(|tc| OpenAIToolCallRequest {
                        id: tc.id,
                        r#type: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: tc.name,
                            arguments: tc.arguments,
                        },
                    })
                    .collect()
            });

            OpenAIMessage {
                role,
                content: if msg.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(msg.content)
                },
                tool_calls,
                tool_call_id: msg.tool_call_id,
            }
        })
        .collect()
}

fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<OpenAITool> {
    tools
        .into_iter()
        .map(|t| OpenAITool {
            r#type: "function".to_string(),
            function: OpenAIFunctionDef {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            },
        })
        .collect()
}

fn convert_response(response: OpenAIResponse) -> LLMResponse {
    let (content, tool_calls) = match response.choices.into_iter().next() {
        Some(c) => {
            let content = c.message.content.unwrap_or_default();
            let tool_calls = c
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|tc| LLMToolCall::new(&tc.id, &tc.function.name, &tc.function.arguments))
                .collect::<Vec<_>>();
            (content, tool_calls)
        }
        None => (String::new(), Vec::new()),
    };

    let mut llm_response = if tool_calls.is_empty() {
        LLMResponse::text(&content)
    } else {
        LLMResponse::with_tools(&content, tool_calls)
    };

    if let Some(usage) = response.usage {
        llm_response =
            llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
    }

    llm_response
}

/// Classify an error body, preferring the API's own message.
fn classify_error(status: u16, body: &str) -> ProviderError {
    let detail = match serde_json::from_str::<OpenAIErrorResponse>(body) {
        Ok(parsed) => match parsed.error.r#type {
            Some(kind) => format!("{} - {}", kind, parsed.error.message),
            None => parsed.error.message,
        },
        Err(_) => body.to_string(),
    };
    match status {
        403 => ProviderError::Auth(detail),
        408 | 504 => ProviderError::Timeout(detail),
        _ => parse_provider_error(status, &detail),
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else if e.is_connect() {
        ProviderError::ServerError(format!("connection failed: {}", e))
    } else {
        ProviderError::Unknown(e.to_string())
    }
}

// ============================================================================
// LLMProvider Implementation
// ============================================================================

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.model);
        let openai_tools = if tools.is_empty() {
            None
        } else {
            Some(convert_tools(tools))
        };

        let request = OpenAIRequest {
            model: model.to_string(),
            messages: convert_messages(messages),
            tools: openai_tools,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
        };

        debug!(model = model, messages = request.messages.len(), "OpenAI request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &error_text).into());
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            ProviderError::Unknown(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let llm_response = convert_response(openai_response);
        info!(
            model = model,
            tool_calls = llm_response.tool_calls.len(),
            total_tokens = llm_response.usage.as_ref().map(|u| u.total_tokens),
            "OpenAI response received"
        );
        Ok(llm_response)
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ToolCall;

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAIProvider::new("test-key", "gpt-4-turbo");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), "gpt-4-turbo");
        assert_eq!(provider.api_base, "https://api.openai.com/v1");
    }

    #[test]
    fn test_openai_provider_with_base_url() {
        let provider =
            OpenAIProvider::with_base_url("test-key", "https://custom.api/v1/", "local-model");
        assert_eq!(provider.api_base, "https://custom.api/v1");
    }

    #[test]
    fn test_convert_messages_simple() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::user("Hello"),
            Message::assistant("Hi there!"),
        ];
        let converted = convert_messages(messages);

        assert_eq!(converted.len(), 3);
        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[1].content, Some("Hello".to_string()));
        assert_eq!(converted[2].role, "assistant");
    }

    #[test]
    fn test_convert_messages_with_tool_calls() {
        let tool_call = ToolCall::new("call_1", "aptos_get_balance", "{}");
        let messages = vec![
            Message::assistant_with_tools("", vec![tool_call]),
            Message::tool_result("call_1", r#"{"balance_apt":"1"}"#),
        ];
        let converted = convert_messages(messages);

        assert!(converted[0].content.is_none());
        let calls = converted[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "aptos_get_balance");
        assert_eq!(calls[0].r#type, "function");
        assert_eq!(converted[1].role, "tool");
        assert_eq!(converted[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_convert_tools() {
        let tools = vec![ToolDefinition::new(
            "aptos_transfer",
            "Send APT",
            serde_json::json!({"type": "object"}),
        )];
        let converted = convert_tools(tools);
        assert_eq!(converted[0].r#type, "function");
        assert_eq!(converted[0].function.name, "aptos_transfer");
    }

    #[test]
    fn test_convert_response_with_tool_calls() {
        let json = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "aptos_get_balance", "arguments": "{}"}
                    }]
                }
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let response: OpenAIResponse = serde_json::from_str(json).unwrap();
        let converted = convert_response(response);
        assert!(converted.content.is_empty());
        assert_eq!(converted.tool_calls[0].id, "call_abc");
        assert_eq!(converted.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_convert_response_empty_choices() {
        let response: OpenAIResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let converted = convert_response(response);
        assert!(converted.content.is_empty());
        assert!(!converted.has_tool_calls());
    }

    #[test]
    fn test_request_serialization_skips_unset() {
        let request = OpenAIRequest {
            model: "gpt-4-turbo".into(),
            messages: convert_messages(vec![Message::user("hi")]),
            tools: None,
            max_tokens: Some(100),
            temperature: None,
            top_p: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 100);
        assert!(json.get("tools").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_classify_error() {
        let body = r#"{"error": {"message": "Incorrect API key", "type": "invalid_request_error"}}"#;
        match classify_error(401, body) {
            ProviderError::Auth(msg) => assert!(msg.contains("Incorrect API key")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(classify_error(429, "slow down").is_retryable());
        assert!(classify_error(503, "").is_retryable());
        assert!(classify_error(504, "").is_retryable());
        assert!(!classify_error(400, "bad").is_retryable());
        assert!(matches!(classify_error(403, "no"), ProviderError::Auth(_)));
    }
}
