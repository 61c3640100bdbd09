//! OpenAI-compatible chat-completions adapter for [`LlmClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use resetline_core::config::LlmConfig;
use resetline_core::{ApplicationError, IntegrationError, ToolCallRequest};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmClient, Role, ToolChoice,
    ToolDefinition,
};

/// Builds a reqwest client carrying bearer auth and the configured timeout.
/// A missing API key is an initialization failure, never a per-call error.
pub fn authorized_http_client(config: &LlmConfig) -> Result<reqwest::Client, ApplicationError> {
    let api_key = config
        .api_key
        .as_ref()
        .map(|key| key.expose_secret().trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ApplicationError::Configuration(
                "llm.api_key is required (set RESETLINE_LLM_API_KEY or OPENAI_API_KEY)"
                    .to_string(),
            )
        })?;

    let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
        ApplicationError::Configuration("llm.api_key contains invalid header characters".into())
    })?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|error| ApplicationError::Configuration(format!("http client: {error}")))
}

pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub fn map_transport_error(error: reqwest::Error) -> IntegrationError {
    if error.is_timeout() {
        IntegrationError::Timeout
    } else if error.is_decode() {
        IntegrationError::MalformedResponse(error.to_string())
    } else {
        IntegrationError::Transport(error.to_string())
    }
}

/// Turns a non-2xx response into [`IntegrationError::Status`].
pub async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(IntegrationError::Status { status: status.as_u16(), body })
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ApplicationError> {
        Ok(Self { http: authorized_http_client(config)?, base_url: config.base_url.clone() })
    }

    fn chat_url(&self) -> String {
        endpoint(&self.base_url, "chat/completions")
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, IntegrationError> {
        let wire_request = ChatCompletionRequest::from(request);
        let response = self
            .http
            .post(self.chat_url())
            .json(&wire_request)
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = ensure_success(response).await?;

        let text = response.text().await.map_err(map_transport_error)?;
        debug!(event_name = "agent.llm.response_received", bytes = text.len());

        let decoded = serde_json::from_str::<ChatCompletionResponse>(&text)
            .map_err(|error| IntegrationError::MalformedResponse(error.to_string()))?;
        CompletionResponse::try_from(decoded)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct WireMessage {
    role: Role,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self { role: message.role, content: message.content.clone() }
    }
}

#[derive(Clone, Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    r#type: &'static str,
    function: WireFunctionDefinition,
}

#[derive(Clone, Debug, Serialize)]
struct WireFunctionDefinition {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for WireTool {
    fn from(definition: &ToolDefinition) -> Self {
        Self {
            r#type: "function",
            function: WireFunctionDefinition {
                name: definition.name.clone(),
                description: definition.description.clone(),
                parameters: definition.parameters.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

impl From<&CompletionRequest> for ChatCompletionRequest {
    fn from(request: &CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(WireMessage {
                role: Role::System,
                content: request.system_prompt.clone(),
            });
        }
        messages.extend(request.messages.iter().map(WireMessage::from));

        let tools = request.tools.iter().map(WireTool::from).collect::<Vec<_>>();
        // tool_choice is only valid alongside a tools array
        let tool_choice = (!tools.is_empty()).then_some(request.tool_choice);

        Self {
            model: request.model.clone(),
            temperature: request.temperature,
            messages,
            tools,
            tool_choice,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Option<serde_json::Value>,
}

impl WireFunctionCall {
    /// Arguments as a JSON string. Non-string payloads are re-encoded and null becomes empty.
    fn arguments_json(&self) -> String {
        match &self.arguments {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(raw)) => raw.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunctionCall,
}

#[derive(Clone, Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Clone, Debug, Deserialize)]
struct ChatCompletionChoice {
    message: WireResponseMessage,
}

#[derive(Clone, Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

impl TryFrom<ChatCompletionResponse> for CompletionResponse {
    type Error = IntegrationError;

    fn try_from(response: ChatCompletionResponse) -> Result<Self, Self::Error> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            IntegrationError::MalformedResponse("response contained no choices".to_string())
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                arguments_json: call.function.arguments_json(),
                id: call.id,
                function_name: call.function.name,
            })
            .collect();

        Ok(Self { content: choice.message.content, tool_calls })
    }
}
