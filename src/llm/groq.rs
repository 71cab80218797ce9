//! Groq API client (OpenAI-compatible chat completions)
//!
//! One client per candidate model, each with a long-lived reqwest::Client.
//! Transport failures are rendered into descriptive messages so the
//! retry classifier can tell timeouts and rate limits from fatal errors.

use crate::config::ClientParams;
use crate::error::ResearchError;
use crate::llm::{
    BackendFactory, ChatMessage, ChatModel, ChatRequest, ChatResponse, ChatRole, ToolCall,
    ToolDefinition,
};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const TRANSPORT_RETRY_STEP: Duration = Duration::from_millis(500);

pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    params: ClientParams,
}

impl GroqClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        params: ClientParams,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ResearchError::ConfigError(
                "GROQ_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(params.request_timeout)
            .connect_timeout(params.connect_timeout)
            .build()
            .map_err(|e| ResearchError::LlmError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            params,
        })
    }

    fn build_request(&self, request: &ChatRequest) -> GroqRequest {
        let tools: Vec<GroqTool> = request.tools.iter().map(GroqTool::from).collect();
        let tool_choice = if tools.is_empty() { None } else { Some("auto") };

        GroqRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(GroqMessage::from).collect(),
            temperature: self.params.temperature,
            tools,
            tool_choice,
        }
    }

    async fn send(&self, body: &GroqRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut retries = 0;

        loop {
            match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && retries < self.params.max_retries => {
                    retries += 1;
                    warn!(
                        model = %self.model,
                        retry = retries,
                        error = %e,
                        "Groq connect failed, retrying transport"
                    );
                    tokio::time::sleep(TRANSPORT_RETRY_STEP * retries).await;
                }
                Err(e) => {
                    error!(model = %self.model, error = %e, "Groq request failed");
                    return Err(describe_transport_error(&e));
                }
            }
        }
    }
}

#[async_trait]
impl ChatModel for GroqClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = self.build_request(request);

        debug!(
            model = %self.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Calling Groq API"
        );

        let response = self.send(&body).await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(model = %self.model, %status, "Groq API error response: {}", error_text);
            return Err(describe_status(status, &error_text));
        }

        let groq_response: GroqResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Groq response: {}", e);
            ResearchError::LlmError(format!("Groq parse error: {}", e))
        })?;

        groq_response.into_chat_response()
    }
}

/// Builds one [`GroqClient`] per candidate model
pub struct GroqBackendFactory {
    api_key: String,
    base_url: String,
}

impl GroqBackendFactory {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

impl BackendFactory for GroqBackendFactory {
    fn build(&self, model_id: &str, params: &ClientParams) -> Result<Arc<dyn ChatModel>> {
        let client = GroqClient::new(
            self.api_key.clone(),
            self.base_url.clone(),
            model_id,
            params.clone(),
        )?;
        Ok(Arc::new(client))
    }
}

fn describe_transport_error(e: &reqwest::Error) -> ResearchError {
    let message = if e.is_timeout() {
        format!("request timeout: {}", e)
    } else if e.is_connect() {
        format!("connection error: {}", e)
    } else {
        format!("request failed: {}", e)
    };
    ResearchError::LlmError(message)
}

fn describe_status(status: StatusCode, body: &str) -> ResearchError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ResearchError::LlmError(format!("rate limit exceeded: {}", body))
    } else {
        ResearchError::LlmError(format!("HTTP {}: {}", status.as_u16(), body))
    }
}

//
// ================= Wire Types =================
//

#[derive(Debug, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GroqTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroqMessage {
    role: ChatRole,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<GroqToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for GroqMessage {
    fn from(message: &ChatMessage) -> Self {
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(message.tool_calls.iter().map(GroqToolCall::from).collect())
        };

        Self {
            role: message.role,
            content: message.content.clone(),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GroqToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: GroqFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct GroqFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl From<&ToolCall> for GroqToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: function_kind(),
            function: GroqFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct GroqTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: GroqFunctionDef,
}

#[derive(Debug, Serialize)]
struct GroqFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for GroqTool {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: GroqFunctionDef {
                name: def.name.clone(),
                description: def.description.clone(),
                parameters: def.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: GroqMessage,
}

impl GroqResponse {
    fn into_chat_response(self) -> Result<ChatResponse> {
        let choice = self.choices.into_iter().next().ok_or_else(|| {
            ResearchError::LlmError("No choices in Groq response".to_string())
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ErrorClass, ErrorClassifier};
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};

    fn client(base_url: &str) -> GroqClient {
        GroqClient::new("gsk_test", base_url, "llama3-8b-8192", ClientParams::default()).unwrap()
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_request_serialization() {
        let groq = client("http://localhost");
        let request = ChatRequest::new(vec![
            ChatMessage::system("You are a researcher"),
            ChatMessage::user("Compare Next.js and SvelteKit"),
        ])
        .with_tools(vec![ToolDefinition {
            name: "web_search".to_string(),
            description: "Search the web".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }]);

        let json = serde_json::to_value(groq.build_request(&request)).unwrap();
        assert_eq!(json["model"], "llama3-8b-8192");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Compare Next.js and SvelteKit");
        assert_eq!(json["tools"][0]["function"]["name"], "web_search");
        assert_eq!(json["tool_choice"], "auto");
    }

    #[test]
    fn test_plain_request_omits_tools() {
        let groq = client("http://localhost");
        let request = ChatRequest::new(vec![ChatMessage::user("Hello")]);

        let json = serde_json::to_value(groq.build_request(&request)).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
    }

    #[test]
    fn test_response_with_tool_calls() {
        let raw = serde_json::json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "wikipedia", "arguments": "{\"query\":\"SvelteKit\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });

        let response: GroqResponse = serde_json::from_value(raw).unwrap();
        let chat = response.into_chat_response().unwrap();
        assert!(chat.content.is_none());
        assert_eq!(chat.tool_calls.len(), 1);
        assert_eq!(chat.tool_calls[0].name, "wikipedia");
    }

    #[test]
    fn test_missing_api_key() {
        let result = GroqClient::new("", "http://localhost", "m", ClientParams::default());
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("GROQ_API_KEY"));
    }

    #[tokio::test]
    async fn test_chat_against_local_server() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Hi there" } }]
                }))
            }),
        );
        let base_url = serve(router).await;

        let answer = client(&base_url).invoke("Hello").await.unwrap();
        assert_eq!(answer, "Hi there");
    }

    #[tokio::test]
    async fn test_status_errors_classify() {
        let router = Router::new()
            .route(
                "/limited/chat/completions",
                post(|| async { (AxumStatus::TOO_MANY_REQUESTS, "slow down") }),
            )
            .route(
                "/down/chat/completions",
                post(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "no healthy upstream") }),
            );
        let base_url = serve(router).await;

        let err = client(&format!("{}/limited", base_url))
            .invoke("Hello")
            .await
            .unwrap_err();
        assert_eq!(ErrorClassifier::classify(&err.to_string()), ErrorClass::RateLimit);

        let err = client(&format!("{}/down", base_url))
            .invoke("Hello")
            .await
            .unwrap_err();
        assert_eq!(
            ErrorClassifier::classify(&err.to_string()),
            ErrorClass::UpstreamUnavailable
        );
    }
}
