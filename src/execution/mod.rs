//! Tool-augmented execution path
//!
//! A bounded tool-calling loop: the model either answers, or asks for
//! tools; tool results are fed back until it answers. The whole run is
//! one failable unit from the caller's point of view.

use crate::config::ExecutorLimits;
use crate::error::ResearchError;
use crate::llm::{ChatMessage, ChatModel, ChatRequest, ToolCall};
use crate::tools::ToolSet;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const NO_OUTPUT: &str = "No output generated";

/// The tool-augmented path as seen by the resilient caller
#[async_trait]
pub trait AugmentedExecutor: Send + Sync {
    async fn execute(&self, input: &str) -> Result<String>;
}

pub struct ToolCallingExecutor {
    model: Arc<dyn ChatModel>,
    tools: ToolSet,
    system_prompt: String,
    limits: ExecutorLimits,
}

impl ToolCallingExecutor {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: ToolSet,
        system_prompt: impl Into<String>,
        limits: ExecutorLimits,
    ) -> Self {
        Self {
            model,
            tools,
            system_prompt: system_prompt.into(),
            limits,
        }
    }

    async fn run_loop(&self, input: &str) -> Result<String> {
        let definitions = self.tools.definitions();
        let mut messages = vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(input),
        ];

        for iteration in 0..self.limits.max_iterations {
            let request = ChatRequest::new(messages.clone()).with_tools(definitions.clone());
            let response = self.model.chat(&request).await?;

            if response.tool_calls.is_empty() {
                let text = response.content.unwrap_or_default();
                debug!(iteration, "Executor produced final answer");
                return Ok(if text.trim().is_empty() {
                    NO_OUTPUT.to_string()
                } else {
                    text
                });
            }

            debug!(
                iteration,
                calls = response.tool_calls.len(),
                "Model requested tools"
            );

            messages.push(ChatMessage::assistant(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let observation = self.run_tool(call).await;
                messages.push(ChatMessage::tool_result(call.id.clone(), observation));
            }
        }

        Err(ResearchError::ExecutionError(format!(
            "agent stopped after {} iterations without a final answer",
            self.limits.max_iterations
        )))
    }

    /// Run one requested tool. Problems are reported back to the model as text.
    async fn run_tool(&self, call: &ToolCall) -> String {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Model requested unknown tool");
            return format!(
                "{} is not a valid tool, try one of [{}].",
                call.name,
                self.tools.names().join(", ")
            );
        };

        let query = match parse_query(&call.arguments) {
            Ok(query) => query,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Unusable tool arguments");
                return format!("Invalid arguments for {}: {}", call.name, e);
            }
        };

        match tool.call(&query).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                format!("{} failed: {}", call.name, e)
            }
        }
    }
}

#[async_trait]
impl AugmentedExecutor for ToolCallingExecutor {
    async fn execute(&self, input: &str) -> Result<String> {
        let limit = self.limits.max_execution_time;

        tokio::time::timeout(limit, self.run_loop(input))
            .await
            .map_err(|_| {
                ResearchError::ExecutionError(format!(
                    "tool execution timeout after {}s",
                    limit.as_secs()
                ))
            })?
    }
}

/// Pull the query string out of the model's JSON arguments
fn parse_query(arguments: &str) -> Result<String> {
    let trimmed = arguments.trim();
    if trimmed.is_empty() {
        return Err(ResearchError::InvalidToolInput("empty arguments".to_string()));
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        // Some models send the bare query instead of a JSON object
        Err(_) => return Ok(trimmed.to_string()),
    };

    let query = match &value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("query")
            .and_then(Value::as_str)
            .or_else(|| map.values().find_map(Value::as_str))
            .map(str::to_string),
        _ => None,
    };

    query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| {
            ResearchError::InvalidToolInput("expected a 'query' string argument".to_string())
        })
}
