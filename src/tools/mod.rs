//! Tool trait and tool set
//!
//! Tools are external lookups (web, encyclopedia, papers) the model may
//! call during the tool-augmented execution path. Every tool takes a
//! single query string and returns text.

use crate::classifier::{ErrorClass, ErrorClassifier};
use crate::error::ResearchError;
use crate::llm::ToolDefinition;
use crate::models::AgentRole;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod search;

pub use search::{ArxivSearch, TavilySearch, WikipediaSearch};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Function backing a descriptor-defined tool
pub type ToolFn = Arc<dyn Fn(String) -> BoxFuture<Result<String>> + Send + Sync>;

/// Trait for a single tool
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn call(&self, query: &str) -> Result<String>;
}

/// A tool given as plain data: name, description and a function
#[derive(Clone)]
pub struct DescriptorTool {
    pub name: String,
    pub description: String,
    pub func: ToolFn,
}

impl DescriptorTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            func: Arc::new(move |query| Box::pin(func(query))),
        }
    }
}

#[async_trait]
impl Tool for DescriptorTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, query: &str) -> Result<String> {
        (self.func)(query.to_string()).await
    }
}

/// The two accepted tool shapes, resolved once when an agent is built
#[derive(Clone)]
pub enum ToolSpec {
    Native(Arc<dyn Tool>),
    Descriptor(DescriptorTool),
}

impl ToolSpec {
    fn into_tool(self) -> Arc<dyn Tool> {
        match self {
            ToolSpec::Native(tool) => tool,
            ToolSpec::Descriptor(descriptor) => Arc::new(descriptor),
        }
    }
}

/// Validated, ordered set of tools bound to one agent
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate every spec. A malformed spec fails the whole set.
    pub fn resolve(specs: Vec<ToolSpec>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(specs.len());
        let mut tools = Vec::with_capacity(specs.len());

        for spec in specs {
            let tool = spec.into_tool();
            let name = tool.name().to_string();

            if !is_valid_tool_name(&name) {
                return Err(ResearchError::InvalidToolSpec(format!(
                    "tool name '{}' must be non-empty and use only [A-Za-z0-9_-]",
                    name
                )));
            }

            if tool.description().trim().is_empty() {
                return Err(ResearchError::InvalidToolSpec(format!(
                    "tool '{}' has an empty description",
                    name
                )));
            }

            if !seen.insert(name.clone()) {
                return Err(ResearchError::InvalidToolSpec(format!(
                    "duplicate tool name '{}'",
                    name
                )));
            }

            tools.push(tool);
        }

        Ok(Self { tools })
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function definitions advertised to the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query"
                        }
                    },
                    "required": ["query"]
                }),
            })
            .collect()
    }
}

fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

//
// ================= Safe Search Wrapper =================
//

/// Retries a search tool on transient failures and turns any remaining
/// failure into text the model can read instead of an error.
pub struct SafeSearch<T: Tool> {
    inner: T,
    label: &'static str,
    max_attempts: u32,
    retry_delay: Duration,
    rate_limit_delay: Duration,
}

impl<T: Tool> SafeSearch<T> {
    pub fn new(inner: T, label: &'static str) -> Self {
        Self {
            inner,
            label,
            max_attempts: 2,
            retry_delay: Duration::from_secs(2),
            rate_limit_delay: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl<T: Tool> Tool for SafeSearch<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    async fn call(&self, query: &str) -> Result<String> {
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }

            let error = match self.inner.call(query).await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if attempt + 1 < self.max_attempts {
                match ErrorClassifier::classify(&error.to_string()) {
                    ErrorClass::Connection => {
                        warn!(tool = self.label, error = %error, "Search connection issue, retrying");
                        continue;
                    }
                    ErrorClass::RateLimit => {
                        warn!(tool = self.label, error = %error, "Search rate limited, waiting");
                        tokio::time::sleep(self.rate_limit_delay).await;
                        continue;
                    }
                    _ => {}
                }
            }

            return Ok(format!("{} search failed: {}", self.label, error));
        }

        Ok(format!(
            "{} search failed after {} attempts",
            self.label, self.max_attempts
        ))
    }
}

//
// ================= HTTP Helpers =================
//

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .timeout(Duration::from_secs(30))
        .user_agent(concat!("research-pipeline/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ResearchError::ToolError(format!("Failed to build HTTP client: {}", e)))
}

/// Describe a transport failure so the classifier sees its cause
pub(crate) fn describe_http_error(tool: &str, e: &reqwest::Error) -> ResearchError {
    let message = if e.is_timeout() {
        format!("{} request timeout: {}", tool, e)
    } else if e.is_connect() {
        format!("{} connection error: {}", tool, e)
    } else {
        format!("{} request failed: {}", tool, e)
    };
    ResearchError::ToolError(message)
}

pub(crate) fn describe_status(tool: &str, status: StatusCode, body: &str) -> ResearchError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ResearchError::ToolError(format!("{} rate limit exceeded: {}", tool, body))
    } else {
        ResearchError::ToolError(format!("{} returned HTTP {}: {}", tool, status.as_u16(), body))
    }
}

/// Cut `text` to at most `max_chars` characters
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

//
// ================= Defaults =================
//

/// Default tools for a role: web search (when a key is present) and
/// encyclopedia for everyone, paper search for the researcher.
/// A tool that cannot be initialised is logged and left out.
pub fn default_tools(role: AgentRole, tavily_api_key: &str) -> Vec<ToolSpec> {
    let client = match http_client() {
        Ok(client) => client,
        Err(e) => {
            warn!(%role, error = %e, "Tool initialization failed");
            return Vec::new();
        }
    };

    let mut specs: Vec<ToolSpec> = Vec::new();

    if tavily_api_key.trim().is_empty() {
        warn!(%role, "TAVILY_API_KEY not found, web search disabled");
    } else {
        let tavily = TavilySearch::new(client.clone(), tavily_api_key);
        specs.push(ToolSpec::Native(Arc::new(SafeSearch::new(tavily, "Tavily"))));
    }

    let wikipedia = WikipediaSearch::new(client.clone());
    specs.push(ToolSpec::Native(Arc::new(SafeSearch::new(wikipedia, "Wikipedia"))));

    if role == AgentRole::Researcher {
        let arxiv = ArxivSearch::new(client);
        specs.push(ToolSpec::Native(Arc::new(SafeSearch::new(arxiv, "ArXiv"))));
    }

    info!(%role, tools = specs.len(), "Initialized tools");
    specs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given message for the first `failures` calls
    struct FlakyTool {
        failures: u32,
        message: &'static str,
        calls: AtomicU32,
    }

    impl FlakyTool {
        fn new(failures: u32, message: &'static str) -> Self {
            Self {
                failures,
                message,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Tool for FlakyTool {
        fn name(&self) -> &str {
            "flaky"
        }

        fn description(&self) -> &str {
            "Fails a fixed number of times"
        }

        async fn call(&self, query: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ResearchError::ToolError(self.message.to_string()))
            } else {
                Ok(format!("results for {}", query))
            }
        }
    }

    fn echo_descriptor(name: &str, description: &str) -> ToolSpec {
        ToolSpec::Descriptor(DescriptorTool::new(name, description, |q| async move {
            Ok(format!("echo: {}", q))
        }))
    }

    #[tokio::test]
    async fn test_resolve_mixed_specs() {
        let native: Arc<dyn Tool> = Arc::new(FlakyTool::new(0, ""));
        let set = ToolSet::resolve(vec![
            ToolSpec::Native(native),
            echo_descriptor("echo", "Echo the query back"),
        ])
        .unwrap();

        assert_eq!(set.names(), vec!["flaky", "echo"]);
        let echo = set.get("echo").unwrap();
        assert_eq!(echo.call("rust").await.unwrap(), "echo: rust");
        assert!(set.get("missing").is_none());

        let defs = set.definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[1].parameters["required"][0], "query");
    }

    #[test]
    fn test_resolve_rejects_bad_specs() {
        let empty_name = ToolSet::resolve(vec![echo_descriptor("", "desc")]);
        assert!(matches!(empty_name, Err(ResearchError::InvalidToolSpec(_))));

        let bad_chars = ToolSet::resolve(vec![echo_descriptor("web search", "desc")]);
        assert!(matches!(bad_chars, Err(ResearchError::InvalidToolSpec(_))));

        let no_description = ToolSet::resolve(vec![echo_descriptor("echo", "  ")]);
        assert!(matches!(no_description, Err(ResearchError::InvalidToolSpec(_))));

        let duplicate = ToolSet::resolve(vec![
            echo_descriptor("echo", "first"),
            echo_descriptor("echo", "second"),
        ]);
        assert!(matches!(duplicate, Err(ResearchError::InvalidToolSpec(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_safe_search_retries_connection_errors() {
        let safe = SafeSearch::new(FlakyTool::new(1, "connection reset"), "Flaky");
        let result = safe.call("sveltekit").await.unwrap();
        assert_eq!(result, "results for sveltekit");
        assert_eq!(safe.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safe_search_reports_failure_as_text() {
        let safe = SafeSearch::new(FlakyTool::new(5, "connection reset"), "Flaky");
        let result = safe.call("sveltekit").await.unwrap();
        assert_eq!(result, "Flaky search failed: Tool error: connection reset");
        assert_eq!(safe.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_safe_search_does_not_retry_fatal_errors() {
        let safe = SafeSearch::new(FlakyTool::new(5, "invalid api key"), "Flaky");
        let result = safe.call("sveltekit").await.unwrap();
        assert!(result.starts_with("Flaky search failed"));
        assert_eq!(safe.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn test_default_tools_per_role() {
        let researcher = ToolSet::resolve(default_tools(AgentRole::Researcher, "tvly_key")).unwrap();
        assert_eq!(researcher.names(), vec!["web_search", "wikipedia", "arxiv"]);

        let critic = ToolSet::resolve(default_tools(AgentRole::Critic, "tvly_key")).unwrap();
        assert_eq!(critic.names(), vec!["web_search", "wikipedia"]);

        let no_key = ToolSet::resolve(default_tools(AgentRole::Synthesizer, "")).unwrap();
        assert_eq!(no_key.names(), vec!["wikipedia"]);
    }
}
