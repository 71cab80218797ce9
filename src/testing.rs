//! Test doubles shared by unit tests

use crate::agent::ResearchAgent;
use crate::claims::{ClaimStore, InMemoryClaimStore};
use crate::config::{ClientParams, RetryPolicy};
use crate::error::ResearchError;
use crate::execution::AugmentedExecutor;
use crate::llm::selector::PROBE_PROMPT;
use crate::llm::{BackendBinding, BackendFactory, ChatModel, ChatRequest, ChatResponse, ModelSelector, ToolCall};
use crate::models::{AgentRole, Claim, VerificationReport};
use crate::pipeline::PipelineOrchestrator;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

/// Model that replays a queue of responses, then echoes the last prompt.
/// Liveness probes are answered without touching the script or the log.
pub struct ScriptedModel {
    id: String,
    script: Mutex<VecDeque<Result<ChatResponse>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<ChatResponse>>) -> Self {
        Self {
            id: "scripted-model".to_string(),
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Model that always fails with `message`
    pub fn failing(message: &str, times: usize) -> Self {
        Self::new(
            (0..times)
                .map(|_| Err(ResearchError::LlmError(message.to_string())))
                .collect(),
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        if is_probe(request) {
            return Ok(ChatResponse::text("Hello!"));
        }

        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                let prompt = request
                    .messages
                    .last()
                    .and_then(|m| m.content.clone())
                    .unwrap_or_default();
                Ok(ChatResponse::text(format!("echo: {}", prompt)))
            }
        }
    }
}

fn is_probe(request: &ChatRequest) -> bool {
    request.tools.is_empty()
        && request.messages.len() == 1
        && request.messages[0].content.as_deref() == Some(PROBE_PROMPT)
}

/// Factory that hands out the same model for every candidate
pub struct StaticFactory {
    model: Arc<ScriptedModel>,
}

impl BackendFactory for StaticFactory {
    fn build(&self, _model_id: &str, _params: &ClientParams) -> Result<Arc<dyn ChatModel>> {
        Ok(self.model.clone())
    }
}

/// Bind `model` to `role` through the real selector
pub async fn bind(role: AgentRole, model: Arc<ScriptedModel>) -> BackendBinding {
    ModelSelector::new(Arc::new(StaticFactory { model }), ClientParams::default())
        .select(role, &["scripted-model".to_string()])
        .await
        .unwrap()
}

type ExecFn = dyn Fn(u32, &str) -> Result<String> + Send + Sync;

/// Tool-augmented path driven by a closure over (call index, input)
pub struct FnExecutor {
    calls: AtomicU32,
    inputs: Mutex<Vec<String>>,
    f: Box<ExecFn>,
}

impl FnExecutor {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(u32, &str) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            calls: AtomicU32::new(0),
            inputs: Mutex::new(Vec::new()),
            f: Box::new(f),
        }
    }

    /// Fails every call with `message`
    pub fn always_failing(message: &'static str) -> Self {
        Self::new(move |_, _| Err(ResearchError::LlmError(message.to_string())))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl AugmentedExecutor for FnExecutor {
    async fn execute(&self, input: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(input.to_string());
        (self.f)(n, input)
    }
}

/// In-memory store that counts insert calls
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryClaimStore,
    inserts: AtomicU32,
    fail_inserts: bool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_inserts: true,
            ..Self::default()
        }
    }

    pub fn inserts(&self) -> u32 {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClaimStore for CountingStore {
    async fn insert(&self, claims: &[String], source: &str) -> Result<()> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts {
            return Err(ResearchError::DatabaseError("disk I/O error".to_string()));
        }
        self.inner.insert(claims, source).await
    }

    async fn report(&self) -> Result<VerificationReport> {
        self.inner.report().await
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<Claim>> {
        self.inner.list_recent(limit).await
    }
}

async fn scripted_agent(
    role: AgentRole,
    output: &'static str,
    claims: Option<Arc<dyn ClaimStore>>,
) -> ResearchAgent {
    let model = Arc::new(ScriptedModel::new(vec![]));
    ResearchAgent::new(
        bind(role, model).await,
        Arc::new(FnExecutor::new(move |_, _| Ok(output.to_string()))),
        RetryPolicy::default(),
        claims,
    )
}

/// Pipeline whose stages all succeed with fixed text
pub async fn scripted_pipeline(
    store: Arc<dyn ClaimStore>,
    research: &'static str,
) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        scripted_agent(AgentRole::Researcher, research, Some(store.clone())).await,
        scripted_agent(AgentRole::Critic, "- Claims need sources", None).await,
        scripted_agent(AgentRole::Synthesizer, "# Summary", None).await,
        store,
    )
    .unwrap()
}
