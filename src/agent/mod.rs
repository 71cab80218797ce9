//! Research agents
//!
//! An agent is one role bound to one backend model, wrapped in the
//! resilient caller. The researcher additionally feeds its successful
//! output into the shared claim store.

pub mod prompts;
pub mod resilient;

use crate::claims::{ClaimExtractor, ClaimStore};
use crate::config::{Config, RetryPolicy};
use crate::execution::{AugmentedExecutor, ToolCallingExecutor};
use crate::llm::{BackendBinding, BackendFactory, ModelSelector};
use crate::models::{AgentRole, CallResult};
use crate::tools::{default_tools, ToolSet};
use crate::Result;
use std::sync::Arc;
use tracing::{debug, warn};

pub use resilient::{
    decide, FallbackPath, ResilientCaller, RATE_LIMIT_MESSAGE, UPSTREAM_UNAVAILABLE_MESSAGE,
};

pub struct ResearchAgent {
    binding: BackendBinding,
    caller: ResilientCaller,
    claims: Option<Arc<dyn ClaimStore>>,
}

impl ResearchAgent {
    /// Select a backend, resolve the role's tools and build the agent.
    /// Fails when no candidate model answers.
    pub async fn connect(
        role: AgentRole,
        config: &Config,
        factory: Arc<dyn BackendFactory>,
        claims: Option<Arc<dyn ClaimStore>>,
    ) -> Result<Self> {
        let selector = ModelSelector::new(factory, config.client.clone());
        let binding = selector.select(role, &config.candidate_models).await?;

        let tools = ToolSet::resolve(default_tools(role, &config.tavily_api_key))?;
        debug!(%role, tools = ?tools.names(), "Resolved tool set");

        let executor = Arc::new(ToolCallingExecutor::new(
            binding.model(),
            tools,
            prompts::system_prompt(role),
            config.executor.clone(),
        ));

        Ok(Self::new(binding, executor, config.retry.clone(), claims))
    }

    pub fn new(
        binding: BackendBinding,
        executor: Arc<dyn AugmentedExecutor>,
        policy: RetryPolicy,
        claims: Option<Arc<dyn ClaimStore>>,
    ) -> Self {
        let role = binding.role();
        let fallback = FallbackPath::new(role, binding.model());

        Self {
            caller: ResilientCaller::new(role, executor, fallback, policy),
            binding,
            claims,
        }
    }

    pub fn role(&self) -> AgentRole {
        self.binding.role()
    }

    pub fn model_id(&self) -> &str {
        self.binding.model_id()
    }

    pub async fn run(&self, input: &str) -> CallResult {
        let result = self.caller.run(input).await;

        if result.is_success() && self.role().extracts_claims() {
            self.record_claims(&result.text).await;
        }

        result
    }

    /// Extraction and storage problems never reach the caller
    async fn record_claims(&self, text: &str) {
        let Some(store) = &self.claims else {
            return;
        };

        let claims = ClaimExtractor::extract(text);
        debug!(role = %self.role(), count = claims.len(), "Extracted claims");

        if let Err(e) = store.insert(&claims, self.role().source_label()).await {
            warn!(role = %self.role(), error = %e, "Claim tracking failed");
        }
    }
}
