//! Backend model selection
//!
//! Each agent walks a fixed, ordered list of candidate models once, at
//! construction. The first model whose liveness probe answers is bound for
//! the lifetime of the agent; nothing is re-selected per call.

use crate::config::ClientParams;
use crate::error::ResearchError;
use crate::llm::ChatModel;
use crate::models::AgentRole;
use crate::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Trivial content sent once per candidate
pub const PROBE_PROMPT: &str = "Hello";

/// Constructs a client for a single model id
pub trait BackendFactory: Send + Sync {
    fn build(&self, model_id: &str, params: &ClientParams) -> Result<Arc<dyn ChatModel>>;
}

/// A model bound to one agent. Only constructed after a successful probe,
/// and exposes no way to rebind.
pub struct BackendBinding {
    role: AgentRole,
    candidates: Vec<String>,
    model: Arc<dyn ChatModel>,
}

impl BackendBinding {
    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    pub fn model(&self) -> Arc<dyn ChatModel> {
        Arc::clone(&self.model)
    }
}

impl fmt::Debug for BackendBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendBinding")
            .field("role", &self.role)
            .field("candidates", &self.candidates)
            .field("model", &self.model.model_id())
            .finish()
    }
}

pub struct ModelSelector {
    factory: Arc<dyn BackendFactory>,
    params: ClientParams,
}

impl ModelSelector {
    pub fn new(factory: Arc<dyn BackendFactory>, params: ClientParams) -> Self {
        Self { factory, params }
    }

    /// Bind the first candidate that builds and answers the probe
    pub async fn select(&self, role: AgentRole, candidates: &[String]) -> Result<BackendBinding> {
        for model_id in candidates {
            let model = match self.factory.build(model_id, &self.params) {
                Ok(model) => model,
                Err(e) => {
                    warn!(%role, model = %model_id, error = %e, "Failed to initialize model");
                    continue;
                }
            };

            match model.invoke(PROBE_PROMPT).await {
                Ok(_) => {
                    info!(%role, model = %model_id, "Backend model bound");
                    return Ok(BackendBinding {
                        role,
                        candidates: candidates.to_vec(),
                        model,
                    });
                }
                Err(e) => {
                    warn!(%role, model = %model_id, error = %e, "Model probe failed");
                }
            }
        }

        Err(ResearchError::NoBackendAvailable {
            role: role.to_string(),
            tried: candidates.to_vec(),
        })
    }
}
