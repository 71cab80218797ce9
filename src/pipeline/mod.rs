//! Three-stage research pipeline
//!
//! research → critique → synthesis, strictly in sequence. Each stage gets
//! the previous stages' text as input and always produces text of its own.

use crate::agent::ResearchAgent;
use crate::claims::ClaimStore;
use crate::config::Config;
use crate::error::ResearchError;
use crate::llm::BackendFactory;
use crate::models::{AgentRole, PipelineOutput, VerificationReport};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

pub fn critique_input(research: &str) -> String {
    format!("Analyze this research: {}", research)
}

pub fn synthesis_input(research: &str, critique: &str) -> String {
    format!(
        "Create final report based on research: {} and critique: {}",
        research, critique
    )
}

pub struct PipelineOrchestrator {
    researcher: ResearchAgent,
    critic: ResearchAgent,
    synthesizer: ResearchAgent,
    store: Arc<dyn ClaimStore>,
}

impl PipelineOrchestrator {
    pub fn new(
        researcher: ResearchAgent,
        critic: ResearchAgent,
        synthesizer: ResearchAgent,
        store: Arc<dyn ClaimStore>,
    ) -> Result<Self> {
        let expected = [
            (&researcher, AgentRole::Researcher),
            (&critic, AgentRole::Critic),
            (&synthesizer, AgentRole::Synthesizer),
        ];
        for (agent, role) in expected {
            if agent.role() != role {
                return Err(ResearchError::InvalidPipeline(format!(
                    "expected a {} agent, got {}",
                    role,
                    agent.role()
                )));
            }
        }

        Ok(Self {
            researcher,
            critic,
            synthesizer,
            store,
        })
    }

    /// Build all three agents. Any agent without a backend fails the whole pipeline.
    pub async fn connect(
        config: &Config,
        factory: Arc<dyn BackendFactory>,
        store: Arc<dyn ClaimStore>,
    ) -> Result<Self> {
        let researcher = ResearchAgent::connect(
            AgentRole::Researcher,
            config,
            factory.clone(),
            Some(store.clone()),
        )
        .await?;
        let critic = ResearchAgent::connect(AgentRole::Critic, config, factory.clone(), None).await?;
        let synthesizer =
            ResearchAgent::connect(AgentRole::Synthesizer, config, factory, None).await?;

        info!(
            researcher = researcher.model_id(),
            critic = critic.model_id(),
            synthesizer = synthesizer.model_id(),
            "Pipeline agents initialized"
        );

        Self::new(researcher, critic, synthesizer, store)
    }

    pub fn store(&self) -> Arc<dyn ClaimStore> {
        self.store.clone()
    }

    pub async fn run(&self, query: &str) -> Result<PipelineOutput> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::InvalidQuery("query must not be empty".to_string()));
        }

        let start_time = Instant::now();
        let run_id = Uuid::new_v4();
        info!(%run_id, query, "Pipeline: starting");

        let research = self.researcher.run(query).await;
        info!(%run_id, outcome = %research.outcome, "Research stage complete");

        let critique = self.critic.run(&critique_input(&research.text)).await;
        info!(%run_id, outcome = %critique.outcome, "Critique stage complete");

        let synthesis = self
            .synthesizer
            .run(&synthesis_input(&research.text, &critique.text))
            .await;
        info!(%run_id, outcome = %synthesis.outcome, "Synthesis stage complete");

        let verification = match self.store.report().await {
            Ok(report) => report,
            Err(e) => {
                warn!(%run_id, error = %e, "Failed to read verification report");
                VerificationReport::empty()
            }
        };

        Ok(PipelineOutput {
            run_id,
            query: query.to_string(),
            research,
            critique,
            synthesis,
            verification,
            created_at: Utc::now(),
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}
