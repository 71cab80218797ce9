//! Resilient caller: retry / backoff / fallback state machine
//!
//! Init → Attempting(k) → { Success | Retrying(k+1) | Backoff | FallingBack | Aborted }
//!
//! The decision after a failed attempt is the pure function [`decide`];
//! [`ResilientCaller::run`] only performs the waits and calls it asks for.

use crate::agent::prompts::fallback_prompt;
use crate::classifier::{ErrorClass, ErrorClassifier};
use crate::config::RetryPolicy;
use crate::execution::AugmentedExecutor;
use crate::llm::ChatModel;
use crate::models::{AbortReason, AgentRole, AttemptOutcome, CallAttempt, CallResult, StageOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const UPSTREAM_UNAVAILABLE_MESSAGE: &str =
    "API connection error: unable to reach the model backend. Check the API key and network connectivity.";

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// What to do after attempt `attempt` (0-based) failed with `class`
pub fn decide(
    attempt: u32,
    max_attempts: u32,
    class: ErrorClass,
    policy: &RetryPolicy,
) -> AttemptOutcome {
    let attempts_remain = attempt + 1 < max_attempts;

    match class {
        ErrorClass::UpstreamUnavailable => AttemptOutcome::Abort {
            reason: AbortReason::UpstreamUnavailable,
        },
        ErrorClass::Connection if attempts_remain => AttemptOutcome::Retry,
        ErrorClass::Connection => AttemptOutcome::Fallback,
        ErrorClass::RateLimit if attempts_remain => AttemptOutcome::Backoff {
            wait_ms: policy.rate_limit_wait(attempt).as_millis() as u64,
        },
        ErrorClass::RateLimit => AttemptOutcome::Abort {
            reason: AbortReason::RateLimitExhausted,
        },
        ErrorClass::Fatal => AttemptOutcome::Fallback,
    }
}

/// Direct model call with the role template. No tools, no retry.
pub struct FallbackPath {
    role: AgentRole,
    model: Arc<dyn ChatModel>,
}

impl FallbackPath {
    pub fn new(role: AgentRole, model: Arc<dyn ChatModel>) -> Self {
        Self { role, model }
    }

    /// Always yields text; a failed call becomes a failure string
    pub async fn run(&self, input: &str) -> String {
        info!(role = %self.role, model = %self.model.model_id(), "Using fallback mode");

        match self.model.invoke(&fallback_prompt(self.role, input)).await {
            Ok(text) => text,
            Err(e) => {
                warn!(role = %self.role, error = %e, "Fallback call failed");
                format!("Fallback failed for {}: {}", self.role, e)
            }
        }
    }
}

pub struct ResilientCaller {
    role: AgentRole,
    executor: Arc<dyn AugmentedExecutor>,
    fallback: FallbackPath,
    policy: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(
        role: AgentRole,
        executor: Arc<dyn AugmentedExecutor>,
        fallback: FallbackPath,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            role,
            executor,
            fallback,
            policy,
        }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    /// Run one stage. Never fails: every path ends in some text.
    pub async fn run(&self, input: &str) -> CallResult {
        let max_attempts = self.policy.max_attempts;
        let mut attempts: Vec<CallAttempt> = Vec::new();
        // rate-limit wait already served before the next attempt
        let mut carried = Duration::ZERO;

        for k in 0..max_attempts {
            let backoff = self.policy.backoff_before(k);
            if !backoff.is_zero() {
                debug!(role = %self.role, attempt = k, backoff_ms = backoff.as_millis() as u64, "Backing off");
                tokio::time::sleep(backoff).await;
            }
            let backoff_ms = (backoff + carried).as_millis() as u64;
            carried = Duration::ZERO;

            info!(role = %self.role, attempt = k + 1, "Attempting tool-augmented call");

            let error = match self.executor.execute(input).await {
                Ok(text) => {
                    attempts.push(CallAttempt {
                        index: k,
                        backoff_ms,
                        error: None,
                        outcome: AttemptOutcome::Success,
                    });
                    return self.finish(text, StageOutcome::Success, attempts);
                }
                Err(e) => e,
            };

            let class = ErrorClassifier::classify(&error.to_string());
            let outcome = decide(k, max_attempts, class, &self.policy);
            warn!(
                role = %self.role,
                attempt = k + 1,
                class = %class,
                error = %error,
                "Attempt failed"
            );

            attempts.push(CallAttempt {
                index: k,
                backoff_ms,
                error: Some(class),
                outcome,
            });

            match outcome {
                AttemptOutcome::Retry => continue,
                AttemptOutcome::Backoff { wait_ms } => {
                    let wait = Duration::from_millis(wait_ms);
                    info!(role = %self.role, wait_ms, "Rate limit hit, waiting");
                    tokio::time::sleep(wait).await;
                    carried = wait;
                }
                AttemptOutcome::Abort {
                    reason: AbortReason::UpstreamUnavailable,
                } => {
                    return self.finish(
                        UPSTREAM_UNAVAILABLE_MESSAGE.to_string(),
                        StageOutcome::Aborted,
                        attempts,
                    );
                }
                AttemptOutcome::Abort {
                    reason: AbortReason::RateLimitExhausted,
                } => {
                    return self.finish(
                        RATE_LIMIT_MESSAGE.to_string(),
                        StageOutcome::RateLimited,
                        attempts,
                    );
                }
                AttemptOutcome::Fallback | AttemptOutcome::Success => break,
            }
        }

        let text = self.fallback.run(input).await;
        self.finish(text, StageOutcome::Degraded, attempts)
    }

    fn finish(&self, text: String, outcome: StageOutcome, attempts: Vec<CallAttempt>) -> CallResult {
        info!(
            role = %self.role,
            outcome = %outcome,
            attempts = attempts.len(),
            "Stage finished"
        );

        CallResult {
            role: self.role,
            text,
            outcome,
            attempts,
        }
    }
}
