//! Core data models for the research pipeline

use crate::classifier::ErrorClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ================= Enums =================
//

/// Role an agent plays in the pipeline. Fixed when the agent is built.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Researcher,
    Critic,
    Synthesizer,
}

impl AgentRole {
    pub const ALL: [AgentRole; 3] = [
        AgentRole::Researcher,
        AgentRole::Critic,
        AgentRole::Synthesizer,
    ];

    /// Source label attached to claims produced by this role
    pub fn source_label(&self) -> &'static str {
        match self {
            AgentRole::Researcher => "Researcher Agent",
            AgentRole::Critic => "Critic Agent",
            AgentRole::Synthesizer => "Synthesizer Agent",
        }
    }

    /// Only research output is mined for claims
    pub fn extracts_claims(&self) -> bool {
        matches!(self, AgentRole::Researcher)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Unverified,
    Verified,
    Contested,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Unverified => "unverified",
            ClaimStatus::Verified => "verified",
            ClaimStatus::Contested => "contested",
        }
    }
}

impl FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unverified" => Ok(ClaimStatus::Unverified),
            "verified" => Ok(ClaimStatus::Verified),
            "contested" => Ok(ClaimStatus::Contested),
            other => Err(format!("unknown claim status '{}'", other)),
        }
    }
}

//
// ================= Claims =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: i64,
    pub text: String,
    pub source: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
}

/// Claim counts grouped by status. Always carries at least the
/// `unverified` key, even for an empty store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationReport {
    counts: BTreeMap<ClaimStatus, u64>,
}

impl VerificationReport {
    pub fn empty() -> Self {
        Self::from_counts(std::iter::empty())
    }

    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (ClaimStatus, u64)>,
    {
        let mut map = BTreeMap::new();
        for (status, count) in counts {
            *map.entry(status).or_insert(0) += count;
        }
        map.entry(ClaimStatus::Unverified).or_insert(0);

        Self { counts: map }
    }

    pub fn count(&self, status: ClaimStatus) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClaimStatus, u64)> + '_ {
        self.counts.iter().map(|(status, count)| (*status, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl Default for VerificationReport {
    fn default() -> Self {
        Self::empty()
    }
}

//
// ================= Resilient Calls =================
//

/// Why a call was abandoned without producing model output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    UpstreamUnavailable,
    RateLimitExhausted,
}

/// Decision taken after a single attempt of the tool-augmented path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttemptOutcome {
    Success,
    Retry,
    Backoff { wait_ms: u64 },
    Fallback,
    Abort { reason: AbortReason },
}

/// One iteration of the retry loop. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAttempt {
    pub index: u32,
    pub backoff_ms: u64,
    pub error: Option<ErrorClass>,
    pub outcome: AttemptOutcome,
}

/// How a stage produced its text
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// Tool-augmented path succeeded
    Success,
    /// Plain fallback path produced the text (possibly its failure string)
    Degraded,
    /// Retry budget exhausted on rate limits
    RateLimited,
    /// Upstream unavailable, no further attempts
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallResult {
    pub role: AgentRole,
    pub text: String,
    pub outcome: StageOutcome,
    pub attempts: Vec<CallAttempt>,
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        self.outcome == StageOutcome::Success
    }
}

//
// ================= Pipeline =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    pub query: String,
    pub research: CallResult,
    pub critique: CallResult,
    pub synthesis: CallResult,
    pub verification: VerificationReport,
    pub created_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl PipelineOutput {
    pub fn stages(&self) -> [&CallResult; 3] {
        [&self.research, &self.critique, &self.synthesis]
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentRole::Researcher => "researcher",
            AgentRole::Critic => "critic",
            AgentRole::Synthesizer => "synthesizer",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StageOutcome::Success => "Success",
            StageOutcome::Degraded => "Degraded (fallback)",
            StageOutcome::RateLimited => "Rate limited",
            StageOutcome::Aborted => "Aborted",
        };
        write!(f, "{}", s)
    }
}
