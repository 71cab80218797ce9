//! Audit trail of pipeline runs
//!
//! Every run is recorded with a hash of the report that was handed out, so
//! a report can later be checked against what the pipeline produced.

use crate::models::{AgentRole, PipelineOutput, StageOutcome, VerificationReport};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Runs kept per process before the oldest are evicted
pub const DEFAULT_MAX_RECORDS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub role: AgentRole,
    pub outcome: StageOutcome,
    pub attempts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub query: String,
    pub stages: Vec<StageSummary>,
    pub verification: VerificationReport,
    pub report_hash: String,
    pub created_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunRecord {
    pub fn from_output(output: &PipelineOutput, report: &str) -> Self {
        Self {
            run_id: output.run_id,
            query: output.query.clone(),
            stages: output
                .stages()
                .iter()
                .map(|stage| StageSummary {
                    role: stage.role,
                    outcome: stage.outcome,
                    attempts: stage.attempts.len(),
                })
                .collect(),
            verification: output.verification.clone(),
            report_hash: compute_report_hash(report),
            created_at: output.created_at,
            elapsed_ms: output.execution_time_ms,
        }
    }
}

/// Audit trail storage.
///
/// Process-local and bounded: once `max_records` runs are held, recording a
/// new run evicts the oldest by `created_at`.
pub struct AuditLog {
    records: Arc<RwLock<HashMap<Uuid, RunRecord>>>,
    max_records: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_RECORDS)
    }

    pub fn with_capacity(max_records: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            max_records: max_records.max(1),
        }
    }

    pub async fn record(&self, record: RunRecord) -> Result<Uuid> {
        let run_id = record.run_id;
        let mut records = self.records.write().await;
        records.insert(run_id, record);

        while records.len() > self.max_records {
            let oldest = records
                .values()
                .min_by_key(|r| r.created_at)
                .map(|r| r.run_id);
            match oldest {
                Some(id) => {
                    records.remove(&id);
                    debug!(run_id = %id, "Evicted audit record");
                }
                None => break,
            }
        }

        Ok(run_id)
    }

    pub async fn get(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&run_id).cloned())
    }

    /// All runs, oldest first
    pub async fn list(&self) -> Result<Vec<RunRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<RunRecord> = records.values().cloned().collect();
        items.sort_by_key(|record| record.created_at);

        Ok(items)
    }

    /// Check a report against the hash recorded for its run
    pub async fn verify_integrity(&self, run_id: Uuid, report: &str) -> Result<bool> {
        let records = self.records.read().await;

        Ok(records
            .get(&run_id)
            .map(|record| record.report_hash == compute_report_hash(report))
            .unwrap_or(false))
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA256 of the report text, hex encoded
pub fn compute_report_hash(report: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(report.as_bytes());
    hex::encode(hasher.finalize())
}
