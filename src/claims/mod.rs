//! Claim extraction and the durable claim ledger
//!
//! Claims are short factual statements pulled from research output. Every
//! stored claim starts out `unverified`; nothing in this crate promotes it.

pub mod extractor;
pub mod store;

use crate::error::ResearchError;
use crate::models::{Claim, VerificationReport};
use crate::Result;
use async_trait::async_trait;

pub use extractor::ClaimExtractor;
pub use store::{open_claim_store, InMemoryClaimStore, SqliteClaimStore};

/// Shared, concurrency-safe claim ledger
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Append a batch as `unverified`. All-or-nothing; an empty batch is a no-op.
    async fn insert(&self, claims: &[String], source: &str) -> Result<()>;

    /// Count of claims per status. Always contains `unverified`.
    async fn report(&self) -> Result<VerificationReport>;

    /// Newest claims first
    async fn list_recent(&self, limit: u32) -> Result<Vec<Claim>>;
}

pub(crate) fn validate_claims(claims: &[String]) -> Result<()> {
    if let Some(index) = claims.iter().position(|c| c.trim().is_empty()) {
        return Err(ResearchError::InvalidClaim(format!(
            "claim at position {} is empty",
            index
        )));
    }
    Ok(())
}
