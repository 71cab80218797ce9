//! Resilient Research Pipeline
//!
//! Three LLM-backed agents run in sequence over a query:
//! - a researcher gathers information with search tools
//! - a critic checks the research
//! - a synthesizer writes the final report
//!
//! Every backend call is unreliable. Each stage classifies failures and
//! retries, backs off, aborts with a message, or degrades to a plain
//! no-tools call, so the pipeline always yields text. Claims found in the
//! research are kept in a durable, shared ledger.
//!
//! RESEARCH → CRITIQUE → SYNTHESIS → VERIFICATION REPORT

pub mod agent;
pub mod api;
pub mod audit;
pub mod claims;
pub mod classifier;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod tools;

#[cfg(test)]
mod testing;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use classifier::{ErrorClass, ErrorClassifier};
