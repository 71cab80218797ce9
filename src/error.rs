//! Error types for the research pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ResearchError>;

#[derive(Error, Debug)]
pub enum ResearchError {

    // =============================
    // Backend Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("No backend available for {role}: tried {tried:?}")]
    NoBackendAvailable { role: String, tried: Vec<String> },

    // =============================
    // Tool / Execution Errors
    // =============================

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("Invalid tool spec: {0}")]
    InvalidToolSpec(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    // =============================
    // Claims / Pipeline Errors
    // =============================

    #[error("Invalid claim: {0}")]
    InvalidClaim(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
