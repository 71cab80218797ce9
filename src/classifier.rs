//! Error Classifier
//!
//! Maps the textual description of a backend/tool failure onto the
//! category that drives the retry state machine:
//! - Connection: transient network trouble, worth retrying
//! - RateLimit: back off longer, then retry
//! - UpstreamUnavailable: the gateway has no backend at all, give up now
//! - Fatal: anything else, degrade to the plain fallback path

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Connection,
    RateLimit,
    UpstreamUnavailable,
    Fatal,
}

/// Static keyword lists — zero allocation
const CONNECTION_KEYWORDS: &[&str] = &["connection", "timeout", "network"];

const RATE_LIMIT_KEYWORDS: &[&str] = &["rate limit", "quota"];

const UPSTREAM_UNAVAILABLE_PHRASE: &str = "no healthy upstream";

/// Stateless failure classifier
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify a failure message (case-insensitive substring match)
    pub fn classify(message: &str) -> ErrorClass {
        let message = message.to_lowercase();

        if CONNECTION_KEYWORDS.iter().any(|kw| message.contains(kw)) {
            ErrorClass::Connection
        } else if RATE_LIMIT_KEYWORDS.iter().any(|kw| message.contains(kw)) {
            ErrorClass::RateLimit
        } else if message.contains(UPSTREAM_UNAVAILABLE_PHRASE) {
            ErrorClass::UpstreamUnavailable
        } else {
            ErrorClass::Fatal
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Connection => "connection",
            ErrorClass::RateLimit => "rate_limit",
            ErrorClass::UpstreamUnavailable => "upstream_unavailable",
            ErrorClass::Fatal => "fatal",
        };
        write!(f, "{}", s)
    }
}
