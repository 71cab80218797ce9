//! Runtime configuration
//!
//! Loaded once at startup from the environment (and `.env`).
//! Missing credentials fail fast, before any agent is constructed.

use crate::error::ResearchError;
use crate::Result;
use std::env;
use std::time::Duration;

pub const DEFAULT_MODELS: &[&str] = &["llama3-8b-8192", "llama3-70b-8192", "mixtral-8x7b-32768"];
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://research.db";

const REQUIRED_KEYS: &[&str] = &["GROQ_API_KEY", "TAVILY_API_KEY"];

/// Fixed parameters every backend client is built with
#[derive(Debug, Clone, PartialEq)]
pub struct ClientParams {
    pub temperature: f32,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
}

impl Default for ClientParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Retry budget and backoff schedule for the resilient caller
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub rate_limit_step: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `k` (0-based): none for the first, `base * 2^k` after
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.base_backoff * 2u32.saturating_pow(attempt)
        }
    }

    /// Extra wait after a rate-limited attempt `k`
    pub fn rate_limit_wait(&self, attempt: u32) -> Duration {
        self.rate_limit_step * (attempt + 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            rate_limit_step: Duration::from_secs(5),
        }
    }
}

/// Bounds for one tool-calling run
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorLimits {
    pub max_iterations: u32,
    pub max_execution_time: Duration,
}

impl Default for ExecutorLimits {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_execution_time: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub groq_api_key: String,
    pub tavily_api_key: String,
    pub groq_base_url: String,
    pub candidate_models: Vec<String>,
    pub database_url: String,
    pub client: ClientParams,
    pub retry: RetryPolicy,
    pub executor: ExecutorLimits,
}

impl Config {
    /// Load `.env` (if present) and read configuration from the environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();

        if !missing.is_empty() {
            return Err(ResearchError::ConfigError(format!(
                "Missing environment variables: {}",
                missing.join(", ")
            )));
        }

        let candidate_models = get("GROQ_MODELS")
            .map(|raw| parse_model_list(&raw))
            .filter(|models| !models.is_empty())
            .unwrap_or_else(|| DEFAULT_MODELS.iter().map(|m| m.to_string()).collect());

        Ok(Self {
            groq_api_key: get("GROQ_API_KEY").unwrap_or_default(),
            tavily_api_key: get("TAVILY_API_KEY").unwrap_or_default(),
            groq_base_url: get("GROQ_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            candidate_models,
            database_url: get("CLAIMS_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            client: ClientParams::default(),
            retry: RetryPolicy::default(),
            executor: ExecutorLimits::default(),
        })
    }
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Port for the HTTP server (`PORT`, then `API_PORT`, default 8080)
pub fn api_port() -> Result<u16> {
    env::var("PORT")
        .or_else(|_| env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .map_err(|e| ResearchError::ConfigError(format!("Invalid port: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_credentials_fail_fast() {
        let err = Config::from_lookup(lookup_from(&[("GROQ_API_KEY", "gsk_test")])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("TAVILY_API_KEY"));
        assert!(!msg.contains("GROQ_API_KEY"));

        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY, TAVILY_API_KEY"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("TAVILY_API_KEY", "tvly_test"),
        ]))
        .unwrap();

        assert_eq!(config.candidate_models, DEFAULT_MODELS);
        assert_eq!(config.groq_base_url, DEFAULT_GROQ_BASE_URL);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.client.temperature, 0.1);
        assert_eq!(config.client.request_timeout, Duration::from_secs(60));
        assert_eq!(config.client.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.client.max_retries, 3);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_model_override() {
        let config = Config::from_lookup(lookup_from(&[
            ("GROQ_API_KEY", "gsk_test"),
            ("TAVILY_API_KEY", "tvly_test"),
            ("GROQ_MODELS", " llama-3.1-8b-instant , ,mixtral-8x7b-32768"),
        ]))
        .unwrap();

        assert_eq!(
            config.candidate_models,
            vec!["llama-3.1-8b-instant", "mixtral-8x7b-32768"]
        );
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_before(0), Duration::ZERO);
        assert_eq!(policy.backoff_before(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_before(2), Duration::from_secs(4));
        assert_eq!(policy.rate_limit_wait(0), Duration::from_secs(5));
        assert_eq!(policy.rate_limit_wait(1), Duration::from_secs(10));
    }
}
