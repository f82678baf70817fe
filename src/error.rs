//! Error types for the intake engine.

use std::time::Duration;

/// Top-level error type for the engine.
///
/// Input errors (`EmptyDescription`, `EmptyMessage`) and store errors reject
/// the turn. LLM errors never reach this level: the interview step absorbs
/// them and degrades to the deterministic path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("A non-empty project description is required to start an interview")]
    EmptyDescription,

    #[error("A non-empty message is required to continue an interview")]
    EmptyMessage,
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Session store errors.
///
/// These surface as turn failures: there is no sensible fallback when the
/// durable record cannot be read or replaced.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session record for {id} is not valid JSON: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout {
        provider: String,
        timeout: Duration,
    },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
