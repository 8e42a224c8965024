//! Error types for Paper Digest.

use std::time::Duration;

/// Top-level error type for the digest agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Translation error: {0}")]
    Translate(#[from] TranslateError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Paper feed (arXiv API) errors.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Feed request failed: {0}")]
    Request(String),

    #[error("Feed returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Failed to parse feed: {0}")]
    Parse(String),
}

/// Seen-paper store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),
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

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Translation service errors.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("Translate request failed: {0}")]
    Request(String),

    #[error("Translate API returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Unexpected translate response: {0}")]
    InvalidResponse(String),
}

/// Notification delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send on channel {channel}: {reason}")]
    SendFailed { channel: String, reason: String },

    #[error("Channel {channel} returned status {status}")]
    Status {
        channel: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to build message for channel {channel}: {reason}")]
    BuildFailed { channel: String, reason: String },

    #[error("Delivery failed on channel {channel}")]
    DeliveryFailed { channel: String },
}

/// Result type alias for the digest agent.
pub type Result<T> = std::result::Result<T, Error>;
