//! Error types for the back-office assistant

use thiserror::Error;

use crate::provider::ProviderError;
use crate::retry::RetryError;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Agent Loop Errors
    // =============================

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Provider still rate limited after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Run cancelled before completion")]
    Cancelled,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Context store error: {0}")]
    ContextStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<RetryError<ProviderError>> for AgentError {
    fn from(err: RetryError<ProviderError>) -> Self {
        match err {
            RetryError::Fatal(source) => AgentError::Provider(source),
            RetryError::Exhausted {
                attempts,
                last_error,
            } => AgentError::RetriesExhausted {
                attempts,
                source: last_error,
            },
            RetryError::Cancelled => AgentError::Cancelled,
        }
    }
}
