//! Model provider trait and implementations
//!
//! The agent loop only depends on the minimal shape here: an ordered turn
//! sequence, a system instruction and a tool manifest go in; a finish
//! signal plus content blocks come out.

use crate::models::{ContentBlock, ConversationTurn, ToolDefinition, ToolInvocation};
use crate::retry::{Classify, RetryClass};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

pub mod anthropic;
pub use anthropic::AnthropicProvider;

/// Everything the provider sees on one call
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub system: String,
    pub turns: Vec<ConversationTurn>,
    pub tools: Vec<ToolDefinition>,
    /// Output token budget; the provider's own default when `None`
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishSignal {
    /// Final answer, no further tool requests
    Completed,
    /// One or more tool invocations must be satisfied before continuing
    ToolUse,
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub finish: FinishSignal,
    pub blocks: Vec<ContentBlock>,
}

impl ProviderResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            finish: FinishSignal::Completed,
            blocks: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn tool_calls(invocations: Vec<ToolInvocation>) -> Self {
        Self {
            finish: FinishSignal::ToolUse,
            blocks: invocations.into_iter().map(ContentBlock::ToolUse).collect(),
        }
    }

    /// Concatenated text blocks, `None` when the response has none
    pub fn answer_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } if !text.trim().is_empty() => Some(text.as_str()),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolUse(inv) => Some(inv.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: {0}")]
    MissingApiKey(String),
}

impl Classify for ProviderError {
    fn classify(&self) -> RetryClass {
        match self {
            ProviderError::RateLimited { .. } => RetryClass::Retryable,
            ProviderError::Api { status, message } => {
                RetryClass::from_signal(Some(*status), message)
            }
            ProviderError::Transport(message) => RetryClass::from_signal(None, message),
            ProviderError::InvalidResponse(_) | ProviderError::MissingApiKey(_) => {
                RetryClass::Fatal
            }
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Trait for model providers
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;
}

/// Replays a fixed script of responses and records every request.
/// Used for the offline demo and tests.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<std::result::Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(
        script: Vec<std::result::Result<ProviderResponse, ProviderError>>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn from_responses(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.requests.lock().await.push(request.clone());

        self.script.lock().await.pop_front().unwrap_or_else(|| {
            Err(ProviderError::InvalidResponse(
                "scripted provider has no responses left".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_classification() {
        assert_eq!(
            ProviderError::RateLimited { retry_after: None }.classify(),
            RetryClass::Retryable
        );
        assert_eq!(
            ProviderError::Api {
                status: 529,
                message: "overloaded_error".into()
            }
            .classify(),
            RetryClass::Retryable
        );
        assert_eq!(
            ProviderError::Api {
                status: 401,
                message: "invalid x-api-key".into()
            }
            .classify(),
            RetryClass::Fatal
        );
        assert_eq!(
            ProviderError::MissingApiKey("ANTHROPIC_API_KEY".into()).classify(),
            RetryClass::Fatal
        );
    }

    #[test]
    fn test_answer_text_joins_text_blocks() {
        let response = ProviderResponse {
            finish: FinishSignal::Completed,
            blocks: vec![
                ContentBlock::Text { text: "Use 7100.".into() },
                ContentBlock::Unsupported,
                ContentBlock::Text { text: "It is an expense account.".into() },
            ],
        };

        assert_eq!(
            response.answer_text().as_deref(),
            Some("Use 7100.\n\nIt is an expense account.")
        );
        assert!(ProviderResponse::tool_calls(vec![]).answer_text().is_none());
    }

    #[tokio::test]
    async fn test_scripted_provider_records_requests() {
        let provider = ScriptedProvider::from_responses(vec![ProviderResponse::text("ok")]);
        let request = ProviderRequest {
            system: "sys".into(),
            turns: vec![ConversationTurn::user_text("hello")],
            tools: vec![],
            max_tokens: None,
        };

        let first = provider.complete(&request).await;
        assert!(first.is_ok());
        let second = provider.complete(&request).await;
        assert!(second.is_err());
        assert_eq!(provider.call_count().await, 2);
    }
}
