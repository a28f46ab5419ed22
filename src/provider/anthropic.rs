//! Anthropic Messages API provider
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{FinishSignal, Provider, ProviderError, ProviderRequest, ProviderResponse};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::models::{ContentBlock, ConversationTurn, ToolDefinition};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Reusable Anthropic client (connection-pooled)
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> crate::Result<Self> {
        Self::with_base_url(api_key, model, max_tokens, DEFAULT_BASE_URL.to_string())
    }

    /// Build from configuration; fails when no API key is configured
    pub fn from_config(config: &AgentConfig) -> crate::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AgentError::Config("ANTHROPIC_API_KEY is not set".to_string()))?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self::with_base_url(api_key, config.model.clone(), config.max_tokens, base_url)
    }

    /// Create a client against a custom base URL (proxies, mock servers)
    pub fn with_base_url(
        api_key: String,
        model: String,
        max_tokens: u32,
        base_url: String,
    ) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            max_tokens,
        })
    }

    fn build_request<'a>(&'a self, request: &'a ProviderRequest) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            system: &request.system,
            messages: &request.turns,
            tools: &request.tools,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        request: &ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey(
                "ANTHROPIC_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request(request);

        debug!(
            model = %self.model,
            turns = request.turns.len(),
            tools = request.tools.len(),
            "Calling Anthropic Messages API"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Anthropic API request failed: {}", e);
                ProviderError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status, "Anthropic API error response: {}", message);
            return Err(ProviderError::Api { status, message });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Anthropic response: {}", e);
            ProviderError::InvalidResponse(format!("Anthropic parse error: {}", e))
        })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = ?parsed.stop_reason,
                "Anthropic response received"
            );
        }

        Ok(parsed.into_provider_response())
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [ConversationTurn],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    fn into_provider_response(self) -> ProviderResponse {
        let finish = match self.stop_reason.as_deref() {
            Some("tool_use") => FinishSignal::ToolUse,
            _ => FinishSignal::Completed,
        };

        ProviderResponse {
            finish,
            blocks: self
                .content
                .into_iter()
                .filter(|b| !matches!(b, ContentBlock::Unsupported))
                .collect(),
        }
    }
}
