//! Environment-driven configuration

use crate::agent::LoopSettings;
use crate::error::AgentError;
use crate::retry::RetryPolicy;
use crate::Result;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub max_iterations: u32,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub suggestion_limit: usize,
    pub run_deadline: Duration,
    pub database_url: Option<String>,
    pub port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            max_tokens: 4096,
            max_iterations: 10,
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            retry_max_delay: Duration::from_millis(30_000),
            suggestion_limit: 5,
            run_deadline: Duration::from_secs(120),
            database_url: None,
            port: 8080,
        }
    }
}

impl AgentConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            api_key: get("ANTHROPIC_API_KEY"),
            model: get("AGENT_MODEL").unwrap_or(defaults.model),
            base_url: get("ANTHROPIC_BASE_URL"),
            max_tokens: parse_or(get("AGENT_MAX_TOKENS"), "AGENT_MAX_TOKENS", defaults.max_tokens)?,
            max_iterations: parse_or(
                get("AGENT_MAX_ITERATIONS"),
                "AGENT_MAX_ITERATIONS",
                defaults.max_iterations,
            )?,
            retry_max_attempts: parse_or(
                get("AGENT_RETRY_MAX_ATTEMPTS"),
                "AGENT_RETRY_MAX_ATTEMPTS",
                defaults.retry_max_attempts,
            )?,
            retry_base_delay: Duration::from_millis(parse_or(
                get("AGENT_RETRY_BASE_DELAY_MS"),
                "AGENT_RETRY_BASE_DELAY_MS",
                1000u64,
            )?),
            retry_max_delay: Duration::from_millis(parse_or(
                get("AGENT_RETRY_MAX_DELAY_MS"),
                "AGENT_RETRY_MAX_DELAY_MS",
                30_000u64,
            )?),
            suggestion_limit: parse_or(
                get("AGENT_SUGGESTION_LIMIT"),
                "AGENT_SUGGESTION_LIMIT",
                defaults.suggestion_limit,
            )?,
            run_deadline: Duration::from_secs(parse_or(
                get("AGENT_RUN_DEADLINE_SECS"),
                "AGENT_RUN_DEADLINE_SECS",
                120u64,
            )?),
            database_url: get("POSTGRES_URL").or_else(|| get("DATABASE_URL")),
            port: parse_or(get("PORT").or_else(|| get("API_PORT")), "PORT", defaults.port)?,
        }
        .validated()?)
    }

    fn validated(self) -> Result<Self> {
        if self.max_iterations == 0 {
            return Err(AgentError::Config(
                "AGENT_MAX_ITERATIONS must be at least 1".to_string(),
            ));
        }
        if self.retry_max_attempts == 0 {
            return Err(AgentError::Config(
                "AGENT_RETRY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.retry_base_delay > self.retry_max_delay {
            return Err(AgentError::Config(
                "AGENT_RETRY_BASE_DELAY_MS exceeds AGENT_RETRY_MAX_DELAY_MS".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_iterations: self.max_iterations,
            retry: self.retry_policy(),
            suggestion_limit: self.suggestion_limit,
            note_category: None,
            max_tokens: Some(self.max_tokens),
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| {
            AgentError::Config(format!("{} has an invalid value: '{}'", key, value))
        }),
    }
}
