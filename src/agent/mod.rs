//! Agent conversation loop
//!
//! INITIALIZE → AWAIT PROVIDER → DISPATCH TOOLS → AWAIT PROVIDER ... → TERMINATE
//!
//! One [`Agent`] is built per assistant profile and shared across runs. All
//! per-run state lives in an [`AgentRunState`] owned by the run itself.

pub mod prompt;
pub mod synthesizer;

use crate::context::{load_remembered_context, ContextStore};
use crate::error::AgentError;
use crate::models::{
    AgentProfile, ConversationTurn, NoteCategory, RunResult, Termination, ToolErrorKind,
};
use crate::provider::{FinishSignal, Provider, ProviderRequest, ProviderResponse};
use crate::retry::{self, RetryPolicy};
use crate::tools::{ToolContext, ToolRegistry};
use crate::Result;
use prompt::build_system_instruction;
use std::sync::Arc;
use std::time::{Duration, Instant};
use synthesizer::ArtifactAccumulator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Answer used when the provider finishes without any text
pub const NO_TEXT_ANSWER: &str = "I wasn't able to produce an answer for that request.";

/// Answer used when the iteration ceiling stops the run
pub const ITERATION_LIMIT_ANSWER: &str =
    "I ran out of iterations before finishing this request. Try narrowing the question or splitting it into smaller steps.";

/// Tunables for the loop
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Maximum provider calls in one run
    pub max_iterations: u32,
    pub retry: RetryPolicy,
    pub suggestion_limit: usize,
    /// Restrict remembered context to one category
    pub note_category: Option<NoteCategory>,
    /// Per-request output token budget
    pub max_tokens: Option<u32>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            retry: RetryPolicy::default(),
            suggestion_limit: 5,
            note_category: None,
            max_tokens: None,
        }
    }
}

enum LoopState {
    Initializing,
    AwaitingProviderResponse,
    Dispatching(ProviderResponse),
    Terminated {
        answer: String,
        termination: Termination,
    },
}

/// Everything one run accumulates
struct AgentRunState {
    run_id: Uuid,
    system: String,
    /// Completed dispatch rounds; checked against the ceiling
    iteration: u32,
    provider_calls: u32,
    turns: Vec<ConversationTurn>,
    artifacts: ArtifactAccumulator,
    tool_calls_made: Vec<String>,
}

impl AgentRunState {
    fn new(prior_turns: Vec<ConversationTurn>, suggestion_limit: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            system: String::new(),
            iteration: 0,
            provider_calls: 0,
            turns: prior_turns,
            artifacts: ArtifactAccumulator::new(suggestion_limit),
            tool_calls_made: Vec::new(),
        }
    }

    fn finish(self, answer: String, termination: Termination) -> RunResult {
        RunResult {
            run_id: self.run_id,
            answer,
            artifacts: self.artifacts.finish(),
            tool_calls_made: self.tool_calls_made,
            iterations: self.provider_calls,
            termination,
        }
    }
}

pub struct Agent {
    profile: AgentProfile,
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn ContextStore>,
    settings: LoopSettings,
}

impl Agent {
    pub fn new(
        profile: AgentProfile,
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        store: Arc<dyn ContextStore>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            profile,
            provider,
            registry,
            store,
            settings,
        }
    }

    pub fn profile(&self) -> AgentProfile {
        self.profile
    }

    pub async fn run(&self, query: &str, prior_turns: Vec<ConversationTurn>) -> Result<RunResult> {
        self.run_with_cancel(query, prior_turns, CancellationToken::new())
            .await
    }

    /// Run with a deadline; the run is cancelled once `deadline` elapses
    pub async fn run_with_deadline(
        &self,
        query: &str,
        prior_turns: Vec<ConversationTurn>,
        deadline: Duration,
    ) -> Result<RunResult> {
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel();
            })
        };

        let result = self.run_with_cancel(query, prior_turns, cancel).await;
        timer.abort();
        result
    }

    /// Run the conversation loop until a final answer, the iteration
    /// ceiling, a fatal error, or cancellation
    pub async fn run_with_cancel(
        &self,
        query: &str,
        prior_turns: Vec<ConversationTurn>,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let started = Instant::now();
        let mut run = AgentRunState::new(prior_turns, self.settings.suggestion_limit);
        let ctx = ToolContext {
            run_id: run.run_id,
            profile: self.profile,
        };
        let tools = self.registry.definitions();
        let mut state = LoopState::Initializing;

        info!(
            run_id = %run.run_id,
            profile = %self.profile,
            prior_turns = run.turns.len(),
            "Assistant run started"
        );

        loop {
            state = match state {
                LoopState::Initializing => {
                    let notes =
                        load_remembered_context(self.store.as_ref(), self.settings.note_category)
                            .await;
                    debug!(run_id = %run.run_id, notes = notes.len(), "Loaded remembered context");

                    run.system = build_system_instruction(self.profile, &notes);
                    run.turns.push(ConversationTurn::user_text(query));
                    LoopState::AwaitingProviderResponse
                }

                LoopState::AwaitingProviderResponse => {
                    if cancel.is_cancelled() {
                        warn!(run_id = %run.run_id, iteration = run.iteration, "Run cancelled");
                        return Err(AgentError::Cancelled);
                    }

                    let request = ProviderRequest {
                        system: run.system.clone(),
                        turns: run.turns.clone(),
                        tools: tools.clone(),
                        max_tokens: self.settings.max_tokens,
                    };

                    let response = self.call_provider(&run, &request, &cancel).await?;
                    run.provider_calls += 1;

                    let invocation_count = response.invocations().len();
                    match response.finish {
                        FinishSignal::ToolUse if invocation_count > 0 => {
                            LoopState::Dispatching(response)
                        }
                        finish => {
                            if finish == FinishSignal::ToolUse {
                                warn!(
                                    run_id = %run.run_id,
                                    "Provider requested tools without any invocations, treating as complete"
                                );
                            }
                            LoopState::Terminated {
                                answer: response
                                    .answer_text()
                                    .unwrap_or_else(|| NO_TEXT_ANSWER.to_string()),
                                termination: Termination::Completed,
                            }
                        }
                    }
                }

                LoopState::Dispatching(response) => {
                    if cancel.is_cancelled() {
                        warn!(run_id = %run.run_id, iteration = run.iteration, "Run cancelled before dispatch");
                        return Err(AgentError::Cancelled);
                    }

                    let invocations = response.invocations();
                    run.turns
                        .push(ConversationTurn::assistant_blocks(response.blocks));
                    run.tool_calls_made
                        .extend(invocations.iter().map(|inv| inv.name.clone()));

                    debug!(
                        run_id = %run.run_id,
                        iteration = run.iteration,
                        tools = ?invocations.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
                        "Dispatching tool calls"
                    );

                    let outcomes = self.registry.dispatch_all(&invocations, &ctx).await;

                    if let Some(failed) = outcomes
                        .iter()
                        .find(|o| o.error_kind() == Some(ToolErrorKind::Persistence))
                    {
                        error!(
                            run_id = %run.run_id,
                            tool = %failed.tool_name,
                            "Context store write failed, aborting run"
                        );
                        let detail = match &failed.payload {
                            crate::models::OutcomePayload::Error { message, .. } => message.clone(),
                            crate::models::OutcomePayload::Success { .. } => String::new(),
                        };
                        return Err(AgentError::ContextStore(format!(
                            "{} failed: {}",
                            failed.tool_name, detail
                        )));
                    }

                    run.artifacts.observe_all(&outcomes);
                    run.turns.push(ConversationTurn::tool_outcomes(&outcomes));

                    run.iteration += 1;
                    if run.iteration >= self.settings.max_iterations {
                        warn!(
                            run_id = %run.run_id,
                            iterations = run.iteration,
                            "Iteration ceiling reached"
                        );
                        LoopState::Terminated {
                            answer: ITERATION_LIMIT_ANSWER.to_string(),
                            termination: Termination::IterationLimit,
                        }
                    } else {
                        LoopState::AwaitingProviderResponse
                    }
                }

                LoopState::Terminated {
                    answer,
                    termination,
                } => {
                    info!(
                        run_id = %run.run_id,
                        provider_calls = run.provider_calls,
                        tool_calls = run.tool_calls_made.len(),
                        termination = ?termination,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Assistant run finished"
                    );
                    return Ok(run.finish(answer, termination));
                }
            };
        }
    }

    async fn call_provider(
        &self,
        run: &AgentRunState,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse> {
        let provider = self.provider.as_ref();
        let run_id = run.run_id;
        let iteration = run.iteration;

        let response = retry::execute(&self.settings.retry, cancel, move |attempt| {
            debug!(%run_id, iteration, attempt, "Calling provider");
            provider.complete(request)
        })
        .await?;

        Ok(response)
    }
}
