//! Tool-Call Orchestration
//!
//! Drives one conversational turn: call the provider, execute whatever tools
//! it requests, feed the results back and repeat until the provider answers
//! with plain text or the round cap is hit.
//!
//! ```text
//!   AwaitingProvider ──(tool calls)──▶ ExecutingTools
//!         ▲                                   │
//!         └───────────(results appended)──────┘
//!   AwaitingProvider ──(text only / cap)──▶ Done
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, TutorError};
use crate::message::{ConversationStore, Message, Role};
use crate::provider::{LlmProvider, ProviderResponse};
use crate::tool::{ToolCallRequest, ToolCallResult, ToolCatalog};

/// Orchestrator configuration
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Earlier messages sent to the provider per call; the current turn is
    /// always sent whole
    pub history_limit: usize,

    /// Tool-execution rounds allowed per turn
    pub max_rounds: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            max_rounds: 10,
        }
    }
}

/// States of a turn
#[derive(Debug)]
enum TurnState {
    AwaitingProvider,
    ExecutingTools(ProviderResponse),
    Done(String),
}

/// Advisory record of one executed tool call
#[derive(Clone, Debug, Serialize)]
pub struct ToolActivity {
    pub tool: String,
    pub description: String,
    pub success: bool,
    pub summary: String,
}

impl std::fmt::Display for ToolActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.description, self.summary)
    }
}

/// Result of a completed turn
#[derive(Clone, Debug, Default, Serialize)]
pub struct TurnOutcome {
    /// Final answer returned to the caller
    pub text: String,

    /// Tool-execution rounds performed
    pub rounds: usize,

    /// True when the turn stopped at the round cap
    pub round_limit_reached: bool,

    /// Executed tool calls, in order
    pub activity: Vec<ToolActivity>,
}

/// The tool-calling state machine
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolCatalog>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolCatalog>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolCatalog>) -> Self {
        Self::new(provider, tools, OrchestratorConfig::default())
    }

    /// Run one turn for `input`.
    ///
    /// The caller's `&mut` borrow gives this turn exclusive use of the store.
    /// Each round's assistant request and tool results are appended together,
    /// after all of that round's tools have finished. Every provider call sees
    /// the trimmed history from before this turn followed by the whole turn.
    pub async fn run_turn(
        &self,
        store: &mut ConversationStore,
        input: &str,
        system_prompt: &str,
    ) -> TurnOutcome {
        let mut context = store.context_window(self.config.history_limit).to_vec();
        let user = Message::user(input);
        store.push(user.clone());
        context.push(user);

        let definitions = self.tools.definitions();
        let mut outcome = TurnOutcome::default();
        let mut state = TurnState::AwaitingProvider;

        loop {
            state = match state {
                TurnState::AwaitingProvider => {
                    tracing::debug!(
                        provider = %self.provider.name(),
                        messages = context.len(),
                        round = outcome.rounds,
                        "Awaiting provider"
                    );
                    let response = self.provider.call(&context, system_prompt, &definitions).await;

                    if response.is_final() {
                        TurnState::Done(response.text)
                    } else if outcome.rounds >= self.config.max_rounds {
                        tracing::warn!(
                            max_rounds = self.config.max_rounds,
                            pending = response.tool_calls.len(),
                            "Tool round cap reached, discarding requests"
                        );
                        outcome.round_limit_reached = true;
                        let err = TutorError::MaxRounds(self.config.max_rounds);
                        TurnState::Done(err.user_message(self.provider.name()))
                    } else {
                        TurnState::ExecutingTools(response)
                    }
                }
                TurnState::ExecutingTools(mut response) => {
                    normalize_ids(&mut response.tool_calls);
                    let results = self.execute_round(&response.tool_calls, &mut outcome).await;

                    let request = Message::assistant_tool_calls(response.text, response.tool_calls);
                    store.push(request.clone());
                    context.push(request);
                    for result in &results {
                        let message = Message::tool_result(result);
                        store.push(message.clone());
                        context.push(message);
                    }

                    outcome.rounds += 1;
                    TurnState::AwaitingProvider
                }
                TurnState::Done(text) => {
                    store.append(Role::Assistant, text.clone());
                    outcome.text = text;
                    tracing::debug!(rounds = outcome.rounds, "Turn complete");
                    return outcome;
                }
            };
        }
    }

    /// Run a turn that is abandoned as soon as `cancel` resolves.
    ///
    /// A cancelled turn leaves the store at its last complete append.
    pub async fn run_turn_until<F>(
        &self,
        store: &mut ConversationStore,
        input: &str,
        system_prompt: &str,
        cancel: F,
    ) -> Result<TurnOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::select! {
            outcome = self.run_turn(store, input, system_prompt) => Ok(outcome),
            () = cancel => {
                tracing::info!("Turn cancelled");
                Err(TutorError::Cancelled)
            }
        }
    }

    /// Execute requests sequentially, in emission order
    async fn execute_round(
        &self,
        calls: &[ToolCallRequest],
        outcome: &mut TurnOutcome,
    ) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let description = self.tools.describe(call);
            tracing::info!(tool = %call.name, id = %call.id, "{}", description);

            let result = self.tools.execute(call).await;
            outcome.activity.push(ToolActivity {
                tool: call.name.clone(),
                description,
                success: result.success,
                summary: summarize(&result.output),
            });
            results.push(result);
        }

        results
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn tools(&self) -> &ToolCatalog {
        &self.tools
    }

    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
}

/// Give every request a unique, non-empty ID so results correlate one-to-one
fn normalize_ids(calls: &mut [ToolCallRequest]) {
    let mut seen = HashSet::new();
    for call in calls.iter_mut() {
        if call.id.trim().is_empty() || !seen.insert(call.id.clone()) {
            call.id = ToolCallRequest::generate_id();
            seen.insert(call.id.clone());
        }
    }
}

/// First line of a tool output, shortened
fn summarize(output: &str) -> String {
    let first = output.lines().next().unwrap_or_default();
    let lines = output.lines().count();
    let mut summary: String = first.chars().take(80).collect();
    if first.chars().count() > 80 {
        summary.push_str("...");
    }
    if lines > 1 {
        summary.push_str(&format!(" ({lines} lines)"));
    }
    summary
}
