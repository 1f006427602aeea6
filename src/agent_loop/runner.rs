//! The tool-calling agent loop.
//!
//! A run alternates between asking the model for its next turn and working
//! through the tool calls that turn requested:
//!
//! ```text
//! INIT -> AWAIT_MODEL -> TERMINAL
//!              |   ^
//!              v   |
//!         AWAIT_APPROVAL (once per tool call)
//! ```
//!
//! Each tool call is gated by an approval. With [`ApprovalPolicy::Ask`] the
//! loop suspends there: [`AgentLoop::invoke`] returns
//! [`RunOutcome::Interrupted`] carrying a [`Checkpoint`], and
//! [`AgentLoop::resume`] continues from it once a decision is known.
//! [`AgentLoop::run`] drives the same steps against an [`ApprovalHandler`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AbacusConfig;
use crate::error::AbacusError;
use crate::provider::{self, ModelProvider, ProviderRequest};
use crate::tools::{ToolArguments, ToolRegistry};
use crate::types::{
    add_messages, AgentToolCall, AgentToolResult, GenerationSettings, ModelMessage, Usage,
};

use super::approvals::{ApprovalHandler, ApprovalPolicy, ApprovalRequest, REJECTION_RESULT};
use super::events::{RunEventEmitter, RunEventPayload, RunEventSink, RunLifecycle};
use super::types::{Checkpoint, PendingTurn, RunId, RunOutcome, RunResult};

/// System instruction prepended to every model call.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant tasked with performing arithmetic on a set of inputs.";

/// Tool-calling agent loop over a model provider and a tool registry.
pub struct AgentLoop {
    provider: Arc<dyn ModelProvider>,
    tools: ToolRegistry,
    system_prompt: String,
    settings: GenerationSettings,
    approval_policy: ApprovalPolicy,
    max_iterations: Option<usize>,
    event_sink: Option<RunEventSink>,
}

/// Progress of one run between steps.
struct RunState {
    run_id: RunId,
    messages: Vec<ModelMessage>,
    pending: Option<PendingTurn>,
    model_calls: usize,
    usage: Usage,
}

impl RunState {
    fn into_checkpoint(self, pending: PendingTurn) -> Checkpoint {
        Checkpoint {
            run_id: self.run_id,
            messages: self.messages,
            pending,
            model_calls: self.model_calls,
            usage: self.usage,
            next_event_seq: 0,
            created_at: Utc::now(),
        }
    }
}

impl From<Checkpoint> for RunState {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            run_id: checkpoint.run_id,
            messages: checkpoint.messages,
            pending: Some(checkpoint.pending),
            model_calls: checkpoint.model_calls,
            usage: checkpoint.usage,
        }
    }
}

impl AgentLoop {
    /// Create a loop with the arithmetic tools, the default system prompt and
    /// [`ApprovalPolicy::Ask`].
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            tools: ToolRegistry::arithmetic(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            settings: GenerationSettings::default(),
            approval_policy: ApprovalPolicy::Ask,
            max_iterations: None,
            event_sink: None,
        }
    }

    /// Build the provider for the configured model.
    pub fn from_config(config: &AbacusConfig) -> Result<Self, AbacusError> {
        let model = config.model()?;
        let provider = provider::create_provider(&model, config)?;
        Ok(Self::new(Arc::from(provider)).with_max_iterations(config.max_iterations()))
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_approval_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.approval_policy = policy;
        self
    }

    /// Fail a run once it has made this many model calls. `None` (the
    /// default) never stops the loop.
    pub fn with_max_iterations(mut self, limit: Option<usize>) -> Self {
        self.max_iterations = limit;
        self
    }

    pub fn with_event_sink(mut self, sink: RunEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn approval_policy(&self) -> ApprovalPolicy {
        self.approval_policy
    }

    /// Ask the model for its next turn given the conversation so far.
    ///
    /// The system prompt is prepended to the request only; `messages` is not
    /// modified.
    pub async fn call_model(&self, messages: &[ModelMessage]) -> Result<ModelMessage, AbacusError> {
        self.model_turn(messages).await.map(|(message, _)| message)
    }

    async fn model_turn(&self, messages: &[ModelMessage]) -> Result<(ModelMessage, Usage), AbacusError> {
        let mut request_messages = Vec::with_capacity(messages.len() + 1);
        request_messages.push(ModelMessage::system(self.system_prompt.clone()));
        request_messages.extend(messages.iter().cloned());

        let tools = if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.definitions())
        };
        let request = ProviderRequest {
            messages: request_messages,
            settings: self.settings.clone(),
            tools,
        };
        let response = self.provider.generate_text(&request).await?;
        let usage = response.usage.clone();
        Ok((response.into_message(), usage))
    }

    /// Run one approved tool call, or record the rejection without running it.
    pub async fn execute_action(
        &self,
        call: &AgentToolCall,
        approved: bool,
    ) -> Result<AgentToolResult, AbacusError> {
        if !approved {
            warn!(tool = %call.name, call_id = %call.id, "tool call rejected");
            return Ok(AgentToolResult {
                tool_call_id: call.id.clone(),
                result: serde_json::Value::String(REJECTION_RESULT.to_string()),
                is_error: false,
            });
        }

        let tool = self.tools.get(&call.name)?;
        let args = ToolArguments::new(call.arguments.clone());
        let result = tool.execute(&args).await?;
        debug!(tool = %call.name, call_id = %call.id, %result, "tool call executed");
        Ok(AgentToolResult {
            tool_call_id: call.id.clone(),
            result,
            is_error: false,
        })
    }

    /// Start a run from new `input` appended to optional `previous` history.
    pub async fn invoke(
        &self,
        input: Vec<ModelMessage>,
        previous: Option<Vec<ModelMessage>>,
    ) -> Result<RunOutcome, AbacusError> {
        let run_id = Uuid::new_v4();
        let messages = match previous {
            Some(previous) => add_messages(previous, input),
            None => input,
        };
        let emitter = RunEventEmitter::new(run_id, self.event_sink.clone());
        emitter.lifecycle(RunLifecycle::Started);
        debug!(%run_id, messages = messages.len(), "run started");

        let state = RunState {
            run_id,
            messages,
            pending: None,
            model_calls: 0,
            usage: Usage::default(),
        };
        self.drive(state, None, &emitter).await
    }

    /// Continue a suspended run, applying `approved` to its pending tool call.
    ///
    /// The decision settles that call even when the loop's policy is
    /// `Always` or `Never`; the policy governs only the calls after it.
    /// Fails with `InvalidState` if the checkpoint has no call awaiting a
    /// decision.
    pub async fn resume(&self, checkpoint: Checkpoint, approved: bool) -> Result<RunOutcome, AbacusError> {
        if checkpoint.pending_call().is_none() {
            return Err(AbacusError::InvalidState(format!(
                "run {} has no tool call awaiting approval",
                checkpoint.run_id
            )));
        }
        let emitter = RunEventEmitter::starting_at(
            checkpoint.run_id,
            checkpoint.next_event_seq,
            self.event_sink.clone(),
        );
        emitter.lifecycle(RunLifecycle::Resumed);
        debug!(run_id = %checkpoint.run_id, approved, "run resumed");
        self.drive(RunState::from(checkpoint), Some(approved), &emitter)
            .await
    }

    /// Run to completion, asking `approver` at every approval point.
    pub async fn run(
        &self,
        input: Vec<ModelMessage>,
        previous: Option<Vec<ModelMessage>>,
        approver: &ApprovalHandler,
    ) -> Result<RunResult, AbacusError> {
        let mut outcome = self.invoke(input, previous).await?;
        loop {
            match outcome {
                RunOutcome::Completed(result) => return Ok(result),
                RunOutcome::Interrupted { request, checkpoint } => {
                    let approved = approver(request).await;
                    outcome = self.resume(checkpoint, approved).await?;
                }
            }
        }
    }

    async fn drive(
        &self,
        state: RunState,
        decision: Option<bool>,
        emitter: &RunEventEmitter,
    ) -> Result<RunOutcome, AbacusError> {
        match self.step_until_blocked(state, decision, emitter).await {
            Ok(mut outcome) => {
                match &mut outcome {
                    RunOutcome::Completed(result) => {
                        info!(
                            run_id = %result.run_id,
                            model_calls = result.model_calls,
                            messages = result.messages.len(),
                            "run completed"
                        );
                        emitter.lifecycle(RunLifecycle::Completed);
                    }
                    RunOutcome::Interrupted { request, checkpoint } => {
                        info!(
                            run_id = %checkpoint.run_id,
                            tool = %request.tool_call.name,
                            call_id = %request.tool_call.id,
                            "run interrupted for approval"
                        );
                        emitter.emit(RunEventPayload::ApprovalRequired {
                            request: request.clone(),
                        });
                        emitter.lifecycle(RunLifecycle::Interrupted);
                        checkpoint.next_event_seq = emitter.next_seq();
                    }
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!(error = %err, "run failed");
                emitter.lifecycle(RunLifecycle::Failed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn step_until_blocked(
        &self,
        mut state: RunState,
        mut decision: Option<bool>,
        emitter: &RunEventEmitter,
    ) -> Result<RunOutcome, AbacusError> {
        loop {
            let Some(mut turn) = state.pending.take() else {
                if let Some(limit) = self.max_iterations {
                    if state.model_calls >= limit {
                        return Err(AbacusError::InvalidState(format!(
                            "tool loop exceeded {limit} model calls"
                        )));
                    }
                }

                let (assistant, usage) = self.model_turn(&state.messages).await?;
                state.model_calls += 1;
                state.usage.merge(&usage);
                debug!(
                    run_id = %state.run_id,
                    iteration = state.model_calls,
                    tool_calls = assistant.tool_calls().len(),
                    "model responded"
                );
                emitter.emit(RunEventPayload::ModelResponse {
                    message: assistant.clone(),
                });

                if !assistant.has_tool_calls() {
                    let messages = add_messages(state.messages, vec![assistant]);
                    return Ok(RunOutcome::Completed(RunResult {
                        run_id: state.run_id,
                        messages,
                        model_calls: state.model_calls,
                        usage: state.usage,
                        finished_at: Utc::now(),
                    }));
                }
                state.pending = Some(PendingTurn::new(assistant));
                continue;
            };

            let Some(call) = turn.next_call() else {
                let mut batch = Vec::with_capacity(turn.results.len() + 1);
                batch.push(turn.assistant);
                batch.extend(turn.results);
                state.messages = add_messages(state.messages, batch);
                decision = None;
                continue;
            };

            let approved = match (decision.take(), self.approval_policy) {
                (Some(approved), _) => approved,
                (None, ApprovalPolicy::Always) => true,
                (None, ApprovalPolicy::Never) => false,
                (None, ApprovalPolicy::Ask) => {
                    let request = ApprovalRequest::for_call(call);
                    return Ok(RunOutcome::Interrupted {
                        request,
                        checkpoint: state.into_checkpoint(turn),
                    });
                }
            };

            let result = self.execute_action(&call, approved).await?;
            emitter.emit(RunEventPayload::ToolResult {
                call,
                result: result.clone(),
            });
            turn.results.push(ModelMessage::tool_result(result));
            state.pending = Some(turn);
        }
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .field("tools", &self.tools)
            .field("approval_policy", &self.approval_policy)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}
