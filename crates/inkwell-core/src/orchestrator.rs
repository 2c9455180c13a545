//! Conversation orchestrator: drives one edit request through the model.
//!
//! ```text
//! BuildingPrompt ─▶ AwaitingResponse ─┬─▶ HandlingToolCalls ─▶ AwaitingResponse ...
//!                                     └─▶ EmittingResult ─▶ Done
//!                         (any state) ─▶ Failed
//! ```
//!
//! The orchestrator never touches a live document. It takes a
//! [`DocumentSnapshot`] in and hands a new snapshot back, so it can be driven
//! entirely from tests with a scripted gateway.

use std::sync::Arc;

use inkwell_config::{AssistantConfig, LlmConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::document::{DocumentSnapshot, extract_payload, resolve_edit};
use crate::llm::{ConversationItem, GatewayError, GatewayRequest, LmGateway, OutputItem, Usage};
use crate::marker::{self, MarkerError};
use crate::prompt::PromptAssembler;
use crate::tools::{ToolRegistry, ToolScope};

/// Round trips allowed per request unless configured otherwise.
pub const DEFAULT_MAX_TURNS: u32 = 4;

/// Per-orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    /// Maximum number of gateway round trips for one request.
    pub max_turns: u32,
    /// Fence tag for the source section and the expected answer.
    pub content_type: String,
    /// Custom instruction, rendered ahead of the marker vocabulary.
    pub instruction: Option<String>,
    /// Log the rendered prompt and raw model output.
    pub log_transcript: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            model: crate::llm::openai::DEFAULT_MODEL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            content_type: "xml".to_string(),
            instruction: None,
            log_transcript: false,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(llm: &LlmConfig, assistant: &AssistantConfig) -> Self {
        Self {
            model: llm.model.clone(),
            max_turns: assistant.max_turns,
            content_type: assistant.content_type.clone(),
            instruction: assistant.instruction.clone(),
            log_transcript: assistant.log_transcript,
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }
}

/// Where a conversation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BuildingPrompt,
    AwaitingResponse,
    HandlingToolCalls,
    EmittingResult,
    Done,
    Failed,
}

/// The item log of one request, owned by the orchestrator while it runs.
#[derive(Debug, Clone)]
pub struct ConversationState {
    items: Vec<ConversationItem>,
    phase: Phase,
    turns: u32,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            phase: Phase::BuildingPrompt,
            turns: 0,
        }
    }

    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Gateway round trips made so far.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Call ids of function calls that have no result yet.
    pub fn unanswered_calls(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ConversationItem::FunctionCall { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .filter(|id| {
                !self.items.iter().any(|item| {
                    matches!(item, ConversationItem::FunctionResult { call_id, .. } if call_id == id)
                })
            })
            .collect()
    }

    fn push(&mut self, item: ConversationItem) {
        self.items.push(item);
    }

    fn transition(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, turn = self.turns, "conversation phase");
        self.phase = phase;
    }
}

/// Everything the orchestrator needs for one request.
#[derive(Debug, Clone, Default)]
pub struct EditRequest {
    pub snapshot: DocumentSnapshot,
    /// The user's natural-language instruction.
    pub instruction: String,
    /// Context paragraphs (general info, processor docs, variables).
    pub context: Vec<String>,
    pub hint: Option<String>,
}

impl EditRequest {
    pub fn new(snapshot: DocumentSnapshot, instruction: impl Into<String>) -> Self {
        Self {
            snapshot,
            instruction: instruction.into(),
            context: Vec::new(),
            hint: None,
        }
    }

    pub fn with_context(mut self, text: impl Into<String>) -> Self {
        self.context.push(text.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    /// The model answered with a document; apply this snapshot.
    Edit(DocumentSnapshot),
    /// The model produced no message; leave the document alone.
    NoChange,
}

/// Result of a finished conversation.
#[derive(Debug, Clone)]
pub struct ConversationReport {
    pub outcome: ConversationOutcome,
    pub state: ConversationState,
    /// Token usage summed over every round trip.
    pub usage: Usage,
}

/// Terminal failures of a conversation. The document is never modified
/// when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    #[error("rate limited by the model service (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("no final answer after {limit} turns")]
    TooManyTurns { limit: u32 },

    #[error("conversation cancelled")]
    Cancelled,

    #[error("cannot build prompt: {0}")]
    Prompt(#[source] MarkerError),

    #[error("cannot decode markers in the answer: {0}")]
    Marker(#[from] MarkerError),

    #[error("gateway error: {0}")]
    Gateway(GatewayError),

    #[error("edit task failed: {0}")]
    Task(String),
}

impl From<GatewayError> for ConversationError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::RateLimited { retry_after_secs } => {
                ConversationError::RateLimited { retry_after_secs }
            }
            other => ConversationError::Gateway(other),
        }
    }
}

/// Drives the prompt / response / tool-call loop against a gateway.
pub struct ConversationOrchestrator {
    gateway: Arc<dyn LmGateway>,
    settings: OrchestratorSettings,
}

impl ConversationOrchestrator {
    pub fn new(gateway: Arc<dyn LmGateway>, settings: OrchestratorSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Render the initial user message for `request`.
    pub fn build_prompt(&self, request: &EditRequest) -> Result<String, ConversationError> {
        let mut assembler = PromptAssembler::new();
        for paragraph in &request.context {
            assembler.add_context(paragraph.as_str());
        }
        if let Some(ref instruction) = self.settings.instruction {
            assembler.set_instruction(format!(
                "{}\n\n{}",
                instruction.trim_end(),
                marker::vocabulary()
            ));
        }
        if let Some(ref hint) = request.hint {
            assembler.set_hint(hint.as_str());
        }

        let snapshot = &request.snapshot;
        let (start, end) = snapshot.selection_bounds();
        assembler
            .set_source(&snapshot.text, &self.settings.content_type, snapshot.caret, start, end)
            .map_err(ConversationError::Prompt)?;
        assembler.set_input(request.instruction.as_str());

        Ok(assembler.build())
    }

    /// Run one conversation to completion.
    ///
    /// Tool calls are dispatched against `tools` with `scope` as the calling
    /// document's namespace. A failed dispatch is logged and answered with an
    /// empty result so the model can recover. Calls that arrive on the last
    /// allowed turn are not dispatched. `cancel` is checked before every
    /// round trip and before the answer is decoded. An answer without
    /// document text is a no-op.
    pub async fn run(
        &self,
        request: &EditRequest,
        tools: &ToolRegistry,
        scope: &mut dyn ToolScope,
        cancel: &CancellationToken,
    ) -> Result<ConversationReport, ConversationError> {
        let mut state = ConversationState::new();
        let prompt = self.build_prompt(request)?;
        if self.settings.log_transcript {
            info!(target: "inkwell::transcript", prompt = %prompt, "Input");
        }
        state.push(ConversationItem::user(prompt));

        let schemas = tools.schemas();
        let mut usage = Usage::default();

        loop {
            if cancel.is_cancelled() {
                state.transition(Phase::Failed);
                return Err(ConversationError::Cancelled);
            }
            if state.turns >= self.settings.max_turns {
                warn!(limit = self.settings.max_turns, "turn limit reached without a final answer");
                state.transition(Phase::Failed);
                return Err(ConversationError::TooManyTurns {
                    limit: self.settings.max_turns,
                });
            }

            state.transition(Phase::AwaitingResponse);
            state.turns += 1;
            let gateway_request = GatewayRequest {
                model: self.settings.model.clone(),
                input: state.items.clone(),
                tools: schemas.clone(),
            };
            debug!(
                gateway = self.gateway.name(),
                turn = state.turns,
                items = gateway_request.input.len(),
                "submitting conversation"
            );

            let response = match self.gateway.respond(&gateway_request).await {
                Ok(response) => response,
                Err(e) => {
                    state.transition(Phase::Failed);
                    return Err(e.into());
                }
            };

            if let Some(ref turn_usage) = response.usage {
                info!(
                    turn = state.turns,
                    input_tokens = turn_usage.input_tokens,
                    cached_tokens = turn_usage.cached_input_tokens,
                    output_tokens = turn_usage.output_tokens,
                    reasoning_tokens = turn_usage.reasoning_tokens,
                    "token usage"
                );
                usage.accumulate(turn_usage);
            }
            if self.settings.log_transcript {
                info!(target: "inkwell::transcript", output = ?response.output, "Output");
            }

            if !response.output.iter().any(OutputItem::is_function_call) {
                state.transition(Phase::EmittingResult);
                let message = response.output.iter().find_map(|item| match item {
                    OutputItem::Message { text } if !text.trim().is_empty() => Some(text.clone()),
                    _ => None,
                });
                for item in response.output {
                    state.push(item.into());
                }

                let Some(message) = message else {
                    warn!(turn = state.turns, "response carried no message, leaving document unchanged");
                    state.transition(Phase::Done);
                    return Ok(ConversationReport {
                        outcome: ConversationOutcome::NoChange,
                        state,
                        usage,
                    });
                };

                if cancel.is_cancelled() {
                    state.transition(Phase::Failed);
                    return Err(ConversationError::Cancelled);
                }

                let payload = extract_payload(&message, &self.settings.content_type);
                let decoded = match marker::decode_all(payload) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        state.transition(Phase::Failed);
                        return Err(e.into());
                    }
                };
                if decoded.text.trim().is_empty() {
                    warn!(turn = state.turns, "answer carried no document, leaving document unchanged");
                    state.transition(Phase::Done);
                    return Ok(ConversationReport {
                        outcome: ConversationOutcome::NoChange,
                        state,
                        usage,
                    });
                }
                let snapshot = resolve_edit(&request.snapshot, decoded);
                state.transition(Phase::Done);
                return Ok(ConversationReport {
                    outcome: ConversationOutcome::Edit(snapshot),
                    state,
                    usage,
                });
            }

            // Results of this batch could never be submitted.
            if state.turns >= self.settings.max_turns {
                warn!(
                    limit = self.settings.max_turns,
                    "turn limit reached with tool calls pending, not dispatching them"
                );
                state.transition(Phase::Failed);
                return Err(ConversationError::TooManyTurns {
                    limit: self.settings.max_turns,
                });
            }

            state.transition(Phase::HandlingToolCalls);
            for item in response.output {
                let (call_id, name, arguments) = match item {
                    OutputItem::FunctionCall {
                        call_id,
                        name,
                        arguments,
                    } => (call_id, name, arguments),
                    other => {
                        state.push(other.into());
                        continue;
                    }
                };

                let output = match tools.dispatch(&name, &arguments, scope) {
                    Ok(output) => output.unwrap_or_default(),
                    Err(e) => {
                        warn!(tool = %name, call_id = %call_id, error = %e, "tool call failed, answering with an empty result");
                        String::new()
                    }
                };
                debug!(tool = %name, call_id = %call_id, bytes = output.len(), "tool call answered");

                state.push(ConversationItem::FunctionCall {
                    call_id: call_id.clone(),
                    name,
                    arguments,
                });
                state.push(ConversationItem::function_result(call_id, output));
            }
        }
    }
}
