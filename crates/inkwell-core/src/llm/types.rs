//! Common types for the language-model gateway.
//!
//! These define the conversation vocabulary shared by the orchestrator and
//! every gateway implementation: conversation items sent as input, output
//! items returned by the model, tool schemas, and token usage.

use serde::{Deserialize, Serialize};

/// One entry in a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    /// Prompt text from the user side.
    UserMessage { text: String },
    /// A tool invocation requested by the model.
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    /// The local result for the call with the same `call_id`.
    FunctionResult { call_id: String, output: String },
    /// Opaque intermediate reasoning, replayed verbatim.
    Reasoning { payload: serde_json::Value },
    /// Text produced by the model.
    AssistantMessage { text: String },
}

impl ConversationItem {
    pub fn user(text: impl Into<String>) -> Self {
        Self::UserMessage { text: text.into() }
    }

    pub fn function_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionResult {
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

/// An item produced by the model in one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    /// Final or interim assistant text.
    Message { text: String },
    /// A request to run a local tool.
    FunctionCall {
        call_id: String,
        name: String,
        arguments: String,
    },
    /// Opaque reasoning payload.
    Reasoning { payload: serde_json::Value },
}

impl OutputItem {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message { text: text.into() }
    }

    pub fn function_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::FunctionCall {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self, Self::FunctionCall { .. })
    }
}

impl From<OutputItem> for ConversationItem {
    fn from(item: OutputItem) -> Self {
        match item {
            OutputItem::Message { text } => ConversationItem::AssistantMessage { text },
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => ConversationItem::FunctionCall {
                call_id,
                name,
                arguments,
            },
            OutputItem::Reasoning { payload } => ConversationItem::Reasoning { payload },
        }
    }
}

/// A tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (the dispatch key).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// Request for one model round trip.
#[derive(Debug, Clone, Default)]
pub struct GatewayRequest {
    /// Model identifier (e.g. "gpt-5-mini").
    pub model: String,
    /// Full conversation so far.
    pub input: Vec<ConversationItem>,
    /// Tools the model may call.
    pub tools: Vec<ToolSchema>,
}

/// Response from one model round trip.
#[derive(Debug, Clone, Default)]
pub struct GatewayResponse {
    /// Output items in the order the model produced them.
    pub output: Vec<OutputItem>,
    /// Token usage, when the service reports it.
    pub usage: Option<Usage>,
}

impl GatewayResponse {
    pub fn new(output: Vec<OutputItem>) -> Self {
        Self {
            output,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub reasoning_tokens: u64,
}

impl Usage {
    /// Add another round trip's counts to this total.
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.cached_input_tokens += other.cached_input_tokens;
        self.output_tokens += other.output_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
    }
}
