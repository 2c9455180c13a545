#![deny(unsafe_code)]

//! Inkwell core: an AI editing assistant for structured documents.
//!
//! A request carries the document text, its caret or selection, and a
//! natural-language instruction. The caret and selection travel through the
//! model as marker tokens; the model may call local tools before answering
//! with a rewritten document, which is decoded and written back.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, the return type for async trait
/// methods that must stay object-safe (`Arc<dyn LmGateway>`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Async edit tasks over a live document.
pub mod assistant;
/// Tool and processor declarations embedded in document text.
pub mod declarations;
/// Processor documentation catalog and the `get_processor_info` tool.
pub mod docs;
/// Document snapshots, the document trait, and edit application.
pub mod document;
/// Model gateway trait, wire types, and the OpenAI Responses client.
pub mod llm;
/// Cursor and selection marker encoding.
pub mod marker;
/// The prompt / response / tool-call loop.
pub mod orchestrator;
/// Sectioned prompt rendering.
pub mod prompt;
/// Tool definitions, schemas, and dispatch.
pub mod tools;

pub use assistant::{Assistant, EditReport, EditTask};
pub use docs::DocCatalog;
pub use document::{DocumentContext, DocumentSnapshot};
pub use llm::{GatewayError, LmGateway};
pub use orchestrator::{
    ConversationError, ConversationOrchestrator, ConversationOutcome, EditRequest,
    OrchestratorSettings,
};
pub use tools::{ToolDefinition, ToolError, ToolRegistry, ToolScope};
