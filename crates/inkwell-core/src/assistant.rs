//! Assistant facade: one async task per edit request.
//!
//! The assistant owns the shared pieces (orchestrator, tool registry,
//! documentation catalog) and turns a live document into an [`EditRequest`].
//! [`Assistant::spawn_edit`] runs the conversation on the tokio runtime and
//! returns an [`EditTask`] the caller can cancel or await.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::docs::{DocCatalog, processor_info_tool, render_system_variables};
use crate::document::{DocumentContext, DocumentSnapshot, apply_snapshot};
use crate::llm::LmGateway;
use crate::orchestrator::{
    ConversationError, ConversationOrchestrator, ConversationOutcome, EditRequest,
    OrchestratorSettings,
};
use crate::tools::{ToolDefinition, ToolRegistry, ToolScope};

/// What happened to the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditReport {
    /// The answer was written into the document.
    Applied(DocumentSnapshot),
    /// The model gave no usable answer; the document is unchanged.
    NoChange,
    /// The request was cancelled; the document is unchanged.
    Cancelled,
}

/// A request ready to run, detached from the live document.
pub struct PreparedEdit {
    pub request: EditRequest,
    pub tools: Arc<ToolRegistry>,
    pub scope: Box<dyn ToolScope>,
}

/// Handle to an edit running in the background.
pub struct EditTask {
    cancel: CancellationToken,
    handle: JoinHandle<Result<EditReport, ConversationError>>,
}

impl EditTask {
    /// Stop at the next turn boundary. A cancelled task never applies its
    /// result; an in-flight gateway call is left to finish.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to finish.
    pub async fn join(self) -> Result<EditReport, ConversationError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(ConversationError::Task(e.to_string())),
        }
    }
}

/// Shared assistant state. Cheap to clone.
#[derive(Clone)]
pub struct Assistant {
    orchestrator: Arc<ConversationOrchestrator>,
    tools: Arc<ToolRegistry>,
    catalog: Arc<DocCatalog>,
    general_info: Option<Arc<str>>,
}

impl Assistant {
    /// Build an assistant. The catalog's `get_processor_info` tool is
    /// registered automatically.
    pub fn new(gateway: Arc<dyn LmGateway>, settings: OrchestratorSettings, catalog: DocCatalog) -> Self {
        let catalog = Arc::new(catalog);
        let mut tools = ToolRegistry::new();
        tools.register(processor_info_tool(Arc::clone(&catalog)));
        Self {
            orchestrator: Arc::new(ConversationOrchestrator::new(gateway, settings)),
            tools: Arc::new(tools),
            catalog,
            general_info: None,
        }
    }

    /// Preamble placed first in every prompt's context.
    pub fn with_general_info(mut self, text: impl Into<String>) -> Self {
        let text: String = text.into();
        self.general_info = (!text.trim().is_empty()).then(|| Arc::from(text));
        self
    }

    /// Register an extra shared tool.
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        Arc::make_mut(&mut self.tools).register(tool);
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn catalog(&self) -> &DocCatalog {
        &self.catalog
    }

    pub fn orchestrator(&self) -> &ConversationOrchestrator {
        &self.orchestrator
    }

    /// Snapshot `document` and gather everything one conversation needs.
    pub fn prepare<D: DocumentContext + ?Sized>(&self, document: &D, instruction: &str) -> PreparedEdit {
        let mut request = EditRequest::new(document.snapshot(), instruction);
        if let Some(ref info) = self.general_info {
            request.context.push(info.to_string());
        }

        let processors = document.referenced_processors();
        request.context.push(self.catalog.render(&processors));
        request.context.push(document.documentation_for(&processors));
        request
            .context
            .push(render_system_variables(&document.system_variables()));
        request.context.retain(|paragraph| !paragraph.trim().is_empty());

        let declared = document.declared_tools();
        let tools = if declared.is_empty() {
            Arc::clone(&self.tools)
        } else {
            debug!(count = declared.len(), "layering document tools over shared registry");
            Arc::new(self.tools.with_overrides(declared))
        };

        PreparedEdit {
            request,
            tools,
            scope: document.tool_scope(),
        }
    }

    /// The prompt that would be sent for `document`, without calling the model.
    pub fn render_prompt<D: DocumentContext + ?Sized>(
        &self,
        document: &D,
        instruction: &str,
    ) -> Result<String, ConversationError> {
        let prepared = self.prepare(document, instruction);
        self.orchestrator.build_prompt(&prepared.request)
    }

    /// Run one edit in place and apply the result.
    pub async fn edit<D: DocumentContext + ?Sized>(
        &self,
        document: &mut D,
        instruction: &str,
    ) -> Result<EditReport, ConversationError> {
        let prepared = self.prepare(&*document, instruction);
        let outcome = self.run(prepared, &CancellationToken::new()).await?;
        Ok(match outcome {
            ConversationOutcome::Edit(snapshot) => {
                apply_snapshot(document, &snapshot);
                EditReport::Applied(snapshot)
            }
            ConversationOutcome::NoChange => EditReport::NoChange,
        })
    }

    /// Run one edit as a background task.
    ///
    /// The document lock is held only while snapshotting at the start and
    /// while applying at the end.
    pub fn spawn_edit<D>(&self, document: Arc<Mutex<D>>, instruction: impl Into<String>) -> EditTask
    where
        D: DocumentContext + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let assistant = self.clone();
        let instruction = instruction.into();

        let handle = tokio::spawn(async move {
            let prepared = {
                let doc = lock(&document)?;
                assistant.prepare(&*doc, &instruction)
            };

            let outcome = match assistant.run(prepared, &token).await {
                Ok(outcome) => outcome,
                Err(ConversationError::Cancelled) => return Ok(EditReport::Cancelled),
                Err(e) => return Err(e),
            };

            match outcome {
                ConversationOutcome::NoChange => Ok(EditReport::NoChange),
                ConversationOutcome::Edit(snapshot) => {
                    let mut doc = lock(&document)?;
                    if token.is_cancelled() {
                        return Ok(EditReport::Cancelled);
                    }
                    apply_snapshot(&mut *doc, &snapshot);
                    Ok(EditReport::Applied(snapshot))
                }
            }
        });

        EditTask { cancel, handle }
    }

    async fn run(
        &self,
        prepared: PreparedEdit,
        cancel: &CancellationToken,
    ) -> Result<ConversationOutcome, ConversationError> {
        let PreparedEdit {
            request,
            tools,
            mut scope,
        } = prepared;
        let report = self
            .orchestrator
            .run(&request, &tools, scope.as_mut(), cancel)
            .await?;
        info!(
            turns = report.state.turns(),
            input_tokens = report.usage.input_tokens,
            output_tokens = report.usage.output_tokens,
            "edit conversation finished"
        );
        Ok(report.outcome)
    }
}

fn lock<D>(document: &Mutex<D>) -> Result<MutexGuard<'_, D>, ConversationError> {
    document
        .lock()
        .map_err(|_| ConversationError::Task("document lock poisoned".to_string()))
}
