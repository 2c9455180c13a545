//! In-memory document for assistant tests.
//!
//! [`MemoryDocument`] implements [`DocumentContext`] over a plain string.
//! Fragment execution is scripted: register a closure per fragment text with
//! [`MemoryDocument::on_fragment`] and document-embedded tools will run it
//! against a [`MemoryScope`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use inkwell_core::docs::BASE_PROCESSOR;
use inkwell_core::tools::{ToolDefinition, ToolError, ToolScope, argument_text};
use inkwell_core::{DocumentContext, DocumentSnapshot};
use serde_json::Value;

type FragmentFn = Arc<dyn Fn(&mut MemoryScope) -> Result<(), ToolError> + Send + Sync>;

/// Variable namespace handed to document-embedded tools.
pub struct MemoryScope {
    vars: HashMap<String, String>,
    fragments: HashMap<String, FragmentFn>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MemoryScope {
    /// Set a variable from inside a fragment closure.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl ToolScope for MemoryScope {
    fn set_variable(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), argument_text(&value));
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn run_fragment(&mut self, action: &str) -> Result<(), ToolError> {
        self.log
            .lock()
            .expect("fragment log poisoned")
            .push(action.to_string());
        let fragment = self
            .fragments
            .get(action)
            .cloned()
            .ok_or_else(|| ToolError::Execution(format!("no fragment scripted for {action:?}")))?;
        fragment(self)
    }
}

/// A document held in memory.
pub struct MemoryDocument {
    pub text: String,
    pub caret: usize,
    pub selection: (usize, usize),
    pub tools: Vec<ToolDefinition>,
    pub processors: Vec<String>,
    pub system_variables: Vec<String>,
    pub documentation: String,
    /// Number of `apply_text` calls.
    pub apply_count: usize,
    /// Number of `after_apply` calls.
    pub after_apply_count: usize,
    fragments: HashMap<String, FragmentFn>,
    fragment_log: Arc<Mutex<Vec<String>>>,
}

impl MemoryDocument {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            caret: 0,
            selection: (0, 0),
            tools: Vec::new(),
            processors: vec![BASE_PROCESSOR.to_string()],
            system_variables: Vec::new(),
            documentation: String::new(),
            apply_count: 0,
            after_apply_count: 0,
            fragments: HashMap::new(),
            fragment_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_caret(mut self, caret: usize) -> Self {
        self.caret = caret;
        self.selection = (caret, caret);
        self
    }

    pub fn with_selection(mut self, start: usize, end: usize) -> Self {
        self.selection = (start, end);
        self
    }

    /// Declare a document-embedded tool.
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_processor(mut self, name: &str) -> Self {
        self.processors.push(name.to_string());
        self
    }

    pub fn with_system_variable(mut self, name: &str) -> Self {
        self.system_variables.push(name.to_string());
        self
    }

    pub fn with_documentation(mut self, text: &str) -> Self {
        self.documentation = text.to_string();
        self
    }

    /// Script what running `action` does.
    pub fn on_fragment<F>(mut self, action: &str, effect: F) -> Self
    where
        F: Fn(&mut MemoryScope) -> Result<(), ToolError> + Send + Sync + 'static,
    {
        self.fragments.insert(action.to_string(), Arc::new(effect));
        self
    }

    /// Fragments run so far, across every scope this document handed out.
    pub fn fragments_run(&self) -> Vec<String> {
        self.fragment_log
            .lock()
            .expect("fragment log poisoned")
            .clone()
    }

    pub fn current(&self) -> DocumentSnapshot {
        self.snapshot()
    }
}

impl DocumentContext for MemoryDocument {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn caret(&self) -> usize {
        self.caret
    }

    fn selection(&self) -> (usize, usize) {
        self.selection
    }

    fn apply_text(&mut self, text: &str, caret: usize, selection_start: usize, selection_end: usize) {
        self.text = text.to_string();
        self.caret = caret;
        self.selection = (selection_start, selection_end);
        self.apply_count += 1;
    }

    fn declared_tools(&self) -> Vec<ToolDefinition> {
        self.tools.clone()
    }

    fn documentation_for(&self, _names: &[String]) -> String {
        self.documentation.clone()
    }

    fn referenced_processors(&self) -> Vec<String> {
        self.processors.clone()
    }

    fn system_variables(&self) -> Vec<String> {
        self.system_variables.clone()
    }

    fn tool_scope(&self) -> Box<dyn ToolScope> {
        Box::new(MemoryScope {
            vars: HashMap::new(),
            fragments: self.fragments.clone(),
            log: Arc::clone(&self.fragment_log),
        })
    }

    fn after_apply(&mut self) {
        self.after_apply_count += 1;
    }
}
