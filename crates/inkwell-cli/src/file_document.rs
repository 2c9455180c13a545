//! A document backed by a file on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use inkwell_core::DocumentContext;
use inkwell_core::declarations::{declared_tools, extern_processors};
use inkwell_core::docs::BASE_PROCESSOR;
use inkwell_core::tools::{ToolDefinition, ToolError, ToolScope, argument_text};
use serde_json::Value;

/// A file loaded into memory. Edits stay in memory until [`FileDocument::save`].
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
    text: String,
    caret: usize,
    selection: (usize, usize),
    extra_processors: Vec<String>,
}

impl FileDocument {
    pub async fn open(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::from_text(path, text))
    }

    pub fn from_text(path: &Path, text: String) -> Self {
        Self {
            path: path.to_path_buf(),
            text,
            caret: 0,
            selection: (0, 0),
            extra_processors: Vec::new(),
        }
    }

    /// Place the caret, clamped to the text.
    pub fn with_caret(mut self, caret: usize) -> Self {
        let caret = caret.min(self.text.chars().count());
        self.caret = caret;
        self.selection = (caret, caret);
        self
    }

    /// Select a range, clamped to the text. The caret moves to its end.
    pub fn with_selection(mut self, start: usize, end: usize) -> Self {
        let len = self.text.chars().count();
        let (start, end) = (start.min(len), end.min(len));
        self.selection = (start.min(end), start.max(end));
        self.caret = self.selection.1;
        self
    }

    /// Document processors in addition to the ones the text references.
    pub fn with_processors(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.extra_processors.extend(names);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self) -> anyhow::Result<()> {
        tokio::fs::write(&self.path, &self.text).await?;
        Ok(())
    }
}

impl DocumentContext for FileDocument {
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
    }

    fn referenced_processors(&self) -> Vec<String> {
        let mut names = vec![BASE_PROCESSOR.to_string()];
        for name in extern_processors(&self.text)
            .into_iter()
            .chain(self.extra_processors.iter().cloned())
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn declared_tools(&self) -> Vec<ToolDefinition> {
        declared_tools(&self.text)
    }

    fn tool_scope(&self) -> Box<dyn ToolScope> {
        Box::new(VariableScope::default())
    }
}

/// Variables only. Fragments cannot run outside the editor runtime.
#[derive(Debug, Default)]
struct VariableScope {
    vars: HashMap<String, String>,
}

impl ToolScope for VariableScope {
    fn set_variable(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), argument_text(&value));
    }

    fn variable(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn run_fragment(&mut self, _action: &str) -> Result<(), ToolError> {
        Err(ToolError::Execution(
            "document fragments cannot run from the command line".to_string(),
        ))
    }
}
