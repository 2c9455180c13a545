//! Document context: the editor-side collaborator the assistant reads from
//! and writes back into.
//!
//! Offsets are character (Unicode scalar value) indices throughout, matching
//! [`crate::marker`].

use crate::docs::BASE_PROCESSOR;
use crate::marker::Decoded;
use crate::tools::{ToolDefinition, ToolScope};

/// An immutable view of a document's text and caret state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentSnapshot {
    pub text: String,
    pub caret: usize,
    /// Selected range, `None` when nothing is selected.
    pub selection: Option<(usize, usize)>,
}

impl DocumentSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            caret: 0,
            selection: None,
        }
    }

    pub fn with_caret(mut self, caret: usize) -> Self {
        self.caret = caret;
        self
    }

    /// Set the selection. An empty range (`start == end`) clears it.
    pub fn with_selection(mut self, start: usize, end: usize) -> Self {
        self.selection = (start != end).then_some((start, end));
        self
    }

    /// Selection as a `(start, end)` pair, collapsed onto the caret when
    /// nothing is selected.
    pub fn selection_bounds(&self) -> (usize, usize) {
        self.selection.unwrap_or((self.caret, self.caret))
    }

    /// Length of the text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A document open in the editor.
///
/// Implementations are owned by the editing surface. The assistant reads a
/// snapshot before a conversation starts and writes at most once when it
/// ends; nothing is read or written while the model is being consulted.
pub trait DocumentContext: Send {
    fn text(&self) -> String;

    fn caret(&self) -> usize;

    /// Current selection; `start == end` when nothing is selected.
    fn selection(&self) -> (usize, usize);

    /// Replace the whole text and place the caret and selection.
    fn apply_text(&mut self, text: &str, caret: usize, selection_start: usize, selection_end: usize);

    /// Tools declared inside the document itself.
    fn declared_tools(&self) -> Vec<ToolDefinition> {
        Vec::new()
    }

    /// Extra usage documentation for the named processors, beyond what the
    /// shared catalog knows.
    fn documentation_for(&self, _names: &[String]) -> String {
        String::new()
    }

    /// Processor identifiers used by the document. Always includes the base
    /// processor.
    fn referenced_processors(&self) -> Vec<String> {
        vec![BASE_PROCESSOR.to_string()]
    }

    /// Names of the variables the runtime predefines for this document.
    fn system_variables(&self) -> Vec<String> {
        Vec::new()
    }

    /// A fresh variable namespace and fragment executor for one conversation.
    fn tool_scope(&self) -> Box<dyn ToolScope>;

    /// Post-edit hook (recompile, refresh views). Runs only after a
    /// non-blank text was applied.
    fn after_apply(&mut self) {}

    fn snapshot(&self) -> DocumentSnapshot {
        let (start, end) = self.selection();
        DocumentSnapshot::new(self.text())
            .with_caret(self.caret())
            .with_selection(start, end)
    }
}

/// The document payload of a model answer.
///
/// Returns the text between the first "```<content_type>\n" fence and the
/// next closing fence, minus one trailing newline. Without a complete fence
/// the whole message is the payload.
pub fn extract_payload<'a>(message: &'a str, content_type: &str) -> &'a str {
    let opening = format!("```{content_type}\n");
    let Some(start) = message.find(&opening) else {
        return message;
    };
    let body = &message[start + opening.len()..];
    match body.find("```") {
        Some(end) => {
            let payload = &body[..end];
            payload.strip_suffix('\n').unwrap_or(payload)
        }
        None => message,
    }
}

/// Turn a decoded answer into the snapshot to apply.
///
/// The caret comes from the cursor marker, or stays where it was when the
/// model dropped it. A selection is set only when both selection markers
/// came back. Every offset is clamped to the new text.
pub fn resolve_edit(previous: &DocumentSnapshot, decoded: Decoded) -> DocumentSnapshot {
    let len = decoded.text.chars().count();
    let caret = decoded
        .placement
        .cursor()
        .unwrap_or(previous.caret)
        .min(len);
    let selection = decoded
        .placement
        .selection()
        .map(|(start, end)| (start.min(len), end.min(len)))
        .filter(|(start, end)| start != end);

    DocumentSnapshot {
        text: decoded.text,
        caret,
        selection,
    }
}

/// Write `snapshot` into `document`, then run the post-edit hook when the
/// new text is not blank.
pub fn apply_snapshot<D: DocumentContext + ?Sized>(document: &mut D, snapshot: &DocumentSnapshot) {
    let (start, end) = snapshot.selection_bounds();
    document.apply_text(&snapshot.text, snapshot.caret, start, end);
    if !snapshot.text.trim().is_empty() {
        document.after_apply();
    }
}
