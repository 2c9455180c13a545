//! Prompt assembly from named sections.
//!
//! Sections render in a fixed order (context, instruction, hint, source,
//! examples, input), each under a `Label:` heading and separated by a blank
//! line. Empty sections are omitted.

use crate::marker::{self, MarkerError};

/// A named prompt section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Context,
    Instruction,
    Hint,
    Source,
    Examples,
    Input,
}

impl Section {
    /// Render order.
    pub const ORDER: [Section; 6] = [
        Section::Context,
        Section::Instruction,
        Section::Hint,
        Section::Source,
        Section::Examples,
        Section::Input,
    ];

    pub const fn heading(self) -> &'static str {
        match self {
            Section::Context => "Context",
            Section::Instruction => "Instruction",
            Section::Hint => "Hint",
            Section::Source => "Source",
            Section::Examples => "Examples",
            Section::Input => "Input",
        }
    }
}

/// Document text with embedded markers, fenced under a content-type tag.
#[derive(Debug, Clone)]
struct SourceBlock {
    content_type: String,
    marked: String,
}

/// Accumulates prompt sections and renders them into one text blob.
///
/// Context and examples append (joined by a paragraph break); every other
/// section keeps the last value written.
///
/// When a source is set and no instruction was given, the instruction
/// section falls back to the marker vocabulary so the model knows how to
/// read and emit marker tokens.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    context: Vec<String>,
    instruction: Option<String>,
    hint: Option<String>,
    source: Option<SourceBlock>,
    examples: Vec<String>,
    input: Option<String>,
}

impl PromptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a context paragraph.
    pub fn add_context(&mut self, text: impl Into<String>) -> &mut Self {
        push_non_empty(&mut self.context, text.into());
        self
    }

    /// Set the instruction. This replaces the marker vocabulary fallback, so
    /// callers with a custom instruction should append the vocabulary themselves.
    pub fn set_instruction(&mut self, text: impl Into<String>) -> &mut Self {
        self.instruction = Some(text.into());
        self
    }

    pub fn set_hint(&mut self, text: impl Into<String>) -> &mut Self {
        self.hint = Some(text.into());
        self
    }

    /// Set the document source, embedding the caret or selection as markers.
    pub fn set_source(
        &mut self,
        text: &str,
        content_type: &str,
        caret: usize,
        selection_start: usize,
        selection_end: usize,
    ) -> Result<&mut Self, MarkerError> {
        let marked = marker::encode(text, caret, selection_start, selection_end)?;
        self.source = Some(SourceBlock {
            content_type: content_type.to_string(),
            marked,
        });
        Ok(self)
    }

    /// Append an examples paragraph.
    pub fn add_examples(&mut self, text: impl Into<String>) -> &mut Self {
        push_non_empty(&mut self.examples, text.into());
        self
    }

    pub fn set_input(&mut self, text: impl Into<String>) -> &mut Self {
        self.input = Some(text.into());
        self
    }

    /// Body text for a section, before emptiness filtering.
    fn body(&self, section: Section) -> Option<String> {
        match section {
            Section::Context => Some(self.context.join("\n\n")),
            Section::Instruction => match (&self.instruction, &self.source) {
                (Some(text), _) => Some(text.clone()),
                (None, Some(_)) => Some(marker::vocabulary()),
                (None, None) => None,
            },
            Section::Hint => self.hint.clone(),
            Section::Source => self
                .source
                .as_ref()
                .map(|s| format!("```{}\n{}\n```", s.content_type, s.marked)),
            Section::Examples => Some(self.examples.join("\n\n")),
            Section::Input => self.input.clone(),
        }
    }

    /// Render every non-empty section in order.
    pub fn build(&self) -> String {
        let rendered: Vec<String> = Section::ORDER
            .iter()
            .filter_map(|section| {
                let body = self.body(*section)?;
                let body = body.trim_end();
                if body.trim().is_empty() {
                    None
                } else {
                    Some(format!("{}:\n{}", section.heading(), body))
                }
            })
            .collect();

        if rendered.is_empty() {
            return String::new();
        }
        let mut out = rendered.join("\n\n");
        out.push('\n');
        out
    }
}

fn push_non_empty(parts: &mut Vec<String>, text: String) {
    if !text.trim().is_empty() {
        parts.push(text);
    }
}
