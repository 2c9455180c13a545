//! Documentation catalog for command processors.
//!
//! A static table of processors and their commands, registered at startup
//! (usually from the `[[catalog.processors]]` manifest). The catalog renders
//! the usage reference injected into the prompt context and backs the
//! built-in `get_processor_info` tool.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use inkwell_config::{CatalogConfig, CommandDocConfig, ProcessorDocConfig};
use serde_json::{Map, Value};

use crate::tools::{ParamType, ToolDefinition, ToolParameter, argument_text};

/// Processor every document can use without declaring it.
pub const BASE_PROCESSOR: &str = "BaseProcessor";

/// Name of the built-in catalog lookup tool.
pub const PROCESSOR_INFO_TOOL: &str = "get_processor_info";

/// Command name rendered as the processor's initialization section.
const INIT_COMMAND: &str = "init";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandDoc {
    pub name: String,
    pub description: String,
    /// Usage examples. An example may start with `description:` before its
    /// first `<`.
    pub examples: Vec<String>,
}

impl CommandDoc {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            examples: Vec::new(),
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessorDoc {
    pub name: String,
    pub description: String,
    pub commands: Vec<CommandDoc>,
}

impl ProcessorDoc {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            commands: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: CommandDoc) -> Self {
        self.commands.push(command);
        self
    }
}

impl From<&CommandDocConfig> for CommandDoc {
    fn from(config: &CommandDocConfig) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            examples: config.examples.clone(),
        }
    }
}

impl From<&ProcessorDocConfig> for ProcessorDoc {
    fn from(config: &ProcessorDocConfig) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            commands: config.commands.iter().map(CommandDoc::from).collect(),
        }
    }
}

/// Registered processor documentation, keyed by processor name.
#[derive(Debug, Clone)]
pub struct DocCatalog {
    processors: BTreeMap<String, ProcessorDoc>,
    content_type: String,
}

impl Default for DocCatalog {
    fn default() -> Self {
        Self::new("xml")
    }
}

impl DocCatalog {
    /// An empty catalog whose multi-line examples are fenced as `content_type`.
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            processors: BTreeMap::new(),
            content_type: content_type.into(),
        }
    }

    pub fn from_config(config: &CatalogConfig, content_type: impl Into<String>) -> Self {
        let mut catalog = Self::new(content_type);
        for processor in &config.processors {
            catalog.register(ProcessorDoc::from(processor));
        }
        catalog
    }

    /// Register a processor. A later registration under the same name wins.
    pub fn register(&mut self, processor: ProcessorDoc) {
        self.processors.insert(processor.name.clone(), processor);
    }

    pub fn get(&self, name: &str) -> Option<&ProcessorDoc> {
        self.processors.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.processors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Render the usage reference for `names`, in order, skipping repeats.
    ///
    /// Unknown names render a short notice telling the model the processor
    /// cannot be used.
    pub fn render<S: AsRef<str>>(&self, names: &[S]) -> String {
        let mut seen: Vec<&str> = Vec::new();
        let mut out = String::new();
        for name in names.iter().map(AsRef::as_ref) {
            if seen.contains(&name) {
                continue;
            }
            seen.push(name);
            match self.processors.get(name) {
                Some(processor) => self.render_processor(&mut out, processor),
                None => {
                    let _ = write!(
                        out,
                        "# Command Processor: {name}\n\n\
                         This processor cannot be used because the processor was not found. \
                         If the user tries to use it, report the error.\n\n"
                    );
                }
            }
        }
        out
    }

    fn render_processor(&self, out: &mut String, processor: &ProcessorDoc) {
        let _ = write!(out, "# Command Processor: {}\n\n", processor.name);
        if !processor.description.trim().is_empty() {
            let _ = write!(out, "{}\n\n", processor.description.trim());
        }

        for command in &processor.commands {
            if command.name == INIT_COMMAND {
                out.push_str("## Processor Initialization\n\n");
            } else {
                let _ = write!(out, "## Command `{}`\n\n", command.name);
            }
            if !command.description.trim().is_empty() {
                let _ = write!(out, "Description: {}\n\n", command.description.trim());
            }
            if !command.examples.is_empty() {
                out.push_str("Examples:\n\n");
                for example in &command.examples {
                    self.render_example(out, example);
                }
                out.push('\n');
            }
        }
    }

    fn render_example(&self, out: &mut String, example: &str) {
        let (description, code) = split_example(example);
        let code = code.replace('\'', "\"");
        if example.contains('\n') {
            let _ = write!(
                out,
                "{description}\n```{}\n{}\n```\n",
                self.content_type,
                code.trim_matches('\n')
            );
        } else if description.is_empty() {
            let _ = writeln!(out, "- `{code}`");
        } else {
            let _ = writeln!(out, "- {description} `{code}`");
        }
    }
}

/// Split `"Print a line: <Log/>"` into its description (colon kept) and code.
/// Only a colon before the first `<` counts.
fn split_example(example: &str) -> (&str, &str) {
    let Some(tag) = example.find('<') else {
        return ("", example.trim());
    };
    match example[..tag].find(':') {
        Some(colon) => (example[..=colon].trim(), example[colon + 1..].trim()),
        None => ("", example.trim()),
    }
}

/// Numbered list of the runtime's predefined variable names.
///
/// Renders nothing when there are no variables.
pub fn render_system_variables<S: AsRef<str>>(names: &[S]) -> String {
    if names.is_empty() {
        return String::new();
    }
    let mut out = String::from("# System Variable Names\n\n");
    for (i, name) in names.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, name.as_ref());
    }
    out.push('\n');
    out
}

/// The built-in tool that lets the model look up a processor on demand.
pub fn processor_info_tool(catalog: Arc<DocCatalog>) -> ToolDefinition {
    ToolDefinition::callback(
        PROCESSOR_INFO_TOOL,
        "Returns the description and usage examples of a command processor.",
        move |args: &Map<String, Value>| {
            let name = args.get("name").map(argument_text).unwrap_or_default();
            Ok(Some(catalog.render(&[name])))
        },
    )
    .with_parameter(
        ToolParameter::required("name", ParamType::String)
            .with_description("Processor name, e.g. BaseProcessor"),
    )
}
