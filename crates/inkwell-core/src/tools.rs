//! Tool registry: schema-described functions the model may call mid-conversation.
//!
//! Each tool has a name, description, declared parameters, and a handler.
//! Handlers are either local callbacks or fragments embedded in the document,
//! which run against a per-conversation [`ToolScope`].
//!
//! Registration is expected to finish before conversations start; dispatch
//! takes `&self` so a registry behind an `Arc` serves concurrent conversations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::llm::types::ToolSchema;

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    /// Parse a declared type name; unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "string" => Some(ParamType::String),
            "number" => Some(ParamType::Number),
            "integer" => Some(ParamType::Integer),
            "boolean" => Some(ParamType::Boolean),
            "object" => Some(ParamType::Object),
            "array" => Some(ParamType::Array),
            _ => None,
        }
    }
}

/// A declared tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParamType,
    pub required: bool,
    pub description: Option<String>,
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Errors from tool dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("failed to parse arguments for tool {tool}: {reason}")]
    ArgumentParse { tool: String, reason: String },

    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// A local tool implementation.
pub trait ToolCallback: Send + Sync {
    /// Run the tool with parsed arguments. `None` means "no result".
    fn call(&self, args: &Map<String, Value>) -> Result<Option<String>, ToolError>;
}

impl<F> ToolCallback for F
where
    F: Fn(&Map<String, Value>) -> Result<Option<String>, ToolError> + Send + Sync,
{
    fn call(&self, args: &Map<String, Value>) -> Result<Option<String>, ToolError> {
        self(args)
    }
}

/// The variable namespace and fragment executor of the calling document.
///
/// Document-embedded tools write their arguments into this namespace, run
/// their bound fragment, then read back the declared return variable.
pub trait ToolScope: Send {
    fn set_variable(&mut self, name: &str, value: Value);

    fn variable(&self, name: &str) -> Option<String>;

    /// Execute an opaque document fragment.
    fn run_fragment(&mut self, action: &str) -> Result<(), ToolError>;
}

/// How a tool is executed.
#[derive(Clone)]
pub enum ToolHandler {
    /// A local callback.
    Callback(Arc<dyn ToolCallback>),
    /// A fragment embedded in the document, with an optional return variable.
    Fragment {
        action: String,
        returns: Option<String>,
    },
}

impl fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolHandler::Callback(_) => f.write_str("Callback(..)"),
            ToolHandler::Fragment { action, returns } => f
                .debug_struct("Fragment")
                .field("action", action)
                .field("returns", returns)
                .finish(),
        }
    }
}

/// A registered tool.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Tool name, the dispatch key.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// Declared parameters, in declaration order.
    pub parameters: Vec<ToolParameter>,
    pub handler: ToolHandler,
}

impl ToolDefinition {
    /// A tool backed by a local closure.
    pub fn callback<F>(name: impl Into<String>, description: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Option<String>, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            handler: ToolHandler::Callback(Arc::new(callback)),
        }
    }

    /// A tool backed by a document fragment.
    pub fn fragment(
        name: impl Into<String>,
        description: impl Into<String>,
        action: impl Into<String>,
        returns: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            handler: ToolHandler::Fragment {
                action: action.into(),
                returns,
            },
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Wire schema advertised to the model.
    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: to_json_schema(self),
        }
    }
}

/// Object-typed JSON Schema for a tool's parameters.
pub fn to_json_schema(definition: &ToolDefinition) -> Value {
    let mut properties = Map::new();
    for param in &definition.parameters {
        let mut property = Map::new();
        property.insert("type".to_string(), json!(param.kind.as_str()));
        if let Some(ref description) = param.description {
            property.insert("description".to_string(), json!(description));
        }
        properties.insert(param.name.clone(), Value::Object(property));
    }

    let required: Vec<&str> = definition
        .parameters
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Plain-text form of an argument value for a variable namespace.
///
/// Strings are unquoted and `null` is empty; everything else is JSON.
pub fn argument_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Registry of available tools.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: ToolDefinition) {
        if let Some(previous) = self.tools.insert(tool.name.clone(), tool) {
            debug!(tool = %previous.name, "replaced previously registered tool");
        }
    }

    /// A copy of this registry with `tools` registered on top.
    pub fn with_overrides(&self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        let mut registry = self.clone();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Wire schemas for every tool, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<_> = self.tools.values().map(ToolDefinition::schema).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Run the tool called `name` with JSON `arguments`.
    ///
    /// Fragment tools write every argument into `scope`, run their action,
    /// and return the declared return variable if there is one.
    pub fn dispatch(
        &self,
        name: &str,
        arguments: &str,
        scope: &mut dyn ToolScope,
    ) -> Result<Option<String>, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = parse_arguments(tool, arguments)?;

        match &tool.handler {
            ToolHandler::Callback(callback) => callback.call(&args),
            ToolHandler::Fragment { action, returns } => {
                for (key, value) in args {
                    scope.set_variable(&key, value);
                }
                scope.run_fragment(action)?;
                Ok(returns.as_deref().and_then(|var| scope.variable(var)))
            }
        }
    }
}

/// Parse a JSON argument object and check required parameters are present.
fn parse_arguments(tool: &ToolDefinition, arguments: &str) -> Result<Map<String, Value>, ToolError> {
    let parse_error = |reason: String| ToolError::ArgumentParse {
        tool: tool.name.clone(),
        reason,
    };

    let args = if arguments.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(arguments) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(parse_error(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )));
            }
            Err(e) => return Err(parse_error(e.to_string())),
        }
    };

    if let Some(missing) = tool
        .parameters
        .iter()
        .find(|p| p.required && !args.contains_key(&p.name))
    {
        return Err(parse_error(format!(
            "missing required property {:?}",
            missing.name
        )));
    }

    Ok(args)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
