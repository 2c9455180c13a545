//! Declarations embedded in document text.
//!
//! A document can declare its own tools:
//!
//! ```xml
//! <Function name="lookup_user" description="Looks up a user." return="result">
//!   <property name="id" type="integer" required="true"/>
//!   <Task>...</Task>
//! </Function>
//! ```
//!
//! Each declaration becomes a fragment-backed [`ToolDefinition`] whose action
//! is the body of the `Function` element without its `property` tags. The
//! document also pulls in processors with `<Extern class="..."/>`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::tools::{ParamType, ToolDefinition, ToolParameter};

static FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<Function\b([^>]*?)(?:/>|>(.*?)</Function\s*>)").expect("valid Function pattern")
});

static PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<property\b([^>]*?)/?>(?:\s*</property\s*>)?").expect("valid property pattern")
});

static EXTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Extern\b([^>]*)>").expect("valid Extern pattern"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)([A-Za-z_][\w.:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute pattern")
});

/// Value of attribute `name` in a tag's attribute text.
fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    ATTRIBUTE.captures_iter(attrs).find_map(|caps| {
        if caps.get(1)?.as_str() != name {
            return None;
        }
        caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str())
    })
}

/// Tools declared with `<Function>` elements, in document order.
///
/// A declaration without a `name` is skipped. An unknown property type falls
/// back to `string`.
pub fn declared_tools(text: &str) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    for caps in FUNCTION.captures_iter(text) {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let Some(name) = attribute(attrs, "name").map(str::trim).filter(|n| !n.is_empty()) else {
            warn!("skipping Function declaration without a name");
            continue;
        };

        let body = caps.get(2).map_or("", |m| m.as_str());
        let action = PROPERTY.replace_all(body, "");
        let returns = attribute(attrs, "return")
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let mut tool = ToolDefinition::fragment(
            name,
            attribute(attrs, "description").unwrap_or_default(),
            action.trim(),
            returns,
        );

        for property in PROPERTY.captures_iter(body) {
            let prop_attrs = property.get(1).map_or("", |m| m.as_str());
            let Some(prop_name) = attribute(prop_attrs, "name").filter(|n| !n.trim().is_empty())
            else {
                warn!(tool = name, "skipping property without a name");
                continue;
            };
            let kind = match attribute(prop_attrs, "type") {
                None => ParamType::String,
                Some(declared) => ParamType::from_name(declared).unwrap_or_else(|| {
                    warn!(tool = name, property = prop_name, declared, "unknown property type, using string");
                    ParamType::String
                }),
            };
            let required = attribute(prop_attrs, "required")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
            tool = tool.with_parameter(if required {
                ToolParameter::required(prop_name.trim(), kind)
            } else {
                ToolParameter::optional(prop_name.trim(), kind)
            });
        }

        tools.push(tool);
    }
    tools
}

/// `class` values of every `<Extern>` tag, in document order.
pub fn extern_processors(text: &str) -> Vec<String> {
    EXTERN
        .captures_iter(text)
        .filter_map(|caps| attribute(caps.get(1)?.as_str(), "class"))
        .map(|class| class.trim().to_string())
        .filter(|class| !class.is_empty())
        .collect()
}
