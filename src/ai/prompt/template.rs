//! Template model and header metadata
//!
//! A template file is a Handlebars body preceded by an optional header of
//! comment lines carrying `key: value` metadata:
//!
//! ```text
//! {{!-- description: Validate a candidate answer --}}
//! {{!-- required_variables: original_query, llm_response --}}
//! {{!-- optional_variables: validator_name=an expert reviewer, validation_aspects --}}
//! ```
//!
//! Recognized keys are `description`, `version`, `tags`,
//! `required_variables` and `optional_variables`. Malformed or unknown
//! lines are ignored; the header never reaches the rendered output.

use handlebars::{Handlebars, handlebars_helper, no_escape};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::constants::cache;
use crate::types::{CrossCheckError, Result};

/// Optional variable with the value used when the caller omits it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionalVariable {
    pub name: String,
    pub default: Option<Value>,
}

/// Parsed template: header metadata plus the body source
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub name: String,
    pub description: Option<String>,
    pub version: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub required_variables: Vec<String>,
    pub optional_variables: Vec<OptionalVariable>,
    /// Body with the header removed
    pub source: String,
}

impl Template {
    /// Split `raw` into header metadata and body
    pub fn parse(name: impl Into<String>, raw: &str, category: Option<String>) -> Self {
        let mut template = Self {
            name: name.into(),
            description: None,
            version: cache::DEFAULT_TEMPLATE_VERSION.to_string(),
            category,
            tags: Vec::new(),
            required_variables: Vec::new(),
            optional_variables: Vec::new(),
            source: String::new(),
        };

        let mut body_start = 0;
        for line in raw.split_inclusive('\n') {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                body_start += line.len();
                continue;
            }
            let Some(comment) = comment_text(trimmed) else {
                break;
            };
            body_start += line.len();
            if let Some((key, value)) = comment.split_once(':') {
                template.apply_metadata(&key.trim().to_lowercase(), value.trim());
            }
        }

        template.source = raw[body_start..].to_string();
        template
    }

    fn apply_metadata(&mut self, key: &str, value: &str) {
        match key {
            "description" if !value.is_empty() => self.description = Some(value.to_string()),
            "version" if !value.is_empty() => self.version = value.to_string(),
            "tags" => self.tags = split_list(value),
            "required_variables" => self.required_variables = split_list(value),
            "optional_variables" => {
                self.optional_variables = split_list(value)
                    .into_iter()
                    .map(|entry| match entry.split_once('=') {
                        Some((name, default)) => OptionalVariable {
                            name: name.trim().to_string(),
                            default: Some(Value::String(default.trim().to_string())),
                        },
                        None => OptionalVariable {
                            name: entry,
                            default: None,
                        },
                    })
                    .filter(|var| !var.name.is_empty())
                    .collect();
            }
            _ => {}
        }
    }

    pub fn is_required(&self, variable: &str) -> bool {
        self.required_variables.iter().any(|v| v == variable)
    }
}

/// Inner text of a standalone `{{!-- ... --}}` or `{{! ... }}` line
fn comment_text(line: &str) -> Option<&str> {
    if let Some(inner) = line
        .strip_prefix("{{!--")
        .and_then(|rest| rest.strip_suffix("--}}"))
    {
        return Some(inner.trim());
    }
    line.strip_prefix("{{!")
        .and_then(|rest| rest.strip_suffix("}}"))
        .map(str::trim)
}

/// Comma-separated names, trimmed, empties and duplicates dropped
fn split_list(value: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

// =============================================================================
// Render Context
// =============================================================================

/// Variables supplied to a render
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TemplateContext(Map<String, Value>);

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Overlay `other` on top of this context; keys in `other` win
    pub fn merge(mut self, other: &TemplateContext) -> Self {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for TemplateContext {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// =============================================================================
// Compiled Template
// =============================================================================

const BODY: &str = "body";

handlebars_helper!(truncate_text: |text: str, max: u64| truncate(text, max as usize));
handlebars_helper!(format_list: |items: array| join_list(items));
handlebars_helper!(quote: |text: str| format!("\"{}\"", text));

fn truncate(text: &str, max: usize) -> String {
    const SUFFIX: &str = "...";
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(SUFFIX.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(SUFFIX);
    out
}

fn join_list(items: &[Value]) -> String {
    let items: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    match items.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Registry configured the same way for files and inline sources
pub(crate) fn new_registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(no_escape);
    registry.set_strict_mode(false);
    registry.register_helper("truncate_text", Box::new(truncate_text));
    registry.register_helper("format_list", Box::new(format_list));
    registry.register_helper("quote", Box::new(quote));
    registry
}

/// Template with its body parsed and ready to render
pub struct CompiledTemplate {
    template: Template,
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.template.name)
            .field("version", &self.template.version)
            .finish()
    }
}

impl CompiledTemplate {
    pub fn compile(template: Template) -> Result<Self> {
        let mut registry = new_registry();
        registry
            .register_template_string(BODY, &template.source)
            .map_err(|e| CrossCheckError::TemplateParse {
                name: template.name.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { template, registry })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Render with required variables enforced and optional defaults applied
    ///
    /// A required variable bound to `null` counts as absent. Keys the
    /// template does not declare are passed through and otherwise ignored.
    pub fn render(&self, context: &TemplateContext) -> Result<String> {
        let template = &self.template;
        if let Some(missing) = template
            .required_variables
            .iter()
            .find(|var| matches!(context.get(var), None | Some(Value::Null)))
        {
            return Err(CrossCheckError::MissingVariable {
                template: template.name.clone(),
                variable: missing.clone(),
            });
        }

        let mut data = context.0.clone();
        for var in &template.optional_variables {
            if let Some(default) = &var.default
                && !data.contains_key(&var.name)
            {
                data.insert(var.name.clone(), default.clone());
            }
        }

        self.registry
            .render(BODY, &data)
            .map_err(|e| CrossCheckError::TemplateParse {
                name: template.name.clone(),
                message: e.to_string(),
            })
    }
}
