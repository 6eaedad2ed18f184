use std::sync::LazyLock;

use handlebars::{Handlebars, Template, handlebars_helper, no_escape};
use regex::{NoExpand, Regex};
use serde_json::Value;
use thiserror::Error;

use crate::subject::Subject;

static NAME_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?:name|dogName)\}").expect("valid placeholder pattern"));

handlebars_helper!(lower: |text: str| text.to_lowercase());

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template does not compile: {0}")]
    Compile(String),
    #[error("template render failed: {0}")]
    Render(String),
}

/// Replaces every `{name}` / `{dogName}` with the subject's display name.
pub fn substitute_name(text: &str, subject: &Subject) -> String {
    NAME_PLACEHOLDER
        .replace_all(text, NoExpand(subject.display_name()))
        .into_owned()
}

/// Joins labels as "a", "a & b", "a, b & c".
pub fn format_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [head @ .., last] => {
            let head = head.iter().map(AsRef::as_ref).collect::<Vec<_>>();
            format!("{} & {}", head.join(", "), last.as_ref())
        }
    }
}

/// Handlebars wrapper used for summary, acknowledgement and thinking text.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(no_escape);
        register_default_helpers(&mut registry);
        Self { registry }
    }

    pub fn render(&self, template: &str, ctx: &Value) -> Result<String, TemplateError> {
        self.registry
            .render_template(template, ctx)
            .map_err(|err| TemplateError::Render(err.to_string()))
    }

    /// Syntax check without rendering.
    pub fn check(template: &str) -> Result<(), TemplateError> {
        Template::compile(template)
            .map(|_| ())
            .map_err(|err| TemplateError::Compile(err.to_string()))
    }
}

pub fn register_default_helpers(registry: &mut Handlebars<'static>) {
    registry.register_helper("lower", Box::new(lower));
}
