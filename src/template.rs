use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior, Value};

use crate::error::QueryError;

/// Renders `{{ expression }}` templates against a variable context.
pub trait Render {
    fn render(&self, template: &str) -> Result<String, QueryError>;

    /// Render an optional value, keeping absence as absence.
    fn render_opt(&self, template: Option<&str>) -> Result<Option<String>, QueryError> {
        template.map(|t| self.render(t)).transpose()
    }
}

/// Variable context backed by minijinja. Undefined variables are an error
/// rather than an empty string.
pub struct TemplateContext {
    env: Environment<'static>,
    vars: BTreeMap<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self {
            env,
            vars: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Build a context from `key=value` pairs as given on the command line.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Result<Self, QueryError> {
        let mut ctx = Self::new();
        for pair in pairs {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                QueryError::config(format!("invalid variable '{pair}' (expected key=value)"))
            })?;
            ctx.insert(key.trim(), value);
        }
        Ok(ctx)
    }
}

/// Render a property that must be present and non-empty. A missing, blank or
/// unrenderable value is a configuration error.
pub fn required(value: Option<&str>, name: &str, renderer: &dyn Render) -> Result<String, QueryError> {
    let template =
        value.ok_or_else(|| QueryError::config(format!("missing required property '{name}'")))?;
    let rendered = renderer.render(template).map_err(|e| {
        QueryError::config(format!("required property '{name}' failed to render: {e}"))
    })?;
    if rendered.trim().is_empty() {
        return Err(QueryError::config(format!(
            "required property '{name}' rendered to an empty value"
        )));
    }
    Ok(rendered)
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Render for TemplateContext {
    fn render(&self, template: &str) -> Result<String, QueryError> {
        if !template.contains('{') {
            return Ok(template.to_string());
        }
        self.env
            .render_str(template, &self.vars)
            .map_err(|e| QueryError::Render {
                message: format!("cannot render '{template}': {e}"),
            })
    }
}
