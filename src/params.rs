//! Dynamic task parameters.
//!
//! A parameter field is authored either as a native list/table or as a single
//! template string that must render to the JSON encoding of one.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::template::Render;

/// A parameter field as authored, before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterArgument {
    /// Renders to a JSON array of strings or a JSON object of strings.
    TemplateExpression(String),
    List(Vec<String>),
    Map(IndexMap<String, String>),
}

impl From<&str> for ParameterArgument {
    fn from(value: &str) -> Self {
        ParameterArgument::TemplateExpression(value.to_string())
    }
}

impl From<Vec<String>> for ParameterArgument {
    fn from(value: Vec<String>) -> Self {
        ParameterArgument::List(value)
    }
}

impl From<IndexMap<String, String>> for ParameterArgument {
    fn from(value: IndexMap<String, String>) -> Self {
        ParameterArgument::Map(value)
    }
}

/// Resolve a list-shaped parameter. `None` stays `None`.
pub fn resolve_list(
    raw: Option<&ParameterArgument>,
    renderer: &dyn Render,
) -> Result<Option<Vec<String>>, QueryError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    match raw {
        ParameterArgument::List(items) => items
            .iter()
            .map(|item| renderer.render(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        ParameterArgument::TemplateExpression(template) => {
            let rendered = renderer.render(template)?;
            serde_json::from_str::<Vec<String>>(&rendered)
                .map(Some)
                .map_err(|e| QueryError::ParameterShape {
                    message: format!("expected a JSON array of strings, got '{rendered}': {e}"),
                })
        }
        ParameterArgument::Map(_) => Err(QueryError::ParameterShape {
            message: "expected a list of parameters, got a mapping".to_string(),
        }),
    }
}

/// Resolve a mapping-shaped parameter. `None` stays `None`.
///
/// Literal mappings have both keys and values rendered; insertion order is kept.
pub fn resolve_map(
    raw: Option<&ParameterArgument>,
    renderer: &dyn Render,
) -> Result<Option<IndexMap<String, String>>, QueryError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    match raw {
        ParameterArgument::Map(entries) => {
            let mut rendered = IndexMap::with_capacity(entries.len());
            for (key, value) in entries {
                rendered.insert(renderer.render(key)?, renderer.render(value)?);
            }
            Ok(Some(rendered))
        }
        ParameterArgument::TemplateExpression(template) => {
            let rendered = renderer.render(template)?;
            serde_json::from_str::<IndexMap<String, String>>(&rendered)
                .map(Some)
                .map_err(|e| QueryError::ParameterShape {
                    message: format!(
                        "expected a JSON object of string values, got '{rendered}': {e}"
                    ),
                })
        }
        ParameterArgument::List(_) => Err(QueryError::ParameterShape {
            message: "expected a mapping of parameters, got a list".to_string(),
        }),
    }
}
