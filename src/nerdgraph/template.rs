//! GraphQL document rendering.
//!
//! Documents are handlebars templates rendered in strict mode, so a parameter
//! the template names but the caller did not supply is an error instead of a
//! blank. `{{x}}` values are escaped for use inside a GraphQL string literal.

use crate::error::ApiError;
use handlebars::Handlebars;
use serde_json::Value;
use std::sync::OnceLock;

fn renderer() -> &'static Handlebars<'static> {
    static RENDERER: OnceLock<Handlebars<'static>> = OnceLock::new();
    RENDERER.get_or_init(|| {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(escape_graphql_string);
        handlebars
    })
}

/// Escape a value for a double-quoted GraphQL string.
pub(crate) fn escape_graphql_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Render `template` with `params` for `operation`.
pub(crate) fn render(operation: &str, template: &str, params: &Value) -> Result<String, ApiError> {
    renderer()
        .render_template(template, params)
        .map_err(|e| ApiError::MalformedQuery {
            operation: operation.to_string(),
            reason: e.to_string(),
        })
}

/// Collapse a multi-line document into the single line sent on the wire.
pub(crate) fn single_line(document: &str) -> String {
    document
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
