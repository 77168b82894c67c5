//! Placeholder scanning, variable validation and substitution.
//!
//! The engine is pure: no I/O, no shared state. Validation errors are
//! returned as data so the caller decides whether to reject the request.

use std::collections::HashMap;

use super::types::{Template, TemplateError, TemplateResult};

/// Variable bindings supplied by the caller
pub type Variables = HashMap<String, String>;

const MAX_VARIABLE_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Variable names: 1-64 chars of `[A-Za-z0-9_.-]`
pub fn is_valid_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_VARIABLE_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Split a body into literal text and placeholders.
///
/// With `strict`, an unterminated `{{` or a placeholder with an invalid
/// name is an error. Otherwise such fragments are kept as literal text.
fn scan(body: &str, strict: bool) -> TemplateResult<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            if strict {
                return Err(TemplateError::InvalidTemplate(format!(
                    "unterminated placeholder at `{}`",
                    truncate(&rest[start..], 24)
                )));
            }
            break;
        };

        let raw = &after_open[..end];
        let name = raw.trim();

        if is_valid_variable_name(name) {
            if start > 0 {
                segments.push(Segment::Text(&rest[..start]));
            }
            segments.push(Segment::Placeholder(name));
        } else if strict {
            return Err(TemplateError::InvalidTemplate(format!(
                "invalid placeholder `{{{{{}}}}}`",
                raw
            )));
        } else {
            segments.push(Segment::Text(&rest[..start + 2 + end + 2]));
        }

        rest = &after_open[end + 2..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }

    Ok(segments)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Placeholder names in first-appearance order, without duplicates.
///
/// Fails on a malformed body; used when a template is created.
pub fn placeholders(body: &str) -> TemplateResult<Vec<String>> {
    let mut names: Vec<String> = Vec::new();

    for segment in scan(body, true)? {
        if let Segment::Placeholder(name) = segment {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }

    Ok(names)
}

/// Check that every required variable of `template` is bound.
///
/// Returns one message per missing name, in the template's order. An
/// empty list means the bindings are valid; extra bindings are ignored.
pub fn validate(template: &Template, variables: &Variables) -> Vec<String> {
    template
        .required_variables
        .iter()
        .filter(|name| !variables.contains_key(name.as_str()))
        .map(|name| format!("missing variable: {}", name))
        .collect()
}

/// Substitute every placeholder of `template` with its bound value.
///
/// Callers run `validate` first. A placeholder that is still unbound here
/// renders as the empty string.
pub fn render(template: &Template, variables: &Variables) -> String {
    render_str(&template.body, variables)
}

/// Render an ad-hoc body that is not stored as a template.
pub fn render_str(body: &str, variables: &Variables) -> String {
    // Lenient scan cannot fail
    let segments = scan(body, false).unwrap_or_else(|_| vec![Segment::Text(body)]);

    let mut rendered = String::with_capacity(body.len());
    for segment in segments {
        match segment {
            Segment::Text(text) => rendered.push_str(text),
            Segment::Placeholder(name) => match variables.get(name) {
                Some(value) => rendered.push_str(value),
                None => {
                    tracing::warn!(variable = %name, "Rendering unbound placeholder as empty");
                }
            },
        }
    }

    rendered
}
