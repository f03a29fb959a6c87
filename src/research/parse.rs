use serde_json::Value;
use thiserror::Error;

use super::report::TrendReport;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("model returned no text")]
    Empty,
    #[error("model output is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    #[error("model output is JSON but not an object")]
    NotAnObject,
}

/// Strict parse of model text as a report.
///
/// The text must be exactly one JSON object, optionally wrapped in a single
/// Markdown code fence. No substring hunting: near-JSON is the repair
/// phase's job. Field types are not checked; any object parses.
pub fn parse_report(text: &str) -> Result<TrendReport, ParseError> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Err(ParseError::Empty);
    }

    let value: Value = serde_json::from_str(body).map_err(ParseError::Syntax)?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }

    // Every report field deserializer is total, so this only fails on non-objects
    serde_json::from_value(value).map_err(ParseError::Syntax)
}

/// Strip a surrounding ```json / ``` fence if the whole text is one block.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    // Skip the info string (e.g. "json"), which may sit on the same line as the body
    match inner.find('\n') {
        Some(newline) if !inner[..newline].trim_start().starts_with(['{', '[']) => {
            inner[newline + 1..].trim()
        }
        _ => inner
            .trim_start()
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            .trim(),
    }
}
