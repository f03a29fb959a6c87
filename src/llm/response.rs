use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A provider response reduced to the shapes we know how to read text from.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// Convenience `output_text` field set by some SDKs and proxies.
    Flat(String),
    /// Responses API `output` list: tool calls, reasoning items and messages.
    Items(Vec<OutputItem>),
    /// Chat Completions `choices` list.
    Choices(Vec<Choice>),
    /// Anything else. Extracts to an empty string.
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputItem {
    #[serde(default, deserialize_with = "lenient_list")]
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentPart {
    #[serde(default, deserialize_with = "lenient_fragment")]
    pub text: Option<TextFragment>,
}

/// Text is either a plain string or wrapped as `{"value": "..."}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextFragment {
    Plain(String),
    Nested { value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ProviderResponse {
    /// Classify a raw provider payload. Never fails.
    pub fn from_value(value: Value) -> Self {
        if let Some(text) = value.get("output_text").and_then(Value::as_str) {
            if !text.is_empty() {
                return Self::Flat(text.to_string());
            }
        }

        if let Some(Value::Array(output)) = value.get("output") {
            return Self::Items(keep_readable(output));
        }

        if let Some(Value::Array(choices)) = value.get("choices") {
            return Self::Choices(keep_readable(choices));
        }

        Self::Unrecognized
    }

    /// Reduce the response to one string; empty when no text is found.
    pub fn text(&self) -> String {
        match self {
            Self::Flat(text) => text.clone(),
            Self::Items(items) => items
                .iter()
                .flat_map(|item| item.content.iter())
                .filter_map(|part| part.text.as_ref())
                .map(TextFragment::as_str)
                .collect(),
            // First choice only; null content is empty
            Self::Choices(choices) => choices
                .first()
                .and_then(|c| c.message.as_ref())
                .and_then(|m| m.content.clone())
                .unwrap_or_default(),
            Self::Unrecognized => String::new(),
        }
    }
}

impl TextFragment {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Nested { value } => value,
        }
    }
}

/// Decode each element on its own, skipping the ones we cannot read.
fn keep_readable<T: DeserializeOwned>(values: &[Value]) -> Vec<T> {
    values
        .iter()
        .filter_map(|v| T::deserialize(v).ok())
        .collect()
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => keep_readable(&values),
        _ => Vec::new(),
    })
}

fn lenient_fragment<'de, D>(deserializer: D) -> Result<Option<TextFragment>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(TextFragment::deserialize(Value::deserialize(deserializer)?).ok())
}
