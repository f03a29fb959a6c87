use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const PARSE_FAILURE_RISK: &str = "AI出力の解析に失敗しました（JSON形式で取得できませんでした）。";
pub const PARSE_FAILURE_ACTION: &str = "条件を見直して再実行するか、担当者が生成結果を確認してください。";

/// The canonical market-trend report.
///
/// Deserialization is total for any JSON object: numbers may arrive as
/// strings, lists may arrive as a single string, values of the wrong type
/// degrade to empty, and unknown top-level fields are carried through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    #[serde(
        default,
        deserialize_with = "loose_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "loose_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub generated_at: Option<String>,
    #[serde(
        default,
        deserialize_with = "loose_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub summary: String,
    #[serde(default, deserialize_with = "loose_list")]
    pub trends: Vec<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub implications: Vec<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub risks: Vec<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub next_actions: Vec<String>,
    #[serde(
        default,
        deserialize_with = "loose_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub credibility_score: Option<f64>,
    #[serde(default, deserialize_with = "loose_sources")]
    pub sources: Vec<Source>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, deserialize_with = "loose_string")]
    pub title: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub publisher: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub date: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub url: String,
    #[serde(
        default,
        deserialize_with = "loose_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub credibility: Option<f64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub notes: String,
}

impl TrendReport {
    /// Fallback returned when no parse attempt succeeded. Has no failure path.
    pub fn empty_result() -> Self {
        Self {
            id: Some(new_report_id()),
            generated_at: Some(now_timestamp()),
            title: Some(String::new()),
            summary: String::new(),
            trends: Vec::new(),
            implications: Vec::new(),
            risks: vec![PARSE_FAILURE_RISK.to_string()],
            next_actions: vec![PARSE_FAILURE_ACTION.to_string()],
            credibility_score: Some(0.0),
            sources: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Fill identity fields the caller relies on. Idempotent.
    ///
    /// Missing or blank `id`, `generated_at` and `title` are replaced with a
    /// fresh UUID, the current time, or the research topic.
    pub fn finalize(mut self, topic: &str) -> Self {
        if is_blank(&self.id) {
            self.id = Some(new_report_id());
        }
        if is_blank(&self.generated_at) {
            self.generated_at = Some(now_timestamp());
        }
        if is_blank(&self.title) {
            self.title = Some(topic.trim().to_string());
        }
        self
    }

    /// Sources whose credibility is known and below `threshold`.
    pub fn sources_below(&self, threshold: u8) -> usize {
        self.sources
            .iter()
            .filter(|s| s.credibility.is_some_and(|c| c < f64::from(threshold)))
            .count()
    }
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, |s| s.trim().is_empty())
}

fn new_report_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

fn loose_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(value_to_string).collect(),
        other => vec![value_to_string(other)],
    })
}

fn loose_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        other => Some(value_to_string(other)),
    })
}

/// Unparseable scores such as "4/5" or "高" become `None`.
fn loose_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

fn loose_sources<'de, D>(deserializer: D) -> Result<Vec<Source>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        single @ (Value::String(_) | Value::Object(_)) => vec![single],
        _ => return Ok(Vec::new()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            // A bare URL is the most common drift
            Value::String(url) => Some(Source {
                url,
                ..Default::default()
            }),
            other @ Value::Object(_) => serde_json::from_value(other).ok(),
            _ => None,
        })
        .collect())
}
