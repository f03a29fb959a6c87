use std::fmt;

use serde::{Deserialize, Deserializer};

use super::period::Period;
use crate::error::ResearchError;

/// One incoming research call. Lives for a single pipeline run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResearchRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub topic: String,
    #[serde(default)]
    pub period: Option<Period>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub industries: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub channels: Vec<String>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default, deserialize_with = "null_as_default")]
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default, alias = "factcheckLevel")]
    pub factcheck_level: Option<String>,
    #[serde(default, alias = "credibilityThreshold")]
    pub credibility_threshold: Option<f64>,
}

/// Operator-selected execution mode. Only forwarded to the directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Option<String>")]
pub enum Mode {
    #[default]
    Auto,
    Named(String),
}

impl From<Option<String>> for Mode {
    fn from(raw: Option<String>) -> Self {
        match raw.as_deref().map(str::trim) {
            None | Some("") | Some("auto") => Mode::Auto,
            Some(name) => Mode::Named(name.to_string()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Auto => f.write_str("auto"),
            Mode::Named(name) => f.write_str(name),
        }
    }
}

/// How many self-check passes the model is asked to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FactcheckLevel {
    Quick,
    #[default]
    Standard,
    Strict,
}

impl FactcheckLevel {
    /// Unknown or missing labels behave as `standard`.
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some("quick") => Self::Quick,
            Some("strict") => Self::Strict,
            _ => Self::Standard,
        }
    }

    pub fn passes(self) -> u32 {
        match self {
            Self::Quick => 1,
            Self::Standard => 3,
            Self::Strict => 5,
        }
    }
}

pub const DEFAULT_CREDIBILITY_THRESHOLD: u8 = 3;

impl Settings {
    pub fn factcheck_level(&self) -> FactcheckLevel {
        FactcheckLevel::from_label(self.factcheck_level.as_deref())
    }

    /// Threshold on the 1-5 scale; defaults to 3, clamped into range.
    pub fn credibility_threshold(&self) -> u8 {
        match self.credibility_threshold {
            Some(t) if t.is_finite() => t.round().clamp(1.0, 5.0) as u8,
            _ => DEFAULT_CREDIBILITY_THRESHOLD,
        }
    }
}

impl ResearchRequest {
    /// Reject requests that must never reach the provider.
    pub fn validate(&self) -> Result<(), ResearchError> {
        if self.topic.trim().is_empty() {
            return Err(ResearchError::InvalidRequest("topic is required".to_string()));
        }

        if let Some(Period::Custom { start, end }) = &self.period {
            let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
            if !present(start) || !present(end) {
                return Err(ResearchError::InvalidRequest(
                    "custom period requires both start and end".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn topic(&self) -> &str {
        self.topic.trim()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
