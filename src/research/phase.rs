use std::fmt;
use std::str::FromStr;

use crate::llm::{CallConfig, ReasoningEffort, Tooling};

/// States of one research run.
///
/// Every calling state owns a fixed [`CallConfig`], so retrieval and
/// constrained output cannot end up on the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Web search on, free-form draft out.
    Search,
    /// No search, JSON-constrained transcoding of the draft (or the whole
    /// research in a single call when retrieval is off).
    Format,
    /// No search, no constrained output; one coercion pass over failing text.
    Repair,
    Done,
    Failed,
}

impl Phase {
    /// Call configuration for states that talk to the provider.
    pub fn call_config(self) -> Option<CallConfig> {
        match self {
            Phase::Search => Some(CallConfig {
                tooling: Tooling::WebSearch,
                effort: ReasoningEffort::Medium,
            }),
            Phase::Format => Some(CallConfig {
                tooling: Tooling::JsonObject,
                effort: ReasoningEffort::Low,
            }),
            Phase::Repair => Some(CallConfig {
                tooling: Tooling::FreeForm,
                effort: ReasoningEffort::Low,
            }),
            Phase::Done | Phase::Failed => None,
        }
    }
}

/// How the run is entered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Search → Format, with Repair on parse failure.
    #[default]
    Chained,
    /// One combined Format call without retrieval, with Repair on parse failure.
    Direct,
}

impl Strategy {
    pub fn entry_phase(self) -> Phase {
        match self {
            Strategy::Chained => Phase::Search,
            Strategy::Direct => Phase::Format,
        }
    }

    pub fn uses_retrieval(self) -> bool {
        matches!(self, Strategy::Chained)
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chained" | "chain" => Ok(Strategy::Chained),
            "direct" | "single" => Ok(Strategy::Direct),
            other => Err(format!("unknown research strategy '{}'", other)),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Chained => f.write_str("chained"),
            Strategy::Direct => f.write_str("direct"),
        }
    }
}
