use std::sync::Arc;

use tracing::warn;

use crate::research::phase::Strategy;
use crate::research::ResearchEngine;

/// Research pipeline parameters, fixed at start-up.
#[derive(Debug, Clone)]
pub struct ResearchConfig {
    pub strategy: Strategy,
    /// Max characters of failing text forwarded to the repair phase.
    pub repair_input_limit: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Chained,
            repair_input_limit: 24_000,
        }
    }
}

impl ResearchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let strategy = match dotenv::var("RESEARCH_STRATEGY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!(error = %e, "falling back to default strategy");
                defaults.strategy
            }),
            Err(_) => defaults.strategy,
        };
        let repair_input_limit = dotenv::var("RESEARCH_REPAIR_INPUT_LIMIT")
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.repair_input_limit);

        Self {
            strategy,
            repair_input_limit,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ResearchEngine>,
}

impl AppState {
    pub fn new(engine: Arc<ResearchEngine>) -> Self {
        Self { engine }
    }
}
