pub mod parse;
pub mod period;
pub mod phase;
pub mod prompts;
pub mod report;
pub mod request;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::error::ResearchError;
use crate::llm::{Generator, Message};
use crate::state::ResearchConfig;

use phase::Phase;
use prompts::Directives;
use report::TrendReport;
use request::ResearchRequest;

/// Parse attempt carried through the Repair/Done/Failed states.
struct Attempt {
    candidate: String,
    repaired: bool,
    report: Option<TrendReport>,
}

impl Attempt {
    /// Parse guard: Done on success, Repair on the first failure, Failed after.
    fn settle(&mut self) -> Phase {
        match parse::parse_report(&self.candidate) {
            Ok(report) => {
                self.report = Some(report);
                Phase::Done
            }
            Err(e) if self.repaired => {
                debug!(error = %e, "repaired output still unparseable");
                Phase::Failed
            }
            Err(e) => {
                debug!(error = %e, candidate_len = self.candidate.len(), "parse failed; repairing");
                Phase::Repair
            }
        }
    }
}

pub struct ResearchEngine {
    llm: Arc<dyn Generator>,
    config: ResearchConfig,
}

impl ResearchEngine {
    pub fn new(llm: Arc<dyn Generator>, config: ResearchConfig) -> Self {
        Self { llm, config }
    }

    /// Run the full pipeline for one request.
    ///
    /// Only request validation and Search/Format call failures return an
    /// error; any parse trouble degrades to [`TrendReport::empty_result`].
    pub async fn research(&self, request: &ResearchRequest) -> Result<TrendReport, ResearchError> {
        request.validate()?;

        let strategy = self.config.strategy;
        let threshold = request.settings.credibility_threshold();
        info!(
            topic = request.topic(),
            %strategy,
            passes = request.settings.factcheck_level().passes(),
            threshold,
            "research started"
        );

        let directives = prompts::research_directives(request, strategy.uses_retrieval());
        let text = self.generate(strategy.entry_phase(), &directives).await?;
        let report = self.parse_or_repair(&text).await.finalize(request.topic());

        let below = report.sources_below(threshold);
        if below > 0 {
            warn!(
                below,
                total = report.sources.len(),
                threshold,
                "sources below credibility threshold (kept)"
            );
        }
        info!(
            id = report.id.as_deref().unwrap_or_default(),
            trends = report.trends.len(),
            sources = report.sources.len(),
            "research complete"
        );

        Ok(report)
    }

    /// Search/Format states. Any call failure here is fatal to the request.
    async fn generate(&self, entry: Phase, directives: &Directives) -> Result<String, ResearchError> {
        let mut phase = entry;
        let mut draft: Option<String> = None;

        loop {
            debug!(?phase, "phase transition");
            phase = match phase {
                Phase::Search => {
                    let text = self
                        .invoke(phase, &directives.messages())
                        .await
                        .map_err(ResearchError::Upstream)?;
                    draft = Some(text);
                    Phase::Format
                }
                Phase::Format => {
                    // Transcode the draft if Search ran, otherwise answer directly
                    let messages = match draft.take() {
                        Some(draft) => prompts::format_directives(&draft).messages(),
                        None => directives.messages(),
                    };
                    return self
                        .invoke(phase, &messages)
                        .await
                        .map_err(ResearchError::Upstream);
                }
                other => {
                    return Err(ResearchError::Upstream(anyhow!(
                        "{:?} is not a generation phase",
                        other
                    )));
                }
            };
        }
    }

    /// Parse `text` as a report, repairing it once through the model if needed.
    ///
    /// Never fails: a second parse failure or a failed repair call yields the
    /// empty result.
    pub async fn parse_or_repair(&self, text: &str) -> TrendReport {
        let mut attempt = Attempt {
            candidate: text.to_string(),
            repaired: false,
            report: None,
        };
        let mut phase = attempt.settle();

        loop {
            debug!(?phase, "phase transition");
            phase = match phase {
                Phase::Repair => {
                    let messages = prompts::repair_directives(
                        &attempt.candidate,
                        self.config.repair_input_limit,
                    )
                    .messages();
                    attempt.repaired = true;
                    match self.invoke(phase, &messages).await {
                        Ok(text) => {
                            attempt.candidate = text;
                            attempt.settle()
                        }
                        Err(e) => {
                            warn!(error = %format!("{:#}", e), "repair call failed");
                            Phase::Failed
                        }
                    }
                }
                Phase::Done => {
                    return attempt.report.unwrap_or_else(TrendReport::empty_result);
                }
                Phase::Failed | Phase::Search | Phase::Format => {
                    warn!(
                        candidate_len = attempt.candidate.len(),
                        "all parse attempts failed; returning empty result"
                    );
                    return TrendReport::empty_result();
                }
            };
        }
    }

    /// One provider call for a calling phase, reduced to text.
    async fn invoke(&self, phase: Phase, messages: &[Message]) -> anyhow::Result<String> {
        let config = phase
            .call_config()
            .ok_or_else(|| anyhow!("{:?} does not call the provider", phase))?;

        let response = self.llm.generate(messages, config).await?;
        let text = response.text();
        info!(
            ?phase,
            tooling = ?config.tooling,
            effort = ?config.effort,
            text_len = text.len(),
            "phase call complete"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Tooling;
    use crate::research::period::Period;
    use crate::research::report::{PARSE_FAILURE_ACTION, PARSE_FAILURE_RISK};
    use crate::research::request::{Mode, Settings};
    use crate::research::testing::{flat, ScriptedGenerator};
    use crate::research::phase::Strategy;
    use serde_json::json;

    const VALID: &str = r#"{"title":"抹茶トレンド","summary":"s","trends":["a","b","c","d","e"],"implications":["i"],"risks":["r"],"next_actions":["n"],"credibility_score":4,"sources":[{"title":"t","publisher":"p","date":"2025-01-01","url":"https://example.com","credibility":4,"notes":""}]}"#;

    fn engine(stub: &Arc<ScriptedGenerator>, strategy: Strategy) -> ResearchEngine {
        ResearchEngine::new(
            stub.clone(),
            ResearchConfig {
                strategy,
                ..Default::default()
            },
        )
    }

    fn matcha() -> ResearchRequest {
        ResearchRequest {
            topic: "抹茶スイーツ".to_string(),
            period: Some(Period::Preset { days: 7 }),
            industries: vec!["confectionery".to_string()],
            channels: vec!["retail".to_string()],
            mode: Mode::Auto,
            settings: Settings {
                factcheck_level: Some("standard".to_string()),
                credibility_threshold: None,
            },
        }
    }

    fn assert_empty_shape(report: &TrendReport) {
        assert!(report.summary.is_empty());
        assert!(report.trends.is_empty());
        assert!(report.implications.is_empty());
        assert_eq!(report.risks, vec![PARSE_FAILURE_RISK.to_string()]);
        assert_eq!(report.next_actions, vec![PARSE_FAILURE_ACTION.to_string()]);
        assert_eq!(report.credibility_score, Some(0.0));
        assert!(report.sources.is_empty());
    }

    #[tokio::test]
    async fn test_direct_first_phase_valid_json() {
        let stub = Arc::new(ScriptedGenerator::new(vec![flat(VALID)]));
        let report = engine(&stub, Strategy::Direct)
            .research(&matcha())
            .await
            .unwrap();

        let expected: TrendReport = serde_json::from_str(VALID).unwrap();
        assert_eq!(report.title, expected.title);
        assert_eq!(report.trends, expected.trends);
        assert_eq!(report.sources, expected.sources);
        assert!(report.id.as_deref().is_some_and(|s| !s.is_empty()));
        assert!(report.generated_at.as_deref().is_some_and(|s| !s.is_empty()));

        assert_eq!(stub.tooling(), vec![Tooling::JsonObject]);
        assert_eq!(stub.count(Tooling::FreeForm), 0);
    }

    #[tokio::test]
    async fn test_chained_runs_search_then_format() {
        let stub = Arc::new(ScriptedGenerator::new(vec![
            flat("調査メモ: 抹茶の需要が伸びている https://example.com"),
            flat(VALID),
        ]));
        let report = engine(&stub, Strategy::Chained)
            .research(&matcha())
            .await
            .unwrap();

        assert_eq!(report.title.as_deref(), Some("抹茶トレンド"));
        assert_eq!(stub.tooling(), vec![Tooling::WebSearch, Tooling::JsonObject]);

        // Format sees only the draft
        let calls = stub.calls();
        assert!(calls[0].messages[0].content.contains("web_search"));
        assert!(calls[1].messages[1].content.contains("抹茶の需要が伸びている"));
        assert!(!calls[1].messages[0].content.contains("web_search"));
    }

    #[tokio::test]
    async fn test_format_follows_search_even_when_draft_is_json() {
        let stub = Arc::new(ScriptedGenerator::new(vec![flat(VALID), flat(VALID)]));
        engine(&stub, Strategy::Chained)
            .research(&matcha())
            .await
            .unwrap();
        assert_eq!(stub.tooling(), vec![Tooling::WebSearch, Tooling::JsonObject]);
    }

    #[tokio::test]
    async fn test_repair_once_on_parse_failure() {
        let stub = Arc::new(ScriptedGenerator::new(vec![
            flat("draft"),
            flat("Sure! {\"title\": \"broken\""),
            flat(VALID),
        ]));
        let report = engine(&stub, Strategy::Chained)
            .research(&matcha())
            .await
            .unwrap();

        assert_eq!(report.title.as_deref(), Some("抹茶トレンド"));
        assert_eq!(
            stub.tooling(),
            vec![Tooling::WebSearch, Tooling::JsonObject, Tooling::FreeForm]
        );
        let calls = stub.calls();
        assert!(calls[2].messages[1].content.contains("{\"title\": \"broken\""));
    }

    #[tokio::test]
    async fn test_double_parse_failure_returns_empty_result() {
        let stub = Arc::new(ScriptedGenerator::new(vec![
            flat("not json"),
            flat("still not json"),
        ]));
        let report = engine(&stub, Strategy::Direct)
            .research(&matcha())
            .await
            .unwrap();

        assert_empty_shape(&report);
        assert!(report.id.is_some());
        assert!(report.generated_at.is_some());
        assert_eq!(report.title.as_deref(), Some("抹茶スイーツ"));
        assert_eq!(stub.count(Tooling::FreeForm), 1);
        assert_eq!(stub.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_repair_call_error_is_contained() {
        let stub = Arc::new(ScriptedGenerator::new(vec![
            flat("garbage"),
            Err(anyhow!("connection reset")),
        ]));
        let report = engine(&stub, Strategy::Direct)
            .research(&matcha())
            .await
            .unwrap();
        assert_empty_shape(&report);
    }

    #[tokio::test]
    async fn test_unrecognized_response_shape_goes_to_repair() {
        let stub = Arc::new(ScriptedGenerator::new(vec![
            Ok(crate::llm::ProviderResponse::from_value(json!({ "weird": true }))),
            flat(VALID),
        ]));
        let report = engine(&stub, Strategy::Direct)
            .research(&matcha())
            .await
            .unwrap();
        assert_eq!(report.title.as_deref(), Some("抹茶トレンド"));
        assert_eq!(stub.count(Tooling::FreeForm), 1);
    }

    #[tokio::test]
    async fn test_search_failure_is_fatal() {
        let stub = Arc::new(ScriptedGenerator::new(vec![Err(anyhow!(
            "provider returned 500 Internal Server Error: overloaded"
        ))]));
        let err = engine(&stub, Strategy::Chained)
            .research(&matcha())
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Upstream(_)));
        assert!(err.to_string().contains("overloaded"));
        assert_eq!(stub.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_format_failure_is_fatal() {
        let stub = Arc::new(ScriptedGenerator::new(vec![
            flat("draft"),
            Err(anyhow!("timeout")),
        ]));
        let err = engine(&stub, Strategy::Chained)
            .research(&matcha())
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::Upstream(_)));
        assert_eq!(stub.count(Tooling::FreeForm), 0);
    }

    #[tokio::test]
    async fn test_blank_topic_makes_no_calls() {
        let stub = Arc::new(ScriptedGenerator::new(vec![flat(VALID)]));
        let mut req = matcha();
        req.topic = " \t ".to_string();
        let err = engine(&stub, Strategy::Chained)
            .research(&req)
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::InvalidRequest(_)));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_custom_period_makes_no_calls() {
        let stub = Arc::new(ScriptedGenerator::new(vec![flat(VALID)]));
        let mut req = matcha();
        req.period = Some(Period::Custom {
            start: Some("2025-01-01".to_string()),
            end: None,
        });
        assert!(engine(&stub, Strategy::Direct).research(&req).await.is_err());
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_parse_or_repair_skips_repair_on_valid_text() {
        let stub = Arc::new(ScriptedGenerator::new(vec![]));
        let report = engine(&stub, Strategy::Direct).parse_or_repair(VALID).await;
        assert_eq!(report.title.as_deref(), Some("抹茶トレンド"));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_field_type_drift_does_not_trigger_repair() {
        let stub = Arc::new(ScriptedGenerator::new(vec![]));
        let engine = engine(&stub, Strategy::Direct);

        let report = engine
            .parse_or_repair(r#"{"title":"抹茶","trends":["a","b"],"credibility_score":"4/5"}"#)
            .await;
        assert_eq!(report.trends, vec!["a", "b"]);
        assert_eq!(report.credibility_score, None);
        assert!(report.risks.is_empty());

        let report = engine
            .parse_or_repair(r#"{"id":1,"title":"抹茶","trends":["a"]}"#)
            .await;
        assert_eq!(report.id.as_deref(), Some("1"));
        assert_eq!(report.trends, vec!["a"]);

        let report = engine
            .parse_or_repair(
                r#"{"title":"抹茶","trends":["a"],"sources":[{"title":"s","url":"https://example.com","credibility":"高"}]}"#,
            )
            .await;
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].credibility, None);

        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_chained_search_keeps_text_around_unreadable_items() {
        let search = crate::llm::ProviderResponse::from_value(json!({
            "output": [
                { "type": "reasoning", "content": null },
                { "type": "message", "content": [ { "type": "output_text", "text": "research draft" } ] }
            ]
        }));
        let stub = Arc::new(ScriptedGenerator::new(vec![Ok(search), flat(VALID)]));
        engine(&stub, Strategy::Chained)
            .research(&matcha())
            .await
            .unwrap();

        let calls = stub.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].messages[1].content.contains("research draft"));
    }

    #[tokio::test]
    async fn test_parse_or_repair_never_fails() {
        let stub = Arc::new(ScriptedGenerator::new(vec![]));
        let report = engine(&stub, Strategy::Direct).parse_or_repair("{oops").await;
        assert_empty_shape(&report);
        assert_eq!(report.title.as_deref(), Some(""));
        assert_eq!(stub.count(Tooling::FreeForm), 1);
    }

    #[tokio::test]
    async fn test_model_supplied_identity_is_kept() {
        let stub = Arc::new(ScriptedGenerator::new(vec![flat(
            r#"{"id":"model-id","generated_at":"2025-06-01T00:00:00Z","title":"t"}"#,
        )]));
        let report = engine(&stub, Strategy::Direct)
            .research(&matcha())
            .await
            .unwrap();
        assert_eq!(report.id.as_deref(), Some("model-id"));
        assert_eq!(report.generated_at.as_deref(), Some("2025-06-01T00:00:00Z"));
    }
}
