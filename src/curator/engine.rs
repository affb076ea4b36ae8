//! Escalation Loop
//!
//! Drives the candidate ranker across a backend ladder, weakest first:
//!
//! ```text
//! Pending(0) ──accept──▶ Accepted
//!     │
//!  escalate
//!     ▼
//! Pending(1) ── ... ──▶ Pending(len) ──▶ Exhausted
//! ```
//!
//! A step is accepted when its winner validated and carries none of the
//! configured must-escalate signals. An exhausted loop still returns the last
//! winner, flagged for review. Transport and configuration errors abort the
//! request; validation failures never do.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::candidate::Ranking;
use super::ranker::CandidateRanker;
use crate::ai::gateway::InferenceGateway;
use crate::ai::prompt::TemplateLibrary;
use crate::ai::provider::SharedBackend;
use crate::ai::validation::{ValidationResult, Validator};
use crate::config::{Config, DecodingConfig, RankingConfig};
use crate::constants::{escalation, ranking};
use crate::router::{DecodingOptions, ModelInfo, Router, decoding};
use crate::storage::{
    CandidateRecord, OutcomeRecord, RunRecord, RunSink, StepRecord, WinnerRecord, proxy_score,
};
use crate::types::{EscalatorError, Result, TaskFamily};

/// Loop state; `Pending` holds the ladder index about to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationState {
    Pending(usize),
    Accepted,
    Exhausted,
}

impl fmt::Display for EscalationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationState::Pending(i) => write!(f, "pending({})", i),
            EscalationState::Accepted => write!(f, "accepted"),
            EscalationState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// One top-level request
#[derive(Debug, Clone, Default)]
pub struct CurateRequest {
    pub input: String,
    /// Task family hint; skips classification
    pub task: Option<String>,
    /// Pinned starting model; `None` or `"auto"` uses the task map
    pub model: Option<String>,
    /// Variants per step; defaults to `ranking.candidates`
    pub candidates: Option<usize>,
}

impl CurateRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_candidates(mut self, n: usize) -> Self {
        self.candidates = Some(n);
        self
    }
}

/// Terminal result of one request
#[derive(Debug, Clone, Serialize)]
pub struct EscalationOutcome {
    pub task_family: TaskFamily,
    /// Registry key of the model that produced the output
    pub backend_used: String,
    /// Name the backend knows that model by
    pub backend_model: String,
    pub output_text: String,
    pub validation: ValidationResult,
    /// Ladder index of the producing step
    pub attempted_chain_position: usize,
    pub state: EscalationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_location: Option<String>,
}

impl EscalationOutcome {
    pub fn is_accepted(&self) -> bool {
        self.state == EscalationState::Accepted
    }
}

/// Escalation engine built from one immutable [`Config`]
pub struct Escalator {
    router: Router,
    decoding: DecodingConfig,
    ranking: RankingConfig,
    gateway: InferenceGateway,
    validator: Validator,
    templates: TemplateLibrary,
    sink: Option<Arc<dyn RunSink>>,
}

impl Escalator {
    pub fn new(config: &Config, backend: SharedBackend) -> Result<Self> {
        Ok(Self {
            router: Router::new(config)?,
            decoding: config.decoding.clone(),
            ranking: config.ranking.clone(),
            gateway: InferenceGateway::new(backend, &config.gateway)?,
            validator: Validator::new(&config.paths.schema_dir),
            templates: TemplateLibrary::new(&config.paths.prompt_dir),
            sink: None,
        })
    }

    /// Record every finished request to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn RunSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run `request` unless `token` is cancelled first. Cancellation drops
    /// the in-flight call or backoff sleep.
    pub async fn curate_with_cancel(
        &self,
        request: CurateRequest,
        token: CancellationToken,
    ) -> Result<EscalationOutcome> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Request cancelled");
                Err(EscalatorError::Cancelled)
            }
            result = self.curate(request) => result,
        }
    }

    #[instrument(skip(self, request), fields(task = tracing::field::Empty))]
    pub async fn curate(&self, request: CurateRequest) -> Result<EscalationOutcome> {
        let family = self
            .router
            .classifier()
            .classify_with_hint(&request.input, request.task.as_deref());
        tracing::Span::current().record("task", family.as_str());

        // Configuration faults surface before any backend call
        let options = decoding::resolve(&family, &self.decoding)?;
        self.validator.preflight(&family)?;
        let template = self.templates.load_for(&family)?;
        let ladder = self.router.ladder(&family, request.model.as_deref())?;

        let base_prompt = TemplateLibrary::render(&template, &request.input);
        let n = request
            .candidates
            .unwrap_or(self.ranking.candidates)
            .clamp(1, ranking::MAX_CANDIDATES);
        let ranker = CandidateRanker::new(&self.gateway, &self.validator, self.ranking.parallel);

        debug!(
            ladder = ?ladder.iter().map(|m| m.key.as_str()).collect::<Vec<_>>(),
            candidates = n,
            "Starting escalation"
        );

        let mut state = EscalationState::Pending(0);
        let mut steps = Vec::with_capacity(ladder.len());
        let mut last = None;

        while let EscalationState::Pending(position) = state {
            let Some(model) = ladder.get(position) else {
                state = EscalationState::Exhausted;
                break;
            };

            let ranking = ranker
                .rank(&family, model, &base_prompt, &options, n)
                .await?;
            steps.push(step_record(position, model, &ranking));

            let winner = ranking.into_winner();
            let accepted = winner.validation.ok
                && !self.router.must_escalate(&winner.validation.signals);

            info!(
                position,
                model = %model.key,
                ok = winner.validation.ok,
                accepted,
                "Escalation step finished"
            );

            state = if accepted {
                EscalationState::Accepted
            } else {
                EscalationState::Pending(position + 1)
            };
            last = Some((position, model, winner));
        }

        let (position, model, winner) = last.ok_or_else(|| {
            EscalatorError::Config(format!("task family '{}' has an empty ladder", family))
        })?;

        let warning = match state {
            EscalationState::Exhausted => {
                warn!(family = %family, "Escalation chain exhausted; output needs review");
                Some(escalation::REVIEW_WARNING.to_string())
            }
            _ => None,
        };

        let mut outcome = EscalationOutcome {
            task_family: family,
            backend_used: model.key.clone(),
            backend_model: model.backend_name.clone(),
            output_text: winner.text,
            validation: winner.validation,
            attempted_chain_position: position,
            state,
            warning,
            steps,
            run_location: None,
        };

        outcome.run_location = self.record(&request.input, &options, &outcome).await;
        Ok(outcome)
    }

    /// Best-effort write to the run sink, off the async worker threads
    async fn record(
        &self,
        input: &str,
        options: &DecodingOptions,
        outcome: &EscalationOutcome,
    ) -> Option<String> {
        let sink = self.sink.clone()?;
        let record = RunRecord {
            run_id: uuid::Uuid::new_v4().to_string(),
            ts: chrono::Utc::now(),
            task_family: outcome.task_family.clone(),
            user_input: input.to_string(),
            options: options.clone(),
            steps: outcome.steps.clone(),
            outcome: OutcomeRecord {
                state: outcome.state.to_string(),
                model: outcome.backend_model.clone(),
                position: outcome.attempted_chain_position,
                ok: outcome.validation.ok,
                signals: outcome.validation.signals.clone(),
                warning: outcome.warning.clone(),
                score: proxy_score(outcome.validation.ok, outcome.validation.signals.len()),
            },
        };

        match tokio::task::spawn_blocking(move || sink.append(&record)).await {
            Ok(Ok(location)) => {
                debug!(location = %location, "Run recorded");
                Some(location)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to write run record");
                None
            }
            Err(e) => {
                warn!(error = %e, "Run record writer did not finish");
                None
            }
        }
    }
}

fn step_record(position: usize, model: &ModelInfo, ranking: &Ranking) -> StepRecord {
    let winner = ranking.winner();
    StepRecord {
        position,
        model: model.backend_name.clone(),
        candidates: ranking
            .candidates()
            .iter()
            .map(|c| CandidateRecord {
                variant: c.variant,
                ok: c.validation.ok,
                signals: c.validation.signals.clone(),
                elapsed_ms: c.elapsed.as_millis() as u64,
                repaired: c.repaired,
            })
            .collect(),
        winner: WinnerRecord {
            index: ranking.winner_index(),
            ok: winner.validation.ok,
            signals: winner.validation.signals.clone(),
        },
        score: proxy_score(winner.validation.ok, winner.validation.signals.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::testing::ScriptedBackend;
    use crate::ai::validation::Signal;
    use crate::config::{ModelConfig, RouteConfig, scaffold};
    use crate::storage::MemoryRunLog;
    use crate::types::{ErrorCategory, LlmError};
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::{Instant, sleep};

    const CODE_OK: &str = r#"{"summary": "csv parser", "code": "fn parse() {}"}"#;
    const ANSWER_OK: &str = r#"{"answer": "42"}"#;

    /// Project with default templates and schemas; models are named after
    /// their keys so scripted replies can be keyed by either
    fn project() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        scaffold::write_defaults(dir.path(), false).unwrap();

        let mut config = Config::default();
        config.paths.schema_dir = dir.path().join("schemas");
        config.paths.prompt_dir = dir.path().join("prompts");
        config.ranking.candidates = 1;

        let mut models = BTreeMap::new();
        for key in ["small", "medium", "large", "a", "b"] {
            models.insert(
                key.to_string(),
                ModelConfig {
                    backend_name: key.to_string(),
                    context_max: 8192,
                    family: "test".to_string(),
                },
            );
        }
        config.models.models = models;
        config.validate().unwrap();
        (dir, config)
    }

    fn escalator(config: &Config, backend: &Arc<ScriptedBackend>) -> Escalator {
        Escalator::new(config, backend.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_repair_accepts_at_first_rung() {
        let (_dir, config) = project();
        let backend = Arc::new(
            ScriptedBackend::new()
                .push_text("small", "def parse_csv(path):")
                .push_text("small", CODE_OK),
        );

        let outcome = escalator(&config, &backend)
            .curate(CurateRequest::new("Please implement a function to parse CSV"))
            .await
            .unwrap();

        assert_eq!(outcome.task_family, TaskFamily::CODE_ASSIST);
        assert_eq!(outcome.state, EscalationState::Accepted);
        assert_eq!(outcome.attempted_chain_position, 0);
        assert_eq!(outcome.backend_used, "small");
        assert!(outcome.validation.ok);
        assert!(outcome.warning.is_none());
        assert!(outcome.steps[0].candidates[0].repaired);
        assert_eq!(backend.models_called(), vec!["small", "small"]);
    }

    #[tokio::test]
    async fn test_exhausted_chain_flags_review() {
        let (_dir, mut config) = project();
        config.routing.task_map.insert(
            TaskFamily::EXTRACTION.to_string(),
            RouteConfig {
                initial: "a".to_string(),
                chain: vec!["a".to_string(), "b".to_string()],
            },
        );
        let schema_invalid = Ok(r#"{"nope": 1}"#.to_string());
        let backend = Arc::new(
            ScriptedBackend::new()
                .always("a", schema_invalid.clone())
                .always("b", schema_invalid),
        );

        let outcome = escalator(&config, &backend)
            .curate(CurateRequest::new("Extract the invoice number"))
            .await
            .unwrap();

        assert_eq!(outcome.state, EscalationState::Exhausted);
        assert_eq!(outcome.warning.as_deref(), Some("low confidence; review"));
        assert!(!outcome.validation.ok);
        assert!(outcome.validation.has_signal(Signal::SchemaFail));
        assert_eq!(outcome.attempted_chain_position, 1);
        assert_eq!(outcome.backend_used, "b");
        // generate + repair on each rung
        assert_eq!(backend.models_called(), vec!["a", "a", "b", "b"]);
    }

    #[tokio::test]
    async fn test_must_escalate_signal_moves_up() {
        let (_dir, config) = project();
        let backend = Arc::new(
            ScriptedBackend::new()
                .push_text("small", r#"{"answer": "I cannot comply"}"#)
                .push_text("medium", ANSWER_OK),
        );

        let outcome = escalator(&config, &backend)
            .curate(CurateRequest::new("Why is the sky blue?"))
            .await
            .unwrap();

        assert_eq!(outcome.task_family, TaskFamily::ANALYTICAL);
        assert_eq!(outcome.state, EscalationState::Accepted);
        assert_eq!(outcome.attempted_chain_position, 1);
        assert_eq!(outcome.output_text, ANSWER_OK);
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.steps[0].winner.signals, vec![Signal::RefusalDetected]);
    }

    #[tokio::test]
    async fn test_uncertain_valid_output_is_accepted_by_default() {
        let (_dir, config) = project();
        let backend = Arc::new(
            ScriptedBackend::new().push_text("small", r#"{"answer": "maybe 42"}"#),
        );

        let outcome = escalator(&config, &backend)
            .curate(CurateRequest::new("Why is the sky blue?"))
            .await
            .unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(outcome.validation.signals, vec![Signal::UncertaintyMarkers]);
    }

    #[tokio::test]
    async fn test_transport_error_aborts_request() {
        let (_dir, config) = project();
        let backend = Arc::new(ScriptedBackend::new().always(
            "small",
            Err(LlmError::new(ErrorCategory::Transient, "502 bad gateway")),
        ));

        let err = escalator(&config, &backend)
            .curate(CurateRequest::new("Why is the sky blue?"))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(backend.models_called(), vec!["small"]);
    }

    #[tokio::test]
    async fn test_missing_schema_fails_before_any_call() {
        let (dir, config) = project();
        std::fs::remove_file(dir.path().join("schemas").join("analytical.schema.json")).unwrap();
        let backend = Arc::new(ScriptedBackend::new().always("small", Ok(ANSWER_OK.to_string())));

        let err = escalator(&config, &backend)
            .curate(CurateRequest::new("Why is the sky blue?"))
            .await
            .unwrap_err();
        assert!(matches!(err, EscalatorError::Schema { .. }));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_task_hint_is_configuration_error() {
        let (_dir, config) = project();
        let backend = Arc::new(ScriptedBackend::new());

        let err = escalator(&config, &backend)
            .curate(CurateRequest::new("anything").with_task("summarize"))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("summarize"));
    }

    #[tokio::test]
    async fn test_invocations_bounded_by_ladder() {
        let (_dir, config) = project();
        let backend = Arc::new(
            ScriptedBackend::new()
                .always("small", Ok("garbage".to_string()))
                .always("medium", Ok("garbage".to_string()))
                .always("large", Ok("garbage".to_string())),
        );

        let outcome = escalator(&config, &backend)
            .curate(CurateRequest::new("Why is the sky blue?").with_model("large"))
            .await
            .unwrap();

        let chain_len = config.routing.task_map[TaskFamily::ANALYTICAL].chain.len();
        assert!(outcome.steps.len() <= chain_len + 1);
        assert_eq!(outcome.steps.len(), 4);
        assert_eq!(outcome.state, EscalationState::Exhausted);
    }

    #[tokio::test]
    async fn test_pinned_model_starts_ladder() {
        let (_dir, config) = project();
        let backend = Arc::new(ScriptedBackend::new().push_text("large", ANSWER_OK));

        let outcome = escalator(&config, &backend)
            .curate(CurateRequest::new("Why is the sky blue?").with_model("strong"))
            .await
            .unwrap();
        assert_eq!(outcome.backend_used, "large");
        assert_eq!(outcome.attempted_chain_position, 0);
    }

    #[tokio::test]
    async fn test_run_record_written() {
        let (_dir, config) = project();
        let backend = Arc::new(
            ScriptedBackend::new()
                .push_text("small", r#"{"answer": "maybe"}"#)
                .push_text("small", ANSWER_OK),
        );
        let sink = Arc::new(MemoryRunLog::new());

        let outcome = escalator(&config, &backend)
            .with_sink(sink.clone())
            .curate(CurateRequest::new("Why is the sky blue?").with_candidates(2))
            .await
            .unwrap();

        assert_eq!(outcome.run_location.as_deref(), Some("memory:0"));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.outcome.state, "accepted");
        assert_eq!(record.outcome.score, 1.0);
        assert_eq!(record.steps[0].candidates.len(), 2);
        assert_eq!(record.steps[0].winner.index, 1);
        assert_eq!(record.user_input, "Why is the sky blue?");
    }

    struct FailingSink;

    impl RunSink for FailingSink {
        fn append(&self, _record: &RunRecord) -> Result<String> {
            Err(EscalatorError::Config("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_fail_request() {
        let (_dir, config) = project();
        let backend = Arc::new(ScriptedBackend::new().push_text("small", ANSWER_OK));

        let outcome = escalator(&config, &backend)
            .with_sink(Arc::new(FailingSink))
            .curate(CurateRequest::new("Why is the sky blue?"))
            .await
            .unwrap();
        assert!(outcome.is_accepted());
        assert!(outcome.run_location.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let (_dir, config) = project();
        let backend = Arc::new(ScriptedBackend::new().always("small", Ok(ANSWER_OK.to_string())));
        let token = CancellationToken::new();
        token.cancel();

        let err = escalator(&config, &backend)
            .curate_with_cancel(CurateRequest::new("Why is the sky blue?"), token)
            .await
            .unwrap_err();
        assert!(matches!(err, EscalatorError::Cancelled));
        assert_eq!(backend.calls(), 0);
    }

    /// Cancel `token` after `after`, racing it against `run`
    async fn cancel_after<T>(
        token: &CancellationToken,
        after: Duration,
        run: impl std::future::Future<Output = T>,
    ) -> T {
        let canceller = async {
            sleep(after).await;
            token.cancel();
        };
        let (result, ()) = tokio::join!(run, canceller);
        result
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_generation() {
        let (_dir, config) = project();
        let backend = Arc::new(
            ScriptedBackend::new()
                .always("small", Ok(ANSWER_OK.to_string()))
                .with_latency(Duration::from_secs(30)),
        );
        let escalator = escalator(&config, &backend);
        let token = CancellationToken::new();
        let start = Instant::now();

        let result = cancel_after(
            &token,
            Duration::from_secs(1),
            escalator.curate_with_cancel(CurateRequest::new("Why is the sky blue?"), token.clone()),
        )
        .await;

        assert!(matches!(result, Err(EscalatorError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_backoff_sleep() {
        let (_dir, mut config) = project();
        config.gateway.backoff_secs = 60.0;
        config.gateway.backoff_cap_secs = 60.0;
        config.validate().unwrap();
        let backend = Arc::new(ScriptedBackend::new().always(
            "small",
            Err(LlmError::new(ErrorCategory::Network, "connection reset")),
        ));
        let escalator = escalator(&config, &backend);
        let token = CancellationToken::new();
        let start = Instant::now();

        let result = cancel_after(
            &token,
            Duration::from_secs(1),
            escalator.curate_with_cancel(CurateRequest::new("Why is the sky blue?"), token.clone()),
        )
        .await;

        assert!(matches!(result, Err(EscalatorError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_valid_refusals_exhaust_the_ladder() {
        let (_dir, config) = project();
        let refusal = Ok(r#"{"answer": "I cannot comply with that"}"#.to_string());
        let backend = Arc::new(
            ScriptedBackend::new()
                .always("small", refusal.clone())
                .always("medium", refusal.clone())
                .always("large", refusal),
        );

        let outcome = escalator(&config, &backend)
            .curate(CurateRequest::new("Why is the sky blue?"))
            .await
            .unwrap();

        assert_eq!(outcome.state, EscalationState::Exhausted);
        assert!(outcome.validation.ok);
        assert_eq!(outcome.validation.signals, vec![Signal::RefusalDetected]);
        assert_eq!(outcome.warning.as_deref(), Some(escalation::REVIEW_WARNING));
        assert_eq!(outcome.attempted_chain_position, 2);
        assert_eq!(outcome.backend_used, "large");
        assert_eq!(backend.models_called(), vec!["small", "medium", "large"]);
    }
}
