//! Pipeline orchestrator: stage selection, streamed collection, and aggregation.
//!
//! A run advances turn by turn. The selection policy picks the next stage or
//! batch from the shared turn log, each selected stage is invoked with the
//! task payload, and every chunk lands in the [`StreamCollector`] before the
//! policy is asked again. Once the aggregator has spoken, the sealed buffers
//! go through the result aggregator.

pub mod collector;
pub mod history;
pub mod payload;
pub mod policy;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::{StreamExt, stream};
use indexmap::IndexMap;

use crate::aggregator::{AggregateReport, Aggregator, extract_history_flags};
use crate::config::{Config, PolicyKind};
use crate::constants::{DEFAULT_FINAL_MIN_LEN, DEFAULT_FUZZY_THRESHOLD, DEFAULT_MAX_MESSAGES};
use crate::diff::LineLocator;
use crate::models::{
    ErrorCode, PipelineResult, ReviewRequest, RunError, RunStatus, StageDefinition, StageRole,
    Turn,
};
use crate::providers::{InferenceEvent, InferenceProvider, ProviderError};
use crate::stages::StageGraph;
use crate::tools::{LocatorTools, locator_tool_descriptors};

pub use collector::{CollectorError, StageBuffer, StreamCollector};
pub use payload::{TaskPayload, build_task_payload, reputation_label};
pub use policy::{DynamicPolicy, Selection, SelectionPolicy, Selector, StaticPolicy};

/// Run limits and tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Hard ceiling on streamed chunks per run.
    pub max_messages: usize,
    /// Longest wait for the next chunk of a running batch. `None` waits forever.
    pub stage_idle_timeout: Option<Duration>,
    pub final_min_len: usize,
    pub fuzzy_threshold: f64,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            stage_idle_timeout: None,
            final_min_len: DEFAULT_FINAL_MIN_LEN,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_messages: config.pipeline.max_messages,
            stage_idle_timeout: config.pipeline.stage_idle_timeout(),
            final_min_len: config.pipeline.final_min_len,
            fuzzy_threshold: config.locator.fuzzy_threshold,
        }
    }
}

/// The policy configured by `kind`.
pub fn policy_for(kind: PolicyKind) -> Box<dyn SelectionPolicy> {
    match kind {
        PolicyKind::Static => Box::new(StaticPolicy),
        PolicyKind::Dynamic => Box::new(DynamicPolicy::mention_order()),
    }
}

type TaggedEvent = (String, Option<Result<InferenceEvent, ProviderError>>);

/// Drives one review request through the stage graph.
pub struct Orchestrator {
    graph: Option<StageGraph>,
    provider: Arc<dyn InferenceProvider>,
    policy: Box<dyn SelectionPolicy>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(
        graph: Option<StageGraph>,
        provider: Arc<dyn InferenceProvider>,
        policy: Box<dyn SelectionPolicy>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            graph,
            provider,
            policy,
            options,
        }
    }

    pub fn graph(&self) -> Option<&StageGraph> {
        self.graph.as_ref()
    }

    /// Run the pipeline. Failures come back as an errored result, never a panic or `Err`.
    pub async fn run(&self, request: &ReviewRequest) -> PipelineResult {
        let Some(graph) = self.graph.as_ref().filter(|g| !g.is_empty()) else {
            tracing::warn!(review_id = request.review_id(), "no stage graph configured");
            return PipelineResult::failed(
                request.review_id(),
                request.author(),
                ErrorCode::OrchestratorUnavailable,
                "no stage graph configured",
            );
        };

        let started = Instant::now();
        tracing::info!(
            review_id = request.review_id(),
            policy = self.policy.name(),
            stages = graph.len(),
            "pipeline run started"
        );

        let mut collector = StreamCollector::new(self.options.final_min_len);
        let outcome = self.drive(graph, request, &mut collector).await;
        let stage_stats = collector.stats();
        let stage_outputs = collector.seal();

        let result = match outcome {
            Ok(()) => {
                let report = aggregate(graph, &stage_outputs);
                PipelineResult {
                    review_id: request.review_id().to_string(),
                    status: RunStatus::Success,
                    stage_outputs,
                    findings: report.findings,
                    author: request.author().to_string(),
                    timestamp: Utc::now(),
                    error: None,
                    stage_stats,
                    warnings: report.warnings,
                }
            }
            Err(error) => {
                tracing::warn!(
                    review_id = request.review_id(),
                    code = %error.code,
                    "pipeline run failed: {}",
                    error.message
                );
                PipelineResult {
                    review_id: request.review_id().to_string(),
                    status: RunStatus::Error,
                    stage_outputs,
                    findings: Vec::new(),
                    author: request.author().to_string(),
                    timestamp: Utc::now(),
                    error: Some(error),
                    stage_stats,
                    warnings: Vec::new(),
                }
            }
        };

        tracing::info!(
            review_id = request.review_id(),
            status = %result.status,
            findings = result.findings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline run finished"
        );
        result
    }

    async fn drive(
        &self,
        graph: &StageGraph,
        request: &ReviewRequest,
        collector: &mut StreamCollector,
    ) -> Result<(), RunError> {
        let locator =
            LineLocator::new(request.diff()).with_threshold(self.options.fuzzy_threshold);
        let tools = LocatorTools::new(Arc::new(locator));
        let descriptors = if graph.stages().iter().any(|s| s.tools) {
            locator_tool_descriptors()
        } else {
            Vec::new()
        };
        let task = build_task_payload(request, &descriptors);

        let mut log = vec![Turn::user(task.clone())];
        let mut messages = 0usize;

        let aggregator = graph.aggregator().id.as_str();
        loop {
            let batch = match self.policy.select(graph, &log) {
                Selection::Done if collector.buffer(aggregator).is_some() => return Ok(()),
                Selection::Done => return Err(incomplete_run(graph, collector, "selection ended")),
                Selection::Run(ids) => ids,
            };

            let stages: Vec<&StageDefinition> = batch
                .iter()
                .filter_map(|id| {
                    let stage = graph.get(id);
                    if stage.is_none() {
                        tracing::warn!(stage = %id, "policy selected an unknown stage");
                    }
                    stage
                })
                .filter(|s| collector.buffer(&s.id).is_none())
                .collect();
            if stages.is_empty() {
                tracing::warn!(?batch, "selection made no progress");
                return Err(incomplete_run(graph, collector, "selection stalled"));
            }

            let roles: HashMap<String, StageRole> =
                stages.iter().map(|s| (s.id.clone(), s.role)).collect();
            let mut streams = Vec::with_capacity(stages.len());
            for stage in &stages {
                collector
                    .open_turn(&stage.id, stage.role)
                    .map_err(collector_error)?;
                tracing::debug!(stage = %stage.id, role = %stage.role, "stage turn started");
                let chunks = self
                    .provider
                    .invoke(stage, &task, &log, stage.tools.then_some(&tools))
                    .await
                    .map_err(|e| {
                        RunError::new(
                            ErrorCode::InferenceFailure,
                            format!("stage '{}' failed: {e}", stage.id),
                        )
                    })?;
                let id = stage.id.clone();
                let tagged = chunks
                    .map(Some)
                    .chain(stream::once(async { None }))
                    .map(move |event| -> TaggedEvent { (id.clone(), event) })
                    .boxed();
                streams.push(tagged);
            }

            let mut events = stream::select_all(streams);
            let mut open: HashSet<String> = roles.keys().cloned().collect();

            while !open.is_empty() {
                let next = match self.options.stage_idle_timeout {
                    Some(idle) => tokio::time::timeout(idle, events.next())
                        .await
                        .map_err(|_| idle_timeout_error(idle, &open))?,
                    None => events.next().await,
                };
                let Some((id, event)) = next else {
                    break;
                };
                if !open.contains(&id) {
                    continue;
                }

                match event {
                    Some(Ok(InferenceEvent::Chunk(text))) => {
                        messages += 1;
                        if messages > self.options.max_messages {
                            return Err(RunError::new(
                                ErrorCode::MessageLimitExceeded,
                                format!(
                                    "message ceiling of {} reached",
                                    self.options.max_messages
                                ),
                            ));
                        }
                        let role = roles.get(&id).copied().unwrap_or(StageRole::Analyzer);
                        collector
                            .append(&id, role, &text, Utc::now())
                            .map_err(collector_error)?;
                    }
                    Some(Ok(InferenceEvent::EndOfTurn)) => {
                        close_turn(collector, &mut log, &id, true)?;
                        open.remove(&id);
                    }
                    Some(Err(e)) => {
                        return Err(RunError::new(
                            ErrorCode::InferenceFailure,
                            format!("stage '{id}' stream failed: {e}"),
                        ));
                    }
                    None => {
                        close_turn(collector, &mut log, &id, false)?;
                        open.remove(&id);
                    }
                }
            }
        }
    }
}

/// End a stage's turn and record what it said in the log.
fn close_turn(
    collector: &mut StreamCollector,
    log: &mut Vec<Turn>,
    stage: &str,
    explicit_end: bool,
) -> Result<(), RunError> {
    let status = collector
        .finish_turn(stage, explicit_end)
        .map_err(collector_error)?;
    let text = collector.buffer(stage).map(StageBuffer::text).unwrap_or_default();
    tracing::debug!(stage, %status, chars = text.len(), "stage turn finished");
    log.push(Turn::assistant(stage, text));
    Ok(())
}

/// Normalize findings from every stage but the dispatcher, whose output only
/// contributes historical-repeat flags.
fn aggregate(graph: &StageGraph, outputs: &IndexMap<String, String>) -> AggregateReport {
    let dispatcher = graph.dispatcher().id.as_str();
    let flags = outputs
        .get(dispatcher)
        .map(|text| extract_history_flags(text))
        .unwrap_or_default();
    let reviewed: IndexMap<String, String> = outputs
        .iter()
        .filter(|(id, _)| id.as_str() != dispatcher)
        .map(|(id, text)| (id.clone(), text.clone()))
        .collect();
    Aggregator::new().with_history(flags).report(&reviewed)
}

fn incomplete_run(graph: &StageGraph, collector: &StreamCollector, reason: &str) -> RunError {
    let missing: Vec<&str> = graph
        .topological_order()
        .map(|s| s.id.as_str())
        .filter(|id| collector.buffer(id).is_none())
        .collect();
    RunError::new(
        ErrorCode::IncompleteRun,
        format!("{reason} before stage(s) ran: {}", missing.join(", ")),
    )
}

fn idle_timeout_error(idle: Duration, open: &HashSet<String>) -> RunError {
    let mut waiting: Vec<&str> = open.iter().map(String::as_str).collect();
    waiting.sort_unstable();
    RunError::new(
        ErrorCode::InferenceTimeout,
        format!(
            "no output for {}s from stage(s): {}",
            idle.as_secs(),
            waiting.join(", ")
        ),
    )
}

fn collector_error(err: CollectorError) -> RunError {
    RunError::new(ErrorCode::InferenceFailure, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Severity, StageStatus};
    use crate::providers::ChunkStream;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Script {
        Reply(Vec<&'static str>),
        /// Chunks with no end-of-turn signal.
        Trailing(Vec<&'static str>),
        Fail,
        BreakMidStream(&'static str),
        Hang,
    }

    struct ScriptedProvider {
        scripts: HashMap<&'static str, Script>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedProvider {
        fn new(scripts: impl IntoIterator<Item = (&'static str, Script)>) -> Arc<Self> {
            Arc::new(Self {
                scripts: scripts.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn order(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
        }
    }

    #[async_trait]
    impl InferenceProvider for ScriptedProvider {
        async fn invoke(
            &self,
            stage: &StageDefinition,
            _task: &str,
            prior_turns: &[Turn],
            _tools: Option<&LocatorTools>,
        ) -> Result<ChunkStream, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((stage.id.clone(), prior_turns.len()));
            let script = self
                .scripts
                .get(stage.id.as_str())
                .cloned()
                .unwrap_or(Script::Reply(vec!["[]"]));
            let events: Vec<Result<InferenceEvent, ProviderError>> = match script {
                Script::Reply(chunks) => chunks
                    .into_iter()
                    .map(|c| Ok(InferenceEvent::Chunk(c.to_string())))
                    .chain(std::iter::once(Ok(InferenceEvent::EndOfTurn)))
                    .collect(),
                Script::Trailing(chunks) => chunks
                    .into_iter()
                    .map(|c| Ok(InferenceEvent::Chunk(c.to_string())))
                    .collect(),
                Script::Fail => return Err(ProviderError::ApiError("429 Too Many Requests".into())),
                Script::BreakMidStream(first) => vec![
                    Ok(InferenceEvent::Chunk(first.to_string())),
                    Err(ProviderError::StreamError("connection reset".into())),
                ],
                Script::Hang => return Ok(stream::pending().boxed()),
            };
            Ok(stream::iter(events).boxed())
        }
    }

    fn stage(id: &str, role: StageRole, deps: &[&str]) -> StageDefinition {
        StageDefinition {
            id: id.into(),
            role,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            tools: role == StageRole::Analyzer,
            description: String::new(),
            instructions: format!("you are {id}"),
        }
    }

    fn graph() -> StageGraph {
        StageGraph::new(vec![
            stage("dispatcher", StageRole::Dispatcher, &[]),
            stage("security", StageRole::Analyzer, &["dispatcher"]),
            stage("logic", StageRole::Analyzer, &["dispatcher"]),
            stage("aggregator", StageRole::Aggregator, &["security", "logic"]),
        ])
        .unwrap()
    }

    fn request() -> ReviewRequest {
        ReviewRequest::builder("+++ b/src/db.rs\n@@ -1,1 +1,2 @@\n ctx\n+query(input)\n")
            .review_id("r1")
            .author("sam")
            .build()
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        policy: Box<dyn SelectionPolicy>,
        options: OrchestratorOptions,
    ) -> Orchestrator {
        Orchestrator::new(Some(graph()), provider, policy, options)
    }

    const SECURITY: &str = r#"[{"file":"src/db.rs","line":2,"category":"security","severity":"minor","description":"unsanitized input reaches the query"}]"#;

    #[tokio::test]
    async fn missing_graph_fails_before_any_stage() {
        let provider = ScriptedProvider::new([]);
        let orch = Orchestrator::new(
            None,
            provider.clone(),
            Box::new(StaticPolicy),
            OrchestratorOptions::default(),
        );
        let result = orch.run(&request()).await;
        assert_eq!(result.error_code(), Some(ErrorCode::OrchestratorUnavailable));
        assert!(provider.order().is_empty());
    }

    #[tokio::test]
    async fn static_run_aggregates_analyzer_findings() {
        let provider = ScriptedProvider::new([
            ("dispatcher", Script::Reply(vec!["review security and logic"])),
            ("security", Script::Reply(vec![SECURITY])),
            ("logic", Script::Reply(vec!["[", "]"])),
            ("aggregator", Script::Reply(vec![SECURITY])),
        ]);
        let orch = orchestrator(
            provider.clone(),
            Box::new(StaticPolicy),
            OrchestratorOptions::default(),
        );
        let result = orch.run(&request()).await;

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].category, Category::Security);
        assert_eq!(result.findings[0].line, Some(2));
        assert_eq!(
            result.stage_outputs.keys().cloned().collect::<Vec<_>>(),
            vec!["dispatcher", "security", "logic", "aggregator"]
        );
        assert_eq!(result.stage_outputs["logic"], "[]");
        assert!(
            result
                .stage_stats
                .values()
                .all(|s| s.status == StageStatus::Final)
        );

        let order = provider.order();
        assert_eq!(order.first().map(String::as_str), Some("dispatcher"));
        assert_eq!(order.last().map(String::as_str), Some("aggregator"));
    }

    #[tokio::test]
    async fn stages_see_earlier_turns() {
        let provider = ScriptedProvider::new([]);
        let orch = orchestrator(
            provider.clone(),
            Box::new(StaticPolicy),
            OrchestratorOptions::default(),
        );
        orch.run(&request()).await;
        let calls = provider.calls.lock().unwrap().clone();
        // task turn only, then task + dispatcher, then task + dispatcher + both analyzers
        assert_eq!(calls[0], ("dispatcher".to_string(), 1));
        assert_eq!(calls[1].1, 2);
        assert_eq!(calls[2].1, 2);
        assert_eq!(calls[3], ("aggregator".to_string(), 4));
    }

    #[tokio::test]
    async fn dispatcher_flags_escalate_repeats() {
        let provider = ScriptedProvider::new([
            (
                "dispatcher",
                Script::Reply(vec![
                    r#"{"historical_repeats":[{"file":"src/db.rs","line":2,"category":"security"}]}"#,
                ]),
            ),
            ("security", Script::Reply(vec![SECURITY])),
        ]);
        let orch = orchestrator(provider, Box::new(StaticPolicy), OrchestratorOptions::default());
        let result = orch.run(&request()).await;
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].severity, Severity::Medium);
        assert!(result.findings[0].historical_repeat);
    }

    #[tokio::test]
    async fn dynamic_policy_runs_each_stage_once() {
        let provider = ScriptedProvider::new([(
            "dispatcher",
            Script::Reply(vec!["start with logic, then security"]),
        )]);
        let orch = orchestrator(
            provider.clone(),
            Box::new(DynamicPolicy::mention_order()),
            OrchestratorOptions::default(),
        );
        let result = orch.run(&request()).await;
        assert!(result.is_success());
        assert_eq!(
            provider.order(),
            vec!["dispatcher", "logic", "security", "aggregator"]
        );
    }

    #[tokio::test]
    async fn provider_error_keeps_partial_outputs() {
        let provider = ScriptedProvider::new([
            ("dispatcher", Script::Reply(vec!["go"])),
            ("logic", Script::Fail),
        ]);
        let orch = orchestrator(
            provider.clone(),
            Box::new(DynamicPolicy::new(Box::new(|_, _| Some("logic".into())))),
            OrchestratorOptions::default(),
        );
        let result = orch.run(&request()).await;
        assert_eq!(result.error_code(), Some(ErrorCode::InferenceFailure));
        assert_eq!(result.stage_outputs["dispatcher"], "go");
        assert!(result.findings.is_empty());
        assert!(!provider.order().contains(&"aggregator".to_string()));
    }

    #[tokio::test]
    async fn broken_stream_is_an_inference_failure() {
        let provider = ScriptedProvider::new([("security", Script::BreakMidStream("[{"))]);
        let orch = orchestrator(provider, Box::new(StaticPolicy), OrchestratorOptions::default());
        let result = orch.run(&request()).await;
        assert_eq!(result.error_code(), Some(ErrorCode::InferenceFailure));
        assert!(
            result
                .error
                .as_ref()
                .is_some_and(|e| e.message.contains("security"))
        );
        assert_eq!(result.stage_outputs["security"], "[{");
    }

    #[tokio::test]
    async fn message_ceiling_is_fatal() {
        let provider = ScriptedProvider::new([("security", Script::Reply(vec!["[", "", "]"]))]);
        let options = OrchestratorOptions {
            max_messages: 3,
            ..Default::default()
        };
        let orch = orchestrator(provider, Box::new(StaticPolicy), options);
        let result = orch.run(&request()).await;
        assert_eq!(result.error_code(), Some(ErrorCode::MessageLimitExceeded));
        assert!(result.stage_outputs.contains_key("dispatcher"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_stage_times_out() {
        let provider = ScriptedProvider::new([("logic", Script::Hang)]);
        let options = OrchestratorOptions {
            stage_idle_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let orch = orchestrator(provider, Box::new(StaticPolicy), options);
        let result = orch.run(&request()).await;
        assert_eq!(result.error_code(), Some(ErrorCode::InferenceTimeout));
        assert!(
            result
                .error
                .as_ref()
                .is_some_and(|e| e.message.contains("logic"))
        );
        assert!(result.stage_outputs.contains_key("dispatcher"));
    }

    #[tokio::test]
    async fn stream_without_end_signal_is_completed() {
        let provider = ScriptedProvider::new([("logic", Script::Trailing(vec!["[]"]))]);
        let orch = orchestrator(provider, Box::new(StaticPolicy), OrchestratorOptions::default());
        let result = orch.run(&request()).await;
        assert!(result.is_success());
        assert_eq!(result.stage_stats["logic"].status, StageStatus::Completed);
        assert_eq!(result.stage_stats["security"].status, StageStatus::Final);
    }

    #[tokio::test]
    async fn unparseable_analyzer_output_becomes_a_finding() {
        let provider = ScriptedProvider::new([("security", Script::Reply(vec!["not json"]))]);
        let orch = orchestrator(provider, Box::new(StaticPolicy), OrchestratorOptions::default());
        let result = orch.run(&request()).await;
        assert!(result.is_success());
        let unparsed: Vec<_> = result
            .findings
            .iter()
            .filter(|f| f.category == Category::UnparsedResult)
            .collect();
        assert_eq!(unparsed.len(), 1);
        assert_eq!(unparsed[0].severity, Severity::Medium);
        assert!(!result.warnings.is_empty());
    }

    /// Runs the dispatcher, then answers with `after_dispatcher` forever.
    struct StallingPolicy {
        after_dispatcher: Selection,
    }

    impl SelectionPolicy for StallingPolicy {
        fn name(&self) -> &'static str {
            "stalling"
        }

        fn select(&self, graph: &StageGraph, log: &[Turn]) -> Selection {
            if policy::spoken(log).contains(&graph.dispatcher().id) {
                self.after_dispatcher.clone()
            } else {
                Selection::Run(vec![graph.dispatcher().id.clone()])
            }
        }
    }

    #[tokio::test]
    async fn ending_before_the_aggregator_is_an_incomplete_run() {
        let provider = ScriptedProvider::new([("dispatcher", Script::Reply(vec!["look at logic"]))]);
        let policy = StallingPolicy {
            after_dispatcher: Selection::Done,
        };
        let orch = orchestrator(provider.clone(), Box::new(policy), OrchestratorOptions::default());
        let result = orch.run(&request()).await;

        assert_eq!(result.status, RunStatus::Error);
        assert_eq!(result.error_code(), Some(ErrorCode::IncompleteRun));
        let message = &result.error.as_ref().unwrap().message;
        assert!(message.contains("security, logic, aggregator"), "{message}");
        assert_eq!(result.stage_outputs["dispatcher"], "look at logic");
        assert!(result.findings.is_empty());
        assert_eq!(provider.order(), vec!["dispatcher"]);
    }

    #[tokio::test]
    async fn reselecting_finished_stages_is_an_incomplete_run() {
        let provider = ScriptedProvider::new([]);
        let policy = StallingPolicy {
            after_dispatcher: Selection::Run(vec!["dispatcher".into(), "ghost".into()]),
        };
        let orch = orchestrator(provider.clone(), Box::new(policy), OrchestratorOptions::default());
        let result = orch.run(&request()).await;

        assert_eq!(result.error_code(), Some(ErrorCode::IncompleteRun));
        assert!(result.stage_outputs.contains_key("dispatcher"));
        assert!(!result.stage_outputs.contains_key("aggregator"));
        assert_eq!(provider.order(), vec!["dispatcher"]);
    }

    #[test]
    fn policy_for_kind() {
        assert_eq!(policy_for(PolicyKind::Static).name(), "static");
        assert_eq!(policy_for(PolicyKind::Dynamic).name(), "dynamic");
    }

    #[test]
    fn options_from_config() {
        let mut config = Config::default();
        config.pipeline.max_messages = 7;
        config.pipeline.stage_idle_timeout_secs = Some(9);
        let options = OrchestratorOptions::from_config(&config);
        assert_eq!(options.max_messages, 7);
        assert_eq!(options.stage_idle_timeout, Some(Duration::from_secs(9)));
    }
}
