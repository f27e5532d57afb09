//! Pipeline API: admission, deadline, persistence, and reputation around a run.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::{Admission, Config};
use crate::constants::{DEFAULT_RETRY_AFTER_SECS, DEFAULT_RUN_TIMEOUT_SECS};
use crate::limiter::{ConcurrencyLimiter, LimiterError, LimiterStatus, SlotGuard};
use crate::models::{ErrorCode, PipelineResult, ReviewRequest};
use crate::orchestrator::Orchestrator;
use crate::reputation::{ReputationAssessment, ReputationCalculator};
use crate::store::{NewReview, ReviewState, ReviewStore, ReviewUpdate};

/// Everything a caller gets back from one review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewReport {
    pub result: PipelineResult,
    /// Set only for successful runs.
    pub reputation: Option<ReputationAssessment>,
    pub concurrency: LimiterStatus,
}

pub struct ReviewService {
    orchestrator: Orchestrator,
    limiter: ConcurrencyLimiter,
    store: Option<Arc<dyn ReviewStore>>,
    calculator: ReputationCalculator,
    admission: Admission,
    run_timeout: Duration,
    retry_after: Duration,
}

impl ReviewService {
    pub fn new(orchestrator: Orchestrator, limiter: ConcurrencyLimiter) -> Self {
        Self {
            orchestrator,
            limiter,
            store: None,
            calculator: ReputationCalculator::default(),
            admission: Admission::default(),
            run_timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
            retry_after: Duration::from_secs(DEFAULT_RETRY_AFTER_SECS),
        }
    }

    /// Service configured from `config`, with a fresh limiter.
    pub fn from_config(orchestrator: Orchestrator, config: &Config) -> Self {
        let retry_after = config.pipeline.retry_after();
        let limiter =
            ConcurrencyLimiter::with_retry_after(config.pipeline.max_concurrent, retry_after);
        Self::new(orchestrator, limiter)
            .with_calculator(config.reputation.calculator())
            .with_admission(config.pipeline.admission)
            .with_run_timeout(config.pipeline.run_timeout())
            .with_retry_after(retry_after)
    }

    pub fn with_store(mut self, store: Arc<dyn ReviewStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_calculator(mut self, calculator: ReputationCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Retry hint attached to timed-out runs.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn status(&self) -> LimiterStatus {
        self.limiter.status()
    }

    /// Whether a run could start within `timeout`, without taking a slot.
    pub async fn wait_for_available_slot(&self, timeout: Option<Duration>) -> bool {
        self.limiter.wait_for_slot(timeout).await
    }

    /// Run one review end to end. Every failure is reported in the result.
    pub async fn run_review(&self, request: &ReviewRequest) -> ReviewReport {
        let slot = match self.admit(request.review_id()).await {
            Ok(slot) => slot,
            Err(err) => {
                let retry_after = match &err {
                    LimiterError::Exceeded(e) => e.retry_after,
                    _ => self.retry_after,
                };
                let result = PipelineResult::failed(
                    request.review_id(),
                    request.author(),
                    ErrorCode::ConcurrencyExceeded,
                    err.to_string(),
                )
                .with_retry_after(retry_after.as_secs());
                return ReviewReport {
                    result,
                    reputation: None,
                    concurrency: self.limiter.status(),
                };
            }
        };

        let store_id = self.record_start(request).await;

        let result = match tokio::time::timeout(self.run_timeout, self.orchestrator.run(request))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    review_id = request.review_id(),
                    timeout_secs = self.run_timeout.as_secs(),
                    "run deadline exceeded"
                );
                PipelineResult::failed(
                    request.review_id(),
                    request.author(),
                    ErrorCode::RunTimeout,
                    format!("run exceeded {}s", self.run_timeout.as_secs()),
                )
                .with_retry_after(self.retry_after.as_secs())
            }
        };

        if let Some(id) = store_id {
            self.record_finish(&id, &result).await;
        }

        let reputation = result.is_success().then(|| {
            self.calculator.assess(
                &result.findings,
                &request.context_id(),
                request.reputation_score(),
            )
        });
        let concurrency = self.limiter.status();
        slot.release();

        ReviewReport {
            result,
            reputation,
            concurrency,
        }
    }

    async fn admit(&self, run_id: &str) -> Result<SlotGuard, LimiterError> {
        match self.admission {
            Admission::Blocking => self.limiter.acquire(run_id).await,
            Admission::FailFast => self.limiter.try_acquire(run_id),
        }
    }

    async fn record_start(&self, request: &ReviewRequest) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.create_review(NewReview::from_request(request)).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(review_id = request.review_id(), "could not record review: {e}");
                None
            }
        }
    }

    async fn record_finish(&self, id: &str, result: &PipelineResult) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        for (stage, output) in &result.stage_outputs {
            if let Err(e) = store.append_stage_output(id, stage, output).await {
                tracing::warn!(store_id = id, stage = %stage, "could not persist stage output: {e}");
            }
        }
        let update = ReviewUpdate {
            state: Some(if result.is_success() {
                ReviewState::Completed
            } else {
                ReviewState::Failed
            }),
            findings: Some(result.findings.clone()),
            error: result.error.clone(),
        };
        if let Err(e) = store.update_review(id, update).await {
            tracing::warn!(store_id = id, "could not persist review result: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{StageDefinition, StageRole, Turn};
    use crate::orchestrator::{OrchestratorOptions, StaticPolicy};
    use crate::providers::{ChunkStream, InferenceEvent, InferenceProvider, ProviderError};
    use crate::stages::StageGraph;
    use crate::store::{MemoryStore, ReviewRecord, StoreError};
    use crate::tools::LocatorTools;
    use async_trait::async_trait;
    use futures::{StreamExt, stream};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        hang: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl InferenceProvider for FixedProvider {
        async fn invoke(
            &self,
            stage: &StageDefinition,
            _task: &str,
            _prior_turns: &[Turn],
            _tools: Option<&LocatorTools>,
        ) -> Result<ChunkStream, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                return Ok(stream::pending().boxed());
            }
            let text = if stage.id == "security" {
                r#"[{"file":"a.rs","line":1,"category":"security","severity":"critical","description":"secret in source"}]"#
            } else {
                "[]"
            };
            Ok(stream::iter(vec![
                Ok(InferenceEvent::Chunk(text.to_string())),
                Ok(InferenceEvent::EndOfTurn),
            ])
            .boxed())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ReviewStore for BrokenStore {
        async fn create_review(&self, _review: NewReview) -> Result<String, StoreError> {
            Ok("id".into())
        }
        async fn update_review(&self, _id: &str, _u: ReviewUpdate) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        async fn append_stage_output(
            &self,
            _id: &str,
            _stage: &str,
            _output: &str,
        ) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        async fn get_review(&self, _id: &str) -> Result<Option<ReviewRecord>, StoreError> {
            Ok(None)
        }
    }

    fn stage(id: &str, role: StageRole, deps: &[&str]) -> StageDefinition {
        StageDefinition {
            id: id.into(),
            role,
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            tools: false,
            description: String::new(),
            instructions: String::new(),
        }
    }

    fn service(hang: bool, max: usize) -> (ReviewService, Arc<FixedProvider>) {
        let graph = StageGraph::new(vec![
            stage("dispatcher", StageRole::Dispatcher, &[]),
            stage("security", StageRole::Analyzer, &["dispatcher"]),
            stage("aggregator", StageRole::Aggregator, &["security"]),
        ])
        .unwrap();
        let provider = Arc::new(FixedProvider {
            hang,
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::new(
            Some(graph),
            provider.clone(),
            Box::new(StaticPolicy),
            OrchestratorOptions::default(),
        );
        let limiter = ConcurrencyLimiter::with_retry_after(max, Duration::from_secs(15));
        (ReviewService::new(orchestrator, limiter), provider)
    }

    fn request(id: &str) -> ReviewRequest {
        ReviewRequest::builder("+++ b/a.rs\n@@ -1 +1 @@\n+let key = \"x\";\n")
            .review_id(id)
            .author("sam")
            .pr_number(42)
            .reputation(60, Vec::new())
            .build()
    }

    #[tokio::test]
    async fn successful_review_is_persisted_and_assessed() {
        let (service, _) = service(false, 2);
        let store = Arc::new(MemoryStore::new());
        let service = service.with_store(store.clone());

        let report = service.run_review(&request("r1")).await;
        assert!(report.result.is_success());
        let reputation = report.reputation.unwrap();
        assert_eq!(reputation.delta, -10);
        assert_eq!(reputation.score_after, 50);
        assert!(reputation.event.starts_with("PR #42: found 1 critical"));
        assert_eq!(report.concurrency.active_run_ids, vec!["r1"]);
        assert_eq!(service.status().active, 0);

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn store_records_outputs_and_state() {
        let (service, _) = service(false, 2);
        let store = Arc::new(MemoryStore::new());
        let service = service.with_store(store.clone());
        service.run_review(&request("r1")).await;

        let reviews = store.reviews().await;
        assert_eq!(reviews.len(), 1);
        let record = &reviews[0];
        assert_eq!(record.review.review_id, "r1");
        assert_eq!(record.state, ReviewState::Completed);
        assert_eq!(record.findings.len(), 1);
        assert_eq!(record.stage_outputs.len(), 3);
    }

    #[tokio::test]
    async fn store_failures_do_not_change_the_result() {
        let (service, _) = service(false, 2);
        let service = service.with_store(Arc::new(BrokenStore));
        let report = service.run_review(&request("r1")).await;
        assert!(report.result.is_success());
        assert_eq!(report.result.findings.len(), 1);
    }

    #[tokio::test]
    async fn fail_fast_rejects_when_full() {
        let (service, provider) = service(false, 1);
        let service = service.with_admission(Admission::FailFast);
        let _held = service.limiter().try_acquire("other").unwrap();

        let report = service.run_review(&request("r1")).await;
        assert_eq!(
            report.result.error_code(),
            Some(ErrorCode::ConcurrencyExceeded)
        );
        assert_eq!(
            report.result.error.as_ref().and_then(|e| e.retry_after_secs),
            Some(15)
        );
        assert!(report.reputation.is_none());
        assert_eq!(report.concurrency.available, 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_run_id_is_rejected() {
        let (service, _) = service(false, 3);
        let _held = service.limiter().try_acquire("r1").unwrap();
        let report = service.run_review(&request("r1")).await;
        assert_eq!(
            report.result.error_code(),
            Some(ErrorCode::ConcurrencyExceeded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_admission_waits_for_a_slot() {
        let (service, _) = service(false, 1);
        let held = service.limiter().try_acquire("other").unwrap();
        assert!(!service.wait_for_available_slot(None).await);

        let request = request("r1");
        let (report, ()) = tokio::join!(service.run_review(&request), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            held.release();
        });
        assert!(report.result.is_success());
        assert!(service.wait_for_available_slot(None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_discards_partial_output() {
        let (service, _) = service(true, 1);
        let service = service.with_run_timeout(Duration::from_secs(3));
        let report = service.run_review(&request("r1")).await;
        assert_eq!(report.result.error_code(), Some(ErrorCode::RunTimeout));
        assert!(report.result.stage_outputs.is_empty());
        assert_eq!(
            report.result.error.as_ref().and_then(|e| e.retry_after_secs),
            Some(DEFAULT_RETRY_AFTER_SECS)
        );
        assert_eq!(service.status().active, 0);
    }
}
