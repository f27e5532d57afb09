//! Pipeline run results.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::Display;

use super::finding::Finding;

/// Lifecycle of a stage buffer. Transitions out of `InProgress` happen once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StageStatus {
    InProgress,
    Completed,
    Final,
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Machine-readable reason for an errored run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    OrchestratorUnavailable,
    ConcurrencyExceeded,
    InferenceFailure,
    InferenceTimeout,
    MessageLimitExceeded,
    RunTimeout,
    /// Selection ended or stalled before the aggregator spoke.
    IncompleteRun,
}

/// Error attached to a run with `status = error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub code: ErrorCode,
    pub message: String,
    /// Suggested wait before retrying, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl RunError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after_secs: None,
        }
    }
}

/// Collection statistics for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStat {
    pub status: StageStatus,
    pub chunks: usize,
    pub processing_time_ms: i64,
}

/// The outcome of one pipeline run. Read-only once handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub review_id: String,
    pub status: RunStatus,
    /// Raw text per stage, in arrival order.
    pub stage_outputs: IndexMap<String, String>,
    pub findings: Vec<Finding>,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    #[serde(default)]
    pub stage_stats: IndexMap<String, StageStat>,
    /// Normalization warnings from degraded stage outputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PipelineResult {
    /// An errored result with no stage output.
    pub fn failed(
        review_id: impl Into<String>,
        author: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            review_id: review_id.into(),
            status: RunStatus::Error,
            stage_outputs: IndexMap::new(),
            findings: Vec::new(),
            author: author.into(),
            timestamp: Utc::now(),
            error: Some(RunError::new(code, message)),
            stage_stats: IndexMap::new(),
            warnings: Vec::new(),
        }
    }

    /// Attach a retry hint to the error, if any.
    pub fn with_retry_after(mut self, secs: u64) -> Self {
        if let Some(err) = self.error.as_mut() {
            err.retry_after_secs = Some(secs);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}
