//! Review persistence capability.
//!
//! The service writes reviews through a [`ReviewStore`] on a best-effort
//! basis. [`MemoryStore`] keeps everything in process and backs the CLI and
//! the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{Finding, ReviewRequest, RunError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("review {0} not found")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persisted lifecycle of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReviewState {
    Running,
    Completed,
    Failed,
}

/// Fields recorded when a review starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub review_id: String,
    pub author: String,
    pub pr_number: Option<u64>,
    pub repository: Option<String>,
}

impl NewReview {
    pub fn from_request(request: &ReviewRequest) -> Self {
        let repository = match (request.owner(), request.repo()) {
            (Some(owner), Some(repo)) => Some(format!("{owner}/{repo}")),
            _ => None,
        };
        Self {
            review_id: request.review_id().to_string(),
            author: request.author().to_string(),
            pr_number: request.pr_number(),
            repository,
        }
    }
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewUpdate {
    pub state: Option<ReviewState>,
    pub findings: Option<Vec<Finding>>,
    pub error: Option<RunError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub review: NewReview,
    pub state: ReviewState,
    pub stage_outputs: IndexMap<String, String>,
    pub findings: Vec<Finding>,
    pub error: Option<RunError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Record a new review and return its store id.
    async fn create_review(&self, review: NewReview) -> Result<String, StoreError>;

    async fn update_review(&self, id: &str, update: ReviewUpdate) -> Result<(), StoreError>;

    async fn append_stage_output(
        &self,
        id: &str,
        stage: &str,
        output: &str,
    ) -> Result<(), StoreError>;

    async fn get_review(&self, id: &str) -> Result<Option<ReviewRecord>, StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    reviews: RwLock<HashMap<String, ReviewRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reviews.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reviews.read().await.is_empty()
    }

    /// Every stored review, oldest first.
    pub async fn reviews(&self) -> Vec<ReviewRecord> {
        let mut all: Vec<ReviewRecord> = self.reviews.read().await.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        all
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn create_review(&self, review: NewReview) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let record = ReviewRecord {
            id: id.clone(),
            review,
            state: ReviewState::Running,
            stage_outputs: IndexMap::new(),
            findings: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.reviews.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn update_review(&self, id: &str, update: ReviewUpdate) -> Result<(), StoreError> {
        let mut reviews = self.reviews.write().await;
        let record = reviews
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(state) = update.state {
            record.state = state;
        }
        if let Some(findings) = update.findings {
            record.findings = findings;
        }
        if update.error.is_some() {
            record.error = update.error;
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn append_stage_output(
        &self,
        id: &str,
        stage: &str,
        output: &str,
    ) -> Result<(), StoreError> {
        let mut reviews = self.reviews.write().await;
        let record = reviews
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record
            .stage_outputs
            .entry(stage.to_string())
            .or_default()
            .push_str(output);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get_review(&self, id: &str) -> Result<Option<ReviewRecord>, StoreError> {
        Ok(self.reviews.read().await.get(id).cloned())
    }
}
