//! The review request handed to one pipeline run.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A prior comment on the pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrComment {
    #[serde(alias = "content", alias = "text")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl PrComment {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            path: None,
            line: None,
            created_at: None,
        }
    }
}

/// Errors decoding request fields.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid base64 in {field}: {source}")]
    Base64 {
        field: &'static str,
        source: base64::DecodeError,
    },

    #[error("{field} is not valid UTF-8 after base64 decoding")]
    Utf8 { field: &'static str },
}

/// Decode a base64-encoded text field (callers sometimes ship the diff that way).
pub fn decode_base64_field(field: &'static str, value: &str) -> Result<String, RequestError> {
    let compact: String = value.split_whitespace().collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|source| RequestError::Base64 { field, source })?;
    String::from_utf8(bytes).map_err(|_| RequestError::Utf8 { field })
}

/// Everything a pipeline run needs. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRequest {
    review_id: String,
    pr_number: Option<u64>,
    owner: Option<String>,
    repo: Option<String>,
    author: String,
    title: Option<String>,
    body: Option<String>,
    diff: String,
    comments: Vec<PrComment>,
    reputation_score: i64,
    reputation_history: Vec<String>,
    repository_description: String,
}

impl ReviewRequest {
    /// Start building a request for the given diff.
    pub fn builder(diff: impl Into<String>) -> ReviewRequestBuilder {
        ReviewRequestBuilder::new(diff)
    }

    pub fn review_id(&self) -> &str {
        &self.review_id
    }

    pub fn pr_number(&self) -> Option<u64> {
        self.pr_number
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn diff(&self) -> &str {
        &self.diff
    }

    pub fn comments(&self) -> &[PrComment] {
        &self.comments
    }

    pub fn reputation_score(&self) -> i64 {
        self.reputation_score
    }

    pub fn reputation_history(&self) -> &[String] {
        &self.reputation_history
    }

    pub fn repository_description(&self) -> &str {
        &self.repository_description
    }

    /// Human-readable reference used in event strings ("PR #42", or the review id).
    pub fn context_id(&self) -> String {
        match self.pr_number {
            Some(n) => format!("PR #{n}"),
            None => format!("review {}", self.review_id),
        }
    }
}

/// Builder for [`ReviewRequest`].
#[derive(Debug, Clone)]
pub struct ReviewRequestBuilder {
    inner: ReviewRequest,
}

impl ReviewRequestBuilder {
    fn new(diff: impl Into<String>) -> Self {
        Self {
            inner: ReviewRequest {
                review_id: String::new(),
                pr_number: None,
                owner: None,
                repo: None,
                author: String::new(),
                title: None,
                body: None,
                diff: diff.into(),
                comments: Vec::new(),
                reputation_score: crate::constants::DEFAULT_REPUTATION_SCORE,
                reputation_history: Vec::new(),
                repository_description: String::new(),
            },
        }
    }

    pub fn review_id(mut self, id: impl Into<String>) -> Self {
        self.inner.review_id = id.into();
        self
    }

    pub fn pr_number(mut self, n: u64) -> Self {
        self.inner.pr_number = Some(n);
        self
    }

    pub fn repository(mut self, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        self.inner.owner = Some(owner.into());
        self.inner.repo = Some(repo.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.inner.author = author.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.inner.title = Some(title.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.inner.body = Some(body.into());
        self
    }

    pub fn comments(mut self, comments: Vec<PrComment>) -> Self {
        self.inner.comments = comments;
        self
    }

    pub fn comment(mut self, comment: PrComment) -> Self {
        self.inner.comments.push(comment);
        self
    }

    pub fn reputation(mut self, score: i64, history: Vec<String>) -> Self {
        self.inner.reputation_score = score;
        self.inner.reputation_history = history;
        self
    }

    pub fn repository_description(mut self, text: impl Into<String>) -> Self {
        self.inner.repository_description = text.into();
        self
    }

    /// Finish the request. A missing review id gets a fresh UUID.
    pub fn build(mut self) -> ReviewRequest {
        if self.inner.review_id.is_empty() {
            self.inner.review_id = uuid::Uuid::new_v4().to_string();
        }
        self.inner
    }
}
