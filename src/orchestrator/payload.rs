//! Task payload construction.
//!
//! Every stage receives the same JSON document describing the change. Stage
//! instructions travel separately, so nothing here depends on which stage is
//! running.

use indexmap::IndexMap;
use serde::Serialize;

use crate::constants::README_EXCERPT_CHARS;
use crate::models::finding::findings_schema;
use crate::models::{Category, PrComment, ReviewRequest};
use crate::tools::ToolDescriptor;

use super::history::{HistoricalIssue, analyze_comments};

/// Bucket a reputation score: high at 80 and up, medium at 60 and up.
pub fn reputation_label(score: i64) -> &'static str {
    match score {
        s if s >= 80 => "high",
        s if s >= 60 => "medium",
        _ => "low",
    }
}

#[derive(Debug, Serialize)]
pub struct TaskPayload<'a> {
    pub metadata: Metadata<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequestInfo<'a>>,
    pub repository_readme_excerpt: String,
    pub pr_comments: &'a [PrComment],
    pub code_diff: &'a str,
    pub output_schema: serde_json::Value,
    #[serde(skip_serializing_if = "<[ToolDescriptor]>::is_empty")]
    pub tools: &'a [ToolDescriptor],
}

#[derive(Debug, Serialize)]
pub struct Metadata<'a> {
    pub developer_reputation_label: &'static str,
    pub developer_reputation_history: &'a [String],
    pub historical_issues_analysis: IndexMap<Category, HistoricalIssue>,
}

#[derive(Debug, Serialize)]
pub struct PullRequestInfo<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    pub author: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<&'a str>,
}

impl<'a> TaskPayload<'a> {
    pub fn new(request: &'a ReviewRequest, tools: &'a [ToolDescriptor]) -> Self {
        let repository = match (request.owner(), request.repo()) {
            (Some(owner), Some(repo)) => Some(format!("{owner}/{repo}")),
            _ => None,
        };
        let pull_request = (request.pr_number().is_some() || request.title().is_some()).then(|| {
            PullRequestInfo {
                number: request.pr_number(),
                repository,
                author: request.author(),
                title: request.title(),
                body: request.body(),
            }
        });

        Self {
            metadata: Metadata {
                developer_reputation_label: reputation_label(request.reputation_score()),
                developer_reputation_history: request.reputation_history(),
                historical_issues_analysis: analyze_comments(request.comments()),
            },
            pull_request,
            repository_readme_excerpt: request
                .repository_description()
                .chars()
                .take(README_EXCERPT_CHARS)
                .collect(),
            pr_comments: request.comments(),
            code_diff: request.diff(),
            output_schema: findings_schema(),
            tools,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Serialize the task payload for `request`.
pub fn build_task_payload(request: &ReviewRequest, tools: &[ToolDescriptor]) -> String {
    TaskPayload::new(request, tools).to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn reputation_labels() {
        assert_eq!(reputation_label(95), "high");
        assert_eq!(reputation_label(80), "high");
        assert_eq!(reputation_label(79), "medium");
        assert_eq!(reputation_label(60), "medium");
        assert_eq!(reputation_label(59), "low");
        assert_eq!(reputation_label(-4), "low");
    }

    #[test]
    fn payload_fields() {
        let request = ReviewRequest::builder("@@ -1 +1 @@\n+x = 1\n")
            .author("sam")
            .pr_number(7)
            .repository("acme", "widgets")
            .reputation(85, vec!["PR #3: no issues or praise; score unchanged".into()])
            .comment(PrComment::new("memory leak"))
            .comment(PrComment::new("another leak"))
            .repository_description("r".repeat(5000))
            .build();

        let json: Value = serde_json::from_str(&build_task_payload(&request, &[])).unwrap();
        assert_eq!(json["metadata"]["developer_reputation_label"], "high");
        assert_eq!(json["metadata"]["developer_reputation_history"].as_array().unwrap().len(), 1);
        assert_eq!(json["metadata"]["historical_issues_analysis"]["memory"]["count"], 2);
        assert_eq!(
            json["repository_readme_excerpt"].as_str().unwrap().len(),
            README_EXCERPT_CHARS
        );
        assert_eq!(json["pr_comments"].as_array().unwrap().len(), 2);
        assert_eq!(json["code_diff"], "@@ -1 +1 @@\n+x = 1\n");
        assert_eq!(json["pull_request"]["repository"], "acme/widgets");
        assert!(json["output_schema"].is_object());
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn bare_request_omits_pull_request() {
        let request = ReviewRequest::builder("diff").build();
        let json: Value = serde_json::from_str(&build_task_payload(&request, &[])).unwrap();
        assert!(json.get("pull_request").is_none());
        assert_eq!(json["metadata"]["developer_reputation_label"], "medium");
    }
}
