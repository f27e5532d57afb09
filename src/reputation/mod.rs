//! Reputation delta calculation.
//!
//! A report's severity counts are weighted into a score change, and a short
//! event line describing the change is appended to the submitter's history.
//! The pipeline never touches a [`ReputationRecord`]; callers apply the
//! assessment themselves.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_REPUTATION_SCORE;
use crate::models::finding::category_counts;
use crate::models::{Category, CategoryCounts, Finding, Severity, SeverityCounts};

/// Per-tier weights plus a flat adjustment applied to every review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTable {
    pub critical: i64,
    pub medium: i64,
    pub minor: i64,
    pub praise: i64,
    pub baseline: i64,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            critical: -10,
            medium: -5,
            minor: -2,
            praise: 3,
            baseline: 0,
        }
    }
}

impl WeightTable {
    pub fn weight(&self, severity: Severity) -> i64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Medium => self.medium,
            Severity::Minor => self.minor,
            Severity::Praise => self.praise,
        }
    }
}

/// Bounds applied to the running score. Both ends unset means unclamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClampPolicy {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl ClampPolicy {
    pub fn new(min: Option<i64>, max: Option<i64>) -> Self {
        Self { min, max }
    }

    pub fn unclamped() -> Self {
        Self::default()
    }

    pub fn apply(&self, score: i64) -> i64 {
        let score = self.min.map_or(score, |min| score.max(min));
        self.max.map_or(score, |max| score.min(max))
    }
}

/// A submitter's running score and its append-only event history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub score: i64,
    #[serde(default)]
    pub history: Vec<String>,
}

impl ReputationRecord {
    pub fn new(score: i64, history: Vec<String>) -> Self {
        Self { score, history }
    }
}

impl Default for ReputationRecord {
    fn default() -> Self {
        Self::new(DEFAULT_REPUTATION_SCORE, Vec::new())
    }
}

/// The reputation outcome of one review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReputationAssessment {
    pub counts: SeverityCounts,
    pub categories: CategoryCounts,
    pub delta: i64,
    pub event: String,
    pub score_before: i64,
    pub score_after: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReputationCalculator {
    weights: WeightTable,
    clamp: ClampPolicy,
}

impl ReputationCalculator {
    pub fn new(weights: WeightTable, clamp: ClampPolicy) -> Self {
        Self { weights, clamp }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// `Σ weight × count + baseline`.
    pub fn compute_delta(&self, counts: &SeverityCounts) -> i64 {
        let weighted: i64 = [
            Severity::Critical,
            Severity::Medium,
            Severity::Minor,
            Severity::Praise,
        ]
        .into_iter()
        .map(|s| self.weights.weight(s) * counts.get(s) as i64)
        .sum();
        weighted + self.weights.baseline
    }

    /// One-line event text, e.g.
    /// `"PR #42: found 1 critical, 2 minor, mainly security; score decreased by 14"`.
    pub fn describe(
        &self,
        counts: &SeverityCounts,
        categories: &CategoryCounts,
        delta: i64,
        context_id: &str,
    ) -> String {
        let summary = if counts.total() == 0 {
            "no issues or praise".to_string()
        } else {
            let tiers: Vec<String> = [
                Severity::Critical,
                Severity::Medium,
                Severity::Minor,
                Severity::Praise,
            ]
            .into_iter()
            .filter(|s| counts.get(*s) > 0)
            .map(|s| format!("{} {s}", counts.get(s)))
            .collect();
            let mut summary = format!("found {}", tiers.join(", "));
            if let Some(category) = dominant_category(categories) {
                summary.push_str(&format!(", mainly {category}"));
            }
            summary
        };

        let change = match delta {
            0 => "score unchanged".to_string(),
            d if d > 0 => format!("score increased by {d}"),
            d => format!("score decreased by {}", d.unsigned_abs()),
        };
        format!("{context_id}: {summary}; {change}")
    }

    /// Weigh a finding list against the submitter's current score.
    pub fn assess(
        &self,
        findings: &[Finding],
        context_id: &str,
        score_before: i64,
    ) -> ReputationAssessment {
        let counts = SeverityCounts::from_findings(findings);
        let categories = category_counts(findings);
        let delta = self.compute_delta(&counts);
        let event = self.describe(&counts, &categories, delta, context_id);
        let score_after = self.clamp.apply(score_before.saturating_add(delta));
        tracing::debug!(delta, score_before, score_after, "assessed reputation");
        ReputationAssessment {
            counts,
            categories,
            delta,
            event,
            score_before,
            score_after,
        }
    }

    /// Apply an assessment to a record: adjust the score and append the event.
    pub fn apply(&self, record: &mut ReputationRecord, assessment: &ReputationAssessment) -> i64 {
        record.score = self.clamp.apply(record.score.saturating_add(assessment.delta));
        record.history.push(assessment.event.clone());
        record.score
    }
}

/// Most frequent category; the first seen wins a tie.
fn dominant_category(categories: &CategoryCounts) -> Option<Category> {
    let mut best: Option<(Category, usize)> = None;
    for (category, count) in categories {
        if *count > 0 && best.is_none_or(|(_, n)| *count > n) {
            best = Some((*category, *count));
        }
    }
    best.map(|(c, _)| c)
}
