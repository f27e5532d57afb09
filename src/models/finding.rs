//! Finding types representing normalized review results.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Severity tier of a finding, ordered `praise < minor < medium < critical`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    JsonSchema,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    /// Positive feedback worth keeping.
    Praise,
    /// Cosmetic or low-impact issue.
    Minor,
    /// Issue that should be addressed before merging.
    Medium,
    /// Issue that must be fixed.
    Critical,
}

impl Severity {
    /// Map a free-form severity label onto a tier.
    ///
    /// Stage outputs use whatever vocabulary the model felt like that day
    /// ("high", "error", "严重", ...). Unknown labels land on `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "critical" | "severe" | "blocker" | "fatal" | "error" | "严重" | "高" => {
                Severity::Critical
            }
            "medium" | "high" | "major" | "moderate" | "warning" | "warn" | "中等" | "中" => {
                Severity::Medium
            }
            "minor" | "low" | "info" | "note" | "trivial" | "style" | "suggestion" | "轻度"
            | "低" => Severity::Minor,
            "praise" | "positive" | "good" | "kudos" | "表扬" => Severity::Praise,
            _ => Severity::Medium,
        }
    }

    /// Raise the severity by one tier. Praise is not an issue and never escalates.
    pub fn escalate(self) -> Self {
        match self {
            Severity::Praise => Severity::Praise,
            Severity::Minor => Severity::Medium,
            Severity::Medium | Severity::Critical => Severity::Critical,
        }
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Severity::from_label(&s))
    }
}

/// Finding taxonomy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    JsonSchema,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Category {
    Static,
    Logical,
    Memory,
    Security,
    Performance,
    Maintainability,
    Architecture,
    Praise,
    /// Synthesized when a stage's output matched no known shape.
    UnparsedResult,
    Other,
}

impl Category {
    /// Map a free-form category label (including the long historical names
    /// such as `security_vulnerability`) onto the taxonomy.
    pub fn from_label(label: &str) -> Self {
        let norm = label.trim().to_lowercase().replace(['-', ' '], "_");
        match norm.as_str() {
            "static" | "static_defect" | "static_analysis" | "lint" | "code_style" | "style"
            | "syntax" => Category::Static,
            "logical" | "logic" | "logical_defect" | "logic_error" | "bug" | "error_handling"
            | "algorithm" => Category::Logical,
            "memory" | "memory_issue" | "memory_safety" | "memory_leak" | "resource_leak" => {
                Category::Memory
            }
            "security" | "security_vulnerability" | "vulnerability" | "injection" => {
                Category::Security
            }
            "performance" | "performance_issue" | "perf" | "efficiency" => Category::Performance,
            "maintainability" | "readability" | "documentation" | "testing" | "naming" => {
                Category::Maintainability
            }
            "architecture" | "architectural" | "design" | "api_design" | "data_structure" => {
                Category::Architecture
            }
            "praise" | "positive" => Category::Praise,
            "unparsed_result" => Category::UnparsedResult,
            _ if norm.contains("secur") => Category::Security,
            _ if norm.contains("memory") || norm.contains("leak") => Category::Memory,
            _ if norm.contains("perf") => Category::Performance,
            _ if norm.contains("logic") => Category::Logical,
            _ if norm.contains("architect") => Category::Architecture,
            _ if norm.contains("maintain") => Category::Maintainability,
            _ if norm.contains("static") => Category::Static,
            _ => Category::Other,
        }
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Category::from_label(&s))
    }
}

/// A single normalized issue or praise entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Finding {
    /// File path relative to the repository root.
    pub file: String,
    /// Line number in the new file, when the stage could resolve one.
    #[serde(default)]
    pub line: Option<u32>,
    pub category: Category,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Set when the issue was reported before and is still unfixed.
    #[serde(default)]
    pub historical_repeat: bool,
    /// The stage that produced this finding.
    #[serde(default)]
    pub stage: String,
}

/// Deduplication key: two findings about the same place and concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FindingKey {
    pub file: String,
    pub line: Option<u32>,
    pub category: Category,
}

impl Finding {
    pub fn key(&self) -> FindingKey {
        FindingKey {
            file: self.file.clone(),
            line: self.line,
            category: self.category,
        }
    }
}

/// Per-tier finding counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub medium: usize,
    pub minor: usize,
    pub praise: usize,
}

impl SeverityCounts {
    /// Count findings per severity tier.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = SeverityCounts::default();
        for f in findings {
            match f.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Minor => counts.minor += 1,
                Severity::Praise => counts.praise += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.medium + self.minor + self.praise
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::Medium => self.medium,
            Severity::Minor => self.minor,
            Severity::Praise => self.praise,
        }
    }
}

/// Per-category counts, in first-seen order.
pub type CategoryCounts = IndexMap<Category, usize>;

/// Count findings per category, preserving first-seen order.
pub fn category_counts(findings: &[Finding]) -> CategoryCounts {
    let mut counts = CategoryCounts::new();
    for f in findings {
        *counts.entry(f.category).or_insert(0) += 1;
    }
    counts
}

/// JSON schema of a finding list, handed to stages as the expected output shape.
pub fn findings_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(Vec<Finding>)).unwrap_or(serde_json::Value::Null)
}
