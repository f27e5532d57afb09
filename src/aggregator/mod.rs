//! Result aggregation: turn raw stage outputs into one canonical finding list.
//!
//! Each stage output is normalized on its own ([`normalize_stage`]), then all
//! findings go through historical-repeat escalation, deduplication by
//! `(file, line, category)` and the final ordering.

pub mod dedup;
pub mod shapes;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::UNPARSED_EXCERPT_CHARS;
use crate::models::{Category, Finding, Severity};

use shapes::{Layout, Origin};

/// How cleanly a stage output could be read.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    /// A canonical finding array with every entry well-formed.
    Clean(Vec<Finding>),
    /// Findings recovered with some guessing; the warnings say what.
    Degraded(Vec<Finding>, Vec<String>),
    /// No known shape matched.
    Unparseable(String),
}

impl NormalizeOutcome {
    /// Findings and warnings, with unparseable output replaced by one
    /// `unparsed_result` finding.
    pub fn into_parts(self, stage: &str) -> (Vec<Finding>, Vec<String>) {
        match self {
            NormalizeOutcome::Clean(findings) => (findings, Vec::new()),
            NormalizeOutcome::Degraded(findings, warnings) => (findings, warnings),
            NormalizeOutcome::Unparseable(raw) => (
                vec![unparsed_finding(stage, &raw)],
                vec![format!("output of stage '{stage}' could not be parsed")],
            ),
        }
    }
}

/// Normalize one stage's raw output.
pub fn normalize_stage(stage: &str, text: &str) -> NormalizeOutcome {
    if text.trim().is_empty() {
        return NormalizeOutcome::Degraded(Vec::new(), vec!["stage produced no output".into()]);
    }

    for (origin, candidate) in shapes::extract_json_candidates(text) {
        let Ok(value) = serde_json::from_str::<Value>(candidate.trim()) else {
            continue;
        };
        let Some((layout, entries)) = shapes::find_entries(&value) else {
            if shapes::has_history_fields(&value) {
                // dispatcher-style payload: flags only, no findings
                return NormalizeOutcome::Clean(Vec::new());
            }
            continue;
        };

        let mut warnings = Vec::new();
        if origin == Origin::Extracted {
            warnings.push("findings extracted from surrounding text".to_string());
        }
        if !layout.is_canonical() {
            warnings.push(match &layout {
                Layout::KeyedMap => "findings given as an index-keyed object".to_string(),
                Layout::Nested(path) => format!("findings nested under '{path}'"),
                _ => "single finding object".to_string(),
            });
        }

        let mut findings = Vec::with_capacity(entries.len());
        for entry in &entries {
            match shapes::finding_from_value(stage, entry) {
                Ok((finding, entry_warnings)) => {
                    findings.push(finding);
                    warnings.extend(entry_warnings);
                }
                Err(reason) => warnings.push(reason),
            }
        }
        if findings.is_empty() && !entries.is_empty() {
            tracing::debug!(stage, rejected = entries.len(), ?warnings, "no usable finding entries");
            return NormalizeOutcome::Unparseable(text.to_string());
        }

        return if warnings.is_empty() {
            NormalizeOutcome::Clean(findings)
        } else {
            NormalizeOutcome::Degraded(findings, warnings)
        };
    }

    NormalizeOutcome::Unparseable(text.to_string())
}

/// The fallback finding for output that matched no known shape.
pub fn unparsed_finding(stage: &str, raw: &str) -> Finding {
    let excerpt = shapes::excerpt(raw.trim(), UNPARSED_EXCERPT_CHARS);
    Finding {
        file: String::new(),
        line: None,
        category: Category::UnparsedResult,
        severity: Severity::Medium,
        description: format!("Unparsed output from stage '{stage}': {excerpt}"),
        suggestion: None,
        historical_repeat: false,
        stage: stage.to_string(),
    }
}

/// A location previously reported and still unfixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFlag {
    pub file: String,
    #[serde(default)]
    pub line: Option<u32>,
    /// `None` matches any category at that location.
    #[serde(default)]
    pub category: Option<Category>,
}

impl HistoryFlag {
    pub fn matches(&self, finding: &Finding) -> bool {
        self.file == finding.file
            && self.line.is_none_or(|l| finding.line == Some(l))
            && self.category.is_none_or(|c| c == finding.category)
    }
}

/// Pull history flags out of a stage output, if it carries any.
pub fn extract_history_flags(text: &str) -> Vec<HistoryFlag> {
    for (_, candidate) in shapes::extract_json_candidates(text) {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate.trim()) else {
            continue;
        };
        let items: Vec<&Value> = shapes::HISTORY_FIELDS
            .iter()
            .filter_map(|f| map.get(*f))
            .filter_map(Value::as_array)
            .flatten()
            .collect();
        if items.is_empty() {
            continue;
        }
        return items.into_iter().filter_map(history_flag_from_value).collect();
    }
    Vec::new()
}

fn history_flag_from_value(value: &Value) -> Option<HistoryFlag> {
    let map = value.as_object()?;
    let file = ["file", "file_path", "path"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))?
        .trim()
        .to_string();
    if file.is_empty() {
        return None;
    }
    let line = ["line", "line_number"]
        .iter()
        .find_map(|k| map.get(*k))
        .and_then(shapes::parse_line);
    let category = ["category", "type"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .map(Category::from_label);
    Some(HistoryFlag {
        file,
        line,
        category,
    })
}

/// Aggregated findings plus everything that had to be guessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateReport {
    pub findings: Vec<Finding>,
    pub warnings: Vec<String>,
    /// Number of findings raised one tier as historical repeats.
    pub escalated: usize,
    /// Number of findings dropped as duplicates.
    pub merged: usize,
}

/// Aggregates stage outputs. History flags can be supplied up front and are
/// also read from any stage output that carries them.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    history: Vec<HistoryFlag>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, flags: impl IntoIterator<Item = HistoryFlag>) -> Self {
        self.history.extend(flags);
        self
    }

    pub fn report(&self, outputs: &IndexMap<String, String>) -> AggregateReport {
        let mut history = self.history.clone();
        let mut findings = Vec::new();
        let mut warnings = Vec::new();

        for (stage, text) in outputs {
            history.extend(extract_history_flags(text));
            let (stage_findings, stage_warnings) = normalize_stage(stage, text).into_parts(stage);
            findings.extend(stage_findings);
            warnings.extend(stage_warnings.into_iter().map(|w| format!("{stage}: {w}")));
        }

        let mut escalated = 0;
        for finding in &mut findings {
            if finding.historical_repeat || finding.severity == Severity::Praise {
                continue;
            }
            if history.iter().any(|flag| flag.matches(finding)) {
                finding.severity = finding.severity.escalate();
                finding.historical_repeat = true;
                escalated += 1;
            }
        }

        let before = findings.len();
        let mut findings = dedup::deduplicate(findings);
        let merged = before - findings.len();
        dedup::sort_findings(&mut findings);

        tracing::debug!(
            stages = outputs.len(),
            findings = findings.len(),
            escalated,
            merged,
            warnings = warnings.len(),
            "aggregated stage outputs"
        );

        AggregateReport {
            findings,
            warnings,
            escalated,
            merged,
        }
    }
}

/// Normalize stage outputs into the canonical finding list.
pub fn normalize(outputs: &IndexMap<String, String>) -> Vec<Finding> {
    Aggregator::new().report(outputs).findings
}

/// Like [`normalize`], keeping the warnings.
pub fn report(outputs: &IndexMap<String, String>) -> AggregateReport {
    Aggregator::new().report(outputs)
}
