//! Shape sniffing for stage payloads.
//!
//! Stages have returned findings as a plain array, as an object keyed by
//! `"0"`, `"1"`, ..., and nested under assorted field names. This module
//! turns any of those into field-level findings and reports what it had to
//! guess along the way.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::{Category, Finding, Severity};

/// Field names findings have been nested under, in lookup order.
pub const NESTED_FIELDS: &[&str] = &[
    "findings", "issues", "results", "bugs", "items", "content", "data",
];

/// Field names that carry historical-repeat flags.
pub const HISTORY_FIELDS: &[&str] = &["historical_repeats", "repeated_issues", "historical_issues"];

const MAX_NESTING: usize = 3;

/// Content inside markdown code fences. The closing fence must start a line
/// so backticks inside JSON string values don't end the match.
static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n```").expect("valid fence regex"));

/// Where in the text the JSON was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Raw,
    Extracted,
}

/// Candidate JSON strings, most literal first: the raw text, then fenced
/// blocks, then the outermost `[...]` and `{...}` slices.
pub fn extract_json_candidates(text: &str) -> Vec<(Origin, String)> {
    let mut candidates = vec![(Origin::Raw, text.to_string())];
    let mut push = |s: &str| {
        let s = s.trim();
        if !s.is_empty() && !candidates.iter().any(|(_, c)| c == s) {
            candidates.push((Origin::Extracted, s.to_string()));
        }
    };

    for cap in FENCE_RE.captures_iter(text) {
        if let Some(inner) = cap.get(1) {
            push(inner.as_str());
        }
    }
    for (open, close) in [('[', ']'), ('{', '}')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close))
            && start < end
        {
            push(&text[start..=end]);
        }
    }
    candidates
}

/// How the finding entries were located inside a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// A top-level array.
    Array,
    /// `{"findings": [...]}`.
    Wrapped,
    /// An object keyed by sequential numeric strings.
    KeyedMap,
    /// Nested under a field other than `findings`, possibly several levels deep.
    Nested(String),
    /// A single finding object on its own.
    Single,
}

impl Layout {
    pub fn is_canonical(&self) -> bool {
        matches!(self, Layout::Array | Layout::Wrapped)
    }
}

/// Locate the list of finding entries inside `value`.
pub fn find_entries(value: &Value) -> Option<(Layout, Vec<Value>)> {
    find_entries_at(value, 0)
}

fn find_entries_at(value: &Value, depth: usize) -> Option<(Layout, Vec<Value>)> {
    match value {
        Value::Array(items) => Some((Layout::Array, items.clone())),
        Value::Object(map) => {
            if let Some(items) = keyed_map_entries(map) {
                return Some((Layout::KeyedMap, items));
            }
            if depth < MAX_NESTING {
                for field in NESTED_FIELDS {
                    let Some(inner) = map.get(*field) else {
                        continue;
                    };
                    let inner = match inner {
                        // "content" is often a JSON document serialized into a string
                        Value::String(s) => match serde_json::from_str::<Value>(s) {
                            Ok(v) => v,
                            Err(_) => continue,
                        },
                        other => other.clone(),
                    };
                    if let Some((layout, items)) = find_entries_at(&inner, depth + 1) {
                        let layout = match (layout, *field, depth) {
                            (Layout::Array, "findings", 0) => Layout::Wrapped,
                            (Layout::Nested(path), _, _) => Layout::Nested(format!("{field}.{path}")),
                            _ => Layout::Nested(field.to_string()),
                        };
                        return Some((layout, items));
                    }
                }
            }
            looks_like_finding(map).then(|| (Layout::Single, vec![value.clone()]))
        }
        _ => None,
    }
}

/// `{"0": {...}, "1": {...}}` ordered by index. Every key must be numeric.
fn keyed_map_entries(map: &Map<String, Value>) -> Option<Vec<Value>> {
    if map.is_empty() {
        return None;
    }
    let mut indexed: Vec<(u64, &Value)> = Vec::with_capacity(map.len());
    for (key, value) in map {
        let idx = key.trim().parse::<u64>().ok()?;
        if !value.is_object() {
            return None;
        }
        indexed.push((idx, value));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Some(indexed.into_iter().map(|(_, v)| v.clone()).collect())
}

fn looks_like_finding(map: &Map<String, Value>) -> bool {
    first_str(map, DESCRIPTION_KEYS).is_some()
        && (first_str(map, FILE_KEYS).is_some() || first_str(map, SEVERITY_KEYS).is_some())
}

/// Whether `value` is an object carrying history flags.
pub fn has_history_fields(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| HISTORY_FIELDS.iter().any(|f| m.contains_key(*f)))
}

const FILE_KEYS: &[&str] = &["file", "file_path", "filePath", "path", "filename"];
const LINE_KEYS: &[&str] = &["line", "line_number", "lineNumber", "start_line"];
const CATEGORY_KEYS: &[&str] = &["category", "bug_type", "type", "defect_type", "issue_type"];
const DESCRIPTION_KEYS: &[&str] = &["description", "message", "issue", "title", "problem"];
const SUGGESTION_KEYS: &[&str] = &["suggestion", "fix", "recommendation", "solution"];
const SEVERITY_KEYS: &[&str] = &["severity", "level", "priority"];
const HISTORY_FLAG_KEYS: &[&str] = &["historical_repeat", "historicalRepeat", "is_historical"];

fn first_value<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k)).filter(|v| !v.is_null())
}

fn first_str<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse a line reference: `12`, `"12"`, `"12-15"`, `"L12"`. Zero means unknown.
pub fn parse_line(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => {
            let digits: String = s
                .trim()
                .trim_start_matches(['L', 'l'])
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }?;
    u32::try_from(n).ok().filter(|n| *n > 0)
}

/// Build a finding from one entry. `Err` means the entry was unusable.
pub fn finding_from_value(stage: &str, value: &Value) -> Result<(Finding, Vec<String>), String> {
    let map = match value {
        Value::Object(map) => map,
        Value::String(s) if !s.trim().is_empty() => {
            let finding = Finding {
                file: String::new(),
                line: None,
                category: Category::Other,
                severity: Severity::Medium,
                description: s.trim().to_string(),
                suggestion: None,
                historical_repeat: false,
                stage: stage.to_string(),
            };
            return Ok((finding, vec!["plain-text entry kept without location".into()]));
        }
        other => return Err(format!("skipped non-object entry: {other}")),
    };

    let mut warnings = Vec::new();
    let Some(description) = first_str(map, DESCRIPTION_KEYS) else {
        return Err("skipped entry without a description".into());
    };

    let file = first_str(map, FILE_KEYS).unwrap_or_default().to_string();
    if file.is_empty() {
        warnings.push(format!("entry '{}' has no file", excerpt(description, 40)));
    }

    let line = first_value(map, LINE_KEYS).and_then(parse_line);

    let severity_label = first_str(map, SEVERITY_KEYS);
    let category_label = first_str(map, CATEGORY_KEYS);
    let severity = severity_label.map(Severity::from_label);
    let category = category_label.map(Category::from_label);
    let (category, severity) = match (category, severity) {
        (Some(c), Some(s)) => (c, s),
        (Some(Category::Praise), None) => (Category::Praise, Severity::Praise),
        (Some(c), None) => {
            warnings.push(format!("entry '{}' has no severity", excerpt(description, 40)));
            (c, Severity::Medium)
        }
        (None, Some(Severity::Praise)) => (Category::Praise, Severity::Praise),
        (None, Some(s)) => (Category::Other, s),
        (None, None) => {
            warnings.push(format!(
                "entry '{}' has no category or severity",
                excerpt(description, 40)
            ));
            (Category::Other, Severity::Medium)
        }
    };

    let suggestion = first_str(map, SUGGESTION_KEYS).map(str::to_string);
    let historical_repeat = first_value(map, HISTORY_FLAG_KEYS)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let stage = map
        .get("stage")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(stage)
        .to_string();

    Ok((
        Finding {
            file,
            line,
            category,
            severity,
            description: description.to_string(),
            suggestion,
            historical_repeat,
            stage,
        },
        warnings,
    ))
}

/// First `max` characters of `text`.
pub fn excerpt(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidates_include_fenced_and_bracketed() {
        let text = "Here you go:\n```json\n[{\"a\": 1}]\n```\nThanks";
        let c = extract_json_candidates(text);
        assert_eq!(c[0].0, Origin::Raw);
        assert_eq!(c[1], (Origin::Extracted, "[{\"a\": 1}]".to_string()));
        // the bracket slice equals the fenced block and is not repeated
        assert_eq!(c.iter().filter(|(_, s)| s == "[{\"a\": 1}]").count(), 1);
    }

    #[test]
    fn array_layout() {
        let (layout, items) = find_entries(&json!([{"description": "x"}])).unwrap();
        assert_eq!(layout, Layout::Array);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn keyed_map_is_ordered_numerically() {
        let v = json!({"10": {"description": "ten"}, "2": {"description": "two"}, "0": {"description": "zero"}});
        let (layout, items) = find_entries(&v).unwrap();
        assert_eq!(layout, Layout::KeyedMap);
        let order: Vec<_> = items.iter().map(|i| i["description"].as_str().unwrap()).collect();
        assert_eq!(order, vec!["zero", "two", "ten"]);
    }

    #[test]
    fn wrapped_and_nested_layouts() {
        let (layout, _) = find_entries(&json!({"findings": []})).unwrap();
        assert_eq!(layout, Layout::Wrapped);

        let (layout, items) = find_entries(&json!({"issues": [{"description": "x"}]})).unwrap();
        assert_eq!(layout, Layout::Nested("issues".into()));
        assert_eq!(items.len(), 1);

        let v = json!({"data": {"results": {"0": {"description": "deep"}}}});
        let (layout, items) = find_entries(&v).unwrap();
        assert_eq!(layout, Layout::Nested("data.results".into()));
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn nested_json_string_is_parsed() {
        let v = json!({"content": "[{\"description\": \"inner\"}]"});
        let (layout, items) = find_entries(&v).unwrap();
        assert_eq!(layout, Layout::Nested("content".into()));
        assert_eq!(items[0]["description"], "inner");
    }

    #[test]
    fn single_finding_object() {
        let v = json!({"file": "a.rs", "description": "lonely"});
        let (layout, items) = find_entries(&v).unwrap();
        assert_eq!(layout, Layout::Single);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn unrelated_object_has_no_entries() {
        assert!(find_entries(&json!({"summary": "fine"})).is_none());
        assert!(find_entries(&json!("text")).is_none());
    }

    #[test]
    fn field_aliases() {
        let v = json!({
            "file_path": "src/db.py",
            "line_number": "42",
            "bug_type": "security_vulnerability",
            "message": "SQL built by concatenation",
            "fix": "use parameters",
            "level": "high"
        });
        let (f, warnings) = finding_from_value("security", &v).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(f.file, "src/db.py");
        assert_eq!(f.line, Some(42));
        assert_eq!(f.category, Category::Security);
        assert_eq!(f.severity, Severity::Medium);
        assert_eq!(f.suggestion.as_deref(), Some("use parameters"));
        assert_eq!(f.stage, "security");
    }

    #[test]
    fn praise_defaults() {
        let (f, _) = finding_from_value("s", &json!({"file": "a", "category": "praise", "description": "nice"})).unwrap();
        assert_eq!(f.severity, Severity::Praise);
        let (f, _) = finding_from_value("s", &json!({"file": "a", "severity": "praise", "description": "nice"})).unwrap();
        assert_eq!(f.category, Category::Praise);
    }

    #[test]
    fn missing_severity_warns_and_defaults() {
        let (f, warnings) =
            finding_from_value("s", &json!({"file": "a", "category": "logic", "description": "x"})).unwrap();
        assert_eq!(f.severity, Severity::Medium);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn entries_without_description_are_rejected() {
        assert!(finding_from_value("s", &json!({"file": "a"})).is_err());
        assert!(finding_from_value("s", &json!(3)).is_err());
    }

    #[test]
    fn line_parsing() {
        assert_eq!(parse_line(&json!(7)), Some(7));
        assert_eq!(parse_line(&json!("12-15")), Some(12));
        assert_eq!(parse_line(&json!("L9")), Some(9));
        assert_eq!(parse_line(&json!(0)), None);
        assert_eq!(parse_line(&json!(-3)), None);
        assert_eq!(parse_line(&json!("n/a")), None);
    }
}
