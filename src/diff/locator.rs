//! Resolve free-text snippets to file/line coordinates inside a diff.

use crate::constants::DEFAULT_FUZZY_THRESHOLD;
use crate::models::diff::{DiffHunk, DiffLine, DiffLineType, LineMatch, LocateResult};

use super::parser::parse_diff;
use super::similarity::similarity;

/// A parsed diff ready for repeated lookups.
#[derive(Debug, Clone)]
pub struct LineLocator {
    hunks: Vec<DiffHunk>,
    fuzzy_threshold: f64,
}

impl LineLocator {
    pub fn new(diff: &str) -> Self {
        Self {
            hunks: parse_diff(diff),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    pub fn hunks(&self) -> &[DiffHunk] {
        &self.hunks
    }

    /// Find the line a single-line snippet refers to.
    ///
    /// Tries exact matches on added lines, then context lines, then fuzzy
    /// matches in the same order. Multi-line or blank targets never match.
    pub fn locate(&self, target: &str) -> LocateResult {
        let Some(target) = clean_target(target) else {
            return LocateResult::not_found();
        };

        for line_type in [DiffLineType::Added, DiffLineType::Context] {
            if let Some((file, line)) = self
                .candidates(line_type)
                .find(|(_, l)| l.content.trim() == target)
            {
                return found(file, line, true, 1.0);
            }
        }

        for line_type in [DiffLineType::Added, DiffLineType::Context] {
            let hit = self.candidates(line_type).find_map(|(file, line)| {
                let ratio = similarity(line.content.trim(), target);
                (ratio >= self.fuzzy_threshold).then_some((file, line, ratio))
            });
            if let Some((file, line, ratio)) = hit {
                return found(file, line, false, ratio);
            }
        }

        LocateResult::not_found()
    }

    /// Every added or context line at or above the fuzzy threshold, in diff order.
    pub fn locate_all(&self, target: &str) -> Vec<LineMatch> {
        let Some(target) = clean_target(target) else {
            return Vec::new();
        };
        self.hunks
            .iter()
            .flat_map(|h| h.searchable_lines().map(move |l| (h.file_path.as_str(), l)))
            .filter_map(|(file, line)| {
                let content = line.content.trim();
                let ratio = if content == target {
                    1.0
                } else {
                    similarity(content, target)
                };
                (ratio >= self.fuzzy_threshold).then(|| LineMatch {
                    file_path: file.to_string(),
                    line_number: line.line_number.unwrap_or_default(),
                    line_type: line.line_type,
                    content: content.to_string(),
                    similarity: ratio,
                })
            })
            .collect()
    }

    /// Up to `window` lines on each side of `file:line`, within its hunk,
    /// prefixed with `+` or a space. Empty when the line is not in the diff.
    pub fn context(&self, file_path: &str, line_number: u32, window: usize) -> Vec<String> {
        for hunk in self.hunks.iter().filter(|h| h.file_path == file_path) {
            let lines: Vec<&DiffLine> = hunk.searchable_lines().collect();
            let Some(idx) = lines
                .iter()
                .position(|l| l.line_number == Some(line_number))
            else {
                continue;
            };
            let start = idx.saturating_sub(window);
            let end = (idx + window + 1).min(lines.len());
            return lines[start..end]
                .iter()
                .map(|l| format!("{}{}", l.line_type.marker(), l.content))
                .collect();
        }
        Vec::new()
    }

    fn candidates(&self, line_type: DiffLineType) -> impl Iterator<Item = (&str, &DiffLine)> {
        self.hunks.iter().flat_map(move |h| {
            h.lines
                .iter()
                .filter(move |l| l.line_type == line_type)
                .map(move |l| (h.file_path.as_str(), l))
        })
    }
}

fn clean_target(target: &str) -> Option<&str> {
    if target.contains('\n') {
        return None;
    }
    let trimmed = target.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn found(file: &str, line: &DiffLine, exact: bool, ratio: f64) -> LocateResult {
    LocateResult {
        success: true,
        file_path: Some(file.to_string()),
        line_number: line.line_number,
        exact_match: exact,
        matched_text: Some(line.content.trim().to_string()),
        similarity: Some(ratio),
    }
}

/// Resolve `target` against `diff` with the default threshold.
pub fn locate(diff: &str, target: &str) -> LocateResult {
    LineLocator::new(diff).locate(target)
}

/// Context lines around `file:line` in `diff`.
pub fn context(diff: &str, file_path: &str, line_number: u32, window: usize) -> Vec<String> {
    LineLocator::new(diff).context(file_path, line_number, window)
}
