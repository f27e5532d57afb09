//! Diff-related types: hunks, lines, and line-lookup results.

use serde::{Deserialize, Serialize};

/// The type of a line in a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLineType {
    /// Line exists only in the new version.
    Added,
    /// Line is unchanged.
    Context,
    /// Line exists only in the old version. Never a search target.
    Deleted,
}

impl DiffLineType {
    /// Marker used when rendering the line back in diff notation.
    pub fn marker(self) -> char {
        match self {
            DiffLineType::Added => '+',
            DiffLineType::Context => ' ',
            DiffLineType::Deleted => '-',
        }
    }
}

/// A single line in a diff hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    /// The content of the line (without the leading marker).
    pub content: String,
    /// Line number in the new file. `None` for deleted lines.
    pub line_number: Option<u32>,
}

/// A contiguous hunk sharing one `@@ ... @@` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// Path of the new file.
    pub file_path: String,
    /// Starting line in the new file, or 0 when the header was malformed.
    pub hunk_start: u32,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Lines that can be resolved to a new-file line number.
    pub fn searchable_lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines
            .iter()
            .filter(|l| l.line_type != DiffLineType::Deleted)
    }
}

/// Result of resolving a snippet to a file/line coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    pub exact_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    /// Similarity of the matched text to the target (1.0 for exact matches).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

impl LocateResult {
    pub fn not_found() -> Self {
        Self {
            success: false,
            file_path: None,
            line_number: None,
            exact_match: false,
            matched_text: None,
            similarity: None,
        }
    }
}

/// One candidate line returned by an exhaustive search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineMatch {
    pub file_path: String,
    pub line_number: u32,
    pub line_type: DiffLineType,
    pub content: String,
    pub similarity: f64,
}
