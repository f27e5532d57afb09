//! Unified diff format parser.
//!
//! Splits a unified diff into hunks, each tagged with the new-file path
//! and with every added/context line numbered in the new file.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::diff::{DiffHunk, DiffLine, DiffLineType};

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -\d+(?:,\d+)? \+(\d+)(?:,\d+)? @@").expect("valid hunk header regex")
});

/// Hunk being accumulated.
struct OpenHunk {
    start: u32,
    next_line: u32,
    lines: Vec<DiffLine>,
}

impl OpenHunk {
    fn new(start: u32) -> Self {
        Self {
            start,
            next_line: start,
            lines: Vec::new(),
        }
    }

    fn push(&mut self, line_type: DiffLineType, content: &str) {
        let line_number = match line_type {
            DiffLineType::Deleted => None,
            DiffLineType::Added | DiffLineType::Context => {
                let n = self.next_line;
                self.next_line += 1;
                Some(n)
            }
        };
        self.lines.push(DiffLine {
            line_type,
            content: content.to_string(),
            line_number,
        });
    }
}

/// Parse a unified diff into hunks.
///
/// Never fails: malformed input yields fewer (or no) hunks. A hunk whose
/// `@@` header does not match the expected pattern starts at line 0, and a
/// hunk is only kept when it belongs to a known, non-deleted file.
pub fn parse_diff(input: &str) -> Vec<DiffHunk> {
    let mut hunks = Vec::new();
    let mut current_file: Option<String> = None;
    let mut open: Option<OpenHunk> = None;
    let mut lines = input.lines().peekable();

    while let Some(line) = lines.next() {
        if line.starts_with("diff --git ") {
            close_hunk(&mut hunks, &current_file, open.take());
            current_file = parse_git_header(line);
            continue;
        }

        // "--- a/x" directly followed by "+++ b/x" is a file header, even mid-hunk.
        let is_old_header = line.starts_with("--- ")
            && (open.is_none() || lines.peek().is_some_and(|n| n.starts_with("+++ ")));
        if is_old_header {
            close_hunk(&mut hunks, &current_file, open.take());
            if let Some(next) = lines.next_if(|n| n.starts_with("+++ ")) {
                current_file = parse_new_path(next);
            }
            continue;
        }

        if open.is_none() && line.starts_with("+++ ") {
            current_file = parse_new_path(line);
            continue;
        }

        if line.starts_with("@@") {
            close_hunk(&mut hunks, &current_file, open.take());
            let start = HUNK_HEADER
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            open = Some(OpenHunk::new(start));
            continue;
        }

        let Some(hunk) = open.as_mut() else {
            continue;
        };

        if let Some(content) = line.strip_prefix('+') {
            hunk.push(DiffLineType::Added, content);
        } else if let Some(content) = line.strip_prefix('-') {
            hunk.push(DiffLineType::Deleted, content);
        } else if let Some(content) = line.strip_prefix(' ') {
            hunk.push(DiffLineType::Context, content);
        } else if line.is_empty() {
            // Some tools strip the single space from blank context lines.
            hunk.push(DiffLineType::Context, "");
        }
        // "\ No newline at end of file" and anything else: skip
    }

    close_hunk(&mut hunks, &current_file, open.take());
    hunks
}

fn close_hunk(hunks: &mut Vec<DiffHunk>, file: &Option<String>, open: Option<OpenHunk>) {
    let (Some(file), Some(open)) = (file, open) else {
        return;
    };
    if open.lines.is_empty() {
        return;
    }
    hunks.push(DiffHunk {
        file_path: file.clone(),
        hunk_start: open.start,
        lines: open.lines,
    });
}

/// Path from a `+++ b/<path>` line. `/dev/null` yields `None`.
fn parse_new_path(line: &str) -> Option<String> {
    let raw = line.strip_prefix("+++ ")?;
    // Drop a trailing "\t<timestamp>" emitted by plain `diff -u`.
    let raw = raw.split('\t').next().unwrap_or(raw).trim_end();
    if raw == "/dev/null" || raw.is_empty() {
        return None;
    }
    Some(strip_diff_prefix(raw).to_string())
}

/// Provisional path from a `diff --git a/x b/y` header, replaced by the `+++` line if present.
fn parse_git_header(line: &str) -> Option<String> {
    let rest = line.strip_prefix("diff --git ")?;
    let b_part = match find_second_prefix(rest) {
        Some(idx) => &rest[idx + 1..],
        None => rest.rsplit(' ').next()?,
    };
    let path = strip_diff_prefix(b_part);
    (!path.is_empty()).then(|| path.to_string())
}

/// Strip a single-character git diff prefix (`a/`, `b/`, `c/`, `w/`, `i/`, `o/`).
///
/// `c/`, `w/`, `i/` and `o/` show up when `diff.mnemonicPrefix` is enabled.
fn strip_diff_prefix(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2
        && bytes[1] == b'/'
        && matches!(bytes[0], b'a' | b'b' | b'c' | b'w' | b'i' | b'o')
    {
        return &path[2..];
    }
    path
}

/// Find the space separating the two paths of a `diff --git` header.
fn find_second_prefix(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (1..bytes.len().saturating_sub(2)).find(|&i| {
        bytes[i] == b' '
            && bytes[i + 2] == b'/'
            && matches!(bytes[i + 1], b'a' | b'b' | b'c' | b'w' | b'i' | b'o')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DIFF: &str = r#"diff --git a/src/main.rs b/src/main.rs
index 1234567..abcdefg 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,5 +1,6 @@
 fn main() {
-    println!("Hello");
+    println!("Hello, world!");
+    println!("Goodbye!");
     let x = 42;
 }
"#;

    #[test]
    fn parse_simple_diff() {
        let hunks = parse_diff(SAMPLE_DIFF);
        assert_eq!(hunks.len(), 1);
        let hunk = &hunks[0];
        assert_eq!(hunk.file_path, "src/main.rs");
        assert_eq!(hunk.hunk_start, 1);
        // 1 context + 1 deleted + 2 added + 2 context
        assert_eq!(hunk.lines.len(), 6);
    }

    #[test]
    fn line_numbers_skip_deleted_lines() {
        let hunks = parse_diff(SAMPLE_DIFF);
        let lines = &hunks[0].lines;
        assert_eq!(lines[0].line_number, Some(1));
        assert_eq!(lines[1].line_type, DiffLineType::Deleted);
        assert_eq!(lines[1].line_number, None);
        assert_eq!(lines[2].line_number, Some(2));
        assert_eq!(lines[3].line_number, Some(3));
        assert_eq!(lines[4].line_number, Some(4));
    }

    #[test]
    fn hunk_start_is_new_file_start() {
        let diff = "+++ b/a.py\n@@ -10,3 +12,4 @@ def f():\n x = 1\n+y = 2\n";
        let hunks = parse_diff(diff);
        assert_eq!(hunks[0].hunk_start, 12);
        assert_eq!(hunks[0].lines[1].line_number, Some(13));
    }

    #[test]
    fn header_without_counts() {
        let diff = "+++ b/a.py\n@@ -1 +1 @@\n-a\n+b\n";
        let hunks = parse_diff(diff);
        assert_eq!(hunks[0].hunk_start, 1);
        assert_eq!(hunks[0].lines[1].line_number, Some(1));
    }

    #[test]
    fn malformed_header_resets_start() {
        let diff = "+++ b/a.py\n@@ garbage @@\n+added\n";
        let hunks = parse_diff(diff);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].hunk_start, 0);
        assert_eq!(hunks[0].lines[0].line_number, Some(0));
    }

    #[test]
    fn hunks_without_file_are_dropped() {
        let hunks = parse_diff("@@ -1,1 +1,1 @@\n+orphan\n");
        assert!(hunks.is_empty());
    }

    #[test]
    fn deleted_file_is_not_searchable() {
        let diff = "diff --git a/old.rs b/old.rs\ndeleted file mode 100644\n--- a/old.rs\n+++ /dev/null\n@@ -1,2 +0,0 @@\n-fn old() {\n-}\n";
        assert!(parse_diff(diff).is_empty());
    }

    #[test]
    fn new_file_from_dev_null() {
        let diff = "--- /dev/null\n+++ b/new.rs\n@@ -0,0 +1,2 @@\n+fn a() {}\n+fn b() {}\n";
        let hunks = parse_diff(diff);
        assert_eq!(hunks[0].file_path, "new.rs");
        assert_eq!(hunks[0].lines[1].line_number, Some(2));
    }

    #[test]
    fn multiple_files_and_hunks() {
        let diff = r#"diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -1,2 +1,2 @@
 fn a() {
-    1
+    2
@@ -20,1 +20,2 @@
 tail
+more
diff --git a/b.rs b/b.rs
--- a/b.rs
+++ b/b.rs
@@ -5,1 +5,1 @@
-x
+y
"#;
        let hunks = parse_diff(diff);
        assert_eq!(hunks.len(), 3);
        assert_eq!(hunks[0].file_path, "a.rs");
        assert_eq!(hunks[1].file_path, "a.rs");
        assert_eq!(hunks[1].hunk_start, 20);
        assert_eq!(hunks[2].file_path, "b.rs");
    }

    #[test]
    fn no_newline_marker_is_skipped() {
        let diff = "+++ b/t.rs\n@@ -1,1 +1,1 @@\n-old\n\\ No newline at end of file\n+new\n\\ No newline at end of file\n";
        let hunks = parse_diff(diff);
        assert_eq!(hunks[0].lines.len(), 2);
        assert_eq!(hunks[0].lines[1].content, "new");
    }

    #[test]
    fn added_line_that_looks_like_header() {
        let diff = "+++ b/t.rs\n@@ -1,1 +1,2 @@\n keep\n+++ counter\n";
        let hunks = parse_diff(diff);
        assert_eq!(hunks[0].lines.len(), 2);
        assert_eq!(hunks[0].lines[1].line_type, DiffLineType::Added);
        assert_eq!(hunks[0].lines[1].content, "++ counter");
    }

    #[test]
    fn deleted_sql_comment_is_not_a_header() {
        let diff = "+++ b/q.sql\n@@ -1,2 +1,1 @@\n--- removed comment\n select 1;\n";
        let hunks = parse_diff(diff);
        assert_eq!(hunks[0].lines[0].line_type, DiffLineType::Deleted);
        assert_eq!(hunks[0].lines[1].line_number, Some(1));
    }

    #[test]
    fn git_header_provides_path_without_plus_line() {
        let diff = "diff --git a/x.rs b/x.rs\n@@ -1,1 +1,1 @@\n+z\n";
        let hunks = parse_diff(diff);
        assert_eq!(hunks[0].file_path, "x.rs");
    }

    #[test]
    fn empty_and_garbage_inputs() {
        assert!(parse_diff("").is_empty());
        assert!(parse_diff("this is not a diff").is_empty());
        assert!(parse_diff("diff --git a/f b/f\n--- a/f\n+++ b/f").is_empty());
    }
}
