//! Historical comment analysis.
//!
//! Prior PR comments are bucketed by keyword. A concern raised in two or
//! more comments is reported to the stages as a likely unfixed repeat.

use indexmap::IndexMap;
use serde::Serialize;

use crate::models::{Category, PrComment};

/// Keyword table, checked against the lowercased comment body.
const KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Memory, &["内存泄漏", "memory leak", "leak"]),
    (Category::Security, &["安全", "security", "vulnerability", "漏洞"]),
    (Category::Performance, &["性能", "performance", "slow", "慢"]),
    (Category::Logical, &["逻辑", "logic", "错误", "bug"]),
    (Category::Maintainability, &["维护", "maintainability", "可读性", "readability"]),
];

/// Comments mentioning one concern type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoricalIssue {
    pub count: usize,
    pub comments: Vec<CommentRef>,
    pub first_mentioned: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRef {
    pub body: String,
    pub line: Option<u32>,
    pub file: String,
}

/// Concern types mentioned at least twice, in keyword-table order.
pub fn analyze_comments(comments: &[PrComment]) -> IndexMap<Category, HistoricalIssue> {
    let mut issues: IndexMap<Category, HistoricalIssue> = IndexMap::new();

    for comment in comments {
        let body = comment.body.to_lowercase();
        for (category, keywords) in KEYWORDS {
            if !keywords.iter().any(|k| body.contains(k)) {
                continue;
            }
            let issue = issues.entry(*category).or_insert_with(|| HistoricalIssue {
                count: 0,
                comments: Vec::new(),
                first_mentioned: comment
                    .created_at
                    .clone()
                    .unwrap_or_else(|| "unknown".into()),
            });
            issue.count += 1;
            issue.comments.push(CommentRef {
                body: comment.body.clone(),
                line: comment.line,
                file: comment.path.clone().unwrap_or_default(),
            });
        }
    }

    issues.retain(|_, issue| issue.count >= 2);
    let rank = |category: &Category| KEYWORDS.iter().position(|(c, _)| c == category);
    issues.sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(body: &str, path: &str, line: u32) -> PrComment {
        PrComment {
            body: body.into(),
            path: Some(path.into()),
            line: Some(line),
            created_at: Some("2024-05-01".into()),
        }
    }

    #[test]
    fn single_mentions_are_dropped() {
        let issues = analyze_comments(&[comment("possible memory leak here", "a.c", 3)]);
        assert!(issues.is_empty());
    }

    #[test]
    fn repeated_concerns_are_reported() {
        let issues = analyze_comments(&[
            comment("Memory leak in the buffer", "a.c", 3),
            comment("still leaking, see the leak above", "a.c", 9),
            comment("this is a security hole", "b.c", 1),
        ]);
        assert_eq!(issues.len(), 1);
        let mem = &issues[&Category::Memory];
        assert_eq!(mem.count, 2);
        assert_eq!(mem.comments[1].line, Some(9));
        assert_eq!(mem.first_mentioned, "2024-05-01");
    }

    #[test]
    fn one_comment_can_count_for_several_types() {
        let issues = analyze_comments(&[
            comment("slow and has a bug", "x.py", 1),
            comment("performance bug again", "x.py", 2),
        ]);
        let kinds: Vec<_> = issues.keys().copied().collect();
        assert_eq!(kinds, vec![Category::Performance, Category::Logical]);
    }

    #[test]
    fn chinese_keywords() {
        let issues = analyze_comments(&[
            PrComment::new("这里有安全问题"),
            PrComment::new("安全检查缺失"),
        ]);
        assert_eq!(issues[&Category::Security].count, 2);
        assert_eq!(issues[&Category::Security].first_mentioned, "unknown");
    }
}
