use std::collections::HashMap;

use crate::models::{Category, Finding, FindingKey};

/// Collapse findings that share a `(file, line, category)` key.
///
/// The survivor takes the position of the first finding seen for its key, so
/// stage-arrival order is kept. Unparsed-output findings are never merged
/// with each other unless they are identical.
pub fn deduplicate(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen: HashMap<FindingKey, usize> = HashMap::new();
    let mut result: Vec<Finding> = Vec::with_capacity(findings.len());

    for finding in findings {
        if finding.category == Category::UnparsedResult {
            if !result.contains(&finding) {
                result.push(finding);
            }
            continue;
        }

        match seen.get(&finding.key()) {
            Some(&idx) => {
                if supersedes(&finding, &result[idx]) {
                    result[idx] = finding;
                }
            }
            None => {
                seen.insert(finding.key(), result.len());
                result.push(finding);
            }
        }
    }
    result
}

/// Strictly higher severity wins; on a tie the longer description wins.
fn supersedes(candidate: &Finding, current: &Finding) -> bool {
    match candidate.severity.cmp(&current.severity) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => {
            candidate.description.chars().count() > current.description.chars().count()
        }
    }
}

/// Historical repeats first, then descending severity. Stable.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.historical_repeat
            .cmp(&a.historical_repeat)
            .then_with(|| b.severity.cmp(&a.severity))
    });
}
