//! JSON output renderer.
//!
//! Outputs the full report: `{"result": {...}, "reputation": {...},
//! "concurrency": {...}, "summary": {...}}`.

use crate::models::SeverityCounts;
use crate::output::OutputRenderer;
use crate::service::ReviewReport;

/// JSON output renderer.
pub struct JsonRenderer;

impl OutputRenderer for JsonRenderer {
    fn render(&self, report: &ReviewReport) -> String {
        let summary = SeverityCounts::from_findings(&report.result.findings);

        let output = serde_json::json!({
            "result": report.result,
            "reputation": report.reputation,
            "concurrency": report.concurrency,
            "summary": summary,
        });

        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }
}
