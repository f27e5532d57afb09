//! Terminal renderer: styled flowing text in report order.
//!
//! Findings keep the aggregator's order (historical repeats first, then by
//! severity), so the most pressing items are on top.

use colored::Colorize;

use crate::models::{Finding, Severity, SeverityCounts};
use crate::output::OutputRenderer;
use crate::service::ReviewReport;

/// Terminal output renderer with colored, flowing text.
pub struct TerminalRenderer;

impl OutputRenderer for TerminalRenderer {
    fn render(&self, report: &ReviewReport) -> String {
        let result = &report.result;
        if let Some(error) = &result.error {
            let mut output = format!(
                " {} {} {}\n",
                "✖".red().bold(),
                error.code.to_string().red().bold(),
                error.message
            );
            if let Some(secs) = error.retry_after_secs {
                output.push_str(&format!("   {} retry in {secs}s\n", "→".cyan()));
            }
            return output;
        }

        let mut output = String::new();
        if result.findings.is_empty() {
            output.push_str(&format!("{}", "  ✔ No issues found.\n".green()));
        }
        for finding in &result.findings {
            render_finding(&mut output, finding);
        }

        for warning in &result.warnings {
            output.push_str(&format!(" {} {}\n", "!".yellow(), warning.dimmed()));
        }

        let counts = SeverityCounts::from_findings(&result.findings);
        output.push_str(&format!("{}\n", "───────────────────────────────────".dimmed()));
        output.push_str(&format!(
            " {} findings: {} critical, {} medium, {} minor, {} praise\n",
            counts.total().to_string().bold(),
            counts.critical.to_string().red().bold(),
            counts.medium.to_string().yellow().bold(),
            counts.minor.to_string().blue().bold(),
            counts.praise.to_string().green().bold(),
        ));
        if let Some(reputation) = &report.reputation {
            output.push_str(&format!(
                " {} {} ({} → {})\n",
                "reputation:".dimmed(),
                reputation.event,
                reputation.score_before,
                reputation.score_after
            ));
        }

        output
    }
}

fn render_finding(output: &mut String, finding: &Finding) {
    let (icon, severity) = match finding.severity {
        Severity::Critical => ("✖".red().bold(), "critical".red().bold()),
        Severity::Medium => ("⚠".yellow().bold(), "medium".yellow().bold()),
        Severity::Minor => ("ℹ".blue().bold(), "minor".blue().bold()),
        Severity::Praise => ("★".green().bold(), "praise".green().bold()),
    };

    let location = match (finding.file.as_str(), finding.line) {
        ("", _) => "(no file)".to_string(),
        (file, Some(line)) => format!("{file}:{line}"),
        (file, None) => file.to_string(),
    };

    let repeat = if finding.historical_repeat {
        format!(" {}", "[repeat]".magenta().bold())
    } else {
        String::new()
    };

    output.push_str(&format!(
        " {icon} {severity}{repeat} in {} [{}]\n",
        location.bold(),
        finding.category
    ));
    output.push_str(&format!("   {}\n", finding.description));
    if let Some(ref suggestion) = finding.suggestion {
        output.push_str(&format!("   {} {}\n", "→".cyan(), suggestion));
    }
    output.push('\n');
}
