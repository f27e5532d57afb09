//! Output renderers: terminal and JSON.

pub mod json;
pub mod terminal;

use crate::service::ReviewReport;

pub use json::JsonRenderer;
pub use terminal::TerminalRenderer;

/// Trait for rendering a review report to an output format.
pub trait OutputRenderer {
    /// Render the report to a string.
    fn render(&self, report: &ReviewReport) -> String;
}
