//! Line-locator tools offered to analyzer stages.
//!
//! Both tools are anchored on the run's diff through a shared
//! [`LineLocator`], so the model only passes the snippet or position it is
//! asking about. Each tool implements rig-core's `Tool` trait for native
//! tool calling.

pub mod line_context;
pub mod line_number;

use std::sync::Arc;

use rig::tool::Tool;
use serde::Serialize;

use crate::diff::LineLocator;

pub use line_context::GetLineContextTool;
pub use line_number::CalculateLineNumberTool;

/// Largest window `get_line_context` will honour.
pub const MAX_CONTEXT_WINDOW: usize = 20;

const LINE_NUMBER_DESCRIPTION: &str = "Find the file and new-file line number of a single line \
    of code in the diff under review. Returns JSON with success, file_path, line_number, \
    exact_match and matched_text. Multi-line input is rejected.";

const LINE_CONTEXT_DESCRIPTION: &str = "Return the lines around a file/line position in the \
    diff as a JSON array. Added lines start with '+', context lines with a space.";

/// Name and description of a tool, as listed in the task payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
}

/// Descriptors for the locator tools.
pub fn locator_tool_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: CalculateLineNumberTool::NAME,
            description: LINE_NUMBER_DESCRIPTION,
        },
        ToolDescriptor {
            name: GetLineContextTool::NAME,
            description: LINE_CONTEXT_DESCRIPTION,
        },
    ]
}

/// Both locator tools over one shared locator.
#[derive(Clone)]
pub struct LocatorTools {
    locator: Arc<LineLocator>,
}

impl LocatorTools {
    pub fn new(locator: Arc<LineLocator>) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &LineLocator {
        &self.locator
    }

    pub fn line_number(&self) -> CalculateLineNumberTool {
        CalculateLineNumberTool::new(Arc::clone(&self.locator))
    }

    pub fn line_context(&self) -> GetLineContextTool {
        GetLineContextTool::new(Arc::clone(&self.locator))
    }
}

impl std::fmt::Debug for LocatorTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocatorTools")
            .field("hunks", &self.locator.hunks().len())
            .finish()
    }
}
