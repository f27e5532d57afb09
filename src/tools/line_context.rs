//! `get_line_context`: lines around a resolved position.

use std::sync::Arc;

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;
use serde_json::json;

use crate::constants::DEFAULT_CONTEXT_WINDOW;
use crate::diff::LineLocator;

fn default_window() -> usize {
    DEFAULT_CONTEXT_WINDOW
}

#[derive(Debug, Deserialize)]
pub struct GetLineContextArgs {
    pub file_path: String,
    pub line_number: u32,
    #[serde(default = "default_window")]
    pub window_size: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("get_line_context error: {0}")]
pub struct GetLineContextError(String);

pub struct GetLineContextTool {
    locator: Arc<LineLocator>,
    max_window: usize,
}

impl GetLineContextTool {
    pub fn new(locator: Arc<LineLocator>) -> Self {
        Self {
            locator,
            max_window: super::MAX_CONTEXT_WINDOW,
        }
    }
}

impl Tool for GetLineContextTool {
    const NAME: &'static str = "get_line_context";
    type Error = GetLineContextError;
    type Args = GetLineContextArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: super::LINE_CONTEXT_DESCRIPTION.to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "File path as reported by calculate_line_number"
                    },
                    "line_number": {
                        "type": "integer",
                        "description": "Line number in the new file"
                    },
                    "window_size": {
                        "type": "integer",
                        "description": "Lines to include on each side (default 1)"
                    }
                },
                "required": ["file_path", "line_number"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let window = args.window_size.min(self.max_window);
        let lines = self
            .locator
            .context(&args.file_path, args.line_number, window);
        tracing::debug!(
            tool = Self::NAME,
            file = %args.file_path,
            line = args.line_number,
            returned = lines.len(),
            "tool call"
        );
        serde_json::to_string(&lines).map_err(|e| GetLineContextError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: &str = "\
+++ b/app.py
@@ -1,3 +1,4 @@
 import os
 import sys
+x = 1
 print(x)
";

    #[tokio::test]
    async fn returns_marked_lines() {
        let tool = GetLineContextTool::new(Arc::new(LineLocator::new(DIFF)));
        let out = tool
            .call(GetLineContextArgs {
                file_path: "app.py".into(),
                line_number: 3,
                window_size: 1,
            })
            .await
            .unwrap();
        let lines: Vec<String> = serde_json::from_str(&out).unwrap();
        assert_eq!(lines, vec![" import sys", "+x = 1", " print(x)"]);
    }

    #[tokio::test]
    async fn unknown_file_gives_empty_list() {
        let tool = GetLineContextTool::new(Arc::new(LineLocator::new(DIFF)));
        let out = tool
            .call(GetLineContextArgs {
                file_path: "nope.py".into(),
                line_number: 3,
                window_size: 2,
            })
            .await
            .unwrap();
        assert_eq!(out, "[]");
    }
}
