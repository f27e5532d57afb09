//! `calculate_line_number`: resolve a single line of code to its file and
//! new-file line number in the run's diff.

use std::sync::Arc;

use rig::completion::ToolDefinition;
use rig::tool::Tool;
use serde::Deserialize;
use serde_json::json;

use crate::diff::LineLocator;

#[derive(Debug, Deserialize)]
pub struct CalculateLineNumberArgs {
    /// One line of code, copied from the diff.
    pub target_line_content: String,
}

#[derive(Debug, thiserror::Error)]
#[error("calculate_line_number error: {0}")]
pub struct CalculateLineNumberError(String);

pub struct CalculateLineNumberTool {
    locator: Arc<LineLocator>,
}

impl CalculateLineNumberTool {
    pub fn new(locator: Arc<LineLocator>) -> Self {
        Self { locator }
    }
}

impl Tool for CalculateLineNumberTool {
    const NAME: &'static str = "calculate_line_number";
    type Error = CalculateLineNumberError;
    type Args = CalculateLineNumberArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: super::LINE_NUMBER_DESCRIPTION.to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "target_line_content": {
                        "type": "string",
                        "description": "A single line of code from the diff, without the leading +/- marker"
                    }
                },
                "required": ["target_line_content"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let result = self.locator.locate(&args.target_line_content);
        tracing::debug!(
            tool = Self::NAME,
            success = result.success,
            line = ?result.line_number,
            exact = ?result.exact_match,
            "tool call"
        );
        serde_json::to_string(&result).map_err(|e| CalculateLineNumberError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const DIFF: &str = "\
diff --git a/app.py b/app.py
--- a/app.py
+++ b/app.py
@@ -1,3 +1,4 @@
 import os
 import sys
+x = 1
 print(x)
";

    #[tokio::test]
    async fn resolves_added_line() {
        let tool = CalculateLineNumberTool::new(Arc::new(LineLocator::new(DIFF)));
        let out = tool
            .call(CalculateLineNumberArgs {
                target_line_content: "x = 1".into(),
            })
            .await
            .unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["file_path"], "app.py");
        assert_eq!(json["line_number"], 3);
        assert_eq!(json["exact_match"], true);
    }

    #[tokio::test]
    async fn multi_line_target_is_not_searched() {
        let tool = CalculateLineNumberTool::new(Arc::new(LineLocator::new(DIFF)));
        let out = tool
            .call(CalculateLineNumberArgs {
                target_line_content: "import os\nimport sys".into(),
            })
            .await
            .unwrap();
        let json: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(json["success"], false);
    }
}
