//! Markdown + YAML frontmatter parser for stage definitions.

use crate::models::StageDefinition;

/// Parse a markdown file with YAML frontmatter into a StageDefinition.
///
/// Expected format:
/// ```markdown
/// ---
/// id: security
/// role: analyzer
/// depends_on: [dispatcher]
/// tools: true
/// description: Security review
/// ---
///
/// Instruction text here...
/// ```
pub fn parse_stage_definition(content: &str) -> Result<StageDefinition, String> {
    let (frontmatter, body) = split_frontmatter(content)?;
    let mut stage: StageDefinition =
        serde_yaml_ng::from_str(&frontmatter).map_err(|e| format!("invalid frontmatter: {e}"))?;

    if stage.id.trim().is_empty() {
        return Err("stage id must not be empty".to_string());
    }
    stage.instructions = body.trim().to_string();
    if stage.instructions.is_empty() {
        return Err(format!("stage '{}' has no instructions", stage.id));
    }
    Ok(stage)
}

/// Whether `content` carries a frontmatter block.
pub fn has_frontmatter(content: &str) -> bool {
    content.trim_start().starts_with("---")
}

/// Split content into YAML frontmatter and markdown body.
fn split_frontmatter(content: &str) -> Result<(String, String), String> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err("stage definition must start with YAML frontmatter (---)".to_string());
    }

    let after_first = &content[3..];
    let end = after_first
        .find("\n---")
        .ok_or_else(|| "unterminated YAML frontmatter (missing closing ---)".to_string())?;

    let frontmatter = after_first[..end].trim().to_string();
    let body = after_first[end + 4..].to_string();

    Ok((frontmatter, body))
}
