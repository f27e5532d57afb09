//! Stage definitions: built-ins, instruction overrides, and the validated graph.

pub mod builtin;
pub mod graph;
pub mod parser;

use std::path::Path;
use thiserror::Error;

use crate::models::StageDefinition;

pub use graph::{GraphError, StageGraph};

/// Errors from stage loading.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("failed to read stage file {path}: {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse stage definition {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("override {path} declares id '{found}', expected '{expected}'")]
    IdMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Load the stage set: built-ins, with per-id overrides from `instructions_dir`.
///
/// An override file `<dir>/<id>.md` either carries its own frontmatter (a
/// full replacement definition) or is plain text that replaces only the
/// instructions.
pub async fn load_stages(
    instructions_dir: Option<&Path>,
) -> Result<Vec<StageDefinition>, StageError> {
    let mut stages = builtin::builtin_stages();
    let Some(dir) = instructions_dir else {
        return Ok(stages);
    };

    for stage in &mut stages {
        let path = dir.join(format!("{}.md", stage.id));
        if !path.is_file() {
            continue;
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StageError::ReadError {
                path: path.display().to_string(),
                source: e,
            })?;
        *stage = apply_override(stage, &content, &path)?;
        tracing::debug!(stage = %stage.id, path = %path.display(), "loaded stage override");
    }
    Ok(stages)
}

/// Load and validate the stage graph.
pub async fn load_graph(instructions_dir: Option<&Path>) -> Result<StageGraph, StageError> {
    let stages = load_stages(instructions_dir).await?;
    Ok(StageGraph::new(stages)?)
}

/// Parse a stage file for the `validate` command.
pub async fn validate_stage_file(path: &Path) -> Result<StageDefinition, StageError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StageError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
    parser::parse_stage_definition(&content).map_err(|message| StageError::ParseError {
        path: path.display().to_string(),
        message,
    })
}

fn apply_override(
    base: &StageDefinition,
    content: &str,
    path: &Path,
) -> Result<StageDefinition, StageError> {
    if !parser::has_frontmatter(content) {
        let mut stage = base.clone();
        stage.instructions = content.trim().to_string();
        if stage.instructions.is_empty() {
            return Err(StageError::ParseError {
                path: path.display().to_string(),
                message: "override has no instructions".into(),
            });
        }
        return Ok(stage);
    }

    let stage = parser::parse_stage_definition(content).map_err(|message| {
        StageError::ParseError {
            path: path.display().to_string(),
            message,
        }
    })?;
    if stage.id != base.id {
        return Err(StageError::IdMismatch {
            path: path.display().to_string(),
            expected: base.id.clone(),
            found: stage.id,
        });
    }
    Ok(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StageRole;

    #[tokio::test]
    async fn defaults_without_dir() {
        let graph = load_graph(None).await.unwrap();
        assert_eq!(graph.len(), 9);
        assert_eq!(graph.dispatcher().id, "dispatcher");
        assert_eq!(graph.aggregator().id, "aggregator");
    }

    #[tokio::test]
    async fn plain_text_override_replaces_instructions_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("security.md"), "Only look at SQL.\n").unwrap();

        let stages = load_stages(Some(dir.path())).await.unwrap();
        let sec = stages.iter().find(|s| s.id == "security").unwrap();
        assert_eq!(sec.instructions, "Only look at SQL.");
        assert_eq!(sec.role, StageRole::Analyzer);
        assert!(sec.tools);
    }

    #[tokio::test]
    async fn frontmatter_override_replaces_definition() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("memory.md"),
            "---\nid: memory\nrole: analyzer\ndepends_on: [dispatcher]\ntools: false\n---\nCheck leaks.",
        )
        .unwrap();

        let stages = load_stages(Some(dir.path())).await.unwrap();
        let mem = stages.iter().find(|s| s.id == "memory").unwrap();
        assert!(!mem.tools);
        assert_eq!(mem.instructions, "Check leaks.");
    }

    #[tokio::test]
    async fn override_that_reshapes_the_graph_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("aggregator.md"),
            "---\nid: aggregator\nrole: aggregator\ndepends_on: [dispatcher]\n---\nMerge.",
        )
        .unwrap();

        let err = load_graph(Some(dir.path())).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::Graph(GraphError::AggregatorUnexpectedDependency { ref dependency, .. })
                if dependency == "dispatcher"
        ));
    }

    #[tokio::test]
    async fn override_with_wrong_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("logic.md"),
            "---\nid: other\nrole: analyzer\n---\nBody",
        )
        .unwrap();

        let err = load_stages(Some(dir.path())).await.unwrap_err();
        assert!(matches!(err, StageError::IdMismatch { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn unrelated_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "scratch").unwrap();
        assert_eq!(load_stages(Some(dir.path())).await.unwrap().len(), 9);
    }

    #[tokio::test]
    async fn validate_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.md");
        std::fs::write(&path, "no frontmatter").unwrap();
        let err = validate_stage_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("bad.md"));

        let missing = validate_stage_file(&dir.path().join("nope.md")).await;
        assert!(matches!(missing, Err(StageError::ReadError { .. })));
    }
}
