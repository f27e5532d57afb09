//! Diff line locator: unified diff parsing, snippet resolution, and context lookup.

pub mod locator;
pub mod parser;
pub mod similarity;

use std::path::Path;
use thiserror::Error;

pub use locator::{LineLocator, context, locate};
pub use parser::parse_diff;
pub use similarity::similarity;

/// Errors reading diff input.
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("failed to read diff file {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to read diff from stdin: {0}")]
    Stdin(std::io::Error),
}

/// Read a unified diff from a file.
pub async fn read_diff_file(path: &Path) -> Result<String, DiffError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DiffError::FileRead {
            path: path.display().to_string(),
            source,
        })
}

/// Read a unified diff from stdin.
pub async fn read_diff_stdin() -> Result<String, DiffError> {
    use tokio::io::AsyncReadExt;
    let mut buf = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buf)
        .await
        .map_err(DiffError::Stdin)?;
    Ok(buf)
}
