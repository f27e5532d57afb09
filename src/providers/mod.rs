//! InferenceProvider trait and LLM integration.
//!
//! Provides an abstraction layer over rig-core so the orchestrator only
//! sees a stream of text chunks per stage turn.

pub mod rig;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::models::{StageDefinition, Turn};
use crate::tools::LocatorTools;

/// Errors from the inference provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("LLM API error: {0}")]
    ApiError(String),

    #[error("inference stream failed: {0}")]
    StreamError(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

/// One item of a stage's response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceEvent {
    Chunk(String),
    /// The provider's explicit end-of-turn signal.
    EndOfTurn,
}

/// A finite, non-restartable response stream.
pub type ChunkStream = BoxStream<'static, Result<InferenceEvent, ProviderError>>;

/// Trait for streamed, stage-scoped inference.
///
/// `task` is the serialized task payload; `prior_turns` is the run's turn
/// log so far. `tools` is set for stages that may call the line locator.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn invoke(
        &self,
        stage: &StageDefinition,
        task: &str,
        prior_turns: &[Turn],
        tools: Option<&LocatorTools>,
    ) -> Result<ChunkStream, ProviderError>;
}
