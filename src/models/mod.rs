//! Shared types used across all modules.
//!
//! This module defines the core data structures for findings, diffs,
//! stage definitions, review requests, and run results. Other modules
//! import from here rather than reaching into each other's internals.

pub mod diff;
pub mod finding;
pub mod request;
pub mod result;
pub mod stage;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use diff::{DiffHunk, DiffLine, DiffLineType, LineMatch, LocateResult};
pub use finding::{Category, CategoryCounts, Finding, FindingKey, Severity, SeverityCounts};
pub use request::{PrComment, ReviewRequest, ReviewRequestBuilder};
pub use result::{ErrorCode, PipelineResult, RunError, RunStatus, StageStat, StageStatus};
pub use stage::{StageDefinition, StageRole, Turn, TurnRole};

/// Supported inference provider backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Groq,
    /// Any OpenAI-compatible API (e.g. Ollama, vLLM, local servers).
    #[serde(rename = "openai-compatible")]
    OpenAICompatible,
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderName::Anthropic => write!(f, "anthropic"),
            ProviderName::OpenAI => write!(f, "openai"),
            ProviderName::Gemini => write!(f, "gemini"),
            ProviderName::DeepSeek => write!(f, "deepseek"),
            ProviderName::Groq => write!(f, "groq"),
            ProviderName::OpenAICompatible => write!(f, "openai-compatible"),
        }
    }
}

impl std::str::FromStr for ProviderName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(ProviderName::Anthropic),
            "openai" => Ok(ProviderName::OpenAI),
            "gemini" => Ok(ProviderName::Gemini),
            "deepseek" => Ok(ProviderName::DeepSeek),
            "groq" => Ok(ProviderName::Groq),
            "openai-compatible" => Ok(ProviderName::OpenAICompatible),
            other => Err(format!(
                "unsupported provider: '{other}'. Supported: anthropic, openai, \
                 gemini, deepseek, groq, openai-compatible"
            )),
        }
    }
}

impl ProviderName {
    /// Returns the provider-specific environment variable name for the API key.
    ///
    /// These match the env var names used by rig-core's `from_env()` implementations.
    pub fn api_key_env_var(self) -> &'static str {
        match self {
            ProviderName::Anthropic => "ANTHROPIC_API_KEY",
            ProviderName::OpenAI | ProviderName::OpenAICompatible => "OPENAI_API_KEY",
            ProviderName::Gemini => "GEMINI_API_KEY",
            ProviderName::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderName::Groq => "GROQ_API_KEY",
        }
    }
}
