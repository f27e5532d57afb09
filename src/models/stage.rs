//! Stage definitions and conversation turns.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The part a stage plays in the review graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StageRole {
    /// Entry stage: triages the change and flags historical repeats.
    Dispatcher,
    /// Independent specialist reviewer.
    Analyzer,
    /// Final stage: merges analyzer outputs into one report.
    Aggregator,
}

/// A parsed stage definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub id: String,
    pub role: StageRole,
    /// Ids of stages that must finish before this one becomes ready.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Whether the diff line-locator tools are offered to this stage.
    #[serde(default)]
    pub tools: bool,
    #[serde(default)]
    pub description: String,
    /// Opaque instruction text passed to the inference capability.
    #[serde(skip)]
    pub instructions: String,
}

/// Who produced a turn in the shared conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

/// One entry of the conversation log shared by the stages of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    /// Stage id for assistant turns, `"user"` for the task itself.
    pub source: String,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            source: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(stage: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            source: stage.into(),
            content: content.into(),
        }
    }
}
