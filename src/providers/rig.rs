//! rig-core integration for stage inference.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support. Currently supports: Anthropic, OpenAI, Gemini, DeepSeek, Groq,
//! and any OpenAI-compatible API.
//!
//! Stages flagged with `tools: true` get the line-locator tools registered
//! via rig-core's native tool calling. rig returns the whole response at
//! once, so each turn is streamed as a single chunk followed by an explicit
//! end-of-turn.

use async_trait::async_trait;
use futures::StreamExt;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::ProviderConfig;
use crate::models::{ProviderName, StageDefinition, Turn, TurnRole};
use crate::tools::LocatorTools;

use super::{ChunkStream, InferenceEvent, InferenceProvider, ProviderError};

/// Maximum tokens per completion response for tool-less stages.
const MAX_TOKENS: u64 = 16384;

/// Upper bound on tool-call round trips within one stage turn.
const MAX_TOOL_TURNS: usize = 8;

/// Build a stage agent from a rig-core client and prompt it.
///
/// With locator tools the agent may loop through tool calls, so
/// `max_tokens` is left to the provider default.
macro_rules! prompt_stage {
    ($client:expr, $model:expr, $system:expr, $user:expr, $label:expr, $tools:expr) => {{
        match $tools {
            Some(tools) => {
                let agent = $client
                    .agent($model)
                    .preamble($system)
                    .temperature(0.0)
                    .tool(tools.line_number())
                    .tool(tools.line_context())
                    .default_max_turns(MAX_TOOL_TURNS)
                    .build();
                agent.prompt($user).await.map_err(|e| {
                    ProviderError::ApiError(format!("{} tool-calling error: {e}", $label))
                })
            }
            None => {
                let agent = $client
                    .agent($model)
                    .preamble($system)
                    .temperature(0.0)
                    .max_tokens(MAX_TOKENS)
                    .build();
                agent
                    .prompt($user)
                    .await
                    .map_err(|e| ProviderError::ApiError(format!("{} API error: {e}", $label)))
            }
        }
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            ProviderError::ApiError(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based inference provider.
///
/// The provider name in config selects which rig-core client to use.
pub struct RigProvider {
    config: ProviderConfig,
}

impl RigProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_none() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or {}.",
                config.name,
                crate::constants::ENV_API_KEY,
                config.name.api_key_env_var()
            )));
        }
        Ok(Self { config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Build an OpenAI-style client, optionally with a custom base URL.
    fn build_openai_client(
        &self,
        api_key: &str,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        let client: providers::openai::CompletionsClient = builder
            .build()
            .map_err(|e| ProviderError::ApiError(format!("failed to create OpenAI client: {e}")))?;
        Ok(client)
    }

    /// Require `base_url` for OpenAI-compatible providers.
    fn require_base_url(&self) -> Result<&str, ProviderError> {
        self.config.base_url.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(
                "openai-compatible provider requires base_url to be set".to_string(),
            )
        })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("missing API key".to_string()))
    }

    /// Make one stage call through rig-core and return the response text.
    async fn call_rig(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        tools: Option<&LocatorTools>,
    ) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let model = self.config.model.as_str();

        match self.config.name {
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::ApiError(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_stage!(client, model, system_prompt, user_prompt, "Anthropic", tools)
            }
            ProviderName::OpenAI => {
                let client = self.build_openai_client(api_key)?;
                prompt_stage!(client, model, system_prompt, user_prompt, "OpenAI", tools)
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_stage!(client, model, system_prompt, user_prompt, "Gemini", tools)
            }
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                prompt_stage!(client, model, system_prompt, user_prompt, "DeepSeek", tools)
            }
            ProviderName::Groq => {
                let client = new_client!(providers::groq::Client, api_key, "Groq")?;
                prompt_stage!(client, model, system_prompt, user_prompt, "Groq", tools)
            }
            ProviderName::OpenAICompatible => {
                let base_url = self.require_base_url()?;
                let client: providers::openai::CompletionsClient =
                    providers::openai::CompletionsClient::builder()
                        .api_key(api_key)
                        .base_url(base_url)
                        .build()
                        .map_err(|e| {
                            ProviderError::ApiError(format!(
                                "failed to create OpenAI-compatible client: {e}"
                            ))
                        })?;
                prompt_stage!(
                    client,
                    model,
                    system_prompt,
                    user_prompt,
                    "OpenAI-compatible",
                    tools
                )
            }
        }
    }
}

#[async_trait]
impl InferenceProvider for RigProvider {
    async fn invoke(
        &self,
        stage: &StageDefinition,
        task: &str,
        prior_turns: &[Turn],
        tools: Option<&LocatorTools>,
    ) -> Result<ChunkStream, ProviderError> {
        let tools = if stage.tools { tools } else { None };
        let user_prompt = build_user_prompt(task, prior_turns);
        tracing::debug!(
            stage = %stage.id,
            provider = %self.config.name,
            model = %self.config.model,
            tools = tools.is_some(),
            "invoking stage"
        );

        let response = self
            .call_rig(&stage.instructions, &user_prompt, tools)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    stage = %stage.id,
                    transient = is_retryable(e),
                    "{}",
                    classify_error(e).unwrap_or("stage inference failed")
                );
            })?;

        let mut events = Vec::with_capacity(2);
        if !response.is_empty() {
            events.push(Ok(InferenceEvent::Chunk(response)));
        }
        events.push(Ok(InferenceEvent::EndOfTurn));
        Ok(futures::stream::iter(events).boxed())
    }
}

/// Compose the user message: the task payload followed by what earlier
/// stages said in this run.
fn build_user_prompt(task: &str, prior_turns: &[Turn]) -> String {
    let mut prompt = format!("## Task\n\n{task}\n");
    let spoken: Vec<&Turn> = prior_turns
        .iter()
        .filter(|t| t.role == TurnRole::Assistant && !t.content.trim().is_empty())
        .collect();
    if !spoken.is_empty() {
        prompt.push_str("\n## Earlier stage outputs\n");
        for turn in spoken {
            prompt.push_str(&format!("\n### {}\n\n{}\n", turn.source, turn.content.trim()));
        }
    }
    prompt
}

/// Error text markers of a transient stage failure, with the summary
/// logged for them. First hit wins.
const TRANSIENT_MARKERS: &[(&[&str], &str)] = &[
    (&["429", "rate limit", "too many requests"], "stage turn rate limited"),
    (&["503", "service unavailable", "high demand"], "model busy, stage turn refused"),
    (&["529", "overloaded"], "provider overloaded during stage turn"),
    (&["502", "bad gateway"], "provider gateway failed mid turn"),
    (&["timeout", "timed out"], "stage turn timed out"),
    (&["connection", "reset by peer"], "stage stream lost its connection"),
    (&["temporarily", "try again"], "provider asked for a later retry"),
];

/// Whether a retry of the same stage turn could succeed.
pub fn is_retryable(err: &ProviderError) -> bool {
    classify_error(err).is_some()
}

/// Short summary of a transient failure, `None` for permanent ones.
pub fn classify_error(err: &ProviderError) -> Option<&'static str> {
    let (ProviderError::ApiError(msg) | ProviderError::StreamError(msg)) = err else {
        return None;
    };
    let msg = msg.to_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| msg.contains(m)))
        .map(|(_, summary)| *summary)
}
