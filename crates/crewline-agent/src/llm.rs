use crate::config::{LlmProvider, ModelConfig};
use crate::stream::StreamEvent;
use async_trait::async_trait;
use crewline_core::{CrewlineError, CrewlineResult, Message};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Request-level options for one completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionOptions {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            model: config.model_id.clone(),
            system_prompt: None,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
}

/// Final response of a completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub content: String,
    pub model: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

/// Trait for completion provider backends.
///
/// Provider clients (HTTP APIs, local runtimes) live outside this crate and
/// implement this trait. The orchestrator obtains one per model config through
/// a [`BackendFactory`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Non-streaming chat completion.
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> CrewlineResult<CompletionResponse>;

    /// Streaming chat completion.
    ///
    /// Returns a receiver for stream events and a join handle that resolves
    /// to the final aggregated response. The default implementation performs
    /// a regular completion and replays it as a single delta.
    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> CrewlineResult<(
        mpsc::Receiver<StreamEvent>,
        JoinHandle<CrewlineResult<CompletionResponse>>,
    )> {
        let response = self.complete(messages, options).await?;
        let (tx, rx) = mpsc::channel(3);
        let _ = tx.try_send(StreamEvent::TextDelta {
            text: response.content.clone(),
        });
        let _ = tx.try_send(StreamEvent::Usage {
            usage: response.usage,
        });
        let _ = tx.try_send(StreamEvent::Done);
        let handle = tokio::spawn(async move { Ok(response) });
        Ok((rx, handle))
    }
}

/// Produces the backend serving a given model configuration.
pub type BackendFactory = Arc<dyn Fn(&ModelConfig) -> Arc<dyn LlmBackend> + Send + Sync>;

/// Backend used until a real provider client is wired in; every call fails.
struct UnconfiguredBackend {
    provider: LlmProvider,
}

#[async_trait]
impl LlmBackend for UnconfiguredBackend {
    async fn complete(
        &self,
        _messages: &[Message],
        _options: &CompletionOptions,
    ) -> CrewlineResult<CompletionResponse> {
        Err(CrewlineError::Llm(format!(
            "no completion backend configured for provider '{}'",
            self.provider
        )))
    }
}

/// Factory whose backends fail every call with an explanatory [`CrewlineError::Llm`].
pub fn unconfigured_backends() -> BackendFactory {
    Arc::new(|config: &ModelConfig| {
        Arc::new(UnconfiguredBackend {
            provider: config.provider,
        }) as Arc<dyn LlmBackend>
    })
}
