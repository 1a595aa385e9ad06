use crate::llm::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted during a streaming completion or task execution.
///
/// These let consumers display partial output as it arrives before the final
/// aggregated response is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A chunk of text content from the assistant.
    TextDelta { text: String },

    /// Token usage reported by the provider.
    Usage { usage: Usage },

    /// The stream has finished successfully.
    Done,

    /// An error occurred during streaming.
    Error { message: String },
}
