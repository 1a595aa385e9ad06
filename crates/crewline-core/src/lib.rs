//! Core types and error definitions for the Crewline orchestrator.
//!
//! This crate provides the foundational types shared across all Crewline crates:
//! the unified error type, the agent/task/pipeline data model, completion
//! messages, and the in-process event bus.
//!
//! # Main types
//!
//! - [`CrewlineError`]: Unified error enum for all Crewline subsystems.
//! - [`CrewlineResult`]: Convenience alias for `Result<T, CrewlineError>`.
//! - [`Agent`], [`Task`], [`Pipeline`]: The orchestrated entities.
//! - [`Message`]: A single message sent to a completion backend.
//! - [`EventBus`]: Synchronous pub/sub for state-transition events.

/// In-process event bus and event payloads.
pub mod events;
/// Completion message types.
pub mod message;
/// Pipeline model (stages, status, default stage chain).
pub mod pipeline;
/// Agent and task model.
pub mod types;

pub use events::{EventBus, EventPayload, ListenerId, OrchestratorEvent};
pub use message::{Message, Role};
pub use pipeline::{
    default_stages, Pipeline, PipelineId, PipelineSpec, PipelineStage, PipelineStatus,
};
pub use types::{
    Agent, AgentId, AgentMetrics, AgentRole, AgentSettings, AgentStatus, NewTask,
    OrchestratorStatus, PipelineRef, Task, TaskId, TaskPriority, TaskResult, TaskStatus,
    TaskType,
};

// --- Error types ---

/// Top-level error type for the Crewline orchestrator.
///
/// Lookup and state-transition failures are surfaced to callers; task
/// execution failures are normally captured into a [`TaskResult`] instead.
#[derive(Debug, thiserror::Error)]
pub enum CrewlineError {
    /// An unknown task, agent or pipeline id was referenced.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind ("Task", "Agent", "Pipeline").
        kind: &'static str,
        /// The id that could not be resolved.
        id: String,
    },

    /// Assignment could not find an idle agent of the requested role.
    #[error("No idle agent available for role '{0}'")]
    NoIdleAgent(AgentRole),

    /// The requested operation conflicts with the current state.
    #[error("Operation conflict: {0}")]
    OperationConflict(String),

    /// An agent failed to execute its task.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// An error from a completion backend.
    #[error("LLM error: {0}")]
    Llm(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrewlineError {
    /// Shorthand for a missing task.
    pub fn task_not_found(id: TaskId) -> Self {
        Self::NotFound {
            kind: "Task",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing agent.
    pub fn agent_not_found(id: AgentId) -> Self {
        Self::NotFound {
            kind: "Agent",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing pipeline.
    pub fn pipeline_not_found(id: PipelineId) -> Self {
        Self::NotFound {
            kind: "Pipeline",
            id: id.to_string(),
        }
    }
}

/// A convenience `Result` alias using [`CrewlineError`].
pub type CrewlineResult<T> = Result<T, CrewlineError>;
