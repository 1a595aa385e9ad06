//! Contracts between the Crewline orchestrator and the AI collaborators it drives.
//!
//! The orchestrator never talks to a model provider directly. It consumes two
//! capabilities defined here:
//!
//! - [`LlmBackend`]: raw chat completion (`complete` / `complete_stream`),
//!   produced per [`ModelConfig`] by a [`BackendFactory`].
//! - [`AgentExecutor`]: "run this task as this agent", returning an
//!   [`ExecutionResult`] value instead of raising.
//!
//! [`LlmExecutor`] bridges the two using the role strategy table in
//! [`strategy`].

/// Model/provider configuration.
pub mod config;
/// Agent execution contract.
pub mod executor;
/// Completion backend contract.
pub mod llm;
/// `AgentExecutor` implementation over a completion backend.
pub mod runner;
/// Role → strategy table (prompts, tools, default settings).
pub mod strategy;
/// Streaming events.
pub mod stream;

pub use config::{LlmProvider, ModelConfig, ModelPricing};
pub use executor::{
    AgentExecutor, DependencyOutput, ExecutionContext, ExecutionResult, ProjectContext,
};
pub use llm::{
    unconfigured_backends, BackendFactory, CompletionOptions, CompletionResponse, LlmBackend,
    StopReason, Usage,
};
pub use runner::LlmExecutor;
pub use strategy::{strategy_for, RoleStrategy};
pub use stream::StreamEvent;
