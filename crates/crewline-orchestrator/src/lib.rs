//! Multi-agent orchestration engine for Crewline.
//!
//! A fleet of role-bound agents (architect, implementer, reviewer, tester)
//! executes user-defined tasks in dependency order under a bounded
//! concurrency limit. Tasks can be chained into approval-gated pipelines, and
//! a single prompt can be fanned out into competing variants.
//!
//! # Main types
//!
//! - [`Orchestrator`]: Owns all state; task, agent, scheduler, pipeline and variant operations.
//! - [`ExecutionPlan`]: Ready/waiting/blocked view of the task graph, see [`plan`].
//! - [`AgentRegistry`]: Agent fleet in registration order.
//! - [`TaskQueue`]: Pending queue and completed list.
//! - [`OrchestratorConfig`]: TOML-backed settings.
//!
//! # Example
//!
//! ```no_run
//! use crewline_core::{AgentRole, NewTask, TaskType};
//! use crewline_orchestrator::{Orchestrator, OrchestratorConfig};
//!
//! # async fn run() {
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default());
//! orchestrator.initialize();
//! let design = orchestrator.create_task(
//!     NewTask::new(TaskType::Architecture, "Design the API").assign_to(AgentRole::Architect),
//! );
//! orchestrator.create_task(
//!     NewTask::new(TaskType::Implementation, "Implement the API")
//!         .with_dependencies(vec![design])
//!         .assign_to(AgentRole::Implementer),
//! );
//! orchestrator.start().await;
//! # }
//! ```

/// Task creation, assignment and cancellation.
pub mod assigner;
/// Orchestrator configuration.
pub mod config;
/// Agent lifecycle and task dispatch.
pub mod coordinator;
/// Orchestrator state and handle.
pub mod engine;
/// Dependency planning and cycle diagnostics.
pub mod graph;
/// Approval-gated pipelines.
pub mod pipeline;
/// Agent fleet bookkeeping.
pub mod registry;
/// Scheduler loop.
pub mod scheduler;
/// Pending and completed task lists.
pub mod task_queue;
/// Variant fan-out and selection.
pub mod variants;

pub use config::OrchestratorConfig;
pub use coordinator::AgentOverrides;
pub use engine::{Orchestrator, OrchestratorSnapshot};
pub use graph::{find_cycle, plan, ExecutionPlan};
pub use registry::AgentRegistry;
pub use task_queue::TaskQueue;
pub use variants::{
    DiversityMode, Variant, VariantRequest, VariantResult, VariantTemplate, VARIANT_TEMPLATES,
};
