use crate::config::OrchestratorConfig;
use crate::registry::AgentRegistry;
use crate::task_queue::TaskQueue;
use crate::variants::VariantResult;
use crewline_agent::{unconfigured_backends, AgentExecutor, BackendFactory, LlmExecutor};
use crewline_core::{
    Agent, AgentId, EventBus, EventPayload, ListenerId, OrchestratorEvent, OrchestratorStatus,
    Pipeline, PipelineId, Task, TaskId,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

/// All mutable orchestration state, guarded by a single lock.
#[derive(Debug, Default)]
pub(crate) struct OrchestratorState {
    pub(crate) status: OrchestratorStatus,
    pub(crate) agents: AgentRegistry,
    pub(crate) queue: TaskQueue,
    /// Task id → agent id for every task currently executing.
    pub(crate) active: HashMap<TaskId, AgentId>,
    pub(crate) pipelines: Vec<Pipeline>,
    pub(crate) variants: HashMap<Uuid, VariantResult>,
}

impl OrchestratorState {
    pub(crate) fn pipeline(&self, id: PipelineId) -> Option<&Pipeline> {
        self.pipelines.iter().find(|p| p.id == id)
    }

    pub(crate) fn pipeline_mut(&mut self, id: PipelineId) -> Option<&mut Pipeline> {
        self.pipelines.iter_mut().find(|p| p.id == id)
    }

    /// Whether `agent_id` is executing any task right now.
    pub(crate) fn agent_busy(&self, agent_id: AgentId) -> bool {
        self.active.values().any(|a| *a == agent_id)
    }
}

/// Point-in-time copy of the orchestrator state returned by
/// [`Orchestrator::get_state`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSnapshot {
    pub status: OrchestratorStatus,
    pub agents: Vec<Agent>,
    pub pending_tasks: Vec<Task>,
    pub completed_tasks: Vec<Task>,
    pub active_tasks: HashMap<TaskId, AgentId>,
    pub pipelines: Vec<Pipeline>,
}

/// The orchestration engine.
///
/// One instance owns the agent fleet, the task queue, pipelines and variant
/// results. Operations are grouped by concern across this crate's modules
/// (assignment, coordination, scheduling, pipelines, variants), all as
/// methods on this type. Share it behind an [`Arc`] to drive the scheduler
/// loop from a background task while issuing commands from elsewhere.
pub struct Orchestrator {
    pub(crate) config: OrchestratorConfig,
    pub(crate) state: RwLock<OrchestratorState>,
    pub(crate) events: EventBus,
    /// Raised whenever dispatchability may have changed.
    pub(crate) wake: Notify,
    /// Set while a scheduler loop is running.
    pub(crate) loop_active: AtomicBool,
    pub(crate) executor: Arc<dyn AgentExecutor>,
    pub(crate) backends: BackendFactory,
}

impl Orchestrator {
    /// Create an orchestrator with no completion backend configured.
    ///
    /// Task executions and variant generation fail with an explanatory error
    /// until a backend factory or executor is supplied.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_backend_factory(config, unconfigured_backends())
    }

    /// Create an orchestrator whose agents run through [`LlmExecutor`] on
    /// backends produced by `factory`.
    pub fn with_backend_factory(config: OrchestratorConfig, factory: BackendFactory) -> Self {
        let executor = Arc::new(LlmExecutor::new(config.model.clone(), factory.clone()));
        Self {
            config,
            state: RwLock::new(OrchestratorState::default()),
            events: EventBus::new(),
            wake: Notify::new(),
            loop_active: AtomicBool::new(false),
            executor,
            backends: factory,
        }
    }

    /// Replace the task executor.
    pub fn with_executor(mut self, executor: Arc<dyn AgentExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The bus every state transition is published on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn status(&self) -> OrchestratorStatus {
        self.state.read().status
    }

    /// Copy of the full state. Never a view into the live state.
    pub fn get_state(&self) -> OrchestratorSnapshot {
        let state = self.state.read();
        OrchestratorSnapshot {
            status: state.status,
            agents: state.agents.agents().to_vec(),
            pending_tasks: state.queue.pending().to_vec(),
            completed_tasks: state.queue.completed().to_vec(),
            active_tasks: state.active.clone(),
            pipelines: state.pipelines.clone(),
        }
    }

    pub fn active_count(&self) -> usize {
        self.state.read().active.len()
    }

    /// Publish an event. Callers must not hold the state lock.
    pub(crate) fn emit(&self, payload: EventPayload) {
        self.events.emit(payload);
    }

    /// Let the scheduler loop re-evaluate.
    pub(crate) fn signal(&self) {
        self.wake.notify_one();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Orchestrator")
            .field("status", &state.status)
            .field("agents", &state.agents.len())
            .field("pending", &state.queue.pending_count())
            .field("completed", &state.queue.completed_count())
            .field("active", &state.active.len())
            .field("pipelines", &state.pipelines.len())
            .finish()
    }
}
