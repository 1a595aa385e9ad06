//! Synchronous in-process pub/sub for orchestrator state transitions.
//!
//! Every mutation of agents, tasks, pipelines or the scheduler status is
//! published as an [`OrchestratorEvent`]. Listeners run on the emitting thread
//! in subscription order; a panicking listener is isolated and does not
//! prevent delivery to the remaining listeners.

use crate::pipeline::Pipeline;
use crate::types::{Agent, AgentId, OrchestratorStatus, Task, TaskResult};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Typed payload of an event. The serde tag doubles as the event name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    StatusChange {
        from: Option<OrchestratorStatus>,
        to: OrchestratorStatus,
        #[serde(default)]
        message: Option<String>,
    },
    AgentCreated {
        agent: Agent,
    },
    AgentRemoved {
        agent_id: AgentId,
    },
    TaskCreated {
        task: Task,
    },
    TaskAssigned {
        task: Task,
        agent_id: AgentId,
    },
    TaskStarted {
        task: Task,
        agent_id: AgentId,
    },
    TaskCompleted {
        task: Task,
        result: TaskResult,
    },
    TaskFailed {
        task: Task,
        result: TaskResult,
    },
    TaskCancelled {
        task: Task,
    },
    PipelineCreated {
        pipeline: Pipeline,
    },
    PipelineStageStarted {
        pipeline: Pipeline,
        stage_index: usize,
    },
    PipelineStageCompleted {
        pipeline: Pipeline,
        stage_index: usize,
    },
    PipelineAwaitingApproval {
        pipeline: Pipeline,
        stage_index: usize,
    },
    PipelineApprovalReceived {
        pipeline: Pipeline,
        stage_index: usize,
    },
    PipelineCompleted {
        pipeline: Pipeline,
    },
    PipelineFailed {
        pipeline: Pipeline,
        error: String,
    },
    PipelineCancelled {
        pipeline: Pipeline,
    },
}

impl EventPayload {
    /// Wire name of the event, e.g. `"task_created"`.
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::StatusChange { .. } => "status_change",
            EventPayload::AgentCreated { .. } => "agent_created",
            EventPayload::AgentRemoved { .. } => "agent_removed",
            EventPayload::TaskCreated { .. } => "task_created",
            EventPayload::TaskAssigned { .. } => "task_assigned",
            EventPayload::TaskStarted { .. } => "task_started",
            EventPayload::TaskCompleted { .. } => "task_completed",
            EventPayload::TaskFailed { .. } => "task_failed",
            EventPayload::TaskCancelled { .. } => "task_cancelled",
            EventPayload::PipelineCreated { .. } => "pipeline_created",
            EventPayload::PipelineStageStarted { .. } => "pipeline_stage_started",
            EventPayload::PipelineStageCompleted { .. } => "pipeline_stage_completed",
            EventPayload::PipelineAwaitingApproval { .. } => "pipeline_awaiting_approval",
            EventPayload::PipelineApprovalReceived { .. } => "pipeline_approval_received",
            EventPayload::PipelineCompleted { .. } => "pipeline_completed",
            EventPayload::PipelineFailed { .. } => "pipeline_failed",
            EventPayload::PipelineCancelled { .. } => "pipeline_cancelled",
        }
    }
}

/// A timestamped event delivered to listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl OrchestratorEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&OrchestratorEvent) + Send + Sync>;

/// Fan-out of events to registered listeners. Cloning shares the listener set.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<RwLock<Vec<(ListenerId, Listener)>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It receives every event emitted after this call.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Timestamp `payload` and deliver it to every listener.
    pub fn emit(&self, payload: EventPayload) {
        let event = OrchestratorEvent::new(payload);
        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        tracing::trace!(event = event.kind(), listeners = listeners.len(), "Emitting event");

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                tracing::warn!(event = event.kind(), "Event listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
