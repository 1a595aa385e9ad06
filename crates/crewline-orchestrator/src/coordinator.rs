//! Agent lifecycle and the single-task dispatch primitive.

use crate::engine::{Orchestrator, OrchestratorState};
use crewline_agent::{strategy_for, DependencyOutput, ExecutionContext, ExecutionResult};
use crewline_core::{
    Agent, AgentId, AgentRole, CrewlineError, CrewlineResult, EventPayload, Pipeline,
    PipelineStatus, Task, TaskId, TaskResult, TaskStatus,
};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Per-agent settings that replace the role defaults on creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOverrides {
    pub name: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
    pub capabilities: Option<Vec<String>>,
}

impl AgentOverrides {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Outcome of claiming a task for execution under the state lock.
enum Claim {
    Run {
        agent: Agent,
        task: Task,
        context: ExecutionContext,
        stage_started: Option<Pipeline>,
    },
    /// The assignee no longer exists; the task was finished with an error.
    Orphaned { task: Task, result: TaskResult },
}

impl Orchestrator {
    /// Create one agent for every role and announce the fleet.
    pub fn initialize(&self) -> Vec<AgentId> {
        let ids: Vec<AgentId> = AgentRole::ALL
            .iter()
            .map(|role| self.create_agent(*role, AgentOverrides::default()))
            .collect();

        let status = self.status();
        let roles: Vec<String> = AgentRole::ALL.iter().map(ToString::to_string).collect();
        info!(agents = ids.len(), "Agent fleet initialized");
        self.emit(EventPayload::StatusChange {
            from: Some(status),
            to: status,
            message: Some(format!(
                "Initialized {} agents: {}",
                ids.len(),
                roles.join(", ")
            )),
        });
        ids
    }

    /// Register a new idle agent. Role defaults apply wherever `overrides` is empty.
    pub fn create_agent(&self, role: AgentRole, overrides: AgentOverrides) -> AgentId {
        let strategy = strategy_for(role);
        let mut settings = strategy.default_settings();
        if let Some(temperature) = overrides.temperature {
            settings.temperature = temperature;
        }
        if let Some(max_tokens) = overrides.max_tokens {
            settings.max_tokens = max_tokens;
        }
        settings.model = overrides.model;

        let name = overrides.name.unwrap_or_else(|| role.title().to_string());
        let capabilities = overrides
            .capabilities
            .unwrap_or_else(|| strategy.capabilities());
        let agent = Agent::new(name, role, settings).with_capabilities(capabilities);
        let id = agent.id;

        self.state.write().agents.register(agent.clone());
        info!(agent_id = %id, role = %role, name = %agent.name, "Agent created");
        self.emit(EventPayload::AgentCreated { agent });
        id
    }

    /// Deregister an agent. Fails while the agent has a task in flight.
    pub fn remove_agent(&self, agent_id: AgentId) -> CrewlineResult<()> {
        let removed = {
            let mut state = self.state.write();
            if state.agent_busy(agent_id) {
                return Err(CrewlineError::OperationConflict(format!(
                    "Cannot remove agent {agent_id}: it has a task in progress"
                )));
            }
            state.agents.remove(agent_id)
        };

        match removed {
            Some(agent) => {
                info!(agent_id = %agent_id, role = %agent.role, "Agent removed");
                self.emit(EventPayload::AgentRemoved { agent_id });
            }
            None => debug!(agent_id = %agent_id, "Remove ignored, agent not registered"),
        }
        Ok(())
    }

    pub fn get_agent(&self, agent_id: AgentId) -> Option<Agent> {
        self.state.read().agents.get(agent_id).cloned()
    }

    pub fn get_agents(&self) -> Vec<Agent> {
        self.state.read().agents.agents().to_vec()
    }

    /// Run one task on its assigned agent and record the outcome.
    ///
    /// Does nothing unless the task exists, is pending, has an assignee that
    /// is not running another task, and is not already executing. The outcome, success or failure, always
    /// finishes the task and frees the agent; an executor panic is caught and
    /// leaves the agent in the error state.
    pub async fn execute_task(&self, task_id: TaskId) {
        let Some(claim) = self.claim(task_id) else {
            return;
        };

        let (agent, task, context, stage_started) = match claim {
            Claim::Orphaned { task, result } => {
                warn!(task_id = %task_id, assignee = ?task.assignee, "Assigned agent no longer exists, failing task");
                let pipeline = task.pipeline;
                self.emit(EventPayload::TaskFailed {
                    task,
                    result: result.clone(),
                });
                if let Some(stage) = pipeline {
                    self.on_stage_finished(stage, &result);
                }
                self.signal();
                return;
            }
            Claim::Run {
                agent,
                task,
                context,
                stage_started,
            } => (agent, task, context, stage_started),
        };

        if let Some(pipeline) = stage_started {
            let stage_index = pipeline.current_stage_index;
            self.emit(EventPayload::PipelineStageStarted {
                pipeline,
                stage_index,
            });
        }
        info!(task_id = %task_id, agent_id = %agent.id, role = %agent.role, "Task started");
        self.emit(EventPayload::TaskStarted {
            task: task.clone(),
            agent_id: agent.id,
        });

        let started = Instant::now();
        let outcome = AssertUnwindSafe(self.executor.execute(&agent, &task, &context))
            .catch_unwind()
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (execution, panicked) = match outcome {
            Ok(execution) => (execution, false),
            Err(payload) => (
                ExecutionResult::failure(format!(
                    "executor panicked: {}",
                    panic_message(payload.as_ref())
                )),
                true,
            ),
        };

        let result = TaskResult {
            success: execution.success,
            error: match (execution.success, execution.error) {
                (false, None) => Some("execution failed".to_string()),
                (_, error) => error,
            },
            output: execution.output,
            tokens_used: execution.tokens_used,
            duration_ms,
            agent_id: Some(agent.id),
        };

        let finished = {
            let mut state = self.state.write();
            state.active.remove(&task_id);
            state
                .agents
                .record(agent.id, result.success, result.tokens_used, duration_ms);
            if panicked {
                state.agents.mark_error(agent.id);
            } else {
                state.agents.mark_idle(agent.id);
            }
            state
                .queue
                .finish(task_id, TaskStatus::Complete, Some(result.clone()))
                .cloned()
        };

        let Some(finished) = finished else {
            warn!(task_id = %task_id, "Executed task vanished from the queue");
            self.signal();
            return;
        };
        let pipeline = finished.pipeline;

        if result.success {
            info!(task_id = %task_id, duration_ms, tokens = result.tokens_used, "Task completed");
            self.emit(EventPayload::TaskCompleted {
                task: finished,
                result: result.clone(),
            });
        } else {
            error!(
                task_id = %task_id,
                agent_id = %agent.id,
                panicked,
                error = result.error.as_deref().unwrap_or_default(),
                "Task failed"
            );
            self.emit(EventPayload::TaskFailed {
                task: finished,
                result: result.clone(),
            });
        }

        if let Some(stage) = pipeline {
            self.on_stage_finished(stage, &result);
        }
        self.signal();
    }

    /// Mark a dispatchable task as running and build its execution context.
    fn claim(&self, task_id: TaskId) -> Option<Claim> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let task = state.queue.get(task_id)?;
        if task.status != TaskStatus::Pending || state.active.contains_key(&task_id) {
            debug!(task_id = %task_id, status = ?task.status, "Task not dispatchable");
            return None;
        }
        let agent_id = task.assignee?;
        if state.agent_busy(agent_id) {
            debug!(task_id = %task_id, agent_id = %agent_id, "Assignee busy with another task");
            return None;
        }

        let Some(agent) = state.agents.get(agent_id).cloned() else {
            let result = TaskResult::failure("agent not found");
            let task = state
                .queue
                .finish(task_id, TaskStatus::Complete, Some(result.clone()))
                .cloned()?;
            return Some(Claim::Orphaned { task, result });
        };

        let context = ExecutionContext {
            project: self.config.project.clone(),
            dependency_outputs: dependency_outputs(state, task),
        };
        let task = state.queue.mark_in_progress(task_id)?.clone();
        state.active.insert(task_id, agent.id);
        state.agents.mark_working(agent.id, task_id);

        let stage_started = task.pipeline.and_then(|stage| {
            let pipeline = state.pipeline_mut(stage.pipeline_id)?;
            if pipeline.status != PipelineStatus::Pending
                || pipeline.current_stage_index != stage.stage_index
            {
                return None;
            }
            pipeline.status = PipelineStatus::Running;
            Some(pipeline.clone())
        });

        Some(Claim::Run {
            agent,
            task,
            context,
            stage_started,
        })
    }
}

/// Outputs of the task's dependencies that completed successfully.
fn dependency_outputs(state: &OrchestratorState, task: &Task) -> Vec<DependencyOutput> {
    task.depends_on
        .iter()
        .filter_map(|dep| state.queue.get(*dep))
        .filter(|dep| dep.succeeded())
        .filter_map(|dep| {
            let result = dep.result.as_ref()?;
            Some(DependencyOutput {
                task_id: dep.id,
                title: dep.title.clone(),
                role: result
                    .agent_id
                    .and_then(|id| state.agents.get(id))
                    .map(|a| a.role),
                output: result.output.clone(),
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
