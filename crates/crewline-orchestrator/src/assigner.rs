//! Task creation, assignment and cancellation.

use crate::engine::Orchestrator;
use crewline_core::{
    AgentRole, CrewlineError, CrewlineResult, EventPayload, NewTask, PipelineRef, Task, TaskId,
    TaskStatus,
};
use tracing::{debug, info, warn};

impl Orchestrator {
    /// Enqueue a new pending task and return its id.
    ///
    /// When `input.assignee_role` is set and auto-assignment is enabled, the
    /// task is assigned immediately. A failed automatic assignment leaves the
    /// task unassigned and is only logged.
    pub fn create_task(&self, input: NewTask) -> TaskId {
        let assign = self.config.auto_assign;
        self.create_task_with(input, None, assign)
    }

    pub(crate) fn create_task_with(
        &self,
        input: NewTask,
        pipeline: Option<PipelineRef>,
        assign: bool,
    ) -> TaskId {
        let role = input.assignee_role;
        let mut task = Task::new(input);
        task.pipeline = pipeline;
        let id = task.id;

        self.state.write().queue.push(task.clone());
        info!(task_id = %id, title = %task.title, priority = ?task.priority, "Task created");
        self.emit(EventPayload::TaskCreated { task });

        if let (Some(role), true) = (role, assign) {
            if let Err(e) = self.assign_task(id, role) {
                warn!(task_id = %id, role = %role, error = %e, "Automatic assignment failed, task left unassigned");
            }
        }
        self.signal();
        id
    }

    /// Assign a pending task to the first idle agent with `role`.
    ///
    /// Reassigning an already assigned pending task is allowed.
    pub fn assign_task(&self, task_id: TaskId, role: AgentRole) -> CrewlineResult<()> {
        let (task, agent_id) = {
            let mut guard = self.state.write();
            let state = &mut *guard;

            let status = state
                .queue
                .get(task_id)
                .map(|t| t.status)
                .ok_or_else(|| CrewlineError::task_not_found(task_id))?;
            if status != TaskStatus::Pending {
                return Err(CrewlineError::OperationConflict(format!(
                    "Cannot assign task {task_id}: task is {status:?}"
                )));
            }

            let agent_id = state
                .agents
                .first_idle(role)
                .map(|a| a.id)
                .ok_or(CrewlineError::NoIdleAgent(role))?;

            let task = state
                .queue
                .pending_mut(task_id)
                .ok_or_else(|| CrewlineError::task_not_found(task_id))?;
            task.assignee = Some(agent_id);
            task.touch();
            (task.clone(), agent_id)
        };

        info!(task_id = %task_id, agent_id = %agent_id, role = %role, "Task assigned");
        self.emit(EventPayload::TaskAssigned { task, agent_id });
        self.signal();
        Ok(())
    }

    /// Cancel a task that has not started.
    ///
    /// Tasks depending on it become blocked. Cancelling a finished task is a
    /// no-op; a running task cannot be cancelled.
    pub fn cancel_task(&self, task_id: TaskId) -> CrewlineResult<()> {
        let task = {
            let mut state = self.state.write();
            let status = state
                .queue
                .get(task_id)
                .map(|t| t.status)
                .ok_or_else(|| CrewlineError::task_not_found(task_id))?;
            match status {
                TaskStatus::Pending => {}
                TaskStatus::InProgress => {
                    return Err(CrewlineError::OperationConflict(format!(
                        "Cannot cancel task {task_id}: task is in progress"
                    )));
                }
                TaskStatus::Complete | TaskStatus::Cancelled => {
                    debug!(task_id = %task_id, "Cancel ignored, task already finished");
                    return Ok(());
                }
            }
            state
                .queue
                .finish(task_id, TaskStatus::Cancelled, None)
                .cloned()
                .ok_or_else(|| CrewlineError::task_not_found(task_id))?
        };

        info!(task_id = %task_id, "Task cancelled");
        self.emit(EventPayload::TaskCancelled { task });
        self.signal();
        Ok(())
    }

    pub fn get_task(&self, task_id: TaskId) -> Option<Task> {
        self.state.read().queue.get(task_id).cloned()
    }

    /// All tasks, pending queue first, then finished tasks in completion order.
    pub fn get_tasks(&self) -> Vec<Task> {
        self.state.read().queue.iter().cloned().collect()
    }

    pub fn get_tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.state.read().queue.by_status(status).cloned().collect()
    }
}
