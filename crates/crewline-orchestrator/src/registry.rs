use crewline_core::{Agent, AgentId, AgentRole, AgentStatus, TaskId};

/// Owns the agent fleet and each agent's status and metrics.
///
/// Agents are kept in registration order; [`first_idle`](Self::first_idle)
/// relies on it to break ties between idle agents of the same role.
#[derive(Debug, Default, Clone)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: Agent) -> AgentId {
        let id = agent.id;
        self.agents.push(agent);
        id
    }

    /// Deregister an agent, returning it if it was present.
    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        let index = self.agents.iter().position(|a| a.id == id)?;
        Some(self.agents.remove(index))
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    /// The earliest registered idle agent with `role`.
    pub fn first_idle(&self, role: AgentRole) -> Option<&Agent> {
        self.agents.iter().find(|a| a.role == role && a.is_idle())
    }

    pub fn by_role(&self, role: AgentRole) -> impl Iterator<Item = &Agent> {
        self.agents.iter().filter(move |a| a.role == role)
    }

    /// Mark an agent as working on a task.
    pub fn mark_working(&mut self, id: AgentId, task_id: TaskId) -> bool {
        self.set_status(id, AgentStatus::Working, Some(task_id))
    }

    /// Mark an agent as idle (task completed or failed).
    pub fn mark_idle(&mut self, id: AgentId) -> bool {
        self.set_status(id, AgentStatus::Idle, None)
    }

    /// Put an agent into the error state after its executor crashed.
    ///
    /// The state only lasts until the agent's next run: [`first_idle`](Self::first_idle)
    /// skips it, but tasks assigned earlier are still dispatched and the
    /// next success marks it idle again.
    pub fn mark_error(&mut self, id: AgentId) -> bool {
        self.set_status(id, AgentStatus::Error, None)
    }

    fn set_status(&mut self, id: AgentId, status: AgentStatus, task: Option<TaskId>) -> bool {
        match self.get_mut(id) {
            Some(agent) => {
                agent.status = status;
                agent.current_task = task;
                true
            }
            None => false,
        }
    }

    /// Record the outcome of one execution in the agent's metrics.
    pub fn record(&mut self, id: AgentId, success: bool, tokens: u64, duration_ms: u64) -> bool {
        match self.get_mut(id) {
            Some(agent) => {
                agent.metrics.record(success, tokens, duration_ms);
                true
            }
            None => false,
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
