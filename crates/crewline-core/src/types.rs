use crate::pipeline::PipelineId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an agent.
pub type AgentId = Uuid;
/// Identifier of a task.
pub type TaskId = Uuid;

/// Fixed role of each agent in the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Designs the solution and writes the technical plan.
    Architect,
    /// Writes the code.
    Implementer,
    /// Reviews code for quality and security.
    Reviewer,
    /// Writes and runs tests.
    Tester,
}

impl AgentRole {
    /// The default fleet, in registration order.
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Architect,
        AgentRole::Implementer,
        AgentRole::Reviewer,
        AgentRole::Tester,
    ];

    /// Human-readable title used for default agent names.
    pub fn title(&self) -> &'static str {
        match self {
            AgentRole::Architect => "Architect",
            AgentRole::Implementer => "Implementer",
            AgentRole::Reviewer => "Reviewer",
            AgentRole::Tester => "Tester",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Architect => write!(f, "architect"),
            AgentRole::Implementer => write!(f, "implementer"),
            AgentRole::Reviewer => write!(f, "reviewer"),
            AgentRole::Tester => write!(f, "tester"),
        }
    }
}

/// Availability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Free to take new assignments.
    Idle,
    /// Currently executing a task.
    Working,
    /// The agent's last execution crashed. It takes no new assignments;
    /// tasks already assigned to it still run, and a successful run returns
    /// it to `Idle`.
    Error,
}

/// Model settings an agent runs with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Overrides the orchestrator's configured model id when set.
    #[serde(default)]
    pub model: Option<String>,
}

/// Running metrics per agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tokens_used: u64,
    pub duration_ms: u64,
    /// Share of successful executions in `0.0..=1.0`; `1.0` before the first run.
    pub success_rate: f64,
}

impl AgentMetrics {
    /// Fold one finished execution into the metrics.
    pub fn record(&mut self, success: bool, tokens: u64, duration_ms: u64) {
        if success {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        self.tokens_used += tokens;
        self.duration_ms += duration_ms;
        let total = self.tasks_completed + self.tasks_failed;
        self.success_rate = self.tasks_completed as f64 / total as f64;
    }
}

/// An agent in the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub role: AgentRole,
    pub status: AgentStatus,
    /// Tool names this agent may use.
    pub capabilities: Vec<String>,
    pub settings: AgentSettings,
    pub current_task: Option<TaskId>,
    pub metrics: AgentMetrics,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, role: AgentRole, settings: AgentSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role,
            status: AgentStatus::Idle,
            capabilities: Vec::new(),
            settings,
            current_task: None,
            metrics: AgentMetrics {
                success_rate: 1.0,
                ..AgentMetrics::default()
            },
            created_at: Utc::now(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }
}

/// Kind of work a task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Architecture,
    Implementation,
    Review,
    Testing,
    Documentation,
    Research,
}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    /// Finished. Inspect [`Task::result`] for success or failure.
    Complete,
    Cancelled,
}

impl TaskStatus {
    /// Complete and cancelled tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Cancelled)
    }
}

/// Scheduling priority; higher priorities are dispatched first among ready tasks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Outcome of one task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub agent_id: Option<AgentId>,
}

impl TaskResult {
    /// A failed result that never reached an agent.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            tokens_used: 0,
            duration_ms: 0,
            agent_id: None,
        }
    }
}

/// Back-reference from a task to the pipeline stage that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub pipeline_id: PipelineId,
    pub stage_index: usize,
}

/// Input for creating a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub task_type: TaskType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    /// When set (and auto-assignment is enabled) the task is assigned on creation.
    #[serde(default)]
    pub assignee_role: Option<AgentRole>,
}

impl NewTask {
    pub fn new(task_type: TaskType, title: impl Into<String>) -> Self {
        Self {
            task_type,
            title: title.into(),
            description: String::new(),
            depends_on: Vec::new(),
            priority: None,
            acceptance_criteria: Vec::new(),
            assignee_role: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.depends_on = deps;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    pub fn assign_to(mut self, role: AgentRole) -> Self {
        self.assignee_role = Some(role);
        self
    }
}

/// A unit of work executed by one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub title: String,
    pub description: String,
    /// `None` means unassigned.
    pub assignee: Option<AgentId>,
    pub depends_on: Vec<TaskId>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub pipeline: Option<PipelineRef>,
    #[serde(default)]
    pub result: Option<TaskResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a pending, unassigned task from caller input.
    pub fn new(input: NewTask) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_type: input.task_type,
            title: input.title,
            description: input.description,
            assignee: None,
            depends_on: input.depends_on,
            status: TaskStatus::Pending,
            priority: input.priority.unwrap_or_default(),
            acceptance_criteria: input.acceptance_criteria,
            pipeline: None,
            result: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.assignee.is_some()
    }

    /// True once the task finished and its execution succeeded.
    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Complete && self.result.as_ref().is_some_and(|r| r.success)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Status of the orchestrator's scheduler loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

impl std::fmt::Display for OrchestratorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorStatus::Idle => write!(f, "idle"),
            OrchestratorStatus::Running => write!(f, "running"),
            OrchestratorStatus::Paused => write!(f, "paused"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn settings() -> AgentSettings {
        AgentSettings {
            temperature: 0.2,
            max_tokens: 4096,
            model: None,
        }
    }

    #[test]
    fn test_task_creation_defaults() {
        let task = Task::new(NewTask::new(TaskType::Implementation, "Implement auth"));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert!(!task.is_assigned());
        assert!(task.depends_on.is_empty());
        assert!(task.result.is_none());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Medium);
        assert!(TaskPriority::Medium > TaskPriority::Low);
    }

    #[test]
    fn test_agent_role_display() {
        assert_eq!(AgentRole::Architect.to_string(), "architect");
        assert_eq!(AgentRole::Implementer.to_string(), "implementer");
        assert_eq!(AgentRole::Tester.title(), "Tester");
    }

    #[test]
    fn test_agent_metrics_success_rate() {
        let mut agent = Agent::new("Coder", AgentRole::Implementer, settings());
        assert_eq!(agent.metrics.success_rate, 1.0);

        agent.metrics.record(true, 100, 10);
        agent.metrics.record(false, 50, 5);
        assert_eq!(agent.metrics.tasks_completed, 1);
        assert_eq!(agent.metrics.tasks_failed, 1);
        assert_eq!(agent.metrics.tokens_used, 150);
        assert_eq!(agent.metrics.duration_ms, 15);
        assert!((agent.metrics.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_task_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn test_succeeded_requires_successful_result() {
        let mut task = Task::new(NewTask::new(TaskType::Testing, "Test"));
        task.status = TaskStatus::Complete;
        task.result = Some(TaskResult::failure("boom"));
        assert!(!task.succeeded());
    }
}
