use crate::types::{AgentRole, TaskId, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a pipeline.
pub type PipelineId = Uuid;

/// Lifecycle of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    Running,
    AwaitingApproval,
    Completed,
    Failed,
    Cancelled,
}

impl PipelineStatus {
    /// Terminal pipelines accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Completed | PipelineStatus::Failed | PipelineStatus::Cancelled
        )
    }
}

/// One stage of a pipeline: a single task bound to a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub role: AgentRole,
    pub task_type: TaskType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Explicit approval is required before this stage may start.
    #[serde(default)]
    pub requires_approval: bool,
}

impl PipelineStage {
    pub fn new(role: AgentRole, task_type: TaskType, title: impl Into<String>) -> Self {
        Self {
            role,
            task_type,
            title: title.into(),
            description: String::new(),
            requires_approval: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = requires_approval;
        self
    }
}

/// The default architect → implementer → reviewer → tester chain.
///
/// The first three stages require approval, the last one does not.
pub fn default_stages() -> Vec<PipelineStage> {
    vec![
        PipelineStage::new(AgentRole::Architect, TaskType::Architecture, "Design architecture")
            .with_description("Analyze the requirements and produce a technical design.")
            .with_approval(true),
        PipelineStage::new(
            AgentRole::Implementer,
            TaskType::Implementation,
            "Implement solution",
        )
        .with_description("Implement the approved design.")
        .with_approval(true),
        PipelineStage::new(AgentRole::Reviewer, TaskType::Review, "Review implementation")
            .with_description("Review the implementation for correctness, security and style.")
            .with_approval(true),
        PipelineStage::new(AgentRole::Tester, TaskType::Testing, "Test implementation")
            .with_description("Write and run tests covering the implementation.")
            .with_approval(false),
    ]
}

/// Input for creating a pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `None` (or an empty list) selects [`default_stages`].
    #[serde(default)]
    pub stages: Option<Vec<PipelineStage>>,
}

impl PipelineSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_stages(mut self, stages: Vec<PipelineStage>) -> Self {
        self.stages = Some(stages);
        self
    }
}

/// A linear chain of tasks with optional approval gates between stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub name: String,
    pub description: String,
    pub stages: Vec<PipelineStage>,
    /// One task per stage, index-aligned with `stages`.
    pub task_ids: Vec<TaskId>,
    pub current_stage_index: usize,
    pub status: PipelineStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Pipeline {
    pub fn current_stage(&self) -> Option<&PipelineStage> {
        self.stages.get(self.current_stage_index)
    }

    pub fn current_task(&self) -> Option<TaskId> {
        self.task_ids.get(self.current_stage_index).copied()
    }

    /// Whether the task of `stage_index` may be dispatched right now.
    pub fn admits_stage(&self, stage_index: usize) -> bool {
        matches!(
            self.status,
            PipelineStatus::Pending | PipelineStatus::Running
        ) && self.current_stage_index == stage_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stages_shape() {
        let stages = default_stages();
        let roles: Vec<AgentRole> = stages.iter().map(|s| s.role).collect();
        assert_eq!(roles, AgentRole::ALL.to_vec());
        let approvals: Vec<bool> = stages.iter().map(|s| s.requires_approval).collect();
        assert_eq!(approvals, vec![true, true, true, false]);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(PipelineStatus::Completed.is_terminal());
        assert!(PipelineStatus::Failed.is_terminal());
        assert!(PipelineStatus::Cancelled.is_terminal());
        assert!(!PipelineStatus::AwaitingApproval.is_terminal());
    }

    #[test]
    fn test_admits_only_current_stage_while_open() {
        let mut pipeline = Pipeline {
            id: Uuid::new_v4(),
            name: "p".into(),
            description: String::new(),
            stages: default_stages(),
            task_ids: vec![Uuid::new_v4(); 4],
            current_stage_index: 1,
            status: PipelineStatus::Running,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        assert!(pipeline.admits_stage(1));
        assert!(!pipeline.admits_stage(2));

        pipeline.status = PipelineStatus::AwaitingApproval;
        assert!(!pipeline.admits_stage(1));
    }
}
