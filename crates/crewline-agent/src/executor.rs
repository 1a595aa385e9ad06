use crate::stream::StreamEvent;
use async_trait::async_trait;
use crewline_core::{Agent, AgentRole, Task, TaskId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project-level facts every agent receives with its task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectContext {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

/// Output of a completed dependency, handed to the dependent task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyOutput {
    pub task_id: TaskId,
    pub title: String,
    /// Role of the agent that produced the output, if it still exists.
    pub role: Option<AgentRole>,
    pub output: String,
}

/// Everything an executor may use besides the task itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub project: ProjectContext,
    pub dependency_outputs: Vec<DependencyOutput>,
}

/// Result of executing one task. Failures are values, never panics or errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub tokens_used: u64,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(output: impl Into<String>, tokens_used: u64) -> Self {
        Self {
            success: true,
            output: output.into(),
            tokens_used,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            tokens_used: 0,
            error: Some(error.into()),
        }
    }
}

/// The capability that runs a task on behalf of an agent.
///
/// Implementations may take arbitrarily long. They report failure through
/// [`ExecutionResult::failure`] so a failing task never unwinds the scheduler.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, agent: &Agent, task: &Task, context: &ExecutionContext)
        -> ExecutionResult;

    /// Same contract as [`execute`](Self::execute) with incremental events
    /// delivered to `on_event` before the final result.
    async fn execute_stream(
        &self,
        agent: &Agent,
        task: &Task,
        context: &ExecutionContext,
        on_event: &(dyn Fn(StreamEvent) + Send + Sync),
    ) -> ExecutionResult {
        let result = self.execute(agent, task, context).await;
        match &result.error {
            None => {
                on_event(StreamEvent::TextDelta {
                    text: result.output.clone(),
                });
                on_event(StreamEvent::Done);
            }
            Some(message) => on_event(StreamEvent::Error {
                message: message.clone(),
            }),
        }
        result
    }
}
