use crate::config::ModelConfig;
use crate::executor::{AgentExecutor, ExecutionContext, ExecutionResult};
use crate::llm::{BackendFactory, CompletionOptions, CompletionResponse};
use crate::strategy::strategy_for;
use crate::stream::StreamEvent;
use async_trait::async_trait;
use crewline_core::{Agent, CrewlineError, CrewlineResult, Message, Task};
use tracing::{error, info};

/// Runs tasks by sending a role-framed prompt to a completion backend.
///
/// The agent's own settings override the temperature, token budget and model
/// of the base configuration. The backend is resolved per call through the
/// [`BackendFactory`], so agents with a model override reach their own backend.
pub struct LlmExecutor {
    base: ModelConfig,
    factory: BackendFactory,
}

impl LlmExecutor {
    pub fn new(base: ModelConfig, factory: BackendFactory) -> Self {
        Self { base, factory }
    }

    /// The model configuration used for `agent`.
    pub fn model_config_for(&self, agent: &Agent) -> ModelConfig {
        let mut config = self.base.clone();
        config.temperature = agent.settings.temperature;
        config.max_tokens = agent.settings.max_tokens;
        if let Some(model) = &agent.settings.model {
            config.model_id = model.clone();
        }
        config
    }

    fn request(
        &self,
        agent: &Agent,
        task: &Task,
        context: &ExecutionContext,
    ) -> (ModelConfig, Vec<Message>, CompletionOptions) {
        let config = self.model_config_for(agent);
        let system = strategy_for(agent.role).system_prompt(context);
        let options = CompletionOptions::from_config(&config).with_system_prompt(system);
        let messages = vec![Message::user(task_prompt(task, context))];
        (config, messages, options)
    }

    fn reconcile(
        agent: &Agent,
        task: &Task,
        outcome: CrewlineResult<CompletionResponse>,
    ) -> ExecutionResult {
        match outcome {
            Ok(response) => {
                info!(
                    task_id = %task.id,
                    agent = %agent.name,
                    tokens = response.usage.total(),
                    "Task completion received"
                );
                ExecutionResult::success(response.content, response.usage.total())
            }
            Err(e) => {
                error!(task_id = %task.id, agent = %agent.name, error = %e, "Task completion failed");
                ExecutionResult::failure(e.to_string())
            }
        }
    }
}

/// Builds the user message for a task: title, description, acceptance
/// criteria and the outputs of its completed dependencies.
pub fn task_prompt(task: &Task, context: &ExecutionContext) -> String {
    let mut prompt = format!("# Task: {}\n", task.title);
    if !task.description.is_empty() {
        prompt.push('\n');
        prompt.push_str(&task.description);
        prompt.push('\n');
    }

    if !task.acceptance_criteria.is_empty() {
        prompt.push_str("\n## Acceptance criteria\n");
        for criterion in &task.acceptance_criteria {
            prompt.push_str(&format!("- {criterion}\n"));
        }
    }

    for dep in &context.dependency_outputs {
        let author = dep.role.map(|r| r.title()).unwrap_or("Unknown agent");
        prompt.push_str(&format!(
            "\n## Output of \"{}\" ({})\n{}\n",
            dep.title, author, dep.output
        ));
    }
    prompt
}

#[async_trait]
impl AgentExecutor for LlmExecutor {
    async fn execute(
        &self,
        agent: &Agent,
        task: &Task,
        context: &ExecutionContext,
    ) -> ExecutionResult {
        let (config, messages, options) = self.request(agent, task, context);
        let backend = (self.factory)(&config);
        info!(task_id = %task.id, role = %agent.role, model = %config.model_id, "Executing task");

        let outcome = backend.complete(&messages, &options).await;
        Self::reconcile(agent, task, outcome)
    }

    async fn execute_stream(
        &self,
        agent: &Agent,
        task: &Task,
        context: &ExecutionContext,
        on_event: &(dyn Fn(StreamEvent) + Send + Sync),
    ) -> ExecutionResult {
        let (config, messages, options) = self.request(agent, task, context);
        let backend = (self.factory)(&config);
        info!(task_id = %task.id, role = %agent.role, model = %config.model_id, "Streaming task");

        let (mut rx, handle) = match backend.complete_stream(&messages, &options).await {
            Ok(stream) => stream,
            Err(e) => {
                on_event(StreamEvent::Error {
                    message: e.to_string(),
                });
                return Self::reconcile(agent, task, Err(e));
            }
        };

        while let Some(event) = rx.recv().await {
            on_event(event);
        }

        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(CrewlineError::Llm(format!("stream task aborted: {e}"))),
        };
        if let Err(e) = &outcome {
            on_event(StreamEvent::Error {
                message: e.to_string(),
            });
        }
        Self::reconcile(agent, task, outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::executor::DependencyOutput;
    use crate::llm::{LlmBackend, StopReason, Usage};
    use crewline_core::{AgentRole, NewTask, TaskType};
    use std::sync::{Arc, Mutex};

    /// Last request seen by the echo backend.
    #[derive(Default)]
    struct Recorded {
        model: Option<String>,
        temperature: Option<f32>,
        system: Option<String>,
        user: Option<String>,
    }

    struct EchoBackend {
        seen: Arc<Mutex<Recorded>>,
    }

    #[async_trait]
    impl LlmBackend for EchoBackend {
        async fn complete(
            &self,
            messages: &[Message],
            options: &CompletionOptions,
        ) -> CrewlineResult<CompletionResponse> {
            let mut seen = self.seen.lock().unwrap();
            seen.model = Some(options.model.clone());
            seen.temperature = Some(options.temperature);
            seen.system = options.system_prompt.clone();
            seen.user = messages.first().map(|m| m.content.clone());
            Ok(CompletionResponse {
                id: "r1".into(),
                content: "done".into(),
                model: options.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage {
                    input_tokens: 10,
                    output_tokens: 4,
                },
            })
        }
    }

    fn executor(seen: Arc<Mutex<Recorded>>) -> LlmExecutor {
        let factory: BackendFactory = Arc::new(move |_config: &ModelConfig| {
            Arc::new(EchoBackend { seen: seen.clone() }) as Arc<dyn LlmBackend>
        });
        LlmExecutor::new(ModelConfig::default(), factory)
    }

    fn implementer() -> Agent {
        Agent::new(
            "Implementer",
            AgentRole::Implementer,
            strategy_for(AgentRole::Implementer).default_settings(),
        )
    }

    #[tokio::test]
    async fn test_execute_uses_agent_settings_and_role_prompt() {
        let seen = Arc::new(Mutex::new(Recorded::default()));
        let exec = executor(seen.clone());
        let mut agent = implementer();
        agent.settings.model = Some("custom-model".into());
        let task = Task::new(NewTask::new(TaskType::Implementation, "Add login"));

        let result = exec
            .execute(&agent, &task, &ExecutionContext::default())
            .await;
        assert!(result.success);
        assert_eq!(result.output, "done");
        assert_eq!(result.tokens_used, 14);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.model.as_deref(), Some("custom-model"));
        assert_eq!(seen.temperature, Some(0.2));
        assert!(seen
            .system
            .as_deref()
            .unwrap()
            .starts_with("You are the Implementer agent"));
        assert!(seen.user.as_deref().unwrap().contains("# Task: Add login"));
    }

    #[tokio::test]
    async fn test_unconfigured_backend_yields_failure_value() {
        let exec = LlmExecutor::new(ModelConfig::default(), crate::llm::unconfigured_backends());
        let task = Task::new(NewTask::new(TaskType::Review, "Review"));
        let result = exec
            .execute(&implementer(), &task, &ExecutionContext::default())
            .await;
        assert!(!result.success);
        assert!(result
            .error
            .unwrap()
            .contains("no completion backend configured"));
    }

    #[tokio::test]
    async fn test_execute_stream_forwards_events() {
        let seen = Arc::new(Mutex::new(Recorded::default()));
        let exec = executor(seen);
        let task = Task::new(NewTask::new(TaskType::Testing, "Write tests"));
        let events = Mutex::new(Vec::new());

        let result = exec
            .execute_stream(&implementer(), &task, &ExecutionContext::default(), &|e: StreamEvent| {
                events.lock().unwrap().push(e)
            })
            .await;

        assert!(result.success);
        let events = events.into_inner().unwrap();
        assert_eq!(
            events.first(),
            Some(&StreamEvent::TextDelta {
                text: "done".into()
            })
        );
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[test]
    fn test_task_prompt_includes_criteria_and_dependencies() {
        let task = Task::new(
            NewTask::new(TaskType::Implementation, "Build API")
                .with_description("REST endpoints for invoices")
                .with_acceptance_criteria(vec!["returns 404 for unknown ids".into()]),
        );
        let context = ExecutionContext {
            dependency_outputs: vec![DependencyOutput {
                task_id: uuid::Uuid::new_v4(),
                title: "Design".into(),
                role: Some(AgentRole::Architect),
                output: "Use axum".into(),
            }],
            ..ExecutionContext::default()
        };

        let prompt = task_prompt(&task, &context);
        assert!(prompt.contains("REST endpoints for invoices"));
        assert!(prompt.contains("- returns 404 for unknown ids"));
        assert!(prompt.contains("## Output of \"Design\" (Architect)"));
        assert!(prompt.contains("Use axum"));
    }
}
