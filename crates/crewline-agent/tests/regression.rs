//! Regression tests for crewline-agent: ModelConfig, role strategies, AgentExecutor, LlmExecutor.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use crewline_agent::{
    strategy_for, AgentExecutor, BackendFactory, CompletionOptions, CompletionResponse,
    ExecutionContext, ExecutionResult, LlmBackend, LlmExecutor, LlmProvider, ModelConfig,
    ProjectContext, StopReason, StreamEvent, Usage,
};
use crewline_core::{
    Agent, AgentRole, CrewlineError, CrewlineResult, Message, NewTask, Task, TaskType,
};
use std::sync::{Arc, Mutex};

// --- ModelConfig ---

#[test]
fn test_model_config_from_toml() {
    let config: ModelConfig = toml::from_str(
        r#"
        provider = "openrouter"
        model_id = "anthropic/claude-sonnet-4"
        temperature = 0.5

        [pricing]
        input_per_million_usd = 3.0
        output_per_million_usd = 15.0
        "#,
    )
    .unwrap();

    assert_eq!(config.provider, LlmProvider::OpenRouter);
    assert_eq!(config.model_id, "anthropic/claude-sonnet-4");
    assert_eq!(config.temperature, 0.5);
    assert_eq!(config.max_tokens, 4096);
    assert!(config.pricing.is_some());
}

#[test]
fn test_model_config_rejects_unknown_provider() {
    let result: Result<ModelConfig, _> = toml::from_str(r#"provider = "carrier-pigeon""#);
    assert!(result.is_err());
}

// --- Role strategies ---

#[test]
fn test_role_defaults_become_agent_settings() {
    let strategy = strategy_for(AgentRole::Architect);
    let agent = Agent::new("Architect", AgentRole::Architect, strategy.default_settings())
        .with_capabilities(strategy.capabilities());

    assert_eq!(agent.settings.max_tokens, strategy.default_max_tokens);
    assert!(agent.capabilities.iter().any(|c| c == "read_file"));
    assert!(agent.settings.model.is_none());
}

#[test]
fn test_system_prompt_differs_per_role() {
    let context = ExecutionContext {
        project: ProjectContext {
            name: "crewline".into(),
            ..ProjectContext::default()
        },
        ..ExecutionContext::default()
    };
    let prompts: Vec<String> = AgentRole::ALL
        .iter()
        .map(|role| strategy_for(*role).system_prompt(&context))
        .collect();

    for (i, a) in prompts.iter().enumerate() {
        assert!(a.contains("Name: crewline"));
        for b in prompts.iter().skip(i + 1) {
            assert_ne!(a, b);
        }
    }
}

// --- AgentExecutor default streaming ---

struct FailingExecutor;

#[async_trait]
impl AgentExecutor for FailingExecutor {
    async fn execute(&self, _: &Agent, _: &Task, _: &ExecutionContext) -> ExecutionResult {
        ExecutionResult::failure("compiler exploded")
    }
}

#[tokio::test]
async fn test_default_execute_stream_reports_error_event() {
    let agent = Agent::new(
        "Tester",
        AgentRole::Tester,
        strategy_for(AgentRole::Tester).default_settings(),
    );
    let task = Task::new(NewTask::new(TaskType::Testing, "Run suite"));
    let events = Mutex::new(Vec::new());

    let result = FailingExecutor
        .execute_stream(&agent, &task, &ExecutionContext::default(), &|e: StreamEvent| {
            events.lock().unwrap().push(e)
        })
        .await;

    assert!(!result.success);
    assert_eq!(
        events.into_inner().unwrap(),
        vec![StreamEvent::Error {
            message: "compiler exploded".into()
        }]
    );
}

// --- LlmExecutor ---

struct BrokenBackend;

#[async_trait]
impl LlmBackend for BrokenBackend {
    async fn complete(
        &self,
        _messages: &[Message],
        _options: &CompletionOptions,
    ) -> CrewlineResult<CompletionResponse> {
        Err(CrewlineError::Llm("rate limited".into()))
    }
}

struct CountingBackend {
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LlmBackend for CountingBackend {
    async fn complete(
        &self,
        _messages: &[Message],
        options: &CompletionOptions,
    ) -> CrewlineResult<CompletionResponse> {
        self.calls.lock().unwrap().push(options.model.clone());
        Ok(CompletionResponse {
            id: "resp".into(),
            content: format!("answer from {}", options.model),
            model: options.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 1,
                output_tokens: 1,
            },
        })
    }
}

#[tokio::test]
async fn test_llm_executor_backend_error_is_a_failure_value() {
    let factory: BackendFactory =
        Arc::new(|_: &ModelConfig| Arc::new(BrokenBackend) as Arc<dyn LlmBackend>);
    let executor = LlmExecutor::new(ModelConfig::default(), factory);
    let agent = Agent::new(
        "Reviewer",
        AgentRole::Reviewer,
        strategy_for(AgentRole::Reviewer).default_settings(),
    );
    let task = Task::new(NewTask::new(TaskType::Review, "Review PR"));

    let result = executor
        .execute(&agent, &task, &ExecutionContext::default())
        .await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("LLM error: rate limited"));
    assert_eq!(result.tokens_used, 0);
}

#[tokio::test]
async fn test_llm_executor_resolves_backend_per_agent_model() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let factory_calls = calls.clone();
    let factory: BackendFactory = Arc::new(move |_: &ModelConfig| {
        Arc::new(CountingBackend {
            calls: factory_calls.clone(),
        }) as Arc<dyn LlmBackend>
    });
    let executor = LlmExecutor::new(ModelConfig::new(LlmProvider::Ollama, "llama3"), factory);

    let plain = Agent::new(
        "Implementer",
        AgentRole::Implementer,
        strategy_for(AgentRole::Implementer).default_settings(),
    );
    let mut custom = plain.clone();
    custom.settings.model = Some("qwen2.5-coder".into());
    let task = Task::new(NewTask::new(TaskType::Implementation, "Code it"));

    let a = executor
        .execute(&plain, &task, &ExecutionContext::default())
        .await;
    let b = executor
        .execute(&custom, &task, &ExecutionContext::default())
        .await;

    assert_eq!(a.output, "answer from llama3");
    assert_eq!(b.output, "answer from qwen2.5-coder");
    assert_eq!(calls.lock().unwrap().len(), 2);
}
