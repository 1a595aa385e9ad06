use crewline_agent::{ModelConfig, ProjectContext};
use crewline_core::{CrewlineError, CrewlineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Orchestrator settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on tasks the scheduler keeps in flight.
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: usize,
    #[serde(default = "default_true")]
    pub enable_parallel_execution: bool,
    /// Assign new tasks that name a role right away.
    #[serde(default = "default_true")]
    pub auto_assign: bool,
    /// Longest the scheduler sleeps before re-checking when nothing is dispatchable.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub project: ProjectContext,
}

fn default_max_concurrent_agents() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: default_max_concurrent_agents(),
            enable_parallel_execution: true,
            auto_assign: true,
            poll_interval_ms: default_poll_interval_ms(),
            model: ModelConfig::default(),
            project: ProjectContext::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> CrewlineResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> CrewlineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CrewlineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> CrewlineResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> CrewlineResult<()> {
        if self.max_concurrent_agents == 0 {
            return Err(CrewlineError::Config(
                "max_concurrent_agents must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(CrewlineError::Config(
                "poll_interval_ms must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(CrewlineError::Config(format!(
                "model.temperature must be within 0.0..=2.0, got {}",
                self.model.temperature
            )));
        }
        if self.model.model_id.trim().is_empty() {
            return Err(CrewlineError::Config("model.model_id must not be empty".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn to_toml_string(&self) -> CrewlineResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CrewlineError::Config(format!("cannot serialize config: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewline_agent::LlmProvider;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
        assert_eq!(config.max_concurrent_agents, 3);
        assert!(config.enable_parallel_execution);
        assert!(config.auto_assign);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_document() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            max_concurrent_agents = 1
            enable_parallel_execution = false

            [model]
            provider = "ollama"
            model_id = "llama3"

            [project]
            name = "ledger"
            tech_stack = ["rust"]
            "#,
        )
        .unwrap();

        assert_eq!(config.max_concurrent_agents, 1);
        assert!(!config.enable_parallel_execution);
        assert!(config.auto_assign);
        assert_eq!(config.model.provider, LlmProvider::Ollama);
        assert_eq!(config.project.name, "ledger");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = OrchestratorConfig::from_toml_str("max_concurrent_agents = 0").unwrap_err();
        assert!(matches!(err, CrewlineError::Config(_)));
        assert!(err.to_string().contains("max_concurrent_agents"));
    }

    #[test]
    fn test_bad_temperature_rejected() {
        let err = OrchestratorConfig::from_toml_str("[model]\ntemperature = 7.5").unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_malformed_toml_is_toml_error() {
        let err = OrchestratorConfig::from_toml_str("max_concurrent_agents = ").unwrap_err();
        assert!(matches!(err, CrewlineError::Toml(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = 25").unwrap();

        let config = OrchestratorConfig::load(file.path()).unwrap();
        assert_eq!(config.poll_interval_ms, 25);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, OrchestratorConfig::default());

        let err = OrchestratorConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CrewlineError::Config(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let text = OrchestratorConfig::default().to_toml_string().unwrap();
        let parsed = OrchestratorConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, OrchestratorConfig::default());
    }
}
