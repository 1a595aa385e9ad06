use crate::executor::ExecutionContext;
use crewline_core::{AgentRole, AgentSettings};

/// Role-specific behaviour, looked up by role instead of dispatched per agent type.
#[derive(Debug)]
pub struct RoleStrategy {
    pub role: AgentRole,
    /// Tool names advertised as the agent's capabilities.
    pub tools: &'static [&'static str],
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    base_prompt: &'static str,
}

impl RoleStrategy {
    /// Settings a freshly created agent of this role starts with.
    pub fn default_settings(&self) -> AgentSettings {
        AgentSettings {
            temperature: self.default_temperature,
            max_tokens: self.default_max_tokens,
            model: None,
        }
    }

    pub fn capabilities(&self) -> Vec<String> {
        self.tools.iter().map(|t| (*t).to_string()).collect()
    }

    /// System prompt for one execution: the role prompt followed by the project context.
    pub fn system_prompt(&self, context: &ExecutionContext) -> String {
        let mut prompt = self.base_prompt.to_string();
        let project = &context.project;

        if !project.name.is_empty() || !project.description.is_empty() {
            prompt.push_str("\n## Project\n");
            if !project.name.is_empty() {
                prompt.push_str(&format!("Name: {}\n", project.name));
            }
            if !project.description.is_empty() {
                prompt.push_str(&format!("Description: {}\n", project.description));
            }
        }
        if !project.tech_stack.is_empty() {
            prompt.push_str(&format!("Tech stack: {}\n", project.tech_stack.join(", ")));
        }
        if let Some(root) = &project.root_dir {
            prompt.push_str(&format!("Repository root: {}\n", root.display()));
        }
        prompt
    }
}

static STRATEGIES: [RoleStrategy; 4] = [
    RoleStrategy {
        role: AgentRole::Architect,
        tools: &["read_file", "search_code", "list_directory"],
        default_temperature: 0.4,
        default_max_tokens: 8192,
        base_prompt: ARCHITECT_PROMPT,
    },
    RoleStrategy {
        role: AgentRole::Implementer,
        tools: &["read_file", "write_file", "search_code", "run_command"],
        default_temperature: 0.2,
        default_max_tokens: 8192,
        base_prompt: IMPLEMENTER_PROMPT,
    },
    RoleStrategy {
        role: AgentRole::Reviewer,
        tools: &["read_file", "search_code", "git_diff"],
        default_temperature: 0.3,
        default_max_tokens: 4096,
        base_prompt: REVIEWER_PROMPT,
    },
    RoleStrategy {
        role: AgentRole::Tester,
        tools: &["read_file", "write_file", "run_tests"],
        default_temperature: 0.2,
        default_max_tokens: 4096,
        base_prompt: TESTER_PROMPT,
    },
];

pub fn strategy_for(role: AgentRole) -> &'static RoleStrategy {
    match role {
        AgentRole::Architect => &STRATEGIES[0],
        AgentRole::Implementer => &STRATEGIES[1],
        AgentRole::Reviewer => &STRATEGIES[2],
        AgentRole::Tester => &STRATEGIES[3],
    }
}

const ARCHITECT_PROMPT: &str = "\
You are the Architect agent in a multi-agent development team. Your job is to \
analyze requirements and produce a clear, actionable technical design.

Rules:
1. Break requirements into concrete implementation steps.
2. Define interfaces, data types, and contracts.
3. Identify edge cases, security considerations, and constraints.
4. Reference existing code patterns and utilities when applicable.
5. Output the design directly as text.
";

const IMPLEMENTER_PROMPT: &str = "\
You are the Implementer agent in a multi-agent development team. You write \
secure, idiomatic code following the project's patterns and conventions.

Rules:
1. Follow the design provided by the Architect.
2. Handle errors explicitly; never hide failures.
3. Keep code simple, with no speculative abstractions.
4. Comment only where the logic is non-obvious.
5. Output code in markdown code blocks with file paths as comments.
";

const REVIEWER_PROMPT: &str = "\
You are the Reviewer agent in a multi-agent development team. You review code \
for correctness, security, and maintainability.

Rules:
1. Check for OWASP Top 10 vulnerabilities.
2. Verify error handling and input validation.
3. Flag deviations from the approved design.
4. Separate blocking issues from suggestions.
5. Output the review report directly as text.
";

const TESTER_PROMPT: &str = "\
You are the Tester agent in a multi-agent development team. You write \
comprehensive tests for the implementation.

Rules:
1. Cover happy paths, edge cases, and error conditions.
2. Follow the project's existing test patterns.
3. Use descriptive test names.
4. Report any behaviour that contradicts the acceptance criteria.
5. Output test code directly in your response.
";
