//! Task manifests.
//!
//! A manifest is a TOML file with one `[[tasks]]` table per task. Tasks refer
//! to each other through symbolic keys, which are resolved to task ids as the
//! tasks are created:
//!
//! ```toml
//! [[tasks]]
//! key = "design"
//! type = "architecture"
//! title = "Design the API"
//! role = "architect"
//!
//! [[tasks]]
//! key = "build"
//! type = "implementation"
//! title = "Implement the API"
//! role = "implementer"
//! depends_on = ["design"]
//! priority = "high"
//! ```

use anyhow::{bail, Context};
use crewline_core::{AgentRole, NewTask, TaskId, TaskPriority, TaskType};
use crewline_orchestrator::{ExecutionPlan, Orchestrator};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub tasks: Vec<ManifestTask>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestTask {
    pub key: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub role: Option<AgentRole>,
    /// Keys of tasks declared earlier in the manifest.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

/// Bidirectional key ↔ id mapping, in manifest order.
#[derive(Debug, Default)]
pub struct TaskKeys {
    order: Vec<TaskId>,
    ids: HashMap<String, TaskId>,
    keys: HashMap<TaskId, String>,
}

impl TaskKeys {
    fn insert(&mut self, key: &str, id: TaskId) {
        self.order.push(id);
        self.ids.insert(key.to_string(), id);
        self.keys.insert(id, key.to_string());
    }

    pub fn id(&self, key: &str) -> Option<TaskId> {
        self.ids.get(key).copied()
    }

    pub fn key(&self, id: TaskId) -> String {
        self.keys.get(&id).cloned().unwrap_or_else(|| id.to_string())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

impl Manifest {
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        let manifest: Manifest = toml::from_str(source)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest '{}'", path.display()))?;
        Self::parse(&source).with_context(|| format!("Invalid manifest '{}'", path.display()))
    }

    /// Keys must be unique and dependencies must point at earlier tasks.
    fn validate(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            for dep in &task.depends_on {
                if !seen.contains(dep.as_str()) {
                    bail!(
                        "task '{}' depends on '{dep}', which is not declared before it",
                        task.key
                    );
                }
            }
            if !seen.insert(task.key.as_str()) {
                bail!("duplicate task key '{}'", task.key);
            }
        }
        Ok(())
    }

    /// Create every task on `orchestrator`, in manifest order.
    pub fn apply(&self, orchestrator: &Orchestrator) -> anyhow::Result<TaskKeys> {
        let mut keys = TaskKeys::default();
        for entry in &self.tasks {
            let depends_on = entry
                .depends_on
                .iter()
                .map(|dep| {
                    keys.id(dep)
                        .with_context(|| format!("unknown dependency '{dep}'"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let mut input = NewTask::new(entry.task_type, entry.title.clone())
                .with_description(entry.description.clone())
                .with_dependencies(depends_on)
                .with_acceptance_criteria(entry.acceptance_criteria.clone());
            if let Some(priority) = entry.priority {
                input = input.with_priority(priority);
            }
            if let Some(role) = entry.role {
                input = input.assign_to(role);
            }

            let id = orchestrator.create_task(input);
            keys.insert(&entry.key, id);
        }
        Ok(keys)
    }
}

/// Print the plan buckets using manifest keys.
pub fn render_plan(plan: &ExecutionPlan, keys: &TaskKeys) -> String {
    let mut out = String::new();
    let list = |ids: &[TaskId]| -> String {
        if ids.is_empty() {
            "(none)".to_string()
        } else {
            ids.iter().map(|id| keys.key(*id)).collect::<Vec<_>>().join(", ")
        }
    };

    let _ = writeln!(out, "Ready:     {}", list(&plan.ready));

    let waiting: Vec<TaskId> = keys
        .order
        .iter()
        .copied()
        .filter(|id| plan.waiting.contains_key(id))
        .collect();
    if waiting.is_empty() {
        let _ = writeln!(out, "Waiting:   (none)");
    } else {
        let _ = writeln!(out, "Waiting:");
        for id in waiting {
            let on = plan.waiting.get(&id).map(Vec::as_slice).unwrap_or_default();
            let _ = writeln!(out, "  {} (on: {})", keys.key(id), list(on));
        }
    }

    let _ = writeln!(out, "Blocked:   {}", list(&plan.blocked));

    let unassigned: Vec<TaskId> = keys
        .order
        .iter()
        .copied()
        .filter(|id| {
            !plan.ready.contains(id)
                && !plan.waiting.contains_key(id)
                && !plan.blocked.contains(id)
                && !plan.completed.contains(id)
        })
        .collect();
    let _ = writeln!(out, "Unassigned: {}", list(&unassigned));
    out
}
