//! Dependency resolution over the task set.
//!
//! Both functions are pure: they read task snapshots and never mutate state.

use crewline_core::{Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Dependency status of every pending task, recomputed on each scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Assigned tasks whose dependencies are all complete, in queue order.
    pub ready: Vec<TaskId>,
    /// Tasks still waiting, with the dependencies that have not completed yet.
    pub waiting: HashMap<TaskId, Vec<TaskId>>,
    /// Tasks whose unmet dependencies include a cancelled task.
    pub blocked: Vec<TaskId>,
    pub completed: Vec<TaskId>,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.waiting.is_empty() && self.blocked.is_empty()
    }
}

/// Classify `pending` tasks by the status of their dependencies.
///
/// A dependency on an id that is absent from both lists never resolves.
/// Tasks in `active` are skipped, as are tasks that are not `Pending`.
pub fn plan(pending: &[Task], completed: &[Task], active: &HashSet<TaskId>) -> ExecutionPlan {
    let status: HashMap<TaskId, TaskStatus> = pending
        .iter()
        .chain(completed)
        .map(|t| (t.id, t.status))
        .collect();

    let mut result = ExecutionPlan {
        completed: completed
            .iter()
            .filter(|t| t.status == TaskStatus::Complete)
            .map(|t| t.id)
            .collect(),
        ..ExecutionPlan::default()
    };

    for task in pending {
        if task.status != TaskStatus::Pending || active.contains(&task.id) {
            continue;
        }

        let unmet: Vec<TaskId> = task
            .depends_on
            .iter()
            .copied()
            .filter(|dep| status.get(dep) != Some(&TaskStatus::Complete))
            .collect();

        if unmet.is_empty() {
            if task.is_assigned() {
                result.ready.push(task.id);
            }
        } else if unmet
            .iter()
            .any(|dep| status.get(dep) == Some(&TaskStatus::Cancelled))
        {
            result.blocked.push(task.id);
        } else {
            result.waiting.insert(task.id, unmet);
        }
    }

    result
}

/// Find one dependency cycle among `tasks`, returned as the ids along the cycle.
///
/// Edges to ids outside `tasks` are ignored.
pub fn find_cycle(tasks: &[Task]) -> Option<Vec<TaskId>> {
    let deps: HashMap<TaskId, &[TaskId]> =
        tasks.iter().map(|t| (t.id, t.depends_on.as_slice())).collect();
    // 1 = on the current path, 2 = fully explored
    let mut marks: HashMap<TaskId, u8> = HashMap::new();
    let mut path = Vec::new();

    for task in tasks {
        if let Some(cycle) = visit(task.id, &deps, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}

fn visit(
    id: TaskId,
    deps: &HashMap<TaskId, &[TaskId]>,
    marks: &mut HashMap<TaskId, u8>,
    path: &mut Vec<TaskId>,
) -> Option<Vec<TaskId>> {
    match marks.get(&id) {
        Some(1) => {
            let start = path.iter().position(|p| *p == id).unwrap_or(0);
            return Some(path[start..].to_vec());
        }
        Some(_) => return None,
        None => {}
    }
    let edges = deps.get(&id)?;

    marks.insert(id, 1);
    path.push(id);
    for dep in edges.iter() {
        if let Some(cycle) = visit(*dep, deps, marks, path) {
            return Some(cycle);
        }
    }
    path.pop();
    marks.insert(id, 2);
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewline_core::{NewTask, TaskType};
    use uuid::Uuid;

    fn task(title: &str, deps: Vec<TaskId>) -> Task {
        let mut t = Task::new(NewTask::new(TaskType::Implementation, title).with_dependencies(deps));
        t.assignee = Some(Uuid::new_v4());
        t
    }

    fn finished(mut t: Task, status: TaskStatus) -> Task {
        t.status = status;
        t
    }

    #[test]
    fn test_independent_tasks_ready_in_queue_order() {
        let a = task("a", vec![]);
        let b = task("b", vec![]);
        let result = plan(&[a.clone(), b.clone()], &[], &HashSet::new());
        assert_eq!(result.ready, vec![a.id, b.id]);
        assert!(result.waiting.is_empty());
    }

    #[test]
    fn test_unassigned_ready_task_excluded() {
        let mut a = task("a", vec![]);
        a.assignee = None;
        let result = plan(&[a.clone()], &[], &HashSet::new());
        assert!(result.ready.is_empty());
        assert!(!result.waiting.contains_key(&a.id));
    }

    #[test]
    fn test_waiting_until_dependency_complete() {
        let a = task("a", vec![]);
        let b = task("b", vec![a.id]);

        let before = plan(&[a.clone(), b.clone()], &[], &HashSet::new());
        assert_eq!(before.ready, vec![a.id]);
        assert_eq!(before.waiting.get(&b.id), Some(&vec![a.id]));

        let done = finished(a.clone(), TaskStatus::Complete);
        let after = plan(&[b.clone()], &[done], &HashSet::new());
        assert_eq!(after.ready, vec![b.id]);
        assert_eq!(after.completed, vec![a.id]);
    }

    #[test]
    fn test_failed_dependency_still_resolves() {
        let mut a = finished(task("a", vec![]), TaskStatus::Complete);
        a.result = Some(crewline_core::TaskResult::failure("boom"));
        let b = task("b", vec![a.id]);
        let result = plan(&[b.clone()], &[a], &HashSet::new());
        assert_eq!(result.ready, vec![b.id]);
    }

    #[test]
    fn test_cancelled_dependency_blocks() {
        let a = finished(task("a", vec![]), TaskStatus::Cancelled);
        let b = task("b", vec![a.id]);
        let result = plan(&[b.clone()], &[a], &HashSet::new());
        assert_eq!(result.blocked, vec![b.id]);
        assert!(result.ready.is_empty());
        assert!(result.completed.is_empty());
    }

    #[test]
    fn test_missing_dependency_waits_forever() {
        let ghost = Uuid::new_v4();
        let b = task("b", vec![ghost]);
        let result = plan(&[b.clone()], &[], &HashSet::new());
        assert_eq!(result.waiting.get(&b.id), Some(&vec![ghost]));
    }

    #[test]
    fn test_active_and_in_progress_skipped() {
        let a = task("a", vec![]);
        let b = finished(task("b", vec![]), TaskStatus::InProgress);
        let active: HashSet<TaskId> = [a.id].into_iter().collect();
        let result = plan(&[a, b], &[], &active);
        assert!(result.is_empty());
    }

    #[test]
    fn test_ready_implies_assigned_and_deps_complete() {
        let a = finished(task("a", vec![]), TaskStatus::Complete);
        let b = task("b", vec![a.id]);
        let mut c = task("c", vec![a.id]);
        c.assignee = None;
        let d = task("d", vec![b.id]);
        let pending = vec![b, c, d];
        let completed = vec![a];

        let result = plan(&pending, &completed, &HashSet::new());
        for id in &result.ready {
            let t = pending.iter().find(|t| t.id == *id).unwrap();
            assert!(t.is_assigned());
            assert!(t.depends_on.iter().all(|d| result.completed.contains(d)));
        }
    }

    #[test]
    fn test_no_cycle() {
        let a = task("a", vec![]);
        let b = task("b", vec![a.id]);
        let c = task("c", vec![a.id, b.id]);
        assert!(find_cycle(&[a, b, c]).is_none());
    }

    #[test]
    fn test_cycle_detection() {
        let mut a = task("a", vec![]);
        let b = task("b", vec![a.id]);
        let c = task("c", vec![b.id]);
        a.depends_on = vec![c.id];

        let cycle = find_cycle(&[a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(cycle.len(), 3);
        for id in [a.id, b.id, c.id] {
            assert!(cycle.contains(&id));
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let mut a = task("a", vec![]);
        a.depends_on = vec![a.id];
        assert_eq!(find_cycle(&[a.clone()]), Some(vec![a.id]));
    }
}
