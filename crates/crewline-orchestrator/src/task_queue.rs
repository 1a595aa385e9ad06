use crewline_core::{Task, TaskId, TaskResult, TaskStatus};
use chrono::Utc;

/// The pending queue plus the list of finished tasks.
///
/// Tasks enter at the back of the pending queue and leave it only to be
/// appended to the completed list. Nothing is ever deleted.
#[derive(Debug, Default, Clone)]
pub struct TaskQueue {
    pending: Vec<Task>,
    completed: Vec<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task to the back of the pending queue.
    pub fn push(&mut self, task: Task) -> TaskId {
        let id = task.id;
        self.pending.push(task);
        id
    }

    /// Get a task by ID from either list.
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.pending
            .iter()
            .chain(&self.completed)
            .find(|t| t.id == id)
    }

    /// Mutable access to a task that has not finished yet.
    pub fn pending_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.pending.iter_mut().find(|t| t.id == id)
    }

    /// Mark a pending task as running.
    pub fn mark_in_progress(&mut self, id: TaskId) -> Option<&Task> {
        let task = self.pending_mut(id)?;
        let now = Utc::now();
        task.status = TaskStatus::InProgress;
        task.started_at = Some(now);
        task.updated_at = now;
        Some(task)
    }

    /// Move a task from the pending queue to the completed list.
    ///
    /// `status` must be terminal. Returns the finished task, or `None` if the
    /// id was not in the pending queue.
    pub fn finish(
        &mut self,
        id: TaskId,
        status: TaskStatus,
        result: Option<TaskResult>,
    ) -> Option<&Task> {
        debug_assert!(status.is_terminal());
        let index = self.pending.iter().position(|t| t.id == id)?;
        let mut task = self.pending.remove(index);
        let now = Utc::now();
        task.status = status;
        task.result = result;
        task.completed_at = Some(now);
        task.updated_at = now;
        self.completed.push(task);
        self.completed.last()
    }

    pub fn pending(&self) -> &[Task] {
        &self.pending
    }

    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    /// All tasks, pending queue first, then completed list.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.pending.iter().chain(&self.completed)
    }

    pub fn by_status(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.iter().filter(move |t| t.status == status)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn total_count(&self) -> usize {
        self.pending.len() + self.completed.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crewline_core::{NewTask, TaskType};
    use uuid::Uuid;

    fn task(title: &str) -> Task {
        Task::new(NewTask::new(TaskType::Implementation, title))
    }

    #[test]
    fn test_empty_queue() {
        let queue = TaskQueue::new();
        assert_eq!(queue.total_count(), 0);
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_push_keeps_order() {
        let mut queue = TaskQueue::new();
        let a = queue.push(task("A"));
        let b = queue.push(task("B"));
        let ids: Vec<TaskId> = queue.pending().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_mark_in_progress() {
        let mut queue = TaskQueue::new();
        let id = queue.push(task("Run me"));
        queue.mark_in_progress(id);

        let t = queue.get(id).unwrap();
        assert_eq!(t.status, TaskStatus::InProgress);
        assert!(t.started_at.is_some());
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn test_finish_moves_to_completed() {
        let mut queue = TaskQueue::new();
        let id = queue.push(task("Complete me"));
        queue.mark_in_progress(id);

        let finished = queue
            .finish(id, TaskStatus::Complete, Some(TaskResult::failure("bad")))
            .unwrap();
        assert_eq!(finished.status, TaskStatus::Complete);
        assert!(finished.completed_at.is_some());

        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.completed_count(), 1);
        assert!(queue.pending_mut(id).is_none());
        assert!(queue.get(id).is_some());
    }

    #[test]
    fn test_finish_unknown_or_twice() {
        let mut queue = TaskQueue::new();
        let id = queue.push(task("Once"));
        assert!(queue.finish(Uuid::new_v4(), TaskStatus::Cancelled, None).is_none());
        assert!(queue.finish(id, TaskStatus::Cancelled, None).is_some());
        assert!(queue.finish(id, TaskStatus::Complete, None).is_none());
        assert_eq!(queue.total_count(), 1);
    }

    #[test]
    fn test_by_status_spans_both_lists() {
        let mut queue = TaskQueue::new();
        let a = queue.push(task("A"));
        queue.push(task("B"));
        let c = queue.push(task("C"));
        queue.finish(a, TaskStatus::Cancelled, None);
        queue.finish(c, TaskStatus::Cancelled, None);

        assert_eq!(queue.by_status(TaskStatus::Cancelled).count(), 2);
        assert_eq!(queue.by_status(TaskStatus::Pending).count(), 1);
    }
}
