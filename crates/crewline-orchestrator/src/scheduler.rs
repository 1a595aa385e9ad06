//! The dispatch loop: `idle → running ⇄ paused → idle`.
//!
//! Each iteration plans the task graph, picks up to the free concurrency of
//! dispatchable ready tasks (highest priority first, then queue order) and
//! executes them, as one concurrent batch or one at a time. When nothing can
//! be dispatched but work is outstanding, the loop sleeps on the wake signal,
//! bounded by the configured poll interval.

use crate::engine::Orchestrator;
use crate::graph::{self, ExecutionPlan};
use crewline_core::{EventPayload, OrchestratorStatus, Task, TaskId};
use futures_util::future::join_all;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};

enum Tick {
    Dispatch(Vec<TaskId>),
    Wait,
    Idle(ExecutionPlan),
}

impl Orchestrator {
    /// Dependency status of all pending tasks right now.
    pub fn get_execution_plan(&self) -> ExecutionPlan {
        let state = self.state.read();
        let active: HashSet<TaskId> = state.active.keys().copied().collect();
        graph::plan(state.queue.pending(), state.queue.completed(), &active)
    }

    /// Start (or resume) scheduling and drive the loop until it stops.
    ///
    /// Returns when the orchestrator runs out of dispatchable work, or is
    /// paused or stopped. If another caller is already driving the loop this
    /// returns immediately.
    pub async fn start(&self) {
        self.transition(
            &[OrchestratorStatus::Idle, OrchestratorStatus::Paused],
            OrchestratorStatus::Running,
            "Scheduler started",
        );
        self.drive().await;
    }

    /// Stop dispatching new tasks. In-flight tasks finish normally.
    pub fn pause(&self) -> bool {
        self.transition(
            &[OrchestratorStatus::Running],
            OrchestratorStatus::Paused,
            "Scheduler paused",
        )
    }

    /// Leave the paused state and drive the loop again.
    pub async fn resume(&self) {
        if self.transition(
            &[OrchestratorStatus::Paused],
            OrchestratorStatus::Running,
            "Scheduler resumed",
        ) {
            self.drive().await;
        }
    }

    /// Return to idle from any state. In-flight tasks are reconciled normally.
    pub fn stop(&self) -> bool {
        self.transition(
            &[OrchestratorStatus::Running, OrchestratorStatus::Paused],
            OrchestratorStatus::Idle,
            "Scheduler stopped",
        )
    }

    fn transition(
        &self,
        from: &[OrchestratorStatus],
        to: OrchestratorStatus,
        message: &str,
    ) -> bool {
        let previous = {
            let mut state = self.state.write();
            if !from.contains(&state.status) {
                return false;
            }
            std::mem::replace(&mut state.status, to)
        };

        info!(from = %previous, to = %to, "{message}");
        self.emit(EventPayload::StatusChange {
            from: Some(previous),
            to,
            message: Some(message.to_string()),
        });
        self.signal();
        true
    }

    async fn drive(&self) {
        loop {
            if self.loop_active.swap(true, Ordering::AcqRel) {
                debug!("Scheduler loop already active");
                return;
            }
            self.run_loop().await;
            self.loop_active.store(false, Ordering::Release);

            // A resume that raced with the loop's exit found it still active.
            if self.status() != OrchestratorStatus::Running {
                return;
            }
        }
    }

    async fn run_loop(&self) {
        let poll_interval = self.config.poll_interval();

        while self.status() == OrchestratorStatus::Running {
            match self.next_tick() {
                Tick::Idle(plan) => {
                    self.log_idle(&plan);
                    self.transition(
                        &[OrchestratorStatus::Running],
                        OrchestratorStatus::Idle,
                        "No dispatchable work left",
                    );
                    return;
                }
                Tick::Wait => {
                    let _ = tokio::time::timeout(poll_interval, self.wake.notified()).await;
                }
                Tick::Dispatch(batch) => {
                    debug!(tasks = batch.len(), "Dispatching batch");
                    if self.config.enable_parallel_execution && batch.len() > 1 {
                        join_all(batch.into_iter().map(|id| self.execute_task(id))).await;
                    } else if let Some(id) = batch.first() {
                        self.execute_task(*id).await;
                    }
                }
            }
        }
    }

    /// Decide what one loop iteration does. The batch is fixed here, before
    /// any of it is awaited.
    fn next_tick(&self) -> Tick {
        let state = self.state.read();
        let active: HashSet<TaskId> = state.active.keys().copied().collect();
        let plan = graph::plan(state.queue.pending(), state.queue.completed(), &active);

        if plan.ready.is_empty() && state.active.is_empty() {
            return Tick::Idle(plan);
        }

        let mut available = self
            .config
            .max_concurrent_agents
            .max(1)
            .saturating_sub(state.active.len());
        if !self.config.enable_parallel_execution {
            available = available.min(1);
        }
        if available == 0 {
            return Tick::Wait;
        }

        let mut candidates: Vec<&Task> = plan
            .ready
            .iter()
            .filter_map(|id| state.queue.get(*id))
            .filter(|task| state.stage_admitted(task))
            .collect();
        candidates.sort_by_key(|task| Reverse(task.priority));

        // One in-flight task per agent, counting this batch.
        let mut claimed: HashSet<_> = state.active.values().copied().collect();
        let batch: Vec<TaskId> = candidates
            .into_iter()
            .filter(|task| task.assignee.is_some_and(|agent| claimed.insert(agent)))
            .take(available)
            .map(|task| task.id)
            .collect();

        if batch.is_empty() {
            debug!(ready = plan.ready.len(), active = state.active.len(), "Nothing dispatchable, waiting");
            Tick::Wait
        } else {
            Tick::Dispatch(batch)
        }
    }

    fn log_idle(&self, plan: &ExecutionPlan) {
        if !plan.waiting.is_empty() {
            warn!(
                waiting = plan.waiting.len(),
                "Scheduler idle with tasks waiting on dependencies that never completed"
            );
        }
        if !plan.blocked.is_empty() {
            warn!(blocked = plan.blocked.len(), "Tasks blocked by cancelled dependencies");
        }

        let pending = self.state.read().queue.pending().to_vec();
        let unassigned = pending.iter().filter(|t| !t.is_assigned()).count();
        if unassigned > 0 {
            info!(unassigned, "Pending tasks without an assignee");
        }
        if let Some(cycle) = graph::find_cycle(&pending) {
            let ids: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            warn!(cycle = %ids.join(" -> "), "Dependency cycle detected");
        }
    }
}
