//! Approval-gated stage chains built on top of ordinary tasks.
//!
//! A pipeline creates one task per stage, each depending on the previous
//! stage's task. The scheduler may only dispatch the task of the pipeline's
//! current stage, and only while the pipeline is pending or running, so a
//! stage that requires approval holds the chain until
//! [`Orchestrator::approve_pipeline_stage`] is called.

use crate::engine::{Orchestrator, OrchestratorState};
use chrono::Utc;
use crewline_core::{
    default_stages, EventPayload, NewTask, Pipeline, PipelineId, PipelineRef, PipelineSpec,
    PipelineStatus, Task, TaskId, TaskResult, TaskStatus,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

impl OrchestratorState {
    /// Whether the pipeline gate lets `task` be dispatched now.
    ///
    /// Tasks outside any pipeline always pass. A stage task whose pipeline
    /// is unknown never does.
    pub(crate) fn stage_admitted(&self, task: &Task) -> bool {
        match task.pipeline {
            None => true,
            Some(stage) => self
                .pipeline(stage.pipeline_id)
                .is_some_and(|p| p.admits_stage(stage.stage_index)),
        }
    }

    /// Cancel the pending stage tasks of pipeline `id` that its gate will
    /// never admit again: all of them once the pipeline has finished, and
    /// those of stages it has moved past otherwise. Running tasks are left
    /// to finish.
    pub(crate) fn retire_stage_tasks(&mut self, id: PipelineId) -> Vec<Task> {
        let Some(pipeline) = self.pipeline(id) else {
            return Vec::new();
        };
        let cutoff = if pipeline.status.is_terminal() {
            pipeline.task_ids.len()
        } else {
            pipeline.current_stage_index.min(pipeline.task_ids.len())
        };
        let stale = pipeline.task_ids[..cutoff].to_vec();

        let mut retired = Vec::new();
        for task_id in stale {
            let retirable = !self.active.contains_key(&task_id)
                && self
                    .queue
                    .get(task_id)
                    .is_some_and(|t| t.status == TaskStatus::Pending);
            if !retirable {
                continue;
            }
            if let Some(task) = self.queue.finish(task_id, TaskStatus::Cancelled, None) {
                retired.push(task.clone());
            }
        }
        retired
    }
}

impl Orchestrator {
    /// Create a pipeline and one task per stage.
    ///
    /// An absent or empty stage list means the default four-stage chain.
    /// Stage tasks are assigned to their stage role right away when an idle
    /// agent is available.
    pub fn create_pipeline(&self, definition: PipelineSpec) -> PipelineId {
        let stages = definition
            .stages
            .filter(|s| !s.is_empty())
            .unwrap_or_else(default_stages);

        let pipeline = Pipeline {
            id: Uuid::new_v4(),
            name: definition.name,
            description: definition.description,
            stages,
            task_ids: Vec::new(),
            current_stage_index: 0,
            status: PipelineStatus::Pending,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        let id = pipeline.id;
        let stages = pipeline.stages.clone();
        let fallback_description = pipeline.description.clone();
        self.state.write().pipelines.push(pipeline);

        let mut previous: Option<TaskId> = None;
        for (index, stage) in stages.iter().enumerate() {
            let description = if stage.description.is_empty() {
                fallback_description.clone()
            } else {
                stage.description.clone()
            };
            let input = NewTask::new(stage.task_type, stage.title.clone())
                .with_description(description)
                .with_dependencies(previous.into_iter().collect())
                .assign_to(stage.role);
            let stage_ref = PipelineRef {
                pipeline_id: id,
                stage_index: index,
            };
            let task_id = self.create_task_with(input, Some(stage_ref), true);

            if let Some(p) = self.state.write().pipeline_mut(id) {
                p.task_ids.push(task_id);
            }
            previous = Some(task_id);
        }

        let Some(pipeline) = self.get_pipeline(id) else {
            return id;
        };
        info!(pipeline_id = %id, name = %pipeline.name, stages = pipeline.stages.len(), "Pipeline created");
        self.emit(EventPayload::PipelineCreated { pipeline });
        self.signal();
        id
    }

    /// Finish the current stage and move to the next one.
    ///
    /// The next stage either starts or, when it requires approval, waits for
    /// [`approve_pipeline_stage`](Self::approve_pipeline_stage). After the last
    /// stage the pipeline completes. Returns false for unknown or terminal
    /// pipelines.
    pub fn advance_pipeline(&self, id: PipelineId) -> bool {
        let events = {
            let mut state = self.state.write();
            let Some(pipeline) = state.pipeline_mut(id) else {
                debug!(pipeline_id = %id, "Advance ignored, pipeline not found");
                return false;
            };
            if pipeline.status.is_terminal() {
                debug!(pipeline_id = %id, status = ?pipeline.status, "Advance ignored, pipeline finished");
                return false;
            }

            let finished_stage = pipeline.current_stage_index;
            pipeline.current_stage_index += 1;
            let next = pipeline.current_stage_index;

            let mut events = Vec::with_capacity(2);
            match pipeline.current_stage().map(|s| s.requires_approval) {
                None => {
                    pipeline.status = PipelineStatus::Completed;
                    pipeline.completed_at = Some(Utc::now());
                    info!(pipeline_id = %id, "Pipeline completed");
                    events.push(EventPayload::PipelineStageCompleted {
                        pipeline: pipeline.clone(),
                        stage_index: finished_stage,
                    });
                    events.push(EventPayload::PipelineCompleted {
                        pipeline: pipeline.clone(),
                    });
                }
                Some(true) => {
                    pipeline.status = PipelineStatus::AwaitingApproval;
                    info!(pipeline_id = %id, stage = next, "Pipeline awaiting approval");
                    events.push(EventPayload::PipelineStageCompleted {
                        pipeline: pipeline.clone(),
                        stage_index: finished_stage,
                    });
                    events.push(EventPayload::PipelineAwaitingApproval {
                        pipeline: pipeline.clone(),
                        stage_index: next,
                    });
                }
                Some(false) => {
                    pipeline.status = PipelineStatus::Running;
                    info!(pipeline_id = %id, stage = next, "Pipeline stage started");
                    events.push(EventPayload::PipelineStageCompleted {
                        pipeline: pipeline.clone(),
                        stage_index: finished_stage,
                    });
                    events.push(EventPayload::PipelineStageStarted {
                        pipeline: pipeline.clone(),
                        stage_index: next,
                    });
                }
            }
            events.extend(retired_events(state.retire_stage_tasks(id)));
            events
        };

        for event in events {
            self.emit(event);
        }
        self.signal();
        true
    }

    /// Release a pipeline waiting for approval. No-op in any other state.
    pub fn approve_pipeline_stage(&self, id: PipelineId) -> bool {
        let (pipeline, stage_index) = {
            let mut state = self.state.write();
            let Some(pipeline) = state.pipeline_mut(id) else {
                return false;
            };
            if pipeline.status != PipelineStatus::AwaitingApproval {
                debug!(pipeline_id = %id, status = ?pipeline.status, "Approval ignored");
                return false;
            }
            pipeline.status = PipelineStatus::Running;
            (pipeline.clone(), pipeline.current_stage_index)
        };

        info!(pipeline_id = %id, stage = stage_index, "Pipeline stage approved");
        self.emit(EventPayload::PipelineApprovalReceived {
            pipeline: pipeline.clone(),
            stage_index,
        });
        self.emit(EventPayload::PipelineStageStarted {
            pipeline,
            stage_index,
        });
        self.signal();
        true
    }

    /// Cancel a pipeline. Its remaining stage tasks stay in the queue but are
    /// never dispatched.
    pub fn cancel_pipeline(&self, id: PipelineId) -> bool {
        let Some((pipeline, retired)) = self.finish_pipeline(id, PipelineStatus::Cancelled, None)
        else {
            return false;
        };
        info!(pipeline_id = %id, "Pipeline cancelled");
        self.emit(EventPayload::PipelineCancelled { pipeline });
        retired_events(retired).for_each(|event| self.emit(event));
        self.signal();
        true
    }

    /// Mark a pipeline failed with `error`.
    pub fn fail_pipeline(&self, id: PipelineId, error: impl Into<String>) -> bool {
        let error = error.into();
        let Some((pipeline, retired)) =
            self.finish_pipeline(id, PipelineStatus::Failed, Some(error.clone()))
        else {
            return false;
        };
        warn!(pipeline_id = %id, error = %error, "Pipeline failed");
        self.emit(EventPayload::PipelineFailed { pipeline, error });
        retired_events(retired).for_each(|event| self.emit(event));
        self.signal();
        true
    }

    fn finish_pipeline(
        &self,
        id: PipelineId,
        status: PipelineStatus,
        error: Option<String>,
    ) -> Option<(Pipeline, Vec<Task>)> {
        let mut state = self.state.write();
        let pipeline = state.pipeline_mut(id)?;
        if pipeline.status.is_terminal() {
            debug!(pipeline_id = %id, status = ?pipeline.status, "Pipeline already finished");
            return None;
        }
        pipeline.status = status;
        pipeline.error = error;
        let pipeline = pipeline.clone();
        let retired = state.retire_stage_tasks(id);
        Some((pipeline, retired))
    }

    pub fn get_pipeline(&self, id: PipelineId) -> Option<Pipeline> {
        self.state.read().pipeline(id).cloned()
    }

    pub fn get_pipelines(&self) -> Vec<Pipeline> {
        self.state.read().pipelines.clone()
    }

    /// React to the task of a pipeline stage finishing.
    pub(crate) fn on_stage_finished(&self, stage: PipelineRef, result: &TaskResult) {
        let is_current = self.state.read().pipeline(stage.pipeline_id).is_some_and(|p| {
            !p.status.is_terminal() && p.current_stage_index == stage.stage_index
        });
        if !is_current {
            return;
        }

        if result.success {
            self.advance_pipeline(stage.pipeline_id);
        } else {
            let error = result
                .error
                .clone()
                .unwrap_or_else(|| "stage task failed".to_string());
            self.fail_pipeline(
                stage.pipeline_id,
                format!("Stage {} failed: {error}", stage.stage_index),
            );
        }
    }
}

/// `task_cancelled` events for stage tasks a pipeline gave up on.
fn retired_events(tasks: Vec<Task>) -> impl Iterator<Item = EventPayload> {
    tasks.into_iter().map(|task| {
        info!(task_id = %task.id, "Stage task cancelled with its pipeline");
        EventPayload::TaskCancelled { task }
    })
}
