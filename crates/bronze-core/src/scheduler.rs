//! Runs a plan's stages in order with whole-task retries.
//!
//! Tasks inside one stage run concurrently and share nothing but the
//! capabilities in [`IngestContext`]. A stage starts only after every task of
//! the previous stage succeeded; otherwise the remaining tasks are reported as
//! skipped.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::ingestion::{run_pipeline, IngestContext};
use crate::pipelines::{PipelineDefinition, Plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Receives tasks that exhausted their retries.
pub trait FailureNotifier: Send + Sync {
    fn notify(&self, plan: &str, pipeline: &str, error: &anyhow::Error);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl FailureNotifier for LogNotifier {
    fn notify(&self, plan: &str, pipeline: &str, error: &anyhow::Error) {
        error!(plan, pipeline, error = %format!("{error:#}"), "Task failed after retries");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Failed,
    /// Not attempted because an earlier stage failed.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub pipeline: &'static str,
    pub status: TaskStatus,
    pub attempts: u32,
    pub files: usize,
    pub rows_written: u64,
    pub error: Option<String>,
}

impl TaskReport {
    fn skipped(pipeline: &PipelineDefinition) -> Self {
        Self {
            pipeline: pipeline.code,
            status: TaskStatus::Skipped,
            attempts: 0,
            files: 0,
            rows_written: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub plan: &'static str,
    pub run_id: Uuid,
    pub tasks: Vec<TaskReport>,
}

impl PlanReport {
    pub fn succeeded(&self) -> bool {
        self.tasks
            .iter()
            .all(|task| task.status == TaskStatus::Success)
    }

    pub fn task(&self, pipeline: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|task| task.pipeline == pipeline)
    }
}

pub struct Scheduler {
    retry: RetryPolicy,
    notifier: Arc<dyn FailureNotifier>,
}

impl Scheduler {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn FailureNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub async fn run(&self, plan: &Plan, ctx: &IngestContext) -> PlanReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("plan", plan = plan.name, run_id = %run_id);

        async {
            info!(stages = plan.stages.len(), "Starting plan");
            let mut tasks = Vec::new();
            let mut upstream_failed = false;

            for (index, stage) in plan.stages.iter().enumerate() {
                if upstream_failed {
                    tasks.extend(stage.iter().map(TaskReport::skipped));
                    continue;
                }

                info!(stage = index + 1, tasks = stage.len(), "Starting stage");
                let reports = join_all(
                    stage
                        .iter()
                        .map(|pipeline| self.run_task(plan.name, pipeline, ctx)),
                )
                .await;

                upstream_failed = reports
                    .iter()
                    .any(|report| report.status != TaskStatus::Success);
                tasks.extend(reports);
            }

            let report = PlanReport {
                plan: plan.name,
                run_id,
                tasks,
            };
            if report.succeeded() {
                info!("Plan finished");
            } else {
                warn!("Plan finished with failures");
            }
            report
        }
        .instrument(span)
        .await
    }

    async fn run_task(
        &self,
        plan: &str,
        pipeline: &PipelineDefinition,
        ctx: &IngestContext,
    ) -> TaskReport {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match run_pipeline(ctx, pipeline).await {
                Ok(run) => {
                    return TaskReport {
                        pipeline: pipeline.code,
                        status: TaskStatus::Success,
                        attempts,
                        files: run.files.len(),
                        rows_written: run.rows_written(),
                        error: None,
                    };
                }
                Err(err) if attempts <= self.retry.retries => {
                    warn!(
                        pipeline = pipeline.code,
                        attempt = attempts,
                        delay_secs = self.retry.delay.as_secs(),
                        error = %format!("{err:#}"),
                        "Task failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    self.notifier.notify(plan, pipeline.code, &err);
                    return TaskReport {
                        pipeline: pipeline.code,
                        status: TaskStatus::Failed,
                        attempts,
                        files: 0,
                        rows_written: 0,
                        error: Some(format!("{err:#}")),
                    };
                }
            }
        }
    }
}
