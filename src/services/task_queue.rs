//! In-process background task queue.
//!
//! Handlers enqueue work and return immediately; a single worker drains the
//! channel and retries failed deliveries with exponential back-off.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::clients::mailer::Mailer;
use crate::config::TaskQueueConfig;
use crate::services::notifications::notify_course_update;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    NotifyCourseUpdate {
        course_id: i32,
        course_title: String,
        recipients: Vec<String>,
    },
}

impl Task {
    const fn name(&self) -> &'static str {
        match self {
            Self::NotifyCourseUpdate { .. } => "notify_course_update",
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<Task>,
}

struct Worker {
    mailer: Arc<dyn Mailer>,
    config: TaskQueueConfig,
    max_concurrent_sends: usize,
}

impl TaskQueue {
    /// Spawns the worker. It stops once every `TaskQueue` clone is dropped
    /// and the channel is drained.
    #[must_use]
    pub fn start(
        mailer: Arc<dyn Mailer>,
        config: TaskQueueConfig,
        max_concurrent_sends: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = Worker {
            mailer,
            config,
            max_concurrent_sends,
        };
        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender }, handle)
    }

    /// Queues a task without waiting for capacity.
    pub fn enqueue(&self, task: Task) -> Result<()> {
        let name = task.name();
        self.sender
            .try_send(task)
            .map_err(|e| anyhow::anyhow!("Failed to enqueue {name}: {e}"))?;
        metrics::counter!("tasks_enqueued_total", "task" => name).increment(1);
        Ok(())
    }
}

impl Worker {
    async fn run(self, mut receiver: mpsc::Receiver<Task>) {
        while let Some(task) = receiver.recv().await {
            let name = task.name();
            let start = Instant::now();
            info!(event = "job_started", job_name = name, "Running queued task");

            match self.execute(task).await {
                Ok(()) => info!(
                    event = "job_finished",
                    job_name = name,
                    duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Queued task finished"
                ),
                Err(e) => error!(
                    event = "job_failed",
                    job_name = name,
                    error = %e,
                    "Queued task failed"
                ),
            }
        }
        info!("Task queue closed, worker stopping");
    }

    async fn execute(&self, task: Task) -> Result<()> {
        match task {
            Task::NotifyCourseUpdate {
                course_id,
                course_title,
                recipients,
            } => {
                let mut pending = recipients;
                let mut attempt = 1;
                loop {
                    let report = notify_course_update(
                        self.mailer.as_ref(),
                        course_id,
                        &course_title,
                        &pending,
                        self.max_concurrent_sends,
                    )
                    .await;

                    if report.failed.is_empty() {
                        return Ok(());
                    }
                    if attempt >= self.config.max_attempts {
                        anyhow::bail!(
                            "{} recipient(s) still failing after {attempt} attempts",
                            report.failed.len()
                        );
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        course_id,
                        attempt,
                        failed = report.failed.len(),
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Retrying failed course update e-mails"
                    );
                    tokio::time::sleep(delay).await;

                    pending = report.failed;
                    attempt += 1;
                }
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.config.retry_base_delay_ms.saturating_mul(factor))
    }
}
