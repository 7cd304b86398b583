use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::db::Store;
use crate::services::maintenance::deactivate_inactive_users;

const DEACTIVATION_JOB: &str = "deactivate_inactive_users";

pub struct Scheduler {
    store: Store,
    config: SchedulerConfig,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    #[must_use]
    pub fn new(store: Store, config: SchedulerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            config,
            shutdown,
        }
    }

    /// Runs until [`Scheduler::stop`] is called.
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        let stop = self.shutdown.subscribe();
        if *stop.borrow() {
            return Ok(());
        }

        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.deactivation_cron {
            self.run_with_cron(cron_expr, stop).await
        } else {
            self.run_with_interval(stop).await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str, mut stop: watch::Receiver<bool>) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let store = self.store.clone();
        let inactive_days = self.config.inactive_days;

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let store = store.clone();
            Box::pin(async move {
                run_deactivation(&store, inactive_days).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", cron_expr);

        // Also returns when the sender is dropped
        let _ = stop.changed().await;

        sched.shutdown().await?;
        info!("Scheduler stopped");
        Ok(())
    }

    async fn run_with_interval(&self, mut stop: watch::Receiver<bool>) -> Result<()> {
        let hours = self.config.deactivation_interval_hours.max(1);
        info!("Scheduler running: deactivation every {}h", hours);

        let mut ticker = interval(Duration::from_secs(u64::from(hours) * 60 * 60));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_deactivation(&self.store, self.config.inactive_days).await;
                }
                _ = stop.changed() => break,
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping scheduler...");
        self.shutdown.send_replace(true);
    }

    /// Runs the deactivation job once, outside the schedule.
    pub async fn run_once(&self) -> Result<u64> {
        deactivate_inactive_users(&self.store, chrono::Utc::now(), self.config.inactive_days).await
    }
}

async fn run_deactivation(store: &Store, inactive_days: i64) {
    let start = std::time::Instant::now();
    info!(
        event = "job_started",
        job_name = DEACTIVATION_JOB,
        "Starting scheduled user deactivation"
    );

    match deactivate_inactive_users(store, chrono::Utc::now(), inactive_days).await {
        Ok(deactivated) => info!(
            event = "job_finished",
            job_name = DEACTIVATION_JOB,
            deactivated,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Scheduled user deactivation finished"
        ),
        Err(e) => error!(
            event = "job_failed",
            job_name = DEACTIVATION_JOB,
            error = %e,
            "Scheduled user deactivation failed"
        ),
    }
}
