use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokenrelay_core::{AppError, AppResult, ProjectId};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

struct ScheduledJob {
    project_id: ProjectId,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
    registered: Mutex<HashSet<ProjectId>>,
    jobs: Mutex<Vec<ScheduledJob>>,
}

/// Registry of recurring renewal jobs keyed by project.
///
/// Registration is monotonic: once a project is registered it stays
/// registered for the life of the process, so discovery never schedules it
/// twice. Each job runs on its own task and fires independently of discovery
/// and of every other job.
#[derive(Clone, Default)]
pub struct RenewalScheduler {
    state: Arc<SchedulerState>,
}

impl RenewalScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project and returns false when it was already registered.
    pub async fn register_if_absent(&self, project_id: ProjectId) -> bool {
        self.state.registered.lock().await.insert(project_id)
    }

    /// Returns whether a project has been registered.
    pub async fn is_registered(&self, project_id: ProjectId) -> bool {
        self.state.registered.lock().await.contains(&project_id)
    }

    /// Runs `action` every `period`, first firing one period from now.
    ///
    /// The action owns its error handling; the timer keeps firing whatever the
    /// action does. Missed ticks are delayed rather than replayed in a burst.
    pub async fn schedule_recurring<F, Fut>(
        &self,
        project_id: ProjectId,
        period: Duration,
        action: F,
    ) -> AppResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(AppError::Validation(format!(
                "renewal period for project {project_id} must be greater than zero"
            )));
        }

        let first_tick = Instant::now().checked_add(period).ok_or_else(|| {
            AppError::Validation(format!(
                "renewal period for project {project_id} is too large to schedule"
            ))
        })?;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                debug!(project_id = %project_id, "renewal fired");
                action().await;
            }
        });

        self.state
            .jobs
            .lock()
            .await
            .push(ScheduledJob { project_id, handle });

        Ok(())
    }

    /// Returns the number of live recurring jobs.
    pub async fn scheduled_job_count(&self) -> usize {
        self.state
            .jobs
            .lock()
            .await
            .iter()
            .filter(|job| !job.handle.is_finished())
            .count()
    }

    /// Stops every recurring job. Registrations are kept.
    pub async fn shutdown(&self) {
        let jobs = std::mem::take(&mut *self.state.jobs.lock().await);
        for job in jobs {
            debug!(project_id = %job.project_id, "stopping renewal job");
            job.handle.abort();
        }
    }
}
