use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokenrelay_core::{AppResult, ProjectId};
use tokenrelay_domain::{GlobalSpec, LinkSpec};
use tracing::{debug, info, warn};

use crate::renewal_scheduler::RenewalScheduler;
use crate::rotation_ports::{PlatformProject, SecretIssuer, SourceControlPlatform};
use crate::secret_sync::sync_secret;

type RenewalFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Counters for one discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryTickSummary {
    /// Groups returned by the platform.
    pub groups_seen: usize,
    /// Projects returned across all groups.
    pub projects_seen: usize,
    /// Projects skipped because their resolved policy is disabled.
    pub disabled_skipped: usize,
    /// Projects skipped because a renewal job already exists.
    pub already_scheduled: usize,
    /// Projects that received a new renewal job.
    pub newly_scheduled: usize,
    /// Newly registered projects whose immediate sync did not land a secret.
    pub first_sync_failed: usize,
}

/// Discovers platform projects and keeps their CI secrets rotated.
#[derive(Clone)]
pub struct RotationService {
    policy: Arc<GlobalSpec>,
    platform: Arc<dyn SourceControlPlatform>,
    secret_issuer: Arc<dyn SecretIssuer>,
    scheduler: RenewalScheduler,
}

impl RotationService {
    /// Creates a rotation service with a fresh scheduler.
    #[must_use]
    pub fn new(
        policy: Arc<GlobalSpec>,
        platform: Arc<dyn SourceControlPlatform>,
        secret_issuer: Arc<dyn SecretIssuer>,
    ) -> Self {
        Self {
            policy,
            platform,
            secret_issuer,
            scheduler: RenewalScheduler::new(),
        }
    }

    /// Uses an existing scheduler instead of a fresh one.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: RenewalScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Returns the scheduler holding the renewal jobs.
    #[must_use]
    pub fn scheduler(&self) -> &RenewalScheduler {
        &self.scheduler
    }

    /// Runs one discovery pass over every group and project.
    ///
    /// A listing failure aborts the pass. Projects handled before the failure
    /// keep their registration and renewal job.
    pub async fn run_discovery_tick(&self) -> AppResult<DiscoveryTickSummary> {
        let groups = self.platform.list_groups().await.inspect_err(|error| {
            warn!(error = %error, "failed to list groups, discovery tick abandoned");
        })?;

        let mut summary = DiscoveryTickSummary {
            groups_seen: groups.len(),
            ..DiscoveryTickSummary::default()
        };

        for group in &groups {
            let projects = self.platform.list_projects(group).await.inspect_err(|error| {
                warn!(
                    group = %group.full_path,
                    error = %error,
                    "failed to list group projects, discovery tick abandoned"
                );
            })?;

            for project in projects {
                summary.projects_seen += 1;
                self.handle_project(project, &mut summary).await;
            }
        }

        Ok(summary)
    }

    async fn handle_project(&self, project: PlatformProject, summary: &mut DiscoveryTickSummary) {
        let link = self.policy.resolve(project.path_with_namespace.as_str());

        if !link.repository_spec().is_enabled() {
            debug!(
                project_id = %project.id,
                path = %project.path_with_namespace,
                "rotation disabled by policy"
            );
            summary.disabled_skipped += 1;
            return;
        }

        if !self.scheduler.register_if_absent(project.id).await {
            summary.already_scheduled += 1;
            return;
        }

        let link = Arc::new(link.clone());
        let first_sync = sync_secret(
            self.platform.as_ref(),
            self.secret_issuer.as_ref(),
            project.id,
            link.repository_spec().build_key().as_str(),
            link.token_spec(),
        )
        .await;
        if !first_sync.is_success() {
            summary.first_sync_failed += 1;
        }

        let renew_period = link.repository_spec().renew_period().clone();
        let renewal = renewal_action(
            Arc::clone(&self.platform),
            Arc::clone(&self.secret_issuer),
            project.id,
            Arc::clone(&link),
        );
        match self
            .scheduler
            .schedule_recurring(project.id, renew_period.duration(), renewal)
            .await
        {
            Ok(()) => {
                info!(
                    project_id = %project.id,
                    path = %project.path_with_namespace,
                    build_key = %link.repository_spec().build_key().as_str(),
                    renew_period = %renew_period,
                    "renewal scheduled"
                );
                summary.newly_scheduled += 1;
            }
            Err(error) => {
                warn!(
                    project_id = %project.id,
                    path = %project.path_with_namespace,
                    error = %error,
                    "failed to schedule renewal"
                );
            }
        }
    }
}

fn renewal_action(
    platform: Arc<dyn SourceControlPlatform>,
    secret_issuer: Arc<dyn SecretIssuer>,
    project_id: ProjectId,
    link: Arc<LinkSpec>,
) -> impl Fn() -> RenewalFuture + Send + Sync + 'static {
    move || -> RenewalFuture {
        let platform = Arc::clone(&platform);
        let secret_issuer = Arc::clone(&secret_issuer);
        let link = Arc::clone(&link);

        Box::pin(async move {
            sync_secret(
                platform.as_ref(),
                secret_issuer.as_ref(),
                project_id,
                link.repository_spec().build_key().as_str(),
                link.token_spec(),
            )
            .await;
        })
    }
}
