use crate::client::DeploymentApi;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{CleanupCheck, ProjectReport, RunSummary};
use crate::services::executor::DeletionExecutor;
use crate::services::fetcher::DeploymentFetcher;
use crate::services::retention;
use crate::services::retry::with_retry;

/// Runs fetch, classify and delete for each project in turn.
///
/// Projects are independent: a failure in one is recorded in the summary and
/// the next project is processed as usual.
pub struct CleanupService<A> {
    api: A,
    config: Config,
}

impl<A: DeploymentApi> CleanupService<A> {
    pub fn new(api: A, config: Config) -> Self {
        Self { api, config }
    }

    #[cfg(test)]
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Configured projects, or every project in the account when none are configured.
    pub async fn resolve_projects(&self) -> Result<Vec<String>> {
        if !self.config.projects.is_empty() {
            return Ok(self.config.projects.clone());
        }
        self.discover_projects().await
    }

    pub async fn discover_projects(&self) -> Result<Vec<String>> {
        let projects = with_retry(&self.config.retry, "*", "list_projects", |_| {
            self.api.list_projects()
        })
        .await
        .map_err(|e| AppError::Discovery(Box::new(e)))?;

        let names: Vec<String> = projects.into_iter().map(|project| project.name).collect();
        tracing::info!(count = names.len(), "Discovered Pages projects");
        Ok(names)
    }

    pub async fn run(&self, projects: &[String], keep_count: usize) -> RunSummary {
        let mut summary = RunSummary::default();

        for project in projects {
            let report = match self.process_project(project, keep_count).await {
                Ok(report) => report,
                Err(err) => {
                    tracing::error!(project = %project, error = %err, "Skipping project");
                    ProjectReport::failed(project, err.to_string())
                }
            };
            summary.push(report);
        }

        tracing::info!(
            projects = summary.totals.projects,
            projects_failed = summary.totals.projects_failed,
            deleted = summary.totals.deleted,
            failed = summary.totals.failed,
            kept = summary.totals.kept,
            "Cleanup run finished"
        );
        summary
    }

    async fn process_project(&self, project: &str, keep_count: usize) -> Result<ProjectReport> {
        tracing::info!(project, keep_count, "Processing project");

        let deployments = DeploymentFetcher::new(&self.api, &self.config)
            .fetch_all(project)
            .await?;
        let fetched = deployments.len();

        let plan = retention::classify(&deployments, keep_count);
        for protected in &plan.protected {
            tracing::info!(
                project,
                deployment_id = %protected.id,
                reasons = ?protected.reasons,
                "Keeping protected deployment outside retention window"
            );
        }

        if plan.is_noop() {
            tracing::info!(project, fetched, "Nothing to delete");
            return Ok(ProjectReport::completed(
                project,
                fetched,
                plan.keep.len(),
                plan.protected,
                Vec::new(),
            ));
        }

        tracing::info!(
            project,
            fetched,
            keep = plan.keep.len(),
            delete = plan.delete.len(),
            "Deleting stale deployments"
        );
        let outcomes = DeletionExecutor::new(&self.api, &self.config)
            .delete_all(project, &plan.delete)
            .await;

        Ok(ProjectReport::completed(
            project,
            fetched,
            plan.keep.len(),
            plan.protected,
            outcomes,
        ))
    }

    /// `check` over the resolved projects. When they cannot be resolved the
    /// answer is `unavailable` with the reason, so callers still get an answer.
    pub async fn check_all(&self, keep_count: usize) -> CleanupCheck {
        match self.resolve_projects().await {
            Ok(projects) => self.check(&projects, keep_count).await,
            Err(err) => {
                tracing::error!(error = %err, "Cannot resolve projects to check");
                CleanupCheck::unavailable(err.to_string())
            }
        }
    }

    /// Whether any project holds more than `keep_count` deployments.
    ///
    /// Stops at the first project over the limit. A count that cannot be read
    /// is logged and treated as zero.
    pub async fn check(&self, projects: &[String], keep_count: usize) -> CleanupCheck {
        for (index, project) in projects.iter().enumerate() {
            let count = match self.api.deployment_count(project).await {
                Ok(count) => count,
                Err(err) => {
                    tracing::warn!(
                        project = %project,
                        error = %err,
                        "Failed to read deployment count"
                    );
                    0
                }
            };
            tracing::debug!(project = %project, count, "Deployment count");

            if count > keep_count as u64 {
                return CleanupCheck::needed(project);
            }

            if index + 1 < projects.len() {
                tokio::time::sleep(self.config.check_delay()).await;
            }
        }

        CleanupCheck::not_needed()
    }
}
