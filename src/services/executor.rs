use std::time::Duration;

use crate::client::DeploymentApi;
use crate::config::Config;
use crate::models::{DeletionOutcome, DeletionRecord};

const DRY_RUN_REASON: &str = "dry run";

/// Deletes deployments one after another, pacing the calls.
///
/// A failed delete is recorded and the batch moves on; it is never retried
/// here. The next run re-fetches and reconsiders it.
pub struct DeletionExecutor<'a, A> {
    api: &'a A,
    delay: Duration,
    dry_run: bool,
}

impl<'a, A: DeploymentApi> DeletionExecutor<'a, A> {
    pub fn new(api: &'a A, config: &Config) -> Self {
        Self {
            api,
            delay: config.delete_delay(),
            dry_run: config.dry_run,
        }
    }

    pub async fn delete_all(&self, project: &str, ids: &[String]) -> Vec<DeletionRecord> {
        let mut records = Vec::with_capacity(ids.len());

        for (index, id) in ids.iter().enumerate() {
            if self.dry_run {
                tracing::info!(project, deployment_id = %id, "Dry run, would delete deployment");
                records.push(DeletionRecord {
                    id: id.clone(),
                    outcome: DeletionOutcome::Skipped(DRY_RUN_REASON.to_string()),
                });
                continue;
            }

            tracing::info!(project, deployment_id = %id, "Deleting deployment");
            let outcome = match self.api.delete_deployment(project, id).await {
                Ok(()) => {
                    tracing::info!(project, deployment_id = %id, "Deleted deployment");
                    DeletionOutcome::Deleted
                }
                Err(err) => {
                    tracing::warn!(
                        project,
                        deployment_id = %id,
                        error = %err,
                        "Failed to delete deployment"
                    );
                    DeletionOutcome::Failed(err.reason())
                }
            };
            records.push(DeletionRecord {
                id: id.clone(),
                outcome,
            });

            if index + 1 < ids.len() {
                tokio::time::sleep(self.delay).await;
            }
        }

        records
    }
}
