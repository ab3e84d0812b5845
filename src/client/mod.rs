pub mod pages_client;
#[cfg(test)]
pub mod test_utils;

pub use pages_client::PagesClient;

use crate::error::ApiError;
use crate::models::{Deployment, Project};
use std::future::Future;

/// Calls the cleanup needs from the Pages API.
///
/// `PagesClient` talks HTTP; tests substitute scripted fakes.
pub trait DeploymentApi: Send + Sync {
    fn list_projects(&self) -> impl Future<Output = Result<Vec<Project>, ApiError>> + Send;

    /// One page of deployments, newest first. An empty page marks the end.
    fn list_deployments(
        &self,
        project: &str,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<Vec<Deployment>, ApiError>> + Send;

    /// Total deployments the API reports for a project.
    fn deployment_count(&self, project: &str)
    -> impl Future<Output = Result<u64, ApiError>> + Send;

    fn delete_deployment(
        &self,
        project: &str,
        deployment_id: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
