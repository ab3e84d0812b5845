//! Scripted in-memory `DeploymentApi` for service tests.

use chrono::{Duration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::DeploymentApi;
use crate::error::ApiError;
use crate::models::deployment::{DeploymentTrigger, Stage};
use crate::models::{Deployment, Project};

/// Deployment created `minutes` after a fixed epoch; larger means newer.
pub fn deployment(id: &str, minutes: i64) -> Deployment {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Deployment {
        id: id.to_string(),
        created_on: base + Duration::minutes(minutes),
        latest_stage: Some(Stage {
            status: Some("success".to_string()),
        }),
        deployment_trigger: Some(DeploymentTrigger {
            trigger_type: Some("github:push".to_string()),
        }),
        aliases: Vec::new(),
    }
}

pub fn active(mut deployment: Deployment) -> Deployment {
    deployment.latest_stage = Some(Stage {
        status: Some("ACTIVE".to_string()),
    });
    deployment
}

pub fn production(mut deployment: Deployment) -> Deployment {
    deployment.deployment_trigger = Some(DeploymentTrigger {
        trigger_type: Some("production".to_string()),
    });
    deployment
}

pub fn aliased(mut deployment: Deployment, alias: &str) -> Deployment {
    deployment.aliases = vec![alias.to_string()];
    deployment
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListProjects,
    ListPage { project: String, page: u32 },
    Count { project: String },
    Delete { project: String, id: String },
}

#[derive(Debug, Clone)]
pub enum DeleteFailure {
    Rejected(String),
    Status(u16),
}

#[derive(Default)]
struct FakeState {
    projects: Option<Vec<String>>,
    pages: HashMap<String, Vec<Vec<Deployment>>>,
    page_failures: HashMap<(String, u32), u32>,
    broken_projects: HashSet<String>,
    counts: HashMap<String, u64>,
    delete_failures: HashMap<String, DeleteFailure>,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(self, names: &[&str]) -> Self {
        self.state.lock().unwrap().projects =
            Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    /// Pages served in order; anything past the last page is empty.
    pub fn with_pages(self, project: &str, pages: Vec<Vec<Deployment>>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state
                .counts
                .insert(project.to_string(), pages.iter().map(Vec::len).sum::<usize>() as u64);
            state.pages.insert(project.to_string(), pages);
        }
        self
    }

    /// Fail the given page with HTTP 500 `times` times before serving it.
    pub fn fail_page(self, project: &str, page: u32, times: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .page_failures
            .insert((project.to_string(), page), times);
        self
    }

    /// Every listing and count request for the project fails.
    pub fn broken(self, project: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .broken_projects
            .insert(project.to_string());
        self
    }

    pub fn fail_delete(self, id: &str, failure: DeleteFailure) -> Self {
        self.state
            .lock()
            .unwrap()
            .delete_failures
            .insert(id.to_string(), failure);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn deleted_ids(&self, project: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete { project: p, id } if p == project => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn page_requests(&self, project: &str) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::ListPage { project: p, page } if p == project => Some(page),
                _ => None,
            })
            .collect()
    }
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        message: "Internal error".to_string(),
    }
}

impl DeploymentApi for FakeApi {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListProjects);
        match &state.projects {
            Some(names) => Ok(names
                .iter()
                .map(|name| Project { name: name.clone() })
                .collect()),
            None => Err(server_error()),
        }
    }

    async fn list_deployments(
        &self,
        project: &str,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<Deployment>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListPage {
            project: project.to_string(),
            page,
        });

        if state.broken_projects.contains(project) {
            return Err(server_error());
        }
        if let Some(remaining) = state.page_failures.get_mut(&(project.to_string(), page)) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(server_error());
            }
        }

        let Some(pages) = state.pages.get(project) else {
            return Err(ApiError::Status {
                status: 404,
                message: "Project not found".to_string(),
            });
        };
        Ok(pages
            .get(page.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_default())
    }

    async fn deployment_count(&self, project: &str) -> Result<u64, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Count {
            project: project.to_string(),
        });
        if state.broken_projects.contains(project) {
            return Err(server_error());
        }
        Ok(state.counts.get(project).copied().unwrap_or(0))
    }

    async fn delete_deployment(&self, project: &str, deployment_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            project: project.to_string(),
            id: deployment_id.to_string(),
        });
        match state.delete_failures.get(deployment_id) {
            Some(DeleteFailure::Rejected(message)) => Err(ApiError::Rejected {
                messages: vec![message.clone()],
            }),
            Some(DeleteFailure::Status(status)) => Err(ApiError::Status {
                status: *status,
                message: String::new(),
            }),
            None => Ok(()),
        }
    }
}
