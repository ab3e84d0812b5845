use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::DeploymentApi;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{ApiEnvelope, ApiMessage, Deployment, Project};

const ERROR_BODY_LIMIT: usize = 200;

#[derive(Clone)]
pub struct PagesClient {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
    api_token: String,
}

impl PagesClient {
    pub fn new(
        base_url: &str,
        account_id: &str,
        api_token: &str,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pages-pruner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            &config.api_base_url,
            &config.account_id,
            &config.api_token,
            config.request_timeout(),
        )
    }

    /// `{base}/accounts/{account}/pages/projects/{segments...}`, each segment path-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::Url(format!("{}: {}", self.base_url, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::Url(format!("{} cannot be a base URL", self.base_url)))?;
            path.pop_if_empty()
                .extend(["accounts", self.account_id.as_str(), "pages", "projects"])
                .extend(segments);
        }
        Ok(url)
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<String, ApiError> {
        let response = self
            .http
            .request(method, url)
            .bearer_auth(&self.api_token)
            .query(query)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(body)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let body = self.execute(Method::GET, url, query).await?;
        decode_envelope(&body)
    }
}

impl DeploymentApi for PagesClient {
    async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        let url = self.endpoint(&[])?;
        let envelope = self.get::<Vec<Project>>(url, &[]).await?;
        envelope
            .result
            .ok_or_else(|| ApiError::Decode("project listing has no result".to_string()))
    }

    async fn list_deployments(
        &self,
        project: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Deployment>, ApiError> {
        let url = self.endpoint(&[project, "deployments"])?;
        let query = [
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
            ("sort_by", "created_on".to_string()),
            ("sort_order", "desc".to_string()),
        ];
        let envelope = self.get::<Vec<Deployment>>(url, &query).await?;
        envelope.result.ok_or_else(|| {
            ApiError::Decode(format!("deployment page {} has no result", page))
        })
    }

    async fn deployment_count(&self, project: &str) -> Result<u64, ApiError> {
        let url = self.endpoint(&[project, "deployments"])?;
        let query = [("page", "1".to_string()), ("per_page", "1".to_string())];
        let envelope = self.get::<serde_json::Value>(url, &query).await?;
        Ok(envelope
            .result_info
            .and_then(|info| info.total_count)
            .unwrap_or(0))
    }

    async fn delete_deployment(&self, project: &str, deployment_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&[project, "deployments", deployment_id])?;
        let body = self.execute(Method::DELETE, url, &[]).await?;
        if body.trim().is_empty() {
            return Ok(());
        }
        decode_envelope::<serde_json::Value>(&body)?;
        Ok(())
    }
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<ApiEnvelope<T>, ApiError> {
    let envelope: ApiEnvelope<T> =
        serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    if !envelope.success {
        return Err(ApiError::Rejected {
            messages: envelope.error_messages(),
        });
    }
    Ok(envelope)
}

/// First API error message when the body is an envelope, otherwise the raw body.
fn error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body) {
        if let Some(first) = envelope.errors.first() {
            return ApiMessage::describe(first);
        }
    }
    body.trim().chars().take(ERROR_BODY_LIMIT).collect()
}
