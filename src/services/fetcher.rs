use std::collections::HashSet;
use std::time::Duration;

use crate::client::DeploymentApi;
use crate::config::{Config, RetryConfig};
use crate::error::{AppError, Result};
use crate::models::Deployment;
use crate::services::retry::with_retry;

/// Pulls a project's complete deployment history, one page at a time.
pub struct DeploymentFetcher<'a, A> {
    api: &'a A,
    per_page: u32,
    page_delay: Duration,
    max_pages: u32,
    retry: RetryConfig,
}

impl<'a, A: DeploymentApi> DeploymentFetcher<'a, A> {
    pub fn new(api: &'a A, config: &Config) -> Self {
        Self {
            api,
            per_page: config.per_page,
            page_delay: config.page_delay(),
            max_pages: config.max_pages,
            retry: config.retry.clone(),
        }
    }

    /// Fetch every page until one comes back empty.
    ///
    /// A page that exhausts its retry budget fails the whole project; no
    /// partial list is ever returned.
    pub async fn fetch_all(&self, project: &str) -> Result<Vec<Deployment>> {
        let mut deployments = Vec::new();
        let mut page = 1u32;

        loop {
            let records = with_retry(&self.retry, project, "list_deployments", |attempt| {
                tracing::debug!(project, page, attempt, "Fetching deployment page");
                self.api.list_deployments(project, page, self.per_page)
            })
            .await
            .map_err(|e| AppError::Fetch {
                project: project.to_string(),
                page,
                source: Box::new(e),
            })?;

            if records.is_empty() {
                break;
            }

            tracing::debug!(project, page, count = records.len(), "Fetched deployment page");
            deployments.extend(records);

            if page >= self.max_pages {
                return Err(AppError::TooManyPages {
                    project: project.to_string(),
                    max_pages: self.max_pages,
                });
            }
            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        let total = deployments.len();
        let mut seen = HashSet::new();
        deployments.retain(|deployment| seen.insert(deployment.id.clone()));
        if deployments.len() != total {
            tracing::warn!(
                project,
                dropped = total - deployments.len(),
                "Listing returned duplicate deployment ids; keeping first occurrence"
            );
        }

        tracing::info!(
            project,
            count = deployments.len(),
            pages = page,
            "Fetched deployments"
        );
        Ok(deployments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_utils::{Call, FakeApi, deployment};

    fn test_config() -> Config {
        Config {
            account_id: "account".into(),
            api_token: "token".into(),
            per_page: 2,
            page_delay_ms: 0,
            delete_delay_ms: 0,
            check_delay_ms: 0,
            retry: RetryConfig {
                max_attempts: 5,
                initial_delay_ms: 0,
                max_delay_ms: 0,
                backoff_multiplier: 2.0,
                jitter: 0.0,
            },
            ..Config::default()
        }
    }

    fn ids(deployments: &[Deployment]) -> Vec<&str> {
        deployments.iter().map(|d| d.id.as_str()).collect()
    }

    #[tokio::test]
    async fn collects_pages_until_empty() {
        let api = FakeApi::new().with_pages(
            "docs",
            vec![
                vec![deployment("e", 5), deployment("d", 4)],
                vec![deployment("c", 3), deployment("b", 2)],
                vec![deployment("a", 1)],
            ],
        );
        let config = test_config();

        let deployments = DeploymentFetcher::new(&api, &config)
            .fetch_all("docs")
            .await
            .unwrap();

        assert_eq!(ids(&deployments), vec!["e", "d", "c", "b", "a"]);
        // A short page is not the end; only the empty fourth page is.
        assert_eq!(api.page_requests("docs"), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn empty_project_stops_after_first_page() {
        let api = FakeApi::new().with_pages("docs", Vec::new());
        let config = test_config();

        let deployments = DeploymentFetcher::new(&api, &config)
            .fetch_all("docs")
            .await
            .unwrap();

        assert!(deployments.is_empty());
        assert_eq!(api.page_requests("docs"), vec![1]);
    }

    #[tokio::test]
    async fn retried_page_is_not_duplicated() {
        let api = FakeApi::new()
            .with_pages(
                "docs",
                vec![
                    vec![deployment("d", 4), deployment("c", 3)],
                    vec![deployment("b", 2), deployment("a", 1)],
                ],
            )
            .fail_page("docs", 2, 3);
        let config = test_config();

        let deployments = DeploymentFetcher::new(&api, &config)
            .fetch_all("docs")
            .await
            .unwrap();

        assert_eq!(ids(&deployments), vec!["d", "c", "b", "a"]);
        assert_eq!(api.page_requests("docs"), vec![1, 2, 2, 2, 2, 3]);
    }

    #[tokio::test]
    async fn retry_budget_resets_per_page() {
        let api = FakeApi::new()
            .with_pages(
                "docs",
                vec![vec![deployment("b", 2)], vec![deployment("a", 1)]],
            )
            .fail_page("docs", 1, 4)
            .fail_page("docs", 2, 4);
        let config = test_config();

        let deployments = DeploymentFetcher::new(&api, &config)
            .fetch_all("docs")
            .await
            .unwrap();

        assert_eq!(ids(&deployments), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn exhausted_page_fails_whole_project() {
        let api = FakeApi::new()
            .with_pages(
                "docs",
                vec![vec![deployment("b", 2)], vec![deployment("a", 1)]],
            )
            .fail_page("docs", 2, 5);
        let config = test_config();

        let err = DeploymentFetcher::new(&api, &config)
            .fetch_all("docs")
            .await
            .unwrap_err();

        match err {
            AppError::Fetch {
                project,
                page,
                source,
            } => {
                assert_eq!(project, "docs");
                assert_eq!(page, 2);
                assert!(matches!(*source, AppError::RetryExhausted { attempts: 5, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let attempts = api
            .calls()
            .into_iter()
            .filter(|call| matches!(call, Call::ListPage { page: 2, .. }))
            .count();
        assert_eq!(attempts, 5);
    }

    #[tokio::test]
    async fn page_ceiling_stops_runaway_pagination() {
        let pages = (0..10)
            .map(|index| vec![deployment(&format!("d{index}"), index)])
            .collect();
        let api = FakeApi::new().with_pages("docs", pages);
        let config = Config {
            max_pages: 3,
            ..test_config()
        };

        let err = DeploymentFetcher::new(&api, &config)
            .fetch_all("docs")
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TooManyPages { max_pages: 3, .. }));
        assert_eq!(api.page_requests("docs"), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn duplicate_ids_across_pages_are_dropped() {
        let api = FakeApi::new().with_pages(
            "docs",
            vec![
                vec![deployment("c", 3), deployment("b", 2)],
                vec![deployment("b", 2), deployment("a", 1)],
            ],
        );
        let config = test_config();

        let deployments = DeploymentFetcher::new(&api, &config)
            .fetch_all("docs")
            .await
            .unwrap();

        assert_eq!(ids(&deployments), vec!["c", "b", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn pages_are_paced_outside_the_retry_budget() {
        let api = FakeApi::new()
            .with_pages(
                "docs",
                vec![
                    vec![deployment("d", 4), deployment("c", 3)],
                    vec![deployment("b", 2), deployment("a", 1)],
                ],
            )
            .fail_page("docs", 2, 4);
        let config = Config {
            page_delay_ms: 500,
            retry: RetryConfig {
                max_attempts: 5,
                initial_delay_ms: 100,
                max_delay_ms: 100,
                backoff_multiplier: 1.0,
                jitter: 0.0,
            },
            ..test_config()
        };

        let started = tokio::time::Instant::now();
        let deployments = DeploymentFetcher::new(&api, &config)
            .fetch_all("docs")
            .await
            .unwrap();
        let elapsed = started.elapsed();

        // Two inter-page waits plus four backoffs on page 2.
        assert_eq!(ids(&deployments), vec!["d", "c", "b", "a"]);
        assert_eq!(api.page_requests("docs"), vec![1, 2, 2, 2, 2, 2, 3]);
        assert!(elapsed >= Duration::from_millis(1400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");
    }
}
