use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
const DEFAULT_CONFIG_FILE: &str = "pages-pruner.json";
const MAX_PER_PAGE: u32 = 100;

const ENV_API_TOKEN: &str = "CF_API_TOKEN";
const ENV_ACCOUNT_ID: &str = "CF_ACCOUNT_ID";
const ENV_PROJECT_NAME: &str = "CF_PROJECT_NAME";
const ENV_PROJECTS: &str = "PAGES_PRUNER_PROJECTS";
const ENV_KEEP: &str = "PAGES_PRUNER_KEEP";
const ENV_PER_PAGE: &str = "PAGES_PRUNER_PER_PAGE";
const ENV_API_BASE_URL: &str = "PAGES_PRUNER_API_BASE_URL";

#[derive(Clone)]
pub struct Config {
    pub account_id: String,
    pub api_token: String,
    pub api_base_url: String,
    pub keep_count: usize,
    pub per_page: u32,
    /// Explicit targets; empty means "discover every project in the account".
    pub projects: Vec<String>,
    pub page_delay_ms: u64,
    pub delete_delay_ms: u64,
    pub check_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub max_pages: u32,
    pub dry_run: bool,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            api_token: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            keep_count: 3,
            per_page: 25,
            projects: Vec::new(),
            page_delay_ms: 500,
            delete_delay_ms: 1000,
            check_delay_ms: 300,
            request_timeout_secs: 30,
            max_pages: 1000,
            dry_run: false,
            retry: RetryConfig::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("account_id", &self.account_id)
            .field("api_token", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("keep_count", &self.keep_count)
            .field("per_page", &self.per_page)
            .field("projects", &self.projects)
            .field("page_delay_ms", &self.page_delay_ms)
            .field("delete_delay_ms", &self.delete_delay_ms)
            .field("check_delay_ms", &self.check_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_pages", &self.max_pages)
            .field("dry_run", &self.dry_run)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Values supplied on the command line. They win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub keep_count: Option<usize>,
    pub per_page: Option<u32>,
    pub projects: Vec<String>,
    pub dry_run: bool,
}

impl Config {
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let file_config = match &overrides.config_path {
            Some(path) => Some(Self::read_file(path)?),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Some(Self::read_file(path)?)
                } else {
                    None
                }
            }
        };

        Self::resolve(file_config, |key| std::env::var(key).ok(), overrides)
    }

    pub fn resolve<F>(
        file_config: Option<FileConfig>,
        env: F,
        overrides: &Overrides,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(file_config) = file_config {
            config.apply_file(file_config);
        }
        config.apply_env(env)?;
        config.apply_overrides(overrides);

        config.validate()?;
        Ok(config)
    }

    pub fn read_file(path: &Path) -> Result<FileConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))
            .map_err(|e| AppError::Configuration(format!("{:#}", e)))?;
        let file_config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
            .map_err(|e| AppError::Configuration(format!("{:#}", e)))?;
        Ok(file_config)
    }

    fn apply_file(&mut self, file_config: FileConfig) {
        if let Some(account_id) = file_config.account_id {
            self.account_id = account_id;
        }
        if let Some(api_token) = file_config.api_token {
            self.api_token = api_token;
        }
        if let Some(api_base_url) = file_config.api_base_url {
            self.api_base_url = api_base_url;
        }
        if let Some(keep_count) = file_config.keep_count {
            self.keep_count = keep_count;
        }
        if let Some(per_page) = file_config.per_page {
            self.per_page = per_page;
        }
        if let Some(projects) = file_config.projects {
            self.projects = projects;
        }
        if let Some(page_delay_ms) = file_config.page_delay_ms {
            self.page_delay_ms = page_delay_ms;
        }
        if let Some(delete_delay_ms) = file_config.delete_delay_ms {
            self.delete_delay_ms = delete_delay_ms;
        }
        if let Some(check_delay_ms) = file_config.check_delay_ms {
            self.check_delay_ms = check_delay_ms;
        }
        if let Some(request_timeout_secs) = file_config.request_timeout_secs {
            self.request_timeout_secs = request_timeout_secs;
        }
        if let Some(max_pages) = file_config.max_pages {
            self.max_pages = max_pages;
        }
        if let Some(dry_run) = file_config.dry_run {
            self.dry_run = dry_run;
        }
        if let Some(retry) = file_config.retry {
            self.retry = retry;
        }
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = env(ENV_API_TOKEN) {
            self.api_token = token;
        }
        if let Some(account_id) = env(ENV_ACCOUNT_ID) {
            self.account_id = account_id;
        }
        if let Some(base_url) = env(ENV_API_BASE_URL) {
            self.api_base_url = base_url;
        }
        // A blank list variable counts as unset so it never widens the run to every project.
        let projects = [ENV_PROJECTS, ENV_PROJECT_NAME]
            .into_iter()
            .filter_map(|key| env(key))
            .map(|value| split_list(&value))
            .find(|list| !list.is_empty());
        if let Some(projects) = projects {
            self.projects = projects;
        }
        if let Some(keep) = env(ENV_KEEP) {
            self.keep_count = parse_env(ENV_KEEP, &keep)?;
        }
        if let Some(per_page) = env(ENV_PER_PAGE) {
            self.per_page = parse_env(ENV_PER_PAGE, &per_page)?;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(keep_count) = overrides.keep_count {
            self.keep_count = keep_count;
        }
        if let Some(per_page) = overrides.per_page {
            self.per_page = per_page;
        }
        if !overrides.projects.is_empty() {
            self.projects = overrides.projects.clone();
        }
        if overrides.dry_run {
            self.dry_run = true;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(AppError::Configuration(format!(
                "{} is missing or empty",
                ENV_API_TOKEN
            )));
        }
        if self.account_id.trim().is_empty() {
            return Err(AppError::Configuration(format!(
                "{} is missing or empty",
                ENV_ACCOUNT_ID
            )));
        }
        match reqwest::Url::parse(&self.api_base_url) {
            Ok(url) if !url.cannot_be_a_base() => {}
            Ok(_) => {
                return Err(AppError::Configuration(format!(
                    "api_base_url '{}' cannot carry a path",
                    self.api_base_url
                )));
            }
            Err(err) => {
                return Err(AppError::Configuration(format!(
                    "api_base_url '{}' is not a valid URL: {}",
                    self.api_base_url, err
                )));
            }
        }
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(AppError::Configuration(format!(
                "per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE, self.per_page
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_pages == 0 {
            return Err(AppError::Configuration(
                "max_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn delete_delay(&self) -> Duration {
        Duration::from_millis(self.delete_delay_ms)
    }

    pub fn check_delay(&self) -> Duration {
        Duration::from_millis(self.check_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Backoff settings for page fetches.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per request, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Random jitter as a fraction of the delay (0.0-1.0).
    #[serde(default)]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    /// Delay before the retry that follows `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let jitter_range = capped_delay * self.jitter.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            use rand::Rng;
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        let final_delay = (capped_delay + jitter).max(0.0);
        Duration::from_millis(final_delay as u64)
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    account_id: Option<String>,
    api_token: Option<String>,
    api_base_url: Option<String>,
    keep_count: Option<usize>,
    per_page: Option<u32>,
    projects: Option<Vec<String>>,
    page_delay_ms: Option<u64>,
    delete_delay_ms: Option<u64>,
    check_delay_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    max_pages: Option<u32>,
    dry_run: Option<bool>,
    retry: Option<RetryConfig>,
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::Configuration(format!("Invalid {} '{}': {}", key, value, e)))
}
