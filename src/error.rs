use thiserror::Error;

/// Failure of a single call against the Pages API.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("API reported failure: {}", .messages.join("; "))]
    Rejected { messages: Vec<String> },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Invalid request URL: {0}")]
    Url(String),
}

impl ApiError {
    /// Short reason suitable for a per-deployment outcome.
    pub fn reason(&self) -> String {
        match self {
            ApiError::Status { status, message } if message.is_empty() => {
                format!("HTTP {}", status)
            }
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to fetch deployments for '{project}' (page {page}): {source}")]
    Fetch {
        project: String,
        page: u32,
        #[source]
        source: Box<AppError>,
    },

    #[error("Project discovery failed: {0}")]
    Discovery(#[source] Box<AppError>),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: ApiError },

    #[error("Pagination for '{project}' exceeded {max_pages} pages")]
    TooManyPages { project: String, max_pages: u32 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type Result<T> = std::result::Result<T, AppError>;
