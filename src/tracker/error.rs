use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse version store: {0}")]
    Parse(serde_json::Error),

    #[error("Failed to serialize version store: {0}")]
    Serialize(serde_json::Error),

    #[error("Failed to replace version store: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Version store lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{service} rate limit exceeded (retry after {retry_after_secs:?} seconds). Set GITHUB_TOKEN env var.")]
    RateLimited {
        service: &'static str,
        retry_after_secs: Option<u64>,
    },

    #[error("{service} error: {status} {reason}")]
    Api {
        service: &'static str,
        status: u16,
        reason: String,
    },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    NoMatch(String),

    #[error("Unknown custom fetcher: {0}")]
    UnknownStrategy(String),
}

impl ResolveError {
    pub(crate) fn api(service: &'static str, status: reqwest::StatusCode) -> Self {
        ResolveError::Api {
            service,
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("A check is already running")]
    AlreadyRunning,
}
