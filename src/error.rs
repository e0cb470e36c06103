use thiserror::Error;

/// Failures from the storage collaborator. These abort the scoring or
/// evaluation call they happen in; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("malformed stored JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed stored timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("home not found: {0}")]
    HomeNotFound(String),
    #[error("database lock poisoned")]
    Poisoned,
    #[error("time window out of range")]
    WindowOutOfRange,
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The dedupe store could not answer the atomic admit check.
#[derive(Debug, Error)]
pub enum DedupeError {
    #[error("dedupe store unavailable: {0}")]
    Unavailable(String),
}

/// Webhook delivery failures. Only ever logged by the notifier worker.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("lookup failed: {0}")]
    Store(#[from] StoreError),
    #[error("carrier {0} has no webhook configured")]
    NoWebhook(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to serialize payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("webhook responded with status {0}")]
    Status(u16),
}
