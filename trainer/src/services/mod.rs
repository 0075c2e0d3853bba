//! External collaborators of the orchestrator.
//!
//! Both traits hide transport, encoding and reply formats. Implementations
//! must bound every call with a timeout; a timeout surfaces as an ordinary
//! `ServiceError`.
pub mod http;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Publishes and retracts training content (the LMS side).
#[async_trait]
pub trait ContentService: Send + Sync + 'static {
    /// Publishes `content` for `range_id`; returns the new activity id.
    async fn upload(&self, user: &str, content: &str, range_id: &str)
    -> Result<String, ServiceError>;

    async fn remove(&self, user: &str, range_id: &str, activity_id: &str)
    -> Result<(), ServiceError>;
}

/// Provisions and tears down cyber ranges.
#[async_trait]
pub trait InstantiationService: Send + Sync + 'static {
    /// Builds the range described by `range_doc`; returns the service's
    /// notification text.
    async fn instantiate(
        &self,
        user: &str,
        range_doc: &str,
        range_id: &str,
        progression: Option<&str>,
    ) -> Result<String, ServiceError>;

    async fn destroy(&self, user: &str, range_id: &str) -> Result<(), ServiceError>;

    /// Raw creation log, see `creation_log`.
    async fn creation_log(&self, user: &str, range_id: &str) -> Result<String, ServiceError>;
}
