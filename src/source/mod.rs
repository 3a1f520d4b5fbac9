//! Content-source seam: the trait the core talks to, its error taxonomy and
//! the bounded re-authentication wrapper.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{ContentItem, ItemId, StoryItem};

pub mod http;
pub mod model;

pub use http::HttpContentSource;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The session is no longer valid; re-authenticate and retry once.
    #[error("content source session expired")]
    AuthExpired,
    #[error("target {0} not found")]
    TargetNotFound(String),
    #[error("content source request failed: {0}")]
    Transient(String),
}

impl SourceError {
    pub fn transient(err: impl std::fmt::Display) -> Self {
        SourceError::Transient(err.to_string())
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::transient(err)
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::transient(err)
    }
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Start a fresh session with the configured credentials.
    async fn authenticate(&self) -> Result<(), SourceError>;

    /// Total number of posts published by `target`.
    async fn item_count(&self, target: &str) -> Result<u64, SourceError>;

    /// Posts with an id greater than `cursor`, optionally only those taken
    /// after `newer_than`. Media is staged locally before returning.
    async fn new_items_since(
        &self,
        target: &str,
        cursor: Option<&ItemId>,
        newer_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>, SourceError>;

    /// The post at zero-based feed position `index` (newest first).
    async fn item_at(&self, target: &str, index: u64) -> Result<Option<ContentItem>, SourceError>;

    /// Every story currently visible for `target`, staged into one directory.
    async fn ephemeral_items(&self, target: &str) -> Result<Vec<StoryItem>, SourceError>;
}

/// Run `call`; on [`SourceError::AuthExpired`] re-authenticate once and retry
/// once. A second expiry is returned to the caller.
pub async fn with_reauth<T, F, Fut>(source: &dyn ContentSource, mut call: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    match call().await {
        Err(SourceError::AuthExpired) => {
            warn!("content source session expired; re-authenticating");
            source.authenticate().await?;
            info!("re-authenticated; retrying request");
            call().await
        }
        other => other,
    }
}

/// Treat a missing target as an empty result.
pub fn or_empty<T: Default>(res: Result<T, SourceError>) -> Result<T, SourceError> {
    match res {
        Err(SourceError::TargetNotFound(target)) => {
            info!(handle = %target, "target not found; treating as empty");
            Ok(T::default())
        }
        other => other,
    }
}
