//! Repository traits describing content adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{conversion::ConversionModel, route::Route};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid content item `{path}`: {message}")]
    InvalidContent { path: String, message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Source of read-only conversion models keyed by host and route.
#[async_trait]
pub trait ConversionModelRepo: Send + Sync {
    /// Resolve the item at `route` for `hostname`; `Ok(None)` when nothing lives there.
    async fn find_conversion_model(
        &self,
        hostname: &str,
        route: &Route,
    ) -> Result<Option<ConversionModel>, RepoError>;
}
