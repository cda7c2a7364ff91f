//! Domain service for the news feed.

use thiserror::Error;

use crate::db::{NewsItem, User};
use crate::entities::news;

/// Longest accepted title, matching the column width.
pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for NewsError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for NewsError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Listing and publishing news. Authorization is the caller's job.
#[async_trait::async_trait]
pub trait NewsService: Send + Sync {
    /// Every item, newest first.
    async fn list_news(&self) -> Result<Vec<NewsItem>, NewsError>;

    /// Publishes a new item attributed to `author`.
    ///
    /// # Errors
    ///
    /// Returns [`NewsError::Validation`] when the trimmed title or text is
    /// empty, or the title is too long. Nothing is written in that case.
    async fn publish(
        &self,
        title: &str,
        text: &str,
        author: &User,
    ) -> Result<news::Model, NewsError>;
}
