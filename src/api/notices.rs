//! One-time notices shown on the next rendered page.
//!
//! A handler that redirects pushes its notice into the visitor's session; the
//! page rendered next takes every pending notice out, so each one is seen
//! exactly once.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::ApiError;

const NOTICES_KEY: &str = "notices";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

impl NoticeLevel {
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Info => "notice notice-info",
            Self::Success => "notice notice-success",
            Self::Error => "notice notice-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Queues a notice for the next rendered page.
pub async fn push(session: &Session, notice: Notice) -> Result<(), ApiError> {
    let mut pending = session
        .get::<Vec<Notice>>(NOTICES_KEY)
        .await?
        .unwrap_or_default();
    pending.push(notice);
    session.insert(NOTICES_KEY, pending).await?;
    Ok(())
}

/// Removes and returns every pending notice.
pub async fn take(session: &Session) -> Result<Vec<Notice>, ApiError> {
    Ok(session
        .remove::<Vec<Notice>>(NOTICES_KEY)
        .await?
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_notices_are_consumed_once() {
        let session = session();

        push(&session, Notice::error("Access denied")).await.unwrap();
        push(&session, Notice::info("Second")).await.unwrap();

        let first = take(&session).await.unwrap();
        assert_eq!(
            first,
            vec![Notice::error("Access denied"), Notice::info("Second")]
        );

        assert!(take(&session).await.unwrap().is_empty());
    }

    #[test]
    fn test_level_classes() {
        assert_eq!(NoticeLevel::Success.css_class(), "notice notice-success");
        assert_eq!(NoticeLevel::Error.css_class(), "notice notice-error");
    }
}
