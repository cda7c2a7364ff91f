//! Domain service for authentication and account management.
//!
//! Handles registration, credential checks and password storage. Session
//! handling stays in the HTTP layer.

use thiserror::Error;

use crate::db::User;

/// Longest accepted username, matching the column width.
pub const MAX_USERNAME_LEN: usize = 64;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username and wrong password share this variant on purpose.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("{0}")]
    Validation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl AuthError {
    /// Whether the message is meant for the visitor rather than the logs.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::UsernameTaken | Self::Validation(_)
        )
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and returns the matching user.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown username and
    /// for a wrong password alike.
    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError>;

    /// Creates a regular (non-admin) account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] for empty or oversized fields and
    /// [`AuthError::UsernameTaken`] when the name exists.
    async fn register(&self, username: &str, password: &str) -> Result<User, AuthError>;

    /// Resolves a session's user id to an account, if it still exists.
    async fn resolve(&self, user_id: i32) -> Result<Option<User>, AuthError>;

    /// Hashes and stores a new password for the user.
    async fn set_password(&self, user_id: i32, password: &str) -> Result<(), AuthError>;

    /// Checks a password against the stored hash. No side effects.
    async fn check_password(&self, user_id: i32, password: &str) -> Result<bool, AuthError>;
}
