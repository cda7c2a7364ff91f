//! `SeaORM` implementation of the `AuthService` trait.

use anyhow::Context;
use async_trait::async_trait;
use tokio::task;

use crate::config::SecurityConfig;
use crate::db::repositories::user::{hash_password, verify_password_hash};
use crate::db::{Store, User};
use crate::services::auth_service::{AuthError, AuthService, MAX_USERNAME_LEN};

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    /// Argon2 is CPU-bound, so it runs off the async workers.
    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let security = self.security.clone();
        let hash = task::spawn_blocking(move || hash_password(&password, &security))
            .await
            .context("Password hashing task panicked")??;
        Ok(hash)
    }

    async fn verify(&self, password_hash: String, password: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let is_valid =
            task::spawn_blocking(move || verify_password_hash(&password_hash, &password))
                .await
                .context("Password verification task panicked")?;
        Ok(is_valid)
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();

        let Some(user) = self.store.get_user_by_username(username).await? else {
            // Spend comparable time on unknown names so they can't be probed.
            let _ = self.hash(password).await?;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.check_password(user.id, password).await? {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = username.trim();

        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Please fill in all fields".to_string()));
        }

        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(AuthError::Validation(format!(
                "Username must be at most {MAX_USERNAME_LEN} characters"
            )));
        }

        if self.store.get_user_by_username(username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self.hash(password).await?;

        self.store
            .create_user(username, &password_hash, false)
            .await?
            .ok_or(AuthError::UsernameTaken)
    }

    async fn resolve(&self, user_id: i32) -> Result<Option<User>, AuthError> {
        Ok(self.store.get_user_by_id(user_id).await?)
    }

    async fn set_password(&self, user_id: i32, password: &str) -> Result<(), AuthError> {
        if self.store.get_user_by_id(user_id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }

        let password_hash = self.hash(password).await?;
        self.store.set_password_hash(user_id, &password_hash).await?;

        Ok(())
    }

    async fn check_password(&self, user_id: i32, password: &str) -> Result<bool, AuthError> {
        let Some(password_hash) = self.store.get_password_hash(user_id).await? else {
            return Ok(false);
        };

        self.verify(password_hash, password).await
    }
}
