use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::{BootstrapConfig, SecurityConfig};
use crate::entities::news;

pub mod migrator;
pub mod repositories;

pub use repositories::news::NewsItem;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = sqlite_file_path(db_url);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)
                    .with_context(|| format!("Failed to create database file: {path_str}"))?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    /// The pool behind the SeaORM connection, shared with the session store.
    #[must_use]
    pub fn sqlite_pool(&self) -> &sea_orm::sqlx::SqlitePool {
        self.conn.get_sqlite_connection_pool()
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn news_repo(&self) -> repositories::news::NewsRepository {
        repositories::news::NewsRepository::new(self.conn.clone())
    }

    /// Seeds the admin account on an empty user table. Idempotent.
    pub async fn bootstrap_admin(
        &self,
        bootstrap: &BootstrapConfig,
        security: &SecurityConfig,
    ) -> Result<bool> {
        self.user_repo()
            .bootstrap_admin(
                bootstrap.admin_username.trim(),
                &bootstrap.admin_password,
                security,
            )
            .await
    }

    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<Option<User>> {
        self.user_repo()
            .create(username, password_hash, is_admin)
            .await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_password_hash(&self, user_id: i32) -> Result<Option<String>> {
        self.user_repo().get_password_hash(user_id).await
    }

    pub async fn set_password_hash(&self, user_id: i32, password_hash: &str) -> Result<()> {
        self.user_repo()
            .set_password_hash(user_id, password_hash)
            .await
    }

    pub async fn any_user_exists(&self) -> Result<bool> {
        self.user_repo().any_exists().await
    }

    pub async fn count_users(&self) -> Result<u64> {
        self.user_repo().count().await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn insert_news(
        &self,
        title: &str,
        text: &str,
        author_id: Option<i32>,
    ) -> Result<news::Model> {
        self.news_repo().insert(title, text, author_id).await
    }

    pub async fn list_news(&self) -> Result<Vec<NewsItem>> {
        self.news_repo().list_all().await
    }

    pub async fn count_news(&self) -> Result<u64> {
        self.news_repo().count().await
    }
}

/// Strips the scheme and any query string from a SQLite URL.
fn sqlite_file_path(db_url: &str) -> &str {
    let path = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
    path.split_once('?').map_or(path, |(path, _)| path)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> Store {
        let db_path =
            std::env::temp_dir().join(format!("varsite-db-test-{}.db", uuid::Uuid::new_v4()));
        Store::new(&format!("sqlite:{}", db_path.display()))
            .await
            .expect("failed to open store")
    }

    fn fast_security() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        }
    }

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(sqlite_file_path("sqlite:data/site.db"), "data/site.db");
        assert_eq!(sqlite_file_path("sqlite:///tmp/site.db"), "/tmp/site.db");
        assert_eq!(sqlite_file_path("sqlite:site.db?mode=rwc"), "site.db");
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let store = temp_store().await;
        let bootstrap = BootstrapConfig::default();

        assert!(!store.any_user_exists().await.unwrap());
        assert!(store.bootstrap_admin(&bootstrap, &fast_security()).await.unwrap());
        assert!(!store.bootstrap_admin(&bootstrap, &fast_security()).await.unwrap());

        let users = store.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "admin");
        assert!(users[0].is_admin);
    }

    #[tokio::test]
    async fn test_bootstrap_skips_populated_store() {
        let store = temp_store().await;
        store.create_user("alice", "x", false).await.unwrap();

        assert!(
            !store
                .bootstrap_admin(&BootstrapConfig::default(), &fast_security())
                .await
                .unwrap()
        );
        assert_eq!(store.count_users().await.unwrap(), 1);
        assert!(store.get_user_by_username("admin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_reported() {
        let store = temp_store().await;

        let alice = store.create_user("alice", "h1", false).await.unwrap();
        assert!(alice.is_some());
        assert!(store.create_user("alice", "h2", false).await.unwrap().is_none());
        // Usernames are case-sensitive.
        assert!(store.create_user("Alice", "h3", false).await.unwrap().is_some());
        assert_eq!(store.count_users().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_news_listed_newest_first_with_author() {
        let store = temp_store().await;
        let author = store
            .create_user("editor", "h", true)
            .await
            .unwrap()
            .unwrap();

        for i in 0..5 {
            store
                .insert_news(&format!("Title {i}"), "Body", Some(author.id))
                .await
                .unwrap();
        }
        store.insert_news("Anonymous", "Body", None).await.unwrap();

        let items = store.list_news().await.unwrap();
        assert_eq!(items.len(), 6);
        assert_eq!(items[0].title, "Anonymous");
        assert_eq!(items[0].author, None);
        assert_eq!(items[1].title, "Title 4");
        assert_eq!(items[1].author.as_deref(), Some("editor"));
        assert!(
            items
                .windows(2)
                .all(|w| (w[0].created_at, w[0].id) > (w[1].created_at, w[1].id))
        );
    }
}
