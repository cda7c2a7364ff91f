use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder, Set};

use crate::entities::{news, users};

/// A news item together with its author's username, when the author row exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: Option<i32>,
    pub author: Option<String>,
}

impl NewsItem {
    fn from_parts(model: news::Model, author: Option<users::Model>) -> Self {
        Self {
            id: model.id,
            title: model.title,
            text: model.text,
            created_at: model.created_at,
            author_id: model.author_id,
            author: author.map(|u| u.username),
        }
    }
}

pub struct NewsRepository {
    conn: DatabaseConnection,
}

impl NewsRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts one item stamped with the current time.
    pub async fn insert(
        &self,
        title: &str,
        text: &str,
        author_id: Option<i32>,
    ) -> Result<news::Model> {
        let active = news::ActiveModel {
            title: Set(title.to_string()),
            text: Set(text.to_string()),
            created_at: Set(Utc::now()),
            author_id: Set(author_id),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert news item")
    }

    /// All items, newest first. Equal timestamps fall back to insertion order.
    pub async fn list_all(&self) -> Result<Vec<NewsItem>> {
        let rows = news::Entity::find()
            .find_also_related(users::Entity)
            .order_by_desc(news::Column::CreatedAt)
            .order_by_desc(news::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list news")?;

        Ok(rows
            .into_iter()
            .map(|(item, author)| NewsItem::from_parts(item, author))
            .collect())
    }

    pub async fn count(&self) -> Result<u64> {
        news::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count news")
    }
}
