//! `SeaORM` implementation of the `NewsService` trait.

use async_trait::async_trait;

use crate::db::{NewsItem, Store, User};
use crate::entities::news;
use crate::services::news_service::{MAX_TITLE_LEN, NewsError, NewsService};

pub struct SeaOrmNewsService {
    store: Store,
}

impl SeaOrmNewsService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NewsService for SeaOrmNewsService {
    async fn list_news(&self) -> Result<Vec<NewsItem>, NewsError> {
        Ok(self.store.list_news().await?)
    }

    async fn publish(
        &self,
        title: &str,
        text: &str,
        author: &User,
    ) -> Result<news::Model, NewsError> {
        let title = title.trim();
        let text = text.trim();

        if title.is_empty() || text.is_empty() {
            return Err(NewsError::Validation(
                "Please fill in both the title and the text".to_string(),
            ));
        }

        if title.chars().count() > MAX_TITLE_LEN {
            return Err(NewsError::Validation(format!(
                "Title must be at most {MAX_TITLE_LEN} characters"
            )));
        }

        let item = self.store.insert_news(title, text, Some(author.id)).await?;

        tracing::info!(news_id = item.id, author = %author.username, "News published");
        metrics::counter!("news_published_total").increment(1);

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> (SeaOrmNewsService, Store, User) {
        let db_path =
            std::env::temp_dir().join(format!("varsite-news-test-{}.db", uuid::Uuid::new_v4()));
        let store = Store::new(&format!("sqlite:{}", db_path.display()))
            .await
            .expect("failed to open store");
        let author = store
            .create_user("editor", "hash", true)
            .await
            .unwrap()
            .unwrap();
        (SeaOrmNewsService::new(store.clone()), store, author)
    }

    #[tokio::test]
    async fn test_publish_rejects_blank_fields() {
        let (news, store, author) = service().await;

        for (title, text) in [("", "x"), ("x", ""), ("", ""), ("   ", "\n\t")] {
            let err = news.publish(title, text, &author).await.unwrap_err();
            assert!(matches!(err, NewsError::Validation(_)), "{title:?}/{text:?}");
        }

        let long_title = "t".repeat(MAX_TITLE_LEN + 1);
        assert!(matches!(
            news.publish(&long_title, "body", &author).await,
            Err(NewsError::Validation(_))
        ));

        assert_eq!(store.count_news().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_publish_creates_one_row() {
        let (news, store, author) = service().await;
        let before = chrono::Utc::now();

        let item = news.publish("  Title ", " Body  ", &author).await.unwrap();

        assert_eq!(store.count_news().await.unwrap(), 1);
        assert_eq!(item.title, "Title");
        assert_eq!(item.text, "Body");
        assert_eq!(item.author_id, Some(author.id));
        assert!(item.created_at >= before);

        let listed = news.list_news().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].author.as_deref(), Some("editor"));
    }

    #[tokio::test]
    async fn test_list_news_newest_first() {
        let (news, _, author) = service().await;

        for title in ["first", "second", "third"] {
            news.publish(title, "body", &author).await.unwrap();
        }

        let titles: Vec<_> = news
            .list_news()
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.title)
            .collect();
        assert_eq!(titles, ["third", "second", "first"]);
    }
}
