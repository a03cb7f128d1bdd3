//! Article persistence.
//!
//! [`ArticleRepository`] is the narrow set of operations the synchronizer
//! needs: point lookup, insert, mutable-field update, replace-all for the two
//! derived join tables, and the latest stored `updated_at` for
//! auto-windowing. It is implemented for [`SqliteConnection`], so the same
//! code runs against a plain connection or inside a transaction
//! (`&mut *tx`).

mod error;

pub use error::{StoreError, StoreErrorKind};

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::instrument;

use crate::article::{Article, StoredArticle};
use crate::keywords::KeywordId;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Data-access contract for articles and their derived rows.
#[async_trait]
pub trait ArticleRepository: Send {
    /// Looks up the persisted row for `id`.
    async fn find_article(&mut self, id: &str) -> Result<Option<StoredArticle>>;

    /// Inserts a new article row.
    async fn insert_article(&mut self, article: &Article) -> Result<()>;

    /// Updates the mutable fields of an existing row.
    async fn update_article(
        &mut self,
        id: &str,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Replaces every category link of `id` with `category_ids`.
    async fn replace_article_categories(&mut self, id: &str, category_ids: &[i64]) -> Result<()>;

    /// Replaces every keyword-occurrence row of `id` with `counts`.
    async fn replace_keyword_occurrences(
        &mut self,
        id: &str,
        counts: &BTreeMap<KeywordId, u32>,
    ) -> Result<()>;

    /// Largest `updated_at` across all stored articles.
    async fn latest_updated_at(&mut self) -> Result<Option<DateTime<Utc>>>;
}

#[async_trait]
impl ArticleRepository for SqliteConnection {
    #[instrument(skip(self))]
    async fn find_article(&mut self, id: &str) -> Result<Option<StoredArticle>> {
        let row = sqlx::query_as::<_, StoredArticle>(
            "SELECT id, title, created_at, updated_at FROM article WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *self)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self, article), fields(id = %article.id))]
    async fn insert_article(&mut self, article: &Article) -> Result<()> {
        sqlx::query("INSERT INTO article (id, title, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&article.id)
            .bind(&article.title)
            .bind(article.created_at)
            .bind(article.updated_at)
            .execute(&mut *self)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, title))]
    async fn update_article(
        &mut self,
        id: &str,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query("UPDATE article SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(updated_at)
            .bind(id)
            .execute(&mut *self)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ArticleNotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(links = category_ids.len()))]
    async fn replace_article_categories(&mut self, id: &str, category_ids: &[i64]) -> Result<()> {
        sqlx::query("DELETE FROM article_category WHERE article_id = ?")
            .bind(id)
            .execute(&mut *self)
            .await?;
        for category_id in category_ids {
            sqlx::query("INSERT INTO article_category (article_id, category_id) VALUES (?, ?)")
                .bind(id)
                .bind(category_id)
                .execute(&mut *self)
                .await?;
        }
        Ok(())
    }

    #[instrument(skip(self, counts), fields(keywords = counts.len()))]
    async fn replace_keyword_occurrences(
        &mut self,
        id: &str,
        counts: &BTreeMap<KeywordId, u32>,
    ) -> Result<()> {
        sqlx::query("DELETE FROM keyword_occurrence WHERE article_id = ?")
            .bind(id)
            .execute(&mut *self)
            .await?;
        for (keyword_id, count) in counts.iter().filter(|(_, count)| **count > 0) {
            sqlx::query(
                "INSERT INTO keyword_occurrence (article_id, keyword_id, count) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(keyword_id)
            .bind(i64::from(*count))
            .execute(&mut *self)
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn latest_updated_at(&mut self) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT updated_at FROM article ORDER BY updated_at DESC LIMIT 1")
                .fetch_optional(&mut *self)
                .await?;
        Ok(latest)
    }
}
