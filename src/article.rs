//! Canonical article records.
//!
//! [`Article`] is the validated shape produced by the parser from one feed
//! entry. [`StoredArticle`] is the row-level view read back from the store,
//! which carries only the persisted columns.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A validated arXiv article.
///
/// `created_at` is the publish date and never changes once persisted.
/// `updated_at` only moves forward across successive syncs of the same `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    /// Canonical arXiv identifier without version suffix (e.g. `2301.01234`, `hep-th/9901001`).
    pub id: String,
    pub title: String,
    /// Publish date.
    pub created_at: DateTime<Utc>,
    /// Last-updated date.
    pub updated_at: DateTime<Utc>,
    /// Category codes in feed order, without duplicates.
    pub categories: Vec<String>,
    /// Abstract text. Only used as keyword-counting input; never stored verbatim.
    pub summary: String,
}

/// Persisted article row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StoredArticle {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Article> for StoredArticle {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id.clone(),
            title: article.title.clone(),
            created_at: article.created_at,
            updated_at: article.updated_at,
        }
    }
}
