//! Reconciliation of parsed articles with the store.
//!
//! Per article id the state machine is:
//!
//! - no row stored: insert the full row ([`SyncEffect::Inserted`])
//! - row stored with a different publish date: [`InvariantViolation::PublishDateChanged`]
//! - row stored with the same `updated_at`: [`InvariantViolation::AlreadyCurrent`]
//! - row stored with a newer `updated_at`: [`InvariantViolation::StaleUpdate`]
//! - otherwise: update title and `updated_at` ([`SyncEffect::Updated`])
//!
//! After the row write, category links and keyword counts are deleted and
//! rebuilt from the incoming article, so derived rows always reflect the
//! latest accepted snapshot. Callers run [`Synchronizer::reconcile`] inside a
//! transaction to make each attempt all-or-nothing.

use std::fmt;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::article::Article;
use crate::keywords::KeywordVocabulary;
use crate::store::{ArticleRepository, StoreError};
use crate::taxonomy::CategoryTaxonomy;

/// Row-level outcome of a successful reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEffect {
    Inserted,
    Updated,
}

impl fmt::Display for SyncEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted => f.write_str("inserted"),
            Self::Updated => f.write_str("updated"),
        }
    }
}

/// An incoming article contradicts what is already stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("publish date is immutable")]
    PublishDateChanged,

    #[error("update is not newer than last known state")]
    StaleUpdate,

    /// Same publish date and same `updated_at` as the stored row, which is
    /// what a window boundary redelivers.
    #[error("update is not newer than last known state: already current")]
    AlreadyCurrent,
}

/// Reconciliation failures.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The article is rejected; the store is unchanged.
    #[error("invariant violation for {id}: {violation}")]
    Invariant {
        id: String,
        #[source]
        violation: InvariantViolation,
    },

    /// A category code has no entry in the taxonomy.
    ///
    /// Signals a reference-data mismatch rather than bad input, so callers
    /// should stop instead of rejecting the record.
    #[error("unknown category code '{code}' on article {id}")]
    UnknownCategory { id: String, code: String },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// True for failures that must stop a batch run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownCategory { .. })
    }

    /// True when the incoming article matches the stored state exactly.
    #[must_use]
    pub fn is_redelivery(&self) -> bool {
        matches!(
            self,
            Self::Invariant {
                violation: InvariantViolation::AlreadyCurrent,
                ..
            }
        )
    }

    /// Stable label used in logs and rejection records.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Invariant {
                violation: InvariantViolation::PublishDateChanged,
                ..
            } => "publish-date-changed",
            Self::Invariant {
                violation: InvariantViolation::StaleUpdate,
                ..
            } => "stale-update",
            Self::Invariant {
                violation: InvariantViolation::AlreadyCurrent,
                ..
            } => "already-current",
            Self::UnknownCategory { .. } => "unknown-category",
            Self::Store(_) => "store-error",
        }
    }
}

/// Applies parsed articles to an [`ArticleRepository`].
#[derive(Debug, Clone)]
pub struct Synchronizer {
    taxonomy: CategoryTaxonomy,
    vocabulary: KeywordVocabulary,
}

impl Synchronizer {
    #[must_use]
    pub fn new(taxonomy: CategoryTaxonomy, vocabulary: KeywordVocabulary) -> Self {
        Self {
            taxonomy,
            vocabulary,
        }
    }

    #[must_use]
    pub fn taxonomy(&self) -> &CategoryTaxonomy {
        &self.taxonomy
    }

    #[must_use]
    pub fn vocabulary(&self) -> &KeywordVocabulary {
        &self.vocabulary
    }

    /// Reconciles one article with its stored state.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Invariant`] when the article would rewrite the publish
    ///   date or does not move `updated_at` forward; nothing is written
    /// - [`SyncError::UnknownCategory`] when a category code cannot be
    ///   resolved; nothing is written
    /// - [`SyncError::Store`] when a store operation fails; earlier writes of
    ///   this call must be rolled back by the caller
    #[instrument(skip(self, repo, article), fields(id = %article.id))]
    pub async fn reconcile<R: ArticleRepository + ?Sized>(
        &self,
        repo: &mut R,
        article: &Article,
    ) -> Result<SyncEffect, SyncError> {
        let existing = repo.find_article(&article.id).await?;

        if let Some(stored) = &existing {
            let violation = if stored.created_at != article.created_at {
                Some(InvariantViolation::PublishDateChanged)
            } else if stored.updated_at == article.updated_at {
                Some(InvariantViolation::AlreadyCurrent)
            } else if stored.updated_at > article.updated_at {
                Some(InvariantViolation::StaleUpdate)
            } else {
                None
            };
            if let Some(violation) = violation {
                return Err(SyncError::Invariant {
                    id: article.id.clone(),
                    violation,
                });
            }
        }

        let category_ids = self.resolve_categories(article)?;

        let effect = if existing.is_some() {
            repo.update_article(&article.id, &article.title, article.updated_at)
                .await?;
            SyncEffect::Updated
        } else {
            repo.insert_article(article).await?;
            SyncEffect::Inserted
        };

        repo.replace_article_categories(&article.id, &category_ids)
            .await?;
        let counts = self.vocabulary.count(&article.summary);
        repo.replace_keyword_occurrences(&article.id, &counts)
            .await?;

        debug!(
            effect = %effect,
            categories = category_ids.len(),
            keywords = counts.len(),
            "article reconciled"
        );
        Ok(effect)
    }

    fn resolve_categories(&self, article: &Article) -> Result<Vec<i64>, SyncError> {
        article
            .categories
            .iter()
            .map(|code| {
                self.taxonomy
                    .resolve(code)
                    .ok_or_else(|| SyncError::UnknownCategory {
                        id: article.id.clone(),
                        code: code.clone(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::db::Database;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 12, 0, 0).unwrap()
    }

    fn article(created: u32, updated: u32) -> Article {
        Article {
            id: "2402.01234".to_string(),
            title: "Deep learning for rocks".to_string(),
            created_at: ts(created),
            updated_at: ts(updated),
            categories: vec!["cs.LG".to_string(), "physics.geo-ph".to_string()],
            summary: "We apply deep learning and a neural network to a rock dataset.".to_string(),
        }
    }

    async fn setup() -> (Database, Synchronizer) {
        let taxonomy = CategoryTaxonomy::bundled().unwrap();
        let vocabulary = KeywordVocabulary::builtin();
        let db = Database::new_in_memory().await.unwrap();
        db.seed_reference_data(&taxonomy, &vocabulary).await.unwrap();
        (db, Synchronizer::new(taxonomy, vocabulary))
    }

    async fn derived_counts(db: &Database) -> (i64, i64) {
        let links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article_category")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let keywords: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM keyword_occurrence")
            .fetch_one(db.pool())
            .await
            .unwrap();
        (links, keywords)
    }

    #[tokio::test]
    async fn test_reconcile_new_id_inserts_with_derived_rows() {
        let (db, sync) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let effect = sync.reconcile(&mut *conn, &article(1, 2)).await.unwrap();

        assert_eq!(effect, SyncEffect::Inserted);
        let stored = conn.find_article("2402.01234").await.unwrap().unwrap();
        assert_eq!(stored.created_at, ts(1));
        assert_eq!(stored.updated_at, ts(2));
        drop(conn);
        // deep learning, neural network, dataset
        assert_eq!(derived_counts(&db).await, (2, 3));
    }

    #[tokio::test]
    async fn test_reconcile_newer_update_keeps_created_at() {
        let (db, sync) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        sync.reconcile(&mut *conn, &article(1, 2)).await.unwrap();

        let mut revised = article(1, 5);
        revised.title = "Deep learning for rocks, revised".to_string();
        revised.categories = vec!["cs.LG".to_string()];
        revised.summary = "Now only clustering.".to_string();

        let effect = sync.reconcile(&mut *conn, &revised).await.unwrap();

        assert_eq!(effect, SyncEffect::Updated);
        let stored = conn.find_article("2402.01234").await.unwrap().unwrap();
        assert_eq!(stored.title, "Deep learning for rocks, revised");
        assert_eq!(stored.created_at, ts(1));
        assert_eq!(stored.updated_at, ts(5));
        drop(conn);
        assert_eq!(derived_counts(&db).await, (1, 1), "derived rows are rebuilt");
    }

    #[tokio::test]
    async fn test_reconcile_rejects_changed_publish_date() {
        let (db, sync) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        sync.reconcile(&mut *conn, &article(1, 2)).await.unwrap();

        for updated in [1, 2, 9] {
            let mut incoming = article(1, updated);
            incoming.created_at = ts(1) - Duration::hours(1);
            let err = sync.reconcile(&mut *conn, &incoming).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    SyncError::Invariant {
                        violation: InvariantViolation::PublishDateChanged,
                        ..
                    }
                ),
                "updated day {updated}: {err}"
            );
            assert_eq!(
                err.to_string(),
                "invariant violation for 2402.01234: publish date is immutable"
            );
        }
    }

    #[tokio::test]
    async fn test_reconcile_rejects_older_update() {
        let (db, sync) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        sync.reconcile(&mut *conn, &article(1, 4)).await.unwrap();

        let err = sync.reconcile(&mut *conn, &article(1, 3)).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Invariant {
                violation: InvariantViolation::StaleUpdate,
                ..
            }
        ));
        assert_eq!(err.reason_code(), "stale-update");
        assert!(!err.is_fatal());
        assert!(!err.is_redelivery());

        let stored = conn.find_article("2402.01234").await.unwrap().unwrap();
        assert_eq!(stored.updated_at, ts(4));
    }

    #[tokio::test]
    async fn test_reconcile_equal_update_is_flagged_as_redelivery() {
        let (db, sync) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        sync.reconcile(&mut *conn, &article(1, 4)).await.unwrap();

        let err = sync.reconcile(&mut *conn, &article(1, 4)).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Invariant {
                violation: InvariantViolation::AlreadyCurrent,
                ..
            }
        ));
        assert!(err.to_string().contains("not newer than last known state"));
        assert_eq!(err.reason_code(), "already-current");
        assert!(err.is_redelivery());
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_reconcile_unknown_category_is_fatal_and_writes_nothing() {
        let (db, sync) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let mut incoming = article(1, 2);
        incoming.categories.push("cs.XX".to_string());
        let err = sync.reconcile(&mut *conn, &incoming).await.unwrap_err();

        assert!(err.is_fatal());
        assert!(matches!(err, SyncError::UnknownCategory { ref code, .. } if code == "cs.XX"));
        assert!(conn.find_article("2402.01234").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reconcile_same_final_state_twice_is_rejected_without_changes() {
        let (db, sync) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        sync.reconcile(&mut *conn, &article(1, 2)).await.unwrap();
        let err = sync.reconcile(&mut *conn, &article(1, 2)).await.unwrap_err();
        assert!(err.is_redelivery());
        drop(conn);
        assert_eq!(derived_counts(&db).await, (2, 3));
    }
}
