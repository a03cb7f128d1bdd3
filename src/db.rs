//! Database connection and schema management.
//!
//! This module provides SQLite database connectivity with:
//! - Connection pool management
//! - WAL mode and a busy timeout for file databases
//! - Enforced foreign keys
//! - Automatic migration execution
//! - Reference-table seeding (categories, keywords)
//!
//! # Example
//!
//! ```no_run
//! use arxin_core::{CategoryTaxonomy, Database, KeywordVocabulary};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("arxiv.db")).await?;
//! db.seed_reference_data(&CategoryTaxonomy::bundled()?, &KeywordVocabulary::builtin())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::{info, instrument};

use crate::keywords::KeywordVocabulary;
use crate::taxonomy::CategoryTaxonomy;

/// Default maximum number of connections in the pool.
/// Kept low for SQLite since it uses file-level locking.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout.
/// Connections will wait this long before returning SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database or run a statement.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Database connection wrapper with connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the database at `db_path` and migrates it.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database for testing.
    ///
    /// The pool holds a single connection, since every in-memory connection
    /// would otherwise see its own empty database.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.eq_ignore_ascii_case("wal"))
    }

    /// Upserts the category and keyword reference tables.
    ///
    /// Safe to call on every start; existing rows are overwritten in place.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if any statement fails. Nothing is
    /// written in that case.
    #[instrument(skip_all, fields(categories = taxonomy.len(), keywords = vocabulary.len()))]
    pub async fn seed_reference_data(
        &self,
        taxonomy: &CategoryTaxonomy,
        vocabulary: &KeywordVocabulary,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        seed_reference_rows(&mut *tx, taxonomy, vocabulary).await?;
        tx.commit().await?;
        info!("reference tables seeded");
        Ok(())
    }

    /// Deletes every article and derived row, then reseeds reference tables.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if any statement fails. The reset is
    /// all-or-nothing.
    #[instrument(skip_all)]
    pub async fn reset(
        &self,
        taxonomy: &CategoryTaxonomy,
        vocabulary: &KeywordVocabulary,
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        for table in [
            "keyword_occurrence",
            "article_category",
            "article",
            "keyword",
            "category",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }
        seed_reference_rows(&mut *tx, taxonomy, vocabulary).await?;
        tx.commit().await?;
        info!("database reset");
        Ok(())
    }

    /// Returns the number of stored articles.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    pub async fn article_count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Gracefully closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn seed_reference_rows(
    conn: &mut sqlx::SqliteConnection,
    taxonomy: &CategoryTaxonomy,
    vocabulary: &KeywordVocabulary,
) -> Result<(), sqlx::Error> {
    for category in taxonomy.categories() {
        sqlx::query(
            "INSERT INTO category (id, code, name) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, name = excluded.name",
        )
        .bind(category.id)
        .bind(&category.code)
        .bind(&category.name)
        .execute(&mut *conn)
        .await?;
    }

    for keyword in vocabulary.keywords() {
        sqlx::query(
            "INSERT INTO keyword (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(keyword.id)
        .bind(&keyword.name)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
