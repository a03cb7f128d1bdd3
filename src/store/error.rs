//! Error types for article persistence.

use std::fmt;

use thiserror::Error;

/// Structured classification for database failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// `SQLite` returned busy/locked.
    BusyOrLocked,
    /// Constraint failure (unique/foreign-key/check/not-null).
    ConstraintViolation,
    /// Connection pool timed out waiting for a free connection.
    PoolTimeout,
    /// Connection pool is closed.
    PoolClosed,
    /// Expected row was not found.
    RowNotFound,
    /// Filesystem or transport IO failure.
    Io,
    /// SQL protocol/driver error.
    Protocol,
    /// Unclassified database failure.
    Other,
}

impl StoreErrorKind {
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => Self::PoolTimeout,
            sqlx::Error::PoolClosed => Self::PoolClosed,
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::Io(_) => Self::Io,
            sqlx::Error::Protocol(_) => Self::Protocol,
            sqlx::Error::Database(database_error) => {
                classify_database_error(database_error.as_ref())
            }
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BusyOrLocked => "busy_or_locked",
            Self::ConstraintViolation => "constraint_violation",
            Self::PoolTimeout => "pool_timeout",
            Self::PoolClosed => "pool_closed",
            Self::RowNotFound => "row_not_found",
            Self::Io => "io",
            Self::Protocol => "protocol",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn classify_database_error(
    database_error: &(dyn sqlx::error::DatabaseError + 'static),
) -> StoreErrorKind {
    let code = database_error.code();
    if matches!(
        code.as_deref(),
        Some("SQLITE_BUSY" | "SQLITE_LOCKED" | "5" | "6")
    ) {
        return StoreErrorKind::BusyOrLocked;
    }

    if database_error.is_unique_violation()
        || database_error.is_foreign_key_violation()
        || database_error.is_check_violation()
        || code
            .as_deref()
            .is_some_and(|value| value.starts_with("SQLITE_CONSTRAINT"))
    {
        return StoreErrorKind::ConstraintViolation;
    }

    let message = database_error.message().to_ascii_lowercase();
    if message.contains("database is locked") || message.contains("database is busy") {
        return StoreErrorKind::BusyOrLocked;
    }
    if message.contains("constraint failed") {
        return StoreErrorKind::ConstraintViolation;
    }

    StoreErrorKind::Other
}

/// Errors from [`ArticleRepository`](super::ArticleRepository) operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        kind: StoreErrorKind,
        message: String,
    },

    /// An update targeted an article that is not stored.
    #[error("article not found: {0}")]
    ArticleNotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: StoreErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl StoreError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<StoreErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::ArticleNotFound(_) => None,
        }
    }

    /// Stable label used in logs and rejection records.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Database { kind, .. } => kind.as_str(),
            Self::ArticleNotFound(_) => "article_not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_database_message() {
        let err = StoreError::Database {
            kind: StoreErrorKind::ConstraintViolation,
            message: "FOREIGN KEY constraint failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("constraint_violation"));
        assert!(msg.contains("FOREIGN KEY"));
        assert_eq!(err.database_kind(), Some(StoreErrorKind::ConstraintViolation));
        assert_eq!(err.reason_code(), "constraint_violation");
    }

    #[test]
    fn test_store_error_from_sqlx_row_not_found() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.database_kind(), Some(StoreErrorKind::RowNotFound));
    }

    #[test]
    fn test_store_error_article_not_found() {
        let err = StoreError::ArticleNotFound("2401.00001".to_string());
        assert!(err.to_string().contains("2401.00001"));
        assert_eq!(err.database_kind(), None);
        assert_eq!(err.reason_code(), "article_not_found");
    }
}
