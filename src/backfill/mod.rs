//! Batch ingestion over a date range.
//!
//! [`Backfill::run`] wires the pipeline together:
//!
//! 1. [`Paginator`] pulls raw entries for the window, one page at a time
//! 2. [`parse_entry`] validates each entry; failures go to the rejection sink
//! 3. [`Synchronizer::reconcile`] applies the article inside its own
//!    transaction; failures roll back and go to the rejection sink, except
//!    redeliveries of the stored state, which are counted as duplicates
//!
//! The run itself never fails. It ends when the window is exhausted, when
//! pagination hits a transport or cursor problem, or when a category code is
//! missing from the taxonomy, and the returned [`BackfillReport`] says which.

mod rejection;

pub use rejection::{FileRejectionSink, MemoryRejectionSink, Rejection, RejectionSink};

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, error, info, instrument, warn};

use crate::article::Article;
use crate::extract::{PaginationEnd, Paginator};
use crate::feed::{PageSource, RawEntry, TransportError};
use crate::parser::parse_entry;
use crate::store::{ArticleRepository, StoreError};
use crate::sync::{SyncEffect, SyncError, Synchronizer};
use crate::throttle::PageThrottle;

/// Start of auto-windowing on an empty store.
#[must_use]
pub fn default_backfill_start() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1986, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map_or(DateTime::UNIX_EPOCH, |naive| naive.and_utc())
}

/// Time range of one backfill run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl fmt::Display for BackfillWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Fills in missing window bounds.
///
/// A missing `start` becomes the latest stored `updated_at`, or
/// [`default_backfill_start`] when the store is empty. A missing `end`
/// becomes `now`.
///
/// # Errors
///
/// Returns [`StoreError`] if the latest timestamp cannot be read.
#[instrument(skip(repo))]
pub async fn resolve_window<R: ArticleRepository + ?Sized>(
    repo: &mut R,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<BackfillWindow, StoreError> {
    let start = match start {
        Some(start) => start,
        None => {
            let latest = repo.latest_updated_at().await?;
            debug!(latest = ?latest, "auto-windowing from store");
            latest.unwrap_or_else(default_backfill_start)
        }
    };
    Ok(BackfillWindow {
        start,
        end: end.unwrap_or(now),
    })
}

/// Why a backfill run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Every page of the window was processed.
    Exhausted,
    /// A page could not be fetched or decoded.
    Transport(TransportError),
    /// A page had no entry with a parseable `updated` timestamp.
    MissingCursor,
    /// The pagination cursor did not move forward.
    StalledCursor { cursor: DateTime<Utc> },
    /// An article carried a category code the taxonomy does not know.
    TaxonomyMismatch { id: String, code: String },
}

impl StopReason {
    /// True for every reason except [`StopReason::Exhausted`].
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Exhausted)
    }
}

impl From<PaginationEnd> for StopReason {
    fn from(end: PaginationEnd) -> Self {
        match end {
            PaginationEnd::Exhausted => Self::Exhausted,
            PaginationEnd::Transport(error) => Self::Transport(error),
            PaginationEnd::MissingCursor => Self::MissingCursor,
            PaginationEnd::StalledCursor { cursor } => Self::StalledCursor { cursor },
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("window exhausted"),
            Self::Transport(error) => write!(f, "transport failure: {error}"),
            Self::MissingCursor => f.write_str("page has no parseable updated timestamp"),
            Self::StalledCursor { cursor } => write!(f, "cursor stalled at {cursor}"),
            Self::TaxonomyMismatch { id, code } => {
                write!(f, "unknown category '{code}' on article {id}")
            }
        }
    }
}

/// Counters and outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub window: BackfillWindow,
    pub pages_fetched: u64,
    pub entries_seen: u64,
    pub inserted: u64,
    pub updated: u64,
    pub duplicates_skipped: u64,
    pub parse_rejections: u64,
    pub sync_rejections: u64,
    /// Start of the last window queried.
    pub cursor: DateTime<Utc>,
    pub stop: StopReason,
}

impl BackfillReport {
    fn new(window: BackfillWindow) -> Self {
        Self {
            window,
            pages_fetched: 0,
            entries_seen: 0,
            inserted: 0,
            updated: 0,
            duplicates_skipped: 0,
            parse_rejections: 0,
            sync_rejections: 0,
            cursor: window.start,
            stop: StopReason::Exhausted,
        }
    }

    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.parse_rejections + self.sync_rejections
    }
}

/// Drives pagination, parsing and reconciliation for one window.
pub struct Backfill<'a, S: PageSource + ?Sized> {
    source: &'a S,
    synchronizer: &'a Synchronizer,
    sink: &'a dyn RejectionSink,
    throttle: &'a PageThrottle,
}

impl<'a, S: PageSource + ?Sized> Backfill<'a, S> {
    #[must_use]
    pub fn new(
        source: &'a S,
        synchronizer: &'a Synchronizer,
        sink: &'a dyn RejectionSink,
        throttle: &'a PageThrottle,
    ) -> Self {
        Self {
            source,
            synchronizer,
            sink,
            throttle,
        }
    }

    /// Ingests every entry last updated within `window`.
    ///
    /// Uses `conn` for the whole run; each article is reconciled in its own
    /// transaction on it.
    #[instrument(skip(self, conn, window), fields(window = %window))]
    pub async fn run(&self, conn: &mut SqliteConnection, window: BackfillWindow) -> BackfillReport {
        info!("backfill started");
        let mut report = BackfillReport::new(window);
        let mut paginator = Paginator::new(self.source, self.throttle, window.start, window.end);
        let mut fatal = None;
        let mut redeliveries = 0;

        while let Some(entry) = paginator.next_entry().await {
            report.entries_seen += 1;

            let parsed = match parse_entry(&entry) {
                Ok(parsed) => parsed,
                Err(err) => {
                    report.parse_rejections += 1;
                    let subject = err.article_id().or(entry.source_url());
                    let rejection = Self::rejection(&entry, err.reason_code(), &err, subject);
                    error!(
                        token = %rejection.token,
                        reason = rejection.reason,
                        subject = subject.unwrap_or("-"),
                        error = %err,
                        "Failed to parse record"
                    );
                    self.sink.reject(&rejection).await;
                    continue;
                }
            };

            let id = parsed.article.id.as_str();
            match self.apply(conn, &parsed.article).await {
                Ok(SyncEffect::Inserted) => report.inserted += 1,
                Ok(SyncEffect::Updated) => report.updated += 1,
                Err(err) if err.is_redelivery() => {
                    redeliveries += 1;
                    debug!(
                        id,
                        updated_at = %parsed.article.updated_at,
                        "skipping already-current record"
                    );
                }
                Err(err) => {
                    let rejection = Self::rejection(&entry, err.reason_code(), &err, Some(id));
                    error!(
                        token = %rejection.token,
                        reason = rejection.reason,
                        subject = id,
                        error = %err,
                        "Failed to persist record"
                    );
                    self.sink.reject(&rejection).await;

                    if let SyncError::UnknownCategory { id, code } = err {
                        error!(
                            id = %id,
                            code = %code,
                            "backfill stopped: category code missing from taxonomy"
                        );
                        fatal = Some(StopReason::TaxonomyMismatch { id, code });
                        break;
                    }
                    report.sync_rejections += 1;
                }
            }
        }

        let stats = paginator.stats();
        report.pages_fetched = stats.pages_fetched;
        report.duplicates_skipped = stats.duplicates_skipped + redeliveries;
        report.cursor = paginator.cursor();
        report.stop = fatal.unwrap_or_else(|| {
            paginator
                .finish_reason()
                .cloned()
                .map_or(StopReason::Exhausted, StopReason::from)
        });

        if report.stop.is_fatal() {
            warn!(
                stop = %report.stop,
                inserted = report.inserted,
                updated = report.updated,
                rejected = report.rejections(),
                "backfill ended early"
            );
        } else {
            info!(
                pages = report.pages_fetched,
                inserted = report.inserted,
                updated = report.updated,
                duplicates = report.duplicates_skipped,
                rejected = report.rejections(),
                "backfill complete"
            );
        }
        report
    }

    /// Reconciles one article in a transaction, rolling back on any failure.
    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        article: &Article,
    ) -> Result<SyncEffect, SyncError> {
        let mut tx = conn.begin().await.map_err(StoreError::from)?;
        match self.synchronizer.reconcile(&mut *tx, article).await {
            Ok(effect) => {
                tx.commit().await.map_err(StoreError::from)?;
                Ok(effect)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(id = %article.id, error = %rollback_err, "rollback failed");
                } else {
                    debug!(id = %article.id, "rolled back partial reconciliation");
                }
                Err(err)
            }
        }
    }

    fn rejection(
        entry: &RawEntry,
        reason: &'static str,
        error: &dyn std::error::Error,
        subject: Option<&str>,
    ) -> Rejection {
        Rejection::new(
            reason,
            error.to_string(),
            subject.map(str::to_string),
            entry.xml(),
        )
    }
}

impl<S: PageSource + ?Sized> fmt::Debug for Backfill<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backfill")
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}
