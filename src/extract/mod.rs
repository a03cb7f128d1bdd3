//! Cursor-driven pagination over a time window.
//!
//! The [`Paginator`] repeatedly queries a [`PageSource`] for `[start, end]`,
//! yields every entry of each page in order, and advances `start` to the
//! latest `updated` timestamp of the page just read. It stops when a page
//! holds every remaining match, or on the first transport or cursor failure.
//! None of those conditions is returned as an error: the sequence simply
//! ends and [`Paginator::finish_reason`] tells why.
//!
//! The next window's start is inclusive, so entries sharing the cursor
//! timestamp come back on the following page. Those exact redeliveries are
//! skipped here and counted in [`PaginationStats::duplicates_skipped`].

use std::collections::{HashSet, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::feed::{PageSource, RawEntry, RawPage, TransportError};
use crate::throttle::PageThrottle;

/// Why a [`Paginator`] stopped producing entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationEnd {
    /// The last page contained every remaining match.
    Exhausted,
    /// A page could not be fetched or decoded.
    Transport(TransportError),
    /// A non-final page had no entry with a parseable `updated` timestamp.
    MissingCursor,
    /// A non-final page did not move the cursor past the current start.
    StalledCursor { cursor: DateTime<Utc> },
}

impl PaginationEnd {
    /// True for every ending except [`PaginationEnd::Exhausted`].
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Exhausted)
    }
}

impl fmt::Display for PaginationEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => f.write_str("window exhausted"),
            Self::Transport(error) => write!(f, "transport failure: {error}"),
            Self::MissingCursor => f.write_str("page has no parseable updated timestamp"),
            Self::StalledCursor { cursor } => write!(f, "cursor stalled at {cursor}"),
        }
    }
}

/// Counters for one pagination run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationStats {
    pub pages_fetched: u64,
    pub entries_yielded: u64,
    pub duplicates_skipped: u64,
}

/// Identity of a delivered entry: `<id>` URL plus raw `<updated>` text.
type EntryKey = (String, String);

fn entry_key(entry: &RawEntry) -> Option<EntryKey> {
    let url = entry.source_url()?;
    let updated = entry.text_of("updated")?.trim();
    Some((url.to_string(), updated.to_string()))
}

/// Latest `updated` timestamp of a page, scanning backward from its last entry.
///
/// Entries whose `updated` child is absent or malformed are passed over.
#[must_use]
pub fn page_cursor(entries: &[RawEntry]) -> Option<DateTime<Utc>> {
    entries.iter().rev().find_map(RawEntry::updated_at)
}

/// Lazy, finite sequence of raw entries for one time window.
///
/// Pull entries with [`Paginator::next_entry`]. A page is only fetched once
/// every entry of the previous one has been handed out, so callers finish
/// processing page N before page N+1 is requested.
pub struct Paginator<'a, S: PageSource + ?Sized> {
    source: &'a S,
    throttle: &'a PageThrottle,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    buffer: VecDeque<RawEntry>,
    /// Keys yielded from the most recent page, for boundary dedupe.
    previous_keys: HashSet<EntryKey>,
    throttle_pending: bool,
    finished: Option<PaginationEnd>,
    stats: PaginationStats,
}

impl<'a, S: PageSource + ?Sized> Paginator<'a, S> {
    #[must_use]
    pub fn new(
        source: &'a S,
        throttle: &'a PageThrottle,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            throttle,
            start,
            end,
            buffer: VecDeque::new(),
            previous_keys: HashSet::new(),
            throttle_pending: false,
            finished: None,
            stats: PaginationStats::default(),
        }
    }

    /// Start of the window that will be (or was last) queried.
    #[must_use]
    pub fn cursor(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    #[must_use]
    pub fn stats(&self) -> PaginationStats {
        self.stats
    }

    /// Why the sequence ended, once it has.
    #[must_use]
    pub fn finish_reason(&self) -> Option<&PaginationEnd> {
        self.finished.as_ref()
    }

    /// Returns the next entry, fetching and throttling as needed.
    ///
    /// Returns `None` once the window is exhausted or pagination failed.
    pub async fn next_entry(&mut self) -> Option<RawEntry> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                self.stats.entries_yielded += 1;
                return Some(entry);
            }

            if self.throttle_pending {
                self.throttle_pending = false;
                self.throttle.wait().await;
            }

            if self.finished.is_some() {
                return None;
            }

            self.fetch_next_page().await;
        }
    }

    #[instrument(skip(self), fields(start = %self.start, end = %self.end))]
    async fn fetch_next_page(&mut self) {
        let page = match self.source.fetch(self.start, self.end).await {
            Ok(page) => page,
            Err(err) => {
                error!(
                    error = %err,
                    kind = err.kind(),
                    "pagination stopped: failed to fetch page"
                );
                self.finished = Some(PaginationEnd::Transport(err));
                return;
            }
        };

        self.throttle_pending = true;
        self.stats.pages_fetched += 1;
        info!(
            start = %self.start,
            entries = page.entries.len(),
            total_results = page.total_results,
            "fetched page"
        );

        self.advance_cursor(&page);
        self.enqueue(page.entries);
    }

    fn advance_cursor(&mut self, page: &RawPage) {
        let is_final = u64::try_from(page.entries.len())
            .map_or(true, |len| len >= page.total_results);
        if is_final {
            debug!(entries = page.entries.len(), "final page for window");
            self.finished = Some(PaginationEnd::Exhausted);
            return;
        }

        match page_cursor(&page.entries) {
            None => {
                error!(
                    start = %self.start,
                    entries = page.entries.len(),
                    "pagination stopped: no entry on page has a parseable updated timestamp"
                );
                self.finished = Some(PaginationEnd::MissingCursor);
            }
            // Queries are sent at minute resolution, so when a full page of
            // entries shares one minute the next query starts at that minute
            // again and returns the same page. That is the usual cause here,
            // not an API that stopped paging.
            Some(cursor) if cursor <= self.start => {
                warn!(
                    start = %self.start,
                    cursor = %cursor,
                    "pagination stopped: cursor did not advance"
                );
                self.finished = Some(PaginationEnd::StalledCursor { cursor });
            }
            Some(cursor) => {
                debug!(from = %self.start, to = %cursor, "advancing cursor");
                self.start = cursor;
            }
        }
    }

    fn enqueue(&mut self, entries: Vec<RawEntry>) {
        let mut keys = HashSet::with_capacity(entries.len());
        for entry in entries {
            let key = entry_key(&entry);
            if let Some(key) = key {
                if self.previous_keys.contains(&key) {
                    debug!(url = %key.0, updated = %key.1, "skipping boundary redelivery");
                    self.stats.duplicates_skipped += 1;
                    keys.insert(key);
                    continue;
                }
                keys.insert(key);
            }
            self.buffer.push_back(entry);
        }
        self.previous_keys = keys;
    }
}

impl<S: PageSource + ?Sized> fmt::Debug for Paginator<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("buffered", &self.buffer.len())
            .field("finished", &self.finished)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
