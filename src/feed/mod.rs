//! arXiv API feed access.
//!
//! The pipeline consumes the remote search API through one narrow seam,
//! [`PageSource::fetch`], which returns a [`RawPage`]: the entries of one
//! time-windowed query plus the total-match hint the API reports for it.
//!
//! - [`ArxivClient`] - `reqwest` implementation against `export.arxiv.org`
//! - [`decode_feed`] - Atom XML to [`RawPage`] decoding
//! - [`RawEntry`] - one `<entry>`, kept verbatim for rejection payloads

mod atom;
mod client;
mod error;

pub use atom::decode_feed;
pub use client::{
    ArxivClient, DEFAULT_API_BASE_URL, DEFAULT_PAGE_SIZE, FeedClientOptions, build_query_url,
};
pub use error::TransportError;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp format used by `<published>` and `<updated>`.
pub const FEED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parses a feed timestamp (`2024-01-31T18:59:59Z`) as UTC.
#[must_use]
pub fn parse_feed_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), FEED_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// One direct child element of an `<entry>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawField {
    /// Local element name, namespace prefix removed (`id`, `updated`, `category`, ...).
    pub name: String,
    /// Unescaped text content, if the element had any.
    pub text: Option<String>,
    /// Value of the `term` attribute (set on `<category>`).
    pub term: Option<String>,
}

impl RawField {
    /// Creates a text-bearing field.
    #[must_use]
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            term: None,
        }
    }

    /// Creates a `term`-bearing field such as `<category term="cs.CR"/>`.
    #[must_use]
    pub fn term(name: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: None,
            term: Some(term.into()),
        }
    }
}

/// One undecoded feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    xml: String,
    fields: Vec<RawField>,
}

impl RawEntry {
    #[must_use]
    pub fn new(xml: impl Into<String>, fields: Vec<RawField>) -> Self {
        Self {
            xml: xml.into(),
            fields,
        }
    }

    /// The entry's XML exactly as received.
    #[must_use]
    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Direct child fields in document order.
    #[must_use]
    pub fn fields(&self) -> &[RawField] {
        &self.fields
    }

    /// Text of the first child named `name`.
    #[must_use]
    pub fn text_of(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .and_then(|field| field.text.as_deref())
    }

    /// The `<id>` URL.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        self.text_of("id").map(str::trim)
    }

    /// The `<updated>` timestamp, when present and well formed.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.text_of("updated").and_then(parse_feed_timestamp)
    }
}

/// One API response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPage {
    /// Entries in the order the API returned them.
    pub entries: Vec<RawEntry>,
    /// `opensearch:totalResults`: matches remaining for the queried window.
    pub total_results: u64,
}

/// Source of windowed result pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches the first page of results last updated within `[start, end]`.
    ///
    /// Page size is owned by the implementation.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request fails or the body cannot be decoded.
    async fn fetch(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RawPage, TransportError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_parse_feed_timestamp_reads_wire_format() {
        let parsed = parse_feed_timestamp("2024-01-31T18:59:59Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 31, 18, 59, 59).unwrap());
    }

    #[test]
    fn test_parse_feed_timestamp_rejects_other_formats() {
        assert!(parse_feed_timestamp("2024-01-31").is_none());
        assert!(parse_feed_timestamp("2024-01-31 18:59:59").is_none());
        assert!(parse_feed_timestamp("").is_none());
    }

    #[test]
    fn test_raw_entry_accessors() {
        let entry = RawEntry::new(
            "<entry/>",
            vec![
                RawField::text("id", " http://arxiv.org/abs/2301.01234v1 "),
                RawField::text("updated", "2023-01-03T00:00:00Z"),
                RawField::term("category", "cs.LG"),
            ],
        );
        assert_eq!(entry.source_url(), Some("http://arxiv.org/abs/2301.01234v1"));
        assert_eq!(
            entry.updated_at(),
            Some(Utc.with_ymd_and_hms(2023, 1, 3, 0, 0, 0).unwrap())
        );
        assert!(entry.text_of("title").is_none());
        assert_eq!(entry.fields().len(), 3);
    }
}
