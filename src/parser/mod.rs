//! Feed entry parsing and validation.
//!
//! [`parse_entry`] turns one [`RawEntry`] into an [`Article`] or a
//! [`ParseError`]. Rejections are ordinary results: the backfill driver
//! routes them to a rejection sink and moves on to the next entry.
//!
//! Required children: `id`, `title`, `published`, `updated`, `summary`.
//! `category` may repeat any number of times, including zero.

mod error;
mod identifier;

pub use error::{MalformedIdentifier, ParseError};
pub use identifier::{is_new_format, is_old_format, normalize_abs_url};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::article::Article;
use crate::feed::{RawEntry, parse_feed_timestamp};

/// A successfully parsed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub article: Article,
    /// The `<id>` URL the article was read from.
    pub source_url: String,
}

/// Accumulates entry children as they are seen.
///
/// Children can arrive in any order, so nothing is assumed present until
/// [`ArticleBuilder::finish`] checks it.
#[derive(Debug, Default)]
struct ArticleBuilder {
    source_url: Option<String>,
    id: Option<String>,
    title: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    summary: Option<String>,
    categories: Vec<String>,
}

impl ArticleBuilder {
    fn id(&mut self, url: &str) -> Result<(), ParseError> {
        if self.id.is_some() {
            return Ok(());
        }
        let url = url.trim();
        let id = normalize_abs_url(url).map_err(|source| ParseError::BadId {
            url: url.to_string(),
            source,
        })?;
        self.source_url = Some(url.to_string());
        self.id = Some(id);
        Ok(())
    }

    fn timestamp(
        slot: &mut Option<DateTime<Utc>>,
        field: &'static str,
        value: &str,
    ) -> Result<(), ParseError> {
        if slot.is_none() {
            let parsed = parse_feed_timestamp(value).ok_or_else(|| ParseError::BadTimestamp {
                field,
                value: value.to_string(),
            })?;
            *slot = Some(parsed);
        }
        Ok(())
    }

    fn category(&mut self, code: &str) {
        let code = code.trim();
        if !code.is_empty() && !self.categories.iter().any(|seen| seen == code) {
            self.categories.push(code.to_string());
        }
    }

    fn finish(self) -> Result<ParsedArticle, ParseError> {
        let (Some(id), Some(source_url)) = (self.id, self.source_url) else {
            return Err(ParseError::MissingField { field: "id" });
        };
        let title = self.title.ok_or(ParseError::MissingField { field: "title" })?;
        let created_at = self
            .created_at
            .ok_or(ParseError::MissingField { field: "published" })?;
        let updated_at = self
            .updated_at
            .ok_or(ParseError::MissingField { field: "updated" })?;
        let summary = self
            .summary
            .ok_or(ParseError::MissingField { field: "summary" })?;

        if created_at > updated_at {
            return Err(ParseError::InvertedTimestamps { id });
        }

        Ok(ParsedArticle {
            article: Article {
                id,
                title,
                created_at,
                updated_at,
                categories: self.categories,
                summary,
            },
            source_url,
        })
    }
}

/// Parses one feed entry into an [`Article`].
///
/// Repeated single-valued children keep their first occurrence. Category
/// codes keep feed order with duplicates dropped.
///
/// # Errors
///
/// - [`ParseError::BadId`] when the `<id>` URL is not a valid arXiv abstract URL
/// - [`ParseError::BadTimestamp`] when `<published>`/`<updated>` is not `%Y-%m-%dT%H:%M:%SZ`
/// - [`ParseError::MissingField`] when a required child is absent or blank
/// - [`ParseError::InvertedTimestamps`] when published is after updated
pub fn parse_entry(entry: &RawEntry) -> Result<ParsedArticle, ParseError> {
    let mut builder = ArticleBuilder::default();

    for field in entry.fields() {
        let text = field.text.as_deref().filter(|text| !text.trim().is_empty());
        match (field.name.as_str(), text) {
            ("id", Some(url)) => builder.id(url).inspect_err(|error| {
                warn!(url = %url.trim(), error = %error, "failed to parse arXiv entry id");
            })?,
            ("title", Some(title)) => {
                builder.title.get_or_insert_with(|| title.to_string());
            }
            ("published", Some(value)) => {
                ArticleBuilder::timestamp(&mut builder.created_at, "published", value)?;
            }
            ("updated", Some(value)) => {
                ArticleBuilder::timestamp(&mut builder.updated_at, "updated", value)?;
            }
            ("summary", text) => {
                builder
                    .summary
                    .get_or_insert_with(|| text.unwrap_or_default().to_string());
            }
            ("category", _) => {
                if let Some(code) = field.term.as_deref() {
                    builder.category(code);
                }
            }
            _ => {}
        }
    }

    builder.finish().inspect_err(|error| {
        if let ParseError::InvertedTimestamps { id } = error {
            warn!(id = %id, "arXiv entry has invalid timestamps: published > updated");
        }
    })
}
