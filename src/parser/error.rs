//! Error types for feed entry parsing.

use thiserror::Error;

/// An abstract-page URL that does not carry a recognizable arXiv identifier.
///
/// This is an expected per-record outcome: the entry is rejected and the
/// batch moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed arXiv identifier '{value}': {reason}")]
pub struct MalformedIdentifier {
    /// The offending input (full URL for prefix failures, candidate id otherwise).
    pub value: String,
    /// Why the input was refused.
    pub reason: &'static str,
}

impl MalformedIdentifier {
    #[must_use]
    pub(crate) fn bad_prefix(url: &str) -> Self {
        Self {
            value: url.to_string(),
            reason: "not an arXiv abstract-page URL",
        }
    }

    #[must_use]
    pub(crate) fn bad_shape(candidate: &str) -> Self {
        Self {
            value: candidate.to_string(),
            reason: "matches neither the old (archive/YYMMNNN) nor new (YYMM.NNNNN) format",
        }
    }
}

/// Reasons a feed entry cannot become an [`Article`](crate::Article).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The `<id>` URL failed identifier validation.
    #[error("bad id at url '{url}': {source}")]
    BadId {
        /// Source URL as it appeared in the entry.
        url: String,
        #[source]
        source: MalformedIdentifier,
    },

    /// A required child element was absent or empty.
    #[error("entry is missing required field '{field}'")]
    MissingField {
        /// Atom element name.
        field: &'static str,
    },

    /// A timestamp did not match the feed's wire format.
    #[error("field '{field}' has unparseable timestamp '{value}'")]
    BadTimestamp {
        /// Atom element name.
        field: &'static str,
        /// Raw text of the element.
        value: String,
    },

    /// Publish date is later than the last-updated date.
    #[error("entry {id} has published > updated")]
    InvertedTimestamps {
        /// Identifier of the offending entry.
        id: String,
    },
}

impl ParseError {
    /// Stable label used in logs and rejection records.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::BadId { .. } => "bad-id",
            Self::MissingField { .. } => "missing-field",
            Self::BadTimestamp { .. } => "bad-timestamp",
            Self::InvertedTimestamps { .. } => "inverted-timestamps",
        }
    }

    /// Article id the error refers to, once the entry got far enough to
    /// have one.
    #[must_use]
    pub fn article_id(&self) -> Option<&str> {
        match self {
            Self::InvertedTimestamps { id } => Some(id),
            Self::BadId { .. } | Self::MissingField { .. } | Self::BadTimestamp { .. } => None,
        }
    }
}
