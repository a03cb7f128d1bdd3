//! Error types for feed transport.

use thiserror::Error;

/// Failures fetching or decoding one result page.
///
/// Any of these terminates the current pagination run; none is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The requested window ends before it starts.
    #[error("invalid time window: start {start} is after end {end}")]
    InvalidWindow {
        /// Window start as rendered in the query.
        start: String,
        /// Window end as rendered in the query.
        end: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Connection, timeout, or body-read failure.
    #[error("network error fetching {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error text.
        message: String,
    },

    /// The API answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The body is not a well-formed Atom document.
    #[error("malformed response body: {0}")]
    MalformedResponse(String),

    /// The body has no usable `totalResults` element.
    #[error("response is missing a numeric totalResults element")]
    MissingTotalResults,
}

impl TransportError {
    #[must_use]
    pub(crate) fn malformed(message: impl std::fmt::Display) -> Self {
        Self::MalformedResponse(message.to_string())
    }

    /// Stable label used in logs and run reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidWindow { .. } => "invalid_window",
            Self::ClientBuild(_) => "client_build",
            Self::Network { .. } => "network",
            Self::HttpStatus { .. } => "http_status",
            Self::MalformedResponse(_) => "malformed_response",
            Self::MissingTotalResults => "missing_total_results",
        }
    }
}
