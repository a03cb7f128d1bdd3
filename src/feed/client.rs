//! HTTP client for the arXiv query API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::user_agent;

use super::{PageSource, RawPage, TransportError, decode_feed};

/// Public arXiv API host.
pub const DEFAULT_API_BASE_URL: &str = "http://export.arxiv.org";

/// Results requested per call. The API caps a single response at 2000.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Window bounds are sent at minute resolution.
const QUERY_TIME_FORMAT: &str = "%Y%m%d%H%M";

/// Connection settings for [`ArxivClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedClientOptions {
    /// Scheme and host of the API, without the `/api/query` path.
    pub base_url: String,
    /// `max_results` sent with every query.
    pub page_size: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for FeedClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
        }
    }
}

/// [`PageSource`] backed by the arXiv export API.
///
/// Results are ordered by last-updated date ascending, so the final entry of
/// a page carries the latest `updated` timestamp in it.
pub struct ArxivClient {
    client: Client,
    base_url: String,
    page_size: u32,
}

impl ArxivClient {
    /// Creates a client with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] when the base URL does not parse
    /// or the HTTP client cannot be constructed.
    pub fn new(options: &FeedClientOptions) -> Result<Self, TransportError> {
        let parsed = Url::parse(&options.base_url).map_err(|error| {
            TransportError::ClientBuild(format!("invalid API base URL '{}': {error}", options.base_url))
        })?;
        if parsed.host_str().is_none() {
            return Err(TransportError::ClientBuild(format!(
                "API base URL '{}' has no host",
                options.base_url
            )));
        }

        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.read_timeout)
            .user_agent(user_agent::default_user_agent())
            .gzip(true)
            .build()
            .map_err(|error| TransportError::ClientBuild(error.to_string()))?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            page_size: options.page_size,
        })
    }

    /// Returns the configured page size.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

impl std::fmt::Debug for ArxivClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArxivClient")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

/// Builds the query URL for one window.
///
/// The search term is assembled by hand: the API expects literal `+TO+` and
/// brackets, which form-encoding would escape.
///
/// # Errors
///
/// Returns [`TransportError::InvalidWindow`] when `start` is after `end`.
pub fn build_query_url(
    base_url: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    page_size: u32,
) -> Result<String, TransportError> {
    let start_text = start.format(QUERY_TIME_FORMAT).to_string();
    let end_text = end.format(QUERY_TIME_FORMAT).to_string();

    if start > end {
        warn!(start = %start_text, end = %end_text, "refusing query with inverted time window");
        return Err(TransportError::InvalidWindow {
            start: start_text,
            end: end_text,
        });
    }

    Ok(format!(
        "{base}/api/query?search_query=lastUpdatedDate:[{start_text}+TO+{end_text}]\
         &max_results={page_size}&sortBy=lastUpdatedDate&sortOrder=ascending",
        base = base_url.trim_end_matches('/'),
    ))
}

#[async_trait]
impl PageSource for ArxivClient {
    #[instrument(skip(self), fields(start = %start, end = %end))]
    async fn fetch(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<RawPage, TransportError> {
        let url = build_query_url(&self.base_url, start, end, self.page_size)?;
        debug!(url = %url, "requesting page");

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|error| TransportError::Network {
                    url: url.clone(),
                    message: error.to_string(),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| TransportError::Network {
                url: url.clone(),
                message: error.to_string(),
            })?;

        decode_feed(&body)
    }
}
