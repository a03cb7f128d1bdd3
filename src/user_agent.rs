//! User-Agent string for arXiv API traffic.
//!
//! arXiv asks API clients to identify themselves; a single format keeps the
//! header easy to find in their logs.

/// Project URL for User-Agent identification (good citizenship; RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/arxin/arxin";

/// Default User-Agent for API requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("arxin/{version} (research-tool; +{PROJECT_UA_URL})")
}
