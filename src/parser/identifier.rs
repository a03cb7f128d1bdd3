//! arXiv identifier recognition.
//!
//! arXiv has issued identifiers in two shapes:
//! - old (pre-2007): `archive/YYMMNNN`, e.g. `hep-th/9901001` or `math.GT/0309136`
//! - new: `YYMM.NNNN` or `YYMM.NNNNN`, e.g. `0704.0001`, `2301.01234`
//!
//! See <https://info.arxiv.org/help/arxiv_identifier_for_services.html>.

use std::sync::LazyLock;

use regex::Regex;

use super::error::MalformedIdentifier;

/// Abstract-page URL prefixes emitted by the arXiv API in `<id>` elements.
const ABS_URL_PREFIXES: [&str; 2] = ["http://arxiv.org/abs/", "https://arxiv.org/abs/"];

static VERSION_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"v\d+$"));

/// Compiles a regex at static init; panics on invalid pattern.
fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Converts an abstract-page URL into a canonical, version-less identifier.
///
/// ```
/// use arxin_core::parser::normalize_abs_url;
///
/// assert_eq!(normalize_abs_url("http://arxiv.org/abs/1122.3344v55").unwrap(), "1122.3344");
/// assert_eq!(normalize_abs_url("http://arxiv.org/abs/hep-th/9901001v2").unwrap(), "hep-th/9901001");
/// assert!(normalize_abs_url("http://arxiv.org/abs/not-an-id").is_err());
/// ```
///
/// # Errors
///
/// Returns [`MalformedIdentifier`] when the URL has an unknown prefix or the
/// remaining candidate matches neither identifier shape.
pub fn normalize_abs_url(url: &str) -> Result<String, MalformedIdentifier> {
    let Some(candidate) = ABS_URL_PREFIXES
        .iter()
        .find_map(|prefix| url.strip_prefix(prefix))
    else {
        return Err(MalformedIdentifier::bad_prefix(url));
    };

    let candidate = match VERSION_SUFFIX_RE.find(candidate) {
        Some(suffix) => &candidate[..suffix.start()],
        None => candidate,
    };

    if is_new_format(candidate) || is_old_format(candidate) {
        Ok(candidate.to_string())
    } else {
        Err(MalformedIdentifier::bad_shape(candidate))
    }
}

/// `archive/YYMMNNN`: exactly one `/`, followed by exactly 7 digits.
#[must_use]
pub fn is_old_format(id: &str) -> bool {
    let mut sections = id.split('/');
    match (sections.next(), sections.next(), sections.next()) {
        (Some(_), Some(number), None) => is_digits(number, &[7]),
        _ => false,
    }
}

/// `YYMM.NNNN(N)`: exactly one `.`, 4 digits before it, 4 or 5 digits after it.
#[must_use]
pub fn is_new_format(id: &str) -> bool {
    let mut sections = id.split('.');
    match (sections.next(), sections.next(), sections.next()) {
        (Some(yymm), Some(number), None) => is_digits(yymm, &[4]) && is_digits(number, &[4, 5]),
        _ => false,
    }
}

fn is_digits(section: &str, allowed_lengths: &[usize]) -> bool {
    allowed_lengths.contains(&section.len()) && section.bytes().all(|b| b.is_ascii_digit())
}
