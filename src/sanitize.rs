//! Sanitizers for untrusted strings that reach the filesystem or the
//! retrieval service.

use thiserror::Error;

/// Maximum length, in bytes, of a sanitized filename.
pub const MAX_FILENAME_LEN: usize = 255;

/// Name used when nothing usable survives sanitization.
pub const FALLBACK_FILENAME: &str = "document";

/// Maximum accepted query length in bytes.
pub const MAX_QUERY_LEN: usize = 5000;

const INJECTION_PATTERNS: &[&str] = &[
    "ignore previous instructions",
    "forget everything",
    "system:",
    "system prompt:",
    "# system",
    "you are now",
    "act as if",
];

/// Normalize an untrusted filename into a single safe path component.
///
/// Keeps only the last path segment, replaces `..` with `_`, drops NUL
/// bytes, trims whitespace and truncates to [`MAX_FILENAME_LEN`] bytes on a
/// character boundary. Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .find(|segment| !segment.trim().is_empty())
        .unwrap_or("");

    let cleaned = base.replace('\0', "").replace("..", "_");
    let mut cleaned = cleaned.trim().to_string();

    if cleaned.len() > MAX_FILENAME_LEN {
        let mut cut = MAX_FILENAME_LEN;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
        cleaned = cleaned.trim_end().to_string();
    }

    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}

/// Why a query was refused by [`sanitize_query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueryRejection {
    #[error("query must not be empty")]
    Empty,

    #[error("query exceeds {} bytes", MAX_QUERY_LEN)]
    TooLong,

    #[error("query contains suspicious content")]
    Suspicious,
}

/// Clean a free-text query before it is forwarded to the retrieval service.
pub fn sanitize_query(query: &str) -> Result<String, QueryRejection> {
    let query = query.replace('\0', "");
    let query = query.trim();

    if query.is_empty() {
        return Err(QueryRejection::Empty);
    }
    if query.len() > MAX_QUERY_LEN {
        return Err(QueryRejection::TooLong);
    }

    let lower = query.to_lowercase();
    if INJECTION_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Err(QueryRejection::Suspicious);
    }

    Ok(query.to_string())
}
