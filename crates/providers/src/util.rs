//! Shared utility functions for backend adapters.

use hearth_domain::error::Error;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; connection failures get a hint
/// pointing at the model server; everything else maps to [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else if e.is_connect() {
        Error::Http(format!(
            "cannot connect to the model server ({e}); is the backend service running?"
        ))
    } else {
        Error::Http(e.to_string())
    }
}

/// First `max` characters of `s`, for error messages built from response bodies.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
