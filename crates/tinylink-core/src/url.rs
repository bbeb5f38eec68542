//! Long-URL normalization.

/// Maximum length, in characters, of a normalized long URL.
pub const MAX_URL_LENGTH: usize = 2048;

const DEFAULT_SCHEME: &str = "https://";

/// Ensures `url` carries an `http://` or `https://` scheme.
///
/// The scheme check is case-insensitive and the input is otherwise kept
/// verbatim: `HTTP://Example.com` stays as is, `example.com/x` becomes
/// `https://example.com/x`. Callers are expected to trim first.
pub fn normalize_url(url: &str) -> String {
    if has_http_scheme(url) {
        url.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{url}")
    }
}

fn has_http_scheme(url: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}
