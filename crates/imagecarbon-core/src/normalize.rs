//! Site URL normalization.
//!
//! Normalized URLs are the cache key for a site and the form shown to users:
//! lower-cased, no `http(s)://` prefix, no trailing slash and (optionally) no
//! query string. [`restore`] turns a normalized value back into something that
//! can be fetched.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static SCHEME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*://").expect("valid scheme regex"));

/// Options for [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Drop everything from the first `?` onwards.
    pub strip_query: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self { strip_query: true }
    }
}

/// Normalizes a site address with the default options (query stripped).
///
/// This is the form used as the cache key everywhere.
pub fn normalize_site(raw: &str) -> String {
    normalize(raw, NormalizeOptions::default())
}

/// Normalizes a raw site address.
///
/// Never fails. Repeated leading `http://`/`https://` prefixes and all trailing
/// slashes are removed so the result is a fixed point: normalizing it again
/// yields the same string.
pub fn normalize(raw: &str, options: NormalizeOptions) -> String {
    let mut value = raw.trim().to_lowercase();

    // Whitespace may also sit between stacked prefixes
    loop {
        if let Some(rest) = value.strip_prefix("https://") {
            value = rest.trim_start().to_string();
        } else if let Some(rest) = value.strip_prefix("http://") {
            value = rest.trim_start().to_string();
        } else {
            break;
        }
    }

    if options.strip_query {
        if let Some(idx) = value.find('?') {
            value.truncate(idx);
        }
    }

    let trimmed_len = value
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .len();
    value.truncate(trimmed_len);

    value
}

/// Restores a fetchable URL by prepending `https://` when no scheme is present.
pub fn restore(normalized: &str) -> String {
    if SCHEME_PREFIX.is_match(normalized) {
        normalized.to_string()
    } else {
        format!("https://{}", normalized)
    }
}

/// Returns true if `s` parses as a URL whose host has at least two labels.
///
/// Bare host names such as `http://localhost` are rejected.
pub fn is_valid_url(s: &str) -> bool {
    let Ok(url) = Url::parse(s) else {
        return false;
    };

    let Some(host) = url.host_str() else {
        return false;
    };

    let labels: Vec<&str> = host.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

/// Extracts the host portion of a URL for green-hosting lookups.
///
/// Falls back to the first path segment of the normalized form when the
/// input does not parse (e.g. it has no scheme).
pub fn host_of(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            return host.to_lowercase();
        }
    }

    normalize_site(url)
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "example.com/",
        "https://Example.com",
        "http://example.com/blog/?page=2",
        "HTTPS://www.Example.co.uk/path/to/page//",
        "https://http://double.example.com/",
        "example.com/search?q=http://other.org/",
        "ftp://files.example.com/",
    ];

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_site("https://Example.com/"), "example.com");
        assert_eq!(normalize_site("http://example.com"), "example.com");
        assert_eq!(normalize_site("example.com/"), "example.com");
        assert_eq!(normalize_site("example.com/blog/"), "example.com/blog");
    }

    #[test]
    fn test_normalize_strips_query() {
        assert_eq!(
            normalize_site("https://example.com/blog/?page=2"),
            "example.com/blog"
        );
        assert_eq!(normalize_site("example.com?utm=1"), "example.com");
    }

    #[test]
    fn test_normalize_keeps_query_when_asked() {
        let options = NormalizeOptions { strip_query: false };
        assert_eq!(
            normalize("https://Example.com/blog?page=2", options),
            "example.com/blog?page=2"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for sample in SAMPLES {
            for strip_query in [true, false] {
                let options = NormalizeOptions { strip_query };
                let once = normalize(sample, options);
                assert_eq!(normalize(&once, options), once, "sample {}", sample);
            }
        }
    }

    #[test]
    fn test_normalize_whitespace_after_scheme() {
        let options = NormalizeOptions::default();
        for sample in ["http:// a.com", "https://  http:// a.com/ ", " HTTP://\ta.com ?q=1"] {
            let once = normalize(sample, options);
            assert_eq!(once, "a.com", "sample {:?}", sample);
            assert_eq!(normalize(&once, options), once);
        }
    }

    #[test]
    fn test_normalize_restore_roundtrip() {
        for sample in SAMPLES {
            let normalized = normalize_site(sample);
            assert_eq!(
                normalize_site(&restore(&normalized)),
                normalized,
                "sample {}",
                sample
            );
        }
    }

    #[test]
    fn test_restore() {
        assert_eq!(restore("example.com"), "https://example.com");
        assert_eq!(restore("http://example.com"), "http://example.com");
        assert_eq!(restore("https://example.com"), "https://example.com");
    }

    #[test]
    fn test_restore_is_idempotent() {
        for sample in SAMPLES {
            let once = restore(sample);
            assert_eq!(restore(&once), once);
        }
    }

    #[test]
    fn test_restore_ignores_scheme_inside_path() {
        assert_eq!(
            restore("example.com/go?to=http://other.org"),
            "https://example.com/go?to=http://other.org"
        );
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://example.com"));
        assert!(is_valid_url("http://www.example.co.uk/path?x=1"));
        assert!(!is_valid_url("http://localhost"));
        assert!(!is_valid_url("http://localhost:3000/"));
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://cdn.Example.com/a/b.png"), "cdn.example.com");
        assert_eq!(host_of("example.com/a/b.png"), "example.com");
    }
}
