// src/utils/url.rs

//! URL manipulation utilities.

use sha2::{Digest, Sha256};
use url::Url;

/// Hex characters kept from the URL digest in file names and record keys.
const PAGE_KEY_LEN: usize = 12;

/// Extensions that never point at an HTML document.
const NON_DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "zip", "gz", "rar", "7z", "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp",
    "mp3", "mp4", "avi", "mov", "webm", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "hwp", "csv",
    "txt", "xml", "json", "css", "js", "woff", "woff2", "ttf", "exe", "dmg", "apk",
];

/// Extract the lowercase host from a URL.
///
/// # Examples
/// ```
/// use sitescan::utils::url::get_domain;
///
/// assert_eq!(
///     get_domain("https://Example.COM/path"),
///     Some("example.com".to_string())
/// );
/// ```
pub fn get_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Drop the `#fragment` part of a URL.
pub fn strip_fragment(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split('#').next().unwrap_or(url).to_string(),
    }
}

/// Stable short key for a URL, used in screenshot names and record keys.
pub fn page_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(PAGE_KEY_LEN);
    key
}

/// Whether `candidate` lives on the same host as `base`.
pub fn is_same_domain(base: &str, candidate: &str) -> bool {
    match (get_domain(base), get_domain(candidate)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Whether the URL path ends in a known non-HTML file extension.
pub fn is_non_document(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => return false,
    };
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((_, ext)) => NON_DOCUMENT_EXTENSIONS.contains(&ext),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://sub.example.com:8080/path"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(get_domain("invalid-url"), None);
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(
            strip_fragment("https://example.com/a?b=1#top"),
            "https://example.com/a?b=1"
        );
        assert_eq!(strip_fragment("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_page_key_stable() {
        let a = page_key("https://example.com/a");
        assert_eq!(a.len(), 12);
        assert_eq!(a, page_key("https://example.com/a"));
        assert_ne!(a, page_key("https://example.com/b"));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_same_domain() {
        assert!(is_same_domain("https://example.com/", "https://EXAMPLE.com/x"));
        assert!(!is_same_domain("https://example.com/", "https://cdn.example.com/x"));
        assert!(!is_same_domain("https://example.com/", "mailto:a@example.com"));
    }

    #[test]
    fn test_non_document() {
        assert!(is_non_document("https://example.com/files/report.PDF"));
        assert!(is_non_document("https://example.com/img/logo.png?v=2"));
        assert!(!is_non_document("https://example.com/news/view.html"));
        assert!(!is_non_document("https://example.com/v1.2/docs"));
        assert!(!is_non_document("https://example.com/"));
    }
}
