//! Utility functions and helpers.

pub mod http;
pub mod text;
pub mod url;

use ::url::Url;

pub use self::url::{get_domain, page_key, strip_fragment};

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
