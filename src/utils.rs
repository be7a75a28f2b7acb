//! Utility functions for text cleanup, link resolution and logging.
//!
//! This module provides helper functions used throughout the application:
//! - Whitespace collapsing for extracted element text
//! - Resolution of relative `href` values against the source page
//! - String truncation for logging response bodies

use url::Url;

/// Collapse runs of whitespace into single spaces and trim the ends.
///
/// Element text in real pages is full of indentation and newlines from the
/// markup; this is the only normalization applied to extracted text.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(collapse_whitespace("  Foo\n   Bar "), "Foo Bar");
/// ```
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve an `href` against the page it was found on.
///
/// Absolute links are returned normalized, relative ones are joined onto
/// `base`. If either side does not parse, the raw `href` is kept so no
/// scraped value is lost.
pub fn resolve_link(base: &str, href: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes, cut on a character
/// boundary, with an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte_boundary() {
        // "é" is two bytes; cutting at 1 must back off to 0.
        let result = truncate_for_log("éé", 1);
        assert_eq!(result, "…(+4 bytes)");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Foo\n\t  Bar  "), "Foo Bar");
        assert_eq!(collapse_whitespace("\n \n"), "");
        assert_eq!(collapse_whitespace("single"), "single");
    }

    #[test]
    fn test_resolve_link_relative() {
        assert_eq!(
            resolve_link("http://www.cracked.com/", "/article_1.html"),
            "http://www.cracked.com/article_1.html"
        );
    }

    #[test]
    fn test_resolve_link_absolute() {
        assert_eq!(
            resolve_link("http://www.cracked.com/", "https://other.example/x"),
            "https://other.example/x"
        );
    }

    #[test]
    fn test_resolve_link_unparseable_base_keeps_raw() {
        assert_eq!(resolve_link("not a url", "/x"), "/x");
    }
}
