//! DOM parsing and card-to-record extraction.
//!
//! A source page is a list of repeated "card" elements. Each card is mapped to
//! a [`CandidateRecord`] by three independent lookups:
//!
//! | Field | Lookup | Default selector |
//! |-------|--------|------------------|
//! | `title` | text of matching descendants | `a` |
//! | `link` | `href` of the nearest matching ancestor (or the card itself) | `a` |
//! | `summary` | text of matching descendants | `p` |
//!
//! A lookup that matches nothing leaves its field `None`; it never drops the
//! card or aborts the batch.

use crate::error::ScrapeError;
use crate::models::CandidateRecord;
use crate::utils::collapse_whitespace;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

pub const DEFAULT_CARD_SELECTOR: &str = "div.content-card-content";
pub const DEFAULT_TITLE_SELECTOR: &str = "a";
pub const DEFAULT_LINK_SELECTOR: &str = "a";
pub const DEFAULT_SUMMARY_SELECTOR: &str = "p";

/// Compiled selectors describing where records live in a page.
#[derive(Debug, Clone)]
pub struct ExtractRules {
    card: Selector,
    title: Selector,
    link: Selector,
    summary: Selector,
}

impl ExtractRules {
    /// Compile the four selectors.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Config`] naming the first selector that does not parse.
    pub fn new(card: &str, title: &str, link: &str, summary: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            card: compile("card", card)?,
            title: compile("title", title)?,
            link: compile("link", link)?,
            summary: compile("summary", summary)?,
        })
    }

    /// Rules for the default source page.
    #[cfg(test)]
    pub fn defaults() -> Result<Self, ScrapeError> {
        Self::new(
            DEFAULT_CARD_SELECTOR,
            DEFAULT_TITLE_SELECTOR,
            DEFAULT_LINK_SELECTOR,
            DEFAULT_SUMMARY_SELECTOR,
        )
    }
}

fn compile(which: &str, selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector)
        .map_err(|e| ScrapeError::Config(format!("invalid {which} selector {selector:?}: {e}")))
}

/// Parse raw HTML into a queryable document.
///
/// Parsing is lenient: malformed markup still yields a best-effort tree. Only
/// input with no markup at all is rejected.
///
/// # Errors
///
/// Returns [`ScrapeError::Parse`] if `html` is blank or contains no tags.
pub fn parse_document(html: &str) -> Result<Html, ScrapeError> {
    if html.trim().is_empty() {
        return Err(ScrapeError::Parse("document is empty".to_string()));
    }
    if !html.contains('<') {
        return Err(ScrapeError::Parse("document contains no markup".to_string()));
    }
    Ok(Html::parse_document(html))
}

/// Extract one candidate record per card element, in document order.
pub fn extract(document: &Html, rules: &ExtractRules) -> Vec<CandidateRecord> {
    let records: Vec<CandidateRecord> = document
        .select(&rules.card)
        .map(|card| CandidateRecord {
            title: text_of(card, &rules.title),
            link: enclosing_href(card, &rules.link),
            summary: text_of(card, &rules.summary),
        })
        .collect();

    debug!(
        cards = records.len(),
        empty = records.iter().filter(|r| r.is_empty()).count(),
        "Extracted candidate records"
    );
    records
}

/// Parse and extract in one synchronous step.
///
/// The parsed tree is not `Send`, so async callers go through this function
/// to keep it from living across an await point.
pub fn extract_from_html(
    html: &str,
    rules: &ExtractRules,
) -> Result<Vec<CandidateRecord>, ScrapeError> {
    let document = parse_document(html)?;
    Ok(extract(&document, rules))
}

/// Collapsed text of every descendant of `card` matching `selector`.
fn text_of(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let joined = card
        .select(selector)
        .map(|el| el.text().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ");
    let text = collapse_whitespace(&joined);
    (!text.is_empty()).then_some(text)
}

/// `href` of the card itself or its nearest ancestor matching `selector`.
fn enclosing_href(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    std::iter::once(card)
        .chain(card.ancestors().filter_map(ElementRef::wrap))
        .find(|el| selector.matches(el))
        .and_then(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ExtractRules {
        ExtractRules::defaults().unwrap()
    }

    #[test]
    fn test_example_card_without_href() {
        let html = r#"<html><body>
            <div class="content-card-content">
                <div><a>Foo</a></div>
                <p>Bar</p>
            </div>
        </body></html>"#;

        let records = extract_from_html(html, &rules()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title.as_deref(), Some("Foo"));
        assert_eq!(records[0].link, None);
        assert_eq!(records[0].summary.as_deref(), Some("Bar"));
    }

    #[test]
    fn test_one_record_per_card_with_missing_fields() {
        let html = r#"<html><body>
            <div class="content-card-content"><div><a>One</a></div><p>First</p></div>
            <div class="content-card-content"><div><a>Two</a></div></div>
            <div class="content-card-content"><p>Third only summary</p></div>
            <div class="content-card-content"></div>
            <div class="other-card"><a>Not a card</a></div>
        </body></html>"#;

        let records = extract_from_html(html, &rules()).unwrap();
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].title.as_deref(), Some("One"));
        assert_eq!(records[0].summary.as_deref(), Some("First"));

        assert_eq!(records[1].title.as_deref(), Some("Two"));
        assert_eq!(records[1].summary, None);

        assert_eq!(records[2].title, None);
        assert_eq!(records[2].summary.as_deref(), Some("Third only summary"));

        assert!(records[3].is_empty());
    }

    #[test]
    fn test_link_comes_from_enclosing_anchor() {
        let html = r#"<html><body>
            <a href="/article_1.html">
                <div class="content-card-content">
                    <h3>  Headline
                        one </h3>
                    <p>Summary one</p>
                </div>
            </a>
            <div class="content-card-content"><h3>No link</h3></div>
        </body></html>"#;

        let rules = ExtractRules::new(DEFAULT_CARD_SELECTOR, "h3", "a[href]", "p").unwrap();
        let records = extract_from_html(html, &rules).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title.as_deref(), Some("Headline one"));
        assert_eq!(records[0].link.as_deref(), Some("/article_1.html"));
        assert_eq!(records[0].summary.as_deref(), Some("Summary one"));
        assert_eq!(records[1].link, None);
    }

    #[test]
    fn test_card_that_is_itself_an_anchor() {
        let html = r#"<a class="card" href="https://example.com/x"><span>T</span></a>"#;
        let rules = ExtractRules::new("a.card", "span", "a", "p").unwrap();
        let records = extract_from_html(html, &rules).unwrap();
        assert_eq!(records[0].link.as_deref(), Some("https://example.com/x"));
    }

    #[test]
    fn test_multiple_matches_are_concatenated() {
        let html = r#"<div class="content-card-content"><p>Part one.</p><p>Part two.</p></div>"#;
        let records = extract_from_html(html, &rules()).unwrap();
        assert_eq!(records[0].summary.as_deref(), Some("Part one. Part two."));
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let html = r#"<div class="content-card-content"><a>A</a><p>B</p></div>
                      <div class="content-card-content"><p>C</p></div>"#;
        let document = parse_document(html).unwrap();
        let rules = rules();
        let first = extract(&document, &rules);
        let second = extract(&document, &rules);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_no_cards_yields_no_records() {
        let html = "<html><body><p>nothing</p></body></html>";
        let records = extract_from_html(html, &rules()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_html_still_parses() {
        let html = r#"<div class="content-card-content"><a>Unclosed<p>Dangling"#;
        let records = extract_from_html(html, &rules()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].title.as_deref().unwrap_or_default().starts_with("Unclosed"));
    }

    #[test]
    fn test_parse_rejects_empty_and_markupless_input() {
        assert!(matches!(parse_document(""), Err(ScrapeError::Parse(_))));
        assert!(matches!(parse_document("  \n "), Err(ScrapeError::Parse(_))));
        assert!(matches!(parse_document("just text"), Err(ScrapeError::Parse(_))));
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let err = ExtractRules::new("div[", "a", "a", "p").unwrap_err();
        assert!(matches!(err, ScrapeError::Config(ref m) if m.contains("card")));
    }
}
