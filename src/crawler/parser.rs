//! HTML link extraction
//!
//! Links are reported exactly as written in the page (`href` attribute value),
//! in document order. Deduplication and sorting happen when the snapshot is
//! built.

use crate::crawler::LinkFilter;
use scraper::{Html, Selector};

/// Extracts the `href` of every `<a>` element that passes the filter
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `filter` - The target's link filter
///
/// # Example
///
/// ```
/// use unfurl::crawler::{extract_links, LinkFilter};
///
/// let html = r#"<a href="/a.pdf">A</a><a href="/b.html">B</a>"#;
/// let filter = LinkFilter::new(r"\.pdf$").unwrap();
/// assert_eq!(extract_links(html, &filter), vec!["/a.pdf".to_string()]);
/// ```
pub fn extract_links(html: &str, filter: &LinkFilter) -> Vec<String> {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| filter.matches(href))
        .map(str::to_string)
        .collect()
}
