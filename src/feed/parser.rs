use crate::feed::document::{DocumentError, Element};
use crate::feed::types::{FeedItem, MAX_ITEMS_PER_FEED, NO_SUMMARY, NO_TITLE, UNKNOWN_PUBLISHED};
use crate::util::{clean_html, normalize_link};

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";
pub const DUBLIN_CORE_NS: &str = "http://purl.org/dc/elements/1.1/";
pub const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";

/// Which extraction strategy produced the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedShape {
    Rss,
    Atom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    /// `None` when neither strategy found anything.
    pub shape: Option<FeedShape>,
    /// At most [`MAX_ITEMS_PER_FEED`] items, in feed order.
    pub items: Vec<FeedItem>,
}

/// Parses a feed body into normalized items.
///
/// RSS 2.0 `item` elements are tried first; only when none exist is the
/// document read as Atom. Field lookups are guarded per element, so an odd
/// entry gets fallback values instead of failing the feed.
///
/// # Errors
///
/// Returns [`DocumentError`] when the body is not well-formed XML.
pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult, DocumentError> {
    let root = Element::parse(bytes)?;

    let items = extract_rss(&root);
    if !items.is_empty() {
        return Ok(ParseResult {
            shape: Some(FeedShape::Rss),
            items,
        });
    }

    let items = extract_atom(&root);
    let shape = (!items.is_empty()).then_some(FeedShape::Atom);
    Ok(ParseResult { shape, items })
}

/// RSS 2.0 strategy: un-namespaced `item` elements anywhere below the root.
fn extract_rss(root: &Element) -> Vec<FeedItem> {
    root.descendants(None, "item", MAX_ITEMS_PER_FEED)
        .into_iter()
        .map(|item| {
            let link = item
                .child(None, "link")
                .map(|l| normalize_link(l.text()))
                .unwrap_or_default();

            let summary = first_summary(
                item,
                &[
                    (None, "description"),
                    (None, "summary"),
                    (Some(CONTENT_NS), "encoded"),
                ],
            );

            let published = first_date(item, &[(None, "pubDate"), (Some(DUBLIN_CORE_NS), "date")]);

            FeedItem {
                title: title_of(item.child(None, "title")),
                link,
                summary,
                published,
            }
        })
        .collect()
}

/// Atom strategy: `{Atom}entry` elements anywhere below the root.
fn extract_atom(root: &Element) -> Vec<FeedItem> {
    root.descendants(Some(ATOM_NS), "entry", MAX_ITEMS_PER_FEED)
        .into_iter()
        .map(|entry| {
            let mut summary = first_summary(entry, &[(Some(ATOM_NS), "summary"), (Some(ATOM_NS), "content")]);
            // YouTube channel feeds keep the description under media:group
            if summary == NO_SUMMARY {
                if let Some(group) = entry.child(Some(MEDIA_NS), "group") {
                    summary = first_summary(group, &[(Some(MEDIA_NS), "description")]);
                }
            }

            FeedItem {
                title: title_of(entry.child(Some(ATOM_NS), "title")),
                link: atom_link(entry),
                summary,
                published: first_date(entry, &[(Some(ATOM_NS), "updated"), (Some(ATOM_NS), "published")]),
            }
        })
        .collect()
}

/// Prefers the `alternate` link (explicit or implied by a missing `rel`),
/// falling back to the first `link` element.
fn atom_link(entry: &Element) -> String {
    let alternate = entry
        .children_named(Some(ATOM_NS), "link")
        .find(|l| matches!(l.attribute("rel"), None | Some("alternate")));

    alternate
        .or_else(|| entry.child(Some(ATOM_NS), "link"))
        .and_then(|l| l.attribute("href"))
        .map(normalize_link)
        .unwrap_or_default()
}

fn title_of(element: Option<&Element>) -> String {
    element
        .map(|e| clean_html(e.text()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

/// First candidate whose cleaned text is non-empty.
fn first_summary(parent: &Element, candidates: &[(Option<&str>, &str)]) -> String {
    candidates
        .iter()
        .filter_map(|(ns, name)| parent.child(*ns, name))
        .map(|e| clean_html(e.text()))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| NO_SUMMARY.to_string())
}

/// First candidate with non-blank text, kept verbatim apart from trimming.
fn first_date(parent: &Element, candidates: &[(Option<&str>, &str)]) -> String {
    candidates
        .iter()
        .filter_map(|(ns, name)| parent.child(*ns, name))
        .map(|e| e.text().trim())
        .find(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_PUBLISHED)
        .to_string()
}
