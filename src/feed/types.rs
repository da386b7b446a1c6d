use serde::{Deserialize, Serialize};

/// Maximum number of items kept from a single feed.
pub const MAX_ITEMS_PER_FEED: usize = 10;

/// Summary used when an item carries no usable description.
pub const NO_SUMMARY: &str = "No summary available";

/// Title used when an item's title is missing or cleans to nothing.
pub const NO_TITLE: &str = "No title";

/// Timestamp used when an item carries no date.
pub const UNKNOWN_PUBLISHED: &str = "Unknown";

/// A configured feed to poll.
///
/// Loaded once at startup from the sources file and never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    /// Grouping key in the aggregated output (e.g. "blogs", "research").
    pub category: String,
    /// Display name, unique within its category.
    pub name: String,
    /// Feed URL (RSS 2.0 or Atom).
    pub url: String,
    /// Source kind. Always "rss"; kept so files round-trip unchanged.
    #[serde(rename = "type", default = "default_source_kind")]
    pub kind: String,
}

fn default_source_kind() -> String {
    "rss".to_string()
}

impl FeedSource {
    pub fn new(category: &str, name: &str, url: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            kind: default_source_kind(),
        }
    }
}

/// A normalized feed entry.
///
/// Every field is always populated: `title` and `summary` are plain text of
/// at most 300 characters (or the [`NO_TITLE`] / [`NO_SUMMARY`] literals),
/// `link` is an absolute URL or empty, and `published` is the feed's raw
/// date string or [`UNKNOWN_PUBLISHED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: String,
}

impl FeedItem {
    /// True when the summary was extracted from the feed rather than defaulted.
    pub fn has_summary(&self) -> bool {
        self.summary != NO_SUMMARY
    }
}
