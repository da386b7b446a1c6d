//! Feed ingestion: fetching, parsing and normalizing RSS/Atom feeds.
//!
//! - **Fetching**: single-attempt HTTP retrieval with a timeout and a body size cap
//! - **Parsing**: RSS 2.0 first, Atom as a fallback, at most 10 items per feed
//! - **Sources**: the JSON registry of feeds to poll
//!
//! # Architecture
//!
//! - `document` - namespace-aware [`Element`] tree built with `quick-xml`
//! - `parser` - RSS and Atom extraction strategies over that tree
//! - `fetcher` - [`FeedIngestor`], which never fails: errors become empty results
//! - `sources` - loading, saving and the built-in default registry
//!
//! # Example
//!
//! ```ignore
//! use briefing::feed::{FeedIngestor, FetchSettings};
//!
//! let ingestor = FeedIngestor::new(&FetchSettings::default())?;
//! let items = ingestor.fetch("https://blogs.nvidia.com/feed/", 168).await;
//! ```

mod document;
mod fetcher;
mod parser;
mod sources;
mod types;

pub use document::{DocumentError, Element};
pub use fetcher::{FeedIngestor, FetchError, FetchSettings, BROWSER_USER_AGENT, DEFAULT_TIMEOUT};
pub use parser::{parse_feed, FeedShape, ParseResult, ATOM_NS, CONTENT_NS};
pub use sources::{default_sources, load_sources, parse_sources, save_sources, SourcesError};
pub use types::{
    FeedItem, FeedSource, MAX_ITEMS_PER_FEED, NO_SUMMARY, NO_TITLE, UNKNOWN_PUBLISHED,
};
