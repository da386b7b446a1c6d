//! Sequential aggregation of all configured sources into one dump.
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::feed::{FeedIngestor, FeedItem, FeedSource, FetchError};

/// Options for one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Age window applied by [`filter_recent`] when `strict_age_filter` is set.
    pub max_age_hours: u64,
    /// Drop items older than `max_age_hours` after fetching.
    pub strict_age_filter: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            max_age_hours: 168,
            strict_age_filter: false,
        }
    }
}

/// Progress notifications emitted while [`aggregate_all`] runs.
#[derive(Debug)]
pub enum SourceEvent<'a> {
    Started {
        source: &'a FeedSource,
    },
    Fetched {
        source: &'a FeedSource,
        items: usize,
        with_summaries: usize,
    },
    Failed {
        source: &'a FeedSource,
        error: &'a FetchError,
    },
}

/// Item counts over some part of the aggregated content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub total: usize,
    pub with_summaries: usize,
}

impl AggregateStats {
    pub fn without_summaries(&self) -> usize {
        self.total - self.with_summaries
    }

    fn of(items: &[FeedItem]) -> Self {
        Self {
            total: items.len(),
            with_summaries: items.iter().filter(|i| i.has_summary()).count(),
        }
    }

    fn add(self, other: Self) -> Self {
        Self {
            total: self.total + other.total,
            with_summaries: self.with_summaries + other.with_summaries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContent {
    pub name: String,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryContent {
    pub name: String,
    pub sources: Vec<SourceContent>,
}

impl CategoryContent {
    pub fn stats(&self) -> AggregateStats {
        self.sources
            .iter()
            .map(|s| AggregateStats::of(&s.items))
            .fold(AggregateStats::default(), AggregateStats::add)
    }
}

/// Category → source name → items, in registry order.
///
/// Serializes as nested JSON objects whose key order matches insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedContent {
    categories: Vec<CategoryContent>,
}

impl AggregatedContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `items` under `category`/`source`, creating the category on
    /// first sight. A repeated source name replaces the earlier list in place.
    pub fn insert(&mut self, category: &str, source: &str, items: Vec<FeedItem>) {
        let index = match self.categories.iter().position(|c| c.name == category) {
            Some(index) => index,
            None => {
                self.categories.push(CategoryContent {
                    name: category.to_string(),
                    sources: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        let sources = &mut self.categories[index].sources;

        match sources.iter_mut().find(|s| s.name == source) {
            Some(existing) => existing.items = items,
            None => sources.push(SourceContent {
                name: source.to_string(),
                items,
            }),
        }
    }

    pub fn categories(&self) -> &[CategoryContent] {
        &self.categories
    }

    pub fn get(&self, category: &str, source: &str) -> Option<&[FeedItem]> {
        self.categories
            .iter()
            .find(|c| c.name == category)?
            .sources
            .iter()
            .find(|s| s.name == source)
            .map(|s| s.items.as_slice())
    }

    /// True when no category holds any source.
    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|c| c.sources.is_empty())
    }

    pub fn stats(&self) -> AggregateStats {
        self.categories
            .iter()
            .map(CategoryContent::stats)
            .fold(AggregateStats::default(), AggregateStats::add)
    }

    /// Writes the dump as pretty-printed JSON (non-ASCII kept as-is).
    pub async fn write_dump(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize content")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write dump: {}", path.display()))?;
        Ok(())
    }

    /// Reads a dump written by [`write_dump`](Self::write_dump).
    pub async fn read_dump(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read dump: {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid dump: {}", path.display()))
    }
}

impl Serialize for AggregatedContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.name, &SourcesMap(&category.sources))?;
        }
        map.end()
    }
}

struct SourcesMap<'a>(&'a [SourceContent]);

impl Serialize for SourcesMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for source in self.0 {
            map.serialize_entry(&source.name, &source.items)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AggregatedContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ContentVisitor;

        impl<'de> Visitor<'de> for ContentVisitor {
            type Value = AggregatedContent;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of category names to source maps")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut content = AggregatedContent::new();
                while let Some((category, OrderedSources(sources))) =
                    access.next_entry::<String, OrderedSources>()?
                {
                    if sources.is_empty() {
                        content.categories.push(CategoryContent {
                            name: category,
                            sources: Vec::new(),
                        });
                        continue;
                    }
                    for source in sources {
                        content.insert(&category, &source.name, source.items);
                    }
                }
                Ok(content)
            }
        }

        deserializer.deserialize_map(ContentVisitor)
    }
}

/// Source map read in document order.
struct OrderedSources(Vec<SourceContent>);

impl<'de> Deserialize<'de> for OrderedSources {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SourcesVisitor;

        impl<'de> Visitor<'de> for SourcesVisitor {
            type Value = OrderedSources;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of source names to item lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut sources = Vec::new();
                while let Some((name, items)) = access.next_entry::<String, Vec<FeedItem>>()? {
                    sources.push(SourceContent { name, items });
                }
                Ok(OrderedSources(sources))
            }
        }

        deserializer.deserialize_map(SourcesVisitor)
    }
}

/// Fetches every source in order, one at a time, and collects the results.
///
/// A failed source is recorded with an empty list; the run always covers the
/// whole registry. `on_event` observes progress (the CLI prints it).
pub async fn aggregate_all<F>(
    ingestor: &FeedIngestor,
    sources: &[FeedSource],
    options: AggregateOptions,
    mut on_event: F,
) -> AggregatedContent
where
    F: FnMut(&SourceEvent<'_>),
{
    let mut content = AggregatedContent::new();
    let now = Utc::now();

    for source in sources {
        on_event(&SourceEvent::Started { source });

        let items = match ingestor.try_fetch(&source.url).await {
            Ok(items) => {
                let items = if options.strict_age_filter {
                    filter_recent(items, options.max_age_hours, now)
                } else {
                    items
                };
                let stats = AggregateStats::of(&items);
                on_event(&SourceEvent::Fetched {
                    source,
                    items: stats.total,
                    with_summaries: stats.with_summaries,
                });
                items
            }
            Err(error) => {
                tracing::warn!(
                    source = %source.name,
                    url = %source.url,
                    error = %error,
                    "Feed skipped: {}",
                    error.diagnostic()
                );
                on_event(&SourceEvent::Failed {
                    source,
                    error: &error,
                });
                Vec::new()
            }
        };

        content.insert(&source.category, &source.name, items);
    }

    let stats = content.stats();
    tracing::info!(
        sources = sources.len(),
        items = stats.total,
        with_summaries = stats.with_summaries,
        "Aggregation complete"
    );

    content
}

/// Drops items published more than `max_age_hours` before `now`.
///
/// Only timestamps that parse as RFC 2822 (RSS) or RFC 3339 (Atom) are
/// compared; "Unknown" and unparseable dates are kept.
pub fn filter_recent(items: Vec<FeedItem>, max_age_hours: u64, now: DateTime<Utc>) -> Vec<FeedItem> {
    let hours = i64::try_from(max_age_hours).unwrap_or(i64::MAX);
    let Some(cutoff) = Duration::try_hours(hours).and_then(|age| now.checked_sub_signed(age)) else {
        return items;
    };

    items
        .into_iter()
        .filter(|item| parse_published(&item.published).map_or(true, |published| published >= cutoff))
        .collect()
}

/// Parses an item timestamp in either feed date format.
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
