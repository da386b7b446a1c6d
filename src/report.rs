//! Console output for aggregation runs and saved dumps.
//!
//! Formatting lives in `format_*` functions returning strings so it can be
//! tested; the `print_*` wrappers only write them to stdout.
use std::io::Write;

use crate::aggregate::{AggregatedContent, SourceEvent};
use crate::feed::FeedItem;
use crate::util::truncate_to_width;

/// Width of the source-name column in progress lines.
const NAME_COLUMN: usize = 30;

/// Default number of entries shown by the top-news digest.
pub const DEFAULT_TOP_LIMIT: usize = 5;

/// Prints one progress fragment. `Started` leaves the line open so the
/// outcome lands next to the source name.
pub fn print_progress(event: &SourceEvent<'_>) {
    match event {
        SourceEvent::Started { source } => {
            print!("  {} ", pad_name(&source.name));
            let _ = std::io::stdout().flush();
        }
        _ => println!("{}", format_outcome(event)),
    }
}

/// Outcome text for a finished source.
pub fn format_outcome(event: &SourceEvent<'_>) -> String {
    match event {
        SourceEvent::Started { .. } => String::new(),
        SourceEvent::Fetched {
            items,
            with_summaries,
            ..
        } => format!("ok ({items} items, {with_summaries} with summaries)"),
        SourceEvent::Failed { error, .. } if error.is_transient() => {
            format!("{} (try again later)", error.diagnostic())
        }
        SourceEvent::Failed { error, .. } => error.diagnostic(),
    }
}

fn pad_name(name: &str) -> String {
    let name = truncate_to_width(name, NAME_COLUMN);
    let width = unicode_width::UnicodeWidthStr::width(name.as_ref());
    format!("{}{}", name, " ".repeat(NAME_COLUMN.saturating_sub(width)))
}

/// Totals plus one line per category.
pub fn format_run_summary(content: &AggregatedContent) -> String {
    let stats = content.stats();
    let mut out = format!(
        "Results:\n  Total items:       {}\n  With summaries:    {}\n  Without summaries: {}\n",
        stats.total,
        stats.with_summaries,
        stats.without_summaries()
    );

    out.push_str("\nSummary by category:\n");
    for category in content.categories() {
        let stats = category.stats();
        out.push_str(&format!(
            "  {:15} : {:3} items ({:3} with summaries)\n",
            category.name, stats.total, stats.with_summaries
        ));
    }
    out
}

/// First item, in dump order, that carries a real summary.
pub fn sample_item(content: &AggregatedContent) -> Option<(&str, &FeedItem)> {
    content
        .categories()
        .iter()
        .flat_map(|c| &c.sources)
        .flat_map(|s| s.items.iter().map(move |item| (s.name.as_str(), item)))
        .find(|(_, item)| item.has_summary())
}

pub fn format_sample(source: &str, item: &FeedItem) -> String {
    format!(
        "Sample item:\n  Source:  {}\n  Title:   {}\n  Summary: {}\n  Link:    {}\n",
        source,
        truncate_to_width(&item.title, 60),
        truncate_to_width(&item.summary, 150),
        item.link
    )
}

/// Up to `limit` items, the first item of each source, in dump order.
pub fn top_news(content: &AggregatedContent, limit: usize) -> Vec<(&str, &FeedItem)> {
    content
        .categories()
        .iter()
        .flat_map(|c| &c.sources)
        .filter_map(|s| s.items.first().map(|item| (s.name.as_str(), item)))
        .take(limit)
        .collect()
}

pub fn format_top_news(entries: &[(&str, &FeedItem)]) -> String {
    if entries.is_empty() {
        return "No news items found. Feeds may be unavailable; run `briefing fetch` again later.\n"
            .to_string();
    }

    let mut out = String::new();
    for (source, item) in entries {
        let link = if item.link.is_empty() {
            "No link"
        } else {
            item.link.as_str()
        };
        out.push_str(&format!(
            "\n{}:\n   {}\n   {}\n",
            source,
            item.title,
            truncate_to_width(link, 60)
        ));
    }
    out
}

pub fn print_run_summary(content: &AggregatedContent) {
    println!();
    print!("{}", format_run_summary(content));
    if let Some((source, item)) = sample_item(content) {
        println!();
        print!("{}", format_sample(source, item));
    }
}

pub fn print_top_news(content: &AggregatedContent, limit: usize) {
    print!("{}", format_top_news(&top_news(content, limit)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FeedSource, FetchError, NO_SUMMARY};
    use pretty_assertions::assert_eq;

    fn item(title: &str, summary: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: format!("https://example.com/{title}"),
            summary: summary.to_string(),
            published: "Unknown".to_string(),
        }
    }

    fn sample_content() -> AggregatedContent {
        let mut content = AggregatedContent::new();
        content.insert("youtube", "Sentdex", vec![]);
        content.insert("youtube", "3Blue1Brown", vec![item("v1", NO_SUMMARY), item("v2", "Linear algebra")]);
        content.insert("news", "Ars Technica AI", vec![item("n1", "Chips"), item("n2", "Models")]);
        content.insert("news", "The Verge AI", vec![item("n3", NO_SUMMARY)]);
        content
    }

    #[test]
    fn test_outcome_lines() {
        let source = FeedSource::new("news", "Feed", "https://example.com/feed");
        let fetched = SourceEvent::Fetched {
            source: &source,
            items: 10,
            with_summaries: 8,
        };
        assert_eq!(format_outcome(&fetched), "ok (10 items, 8 with summaries)");

        let limited = FetchError::RateLimited;
        let failed = SourceEvent::Failed {
            source: &source,
            error: &limited,
        };
        assert_eq!(format_outcome(&failed), "Rate limited (try again later)");

        let missing = FetchError::NotFound;
        let failed = SourceEvent::Failed {
            source: &source,
            error: &missing,
        };
        assert_eq!(format_outcome(&failed), "404");
    }

    #[test]
    fn test_pad_name() {
        assert_eq!(pad_name("r/LocalLLaMA").len(), NAME_COLUMN);
        let long = "A very long source name that will not fit the column";
        assert_eq!(pad_name(long), format!("{}...", &long[..27]));
    }

    #[test]
    fn test_run_summary() {
        let summary = format_run_summary(&sample_content());
        assert!(summary.contains("Total items:       5"));
        assert!(summary.contains("With summaries:    3"));
        assert!(summary.contains("Without summaries: 2"));
        assert!(summary.contains("youtube         :   2 items (  1 with summaries)"));
        assert!(summary.contains("news            :   3 items (  2 with summaries)"));
    }

    #[test]
    fn test_sample_item_skips_missing_summaries() {
        let content = sample_content();
        let (source, item) = sample_item(&content).unwrap();
        assert_eq!(source, "3Blue1Brown");
        assert_eq!(item.title, "v2");
        assert!(sample_item(&AggregatedContent::new()).is_none());
    }

    #[test]
    fn test_top_news_one_per_source() {
        let content = sample_content();
        let top: Vec<_> = top_news(&content, 5)
            .into_iter()
            .map(|(source, item)| (source, item.title.as_str()))
            .collect();
        assert_eq!(
            top,
            [("3Blue1Brown", "v1"), ("Ars Technica AI", "n1"), ("The Verge AI", "n3")]
        );
        assert_eq!(top_news(&content, 2).len(), 2);
    }

    #[test]
    fn test_top_news_empty_hint() {
        assert!(format_top_news(&[]).contains("No news items found"));
        let entry = item("t", "s");
        let text = format_top_news(&[("Src", &entry)]);
        assert!(text.contains("Src:"));
        assert!(text.contains("https://example.com/t"));
    }
}
