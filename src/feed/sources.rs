use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::feed::types::FeedSource;
use crate::util::validate_url;

/// Errors that can occur while reading a sources file.
#[derive(Debug, Error)]
pub enum SourcesError {
    #[error("Failed to read sources file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sources JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads the feed registry from a JSON array of
/// `{"category", "name", "url", "type"}` records.
///
/// Records with a URL that is not absolute http(s) are skipped with a
/// warning; the rest keep file order.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array of
/// source records.
pub async fn load_sources(path: &Path) -> Result<Vec<FeedSource>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(SourcesError::from)
        .with_context(|| format!("Failed to read sources file: {}", path.display()))?;
    let sources = parse_sources(&content)
        .with_context(|| format!("Failed to parse sources file: {}", path.display()))?;
    Ok(sources)
}

/// Parses sources JSON. Shared by [`load_sources`] and tests.
pub fn parse_sources(content: &str) -> Result<Vec<FeedSource>, SourcesError> {
    let records: Vec<FeedSource> = serde_json::from_str(content)?;

    let sources = records
        .into_iter()
        .filter(|source| match validate_url(&source.url) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    name = %source.name,
                    url = %source.url,
                    error = %e,
                    "Skipping source with invalid URL"
                );
                false
            }
        })
        .collect();

    Ok(sources)
}

/// Writes the registry as pretty-printed JSON.
pub async fn save_sources(path: &Path, sources: &[FeedSource]) -> Result<()> {
    let json = serde_json::to_string_pretty(sources).context("Failed to serialize sources")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write sources file: {}", path.display()))?;
    Ok(())
}

/// The built-in AI/ML news registry written by `briefing sources`.
pub fn default_sources() -> Vec<FeedSource> {
    const REGISTRY: &[(&str, &[(&str, &str)])] = &[
        (
            "youtube",
            &[
                ("Two Minute Papers", "https://www.youtube.com/feeds/videos.xml?channel_id=UCbfYPyITQ-7l4upoX8nvctg"),
                ("Yannic Kilcher", "https://www.youtube.com/feeds/videos.xml?channel_id=UCZHmQk67mSJgfCCTn7xBfew"),
                ("AI Explained", "https://www.youtube.com/feeds/videos.xml?channel_id=UCNJ1Ymd5yFuUPtn21xtRbbw"),
                ("Sentdex", "https://www.youtube.com/feeds/videos.xml?channel_id=UCfzlCWGWYyIQ0aLC5w48gBQ"),
                ("3Blue1Brown", "https://www.youtube.com/feeds/videos.xml?channel_id=UCYO_jab_esuFRV4b17AJtAw"),
            ],
        ),
        (
            "reddit",
            &[
                ("r/MachineLearning", "https://www.reddit.com/r/MachineLearning/.rss"),
                ("r/artificial", "https://www.reddit.com/r/artificial/.rss"),
                ("r/LocalLLaMA", "https://www.reddit.com/r/LocalLLaMA/.rss"),
                ("r/MLQuestions", "https://www.reddit.com/r/MLQuestions/.rss"),
                ("r/learnmachinelearning", "https://www.reddit.com/r/learnmachinelearning/.rss"),
            ],
        ),
        (
            "blogs",
            &[
                ("OpenAI Blog", "https://openai.com/blog/rss.xml"),
                ("Google AI Blog", "https://blog.research.google/feeds/posts/default"),
                ("DeepMind Blog", "https://deepmind.google/blog/rss.xml"),
                ("Meta AI", "https://ai.meta.com/blog/rss/"),
                ("Anthropic", "https://www.anthropic.com/index/rss.xml"),
                ("NVIDIA Blog", "https://blogs.nvidia.com/feed/"),
                ("Hugging Face", "https://huggingface.co/blog/feed.xml"),
                ("Papers with Code", "https://paperswithcode.com/feeds/latest.xml"),
            ],
        ),
        (
            "news",
            &[
                ("VentureBeat AI", "https://venturebeat.com/category/ai/feed/"),
                ("TechCrunch AI", "https://techcrunch.com/category/artificial-intelligence/feed/"),
                ("The Verge AI", "https://www.theverge.com/ai-artificial-intelligence/rss/index.xml"),
                ("Ars Technica AI", "https://arstechnica.com/ai/feed/"),
            ],
        ),
        (
            "research",
            &[
                ("arXiv CS.AI", "http://export.arxiv.org/rss/cs.AI"),
                ("arXiv CS.LG", "http://export.arxiv.org/rss/cs.LG"),
                ("arXiv CS.CV", "http://export.arxiv.org/rss/cs.CV"),
                ("arXiv CS.CL", "http://export.arxiv.org/rss/cs.CL"),
            ],
        ),
    ];

    REGISTRY
        .iter()
        .flat_map(|(category, feeds)| {
            feeds
                .iter()
                .map(move |(name, url)| FeedSource::new(category, name, url))
        })
        .collect()
}
