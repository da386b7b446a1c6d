use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use briefing::aggregate::{aggregate_all, AggregateOptions, AggregatedContent};
use briefing::config::Config;
use briefing::feed::{default_sources, load_sources, save_sources, FeedIngestor};
use briefing::report;

/// Get the default config file path (~/.config/briefing/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("briefing")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "briefing", about = "Aggregate RSS/Atom feeds into a JSON news digest")]
struct Args {
    /// Config file (default: ~/.config/briefing/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every configured feed and write the aggregated dump (default)
    Fetch {
        /// Sources JSON file
        #[arg(long, value_name = "FILE")]
        sources: Option<PathBuf>,

        /// Output JSON file
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Age window in hours
        #[arg(long, value_name = "HOURS")]
        max_age_hours: Option<u64>,

        /// Drop items older than the age window
        #[arg(long)]
        strict_age: bool,
    },

    /// Write the built-in source list
    Sources {
        /// Destination file (defaults to the configured sources path)
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the first item of each source from the last dump
    Top {
        /// Dump to read (defaults to the configured output path)
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Maximum number of items
        #[arg(long, default_value_t = report::DEFAULT_TOP_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    match args.command.unwrap_or(Command::Fetch {
        sources: None,
        output: None,
        max_age_hours: None,
        strict_age: false,
    }) {
        Command::Fetch {
            sources,
            output,
            max_age_hours,
            strict_age,
        } => {
            let sources_path = sources.unwrap_or_else(|| config.sources_path.clone());
            let output_path = output.unwrap_or_else(|| config.output_path.clone());

            let mut options = config.aggregate_options();
            if let Some(hours) = max_age_hours {
                options.max_age_hours = hours;
            }
            options.strict_age_filter |= strict_age;

            run_fetch(&config, sources_path, output_path, options).await
        }
        Command::Sources { output, force } => {
            let path = output.unwrap_or_else(|| config.sources_path.clone());
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            let sources = default_sources();
            save_sources(&path, &sources).await?;
            println!("Saved {} content sources to {}", sources.len(), path.display());
            Ok(())
        }
        Command::Top { input, limit } => {
            let path = input.unwrap_or_else(|| config.output_path.clone());
            if !path.exists() {
                eprintln!("No aggregated content at {}", path.display());
                eprintln!("Run `briefing fetch` first.");
                std::process::exit(1);
            }
            let content = AggregatedContent::read_dump(&path).await?;
            report::print_top_news(&content, limit);
            Ok(())
        }
    }
}

async fn run_fetch(
    config: &Config,
    sources_path: PathBuf,
    output_path: PathBuf,
    options: AggregateOptions,
) -> Result<()> {
    if !sources_path.exists() {
        eprintln!("Error: No sources file found at {}", sources_path.display());
        eprintln!();
        eprintln!("To get started, write the default list:");
        eprintln!("  briefing sources");
        std::process::exit(1);
    }

    let sources = load_sources(&sources_path).await?;
    if sources.is_empty() {
        eprintln!("Warning: No valid sources found in {}", sources_path.display());
        return Ok(());
    }

    let ingestor =
        FeedIngestor::new(&config.fetch_settings()).context("Failed to create HTTP client")?;

    println!("\nFetching {} feeds...\n", sources.len());
    let content = aggregate_all(&ingestor, &sources, options, report::print_progress).await;

    report::print_run_summary(&content);

    content.write_dump(&output_path).await?;
    println!("\nSaved to: {}", output_path.display());
    Ok(())
}
