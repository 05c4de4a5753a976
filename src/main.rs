use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use feedmill::catalog::{CatalogError, FeedCatalog};
use feedmill::config::Config;
use feedmill::feed::FeedFetcher;
use feedmill::ingest::{spawn_periodic_batch, BatchRunner, IngestionEngine};
use feedmill::storage::{Database, DatabaseError, Page};
use feedmill::util::strip_control_chars;

/// Get the config directory path (~/.config/feedmill/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedmill"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedmill",
    version,
    about = "Poll RSS/Atom feeds and merge their entries into a SQLite catalog"
)]
struct Args {
    /// Config file (default: ~/.config/feedmill/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file, overrides `database_path` from the config
    #[arg(long, global = true, value_name = "FILE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a feed; its document is fetched once to fill in title and description
    Add { url: String },
    /// Remove a feed; its entries stay in the catalog
    Remove { url: String },
    /// Change a feed's title or description without fetching it
    Rename {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List registered feeds
    Feeds {
        #[arg(long)]
        json: bool,
    },
    /// List stored entries, newest first
    Entries {
        /// Only entries listed by this feed
        #[arg(long, value_name = "URL")]
        feed: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = Page::DEFAULT_SIZE)]
        page_size: u32,
        #[arg(long)]
        json: bool,
    },
    /// Ingest every registered feed once
    Run,
    /// Ingest every registered feed periodically until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `--json` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedmill=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| config.database_file(&config_path));
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            anyhow::bail!("{}", DatabaseError::InstanceLocked);
        }
        Err(e) => return Err(e).context("Failed to open database"),
    };

    let fetcher = FeedFetcher::new(&config).context("Failed to build HTTP client")?;
    let catalog = FeedCatalog::new(db, fetcher);

    match args.command {
        Command::Add { url } => add_feed(&catalog, &url).await,
        Command::Remove { url } => {
            if catalog.delete_feed(&url).await? {
                println!("Removed {}", url);
                Ok(())
            } else {
                anyhow::bail!("No feed registered for {}", url)
            }
        }
        Command::Rename {
            url,
            title,
            description,
        } => rename_feed(&catalog, &url, title, description).await,
        Command::Feeds { json } => list_feeds(&catalog, json).await,
        Command::Entries {
            feed,
            page,
            page_size,
            json,
        } => list_entries(&catalog, feed.as_deref(), Page::new(page, page_size), json).await,
        Command::Run => {
            let runner = batch_runner(catalog, &config);
            let cancel = runner.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted, finishing feeds already started");
                    cancel.cancel();
                }
            });
            match runner.run_all().await.context("Batch failed")? {
                Some(saved) => println!("Saved {} new entries", saved),
                None => println!("No feeds registered. Add one with `feedmill add <URL>`."),
            }
            Ok(())
        }
        Command::Watch => {
            let runner = batch_runner(catalog, &config);
            let interval = Duration::from_secs(config.refresh_interval_minutes * 60);
            tracing::info!(
                interval_minutes = config.refresh_interval_minutes,
                "Watching feeds, press Ctrl-C to stop"
            );
            let handle = spawn_periodic_batch(runner, interval);
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            handle.shutdown().await;
            Ok(())
        }
    }
}

fn batch_runner(catalog: FeedCatalog, config: &Config) -> BatchRunner {
    let engine = IngestionEngine::new(catalog, config.max_old_entries);
    BatchRunner::new(engine, config.max_concurrent_fetches)
}

async fn add_feed(catalog: &FeedCatalog, url: &str) -> Result<()> {
    match catalog.create_feed(url).await {
        Ok(feed) => {
            println!(
                "Added {} ({}, {})",
                feed.link,
                strip_control_chars(&feed.title),
                feed.version
            );
            Ok(())
        }
        Err(CatalogError::DuplicateFeed(link)) => {
            anyhow::bail!("Feed already registered: {}", link)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to add {}", url)),
    }
}

async fn rename_feed(
    catalog: &FeedCatalog,
    url: &str,
    title: Option<String>,
    description: Option<String>,
) -> Result<()> {
    if title.is_none() && description.is_none() {
        anyhow::bail!("Nothing to change: pass --title and/or --description");
    }
    let mut feed = catalog
        .feed_by_link(url)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No feed registered for {}", url))?;
    if let Some(title) = title {
        feed.title = title;
    }
    if let Some(description) = description {
        feed.description = description;
    }
    catalog.update_feed(&feed).await?;
    println!("Updated {}", feed.link);
    Ok(())
}

async fn list_feeds(catalog: &FeedCatalog, json: bool) -> Result<()> {
    let feeds = catalog.feeds().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&feeds)?);
        return Ok(());
    }
    if feeds.is_empty() {
        println!("No feeds registered.");
        return Ok(());
    }
    for feed in &feeds {
        let count = catalog.entry_count(feed).await?;
        let status = match (&feed.error, feed.last_fetched) {
            (Some(err), _) => format!("error: {}", strip_control_chars(err)),
            (None, Some(at)) => format!("fetched {}", at.format("%Y-%m-%d %H:%M UTC")),
            (None, None) => "never fetched".to_string(),
        };
        println!(
            "{:>4}  {}  [{}]  {} entries  {}",
            feed.id,
            feed.link,
            strip_control_chars(&feed.title),
            count,
            status
        );
    }
    Ok(())
}

async fn list_entries(
    catalog: &FeedCatalog,
    feed_link: Option<&str>,
    page: Page,
    json: bool,
) -> Result<()> {
    let entries = match feed_link {
        Some(link) => {
            let feed = catalog
                .feed_by_link(link)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No feed registered for {}", link))?;
            catalog.entries_for_feed(&feed, page).await?
        }
        None => catalog.entries(page).await?,
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No entries on page {}.", page.number());
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{}  {}\n      {}",
            entry.published.format("%Y-%m-%d %H:%M"),
            strip_control_chars(&entry.title),
            entry.link
        );
    }
    Ok(())
}
