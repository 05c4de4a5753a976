//! The feed catalog: feeds, entries and the association between them.
//!
//! [`FeedCatalog`] is the only writer of the store. It owns the uniqueness
//! rules (one feed per link, one entry per link across all feeds) and turns
//! store-level conflicts into catalog errors.

use thiserror::Error;

use crate::feed::{FeedFetcher, FetchError, NormalizedEntry};
use crate::storage::{Database, DatabaseError, Entry, Feed, NewEntry, NewFeed, Page};
use crate::util::{validate_feed_link, UrlValidationError};

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The link was empty or only whitespace
    #[error("Feed link is required")]
    MissingLink,

    #[error("Invalid feed link: {0}")]
    InvalidLink(#[from] UrlValidationError),

    /// A feed with this link is already registered
    #[error("Feed already exists: {0}")]
    DuplicateFeed(String),

    #[error("Feed not found: {0}")]
    NotFound(String),

    /// The feed document could not be fetched while registering the feed
    #[error("Failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result of [`FeedCatalog::merge_entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// `true` if this call stored the entry, `false` if it already existed
    pub created: bool,
    pub entry: Entry,
}

/// Registry of feeds and entries backed by a [`Database`].
#[derive(Clone, Debug)]
pub struct FeedCatalog {
    db: Database,
    fetcher: FeedFetcher,
}

impl FeedCatalog {
    pub fn new(db: Database, fetcher: FeedFetcher) -> Self {
        Self { db, fetcher }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn fetcher(&self) -> &FeedFetcher {
        &self.fetcher
    }

    // ========================================================================
    // Feeds
    // ========================================================================

    /// Register a new feed.
    ///
    /// The link is checked first: blank links fail with
    /// [`CatalogError::MissingLink`] and links that are not absolute http(s)
    /// URLs with [`CatalogError::InvalidLink`]. A link that is already
    /// registered fails with [`CatalogError::DuplicateFeed`]. None of these
    /// touch the network.
    ///
    /// Otherwise the feed document is fetched and its title, description and
    /// version are stored with the new feed; absent values become empty
    /// strings. If the fetch fails nothing is stored.
    pub async fn create_feed(&self, link: &str) -> Result<Feed, CatalogError> {
        let link = link.trim();
        if link.is_empty() {
            return Err(CatalogError::MissingLink);
        }
        validate_feed_link(link)?;

        if self.db.get_feed_by_link(link).await?.is_some() {
            return Err(CatalogError::DuplicateFeed(link.to_string()));
        }

        let parsed = self.fetcher.fetch(link).await?;
        let new_feed = NewFeed {
            link: link.to_string(),
            title: parsed.meta.title.unwrap_or_default(),
            description: parsed.meta.description.unwrap_or_default(),
            version: parsed.version.to_string(),
        };

        // A concurrent create can win between the lookup and the insert
        let feed = self.db.insert_feed(&new_feed).await.map_err(|e| match e {
            DatabaseError::DuplicateKey { link, .. } => CatalogError::DuplicateFeed(link),
            other => CatalogError::Database(other),
        })?;

        tracing::info!(
            feed = %feed.link,
            title = %feed.title,
            version = %feed.version,
            "Feed registered"
        );
        Ok(feed)
    }

    /// Persist edited title, description and version. Never fetches.
    pub async fn update_feed(&self, feed: &Feed) -> Result<(), CatalogError> {
        let updated = self
            .db
            .update_feed_metadata(feed.id, &feed.title, &feed.description, &feed.version)
            .await?;
        if !updated {
            return Err(CatalogError::NotFound(feed.link.clone()));
        }
        tracing::debug!(feed = %feed.link, "Feed updated");
        Ok(())
    }

    /// Remove a feed and its associations. Entries are kept.
    ///
    /// Returns `false` if no feed has this link.
    pub async fn delete_feed(&self, link: &str) -> Result<bool, CatalogError> {
        let deleted = self.db.delete_feed(link.trim()).await?;
        if deleted {
            tracing::info!(feed = %link, "Feed removed");
        }
        Ok(deleted)
    }

    /// All feeds in registration order.
    pub async fn feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        self.db.get_feeds().await
    }

    pub async fn feed_by_link(&self, link: &str) -> Result<Option<Feed>, DatabaseError> {
        self.db.get_feed_by_link(link.trim()).await
    }

    /// Store the outcome of an ingestion attempt on the feed.
    pub async fn record_fetch(&self, feed: &Feed, error: Option<&str>) -> Result<(), DatabaseError> {
        self.db.record_fetch_result(feed.id, error).await
    }

    // ========================================================================
    // Entries
    // ========================================================================

    /// Get-or-create an entry by link.
    ///
    /// An existing entry is returned as stored; the incoming title, summary
    /// and date never overwrite it.
    pub async fn merge_entry(&self, entry: &NormalizedEntry) -> Result<MergeOutcome, DatabaseError> {
        let new_entry = NewEntry {
            link: entry.link.clone(),
            title: entry.title.clone(),
            summary: entry.summary.clone(),
            published: entry.published,
        };

        if let Some(created) = self.db.insert_entry_if_absent(&new_entry).await? {
            return Ok(MergeOutcome {
                created: true,
                entry: created,
            });
        }

        let existing = self
            .db
            .get_entry_by_link(&entry.link)
            .await?
            .ok_or(DatabaseError::Other(sqlx::Error::RowNotFound))?;
        Ok(MergeOutcome {
            created: false,
            entry: existing,
        })
    }

    /// Link an entry to a feed. Returns `true` if the link is new.
    pub async fn associate(&self, feed: &Feed, entry: &Entry) -> Result<bool, DatabaseError> {
        self.db.add_feed_entry(feed.id, entry.id).await
    }

    /// Whether `feed` already lists an entry with this link.
    pub async fn is_associated(&self, feed: &Feed, link: &str) -> Result<bool, DatabaseError> {
        self.db.feed_has_entry_link(feed.id, link).await
    }

    pub async fn entries(&self, page: Page) -> Result<Vec<Entry>, DatabaseError> {
        self.db.list_entries(page).await
    }

    pub async fn entries_for_feed(&self, feed: &Feed, page: Page) -> Result<Vec<Entry>, DatabaseError> {
        self.db.list_entries_for_feed(feed.id, page).await
    }

    pub async fn feeds_for_entry(&self, entry: &Entry) -> Result<Vec<Feed>, DatabaseError> {
        self.db.feeds_for_entry(entry.id).await
    }

    pub async fn entry_count(&self, feed: &Feed) -> Result<i64, DatabaseError> {
        self.db.count_entries_for_feed(feed.id).await
    }
}
