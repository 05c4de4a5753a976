use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("Another instance of feedmill appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A row with the same unique link already exists
    #[error("Duplicate key in {table}: {link}")]
    DuplicateKey { table: &'static str, link: String },

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }

    /// Maps an error from an INSERT into `table` keyed by `link`.
    ///
    /// Unique violations become [`DatabaseError::DuplicateKey`]; everything
    /// else goes through [`DatabaseError::from_sqlx`].
    pub(crate) fn on_insert(err: sqlx::Error, table: &'static str, link: &str) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                DatabaseError::DuplicateKey {
                    table,
                    link: link.to_string(),
                }
            }
            other => Self::from_sqlx(other),
        }
    }
}

// ============================================================================
// Helper Types
// ============================================================================

/// Converts stored unix seconds back to UTC. Out-of-range values collapse to
/// the epoch rather than failing the whole query.
pub(crate) fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Internal row type for Feed queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub link: String,
    pub title: String,
    pub description: String,
    pub version: String,
    pub created_at: i64,
    pub last_fetched: Option<i64>,
    pub error: Option<String>,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            link: self.link,
            title: self.title,
            description: self.description,
            version: self.version,
            created_at: from_unix(self.created_at),
            last_fetched: self.last_fetched.map(from_unix),
            error: self.error,
        }
    }
}

/// Internal row type for Entry queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntryDbRow {
    pub id: i64,
    pub link: String,
    pub title: String,
    pub summary: String,
    pub published: i64,
    pub timestamp: i64,
}

impl EntryDbRow {
    pub(crate) fn into_entry(self) -> Entry {
        Entry {
            id: self.id,
            link: self.link,
            title: self.title,
            summary: self.summary,
            published: from_unix(self.published),
            timestamp: from_unix(self.timestamp),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered feed source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feed {
    pub id: i64,
    /// Canonical URL of the feed document; unique across feeds.
    pub link: String,
    pub title: String,
    pub description: String,
    /// Feed-format tag such as `rss20` or `atom10`.
    pub version: String,
    pub created_at: DateTime<Utc>,
    /// Time of the last ingestion attempt, successful or not.
    pub last_fetched: Option<DateTime<Utc>>,
    /// Error from the last ingestion attempt, cleared on success.
    pub error: Option<String>,
}

/// Column values for a feed that has not been inserted yet.
#[derive(Debug, Clone, Default)]
pub struct NewFeed {
    pub link: String,
    pub title: String,
    pub description: String,
    pub version: String,
}

/// A stored entry. Entries are shared by every feed that lists the same link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: i64,
    pub link: String,
    pub title: String,
    pub summary: String,
    pub published: DateTime<Utc>,
    /// When the entry was first stored.
    pub timestamp: DateTime<Utc>,
}

/// Column values for an entry that has not been inserted yet.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub link: String,
    pub title: String,
    pub summary: String,
    pub published: DateTime<Utc>,
}

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    number: u32,
    size: u32,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 100;

    /// Page `number` (clamped to at least 1) of `size` rows (clamped to
    /// `1..=MAX_SIZE`).
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub(crate) fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub(crate) fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_SIZE)
    }
}
