use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, Entry, EntryDbRow, Feed, FeedDbRow, NewEntry, Page};

const ENTRY_COLUMNS: &str = "e.id, e.link, e.title, e.summary, e.published, e.timestamp";

impl Database {
    // ========================================================================
    // Entry Operations
    // ========================================================================

    /// Insert an entry unless one with the same link already exists.
    ///
    /// Returns the new row, or `None` when the link was already stored. The
    /// existing row is never modified. The check and the insert are a single
    /// statement, so concurrent callers cannot both create the same link.
    pub async fn insert_entry_if_absent(
        &self,
        entry: &NewEntry,
    ) -> Result<Option<Entry>, DatabaseError> {
        let row: Option<EntryDbRow> = sqlx::query_as(
            "INSERT INTO entries (link, title, summary, published, timestamp)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(link) DO NOTHING
             RETURNING id, link, title, summary, published, timestamp",
        )
        .bind(&entry.link)
        .bind(&entry.title)
        .bind(&entry.summary)
        .bind(entry.published.timestamp())
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::on_insert(e, "entries", &entry.link))?;

        Ok(row.map(EntryDbRow::into_entry))
    }

    /// Look up an entry by its link.
    pub async fn get_entry_by_link(&self, link: &str) -> Result<Option<Entry>, DatabaseError> {
        let row: Option<EntryDbRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.link = ?"
        ))
        .bind(link)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EntryDbRow::into_entry))
    }

    /// Associate an entry with a feed.
    ///
    /// Idempotent; returns `true` only when a new association row was written.
    pub async fn add_feed_entry(&self, feed_id: i64, entry_id: i64) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("INSERT OR IGNORE INTO feed_entries (feed_id, entry_id) VALUES (?, ?)")
                .bind(feed_id)
                .bind(entry_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether the feed already lists an entry with this link.
    pub async fn feed_has_entry_link(&self, feed_id: i64, link: &str) -> Result<bool, DatabaseError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
                SELECT EXISTS (
                    SELECT 1 FROM feed_entries fe
                    JOIN entries e ON e.id = fe.entry_id
                    WHERE fe.feed_id = ? AND e.link = ?
                )
            "#,
        )
        .bind(feed_id)
        .bind(link)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// A page of all entries, newest publication first.
    pub async fn list_entries(&self, page: Page) -> Result<Vec<Entry>, DatabaseError> {
        let rows: Vec<EntryDbRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e
             ORDER BY e.published DESC, e.id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EntryDbRow::into_entry).collect())
    }

    /// A page of the entries associated with one feed, newest publication first.
    pub async fn list_entries_for_feed(
        &self,
        feed_id: i64,
        page: Page,
    ) -> Result<Vec<Entry>, DatabaseError> {
        let rows: Vec<EntryDbRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e
             JOIN feed_entries fe ON fe.entry_id = e.id
             WHERE fe.feed_id = ?
             ORDER BY e.published DESC, e.id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(feed_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EntryDbRow::into_entry).collect())
    }

    /// Feeds that list the given entry, in feed insertion order.
    pub async fn feeds_for_entry(&self, entry_id: i64) -> Result<Vec<Feed>, DatabaseError> {
        let rows: Vec<FeedDbRow> = sqlx::query_as(
            r#"
                SELECT f.id, f.link, f.title, f.description, f.version,
                       f.created_at, f.last_fetched, f.error
                FROM feeds f
                JOIN feed_entries fe ON fe.feed_id = f.id
                WHERE fe.entry_id = ?
                ORDER BY f.id
            "#,
        )
        .bind(entry_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    /// Total number of stored entries.
    pub async fn count_entries(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Number of entries associated with one feed.
    pub async fn count_entries_for_feed(&self, feed_id: i64) -> Result<i64, DatabaseError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM feed_entries WHERE feed_id = ?")
                .bind(feed_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
