use chrono::Utc;

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedDbRow, NewFeed};

const FEED_COLUMNS: &str =
    "id, link, title, description, version, created_at, last_fetched, error";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a new feed.
    ///
    /// This is a strict insert: an existing row with the same link is never
    /// touched and the call fails with [`DatabaseError::DuplicateKey`].
    pub async fn insert_feed(&self, feed: &NewFeed) -> Result<Feed, DatabaseError> {
        let row: FeedDbRow = sqlx::query_as(&format!(
            "INSERT INTO feeds (link, title, description, version, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(&feed.link)
        .bind(&feed.title)
        .bind(&feed.description)
        .bind(&feed.version)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::on_insert(e, "feeds", &feed.link))?;

        Ok(row.into_feed())
    }

    /// Look up a feed by its link.
    pub async fn get_feed_by_link(&self, link: &str) -> Result<Option<Feed>, DatabaseError> {
        let row: Option<FeedDbRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE link = ?"))
                .bind(link)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(FeedDbRow::into_feed))
    }

    /// Look up a feed by id.
    pub async fn get_feed(&self, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let row: Option<FeedDbRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
                .bind(feed_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(FeedDbRow::into_feed))
    }

    /// All feeds in insertion order.
    pub async fn get_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let rows: Vec<FeedDbRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    /// Overwrite the descriptive columns of a feed.
    ///
    /// Returns `false` if no feed has this id.
    pub async fn update_feed_metadata(
        &self,
        feed_id: i64,
        title: &str,
        description: &str,
        version: &str,
    ) -> Result<bool, DatabaseError> {
        let result =
            sqlx::query("UPDATE feeds SET title = ?, description = ?, version = ? WHERE id = ?")
                .bind(title)
                .bind(description)
                .bind(version)
                .bind(feed_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a feed by link. Association rows go with it; entries stay.
    ///
    /// Returns `false` if no feed has this link.
    pub async fn delete_feed(&self, link: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feeds WHERE link = ?")
            .bind(link)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the outcome of an ingestion attempt: stamps `last_fetched` and
    /// sets the error text, or clears it when `error` is `None`.
    pub async fn record_fetch_result(
        &self,
        feed_id: i64,
        error: Option<&str>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feeds SET last_fetched = ?, error = ? WHERE id = ?")
            .bind(Utc::now().timestamp())
            .bind(error)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn new_feed(link: &str) -> NewFeed {
        NewFeed {
            link: link.to_string(),
            title: "Sample Feed".to_string(),
            description: "This is a sample feed".to_string(),
            version: "rss20".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_by_link() {
        let db = test_db().await;
        let inserted = db
            .insert_feed(&new_feed("https://example.com/feed.xml"))
            .await
            .unwrap();
        assert!(inserted.id > 0);
        assert_eq!(inserted.last_fetched, None);
        assert_eq!(inserted.error, None);

        let fetched = db
            .get_feed_by_link("https://example.com/feed.xml")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, inserted);
        assert_eq!(db.get_feed(inserted.id).await.unwrap(), Some(inserted));
    }

    #[tokio::test]
    async fn test_insert_duplicate_link_fails() {
        let db = test_db().await;
        db.insert_feed(&new_feed("https://example.com/feed.xml"))
            .await
            .unwrap();

        let mut second = new_feed("https://example.com/feed.xml");
        second.title = "Other".to_string();
        match db.insert_feed(&second).await {
            Err(DatabaseError::DuplicateKey { table, link }) => {
                assert_eq!(table, "feeds");
                assert_eq!(link, "https://example.com/feed.xml");
            }
            other => panic!("Expected DuplicateKey, got {:?}", other),
        }

        // The original row is untouched
        let feeds = db.get_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].title, "Sample Feed");
    }

    #[tokio::test]
    async fn test_insert_empty_link_rejected() {
        let db = test_db().await;
        assert!(db.insert_feed(&new_feed("")).await.is_err());
    }

    #[tokio::test]
    async fn test_get_feeds_in_insertion_order() {
        let db = test_db().await;
        for link in ["https://b.example/rss", "https://a.example/rss", "https://c.example/rss"] {
            db.insert_feed(&new_feed(link)).await.unwrap();
        }
        let links: Vec<String> = db
            .get_feeds()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.link)
            .collect();
        assert_eq!(
            links,
            vec!["https://b.example/rss", "https://a.example/rss", "https://c.example/rss"]
        );
    }

    #[tokio::test]
    async fn test_update_metadata() {
        let db = test_db().await;
        let feed = db
            .insert_feed(&new_feed("https://example.com/feed.xml"))
            .await
            .unwrap();

        assert!(db
            .update_feed_metadata(feed.id, "Renamed", "", "atom10")
            .await
            .unwrap());
        let updated = db.get_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description, "");
        assert_eq!(updated.version, "atom10");

        assert!(!db.update_feed_metadata(9999, "x", "y", "z").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_feed() {
        let db = test_db().await;
        db.insert_feed(&new_feed("https://example.com/feed.xml"))
            .await
            .unwrap();

        assert!(db.delete_feed("https://example.com/feed.xml").await.unwrap());
        assert!(!db.delete_feed("https://example.com/feed.xml").await.unwrap());
        assert!(db.get_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_fetch_result() {
        let db = test_db().await;
        let feed = db
            .insert_feed(&new_feed("https://example.com/feed.xml"))
            .await
            .unwrap();

        db.record_fetch_result(feed.id, Some("HTTP error: status 500"))
            .await
            .unwrap();
        let failed = db.get_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(failed.error.as_deref(), Some("HTTP error: status 500"));
        assert!(failed.last_fetched.is_some());

        db.record_fetch_result(feed.id, None).await.unwrap();
        let recovered = db.get_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(recovered.error, None);
    }
}
