use thiserror::Error;

use crate::catalog::FeedCatalog;
use crate::feed::{normalize, FetchError, NormalizeError, RawEntry};
use crate::storage::{DatabaseError, Feed};

/// Why a whole feed could not be ingested.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The ingestion task panicked
    #[error("Ingestion task panicked: {0}")]
    Panicked(String),
}

/// Why a single entry was skipped. Never aborts the feed.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Counters for one ingestion run of one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Entries newly associated with the feed
    pub saved: usize,
    /// Entries the feed already listed
    pub already_known: usize,
    /// Entries skipped because of a normalization or store error
    pub failed: usize,
    /// The scan stopped at the old-entry limit before the end of the document
    pub stopped_early: bool,
}

enum EntryOutcome {
    Saved,
    AlreadyKnown,
}

/// Ingests one feed at a time: fetch, normalize, merge.
#[derive(Clone, Debug)]
pub struct IngestionEngine {
    catalog: FeedCatalog,
    max_old_entries: usize,
}

impl IngestionEngine {
    /// `max_old_entries` is the number of consecutive already-known entries
    /// after which a scan stops.
    pub fn new(catalog: FeedCatalog, max_old_entries: usize) -> Self {
        Self {
            catalog,
            max_old_entries,
        }
    }

    pub fn catalog(&self) -> &FeedCatalog {
        &self.catalog
    }

    /// Fetch `feed` and merge its new entries into the catalog.
    ///
    /// Entries are processed in document order. An entry the feed already
    /// lists extends the old-entry streak; a saved entry resets it; a failed
    /// entry leaves it alone. Once the streak reaches `max_old_entries` the
    /// rest of the document is ignored.
    ///
    /// Entries saved before a later entry fails stay saved.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Fetch`] when the document cannot be retrieved or
    /// parsed. The error is also recorded on the feed.
    pub async fn ingest(&self, feed: &Feed) -> Result<IngestReport, IngestError> {
        let parsed = match self.catalog.fetcher().fetch(&feed.link).await {
            Ok(parsed) => parsed,
            Err(e) => {
                if let Err(db_err) = self.catalog.record_fetch(feed, Some(&e.to_string())).await {
                    tracing::warn!(feed = %feed.link, error = %db_err, "Failed to record fetch error");
                }
                return Err(e.into());
            }
        };

        let mut report = IngestReport::default();
        let mut old_streak = 0usize;

        for (position, raw) in parsed.entries.iter().enumerate() {
            if old_streak >= self.max_old_entries {
                tracing::debug!(
                    feed = %feed.link,
                    position = position,
                    remaining = parsed.entries.len() - position,
                    "Old-entry limit reached, stopping scan"
                );
                report.stopped_early = true;
                break;
            }

            match self.ingest_entry(feed, raw).await {
                Ok(EntryOutcome::Saved) => {
                    report.saved += 1;
                    old_streak = 0;
                }
                Ok(EntryOutcome::AlreadyKnown) => {
                    report.already_known += 1;
                    old_streak += 1;
                }
                Err(EntryError::Normalize(e)) => {
                    report.failed += 1;
                    tracing::debug!(feed = %feed.link, position = position, error = %e, "Skipping entry");
                }
                Err(EntryError::Store(e)) => {
                    report.failed += 1;
                    tracing::warn!(
                        feed = %feed.link,
                        position = position,
                        link = raw.link.as_deref().unwrap_or_default(),
                        error = %e,
                        "Failed to store entry"
                    );
                }
            }
        }

        if let Err(e) = self.catalog.record_fetch(feed, None).await {
            tracing::warn!(feed = %feed.link, error = %e, "Failed to record fetch time");
        }

        tracing::info!(
            feed = %feed.link,
            saved = report.saved,
            already_known = report.already_known,
            failed = report.failed,
            stopped_early = report.stopped_early,
            "Feed ingested"
        );
        Ok(report)
    }

    async fn ingest_entry(&self, feed: &Feed, raw: &RawEntry) -> Result<EntryOutcome, EntryError> {
        let link = raw
            .link
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
            .ok_or(NormalizeError::MissingField("link"))?;

        if self.catalog.is_associated(feed, link).await? {
            return Ok(EntryOutcome::AlreadyKnown);
        }

        let entry = normalize(raw)?;
        let merged = self.catalog.merge_entry(&entry).await?;
        self.catalog.associate(feed, &merged.entry).await?;
        Ok(EntryOutcome::Saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedFetcher;
    use crate::storage::{Database, NewFeed};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(n: usize) -> String {
        format!(
            "<item><title>Story {n}</title><link>https://news.example/{n}</link>\
             <description>Body {n}</description><pubDate>Tue, 10 Jun 2003 04:00:00 GMT</pubDate></item>"
        )
    }

    fn rss(items: &[String]) -> String {
        format!(
            "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>News</title>{}</channel></rss>",
            items.concat()
        )
    }

    async fn setup(body: String, max_old_entries: usize) -> (MockServer, IngestionEngine, Feed) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .insert_feed(&NewFeed {
                link: format!("{}/rss", server.uri()),
                ..NewFeed::default()
            })
            .await
            .unwrap();
        let fetcher = FeedFetcher::with_client(reqwest::Client::new(), Duration::from_secs(5));
        let engine = IngestionEngine::new(FeedCatalog::new(db, fetcher), max_old_entries);
        (server, engine, feed)
    }

    #[tokio::test]
    async fn test_ingest_saves_all_new_entries() {
        let items: Vec<String> = (1..=3).map(item).collect();
        let (_server, engine, feed) = setup(rss(&items), 10).await;

        let report = engine.ingest(&feed).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                saved: 3,
                ..IngestReport::default()
            }
        );

        let stored = engine.catalog().database().get_feed(feed.id).await.unwrap().unwrap();
        assert!(stored.last_fetched.is_some());
        assert_eq!(stored.error, None);
    }

    #[tokio::test]
    async fn test_ingest_zero_entries() {
        let (_server, engine, feed) = setup(rss(&[]), 10).await;
        assert_eq!(engine.ingest(&feed).await.unwrap(), IngestReport::default());
    }

    #[tokio::test]
    async fn test_failed_entry_does_not_touch_streak() {
        // known, known, broken, known: streak reaches 3 only if the broken entry is neutral
        let items = vec![
            item(1),
            item(2),
            "<item><title>no link</title></item>".to_string(),
            item(3),
            item(4),
        ];
        let (_server, engine, feed) = setup(rss(&items), 3).await;

        let catalog = engine.catalog();
        for n in 1..=3 {
            let entry = normalize(&RawEntry {
                link: Some(format!("https://news.example/{n}")),
                published: Some(chrono::Utc::now()),
                summary: Some(String::new()),
                title: Some(String::new()),
                author: None,
            })
            .unwrap();
            let merged = catalog.merge_entry(&entry).await.unwrap();
            catalog.associate(&feed, &merged.entry).await.unwrap();
        }

        let report = engine.ingest(&feed).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                saved: 0,
                already_known: 3,
                failed: 1,
                stopped_early: true,
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_recorded_on_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let feed = db
            .insert_feed(&NewFeed {
                link: format!("{}/gone", server.uri()),
                ..NewFeed::default()
            })
            .await
            .unwrap();
        let fetcher = FeedFetcher::with_client(reqwest::Client::new(), Duration::from_secs(5));
        let engine = IngestionEngine::new(FeedCatalog::new(db.clone(), fetcher), 10);

        let err = engine.ingest(&feed).await.unwrap_err();
        assert!(matches!(err, IngestError::Fetch(FetchError::HttpStatus(404))));

        let stored = db.get_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(stored.error.as_deref(), Some("HTTP error: status 404"));
        assert!(stored.last_fetched.is_some());
    }
}
