use futures::future;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::engine::{IngestError, IngestReport, IngestionEngine};
use crate::storage::{DatabaseError, Feed};

/// Outcome of ingesting one feed in a batch.
#[derive(Debug)]
pub struct IngestResult {
    pub feed_id: i64,
    pub link: String,
    pub result: Result<IngestReport, IngestError>,
}

/// Runs the ingestion engine over every registered feed.
///
/// Clones share one cancellation token: once it is cancelled, feeds already
/// being ingested finish and feeds not yet started are skipped.
#[derive(Clone, Debug)]
pub struct BatchRunner {
    engine: IngestionEngine,
    max_concurrent: usize,
    cancel: CancellationToken,
}

impl BatchRunner {
    /// `max_concurrent` bounds how many feeds are ingested at once; values
    /// below 1 are treated as 1.
    pub fn new(engine: IngestionEngine, max_concurrent: usize) -> Self {
        Self {
            engine,
            max_concurrent: max_concurrent.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn engine(&self) -> &IngestionEngine {
        &self.engine
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop starting new feeds. Feeds already in progress run to completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Ingest every registered feed.
    ///
    /// Returns `Ok(None)` when no feeds are registered, otherwise the total
    /// number of entries saved across all feeds. A feed that fails adds
    /// nothing to the total and does not stop the others. After
    /// cancellation the total covers the feeds that were started.
    ///
    /// # Errors
    ///
    /// Only a failure to list the feeds is returned.
    pub async fn run_all(&self) -> Result<Option<usize>, DatabaseError> {
        let feeds = self.engine.catalog().feeds().await?;
        if feeds.is_empty() {
            tracing::warn!("No feeds registered, nothing to ingest");
            return Ok(None);
        }

        let feed_count = feeds.len();
        let results = self.run_feeds(feeds).await;

        let mut total = 0;
        let mut failed_feeds = 0;
        for outcome in &results {
            match &outcome.result {
                Ok(report) => total += report.saved,
                Err(e) => {
                    failed_feeds += 1;
                    tracing::error!(
                        feed_id = outcome.feed_id,
                        feed = %outcome.link,
                        error = %e,
                        "Feed ingestion failed"
                    );
                }
            }
        }

        let skipped = feed_count - results.len();
        if skipped > 0 {
            tracing::info!(
                feeds = feed_count,
                skipped = skipped,
                saved = total,
                "Batch cancelled, remaining feeds skipped"
            );
        } else {
            tracing::info!(
                feeds = feed_count,
                failed_feeds = failed_feeds,
                saved = total,
                "Batch complete"
            );
        }
        Ok(Some(total))
    }

    /// Ingest the given feeds and return one result per started feed, in
    /// completion order.
    ///
    /// Each feed runs on its own task so that a panic is reported as
    /// [`IngestError::Panicked`] for that feed alone. The token is checked
    /// before each feed starts; feeds not started when it is cancelled get
    /// no result.
    pub async fn run_feeds(&self, feeds: Vec<Feed>) -> Vec<IngestResult> {
        let cancel = self.cancel.clone();
        stream::iter(feeds)
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(|feed| {
                let engine = self.engine.clone();
                async move {
                    let feed_id = feed.id;
                    let link = feed.link.clone();
                    let result = match tokio::spawn(async move { engine.ingest(&feed).await }).await {
                        Ok(result) => result,
                        Err(join_err) => Err(IngestError::Panicked(join_err.to_string())),
                    };
                    IngestResult {
                        feed_id,
                        link,
                        result,
                    }
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }
}
