//! Structural parsing of feed documents on top of `feed-rs`.
//!
//! `feed-rs` deals with the XML itself (declared character encodings,
//! namespace prefixes, entities) and understands RSS 0.9x/1.0/2.0, Atom and
//! JSON Feed. Entry text is kept as the document gives it; removing markup is
//! the job of [`crate::feed::normalize`].

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, FeedType, Link};
use feed_rs::parser;
use thiserror::Error;

use super::normalize::parse_published;

/// Reasons a fetched document cannot be used as a feed.
///
/// Any of these aborts the ingestion of the feed; there is no partial result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedFormatError {
    /// The response body was empty or whitespace only
    #[error("Invalid or unrecognized feed format: empty document")]
    Empty,
    /// Not well formed, not a known feed format, or no channel/feed element
    #[error("Invalid or unrecognized feed format: {0}")]
    Malformed(String),
}

/// Feed-level metadata from `<channel>` or the Atom `<feed>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
}

/// One `<item>`/`<entry>` as it appears in the document.
///
/// Every field is optional here; required-field checks happen during
/// normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub link: Option<String>,
    /// Publication date, or the update date when there is none. A date the
    /// document carries but that cannot be read is the parse time.
    pub published: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// A validated feed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Format tag such as `rss20` or `atom10`. Never empty.
    pub version: &'static str,
    pub meta: FeedMeta,
    /// Entries in document order.
    pub entries: Vec<RawEntry>,
}

/// Parses a feed document.
///
/// # Errors
///
/// - [`FeedFormatError::Empty`] for an empty or blank body
/// - [`FeedFormatError::Malformed`] when `feed-rs` rejects the document: it is
///   not well formed, its root is not a feed format, or an RSS document has no
///   `<channel>`
pub fn parse_document(bytes: &[u8]) -> Result<ParsedFeed, FeedFormatError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(FeedFormatError::Empty);
    }

    let feed = parser::Builder::new()
        .timestamp_parser(published_or_now)
        .build()
        .parse(bytes)
        .map_err(|e| FeedFormatError::Malformed(e.to_string()))?;

    let link = select_link(&feed.links);
    Ok(ParsedFeed {
        version: version_tag(&feed.feed_type),
        meta: FeedMeta {
            title: feed.title.map(|t| t.content),
            description: feed.description.map(|d| d.content),
            link,
        },
        entries: feed.entries.into_iter().map(raw_entry).collect(),
    })
}

/// Reads every date in the document; unreadable ones become the current time.
fn published_or_now(raw: &str) -> Option<DateTime<Utc>> {
    parse_published(raw).or_else(|| {
        tracing::debug!(published = %raw, "Unparseable date, using current time");
        Some(Utc::now())
    })
}

fn version_tag(feed_type: &FeedType) -> &'static str {
    match feed_type {
        FeedType::RSS0 => "rss09x",
        FeedType::RSS1 => "rss10",
        FeedType::RSS2 => "rss20",
        FeedType::Atom => "atom10",
        FeedType::JSON => "json1",
    }
}

fn raw_entry(entry: Entry) -> RawEntry {
    let link = select_link(&entry.links).or_else(|| permalink_id(&entry.id));

    RawEntry {
        link,
        published: entry.published.or(entry.updated),
        summary: entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body)),
        title: entry.title.map(|t| t.content),
        author: entry.authors.into_iter().next().map(|p| p.name),
    }
}

/// Picks the alternate link (links without `rel` count as alternates), then
/// any other non-blank one.
fn select_link(links: &[Link]) -> Option<String> {
    let usable = || links.iter().filter(|l| !l.href.trim().is_empty());
    usable()
        .find(|l| {
            l.rel
                .as_deref()
                .map_or(true, |rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
        })
        .or_else(|| usable().next())
        .map(|l| l.href.trim().to_string())
}

/// An RSS `<guid>` that is a URL is the item's permalink.
fn permalink_id(id: &str) -> Option<String> {
    let id = id.trim();
    (id.starts_with("http://") || id.starts_with("https://")).then(|| id.to_string())
}
