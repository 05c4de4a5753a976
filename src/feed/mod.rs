//! Feed retrieval and entry normalization.
//!
//! - [`FeedFetcher`] downloads a feed over HTTP and parses it into a
//!   [`ParsedFeed`] (RSS 0.9x/1.0/2.0, Atom and JSON Feed, via `feed-rs`)
//! - [`normalize`] turns a [`RawEntry`] into a [`NormalizedEntry`] ready to be
//!   stored
//!
//! Nothing here touches the database; persistence lives in
//! [`crate::catalog`] and [`crate::storage`].

mod document;
mod fetcher;
mod normalize;

pub use document::{parse_document, FeedFormatError, FeedMeta, ParsedFeed, RawEntry};
pub use fetcher::{FeedFetcher, FetchError};
pub use normalize::{normalize, parse_published, NormalizeError, NormalizedEntry, REQUIRED_FIELDS};
