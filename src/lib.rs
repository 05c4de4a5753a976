//! feedmill polls RSS/Atom feeds and merges their entries into a SQLite
//! catalog, storing each entry link once no matter how many feeds list it.
//!
//! - [`feed`]: download, parse and normalize feed documents
//! - [`catalog`]: feeds, entries and their uniqueness rules
//! - [`ingest`]: per-feed ingestion, batches and the periodic trigger
//! - [`storage`]: the SQLite store underneath the catalog

pub mod catalog;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod util;
