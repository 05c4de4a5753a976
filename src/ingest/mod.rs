//! Feed ingestion: one feed at a time ([`IngestionEngine`]), all feeds
//! ([`BatchRunner`]) and on a timer ([`spawn_periodic_batch`]).

mod batch;
mod engine;
mod scheduler;

pub use batch::{BatchRunner, IngestResult};
pub use engine::{EntryError, IngestError, IngestReport, IngestionEngine};
pub use scheduler::{spawn_periodic_batch, SchedulerHandle};
