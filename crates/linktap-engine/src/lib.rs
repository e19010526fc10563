//! Hierarchical incremental sync engine for LinkedIn Ads.
//!
//! The engine walks each selected top-level stream page by page,
//! dispatches child streams per parent record with parent-derived filter
//! parameters, and routes analytics children through the date-windowed
//! field-chunking path. Bookmarks advance monotonically and persist
//! through [`linktap_state::StateStore`] as pages and windows complete.
//!
//! Everything here is single-threaded, synchronous, blocking I/O: the
//! upstream API rate-limits in aggregate, so concurrency would buy
//! nothing and would complicate bookmark folding.

#![warn(clippy::pedantic)]

pub mod analytics;
pub mod pagination;
pub mod records;
pub mod sink;
pub mod sync;
pub mod transform;

pub use sink::{CollectingSink, JsonLinesSink, RecordSink};
pub use sync::{SyncEngine, SyncSummary};
