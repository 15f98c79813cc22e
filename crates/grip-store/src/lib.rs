//! File-backed sinks and sources for grip sessions.
//!
//! * [`CsvLogSink`] writes one `mag_{id}.csv` per session.
//! * [`JsonCatalog`] keeps the `{"sessions": [...]}` index next to the logs.
//! * [`CsvSampleSource`] replays a raw log through the engine.

mod catalog;
mod csv_log;
mod error;
mod replay;

pub use catalog::{JsonCatalog, SessionCatalog, DEFAULT_CATALOG_FILE};
pub use csv_log::{write_summary, CsvLogSink, LOG_COLUMNS};
pub use error::StoreError;
pub use replay::CsvSampleSource;
