//! Field visit consolidation service.
//!
//! Imports time-stamped stage/discharge records and groups them into field
//! visits, one per real-world trip to a monitoring location.
//!
//! Pipeline: `ingest` → `partition` → `consolidate` (+ `attach`) → `sink`,
//! driven end to end by `batch::consolidate`.

pub mod attach;
pub mod batch;
pub mod config;
pub mod consolidate;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod partition;
pub mod sink;

pub use batch::{ConsolidationSummary, consolidate};
pub use config::ImportConfig;
pub use model::{ImportError, Record, Visit};
