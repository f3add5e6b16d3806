// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod config;
pub mod enrich;
pub mod fetch;
pub mod ingest;
pub mod persist;
pub mod records;
pub mod run;
pub mod sources;
pub mod transform;

// ---- Re-exports for stable public API ----
pub use crate::records::{ArticleRecord, ModelRecord, SourceDescriptor};
pub use crate::run::{run_crawler, RunReport, RunStatus};
