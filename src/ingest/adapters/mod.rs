// src/ingest/adapters/mod.rs
pub mod models;
pub mod news;

pub use models::ModelCatalogAdapter;
pub use news::RssNewsAdapter;
