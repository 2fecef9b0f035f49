//! Bookspot Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog;
pub mod ingestion;
pub mod registry;
pub mod search;
pub mod server;
pub mod user;

// Re-export commonly used types for convenience
pub use catalog::{BookRecord, CatalogStore, SqliteCatalogStore, StoredBook};
pub use ingestion::{IngestMode, IngestionPipeline};
pub use registry::StoreRegistry;
pub use search::SearchEngine;
pub use server::{run_server, RequestsLoggingLevel, ServerConfig};
pub use user::{AdminStore, AuthService, SqliteAdminStore};
