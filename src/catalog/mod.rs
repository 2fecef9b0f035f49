//! Per-store book catalog.

mod sqlite_catalog_store;

pub use sqlite_catalog_store::SqliteCatalogStore;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One physical book at one store spot.
///
/// There is no global identity: a title may legitimately occupy several
/// shelf locations within the same store, so duplicate rows are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    /// Shelf code, e.g. "A1".
    pub location: Option<String>,
    /// Price in won, digits only.
    pub price: Option<i64>,
}

impl BookRecord {
    pub fn new<T: Into<String>>(title: T) -> Self {
        BookRecord {
            title: title.into(),
            author: None,
            publisher: None,
            location: None,
            price: None,
        }
    }
}

/// A record as persisted, with the row id clients use to delete it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBook {
    pub id: i64,
    #[serde(flatten)]
    pub record: BookRecord,
}

/// Storage seam for catalog partitions.
///
/// Partitions are keyed by store spot slug and fully isolated from each
/// other. Batch mutations are atomic: a reader sees the partition either
/// before or after a batch, never in between.
pub trait CatalogStore: Send + Sync {
    /// Returns the partition's records in stable insertion order.
    fn books_for_spot(&self, spot: &str) -> Result<Vec<StoredBook>>;

    /// Atomically replaces the partition with the given batch.
    /// Returns the number of records inserted.
    fn replace_books(&self, spot: &str, records: &[BookRecord]) -> Result<usize>;

    /// Atomically appends the given batch to the partition.
    /// Returns the number of records inserted.
    fn append_books(&self, spot: &str, records: &[BookRecord]) -> Result<usize>;

    /// Inserts a single record and returns its id.
    fn insert_book(&self, spot: &str, record: &BookRecord) -> Result<i64>;

    /// Deletes the record with the given id, if it belongs to `spot`.
    /// Returns whether a record was deleted.
    fn delete_book(&self, spot: &str, book_id: i64) -> Result<bool>;

    fn count_for_spot(&self, spot: &str) -> Result<usize>;
}
