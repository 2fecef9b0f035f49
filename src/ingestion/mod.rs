//! Bulk catalog ingestion from uploaded spreadsheets.

pub mod decoder;

use crate::catalog::{BookRecord, CatalogStore};
use crate::registry::StoreRegistry;
use crate::user::Session;
use decoder::SheetRow;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unknown store spot '{0}'")]
    UnknownStoreSpot(String),

    /// The session is valid but bound to a different store spot.
    #[error("not authorized for this store spot")]
    Forbidden,

    #[error("malformed upload: {0}")]
    MalformedFile(String),

    #[error("upload took too long to decode")]
    Timeout,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// How a decoded batch is applied to the existing partition.
///
/// Append is the default: duplicate shelf entries are legitimate, and a
/// store that wants a clean slate uploads with Replace instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IngestMode {
    Append,
    Replace,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestReport {
    /// Data rows found in the file, header excluded.
    pub total_rows: usize,
    /// Records actually written to the catalog.
    pub inserted: usize,
    /// Rows dropped for a blank title.
    pub skipped: usize,
}

pub struct IngestionPipeline {
    registry: Arc<StoreRegistry>,
    catalog: Arc<dyn CatalogStore>,
    mode: IngestMode,
    decode_timeout: Duration,
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<StoreRegistry>,
        catalog: Arc<dyn CatalogStore>,
        mode: IngestMode,
        decode_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            catalog,
            mode,
            decode_timeout,
        }
    }

    /// Parses `bytes` into book records and applies them to `spot`'s
    /// partition as one atomic batch. On any failure the partition is
    /// left exactly as it was.
    pub async fn ingest(
        &self,
        spot: &str,
        bytes: Vec<u8>,
        session: &Session,
    ) -> Result<IngestReport, IngestError> {
        if !self.registry.is_valid(spot) {
            return Err(IngestError::UnknownStoreSpot(spot.to_owned()));
        }
        // The claimed spot comes from the request, never from the token,
        // and the two must agree.
        if session.store_spot != spot {
            warn!(
                "Admin '{}' (spot '{}') tried to upload into '{}'",
                session.handle, session.store_spot, spot
            );
            return Err(IngestError::Forbidden);
        }

        // Decoding happens before any store lock is taken, off the
        // async runtime, and bounded in time. A timed-out decode keeps
        // running on the blocking pool until it finishes; nothing
        // observes its result and no store write can come from it.
        let decode_task = tokio::task::spawn_blocking(move || decoder::decode_sheet(&bytes));
        let rows = match tokio::time::timeout(self.decode_timeout, decode_task).await {
            Err(_) => return Err(IngestError::Timeout),
            Ok(Err(join_err)) => {
                return Err(IngestError::Storage(anyhow::anyhow!(
                    "Decode task failed: {}",
                    join_err
                )))
            }
            Ok(Ok(Err(decode_err))) => return Err(IngestError::MalformedFile(decode_err.0)),
            Ok(Ok(Ok(rows))) => rows,
        };

        let total_rows = rows.len();
        let records: Vec<BookRecord> = rows.into_iter().filter_map(row_to_record).collect();
        let skipped = total_rows - records.len();

        if records.is_empty() {
            return Err(IngestError::MalformedFile(
                "The file contains no usable rows".to_owned(),
            ));
        }

        let inserted = self.apply_batch(spot, &records)?;
        info!(
            "Ingested {} records into '{}' ({} rows, {} skipped, mode {:?})",
            inserted, spot, total_rows, skipped, self.mode
        );
        Ok(IngestReport {
            total_rows,
            inserted,
            skipped,
        })
    }

    /// Applies the batch, retrying once on a storage failure. The store
    /// is transactional, so a failed first attempt left nothing behind.
    fn apply_batch(&self, spot: &str, records: &[BookRecord]) -> Result<usize, IngestError> {
        let apply = || match self.mode {
            IngestMode::Append => self.catalog.append_books(spot, records),
            IngestMode::Replace => self.catalog.replace_books(spot, records),
        };
        match apply() {
            Ok(inserted) => Ok(inserted),
            Err(first_err) => {
                warn!("Batch apply for '{}' failed, retrying once: {}", spot, first_err);
                apply().map_err(IngestError::Storage)
            }
        }
    }
}

fn row_to_record(row: SheetRow) -> Option<BookRecord> {
    if row.title.trim().is_empty() {
        return None;
    }
    Some(BookRecord {
        title: row.title.trim().to_owned(),
        author: row.author,
        publisher: row.publisher,
        location: row.location,
        price: row.price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SqliteCatalogStore, StoredBook};
    use anyhow::Result;

    fn session_for(spot: &str) -> Session {
        Session {
            account_id: 1,
            handle: format!("admin_{}", spot),
            store_spot: spot.to_owned(),
            token: "token".to_owned(),
        }
    }

    fn pipeline(mode: IngestMode) -> (IngestionPipeline, Arc<SqliteCatalogStore>) {
        let catalog = Arc::new(SqliteCatalogStore::in_memory().unwrap());
        let pipeline = IngestionPipeline::new(
            Arc::new(StoreRegistry::with_defaults()),
            catalog.clone(),
            mode,
            Duration::from_secs(5),
        );
        (pipeline, catalog)
    }

    #[tokio::test]
    async fn blank_title_rows_are_skipped_not_fatal() {
        let (pipeline, catalog) = pipeline(IngestMode::Append);
        let csv = b"title,publisher,location\nBook A,Pub1,B2\n,Pub2,B3\nBook C,,B4\n".to_vec();

        let report = pipeline.ingest("sch", csv, &session_for("sch")).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                total_rows: 3,
                inserted: 2,
                skipped: 1
            }
        );
        assert_eq!(catalog.count_for_spot("sch").unwrap(), 2);
    }

    #[tokio::test]
    async fn cross_spot_upload_is_forbidden() {
        let (pipeline, catalog) = pipeline(IngestMode::Append);
        let csv = b"title\nBook A\n".to_vec();

        let outcome = pipeline.ingest("sunmoon", csv, &session_for("sch")).await;
        assert!(matches!(outcome, Err(IngestError::Forbidden)));
        assert_eq!(catalog.count_for_spot("sunmoon").unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_spot_is_rejected_before_authorization() {
        let (pipeline, _) = pipeline(IngestMode::Append);
        let outcome = pipeline
            .ingest("other", b"title\nBook A\n".to_vec(), &session_for("other"))
            .await;
        assert!(matches!(outcome, Err(IngestError::UnknownStoreSpot(_))));
    }

    #[tokio::test]
    async fn all_blank_rows_leave_the_catalog_untouched() {
        let (pipeline, catalog) = pipeline(IngestMode::Append);
        catalog
            .append_books("sch", &[BookRecord::new("Existing")])
            .unwrap();

        let csv = b"title,publisher\n,Pub1\n   ,Pub2\n".to_vec();
        let outcome = pipeline.ingest("sch", csv, &session_for("sch")).await;
        assert!(matches!(outcome, Err(IngestError::MalformedFile(_))));
        assert_eq!(catalog.count_for_spot("sch").unwrap(), 1);
    }

    #[tokio::test]
    async fn garbage_bytes_are_malformed() {
        let (pipeline, catalog) = pipeline(IngestMode::Append);
        let outcome = pipeline
            .ingest("sch", vec![0xff, 0xfe, 0x00], &session_for("sch"))
            .await;
        assert!(matches!(outcome, Err(IngestError::MalformedFile(_))));
        assert_eq!(catalog.count_for_spot("sch").unwrap(), 0);
    }

    #[tokio::test]
    async fn replace_mode_swaps_the_partition() {
        let (pipeline, catalog) = pipeline(IngestMode::Replace);
        catalog
            .append_books("sch", &[BookRecord::new("Old Book")])
            .unwrap();

        let csv = b"title\nNew Book\n".to_vec();
        let report = pipeline.ingest("sch", csv, &session_for("sch")).await.unwrap();
        assert_eq!(report.inserted, 1);

        let books = catalog.books_for_spot("sch").unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].record.title, "New Book");
    }

    #[tokio::test]
    async fn append_mode_keeps_existing_records() {
        let (pipeline, catalog) = pipeline(IngestMode::Append);
        catalog
            .append_books("sch", &[BookRecord::new("Old Book")])
            .unwrap();

        let csv = b"title\nNew Book\n".to_vec();
        pipeline.ingest("sch", csv, &session_for("sch")).await.unwrap();
        assert_eq!(catalog.count_for_spot("sch").unwrap(), 2);
    }

    #[tokio::test]
    async fn slow_decode_times_out_and_writes_nothing() {
        let catalog = Arc::new(SqliteCatalogStore::in_memory().unwrap());
        let pipeline = IngestionPipeline::new(
            Arc::new(StoreRegistry::with_defaults()),
            catalog.clone(),
            IngestMode::Append,
            Duration::ZERO,
        );

        let mut csv = b"title\n".to_vec();
        for i in 0..5_000 {
            csv.extend_from_slice(format!("Book {}\n", i).as_bytes());
        }

        let outcome = pipeline.ingest("sch", csv, &session_for("sch")).await;
        assert!(matches!(outcome, Err(IngestError::Timeout)));
        assert_eq!(catalog.count_for_spot("sch").unwrap(), 0);
    }

    /// Store that fails every mutation, to check nothing sticks and the
    /// one-retry policy is honored.
    struct FailingStore {
        attempts: std::sync::Mutex<usize>,
    }

    impl CatalogStore for FailingStore {
        fn books_for_spot(&self, _spot: &str) -> Result<Vec<StoredBook>> {
            Ok(vec![])
        }

        fn replace_books(&self, _spot: &str, _records: &[BookRecord]) -> Result<usize> {
            *self.attempts.lock().unwrap() += 1;
            anyhow::bail!("disk on fire")
        }

        fn append_books(&self, _spot: &str, _records: &[BookRecord]) -> Result<usize> {
            *self.attempts.lock().unwrap() += 1;
            anyhow::bail!("disk on fire")
        }

        fn insert_book(&self, _spot: &str, _record: &BookRecord) -> Result<i64> {
            anyhow::bail!("disk on fire")
        }

        fn delete_book(&self, _spot: &str, _book_id: i64) -> Result<bool> {
            anyhow::bail!("disk on fire")
        }

        fn count_for_spot(&self, _spot: &str) -> Result<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn storage_failure_is_retried_once_then_surfaced() {
        let store = Arc::new(FailingStore {
            attempts: std::sync::Mutex::new(0),
        });
        let pipeline = IngestionPipeline::new(
            Arc::new(StoreRegistry::with_defaults()),
            store.clone(),
            IngestMode::Append,
            Duration::from_secs(5),
        );

        let outcome = pipeline
            .ingest("sch", b"title\nBook A\n".to_vec(), &session_for("sch"))
            .await;
        assert!(matches!(outcome, Err(IngestError::Storage(_))));
        assert_eq!(*store.attempts.lock().unwrap(), 2);
    }
}
