//! Test data builders.

use bookspot_server::catalog::{BookRecord, CatalogStore};

/// The upload used by most ingestion tests: three rows, one of which
/// has a blank title and gets skipped.
pub fn csv_with_blank_title_row() -> Vec<u8> {
    b"title,publisher,location\nBook A,Pub1,B2\n,Pub2,B3\nBook C,,B4\n".to_vec()
}

pub fn csv_single_book(title: &str) -> Vec<u8> {
    format!("title,publisher,location\n{},P1,A1\n", title).into_bytes()
}

pub fn csv_without_data_rows() -> Vec<u8> {
    b"title,publisher,location\n".to_vec()
}

/// Seeds a partition directly through the store, bypassing the upload
/// endpoint, for tests that only exercise search.
pub fn seed_catalog(store: &dyn CatalogStore, spot: &str, books: &[(&str, &str, &str)]) {
    let records: Vec<BookRecord> = books
        .iter()
        .map(|(title, publisher, location)| BookRecord {
            publisher: Some((*publisher).to_owned()).filter(|s| !s.is_empty()),
            location: Some((*location).to_owned()).filter(|s| !s.is_empty()),
            ..BookRecord::new(*title)
        })
        .collect();
    store
        .append_books(spot, &records)
        .expect("Failed to seed test catalog");
}
