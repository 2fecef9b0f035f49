//! Free-text title search over one store's catalog.

use crate::catalog::{CatalogStore, StoredBook};
use crate::registry::StoreRegistry;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("unknown store spot '{0}'")]
    UnknownStoreSpot(String),

    /// The query is empty after trimming. A client input problem, not a
    /// server fault; callers should prompt the user instead of retrying.
    #[error("empty search query")]
    EmptyQuery,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct SearchEngine {
    registry: Arc<StoreRegistry>,
    catalog: Arc<dyn CatalogStore>,
}

impl SearchEngine {
    pub fn new(registry: Arc<StoreRegistry>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { registry, catalog }
    }

    /// Case-insensitive substring match of `query` against book titles
    /// within `spot` only. Results come back in the catalog's insertion
    /// order; no match is an empty list, not an error.
    pub fn search(&self, spot: &str, query: &str) -> Result<Vec<StoredBook>, SearchError> {
        if !self.registry.is_valid(spot) {
            return Err(SearchError::UnknownStoreSpot(spot.to_owned()));
        }

        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let needle = query.to_lowercase();

        let books = self.catalog.books_for_spot(spot)?;
        Ok(books
            .into_iter()
            .filter(|book| book.record.title.to_lowercase().contains(&needle))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BookRecord, SqliteCatalogStore};

    fn engine_with_books(spot: &str, books: &[BookRecord]) -> SearchEngine {
        let catalog = Arc::new(SqliteCatalogStore::in_memory().unwrap());
        catalog.append_books(spot, books).unwrap();
        SearchEngine::new(Arc::new(StoreRegistry::with_defaults()), catalog)
    }

    fn clean_code() -> BookRecord {
        BookRecord {
            publisher: Some("P1".to_owned()),
            location: Some("A1".to_owned()),
            ..BookRecord::new("Clean Code")
        }
    }

    #[test]
    fn finds_case_insensitive_substring() {
        let engine = engine_with_books("sch", &[clean_code()]);
        let results = engine.search("sch", "clean").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record, clean_code());
    }

    #[test]
    fn no_match_returns_empty_list() {
        let engine = engine_with_books("sch", &[clean_code()]);
        assert!(engine.search("sch", "zzz").unwrap().is_empty());
    }

    #[test]
    fn unknown_spot_is_an_error() {
        let engine = engine_with_books("sch", &[clean_code()]);
        assert!(matches!(
            engine.search("other", "clean"),
            Err(SearchError::UnknownStoreSpot(_))
        ));
    }

    #[test]
    fn blank_query_is_an_error() {
        let engine = engine_with_books("sch", &[clean_code()]);
        assert!(matches!(engine.search("sch", ""), Err(SearchError::EmptyQuery)));
        assert!(matches!(
            engine.search("sch", "   \t "),
            Err(SearchError::EmptyQuery)
        ));
    }

    #[test]
    fn never_leaks_other_partitions() {
        let catalog = Arc::new(SqliteCatalogStore::in_memory().unwrap());
        catalog.append_books("sch", &[clean_code()]).unwrap();
        catalog
            .append_books("sunmoon", &[BookRecord::new("Clean Architecture")])
            .unwrap();
        let engine = SearchEngine::new(Arc::new(StoreRegistry::with_defaults()), catalog);

        let results = engine.search("sunmoon", "clean").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.title, "Clean Architecture");
    }

    #[test]
    fn results_keep_catalog_order() {
        let books = vec![
            BookRecord::new("Rust in Action"),
            BookRecord::new("The Rust Programming Language"),
            BookRecord::new("Programming Rust"),
        ];
        let engine = engine_with_books("sch", &books);
        let titles: Vec<String> = engine
            .search("sch", "rust")
            .unwrap()
            .into_iter()
            .map(|b| b.record.title)
            .collect();
        assert_eq!(
            titles,
            vec![
                "Rust in Action",
                "The Rust Programming Language",
                "Programming Rust"
            ]
        );
    }
}
