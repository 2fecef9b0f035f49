//! SQLite-backed catalog store.

use super::{BookRecord, CatalogStore, StoredBook};
use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const CATALOG_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS book (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store_spot TEXT NOT NULL,
    title TEXT NOT NULL,
    author TEXT,
    publisher TEXT,
    location TEXT,
    price INTEGER,
    created INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int))
);

CREATE INDEX IF NOT EXISTS idx_book_store_spot ON book (store_spot);
"#;

pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalog database {:?}", path))?;
        // WAL keeps readers unblocked while a batch commits.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.execute_batch(CATALOG_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CATALOG_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_book(row: &rusqlite::Row) -> rusqlite::Result<StoredBook> {
        Ok(StoredBook {
            id: row.get("id")?,
            record: BookRecord {
                title: row.get("title")?,
                author: row.get("author")?,
                publisher: row.get("publisher")?,
                location: row.get("location")?,
                price: row.get("price")?,
            },
        })
    }

    fn insert_batch(
        tx: &rusqlite::Transaction,
        spot: &str,
        records: &[BookRecord],
    ) -> Result<usize> {
        let mut stmt = tx.prepare(
            "INSERT INTO book (store_spot, title, author, publisher, location, price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for record in records {
            stmt.execute(params![
                spot,
                record.title,
                record.author,
                record.publisher,
                record.location,
                record.price,
            ])?;
        }
        Ok(records.len())
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn books_for_spot(&self, spot: &str) -> Result<Vec<StoredBook>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, author, publisher, location, price
             FROM book WHERE store_spot = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![spot], Self::row_to_book)?;
        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    fn replace_books(&self, spot: &str, records: &[BookRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM book WHERE store_spot = ?1", params![spot])?;
        let inserted = Self::insert_batch(&tx, spot, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn append_books(&self, spot: &str, records: &[BookRecord]) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let inserted = Self::insert_batch(&tx, spot, records)?;
        tx.commit()?;
        Ok(inserted)
    }

    fn insert_book(&self, spot: &str, record: &BookRecord) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO book (store_spot, title, author, publisher, location, price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                spot,
                record.title,
                record.author,
                record.publisher,
                record.location,
                record.price,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn delete_book(&self, spot: &str, book_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        // The spot predicate keeps one store's admin from deleting
        // another store's rows by guessing ids.
        let deleted = conn.execute(
            "DELETE FROM book WHERE id = ?1 AND store_spot = ?2",
            params![book_id, spot],
        )?;
        Ok(deleted > 0)
    }

    fn count_for_spot(&self, spot: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: usize = conn.query_row(
            "SELECT COUNT(*) FROM book WHERE store_spot = ?1",
            params![spot],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
