//! SQLite-backed admin account and token store.

use super::admin_store::AdminStore;
use super::auth::{AdminAccount, CredentialHasher, SessionToken, TokenValue};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const ADMIN_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS admin_account (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    handle TEXT NOT NULL UNIQUE,
    store_spot TEXT NOT NULL,
    salt TEXT NOT NULL,
    hash TEXT NOT NULL,
    hasher TEXT NOT NULL,
    created INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int))
);

CREATE TABLE IF NOT EXISTS session_token (
    value TEXT PRIMARY KEY,
    account_id INTEGER NOT NULL REFERENCES admin_account (id) ON DELETE CASCADE,
    store_spot TEXT NOT NULL,
    created INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_token_account ON session_token (account_id);
"#;

fn unix_secs(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn from_unix_secs(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

pub struct SqliteAdminStore {
    conn: Mutex<Connection>,
}

impl SqliteAdminStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open admin database {:?}", path))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(ADMIN_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(ADMIN_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<AdminAccount> {
        let hasher_name: String = row.get("hasher")?;
        let hasher = CredentialHasher::from_str(&hasher_name).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                err.into(),
            )
        })?;
        Ok(AdminAccount {
            id: row.get("id")?,
            handle: row.get("handle")?,
            store_spot: row.get("store_spot")?,
            salt: row.get("salt")?,
            hash: row.get("hash")?,
            hasher,
            created: from_unix_secs(row.get("created")?),
        })
    }

    fn row_to_token(row: &rusqlite::Row) -> rusqlite::Result<SessionToken> {
        Ok(SessionToken {
            account_id: row.get("account_id")?,
            store_spot: row.get("store_spot")?,
            value: TokenValue(row.get("value")?),
            created: from_unix_secs(row.get("created")?),
        })
    }
}

impl AdminStore for SqliteAdminStore {
    fn get_account(&self, handle: &str) -> Result<Option<AdminAccount>> {
        let conn = self.conn.lock().unwrap();
        let account = conn
            .query_row(
                "SELECT id, handle, store_spot, salt, hash, hasher, created
                 FROM admin_account WHERE handle = ?1",
                params![handle],
                Self::row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    fn get_account_by_id(&self, id: i64) -> Result<Option<AdminAccount>> {
        let conn = self.conn.lock().unwrap();
        let account = conn
            .query_row(
                "SELECT id, handle, store_spot, salt, hash, hasher, created
                 FROM admin_account WHERE id = ?1",
                params![id],
                Self::row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    fn create_account(
        &self,
        handle: &str,
        store_spot: &str,
        salt: &str,
        hash: &str,
        hasher: CredentialHasher,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO admin_account (handle, store_spot, salt, hash, hasher)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![handle, store_spot, salt, hash, hasher.to_string()],
        )
        .with_context(|| format!("Failed to create account '{}'", handle))?;
        Ok(conn.last_insert_rowid())
    }

    fn update_password(
        &self,
        handle: &str,
        salt: &str,
        hash: &str,
        hasher: CredentialHasher,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE admin_account SET salt = ?2, hash = ?3, hasher = ?4 WHERE handle = ?1",
            params![handle, salt, hash, hasher.to_string()],
        )?;
        if changed == 0 {
            anyhow::bail!("No account with handle '{}'", handle);
        }
        Ok(())
    }

    fn all_handles(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT handle FROM admin_account ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut handles = Vec::new();
        for row in rows {
            handles.push(row?);
        }
        Ok(handles)
    }

    fn add_token(&self, token: &SessionToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO session_token (value, account_id, store_spot, created)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                token.value.0,
                token.account_id,
                token.store_spot,
                unix_secs(token.created),
            ],
        )?;
        Ok(())
    }

    fn get_token(&self, value: &TokenValue) -> Result<Option<SessionToken>> {
        let conn = self.conn.lock().unwrap();
        let token = conn
            .query_row(
                "SELECT value, account_id, store_spot, created
                 FROM session_token WHERE value = ?1",
                params![value.0],
                Self::row_to_token,
            )
            .optional()?;
        Ok(token)
    }

    fn delete_token(&self, value: &TokenValue) -> Result<Option<SessionToken>> {
        let conn = self.conn.lock().unwrap();
        let token = conn
            .query_row(
                "SELECT value, account_id, store_spot, created
                 FROM session_token WHERE value = ?1",
                params![value.0],
                Self::row_to_token,
            )
            .optional()?;
        if token.is_some() {
            conn.execute(
                "DELETE FROM session_token WHERE value = ?1",
                params![value.0],
            )?;
        }
        Ok(token)
    }

    fn prune_expired_tokens(&self, ttl: Duration) -> Result<usize> {
        let cutoff = unix_secs(SystemTime::now()) - ttl.as_secs() as i64;
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM session_token WHERE created < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }
}
