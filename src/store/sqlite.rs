use super::{merge_shallow, parse_document, Document, DocumentStore, WriteMode};
use crate::error::{CogitateError, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA_VERSION: i64 = 1;

/// Documents kept as JSON text in a single SQLite table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let db_path = dir.as_ref().join("cogitate.db");
        let conn = Connection::open(&db_path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let mut store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            ",
        )?;
        self.check_schema_version()?;
        Ok(())
    }

    fn check_schema_version(&mut self) -> Result<()> {
        let user_version: i64 = self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?;

        if user_version == 0 {
            let set_stmt = format!("PRAGMA user_version = {SCHEMA_VERSION};");
            self.conn.execute_batch(&set_stmt)?;
        } else if user_version != SCHEMA_VERSION {
            return Err(CogitateError::Config(format!(
                "Store schema version mismatch: expected {}, found {}",
                SCHEMA_VERSION, user_version
            )));
        }

        Ok(())
    }

    fn load_from(conn: &Connection, name: &str) -> Result<Document> {
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE name = ?",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(body.map(|b| parse_document(name, &b)).unwrap_or_default())
    }

    fn save_to(conn: &Connection, name: &str, document: &Document) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO documents (name, body, updated_at) VALUES (?, ?, ?)",
            params![name, serde_json::to_string(document)?, Utc::now().timestamp()],
        )?;
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn load(&self, name: &str) -> Result<Document> {
        Self::load_from(&self.conn, name)
    }

    fn save(&mut self, name: &str, document: Document) -> Result<()> {
        Self::save_to(&self.conn, name, &document)
    }

    fn write(&mut self, name: &str, document: Document, mode: WriteMode) -> Result<()> {
        let tx = self.conn.transaction()?;
        let document = match mode {
            WriteMode::Overwrite => document,
            WriteMode::Merge => {
                let mut current = Self::load_from(&tx, name)?;
                merge_shallow(&mut current, document);
                current
            }
        };
        Self::save_to(&tx, name, &document)?;
        tx.commit()?;
        Ok(())
    }
}
