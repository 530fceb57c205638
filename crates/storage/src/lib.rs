//! Sqlite-backed persistence.
//!
//! Collections are kept as whole JSON arrays under fixed keys in a small
//! key/value table, rewritten in full on every save.

use std::path::Path;

use anyhow::Context as _;
use catalog_core::{Book, CollectionSink, Loan, Settings};
use rusqlite::{Connection, OptionalExtension as _};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const BOOKS_KEY: &str = "book-catalog-data";
pub const LOANS_KEY: &str = "book-loan-data";

#[derive(Debug)]
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                settings_json TEXT NOT NULL
            );
            INSERT OR IGNORE INTO settings (id, settings_json) VALUES (1, '{}');

            CREATE TABLE IF NOT EXISTS local_items (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            "#,
            )
            .context("migrate schema")?;
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM local_items WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("read item {key}"))?;
        Ok(value)
    }

    pub fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.conn
            .execute(
                r#"
            INSERT INTO local_items (key, value, updated_at) VALUES (?, ?, unixepoch())
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
                (key, value),
            )
            .with_context(|| format!("write item {key}"))?;
        Ok(())
    }

    pub fn load_books(&self) -> Vec<Book> {
        self.load_collection(BOOKS_KEY)
    }

    pub fn load_loans(&self) -> Vec<Loan> {
        self.load_collection(LOANS_KEY)
    }

    /// Never fails: unreadable or malformed data loads as an empty collection.
    fn load_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.get_item(key) {
            Ok(raw) => decode_collection(key, raw.as_deref()),
            Err(err) => {
                tracing::warn!("failed to load {key}: {err:#}");
                Vec::new()
            }
        }
    }

    fn save_collection<T: Serialize>(&self, key: &str, items: &[T]) -> anyhow::Result<()> {
        let json = serde_json::to_string(items).with_context(|| format!("serialize {key}"))?;
        self.set_item(key, &json)?;
        tracing::debug!(key, count = items.len(), "saved collection");
        Ok(())
    }

    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        let settings_json: Option<String> = self
            .conn
            .query_row(
                "SELECT settings_json FROM settings WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let mut settings = match settings_json {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|err| {
                tracing::warn!("ignoring malformed settings: {err}");
                Settings::default()
            }),
            None => Settings::default(),
        };
        settings.normalize();
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();
        let settings_json = serde_json::to_string(&settings)?;

        self.conn.execute(
            "INSERT INTO settings (id, settings_json) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET settings_json = excluded.settings_json",
            [settings_json],
        )?;
        Ok(())
    }
}

impl CollectionSink for Storage {
    fn save_books(&self, books: &[Book]) -> anyhow::Result<()> {
        self.save_collection(BOOKS_KEY, books)
    }

    fn save_loans(&self, loans: &[Loan]) -> anyhow::Result<()> {
        self.save_collection(LOANS_KEY, loans)
    }
}

/// Decodes a stored JSON array record by record. A missing or malformed
/// payload yields an empty list; records that fail to decode are skipped.
pub fn decode_collection<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let records = match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!("failed to parse {key}, starting empty: {err}");
            return Vec::new();
        }
    };

    let total = records.len();
    let items: Vec<T> = records
        .into_iter()
        .enumerate()
        .filter_map(|(idx, record)| match serde_json::from_value(record) {
            Ok(item) => Some(item),
            Err(err) => {
                tracing::warn!("skipping {key} record {idx}: {err}");
                None
            }
        })
        .collect();
    if items.len() != total {
        tracing::warn!(key, kept = items.len(), total, "dropped unreadable records");
    }
    items
}
