//! `SQLite`-backed implementation of [`DocumentStore`].
//!
//! One `documents` table keyed by (collection, doc_id) with JSON bodies.
//! Filtering and sorting run over deserialized bodies, keeping the query
//! semantics identical across file-backed and in-memory stores. Each
//! query deserializes the whole collection, so per-call cost scales
//! with collection size rather than match count; pushing equality
//! filters into SQL via `json_extract` is the upgrade path if
//! collections grow large. Uses a single `Mutex<Connection>` for
//! thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use serde_json::Value;

use crate::error::{self, StoreError};
use crate::spec::{sort_documents, FindOptions, QuerySpec};
use crate::store::{Collection, DocumentStore, SaveOutcome};

/// Idempotent DDL for the document table and the id sequence.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    doc_id TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (collection, doc_id)
);

CREATE TABLE IF NOT EXISTS doc_seq (
    next INTEGER NOT NULL
);

INSERT INTO doc_seq (next)
SELECT 1 WHERE NOT EXISTS (SELECT 1 FROM doc_seq);
";

/// `SQLite`-backed document storage.
///
/// Create with [`SqliteDocumentStore::open`] for file-backed persistence
/// or [`SqliteDocumentStore::in_memory`] for tests. The handle is meant
/// to be opened once at process start and shared for the process
/// lifetime.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

impl SqliteDocumentStore {
    /// Open or create a document database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory can't be created, or
    /// [`StoreError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sqlite`] if the in-memory database can't be
    /// initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Load every (doc_id, body) pair in a collection, insertion-ordered.
    fn load_collection(
        conn: &Connection,
        collection: Collection,
    ) -> error::Result<Vec<(String, Value)>> {
        let mut stmt = conn.prepare(
            "SELECT doc_id, body FROM documents WHERE collection = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map([collection.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (doc_id, body) = row?;
            docs.push((doc_id, serde_json::from_str(&body)?));
        }
        Ok(docs)
    }

    /// Allocate the next store-generated document id.
    fn next_id(conn: &Connection) -> error::Result<String> {
        let n: i64 = conn.query_row("SELECT next FROM doc_seq", [], |row| row.get(0))?;
        conn.execute("UPDATE doc_seq SET next = next + 1", [])?;
        Ok(format!("doc-{n:08}"))
    }
}

/// Project a document down to the named top-level fields plus `id`.
fn project(doc: Value, fields: &[String]) -> Value {
    let Value::Object(map) = doc else {
        return doc;
    };
    let kept = map
        .into_iter()
        .filter(|(k, _)| k == "id" || fields.iter().any(|f| f == k))
        .collect();
    Value::Object(kept)
}

impl DocumentStore for SqliteDocumentStore {
    fn find_one(
        &self,
        collection: Collection,
        spec: &QuerySpec,
    ) -> error::Result<Option<Value>> {
        let docs = self.find(collection, spec, &FindOptions::new().limit(1))?;
        Ok(docs.into_iter().next())
    }

    fn find(
        &self,
        collection: Collection,
        spec: &QuerySpec,
        options: &FindOptions,
    ) -> error::Result<Vec<Value>> {
        let conn = self.lock_conn()?;
        let mut docs: Vec<Value> = Self::load_collection(&conn, collection)?
            .into_iter()
            .map(|(_, body)| body)
            .filter(|doc| spec.matches(doc))
            .collect();
        drop(conn);

        sort_documents(&mut docs, &options.sort);

        let docs = docs
            .into_iter()
            .skip(options.skip)
            .take(options.limit.unwrap_or(usize::MAX));

        Ok(match &options.fields {
            Some(fields) => docs.map(|doc| project(doc, fields)).collect(),
            None => docs.collect(),
        })
    }

    fn count(&self, collection: Collection, spec: &QuerySpec) -> error::Result<u64> {
        let conn = self.lock_conn()?;
        let matched = Self::load_collection(&conn, collection)?
            .into_iter()
            .filter(|(_, doc)| spec.matches(doc))
            .count();
        Ok(matched as u64)
    }

    fn update(
        &self,
        collection: Collection,
        spec: &QuerySpec,
        patch: &serde_json::Map<String, Value>,
    ) -> error::Result<u64> {
        let conn = self.lock_conn()?;
        let matched: Vec<(String, Value)> = Self::load_collection(&conn, collection)?
            .into_iter()
            .filter(|(_, doc)| spec.matches(doc))
            .collect();

        let mut updated = 0u64;
        for (doc_id, mut doc) in matched {
            let Some(map) = doc.as_object_mut() else {
                return Err(StoreError::InvalidDocument);
            };
            for (field, value) in patch {
                map.insert(field.clone(), value.clone());
            }
            let body = serde_json::to_string(&doc)?;
            conn.execute(
                "UPDATE documents SET body = ?1 WHERE collection = ?2 AND doc_id = ?3",
                rusqlite::params![body, collection.as_str(), doc_id],
            )?;
            updated += 1;
        }
        Ok(updated)
    }

    fn save(&self, collection: Collection, doc: &Value) -> error::Result<SaveOutcome> {
        let conn = self.lock_conn()?;
        let mut doc = doc.clone();
        if !doc.is_object() {
            return Err(StoreError::InvalidDocument);
        }

        let doc_id = match doc.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = Self::next_id(&conn)?;
                doc["id"] = Value::String(id.clone());
                id
            }
        };

        let existed: bool = conn
            .query_row(
                "SELECT 1 FROM documents WHERE collection = ?1 AND doc_id = ?2",
                rusqlite::params![collection.as_str(), doc_id],
                |_| Ok(()),
            )
            .map(|()| true)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(false),
                other => Err(other),
            })?;

        let body = serde_json::to_string(&doc)?;
        conn.execute(
            "INSERT INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3) \
             ON CONFLICT(collection, doc_id) DO UPDATE SET body = excluded.body",
            rusqlite::params![collection.as_str(), doc_id, body],
        )?;

        tracing::debug!(
            collection = collection.as_str(),
            doc_id = doc_id.as_str(),
            created = !existed,
            "document saved"
        );

        Ok(SaveOutcome {
            id: doc_id.into(),
            created: !existed,
        })
    }
}
