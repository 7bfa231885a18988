//! Document store seam.
//!
//! [`DocumentStore`] is the storage contract every engine consumes:
//! generic find/update/save over JSON documents in named collections.
//! [`SqliteDocumentStore`] is the shipped implementation, with an
//! in-memory path for tests.

pub mod error;
pub mod spec;
mod sqlite;
mod store;

pub use error::{Result, StoreError};
pub use spec::{Condition, FindOptions, QuerySpec, SortOrder};
pub use sqlite::SqliteDocumentStore;
pub use store::{Collection, DocumentStore, SaveOutcome};
