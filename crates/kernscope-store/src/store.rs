//! Document store trait definition.
//!
//! [`DocumentStore`] defines the storage contract the engines consume:
//! generic find/update/save over JSON documents in named collections.
//! Model types live in `kernscope_types`; documents cross this seam as
//! `serde_json::Value` and are re-typed at the engine edge.

use serde_json::Value;

use kernscope_types::ResultId;

use crate::error;
use crate::spec::{FindOptions, QuerySpec};

/// Named document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    BootResults,
    BuildResults,
    Regressions,
    RegressionTrackers,
    Bisections,
    Deltas,
}

impl Collection {
    /// Storage-level collection name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BootResults => "boot_results",
            Self::BuildResults => "build_results",
            Self::Regressions => "regressions",
            Self::RegressionTrackers => "regression_trackers",
            Self::Bisections => "bisections",
            Self::Deltas => "deltas",
        }
    }

    /// All collections, in storage order.
    #[must_use]
    pub fn all() -> [Self; 6] {
        [
            Self::BootResults,
            Self::BuildResults,
            Self::Regressions,
            Self::RegressionTrackers,
            Self::Bisections,
            Self::Deltas,
        ]
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Collection::all()
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown collection '{s}'"))
    }
}

/// Result of a save: the document id and whether it was newly created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub id: ResultId,
    pub created: bool,
}

/// Storage contract for result documents and derived records.
///
/// Implementations must be `Send + Sync` for use behind
/// `Arc<dyn DocumentStore>`. All writes are whole-document upserts, so
/// concurrent callers can at worst duplicate work, never corrupt a
/// record.
pub trait DocumentStore: Send + Sync {
    /// Return the first document matching `spec`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn find_one(&self, collection: Collection, spec: &QuerySpec)
        -> error::Result<Option<Value>>;

    /// Return all documents matching `spec`, honoring `options`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn find(
        &self,
        collection: Collection,
        spec: &QuerySpec,
        options: &FindOptions,
    ) -> error::Result<Vec<Value>>;

    /// Count documents matching `spec`, ignoring any window options.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn count(&self, collection: Collection, spec: &QuerySpec) -> error::Result<u64>;

    /// Set `patch`'s top-level fields on every matching document.
    /// Returns the number of documents updated.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure.
    fn update(
        &self,
        collection: Collection,
        spec: &QuerySpec,
        patch: &serde_json::Map<String, Value>,
    ) -> error::Result<u64>;

    /// Upsert a whole document by its `id` field. Documents without an
    /// id are assigned a store-generated one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`](crate::StoreError) on storage failure, or
    /// [`StoreError::InvalidDocument`](crate::StoreError::InvalidDocument)
    /// when the body is not a JSON object.
    fn save(&self, collection: Collection, doc: &Value) -> error::Result<SaveOutcome>;
}
