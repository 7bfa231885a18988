//! Per-lane regression index.
//!
//! Maintains, per composite lane key, the ordered history of
//! consecutive failures inside a (job, kernel) aggregate document. A
//! new PASS resets a lane on the ingestion side; this engine only reads
//! and appends.

use serde_json::Value;

use kernscope_store::{Collection, DocumentStore, QuerySpec};
use kernscope_types::{
    LaneKey, RegressionAggregate, RegressionRecord, RegressionTracker, ResultDocument, ResultId,
    ResultStatus,
};

use crate::common::load_document;
use crate::errors::Result;

/// Regression index over the boot history.
pub struct RegressionIndex<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> RegressionIndex<'a> {
    /// Bind the index to a store handle.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Look up the failure history at `key` inside a nested lane index.
    ///
    /// Traverses one dotted segment at a time; any missing segment
    /// yields an empty sequence — absence of a regression is a normal
    /// state, never an error. Malformed leaf entries are skipped.
    #[must_use]
    pub fn lookup(key: &LaneKey, hierarchy: &Value) -> Vec<ResultDocument> {
        let mut current = hierarchy;
        for segment in key.segments() {
            match current.as_object().and_then(|m| m.get(segment)) {
                Some(next) => current = next,
                None => return Vec::new(),
            }
        }
        current
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Index one failing result.
    ///
    /// Returns `Ok(None)` for a passing result (nothing to index).
    /// Otherwise resolves the owning aggregate through the
    /// boot-to-aggregate tracker, appends the document at its lane key
    /// if not already present by id, and persists both the aggregate
    /// and the tracker.
    ///
    /// # Errors
    ///
    /// `NotFound` when the result does not exist; store or codec errors
    /// are passed through.
    pub fn find(&self, result_id: &ResultId) -> Result<Option<RegressionRecord>> {
        let doc = load_document(self.store, Collection::BootResults, result_id)?;
        if doc.status == ResultStatus::Pass {
            tracing::debug!(result_id = result_id.as_str(), "passing result, nothing to index");
            return Ok(None);
        }

        let tracker = self.load_tracker(result_id)?;
        let mut aggregate = self.resolve_aggregate(tracker.as_ref(), &doc)?;

        let key = LaneKey::from_document(&doc);
        let existing = Self::lookup(&key, &aggregate.hierarchy);
        let already_indexed = existing.iter().any(|entry| entry.same_id(&doc));

        if already_indexed {
            tracing::debug!(
                key = key.as_str(),
                result_id = result_id.as_str(),
                "failure already indexed"
            );
        } else {
            insert_failure(&mut aggregate.hierarchy, &key, &doc)?;
            tracing::info!(
                key = key.as_str(),
                result_id = result_id.as_str(),
                failures = existing.len() + 1,
                "failure appended to lane"
            );
        }

        let failures = Self::lookup(&key, &aggregate.hierarchy);

        let outcome = self
            .store
            .save(Collection::Regressions, &serde_json::to_value(&aggregate)?)?;
        let tracker = RegressionTracker {
            id: tracker.and_then(|t| t.id),
            result_id: result_id.clone(),
            regression_id: outcome.id,
        };
        self.store
            .save(Collection::RegressionTrackers, &serde_json::to_value(&tracker)?)?;

        Ok(Some(RegressionRecord { key, failures }))
    }

    fn load_tracker(&self, result_id: &ResultId) -> Result<Option<RegressionTracker>> {
        let value = self.store.find_one(
            Collection::RegressionTrackers,
            &QuerySpec::new().eq("result_id", result_id.as_str()),
        )?;
        Ok(match value {
            Some(v) => Some(serde_json::from_value(v)?),
            None => None,
        })
    }

    /// Resolve the aggregate owning this lane: through the tracker when
    /// one exists, else by (job, kernel), else a fresh aggregate.
    fn resolve_aggregate(
        &self,
        tracker: Option<&RegressionTracker>,
        doc: &ResultDocument,
    ) -> Result<RegressionAggregate> {
        if let Some(tracker) = tracker {
            let value = self.store.find_one(
                Collection::Regressions,
                &QuerySpec::new().eq("id", tracker.regression_id.as_str()),
            )?;
            if let Some(v) = value {
                return Ok(serde_json::from_value(v)?);
            }
        }

        let value = self.store.find_one(
            Collection::Regressions,
            &QuerySpec::new()
                .eq("job", doc.job.as_str())
                .eq("kernel", doc.kernel.as_str()),
        )?;
        Ok(match value {
            Some(v) => serde_json::from_value(v)?,
            None => RegressionAggregate::new(doc.job.clone(), doc.kernel.clone()),
        })
    }
}

/// Append a failure at the key's path, creating intermediate maps.
fn insert_failure(hierarchy: &mut Value, key: &LaneKey, doc: &ResultDocument) -> Result<()> {
    let mut current = hierarchy;
    let segments: Vec<&str> = key.segments().collect();
    let (last, intermediate) = segments
        .split_last()
        .expect("lane keys always have segments");

    for segment in intermediate {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = current
            .as_object_mut()
            .expect("just ensured object")
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }

    if !current.is_object() {
        *current = Value::Object(serde_json::Map::new());
    }
    let leaf = current
        .as_object_mut()
        .expect("just ensured object")
        .entry((*last).to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !leaf.is_array() {
        *leaf = Value::Array(Vec::new());
    }
    leaf.as_array_mut()
        .expect("just ensured array")
        .push(serde_json::to_value(doc)?);
    Ok(())
}
