//! Derived records produced and persisted by the engines.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::LaneKey;
use crate::result::{ResultDocument, ResultId};

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

/// Ordered failure history for one lane, as returned by a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionRecord {
    pub key: LaneKey,
    pub failures: Vec<ResultDocument>,
}

/// Stored regression aggregate for one (job, kernel).
///
/// `hierarchy` is the nested lane index: lab → arch → board →
/// board_instance → defconfig → compiler → failure list. It is only
/// ever read and mutated through the regression engine's typed
/// traversal helpers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionAggregate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResultId>,
    pub job: String,
    pub kernel: String,
    pub hierarchy: Value,
}

impl RegressionAggregate {
    /// Fresh, empty aggregate for a (job, kernel).
    #[must_use]
    pub fn new(job: impl Into<String>, kernel: impl Into<String>) -> Self {
        Self {
            id: None,
            job: job.into(),
            kernel: kernel.into(),
            hierarchy: Value::Object(serde_json::Map::new()),
        }
    }
}

/// Back-reference from one failing result to its owning aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegressionTracker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResultId>,
    pub result_id: ResultId,
    pub regression_id: ResultId,
}

// ---------------------------------------------------------------------------
// Bisection
// ---------------------------------------------------------------------------

/// Which result family a bisection was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BisectKind {
    Boot,
    Build,
}

/// Persisted outcome of one bisection run.
///
/// Upserted keyed by the originating result id (plus `compare_to` in
/// cross-tree mode); never partially written. `good_*` stay unset when
/// history was exhausted without a pass, and always in cross-tree mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BisectRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResultId>,
    pub kind: BisectKind,
    /// Id of the result this bisection originated from.
    pub result_id: ResultId,
    pub job: String,
    pub kernel: String,
    pub arch: String,
    pub defconfig: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defconfig_full: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    /// Other tree scanned in cross-tree comparison mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_commit_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub good_commit_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_commit_date: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_commit_url: Option<String>,
    /// Enriched scan window, ordered bad to good.
    pub bisect_data: Vec<ResultDocument>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub checks: BTreeMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// One symmetric-difference entry: a document on either side, or both
/// when the identity matched but the status differed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<ResultDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compared: Option<ResultDocument>,
}

/// Git metadata and size of one whole-job build set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetSummary {
    pub job: String,
    pub kernel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_describe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    pub total_builds: u64,
}

/// Per-compare delta block in fleet mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetCompareBlock {
    #[serde(flatten)]
    pub summary: FleetSummary,
    pub deltas: Vec<DeltaPair>,
}

/// Computed delta, pairwise (boot/build) or fleet (whole-job) shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeltaRecord {
    Fleet {
        baseline: FleetSummary,
        result: Vec<FleetCompareBlock>,
    },
    Pairwise {
        baseline: ResultDocument,
        compared: Vec<ResultDocument>,
    },
}

/// Stored cache entry: one canonical request maps to at most one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaCacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResultId>,
    /// Content-addressed key: SHA-256 of the canonicalized request.
    pub key: String,
    pub record: DeltaRecord,
}
