//! Delta engine.
//!
//! Computes the symmetric difference between a baseline result (or
//! result set) and one or more comparison sets, for single boots,
//! single builds, and whole-job build sets. Results are cached
//! permanently in the store, keyed by a content-addressed hash of the
//! canonicalized request.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use kernscope_store::{Collection, DocumentStore, FindOptions, QuerySpec};
use kernscope_types::{
    DeltaCacheEntry, DeltaPair, DeltaRecord, FleetCompareBlock, FleetSummary, ResultDocument,
    ResultId,
};

use crate::errors::{EngineError, Result};

/// Resource kind a delta request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    Boot,
    Build,
    Job,
}

impl DeltaKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Build => "build",
            Self::Job => "job",
        }
    }
}

/// Baseline or compare-to selector: a direct id, or a composite spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResultId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defconfig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defconfig_full: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_name: Option<String>,
}

impl Selector {
    /// Present fields as (name, value) tuples, sorted by field name.
    ///
    /// This flattening is the canonical form substituted back into the
    /// request before it is hashed, so two requests differing only in
    /// key order share a cache entry.
    #[must_use]
    pub fn canonical_fields(&self) -> Vec<(&'static str, Value)> {
        let mut fields = Vec::new();
        if let Some(v) = &self.architecture {
            fields.push(("architecture", Value::String(v.clone())));
        }
        if let Some(v) = &self.board {
            fields.push(("board", Value::String(v.clone())));
        }
        if let Some(v) = &self.defconfig {
            fields.push(("defconfig", Value::String(v.clone())));
        }
        if let Some(v) = &self.defconfig_full {
            fields.push(("defconfig_full", Value::String(v.clone())));
        }
        if let Some(v) = &self.id {
            fields.push(("id", Value::String(v.as_str().to_string())));
        }
        if let Some(v) = &self.job {
            fields.push(("job", Value::String(v.clone())));
        }
        if let Some(v) = &self.kernel {
            fields.push(("kernel", Value::String(v.clone())));
        }
        if let Some(v) = &self.lab_name {
            fields.push(("lab_name", Value::String(v.clone())));
        }
        fields
    }

    fn query_spec(&self) -> QuerySpec {
        let mut spec = QuerySpec::new();
        if let Some(id) = &self.id {
            return spec.eq("id", id.as_str());
        }
        for (name, value) in self.canonical_fields() {
            spec = spec.eq(name, value);
        }
        spec
    }
}

/// Typed delta request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaRequest {
    pub kind: DeltaKind,
    pub baseline: Selector,
    pub compare_to: Vec<Selector>,
}

impl DeltaRequest {
    /// Content-addressed cache key: SHA-256 over the canonicalized
    /// request (selector fields flattened to sorted tuples).
    #[must_use]
    pub fn cache_key(&self) -> String {
        let canonical = serde_json::json!({
            "kind": self.kind.as_str(),
            "baseline": canonical_value(&self.baseline),
            "compare_to": self.compare_to.iter().map(canonical_value).collect::<Vec<_>>(),
        });
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        let mut hex = String::with_capacity(64);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}

fn canonical_value(selector: &Selector) -> Value {
    Value::Array(
        selector
            .canonical_fields()
            .into_iter()
            .map(|(name, value)| Value::Array(vec![Value::String(name.to_string()), value]))
            .collect(),
    )
}

/// Delta computation over the result store.
pub struct DeltaEngine<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> DeltaEngine<'a> {
    /// Bind the engine to a store handle.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Compute (or return the cached) delta for a request.
    ///
    /// Validation happens before any store access; resolution failures
    /// abort the whole request with nothing persisted. A cache hit is
    /// returned verbatim without recomputation.
    ///
    /// # Errors
    ///
    /// `BadRequest` on invalid selectors or an empty compare list,
    /// `NotFound` when a baseline or compare target does not resolve.
    pub fn compute(&self, request: &DeltaRequest) -> Result<DeltaRecord> {
        validate(request)?;

        let key = request.cache_key();
        if let Some(value) = self
            .store
            .find_one(Collection::Deltas, &QuerySpec::new().eq("key", key.as_str()))?
        {
            let entry: DeltaCacheEntry = serde_json::from_value(value)?;
            tracing::debug!(key = key.as_str(), "delta cache hit");
            return Ok(entry.record);
        }

        let record = match request.kind {
            DeltaKind::Boot => self.pairwise(request, Collection::BootResults)?,
            DeltaKind::Build => self.pairwise(request, Collection::BuildResults)?,
            DeltaKind::Job => self.fleet(request)?,
        };

        let entry = DeltaCacheEntry {
            id: None,
            key: key.clone(),
            record: record.clone(),
        };
        self.store
            .save(Collection::Deltas, &serde_json::to_value(&entry)?)?;
        tracing::info!(key = key.as_str(), kind = request.kind.as_str(), "delta stored");
        Ok(record)
    }

    /// Single-document mode for boots and builds.
    fn pairwise(&self, request: &DeltaRequest, collection: Collection) -> Result<DeltaRecord> {
        let baseline = self.resolve_one(&request.baseline, collection)?;
        let mut compared = Vec::with_capacity(request.compare_to.len());
        for selector in &request.compare_to {
            compared.push(self.resolve_one(selector, collection)?);
        }
        Ok(DeltaRecord::Pairwise {
            baseline: with_artifact_count(baseline),
            compared: compared.into_iter().map(with_artifact_count).collect(),
        })
    }

    /// Whole-job mode: symmetric difference between build sets.
    fn fleet(&self, request: &DeltaRequest) -> Result<DeltaRecord> {
        let (baseline_summary, baseline_docs) = self.resolve_set(&request.baseline)?;
        let mut blocks = Vec::with_capacity(request.compare_to.len());
        for selector in &request.compare_to {
            let (summary, docs) = self.resolve_set(selector)?;
            blocks.push(FleetCompareBlock {
                summary,
                deltas: diff_build_sets(&baseline_docs, &docs),
            });
        }
        Ok(DeltaRecord::Fleet {
            baseline: baseline_summary,
            result: blocks,
        })
    }

    fn resolve_one(&self, selector: &Selector, collection: Collection) -> Result<ResultDocument> {
        let value = self
            .store
            .find_one(collection, &selector.query_spec())?
            .ok_or_else(|| {
                EngineError::not_found(format!("no {collection} document matches {selector:?}"))
            })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Resolve the entire build set for a job selector.
    fn resolve_set(&self, selector: &Selector) -> Result<(FleetSummary, Vec<ResultDocument>)> {
        let (job, kernel) = match &selector.id {
            Some(id) => {
                let seed: ResultDocument = serde_json::from_value(
                    self.store
                        .find_one(
                            Collection::BuildResults,
                            &QuerySpec::new().eq("id", id.as_str()),
                        )?
                        .ok_or_else(|| {
                            EngineError::not_found(format!("no build document '{id}'"))
                        })?,
                )?;
                (seed.job, seed.kernel)
            }
            None => (
                selector.job.clone().unwrap_or_default(),
                selector.kernel.clone().unwrap_or_default(),
            ),
        };

        let values = self.store.find(
            Collection::BuildResults,
            &QuerySpec::new()
                .eq("job", job.as_str())
                .eq("kernel", kernel.as_str()),
            &FindOptions::new().sort_asc("defconfig"),
        )?;
        if values.is_empty() {
            return Err(EngineError::not_found(format!(
                "no builds for job '{job}' kernel '{kernel}'"
            )));
        }

        let mut docs = Vec::with_capacity(values.len());
        for value in values {
            docs.push(serde_json::from_value::<ResultDocument>(value)?);
        }
        let first = &docs[0];
        let summary = FleetSummary {
            job,
            kernel,
            git_branch: first.git_branch.clone(),
            git_commit: first.git_commit.clone(),
            git_describe: first.git_describe.clone(),
            git_url: first.git_url.clone(),
            total_builds: docs.len() as u64,
        };
        Ok((summary, docs))
    }
}

/// Identity tuple matching entries across two build sets.
type Identity = (String, String, String);

fn identity(doc: &ResultDocument) -> Identity {
    (
        doc.defconfig.clone(),
        doc.defconfig_full.clone().unwrap_or_default(),
        doc.architecture.clone(),
    )
}

/// Symmetric difference over identity tuples combined with status.
///
/// Identities present with the same status on both sides are omitted;
/// one-sided identities are emitted with the other slot empty; shared
/// identities with diverging status carry both documents. Iteration is
/// ordered, so the output is deterministic and exhaustive.
fn diff_build_sets(baseline: &[ResultDocument], compared: &[ResultDocument]) -> Vec<DeltaPair> {
    let base_map = index_by_identity(baseline);
    let comp_map = index_by_identity(compared);

    let identities: BTreeSet<&Identity> = base_map.keys().chain(comp_map.keys()).collect();

    let mut pairs = Vec::new();
    for id in identities {
        match (base_map.get(id), comp_map.get(id)) {
            (Some(b), Some(c)) if b.status == c.status => {}
            (Some(b), Some(c)) => pairs.push(DeltaPair {
                baseline: Some(strip_shared_fields(b)),
                compared: Some(strip_shared_fields(c)),
            }),
            (Some(b), None) => pairs.push(DeltaPair {
                baseline: Some(strip_shared_fields(b)),
                compared: None,
            }),
            (None, Some(c)) => pairs.push(DeltaPair {
                baseline: None,
                compared: Some(strip_shared_fields(c)),
            }),
            (None, None) => unreachable!("identity drawn from one of the two maps"),
        }
    }
    pairs
}

fn index_by_identity(docs: &[ResultDocument]) -> BTreeMap<Identity, &ResultDocument> {
    let mut map = BTreeMap::new();
    for doc in docs {
        map.entry(identity(doc)).or_insert(doc);
    }
    map
}

/// Drop fields already reported once per compare block.
fn strip_shared_fields(doc: &ResultDocument) -> ResultDocument {
    let mut doc = doc.clone();
    doc.job = String::new();
    doc.kernel = String::new();
    doc.git_branch = None;
    doc.git_commit = None;
    doc.git_describe = None;
    doc.git_url = None;
    doc
}

/// Derived numeric field computed on every pairwise emission.
fn with_artifact_count(mut doc: ResultDocument) -> ResultDocument {
    doc.artifact_count = Some(doc.artifacts.len() as u64);
    doc
}

/// Allowed-field schema check plus mandatory-field check, all errors
/// collected before the request touches the store.
fn validate(request: &DeltaRequest) -> Result<()> {
    let mut errors = Vec::new();

    if request.compare_to.is_empty() {
        errors.push("compare_to must not be empty".to_string());
    }

    check_selector(request.kind, &request.baseline, "baseline", &mut errors);
    for (i, selector) in request.compare_to.iter().enumerate() {
        check_selector(request.kind, selector, &format!("compare_to[{i}]"), &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::bad_request(errors.join("; ")))
    }
}

fn check_selector(kind: DeltaKind, selector: &Selector, context: &str, errors: &mut Vec<String>) {
    let disallowed: &[(&str, bool)] = match kind {
        DeltaKind::Boot => &[],
        DeltaKind::Build => &[
            ("board", selector.board.is_some()),
            ("lab_name", selector.lab_name.is_some()),
        ],
        DeltaKind::Job => &[
            ("architecture", selector.architecture.is_some()),
            ("defconfig", selector.defconfig.is_some()),
            ("defconfig_full", selector.defconfig_full.is_some()),
            ("board", selector.board.is_some()),
            ("lab_name", selector.lab_name.is_some()),
        ],
    };
    for (field, present) in disallowed {
        if *present {
            errors.push(format!(
                "{context}: field '{field}' is not allowed for {} deltas",
                kind.as_str()
            ));
        }
    }

    if selector.id.is_some() {
        return;
    }
    let mandatory: &[(&str, bool)] = match kind {
        DeltaKind::Boot | DeltaKind::Build => &[
            ("job", selector.job.is_none()),
            ("kernel", selector.kernel.is_none()),
            ("architecture", selector.architecture.is_none()),
            ("defconfig_full", selector.defconfig_full.is_none()),
        ],
        DeltaKind::Job => &[
            ("job", selector.job.is_none()),
            ("kernel", selector.kernel.is_none()),
        ],
    };
    for (field, missing) in mandatory {
        if *missing {
            errors.push(format!(
                "{context}: missing mandatory field '{field}' (or provide 'id')"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kernscope_types::ResultStatus;

    fn build(job: &str, defconfig: &str, status: ResultStatus) -> ResultDocument {
        ResultDocument {
            id: Some(ResultId::new(format!("{job}-{defconfig}"))),
            job: job.into(),
            kernel: format!("{job}-v1"),
            lab_name: String::new(),
            architecture: "arm".into(),
            board: String::new(),
            board_instance: None,
            defconfig: defconfig.into(),
            defconfig_full: Some(defconfig.into()),
            compiler_version: Some("gcc-13".into()),
            git_branch: Some("master".into()),
            git_commit: Some("abc".into()),
            git_describe: None,
            git_url: None,
            status,
            created_on: Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
            artifacts: vec!["config".into()],
            artifact_count: None,
        }
    }

    #[test]
    fn cache_key_is_stable_and_order_insensitive() {
        let a: Selector = serde_json::from_str(
            r#"{"job": "mainline", "kernel": "v6.9", "architecture": "arm", "defconfig_full": "defconfig"}"#,
        )
        .unwrap();
        let b: Selector = serde_json::from_str(
            r#"{"defconfig_full": "defconfig", "architecture": "arm", "kernel": "v6.9", "job": "mainline"}"#,
        )
        .unwrap();

        let req_a = DeltaRequest {
            kind: DeltaKind::Build,
            baseline: a.clone(),
            compare_to: vec![b.clone()],
        };
        let req_b = DeltaRequest {
            kind: DeltaKind::Build,
            baseline: b,
            compare_to: vec![a],
        };
        assert_eq!(req_a.cache_key(), req_b.cache_key());
        assert_eq!(req_a.cache_key().len(), 64);
    }

    #[test]
    fn cache_key_differs_across_kinds() {
        let selector = Selector {
            job: Some("mainline".into()),
            kernel: Some("v6.9".into()),
            ..Selector::default()
        };
        let job = DeltaRequest {
            kind: DeltaKind::Job,
            baseline: selector.clone(),
            compare_to: vec![selector.clone()],
        };
        let build = DeltaRequest {
            kind: DeltaKind::Build,
            baseline: selector.clone(),
            compare_to: vec![selector],
        };
        assert_ne!(job.cache_key(), build.cache_key());
    }

    #[test]
    fn empty_compare_list_is_rejected() {
        let request = DeltaRequest {
            kind: DeltaKind::Job,
            baseline: Selector {
                job: Some("mainline".into()),
                kernel: Some("v6.9".into()),
                ..Selector::default()
            },
            compare_to: vec![],
        };
        let err = validate(&request).unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
        assert!(err.to_string().contains("compare_to"));
    }

    #[test]
    fn job_selectors_reject_pairwise_fields() {
        let request = DeltaRequest {
            kind: DeltaKind::Job,
            baseline: Selector {
                job: Some("mainline".into()),
                kernel: Some("v6.9".into()),
                ..Selector::default()
            },
            compare_to: vec![Selector {
                job: Some("next".into()),
                kernel: Some("next-0310".into()),
                board: Some("qemu".into()),
                ..Selector::default()
            }],
        };
        let err = validate(&request).unwrap_err();
        assert!(err.to_string().contains("board"));
        assert!(err.to_string().contains("compare_to[0]"));
    }

    #[test]
    fn composite_selector_requires_mandatory_fields() {
        let request = DeltaRequest {
            kind: DeltaKind::Boot,
            baseline: Selector {
                job: Some("mainline".into()),
                ..Selector::default()
            },
            compare_to: vec![Selector {
                id: Some(ResultId::new("boot-2")),
                ..Selector::default()
            }],
        };
        let err = validate(&request).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("kernel"));
        assert!(message.contains("architecture"));
        assert!(!message.contains("compare_to[0]"), "id selector is sufficient");
    }

    #[test]
    fn diff_matches_statuses_across_identities() {
        let k1 = vec![
            build("k1", "config-a", ResultStatus::Pass),
            build("k1", "config-b", ResultStatus::Fail),
        ];
        let k2 = vec![
            build("k2", "config-a", ResultStatus::Pass),
            build("k2", "config-b", ResultStatus::Pass),
            build("k2", "config-c", ResultStatus::Pass),
        ];

        let pairs = diff_build_sets(&k1, &k2);
        assert_eq!(pairs.len(), 2);

        let divergent = &pairs[0];
        let b = divergent.baseline.as_ref().unwrap();
        let c = divergent.compared.as_ref().unwrap();
        assert_eq!(b.defconfig, "config-b");
        assert_eq!(b.status, ResultStatus::Fail);
        assert_eq!(c.status, ResultStatus::Pass);

        let one_sided = &pairs[1];
        assert!(one_sided.baseline.is_none());
        assert_eq!(one_sided.compared.as_ref().unwrap().defconfig, "config-c");
    }

    #[test]
    fn diff_strips_shared_fields_from_entries() {
        let k1 = vec![build("k1", "config-b", ResultStatus::Fail)];
        let k2 = vec![build("k2", "config-b", ResultStatus::Pass)];
        let pairs = diff_build_sets(&k1, &k2);
        let entry = pairs[0].baseline.as_ref().unwrap();
        assert!(entry.job.is_empty());
        assert!(entry.kernel.is_empty());
        assert!(entry.git_commit.is_none());
        assert_eq!(entry.defconfig, "config-b");
    }

    #[test]
    fn identical_sets_produce_no_pairs() {
        let k1 = vec![build("k1", "config-a", ResultStatus::Pass)];
        let k2 = vec![build("k2", "config-a", ResultStatus::Pass)];
        assert!(diff_build_sets(&k1, &k2).is_empty());
    }

    #[test]
    fn artifact_count_is_derived_on_emission() {
        let doc = with_artifact_count(build("k1", "config-a", ResultStatus::Pass));
        assert_eq!(doc.artifact_count, Some(1));
    }
}
