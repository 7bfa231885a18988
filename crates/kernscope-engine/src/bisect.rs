//! Bisection engine.
//!
//! Walks one lane's history backward from a failing result to the last
//! known-good result, or collects a bounded comparison window from
//! another tree. The backward scan is self-bounding: it always stops at
//! the first PASS, so worst-case work is proportional to the depth of
//! one lane's failure run.

use chrono::{DateTime, Utc};
use serde_json::Value;

use kernscope_store::{Collection, DocumentStore, FindOptions, QuerySpec};
use kernscope_types::{BisectKind, BisectRecord, ResultDocument, ResultId, ResultStatus};

use crate::common::{load_document, opt_value, time_value};
use crate::errors::{EngineError, Result};

/// A scan entry joined with its commit metadata.
struct Enriched {
    doc: ResultDocument,
    commit_date: DateTime<Utc>,
}

/// Bisection over boot and build history.
pub struct BisectionEngine<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> BisectionEngine<'a> {
    /// Bind the engine to a store handle.
    #[must_use]
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Bisect a failing boot result against its own lane's history.
    ///
    /// The scan is strictly backward in time (every entry predates the
    /// target), newest first, and stops at the first PASS inclusive;
    /// earlier history is never read. The resulting record is an
    /// idempotent upsert keyed by the originating result id.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the target's status is PASS (nothing is
    /// written); `NotFound` when the target does not exist.
    pub fn bisect(&self, result_id: &ResultId) -> Result<BisectRecord> {
        let target = self.load_failing_boot(result_id)?;
        let enriched_target = self.enrich_boot(&target)?;

        let history = self.store.find(
            Collection::BootResults,
            &boot_lane_spec(&target)?,
            &FindOptions::new().sort_desc("created_on"),
        )?;

        let mut record = new_record(BisectKind::Boot, result_id, &target);
        record.board = Some(target.board.clone());
        set_bad_boundary(&mut record, &enriched_target);
        record.bisect_data.push(enriched_target.doc);

        for value in history {
            let doc: ResultDocument = serde_json::from_value(value)?;
            let entry = self.enrich_boot(&doc)?;
            let passed = entry.doc.status == ResultStatus::Pass;
            if passed {
                set_good_boundary(&mut record, &entry);
            }
            record.bisect_data.push(entry.doc);
            if passed {
                tracing::debug!(
                    result_id = result_id.as_str(),
                    depth = record.bisect_data.len(),
                    "backward scan stopped at first pass"
                );
                break;
            }
        }

        self.persist(record)
    }

    /// Bisect a failing build result against its tree's build history.
    ///
    /// Identical backward-scan algorithm applied directly to build
    /// documents: no boot join, commit metadata comes from each build
    /// itself.
    ///
    /// # Errors
    ///
    /// `BadRequest` on a PASS target, `NotFound` on a missing one.
    pub fn bisect_build(&self, result_id: &ResultId) -> Result<BisectRecord> {
        let target = load_document(self.store, Collection::BuildResults, result_id)?;
        if target.status == ResultStatus::Pass {
            return Err(EngineError::bad_request(
                "cannot bisect a passing build result",
            ));
        }

        let history = self.store.find(
            Collection::BuildResults,
            &build_lane_spec(&target)?,
            &FindOptions::new().sort_desc("created_on"),
        )?;

        let mut record = new_record(BisectKind::Build, result_id, &target);
        let enriched_target = Enriched {
            commit_date: target.created_on,
            doc: target,
        };
        set_bad_boundary(&mut record, &enriched_target);
        record.bisect_data.push(enriched_target.doc);

        for value in history {
            let doc: ResultDocument = serde_json::from_value(value)?;
            let entry = Enriched {
                commit_date: doc.created_on,
                doc,
            };
            let passed = entry.doc.status == ResultStatus::Pass;
            if passed {
                set_good_boundary(&mut record, &entry);
            }
            record.bisect_data.push(entry.doc);
            if passed {
                break;
            }
        }

        self.persist(record)
    }

    /// Collect a comparison window from another tree.
    ///
    /// Informational mode: the window is the other job's results for the
    /// same board/defconfig/architecture, bounded below by a previously
    /// stored record when one exists, and strictly before the target in
    /// time. No good boundary is ever computed here.
    ///
    /// # Errors
    ///
    /// `BadRequest` on a PASS target, `NotFound` on a missing one.
    pub fn bisect_compared_to(
        &self,
        result_id: &ResultId,
        other_job: &str,
    ) -> Result<BisectRecord> {
        let target = self.load_failing_boot(result_id)?;
        let enriched_target = self.enrich_boot(&target)?;

        let mut spec = QuerySpec::new()
            .eq("job", other_job)
            .eq("architecture", target.architecture.as_str())
            .eq("board", target.board.as_str())
            .eq("defconfig", target.defconfig.as_str())
            .eq(
                "defconfig_full",
                opt_value(target.defconfig_full.as_deref()),
            )
            .lt("created_on", time_value(&target.created_on)?);
        if let Some(bound) = self.prior_scan_bound(result_id, other_job)? {
            tracing::debug!(
                result_id = result_id.as_str(),
                bound = %bound,
                "bounding cross-tree window from prior record"
            );
            spec = spec.gte("created_on", time_value(&bound)?);
        }

        let window = self.store.find(
            Collection::BootResults,
            &spec,
            &FindOptions::new().sort_desc("created_on"),
        )?;

        let mut record = new_record(BisectKind::Boot, result_id, &target);
        record.board = Some(target.board.clone());
        record.compare_to = Some(other_job.to_string());
        set_bad_boundary(&mut record, &enriched_target);
        for value in window {
            let doc: ResultDocument = serde_json::from_value(value)?;
            record.bisect_data.push(self.enrich_boot(&doc)?.doc);
        }

        self.persist(record)
    }

    fn load_failing_boot(&self, result_id: &ResultId) -> Result<ResultDocument> {
        let target = load_document(self.store, Collection::BootResults, result_id)?;
        if target.status == ResultStatus::Pass {
            return Err(EngineError::bad_request(
                "cannot bisect a passing boot result",
            ));
        }
        Ok(target)
    }

    /// Join a boot document with its build to pick up commit metadata.
    ///
    /// Falls back to the boot's own git fields when no build matches.
    fn enrich_boot(&self, boot: &ResultDocument) -> Result<Enriched> {
        let mut spec = QuerySpec::new()
            .eq("job", boot.job.as_str())
            .eq("kernel", boot.kernel.as_str())
            .eq("defconfig", boot.defconfig.as_str())
            .eq("architecture", boot.architecture.as_str());
        if boot.defconfig_full.is_some() {
            spec = spec.eq(
                "defconfig_full",
                opt_value(boot.defconfig_full.as_deref()),
            );
        }

        let build = self.store.find_one(Collection::BuildResults, &spec)?;
        let mut doc = boot.clone();
        let commit_date = match build {
            Some(value) => {
                let build: ResultDocument = serde_json::from_value(value)?;
                if build.git_branch.is_some() {
                    doc.git_branch = build.git_branch;
                }
                if build.git_commit.is_some() {
                    doc.git_commit = build.git_commit;
                }
                if build.git_describe.is_some() {
                    doc.git_describe = build.git_describe;
                }
                if build.git_url.is_some() {
                    doc.git_url = build.git_url;
                }
                build.created_on
            }
            None => boot.created_on,
        };
        Ok(Enriched { doc, commit_date })
    }

    /// Lower time bound derived from a previously stored record for
    /// this (result id, compared tree) pair, so repeated invocations
    /// don't rescan history. Records are keyed the same way `persist`
    /// keys them; a same-lane record never bounds a cross-tree window.
    fn prior_scan_bound(
        &self,
        result_id: &ResultId,
        other_job: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let prior = self.store.find_one(
            Collection::Bisections,
            &QuerySpec::new()
                .eq("result_id", result_id.as_str())
                .eq("compare_to", other_job),
        )?;
        let Some(value) = prior else {
            return Ok(None);
        };
        let prior: BisectRecord = serde_json::from_value(value)?;
        Ok(prior.good_commit_date.or_else(|| {
            prior
                .bisect_data
                .iter()
                .map(|doc| doc.created_on)
                .min()
        }))
    }

    /// Full-overwrite upsert keyed by (result id, compare_to).
    fn persist(&self, mut record: BisectRecord) -> Result<BisectRecord> {
        let spec = QuerySpec::new()
            .eq("result_id", record.result_id.as_str())
            .eq("compare_to", opt_value(record.compare_to.as_deref()));
        if let Some(existing) = self.store.find_one(Collection::Bisections, &spec)? {
            record.id = existing
                .get("id")
                .and_then(Value::as_str)
                .map(ResultId::new);
        }
        let outcome = self
            .store
            .save(Collection::Bisections, &serde_json::to_value(&record)?)?;
        record.id = Some(outcome.id);
        tracing::info!(
            result_id = record.result_id.as_str(),
            kind = ?record.kind,
            entries = record.bisect_data.len(),
            good = record.good_commit.as_deref().unwrap_or("<none>"),
            "bisection record stored"
        );
        Ok(record)
    }
}

/// Fresh record skeleton for a target document.
fn new_record(kind: BisectKind, result_id: &ResultId, target: &ResultDocument) -> BisectRecord {
    BisectRecord {
        id: None,
        kind,
        result_id: result_id.clone(),
        job: target.job.clone(),
        kernel: target.kernel.clone(),
        arch: target.architecture.clone(),
        defconfig: target.defconfig.clone(),
        defconfig_full: target.defconfig_full.clone(),
        board: None,
        compare_to: None,
        good_commit: None,
        good_commit_date: None,
        good_commit_url: None,
        bad_commit: None,
        bad_commit_date: None,
        bad_commit_url: None,
        bisect_data: Vec::new(),
        checks: std::collections::BTreeMap::new(),
    }
}

fn set_bad_boundary(record: &mut BisectRecord, entry: &Enriched) {
    record.bad_commit = entry.doc.git_commit.clone();
    record.bad_commit_date = Some(entry.commit_date);
    record.bad_commit_url = entry.doc.git_url.clone();
}

fn set_good_boundary(record: &mut BisectRecord, entry: &Enriched) {
    record.good_commit = entry.doc.git_commit.clone();
    record.good_commit_date = Some(entry.commit_date);
    record.good_commit_url = entry.doc.git_url.clone();
}

/// Scan filter for a boot document's own lane, strictly before it.
fn boot_lane_spec(target: &ResultDocument) -> Result<QuerySpec> {
    Ok(QuerySpec::new()
        .eq("lab_name", target.lab_name.as_str())
        .eq("architecture", target.architecture.as_str())
        .eq("board", target.board.as_str())
        .eq("board_instance", opt_value(target.board_instance.as_deref()))
        .eq("defconfig", target.defconfig.as_str())
        .eq(
            "defconfig_full",
            opt_value(target.defconfig_full.as_deref()),
        )
        .eq(
            "compiler_version",
            opt_value(target.compiler_version.as_deref()),
        )
        .lt("created_on", time_value(&target.created_on)?))
}

/// Scan filter for a build document's lane within its own tree.
fn build_lane_spec(target: &ResultDocument) -> Result<QuerySpec> {
    Ok(QuerySpec::new()
        .eq("job", target.job.as_str())
        .eq("architecture", target.architecture.as_str())
        .eq("defconfig", target.defconfig.as_str())
        .eq(
            "defconfig_full",
            opt_value(target.defconfig_full.as_deref()),
        )
        .eq(
            "compiler_version",
            opt_value(target.compiler_version.as_deref()),
        )
        .lt("created_on", time_value(&target.created_on)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use kernscope_store::Condition;

    fn doc() -> ResultDocument {
        ResultDocument {
            id: Some(ResultId::new("boot-1")),
            job: "mainline".into(),
            kernel: "v6.9".into(),
            lab_name: "lab-alpha".into(),
            architecture: "arm64".into(),
            board: "qemu".into(),
            board_instance: None,
            defconfig: "defconfig".into(),
            defconfig_full: Some("defconfig".into()),
            compiler_version: Some("gcc-13".into()),
            git_branch: None,
            git_commit: Some("abc".into()),
            git_describe: None,
            git_url: Some("https://git.example.org".into()),
            status: ResultStatus::Fail,
            created_on: Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
            artifacts: vec![],
            artifact_count: None,
        }
    }

    #[test]
    fn boot_lane_spec_pins_every_composite_field() {
        let spec = boot_lane_spec(&doc()).unwrap();
        let fields: Vec<&str> = spec.conditions().iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(
            fields,
            [
                "lab_name",
                "architecture",
                "board",
                "board_instance",
                "defconfig",
                "defconfig_full",
                "compiler_version",
                "created_on"
            ]
        );
        let (_, last) = spec.conditions().last().unwrap();
        assert!(matches!(last, Condition::Lt(_)), "time bound is strict");
    }

    #[test]
    fn missing_lane_fields_pin_to_null() {
        let mut target = doc();
        target.board_instance = None;
        let spec = boot_lane_spec(&target).unwrap();
        let (_, condition) = spec
            .conditions()
            .iter()
            .find(|(f, _)| f == "board_instance")
            .unwrap();
        assert_eq!(condition, &Condition::Eq(Value::Null));
    }

    #[test]
    fn build_lane_spec_scans_within_the_tree() {
        let spec = build_lane_spec(&doc()).unwrap();
        assert!(spec.conditions().iter().any(|(f, _)| f == "job"));
        assert!(!spec.conditions().iter().any(|(f, _)| f == "board"));
    }

    #[test]
    fn boundaries_copy_commit_metadata() {
        let entry = Enriched {
            doc: doc(),
            commit_date: Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap(),
        };
        let mut record = new_record(BisectKind::Boot, &ResultId::new("boot-1"), &entry.doc);
        set_bad_boundary(&mut record, &entry);
        set_good_boundary(&mut record, &entry);
        assert_eq!(record.bad_commit.as_deref(), Some("abc"));
        assert_eq!(record.good_commit.as_deref(), Some("abc"));
        assert_eq!(
            record.good_commit_date,
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap())
        );
    }
}
