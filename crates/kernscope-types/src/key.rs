//! Lane keys: the composite configuration identity of a test lane.
//!
//! A lane is the (lab, architecture, board, board_instance,
//! defconfig_full, compiler) tuple identifying one continuously tracked
//! configuration across time. The dotted key doubles as a regression
//! index path and as a bisection scan filter.

use serde::{Deserialize, Serialize};

use crate::result::ResultDocument;

/// Sanitize one key segment.
///
/// Lower-cases, strips embedded whitespace, and replaces `.` with `:`
/// so the segment cannot be confused with a path separator. Total and
/// idempotent; `None` yields an empty string.
#[must_use]
pub fn sanitize_key(raw: Option<&str>) -> String {
    raw.map_or_else(String::new, |s| {
        s.to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '.' { ':' } else { c })
            .collect()
    })
}

/// Dotted composite configuration key for one lane.
///
/// Built from lab_name, architecture and board verbatim, plus the
/// sanitized board_instance, defconfig_full and compiler_version.
/// Two documents with identical composite fields always yield the same
/// key, regardless of status, timestamps or ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaneKey(String);

impl LaneKey {
    /// Derive the lane key for a result document.
    #[must_use]
    pub fn from_document(doc: &ResultDocument) -> Self {
        let segments = [
            doc.lab_name.clone(),
            doc.architecture.clone(),
            doc.board.clone(),
            sanitize_key(doc.board_instance.as_deref()),
            sanitize_key(doc.defconfig_full.as_deref()),
            sanitize_key(doc.compiler_version.as_deref()),
        ];
        Self(segments.join("."))
    }

    /// Borrow the dotted key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate the key one dotted segment at a time.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl std::fmt::Display for LaneKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ResultId, ResultStatus};
    use chrono::{TimeZone, Utc};

    fn doc() -> ResultDocument {
        ResultDocument {
            id: Some(ResultId::new("boot-1")),
            job: "mainline".into(),
            kernel: "v6.9".into(),
            lab_name: "lab-alpha".into(),
            architecture: "arm64".into(),
            board: "qemu".into(),
            board_instance: Some("Inst 2".into()),
            defconfig: "defconfig".into(),
            defconfig_full: Some("defconfig+CONFIG_KASAN=y".into()),
            compiler_version: Some("gcc-8.1.0".into()),
            git_branch: None,
            git_commit: None,
            git_describe: None,
            git_url: None,
            status: ResultStatus::Fail,
            created_on: Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap(),
            artifacts: vec![],
            artifact_count: None,
        }
    }

    #[test]
    fn sanitize_lowercases_and_strips_whitespace() {
        assert_eq!(sanitize_key(Some("Defconfig +KASAN")), "defconfig+kasan");
        assert_eq!(sanitize_key(Some(" a b\tc ")), "abc");
    }

    #[test]
    fn sanitize_replaces_dots() {
        assert_eq!(sanitize_key(Some("gcc-8.1.0")), "gcc-8:1:0");
    }

    #[test]
    fn sanitize_none_and_empty_yield_empty() {
        assert_eq!(sanitize_key(None), "");
        assert_eq!(sanitize_key(Some("")), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["GCC-8.1.0", " Mixed Case.x ", "", "already-clean"] {
            let once = sanitize_key(Some(raw));
            let twice = sanitize_key(Some(&once));
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn key_joins_sanitized_segments() {
        let key = LaneKey::from_document(&doc());
        assert_eq!(
            key.as_str(),
            "lab-alpha.arm64.qemu.inst2.defconfig+config_kasan=y.gcc-8:1:0"
        );
        assert_eq!(key.segments().count(), 6);
    }

    #[test]
    fn key_ignores_non_composite_fields() {
        let a = doc();
        let mut b = doc();
        b.id = Some(ResultId::new("boot-999"));
        b.status = ResultStatus::Pass;
        b.kernel = "v6.10".into();
        b.created_on = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(LaneKey::from_document(&a), LaneKey::from_document(&b));
    }

    #[test]
    fn missing_optional_segments_stay_as_empty_slots() {
        let mut d = doc();
        d.board_instance = None;
        d.compiler_version = None;
        let key = LaneKey::from_document(&d);
        assert_eq!(
            key.as_str(),
            "lab-alpha.arm64.qemu..defconfig+config_kasan=y."
        );
        assert_eq!(key.segments().count(), 6);
    }
}
