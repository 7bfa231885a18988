//! Result document model.
//!
//! [`ResultDocument`] is one outcome ingested from a lab: a boot attempt
//! or a build. The engines only read these and embed copies into derived
//! records; ownership stays with the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque store identifier for a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultId(String);

impl ResultId {
    /// Create a new result identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResultId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ResultId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Outcome of a single boot attempt or build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResultStatus {
    Pass,
    Fail,
    Unknown,
    Offline,
    Untried,
    Build,
}

impl ResultStatus {
    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Unknown => "UNKNOWN",
            Self::Offline => "OFFLINE",
            Self::Untried => "UNTRIED",
            Self::Build => "BUILD",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One boot or build outcome as ingested from a lab.
///
/// Boot documents carry `board`/`board_instance`/`lab_name`; build
/// documents usually leave them unset. Git metadata may be absent on
/// boot documents and is joined in from the matching build during
/// bisection enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ResultId>,
    /// Tree name (e.g. `"mainline"`, `"next"`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job: String,
    /// Kernel version under test (e.g. `"v6.9-rc2"`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kernel: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lab_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub board: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_instance: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub defconfig: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defconfig_full: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_describe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    pub status: ResultStatus,
    pub created_on: DateTime<Utc>,
    /// Auxiliary artifact names produced alongside this result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    /// Derived artifact count, filled on delta emission only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_count: Option<u64>,
}

impl ResultDocument {
    /// True when both documents carry the same store id.
    ///
    /// Documents without an id never match anything.
    #[must_use]
    pub fn same_id(&self, other: &Self) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn doc(id: &str, status: ResultStatus) -> ResultDocument {
        ResultDocument {
            id: Some(ResultId::new(id)),
            job: "mainline".into(),
            kernel: "v6.9-rc2".into(),
            lab_name: "lab-alpha".into(),
            architecture: "arm64".into(),
            board: "qemu".into(),
            board_instance: None,
            defconfig: "defconfig".into(),
            defconfig_full: Some("defconfig+CONFIG_KASAN=y".into()),
            compiler_version: Some("gcc-13".into()),
            git_branch: Some("master".into()),
            git_commit: Some("abc123".into()),
            git_describe: Some("v6.9-rc2".into()),
            git_url: Some("https://git.example.org/linux.git".into()),
            status,
            created_on: Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap(),
            artifacts: vec!["config".into(), "System.map".into()],
            artifact_count: None,
        }
    }

    #[test]
    fn status_wire_format_is_uppercase() {
        assert_eq!(ResultStatus::Pass.as_str(), "PASS");
        let json = serde_json::to_string(&ResultStatus::Offline).unwrap();
        assert_eq!(json, "\"OFFLINE\"");
        let back: ResultStatus = serde_json::from_str("\"UNTRIED\"").unwrap();
        assert_eq!(back, ResultStatus::Untried);
    }

    #[test]
    fn result_id_serde_transparent() {
        let id = ResultId::new("boot-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"boot-1\"");
        assert_eq!(id.to_string(), "boot-1");
    }

    #[test]
    fn document_serde_roundtrip() {
        let d = doc("boot-1", ResultStatus::Fail);
        let json = serde_json::to_string(&d).unwrap();
        let back: ResultDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn absent_optionals_are_omitted() {
        let mut d = doc("boot-1", ResultStatus::Pass);
        d.board_instance = None;
        d.artifact_count = None;
        let value = serde_json::to_value(&d).unwrap();
        assert!(value.get("board_instance").is_none());
        assert!(value.get("artifact_count").is_none());
    }

    #[test]
    fn same_id_requires_both_ids() {
        let a = doc("boot-1", ResultStatus::Fail);
        let b = doc("boot-1", ResultStatus::Pass);
        assert!(a.same_id(&b));

        let mut c = doc("boot-2", ResultStatus::Fail);
        assert!(!a.same_id(&c));
        c.id = None;
        assert!(!a.same_id(&c));
    }

    #[test]
    fn minimal_document_parses_with_defaults() {
        let json = r#"{"status": "FAIL", "created_on": "2024-03-10T08:00:00Z"}"#;
        let d: ResultDocument = serde_json::from_str(json).unwrap();
        assert!(d.id.is_none());
        assert!(d.job.is_empty());
        assert!(d.artifacts.is_empty());
        assert_eq!(d.status, ResultStatus::Fail);
    }
}
