use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Testing approach requested from the generation service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TestabilityType {
    #[default]
    Blackbox,
    Graybox,
    Whitebox,
}

impl fmt::Display for TestabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestabilityType::Blackbox => write!(f, "Blackbox"),
            TestabilityType::Graybox => write!(f, "Graybox"),
            TestabilityType::Whitebox => write!(f, "Whitebox"),
        }
    }
}

impl TestabilityType {
    /// All approaches, in menu order
    pub const ALL: [TestabilityType; 3] = [
        TestabilityType::Blackbox,
        TestabilityType::Graybox,
        TestabilityType::Whitebox,
    ];

    /// Parse a testability type from a string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "blackbox" | "black-box" | "black box" => Some(TestabilityType::Blackbox),
            "graybox" | "greybox" | "gray-box" | "grey-box" | "gray box" => {
                Some(TestabilityType::Graybox)
            }
            "whitebox" | "white-box" | "white box" => Some(TestabilityType::Whitebox),
            _ => None,
        }
    }

    /// Lowercase form stored on test cases
    pub fn as_str(&self) -> &'static str {
        match self {
            TestabilityType::Blackbox => "blackbox",
            TestabilityType::Graybox => "graybox",
            TestabilityType::Whitebox => "whitebox",
        }
    }

    /// Short characterization used when prompting the generation service
    pub fn focus(&self) -> &'static str {
        match self {
            TestabilityType::Blackbox => {
                "Focus on input-output behavior without internal structure knowledge"
            }
            TestabilityType::Graybox => {
                "Combine black box testing with some internal structure knowledge"
            }
            TestabilityType::Whitebox => "Focus on internal code structure, paths, and logic",
        }
    }
}

/// A requirement as returned by the extraction service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requirement {
    /// Identifier taken from the source document (e.g. "REQ_001")
    pub id: String,

    /// Requirement text
    pub description: String,

    /// Optional grouping from the source document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Requirement {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            category: None,
        }
    }
}

/// The content fields of a test case.
///
/// The core never interprets these; it only carries them between the
/// entity store, the version ledger and the collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseContent {
    pub description: String,
    pub preconditions: String,
    pub steps: Vec<String>,
    pub expected_result: String,
    pub postconditions: String,
    pub testability_type: String,
}

impl TestCaseContent {
    /// Convenience constructor used mostly by tests and the CLI
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }
}

/// A live test case held by the entity store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Row identity, unique within the store and never reused
    pub id: Uuid,

    /// Human-facing case identifier and ledger grouping key (e.g. "TC_001")
    pub test_case_id: String,

    /// Back-reference to the originating requirement
    pub requirement_id: String,

    #[serde(flatten)]
    pub content: TestCaseContent,

    /// Starts at 1 and grows by exactly 1 per accepted revision or restore
    pub version: u32,

    /// When the last accepted revision happened
    pub timestamp: DateTime<Utc>,
}

impl TestCase {
    /// Creates a version-1 test case from a draft
    pub fn from_draft(id: Uuid, draft: TestCaseDraft, at: DateTime<Utc>) -> Self {
        Self {
            id,
            test_case_id: draft.test_case_id,
            requirement_id: draft.requirement_id,
            content: draft.content,
            version: 1,
            timestamp: at,
        }
    }
}

/// Test case content produced by a collaborator before the core assigns
/// identity and version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseDraft {
    pub test_case_id: String,
    pub requirement_id: String,
    #[serde(flatten)]
    pub content: TestCaseContent,
}

impl TestCaseDraft {
    pub fn new(
        test_case_id: impl Into<String>,
        requirement_id: impl Into<String>,
        content: TestCaseContent,
    ) -> Self {
        Self {
            test_case_id: test_case_id.into(),
            requirement_id: requirement_id.into(),
            content,
        }
    }
}

/// Why a ledger entry was written; serialized as its display string
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(into = "String", try_from = "String")]
pub enum ModificationReason {
    Original,
    Modified,
    Split,
    Restored { from_version: u32 },
}

impl fmt::Display for ModificationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModificationReason::Original => write!(f, "Original test case"),
            ModificationReason::Modified => write!(f, "Modified test case"),
            ModificationReason::Split => write!(f, "Split from original test case"),
            ModificationReason::Restored { from_version } => {
                write!(f, "Restored from version {}", from_version)
            }
        }
    }
}

impl FromStr for ModificationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Original test case" => Ok(ModificationReason::Original),
            "Modified test case" => Ok(ModificationReason::Modified),
            "Split from original test case" => Ok(ModificationReason::Split),
            other => other
                .strip_prefix("Restored from version ")
                .and_then(|n| n.trim().parse().ok())
                .map(|from_version| ModificationReason::Restored { from_version })
                .ok_or_else(|| format!("Unknown modification reason: {}", other)),
        }
    }
}

impl From<ModificationReason> for String {
    fn from(reason: ModificationReason) -> Self {
        reason.to_string()
    }
}

impl TryFrom<String> for ModificationReason {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl ModificationReason {
    /// Whether this reason may open a new ledger group
    pub fn is_initial(&self) -> bool {
        matches!(
            self,
            ModificationReason::Original | ModificationReason::Split
        )
    }
}

/// One immutable entry in a ledger group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub test_case_id: String,
    #[serde(flatten)]
    pub content: TestCaseContent,
    pub modification_reason: ModificationReason,
}
