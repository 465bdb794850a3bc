//! Version ledger: append-only history of test case snapshots
//!
//! Groups are keyed by the human-facing `test_case_id`, independently of
//! the entity store's row ids. A split therefore leaves the old group in
//! place (queryable, but no longer reachable from a live entity) while the
//! new entities open groups of their own.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::models::{ModificationReason, TestCaseContent, VersionRecord};

/// Backing storage for ledger groups.
///
/// Implementations only store and return records; the append-only and
/// contiguous-version rules are enforced by [`VersionLedger`].
pub trait LedgerStorage: fmt::Debug {
    /// Records of one group in append order (empty when the group is unknown)
    fn entries(&self, key: &str) -> &[VersionRecord];

    /// Appends a record to the group named by `record.test_case_id`
    fn append(&mut self, record: VersionRecord);

    /// Every group key, in a stable order
    fn keys(&self) -> Vec<&str>;
}

/// Session-scoped in-memory storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryLedger {
    groups: BTreeMap<String, Vec<VersionRecord>>,
}

impl LedgerStorage for InMemoryLedger {
    fn entries(&self, key: &str) -> &[VersionRecord] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn append(&mut self, record: VersionRecord) {
        self.groups
            .entry(record.test_case_id.clone())
            .or_default()
            .push(record);
    }

    fn keys(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }
}

/// Append-only ledger over a pluggable storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionLedger<S: LedgerStorage = InMemoryLedger> {
    storage: S,
}

impl VersionLedger<InMemoryLedger> {
    /// Creates an empty in-memory ledger
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: LedgerStorage> VersionLedger<S> {
    /// Wraps an existing storage
    pub fn with_storage(storage: S) -> Self {
        Self { storage }
    }

    /// Opens a group with its version-1 entry.
    ///
    /// Fails with `InvalidState` when the group already has entries and
    /// with `InvalidInput` when `reason` cannot start a lineage.
    pub fn record_initial(
        &mut self,
        test_case_id: &str,
        content: TestCaseContent,
        at: DateTime<Utc>,
        reason: ModificationReason,
    ) -> CoreResult<()> {
        if !reason.is_initial() {
            return Err(CoreError::InvalidInput(format!(
                "'{}' cannot open a ledger group",
                reason
            )));
        }
        if self.has_group(test_case_id) {
            return Err(CoreError::InvalidState(format!(
                "Ledger group {} is already initialized",
                test_case_id
            )));
        }

        self.storage.append(VersionRecord {
            version: 1,
            timestamp: at,
            test_case_id: test_case_id.to_string(),
            content,
            modification_reason: reason,
        });
        Ok(())
    }

    /// Appends the next version of a group and returns its number
    pub fn record_revision(
        &mut self,
        test_case_id: &str,
        content: TestCaseContent,
        at: DateTime<Utc>,
        reason: ModificationReason,
    ) -> CoreResult<u32> {
        if reason.is_initial() {
            return Err(CoreError::InvalidInput(format!(
                "'{}' cannot label version 2 or later",
                reason
            )));
        }
        let latest = self.latest_version(test_case_id).map_err(|_| {
            CoreError::InvalidState(format!(
                "Ledger group {} has no initial record",
                test_case_id
            ))
        })?;

        let version = latest + 1;
        self.storage.append(VersionRecord {
            version,
            timestamp: at,
            test_case_id: test_case_id.to_string(),
            content,
            modification_reason: reason,
        });
        Ok(version)
    }

    /// Records of a group in ascending version order.
    ///
    /// Calling it again yields the same records plus anything appended since.
    pub fn history_of(&self, test_case_id: &str) -> impl Iterator<Item = &VersionRecord> + '_ {
        self.storage.entries(test_case_id).iter()
    }

    /// Highest version in a group
    pub fn latest_version(&self, test_case_id: &str) -> CoreResult<u32> {
        self.latest(test_case_id)
            .map(|r| r.version)
            .ok_or_else(|| CoreError::NotFound(format!("No history for {}", test_case_id)))
    }

    /// Head record of a group
    pub fn latest(&self, test_case_id: &str) -> Option<&VersionRecord> {
        self.storage.entries(test_case_id).last()
    }

    /// A specific version of a group
    pub fn record(&self, test_case_id: &str, version: u32) -> Option<&VersionRecord> {
        self.history_of(test_case_id).find(|r| r.version == version)
    }

    pub fn has_group(&self, test_case_id: &str) -> bool {
        !self.storage.entries(test_case_id).is_empty()
    }

    /// Every group key, live or orphaned
    pub fn group_keys(&self) -> Vec<&str> {
        self.storage.keys()
    }

    /// Checks that one group is numbered 1..=n with no gaps or duplicates
    pub fn verify_group(&self, test_case_id: &str) -> CoreResult<()> {
        for (index, record) in self.history_of(test_case_id).enumerate() {
            let expected = index as u32 + 1;
            if record.version != expected {
                return Err(CoreError::InvalidState(format!(
                    "Ledger group {} has version {} at position {}",
                    test_case_id, record.version, expected
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(description: &str) -> TestCaseContent {
        TestCaseContent::with_description(description)
    }

    #[test]
    fn test_record_initial_then_revisions() {
        let mut ledger = VersionLedger::new();
        ledger
            .record_initial("TC-1", content("a"), Utc::now(), ModificationReason::Original)
            .unwrap();
        let v2 = ledger
            .record_revision("TC-1", content("b"), Utc::now(), ModificationReason::Modified)
            .unwrap();
        let v3 = ledger
            .record_revision(
                "TC-1",
                content("a"),
                Utc::now(),
                ModificationReason::Restored { from_version: 1 },
            )
            .unwrap();

        assert_eq!((v2, v3), (2, 3));
        assert_eq!(ledger.latest_version("TC-1").unwrap(), 3);

        let versions: Vec<u32> = ledger.history_of("TC-1").map(|r| r.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert!(ledger.verify_group("TC-1").is_ok());
    }

    #[test]
    fn test_record_initial_twice_is_invalid_state() {
        let mut ledger = VersionLedger::new();
        ledger
            .record_initial("TC-1", content("a"), Utc::now(), ModificationReason::Original)
            .unwrap();
        let result =
            ledger.record_initial("TC-1", content("b"), Utc::now(), ModificationReason::Split);
        assert!(matches!(result, Err(CoreError::InvalidState(_))));
        assert_eq!(ledger.history_of("TC-1").count(), 1);
    }

    #[test]
    fn test_record_initial_rejects_revision_reason() {
        let mut ledger = VersionLedger::new();
        let result =
            ledger.record_initial("TC-1", content("a"), Utc::now(), ModificationReason::Modified);
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        assert!(!ledger.has_group("TC-1"));
    }

    #[test]
    fn test_record_revision_rejects_initial_reasons() {
        let mut ledger = VersionLedger::new();
        ledger
            .record_initial("TC-1", content("a"), Utc::now(), ModificationReason::Original)
            .unwrap();

        for reason in [ModificationReason::Original, ModificationReason::Split] {
            let result = ledger.record_revision("TC-1", content("b"), Utc::now(), reason);
            assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        }
        assert_eq!(ledger.latest_version("TC-1").unwrap(), 1);
    }

    #[test]
    fn test_record_revision_requires_initial() {
        let mut ledger = VersionLedger::new();
        let result =
            ledger.record_revision("TC-9", content("x"), Utc::now(), ModificationReason::Modified);
        assert!(matches!(result, Err(CoreError::InvalidState(_))));
    }

    #[test]
    fn test_latest_version_not_found() {
        let ledger = VersionLedger::new();
        assert!(matches!(
            ledger.latest_version("missing"),
            Err(CoreError::NotFound(_))
        ));
        assert_eq!(ledger.history_of("missing").count(), 0);
    }

    #[test]
    fn test_history_is_restartable() {
        let mut ledger = VersionLedger::new();
        ledger
            .record_initial("TC-1", content("a"), Utc::now(), ModificationReason::Original)
            .unwrap();

        let first: Vec<VersionRecord> = ledger.history_of("TC-1").cloned().collect();
        ledger
            .record_revision("TC-1", content("b"), Utc::now(), ModificationReason::Modified)
            .unwrap();
        let second: Vec<VersionRecord> = ledger.history_of("TC-1").cloned().collect();

        assert_eq!(second.len(), 2);
        assert_eq!(second[..1], first[..]);
    }

    #[test]
    fn test_groups_are_independent() {
        let mut ledger = VersionLedger::new();
        ledger
            .record_initial("TC-1", content("a"), Utc::now(), ModificationReason::Original)
            .unwrap();
        ledger
            .record_initial("TC-1_A", content("a1"), Utc::now(), ModificationReason::Split)
            .unwrap();

        assert_eq!(ledger.group_keys(), vec!["TC-1", "TC-1_A"]);
        assert_eq!(
            ledger.record("TC-1_A", 1).unwrap().modification_reason,
            ModificationReason::Split
        );
        assert!(ledger.record("TC-1", 2).is_none());
    }
}
