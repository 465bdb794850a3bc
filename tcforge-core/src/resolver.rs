//! Modification resolver
//!
//! Turns the outcome of an external modification call into either a set of
//! in-place revisions or a split replacement of the selected test cases.
//! Every check runs before the first write, so a rejected outcome leaves
//! the store, the ledger and the selection exactly as they were.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::ledger::VersionLedger;
use crate::models::{ModificationReason, TestCase, TestCaseContent, TestCaseDraft};
use crate::selection::SelectionSet;
use crate::store::EntityStore;

/// What an outcome payload refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PayloadTarget {
    /// Revised content for an existing, selected test case
    Revision(Uuid),
    /// Brand-new content meant to replace the selection
    New,
}

/// One test case produced by the modification service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomePayload {
    pub target: PayloadTarget,
    pub draft: TestCaseDraft,
}

impl OutcomePayload {
    pub fn revision(id: Uuid, draft: TestCaseDraft) -> Self {
        Self {
            target: PayloadTarget::Revision(id),
            draft,
        }
    }

    pub fn new_case(draft: TestCaseDraft) -> Self {
        Self {
            target: PayloadTarget::New,
            draft,
        }
    }
}

/// Fully computed result of a modification call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModificationOutcome {
    pub payloads: Vec<OutcomePayload>,
}

impl ModificationOutcome {
    pub fn new(payloads: Vec<OutcomePayload>) -> Self {
        Self { payloads }
    }
}

/// The transition that was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    InPlace { revised: Vec<Uuid> },
    Split { removed: Vec<Uuid>, created: Vec<Uuid> },
}

/// Applies modification outcomes to the session's components
pub struct ModificationResolver<'a> {
    store: &'a mut EntityStore,
    ledger: &'a mut VersionLedger,
    selection: &'a mut SelectionSet<Uuid>,
}

/// Validated in-place write: row id, ledger key and the new content
struct PlannedRevision {
    id: Uuid,
    test_case_id: String,
    content: TestCaseContent,
}

impl<'a> ModificationResolver<'a> {
    pub fn new(
        store: &'a mut EntityStore,
        ledger: &'a mut VersionLedger,
        selection: &'a mut SelectionSet<Uuid>,
    ) -> Self {
        Self {
            store,
            ledger,
            selection,
        }
    }

    /// Applies `outcome` to the `selected` test cases.
    ///
    /// `split` is decided by the caller from the user's instruction; the
    /// resolver never guesses intent.
    pub fn resolve(
        self,
        selected: &[TestCase],
        outcome: ModificationOutcome,
        split: bool,
    ) -> CoreResult<Resolution> {
        if selected.is_empty() {
            return Err(CoreError::EmptySelection);
        }

        let at = Utc::now();
        if split {
            let (removed, created) = self.plan_split(selected, outcome, at)?;
            self.commit_split(removed, created, at)
        } else {
            let plan = self.plan_in_place(selected, outcome)?;
            self.commit_in_place(plan, at)
        }
    }

    fn plan_in_place(
        &self,
        selected: &[TestCase],
        outcome: ModificationOutcome,
    ) -> CoreResult<Vec<PlannedRevision>> {
        let selected_ids: HashSet<Uuid> = selected.iter().map(|c| c.id).collect();
        let mut seen = HashSet::new();
        let mut plan = Vec::with_capacity(outcome.payloads.len());

        for payload in outcome.payloads {
            let id = match payload.target {
                PayloadTarget::Revision(id) if selected_ids.contains(&id) => id,
                PayloadTarget::Revision(id) => {
                    return Err(CoreError::InvalidInput(format!(
                        "Revision targets {} which is not selected",
                        id
                    )))
                }
                PayloadTarget::New => {
                    return Err(CoreError::InvalidInput(format!(
                        "Outcome contains new test case {}; request a split instead",
                        payload.draft.test_case_id
                    )))
                }
            };
            if !seen.insert(id) {
                return Err(CoreError::InvalidInput(format!(
                    "Outcome revises {} more than once",
                    id
                )));
            }

            let live = self
                .store
                .get(&id)
                .ok_or_else(|| CoreError::NotFound(format!("Test case not found: {}", id)))?;
            let head = self.ledger.latest_version(&live.test_case_id).map_err(|_| {
                CoreError::InvalidState(format!(
                    "Test case {} has no ledger history",
                    live.test_case_id
                ))
            })?;
            if head != live.version {
                return Err(CoreError::InvalidState(format!(
                    "Test case {} is at version {} but its ledger head is {}",
                    live.test_case_id, live.version, head
                )));
            }

            plan.push(PlannedRevision {
                id,
                test_case_id: live.test_case_id.clone(),
                content: payload.draft.content,
            });
        }

        Ok(plan)
    }

    fn commit_in_place(mut self, plan: Vec<PlannedRevision>, at: DateTime<Utc>) -> CoreResult<Resolution> {
        let mut revised = Vec::with_capacity(plan.len());
        for step in plan {
            self.store.apply_revision(&step.id, step.content.clone(), at)?;
            let version = self.ledger.record_revision(
                &step.test_case_id,
                step.content,
                at,
                ModificationReason::Modified,
            )?;
            debug!(test_case_id = %step.test_case_id, version, "modified test case");
            revised.push(step.id);
        }

        info!(count = revised.len(), "applied in-place modification");
        Ok(Resolution::InPlace { revised })
    }

    fn plan_split(
        &self,
        selected: &[TestCase],
        outcome: ModificationOutcome,
        at: DateTime<Utc>,
    ) -> CoreResult<(HashSet<Uuid>, Vec<TestCase>)> {
        if outcome.payloads.is_empty() {
            return Err(CoreError::InvalidInput(
                "Split produced no test cases".to_string(),
            ));
        }

        let mut removed = HashSet::new();
        for case in selected {
            if !self.store.contains(&case.id) {
                return Err(CoreError::NotFound(format!(
                    "Selected test case {} is no longer present",
                    case.test_case_id
                )));
            }
            removed.insert(case.id);
        }

        let mut minted = HashSet::new();
        let mut taken_keys = HashSet::new();
        let mut created = Vec::with_capacity(outcome.payloads.len());

        for (index, payload) in outcome.payloads.into_iter().enumerate() {
            let mut id = self.store.mint_id();
            while !minted.insert(id) {
                id = self.store.mint_id();
            }

            let mut draft = payload.draft;
            let key = unique_group_key(&draft.test_case_id, index, |k| {
                self.ledger.has_group(k) || taken_keys.contains(k)
            });
            if key != draft.test_case_id {
                warn!(
                    requested = %draft.test_case_id,
                    assigned = %key,
                    "split test case id already has history, renamed"
                );
                draft.test_case_id = key.clone();
            }
            taken_keys.insert(key);

            created.push(TestCase::from_draft(id, draft, at));
        }

        Ok((removed, created))
    }

    fn commit_split(
        mut self,
        removed: HashSet<Uuid>,
        created: Vec<TestCase>,
        at: DateTime<Utc>,
    ) -> CoreResult<Resolution> {
        let records: Vec<(String, TestCaseContent)> = created
            .iter()
            .map(|c| (c.test_case_id.clone(), c.content.clone()))
            .collect();
        let created_ids: Vec<Uuid> = created.iter().map(|c| c.id).collect();

        self.store.apply_split(&removed, created)?;
        for (test_case_id, content) in records {
            self.ledger
                .record_initial(&test_case_id, content, at, ModificationReason::Split)?;
        }
        self.selection.remove_all(removed.iter());

        let removed: Vec<Uuid> = removed.into_iter().collect();
        info!(
            removed = removed.len(),
            created = created_ids.len(),
            "applied split"
        );
        Ok(Resolution::Split {
            removed,
            created: created_ids,
        })
    }
}

/// Picks a ledger key for a new lineage.
///
/// Blank keys become `TC_{n:03}`; keys that are already taken get a
/// `-2`, `-3`, ... suffix.
pub(crate) fn unique_group_key<F>(requested: &str, index: usize, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let base = if requested.trim().is_empty() {
        format!("TC_{:03}", index + 1)
    } else {
        requested.trim().to_string()
    };

    if !taken(&base) {
        return base;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        store: EntityStore,
        ledger: VersionLedger,
        selection: SelectionSet<Uuid>,
    }

    impl Fixture {
        fn seeded(keys: &[&str]) -> Self {
            let mut store = EntityStore::new();
            let mut ledger = VersionLedger::new();
            let at = Utc::now();
            let cases: Vec<TestCase> = keys
                .iter()
                .map(|k| {
                    TestCase::from_draft(
                        store.mint_id(),
                        TestCaseDraft::new(*k, "REQ_001", TestCaseContent::with_description(*k)),
                        at,
                    )
                })
                .collect();
            for c in &cases {
                ledger
                    .record_initial(&c.test_case_id, c.content.clone(), at, ModificationReason::Original)
                    .unwrap();
            }
            store.seed(cases, at).unwrap();
            Self {
                store,
                ledger,
                selection: SelectionSet::new(),
            }
        }

        fn case(&self, key: &str) -> TestCase {
            self.store.find_by_test_case_id(key).unwrap().clone()
        }

        fn resolve(
            &mut self,
            selected: &[TestCase],
            outcome: ModificationOutcome,
            split: bool,
        ) -> CoreResult<Resolution> {
            ModificationResolver::new(&mut self.store, &mut self.ledger, &mut self.selection)
                .resolve(selected, outcome, split)
        }
    }

    fn draft(key: &str, description: &str) -> TestCaseDraft {
        TestCaseDraft::new(key, "REQ_001", TestCaseContent::with_description(description))
    }

    #[test]
    fn test_in_place_revises_only_mapped_cases() {
        let mut fx = Fixture::seeded(&["TC-1", "TC-2"]);
        let one = fx.case("TC-1");
        let two = fx.case("TC-2");

        let outcome =
            ModificationOutcome::new(vec![OutcomePayload::revision(one.id, draft("TC-1", "edited"))]);
        let resolution = fx.resolve(&[one.clone(), two.clone()], outcome, false).unwrap();

        assert_eq!(resolution, Resolution::InPlace { revised: vec![one.id] });
        assert_eq!(fx.case("TC-1").version, 2);
        assert_eq!(fx.case("TC-1").content.description, "edited");
        assert_eq!(fx.case("TC-2"), two);
        let head = fx.ledger.latest("TC-1").unwrap();
        assert_eq!(head.modification_reason, ModificationReason::Modified);
        assert_eq!(head.content.description, "edited");
    }

    #[test]
    fn test_in_place_keeps_lineage_fields() {
        let mut fx = Fixture::seeded(&["TC-1"]);
        let one = fx.case("TC-1");

        let mut renamed = draft("TC-RENAMED", "edited");
        renamed.requirement_id = "REQ_999".into();
        let outcome = ModificationOutcome::new(vec![OutcomePayload::revision(one.id, renamed)]);
        fx.resolve(&[one.clone()], outcome, false).unwrap();

        let after = fx.store.get(&one.id).unwrap();
        assert_eq!(after.test_case_id, "TC-1");
        assert_eq!(after.requirement_id, "REQ_001");
    }

    #[test]
    fn test_in_place_rejects_new_payload_without_writing() {
        let mut fx = Fixture::seeded(&["TC-1"]);
        let one = fx.case("TC-1");
        let store_before = fx.store.clone();
        let ledger_before = fx.ledger.clone();

        let outcome = ModificationOutcome::new(vec![
            OutcomePayload::revision(one.id, draft("TC-1", "edited")),
            OutcomePayload::new_case(draft("TC-1_A", "extra")),
        ]);
        let result = fx.resolve(&[one], outcome, false);

        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        assert_eq!(fx.store, store_before);
        assert_eq!(fx.ledger, ledger_before);
    }

    #[test]
    fn test_in_place_rejects_unselected_and_duplicate_targets() {
        let mut fx = Fixture::seeded(&["TC-1", "TC-2"]);
        let one = fx.case("TC-1");
        let two = fx.case("TC-2");

        let unselected =
            ModificationOutcome::new(vec![OutcomePayload::revision(two.id, draft("TC-2", "x"))]);
        assert!(matches!(
            fx.resolve(&[one.clone()], unselected, false),
            Err(CoreError::InvalidInput(_))
        ));

        let twice = ModificationOutcome::new(vec![
            OutcomePayload::revision(one.id, draft("TC-1", "x")),
            OutcomePayload::revision(one.id, draft("TC-1", "y")),
        ]);
        assert!(matches!(
            fx.resolve(&[one], twice, false),
            Err(CoreError::InvalidInput(_))
        ));
        assert_eq!(fx.ledger.latest_version("TC-1").unwrap(), 1);
    }

    #[test]
    fn test_empty_selection() {
        let mut fx = Fixture::seeded(&["TC-1"]);
        let result = fx.resolve(&[], ModificationOutcome::default(), true);
        assert_eq!(result, Err(CoreError::EmptySelection));
    }

    #[test]
    fn test_split_replaces_selection() {
        let mut fx = Fixture::seeded(&["TC-1", "TC-2", "TC-3"]);
        let one = fx.case("TC-1");
        let two = fx.case("TC-2");
        fx.selection.select_all([one.id, two.id]);

        let outcome = ModificationOutcome::new(vec![
            OutcomePayload::new_case(draft("TC-1_A", "a")),
            OutcomePayload::new_case(draft("TC-1_B", "b")),
            OutcomePayload::revision(two.id, draft("TC-2_A", "c")),
        ]);
        let resolution = fx.resolve(&[one.clone(), two.clone()], outcome, true).unwrap();

        let Resolution::Split { removed, created } = resolution else {
            panic!("expected split");
        };
        assert_eq!(removed.len(), 2);
        assert_eq!(created.len(), 3);
        assert_eq!(fx.store.len(), 4);
        assert!(!fx.store.contains(&one.id) && !fx.store.contains(&two.id));
        assert!(fx.selection.is_empty());
        for id in &created {
            let case = fx.store.get(id).unwrap();
            assert_eq!(case.version, 1);
            assert_ne!(*id, one.id);
            assert_ne!(*id, two.id);
            let record = fx.ledger.latest(&case.test_case_id).unwrap();
            assert_eq!(record.modification_reason, ModificationReason::Split);
        }
        // Old lineage stays queryable
        assert_eq!(fx.ledger.history_of("TC-1").count(), 1);
    }

    #[test]
    fn test_split_renames_colliding_keys() {
        let mut fx = Fixture::seeded(&["TC-1"]);
        let one = fx.case("TC-1");

        let outcome = ModificationOutcome::new(vec![
            OutcomePayload::new_case(draft("TC-1", "reused")),
            OutcomePayload::new_case(draft("TC-1", "reused again")),
            OutcomePayload::new_case(draft("", "blank")),
        ]);
        fx.resolve(&[one], outcome, true).unwrap();

        let keys: Vec<&str> = fx.store.all().iter().map(|c| c.test_case_id.as_str()).collect();
        assert_eq!(keys, vec!["TC-1-2", "TC-1-3", "TC_003"]);
        assert_eq!(fx.ledger.history_of("TC-1").count(), 1);
    }

    #[test]
    fn test_split_with_no_payloads_is_rejected() {
        let mut fx = Fixture::seeded(&["TC-1"]);
        let one = fx.case("TC-1");
        let result = fx.resolve(&[one.clone()], ModificationOutcome::default(), true);
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        assert!(fx.store.contains(&one.id));
    }

    #[test]
    fn test_split_with_stale_selection_is_not_found() {
        let mut fx = Fixture::seeded(&["TC-1"]);
        let mut ghost = fx.case("TC-1");
        ghost.id = Uuid::new_v4();
        let before = fx.store.clone();

        let outcome = ModificationOutcome::new(vec![OutcomePayload::new_case(draft("TC-9", "x"))]);
        let result = fx.resolve(&[ghost], outcome, true);
        assert!(matches!(result, Err(CoreError::NotFound(_))));
        assert_eq!(fx.store, before);
    }

    #[test]
    fn test_unique_group_key() {
        let taken = |k: &str| k == "TC-1" || k == "TC-1-2";
        assert_eq!(unique_group_key("TC-7", 0, taken), "TC-7");
        assert_eq!(unique_group_key("TC-1", 0, taken), "TC-1-3");
        assert_eq!(unique_group_key("  ", 4, taken), "TC_005");
    }
}
