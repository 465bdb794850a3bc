//! Entity store: the current, authoritative list of test cases

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::{TestCase, TestCaseContent};

/// Holds the live test cases in insertion order.
///
/// Every id that has ever been held is remembered so that a split can
/// never hand out an id that existed before, even after its entity was
/// removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityStore {
    cases: Vec<TestCase>,
    issued: HashSet<Uuid>,
}

impl EntityStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole store with `records`, each stamped version 1 at `at`
    pub fn seed(&mut self, records: Vec<TestCase>, at: DateTime<Utc>) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.id) {
                return Err(CoreError::InvalidInput(format!(
                    "Duplicate test case id in seed batch: {}",
                    record.id
                )));
            }
        }

        self.cases = records
            .into_iter()
            .map(|mut record| {
                record.version = 1;
                record.timestamp = at;
                record
            })
            .collect();
        self.issued.extend(seen);

        debug!(count = self.cases.len(), "seeded entity store");
        Ok(())
    }

    /// Replaces the content of one entity and bumps its version
    pub fn apply_revision(
        &mut self,
        id: &Uuid,
        content: TestCaseContent,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let case = self
            .cases
            .iter_mut()
            .find(|c| c.id == *id)
            .ok_or_else(|| CoreError::NotFound(format!("Test case not found: {}", id)))?;

        case.content = content;
        case.version += 1;
        case.timestamp = at;

        debug!(%id, version = case.version, "applied revision");
        Ok(())
    }

    /// Atomically removes every entity in `removed` and appends `added`.
    ///
    /// Nothing is changed when any added id is already live after the
    /// removal, was issued before, or appears twice in `added`.
    pub fn apply_split(&mut self, removed: &HashSet<Uuid>, added: Vec<TestCase>) -> CoreResult<()> {
        let mut incoming = HashSet::new();
        for case in &added {
            let live_after_removal = !removed.contains(&case.id) && self.contains(&case.id);
            if live_after_removal || !incoming.insert(case.id) {
                return Err(CoreError::InvalidInput(format!(
                    "Split would duplicate test case id {}",
                    case.id
                )));
            }
            if self.issued.contains(&case.id) {
                return Err(CoreError::InvalidInput(format!(
                    "Split would reuse historical test case id {}",
                    case.id
                )));
            }
        }

        self.cases.retain(|c| !removed.contains(&c.id));
        self.cases.extend(added.into_iter().map(|mut case| {
            case.version = 1;
            case
        }));
        self.issued.extend(incoming);

        debug!(
            removed = removed.len(),
            live = self.cases.len(),
            "applied split"
        );
        Ok(())
    }

    /// Returns an id that has never been held by this store
    pub fn mint_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !self.issued.contains(&id) {
                return id;
            }
        }
    }

    /// Whether `id` was ever held by this store, live or removed
    pub fn was_issued(&self, id: &Uuid) -> bool {
        self.issued.contains(id)
    }

    /// Gets a test case by row id
    pub fn get(&self, id: &Uuid) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.id == *id)
    }

    /// Gets the live test case carrying `test_case_id`
    pub fn find_by_test_case_id(&self, test_case_id: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.test_case_id == test_case_id)
    }

    /// All live test cases in insertion order
    pub fn all(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.cases.iter().any(|c| c.id == *id)
    }

    pub fn ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.cases.iter().map(|c| c.id)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestCaseDraft;

    fn case(test_case_id: &str, description: &str) -> TestCase {
        TestCase::from_draft(
            Uuid::new_v4(),
            TestCaseDraft::new(
                test_case_id,
                "REQ_001",
                TestCaseContent::with_description(description),
            ),
            Utc::now(),
        )
    }

    #[test]
    fn test_seed_stamps_version_one() {
        let mut store = EntityStore::new();
        let mut stale = case("TC-1", "a");
        stale.version = 7;

        let now = Utc::now();
        store.seed(vec![stale, case("TC-2", "b")], now).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.all().iter().all(|c| c.version == 1 && c.timestamp == now));
        assert_eq!(store.all()[0].test_case_id, "TC-1");
    }

    #[test]
    fn test_seed_rejects_duplicate_ids() {
        let mut store = EntityStore::new();
        store.seed(vec![case("TC-0", "keep")], Utc::now()).unwrap();

        let a = case("TC-1", "a");
        let mut b = case("TC-2", "b");
        b.id = a.id;

        let result = store.seed(vec![a, b], Utc::now());
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        assert_eq!(store.all()[0].test_case_id, "TC-0");
    }

    #[test]
    fn test_apply_revision_bumps_version() {
        let mut store = EntityStore::new();
        let c = case("TC-1", "desc-A");
        let id = c.id;
        store.seed(vec![c], Utc::now()).unwrap();

        store
            .apply_revision(&id, TestCaseContent::with_description("desc-B"), Utc::now())
            .unwrap();

        let updated = store.get(&id).unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.content.description, "desc-B");
        assert_eq!(updated.test_case_id, "TC-1");
    }

    #[test]
    fn test_apply_revision_not_found() {
        let mut store = EntityStore::new();
        let result = store.apply_revision(&Uuid::new_v4(), TestCaseContent::default(), Utc::now());
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[test]
    fn test_apply_split_replaces_selected() {
        let mut store = EntityStore::new();
        let a = case("TC-1", "a");
        let b = case("TC-2", "b");
        let keep = case("TC-3", "c");
        let removed: HashSet<Uuid> = [a.id, b.id].into_iter().collect();
        store.seed(vec![a, b, keep.clone()], Utc::now()).unwrap();

        let added = vec![
            case("TC-1_A", "a1"),
            case("TC-1_B", "a2"),
            case("TC-2_A", "b1"),
        ];
        let added_ids: Vec<Uuid> = added.iter().map(|c| c.id).collect();
        store.apply_split(&removed, added).unwrap();

        assert_eq!(store.len(), 4);
        assert!(removed.iter().all(|id| !store.contains(id)));
        assert!(removed.iter().all(|id| store.was_issued(id)));
        assert!(added_ids.iter().all(|id| store.get(id).unwrap().version == 1));
        assert_eq!(store.all()[0].id, keep.id);
    }

    #[test]
    fn test_apply_split_rejects_live_collision() {
        let mut store = EntityStore::new();
        let a = case("TC-1", "a");
        let keep = case("TC-2", "b");
        let removed: HashSet<Uuid> = [a.id].into_iter().collect();
        store.seed(vec![a, keep.clone()], Utc::now()).unwrap();
        let before = store.clone();

        let mut clash = case("TC-9", "x");
        clash.id = keep.id;

        let result = store.apply_split(&removed, vec![case("TC-8", "y"), clash]);
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        assert_eq!(store, before);
    }

    #[test]
    fn test_apply_split_rejects_historical_id() {
        let mut store = EntityStore::new();
        let a = case("TC-1", "a");
        let a_id = a.id;
        store.seed(vec![a], Utc::now()).unwrap();

        let removed: HashSet<Uuid> = [a_id].into_iter().collect();
        let mut reused = case("TC-1_A", "a1");
        reused.id = a_id;

        let result = store.apply_split(&removed, vec![reused]);
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        assert!(store.contains(&a_id));
    }

    #[test]
    fn test_mint_id_is_fresh() {
        let mut store = EntityStore::new();
        let a = case("TC-1", "a");
        store.seed(vec![a], Utc::now()).unwrap();
        let id = store.mint_id();
        assert!(!store.was_issued(&id));
    }
}
