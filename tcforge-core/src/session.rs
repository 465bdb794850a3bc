//! Session: single owner of the entity store, version ledger and selections
//!
//! All mutations go through `Session`, one operation at a time. External
//! collaborators are called before any write begins, so a failed or
//! rejected call leaves the session exactly as it was.

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::ledger::VersionLedger;
use crate::models::{
    ModificationReason, Requirement, TestCase, TestCaseDraft, TestabilityType, VersionRecord,
};
use crate::resolver::{unique_group_key, ModificationOutcome, ModificationResolver, Resolution};
use crate::restore::{RestoreOperator, RestoreReceipt};
use crate::selection::SelectionSet;
use crate::services::{
    Attachment, ExtractionService, GenerationService, ModificationRequest, ModificationService,
};
use crate::store::EntityStore;

/// Comparable copy of the mutable test case state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub store: EntityStore,
    pub ledger: VersionLedger,
    pub selection: SelectionSet<Uuid>,
}

#[derive(Debug, Default)]
pub struct Session {
    requirements: Vec<Requirement>,
    requirement_selection: SelectionSet<String>,
    store: EntityStore,
    ledger: VersionLedger,
    selection: SelectionSet<Uuid>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Requirements
    // =========================================================================

    /// Replaces the requirement list and clears the requirement selection
    pub fn load_requirements(&mut self, requirements: Vec<Requirement>) -> CoreResult<()> {
        let mut seen = HashSet::new();
        for req in &requirements {
            if !seen.insert(req.id.as_str()) {
                return Err(CoreError::InvalidInput(format!(
                    "Duplicate requirement id: {}",
                    req.id
                )));
            }
        }

        info!(count = requirements.len(), "loaded requirements");
        self.requirements = requirements;
        self.requirement_selection.clear();
        Ok(())
    }

    /// Runs the extraction service and loads its requirements
    pub fn extract_requirements(
        &mut self,
        service: &dyn ExtractionService,
        document: &Path,
    ) -> CoreResult<usize> {
        let requirements = service.extract(document)?;
        let count = requirements.len();
        self.load_requirements(requirements)?;
        Ok(count)
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn requirement_selection(&self) -> &SelectionSet<String> {
        &self.requirement_selection
    }

    /// Includes or excludes a requirement; unknown ids are ignored
    pub fn toggle_requirement(&mut self, id: &str, included: bool) {
        if self.requirements.iter().any(|r| r.id == id) {
            self.requirement_selection.toggle(id.to_string(), included);
        }
    }

    pub fn select_all_requirements(&mut self) {
        self.requirement_selection
            .select_all(self.requirements.iter().map(|r| r.id.clone()));
    }

    pub fn clear_requirement_selection(&mut self) {
        self.requirement_selection.clear();
    }

    pub fn selected_requirements(&self) -> Vec<&Requirement> {
        self.requirement_selection.materialize(&self.requirements)
    }

    // =========================================================================
    // Generation and seeding
    // =========================================================================

    /// Generates test cases for the selected requirements and seeds the store
    pub fn generate(
        &mut self,
        service: &dyn GenerationService,
        testability: TestabilityType,
        document: Option<&Attachment>,
    ) -> CoreResult<usize> {
        let selected: Vec<Requirement> =
            self.selected_requirements().into_iter().cloned().collect();
        if selected.is_empty() {
            return Err(CoreError::EmptySelection);
        }

        let drafts = service.generate(&selected, testability, document)?;
        if drafts.is_empty() {
            return Err(CoreError::ExternalFailure(
                "Generation returned no test cases".to_string(),
            ));
        }

        let count = drafts.len();
        self.seed(drafts)?;
        Ok(count)
    }

    /// Replaces every test case with a freshly generated batch.
    ///
    /// Each entity gets a new id, version 1 and an "Original test case"
    /// ledger entry. Earlier ledger groups are kept as orphans, and a key
    /// that already has history is renamed with a `-2`, `-3`, ... suffix.
    /// The selection is cleared.
    pub fn seed(&mut self, drafts: Vec<TestCaseDraft>) -> CoreResult<()> {
        let at = Utc::now();
        let mut ledger = self.ledger.clone();
        let mut keys = HashSet::new();
        let mut minted = HashSet::new();
        let mut cases = Vec::with_capacity(drafts.len());

        for (index, mut draft) in drafts.into_iter().enumerate() {
            let key = unique_group_key(&draft.test_case_id, index, |k| {
                keys.contains(k) || ledger.has_group(k)
            });
            if key != draft.test_case_id {
                warn!(requested = %draft.test_case_id, assigned = %key, "renamed test case id in seed batch");
                draft.test_case_id = key.clone();
            }
            keys.insert(key);

            let mut id = self.store.mint_id();
            while !minted.insert(id) {
                id = self.store.mint_id();
            }

            let case = TestCase::from_draft(id, draft, at);
            ledger.record_initial(
                &case.test_case_id,
                case.content.clone(),
                at,
                ModificationReason::Original,
            )?;
            cases.push(case);
        }

        self.store.seed(cases, at)?;
        self.ledger = ledger;
        self.selection.clear();

        info!(count = self.store.len(), "seeded test cases");
        self.debug_verify();
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn test_cases(&self) -> &[TestCase] {
        self.store.all()
    }

    pub fn get(&self, id: &Uuid) -> Option<&TestCase> {
        self.store.get(id)
    }

    pub fn find(&self, test_case_id: &str) -> Option<&TestCase> {
        self.store.find_by_test_case_id(test_case_id)
    }

    pub fn history(&self, test_case_id: &str) -> impl Iterator<Item = &VersionRecord> + '_ {
        self.ledger.history_of(test_case_id)
    }

    pub fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    /// Ledger groups whose entity was split away
    pub fn orphaned_groups(&self) -> Vec<&str> {
        self.ledger
            .group_keys()
            .into_iter()
            .filter(|k| self.store.find_by_test_case_id(k).is_none())
            .collect()
    }

    // =========================================================================
    // Test case selection
    // =========================================================================

    /// Includes or excludes a live test case; unknown ids are ignored
    pub fn toggle(&mut self, id: Uuid, included: bool) {
        if !included || self.store.contains(&id) {
            self.selection.toggle(id, included);
        }
    }

    pub fn select_all(&mut self) {
        self.selection.select_all(self.store.ids());
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &SelectionSet<Uuid> {
        &self.selection
    }

    /// Selected test cases in store order
    pub fn selected(&self) -> Vec<&TestCase> {
        self.selection.materialize(self.store.all())
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Sends the selected test cases to the modification service and
    /// applies the returned outcome.
    pub fn modify_selected(
        &mut self,
        service: &dyn ModificationService,
        instruction: &str,
        split: bool,
        attachments: &[Attachment],
    ) -> CoreResult<Resolution> {
        let selected: Vec<TestCase> = self.selected().into_iter().cloned().collect();
        if selected.is_empty() {
            return Err(CoreError::EmptySelection);
        }
        if instruction.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "Modification instruction is empty".to_string(),
            ));
        }

        debug!(count = selected.len(), split, "requesting modification");
        let outcome = service.modify(&ModificationRequest {
            test_cases: &selected,
            instruction,
            split,
            attachments,
        })?;

        self.apply_outcome(&selected, outcome, split)
    }

    /// Applies an already computed outcome to `selected`
    pub fn apply_outcome(
        &mut self,
        selected: &[TestCase],
        outcome: ModificationOutcome,
        split: bool,
    ) -> CoreResult<Resolution> {
        let resolution =
            ModificationResolver::new(&mut self.store, &mut self.ledger, &mut self.selection)
                .resolve(selected, outcome, split)?;
        self.debug_verify();
        Ok(resolution)
    }

    /// Restores `version` of a live test case as its next version
    pub fn restore(&mut self, test_case_id: &str, version: u32) -> CoreResult<RestoreReceipt> {
        let receipt =
            RestoreOperator::new(&mut self.store, &mut self.ledger).restore(test_case_id, version)?;
        self.debug_verify();
        Ok(receipt)
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// Checks every cross-component invariant, reporting the first violation
    pub fn verify(&self) -> CoreResult<()> {
        let mut ids = HashSet::new();
        let mut keys = HashSet::new();

        for case in self.store.all() {
            if !ids.insert(case.id) {
                return Err(CoreError::InvalidState(format!(
                    "Duplicate live id {}",
                    case.id
                )));
            }
            if !keys.insert(case.test_case_id.as_str()) {
                return Err(CoreError::InvalidState(format!(
                    "Two live test cases share {}",
                    case.test_case_id
                )));
            }

            let head = self.ledger.latest(&case.test_case_id).ok_or_else(|| {
                CoreError::InvalidState(format!("{} has no ledger history", case.test_case_id))
            })?;
            if head.version != case.version || head.content != case.content {
                return Err(CoreError::InvalidState(format!(
                    "{} v{} does not match its ledger head v{}",
                    case.test_case_id, case.version, head.version
                )));
            }
        }

        for key in self.ledger.group_keys() {
            self.ledger.verify_group(key)?;
        }

        if let Some(stray) = self.selection.iter().find(|id| !self.store.contains(id)) {
            return Err(CoreError::InvalidState(format!(
                "Selection holds {} which is not in the store",
                stray
            )));
        }

        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            store: self.store.clone(),
            ledger: self.ledger.clone(),
            selection: self.selection.clone(),
        }
    }

    fn debug_verify(&self) {
        debug_assert!(
            self.verify().is_ok(),
            "session invariant violated: {:?}",
            self.verify()
        );
    }
}
