//! Restore operator: re-activates a historical snapshot as a new revision

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::ledger::VersionLedger;
use crate::models::ModificationReason;
use crate::store::EntityStore;

/// Result of a successful restore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReceipt {
    pub id: Uuid,
    pub test_case_id: String,
    pub restored_from: u32,
    pub new_version: u32,
}

pub struct RestoreOperator<'a> {
    store: &'a mut EntityStore,
    ledger: &'a mut VersionLedger,
}

impl<'a> RestoreOperator<'a> {
    pub fn new(store: &'a mut EntityStore, ledger: &'a mut VersionLedger) -> Self {
        Self { store, ledger }
    }

    /// Makes `target_version` of `test_case_id` the current content.
    ///
    /// The live version always moves forward: restoring version 1 of a
    /// test case at version 3 produces version 4.
    pub fn restore(mut self, test_case_id: &str, target_version: u32) -> CoreResult<RestoreReceipt> {
        let snapshot = self
            .ledger
            .record(test_case_id, target_version)
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "Version {} of {} does not exist",
                    target_version, test_case_id
                ))
            })?
            .content
            .clone();

        let live = self.store.find_by_test_case_id(test_case_id).ok_or_else(|| {
            CoreError::NotFound(format!("{} is no longer a live test case", test_case_id))
        })?;
        if live.version == target_version {
            return Err(CoreError::NoOp(format!(
                "{} is already at version {}",
                test_case_id, target_version
            )));
        }
        let id = live.id;

        let at = Utc::now();
        self.store.apply_revision(&id, snapshot.clone(), at)?;
        let new_version = self.ledger.record_revision(
            test_case_id,
            snapshot,
            at,
            ModificationReason::Restored {
                from_version: target_version,
            },
        )?;

        info!(test_case_id, target_version, new_version, "restored test case");
        Ok(RestoreReceipt {
            id,
            test_case_id: test_case_id.to_string(),
            restored_from: target_version,
            new_version,
        })
    }
}
