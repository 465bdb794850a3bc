pub mod ai;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod intent;
pub mod ledger;
pub mod models;
pub mod resolver;
pub mod restore;
pub mod selection;
pub mod services;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use ai::{AiClient, AiError, AiMode};
pub use config::{settings_path, AiSettings, ExportSettings, Settings};
pub use error::{CoreError, CoreResult};
pub use export::{export_csv, export_json, export_rows, to_csv, ExportRow, DEFAULT_CSV_NAME};
pub use extract::{ExtractError, RequirementExtractor};
pub use intent::detect_split_intent;
pub use ledger::{InMemoryLedger, LedgerStorage, VersionLedger};
pub use models::{
    ModificationReason, Requirement, TestCase, TestCaseContent, TestCaseDraft, TestabilityType,
    VersionRecord,
};
pub use resolver::{
    ModificationOutcome, ModificationResolver, OutcomePayload, PayloadTarget, Resolution,
};
pub use restore::{RestoreOperator, RestoreReceipt};
pub use selection::{Keyed, SelectionSet};
pub use services::{
    Attachment, ExtractionService, GenerationService, ModificationRequest, ModificationService,
};
pub use session::{Session, SessionSnapshot};
pub use store::EntityStore;
