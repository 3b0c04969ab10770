//! Agriculture declaration intake.
//!
//! A declaration is collected through a multi-step wizard. Each step's data is
//! checked by a server-side schema, persisted incrementally as a draft, and
//! finalized by an explicit submit that unlocks the confirmation receipt.

pub mod domain;
pub mod drafts;
pub(crate) mod fields;
pub mod memory;
pub mod patch;
pub mod repository;
pub mod router;
pub mod service;
pub mod snapshot;
pub mod steps;
pub mod validation;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use domain::{
    ArrivalMethod, ConfirmationSummary, Contact, ContactDetails, ContactId, Declaration,
    DeclarationFields, DeclarationId, ItemSelection, StayDuration, SubmissionAttestation,
    TravelerType, VisitFrequency, NONE_CODE,
};
pub use drafts::{progress_percent, resume_draft, DraftSummary};
pub use fields::{parse_timestamp, FieldError};
pub use memory::{InMemoryContactRepository, InMemoryDeclarationRepository};
pub use patch::DeclarationPatch;
pub use repository::{ContactRepository, DeclarationRepository, NewDeclaration, RepositoryError};
pub use router::{declaration_router, WIZARD_STEP_HEADER};
pub use service::{DeclarationService, DeclarationServiceError};
pub use snapshot::{
    FileSnapshotStore, MemorySnapshotStore, SnapshotError, SnapshotStore, WizardSnapshot,
    SNAPSHOT_KEY, SNAPSHOT_VERSION,
};
pub use steps::{StepLayout, WizardStep};
pub use validation::{validate_contact, validate_role, validate_step, StepSlice, StepValidationError};
pub use wizard::{
    can_proceed, BackendError, DeclarationBackend, DeclarationWizard, WizardError, WizardState,
};
