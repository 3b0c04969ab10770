use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::domain::{
    ConfirmationSummary, Contact, ContactDetails, ContactId, Declaration, DeclarationFields,
    DeclarationId, SubmissionAttestation,
};
use super::drafts::DraftSummary;
use super::fields::FieldError;
use super::patch::DeclarationPatch;
use super::repository::{ContactRepository, DeclarationRepository, NewDeclaration, RepositoryError};
use super::steps::{StepLayout, WizardStep};
use super::validation::{
    validate_contact, validate_role, validate_step, StepSlice, StepValidationError,
};

/// Service composing the declaration and contact stores with the step schemas.
pub struct DeclarationService<R, C> {
    declarations: Arc<R>,
    contacts: Arc<C>,
    layout: StepLayout,
}

impl<R, C> DeclarationService<R, C>
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    pub fn new(declarations: Arc<R>, contacts: Arc<C>, layout: StepLayout) -> Self {
        Self {
            declarations,
            contacts,
            layout,
        }
    }

    /// Step layout used to resolve numeric step indices.
    pub fn layout(&self) -> StepLayout {
        self.layout
    }

    /// Create a declaration from a partial set of fields, filling defaults for the rest.
    pub fn create(&self, patch: &DeclarationPatch) -> Result<Declaration, DeclarationServiceError> {
        let mut fields = DeclarationFields::default();
        self.merge(patch, &mut fields)?;

        let record = self.declarations.insert(NewDeclaration {
            fields,
            created_at: Utc::now(),
        })?;
        info!(declaration_id = %record.id, "declaration created");
        Ok(record)
    }

    pub fn create_from_json(&self, body: &Value) -> Result<Declaration, DeclarationServiceError> {
        let patch = DeclarationPatch::from_json(body).map_err(DeclarationServiceError::Validation)?;
        self.create(&patch)
    }

    pub fn get(&self, id: DeclarationId) -> Result<Declaration, DeclarationServiceError> {
        self.declarations
            .fetch(id)?
            .ok_or(DeclarationServiceError::NotFound(id))
    }

    /// Shallow-merge `patch` over the stored record.
    ///
    /// The version is bumped only when a field actually changes. When
    /// `expected_version` is supplied it must match the stored version;
    /// without it a write that loses a race is re-applied to the newer record.
    pub fn update(
        &self,
        id: DeclarationId,
        patch: &DeclarationPatch,
        expected_version: Option<u64>,
    ) -> Result<Declaration, DeclarationServiceError> {
        retry_unversioned(id, expected_version, || {
            self.try_update(id, patch, expected_version)
        })
    }

    fn try_update(
        &self,
        id: DeclarationId,
        patch: &DeclarationPatch,
        expected_version: Option<u64>,
    ) -> Result<Declaration, DeclarationServiceError> {
        let mut record = self.get(id)?;
        check_version(&record, expected_version)?;

        if patch.is_empty() {
            return Ok(record);
        }

        let mut fields = record.fields.clone();
        self.merge(patch, &mut fields)?;
        if fields == record.fields {
            debug!(declaration_id = %id, "update left declaration unchanged");
            return Ok(record);
        }

        let read_version = record.version;
        record.fields = fields;
        record.version += 1;
        self.commit(&record, read_version)?;
        info!(declaration_id = %id, version = record.version, "declaration updated");
        Ok(record)
    }

    pub fn update_from_json(
        &self,
        id: DeclarationId,
        body: &Value,
        expected_version: Option<u64>,
    ) -> Result<Declaration, DeclarationServiceError> {
        let patch = DeclarationPatch::from_json(body).map_err(DeclarationServiceError::Validation)?;
        self.update(id, &patch, expected_version)
    }

    /// Validate `data` against step `step` of the configured layout and persist
    /// the normalized slice.
    pub fn save_step(
        &self,
        id: DeclarationId,
        step: i64,
        data: &Value,
        expected_version: Option<u64>,
    ) -> Result<Declaration, DeclarationServiceError> {
        let slice = validate_step(self.layout, step, data)?;
        self.apply_slice(id, &slice, expected_version)
    }

    /// Same as [`Self::save_step`], addressed by step role instead of index.
    pub fn save_step_role(
        &self,
        id: DeclarationId,
        role: WizardStep,
        data: &Value,
    ) -> Result<Declaration, DeclarationServiceError> {
        let slice = validate_role(role, data).map_err(DeclarationServiceError::Validation)?;
        self.apply_slice(id, &slice, None)
    }

    /// The contact step lives in the contact store; the declaration only keeps
    /// the link to it.
    fn apply_slice(
        &self,
        id: DeclarationId,
        slice: &StepSlice,
        expected_version: Option<u64>,
    ) -> Result<Declaration, DeclarationServiceError> {
        let StepSlice::ContactInfo(details) = slice else {
            return self.update(id, &DeclarationPatch::from(slice), expected_version);
        };

        check_version(&self.get(id)?, expected_version)?;
        let contact = self.upsert_contact_details(details)?;
        let link = DeclarationPatch {
            user_id: Some(Some(contact.id)),
            ..DeclarationPatch::default()
        };
        self.update(id, &link, expected_version)
    }

    /// Finalize a declaration after checking the review attestation.
    ///
    /// Submitting again refreshes `submittedAt`.
    pub fn submit(
        &self,
        id: DeclarationId,
        attestation: &Value,
        expected_version: Option<u64>,
    ) -> Result<Declaration, DeclarationServiceError> {
        validate_role(WizardStep::Review, attestation)
            .map_err(DeclarationServiceError::Validation)?;

        let record = retry_unversioned(id, expected_version, || {
            let mut record = self.get(id)?;
            check_version(&record, expected_version)?;

            let read_version = record.version;
            record.is_submitted = true;
            record.submitted_at = Some(Utc::now());
            record.version += 1;
            self.commit(&record, read_version)?;
            Ok(record)
        })?;
        info!(
            declaration_id = %id,
            items_declared = record.fields.declared_item_count(),
            "declaration submitted"
        );
        Ok(record)
    }

    pub fn submit_attested(
        &self,
        id: DeclarationId,
        attestation: SubmissionAttestation,
        expected_version: Option<u64>,
    ) -> Result<Declaration, DeclarationServiceError> {
        let body = json!({
            "certificationAccepted": attestation.certification_accepted,
            "inspectionUnderstood": attestation.inspection_understood,
        });
        self.submit(id, &body, expected_version)
    }

    /// Unsubmitted declarations, newest first.
    pub fn drafts(&self) -> Result<Vec<Declaration>, DeclarationServiceError> {
        Ok(self.declarations.drafts()?)
    }

    pub fn draft_summaries(&self) -> Result<Vec<DraftSummary>, DeclarationServiceError> {
        Ok(self
            .drafts()?
            .iter()
            .map(|draft| DraftSummary::from_declaration(draft, self.layout))
            .collect())
    }

    /// Hard-delete a draft. Submitted declarations are never removed here.
    pub fn delete_draft(&self, id: DeclarationId) -> Result<(), DeclarationServiceError> {
        if !self.declarations.delete_draft(id)? {
            return Err(DeclarationServiceError::NotFound(id));
        }
        info!(declaration_id = %id, "draft deleted");
        Ok(())
    }

    /// Dry-run a step schema without touching stored records.
    pub fn validate_step(&self, step: i64, data: &Value) -> Result<StepSlice, StepValidationError> {
        validate_step(self.layout, step, data)
    }

    /// Create the contact, or refresh it when the phone number is already known.
    pub fn upsert_contact(&self, data: &Value) -> Result<Contact, DeclarationServiceError> {
        let details = validate_contact(data).map_err(DeclarationServiceError::Validation)?;
        let now = Utc::now();

        match self.contacts.find_by_phone(&details.phone_number)? {
            Some(mut contact) => {
                contact.full_name = details.full_name;
                contact.home_address = details.home_address;
                contact.updated_at = now;
                self.contacts.update(contact.clone())?;
                info!(contact_id = %contact.id, "contact updated");
                Ok(contact)
            }
            None => {
                let contact = self.contacts.insert(details, now)?;
                info!(contact_id = %contact.id, "contact created");
                Ok(contact)
            }
        }
    }

    pub fn upsert_contact_details(
        &self,
        details: &ContactDetails,
    ) -> Result<Contact, DeclarationServiceError> {
        self.upsert_contact(&json!({
            "fullName": details.full_name,
            "homeAddress": details.home_address,
            "phoneNumber": details.phone_number,
        }))
    }

    pub fn contact_by_phone(&self, phone_number: &str) -> Result<Contact, DeclarationServiceError> {
        self.contacts
            .find_by_phone(phone_number.trim())?
            .ok_or(DeclarationServiceError::ContactNotFound)
    }

    pub fn contact(&self, id: ContactId) -> Result<Option<Contact>, DeclarationServiceError> {
        Ok(self.contacts.fetch(id)?)
    }

    /// Receipt data for a submitted declaration.
    pub fn confirmation(
        &self,
        id: DeclarationId,
    ) -> Result<ConfirmationSummary, DeclarationServiceError> {
        let record = self.get(id)?;
        ConfirmationSummary::from_declaration(&record)
            .ok_or(DeclarationServiceError::NotSubmitted(id))
    }

    fn merge(
        &self,
        patch: &DeclarationPatch,
        fields: &mut DeclarationFields,
    ) -> Result<(), DeclarationServiceError> {
        patch.apply_to(fields);
        fields.drop_inapplicable_details();
        let mut errors = patch.check_merged(fields);

        if let Some(Some(contact_id)) = patch.user_id {
            if self.contacts.fetch(contact_id)?.is_none() {
                errors.push(FieldError::new(
                    "userId",
                    format!("contact {contact_id} does not exist"),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DeclarationServiceError::Validation(errors))
        }
    }

    fn commit(&self, record: &Declaration, read_version: u64) -> Result<(), DeclarationServiceError> {
        self.declarations
            .update(record.clone(), read_version)
            .map_err(|error| match error {
                RepositoryError::Stale { current } => DeclarationServiceError::VersionConflict {
                    id: record.id,
                    expected: read_version,
                    current,
                },
                other => other.into(),
            })
    }
}

const WRITE_ATTEMPTS: usize = 3;

/// Callers without an `If-Match` token get last-write-wins: a write that lost a
/// race is recomputed against the newer record a bounded number of times.
fn retry_unversioned<T>(
    id: DeclarationId,
    expected_version: Option<u64>,
    mut write: impl FnMut() -> Result<T, DeclarationServiceError>,
) -> Result<T, DeclarationServiceError> {
    let mut attempt = 1;
    loop {
        match write() {
            Err(DeclarationServiceError::VersionConflict { current, .. })
                if expected_version.is_none() && attempt < WRITE_ATTEMPTS =>
            {
                debug!(declaration_id = %id, current, attempt, "write lost a race, retrying");
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn check_version(
    record: &Declaration,
    expected_version: Option<u64>,
) -> Result<(), DeclarationServiceError> {
    match expected_version {
        Some(expected) if expected != record.version => {
            Err(DeclarationServiceError::VersionConflict {
                id: record.id,
                expected,
                current: record.version,
            })
        }
        _ => Ok(()),
    }
}

/// Error raised by the declaration service.
#[derive(Debug, thiserror::Error)]
pub enum DeclarationServiceError {
    #[error("declaration failed validation ({} field error(s))", .0.len())]
    Validation(Vec<FieldError>),
    #[error(transparent)]
    InvalidStep(StepValidationError),
    #[error("declaration {0} not found")]
    NotFound(DeclarationId),
    #[error("contact not found")]
    ContactNotFound,
    #[error("declaration {id} is at version {current}, expected {expected}")]
    VersionConflict {
        id: DeclarationId,
        expected: u64,
        current: u64,
    },
    #[error("declaration {0} has not been submitted")]
    NotSubmitted(DeclarationId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DeclarationServiceError {
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            DeclarationServiceError::Validation(errors) => errors,
            _ => &[],
        }
    }

    /// HTTP status shared by the declaration router and `AppError`.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DeclarationServiceError::Validation(_) | DeclarationServiceError::InvalidStep(_) => {
                StatusCode::BAD_REQUEST
            }
            DeclarationServiceError::NotFound(_)
            | DeclarationServiceError::ContactNotFound
            | DeclarationServiceError::Repository(RepositoryError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            DeclarationServiceError::VersionConflict { .. }
            | DeclarationServiceError::NotSubmitted(_)
            | DeclarationServiceError::Repository(RepositoryError::Conflict)
            | DeclarationServiceError::Repository(RepositoryError::Stale { .. }) => {
                StatusCode::CONFLICT
            }
            DeclarationServiceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StepValidationError> for DeclarationServiceError {
    fn from(error: StepValidationError) -> Self {
        match error {
            StepValidationError::Fields(errors) => Self::Validation(errors),
            invalid => Self::InvalidStep(invalid),
        }
    }
}
