//! Caller-owned wizard state machine.
//!
//! The wizard holds the accumulated fields and the current step pointer,
//! enforces selection side effects, and persists each step's slice through a
//! [`DeclarationBackend`] before moving forward.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::domain::{
    ArrivalMethod, Contact, ContactDetails, Declaration, DeclarationFields, DeclarationId,
    StayDuration, SubmissionAttestation, TravelerType, VisitFrequency, ANIMAL_CODES,
    ISLAND_CODES, LANGUAGE_CODES, MAX_TRAVELERS, NONE_CODE, PLANT_CODES,
};
use super::fields::FieldError;
use super::patch::DeclarationPatch;
use super::repository::{ContactRepository, DeclarationRepository, RepositoryError};
use super::service::{DeclarationService, DeclarationServiceError};
use super::snapshot::{self, SnapshotStore};
use super::steps::{StepLayout, WizardStep};

const MIN_HAWAII_ADDRESS_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardState {
    pub current_step: u8,
    pub fields: DeclarationFields,
    pub contact: ContactDetails,
    pub declaration_id: Option<DeclarationId>,
    pub is_submitted: bool,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            current_step: 1,
            fields: DeclarationFields::default(),
            contact: ContactDetails::default(),
            declaration_id: None,
            is_submitted: false,
        }
    }
}

/// Proceed-gate for a step role, evaluated over the wizard's local state.
pub fn can_proceed(step: WizardStep, state: &WizardState) -> bool {
    let fields = &state.fields;
    match step {
        WizardStep::Welcome | WizardStep::Review => true,
        WizardStep::TravelerInfo => {
            fields.number_of_people > 0
                && match fields.traveler_type {
                    Some(TravelerType::Resident) => true,
                    Some(_) => fields.visit_frequency.is_some() && fields.duration.is_some(),
                    None => false,
                }
        }
        WizardStep::ArrivalInfo => match fields.arrival_method {
            Some(ArrivalMethod::Flight) => {
                filled(&fields.flight_number) && filled(&fields.airline)
            }
            Some(ArrivalMethod::Ship) => {
                filled(&fields.ship_name) && filled(&fields.departure_location)
            }
            Some(ArrivalMethod::Other) => filled(&fields.departure_location),
            None => false,
        },
        WizardStep::Islands => !fields.islands.is_empty(),
        WizardStep::PlantItems => {
            fields.plant_items.is_empty()
                || fields.plant_items.contains_none()
                || filled(&fields.plant_items_description)
        }
        WizardStep::AnimalItems => {
            fields.animal_items.is_empty()
                || fields.animal_items.contains_none()
                || filled(&fields.animal_items_description)
        }
        WizardStep::HawaiiAddress => {
            fields.same_as_home_address
                || fields
                    .hawaii_address
                    .as_deref()
                    .map(str::trim)
                    .is_some_and(|address| address.chars().count() >= MIN_HAWAII_ADDRESS_LEN)
        }
        WizardStep::ContactInfo => state.contact.is_complete(),
    }
}

fn filled(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|text| !text.trim().is_empty())
}

/// Store operations the wizard depends on.
pub trait DeclarationBackend: Send + Sync {
    fn fetch_declaration(&self, id: DeclarationId) -> Result<Option<Declaration>, BackendError>;
    fn create_declaration(&self, patch: &DeclarationPatch) -> Result<Declaration, BackendError>;
    fn update_declaration(
        &self,
        id: DeclarationId,
        patch: &DeclarationPatch,
    ) -> Result<Declaration, BackendError>;
    /// Validate `data` with the step's schema and persist the normalized slice.
    fn save_step(
        &self,
        id: DeclarationId,
        step: WizardStep,
        data: &Value,
    ) -> Result<Declaration, BackendError>;
    fn upsert_contact(&self, details: &ContactDetails) -> Result<Contact, BackendError>;
    fn submit_declaration(
        &self,
        id: DeclarationId,
        attestation: SubmissionAttestation,
    ) -> Result<Declaration, BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("rejected with {} field error(s)", .0.len())]
    Rejected(Vec<FieldError>),
    #[error("declaration {0} not found")]
    NotFound(DeclarationId),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<DeclarationServiceError> for BackendError {
    fn from(error: DeclarationServiceError) -> Self {
        match error {
            DeclarationServiceError::Validation(errors) => BackendError::Rejected(errors),
            DeclarationServiceError::NotFound(id) => BackendError::NotFound(id),
            DeclarationServiceError::VersionConflict { .. }
            | DeclarationServiceError::NotSubmitted(_)
            | DeclarationServiceError::Repository(RepositoryError::Conflict)
            | DeclarationServiceError::Repository(RepositoryError::Stale { .. }) => {
                BackendError::Conflict(error.to_string())
            }
            other => BackendError::Unavailable(other.to_string()),
        }
    }
}

impl<R, C> DeclarationBackend for DeclarationService<R, C>
where
    R: DeclarationRepository + 'static,
    C: ContactRepository + 'static,
{
    fn fetch_declaration(&self, id: DeclarationId) -> Result<Option<Declaration>, BackendError> {
        match self.get(id) {
            Ok(record) => Ok(Some(record)),
            Err(DeclarationServiceError::NotFound(_)) => Ok(None),
            Err(other) => Err(other.into()),
        }
    }

    fn create_declaration(&self, patch: &DeclarationPatch) -> Result<Declaration, BackendError> {
        Ok(self.create(patch)?)
    }

    fn update_declaration(
        &self,
        id: DeclarationId,
        patch: &DeclarationPatch,
    ) -> Result<Declaration, BackendError> {
        Ok(self.update(id, patch, None)?)
    }

    fn save_step(
        &self,
        id: DeclarationId,
        step: WizardStep,
        data: &Value,
    ) -> Result<Declaration, BackendError> {
        Ok(self.save_step_role(id, step, data)?)
    }

    fn upsert_contact(&self, details: &ContactDetails) -> Result<Contact, BackendError> {
        Ok(self.upsert_contact_details(details)?)
    }

    fn submit_declaration(
        &self,
        id: DeclarationId,
        attestation: SubmissionAttestation,
    ) -> Result<Declaration, BackendError> {
        Ok(self.submit_attested(id, attestation, None)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("the {} step is not complete", .0.label())]
    StepIncomplete(WizardStep),
    #[error("already on the final step")]
    NoNextStep,
    #[error("submission is only possible from the review step")]
    NotOnReview,
    #[error("unknown {field} code '{code}'")]
    UnknownCode { field: &'static str, code: String },
    #[error("island '{0}' is not selected")]
    IslandNotSelected(String),
    #[error("number of travelers must be between 1 and 10")]
    TravelerCount,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A wizard instance bound to one backend and step layout.
pub struct DeclarationWizard<B> {
    backend: Arc<B>,
    layout: StepLayout,
    state: WizardState,
    snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl<B> DeclarationWizard<B>
where
    B: DeclarationBackend,
{
    pub fn new(backend: Arc<B>, layout: StepLayout) -> Self {
        Self::from_state(backend, layout, WizardState::default())
    }

    pub fn from_state(backend: Arc<B>, layout: StepLayout, state: WizardState) -> Self {
        Self {
            backend,
            layout,
            state,
            snapshots: None,
        }
    }

    /// Attach a snapshot store, restoring any compatible saved state.
    pub fn with_snapshots(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        if let Some(state) = snapshot::restore(store.as_ref(), self.layout) {
            debug!(current_step = state.current_step, "wizard restored from snapshot");
            self.state = state;
        }
        self.snapshots = Some(store);
        self
    }

    /// Replace the live state, e.g. when resuming a draft.
    pub fn load_state(&mut self, state: WizardState) {
        self.state = state;
        self.persist();
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn layout(&self) -> StepLayout {
        self.layout
    }

    pub fn current_step(&self) -> u8 {
        self.state.current_step
    }

    pub fn current_role(&self) -> WizardStep {
        self.layout
            .step(self.state.current_step)
            .unwrap_or(WizardStep::Welcome)
    }

    pub fn total_steps(&self) -> u8 {
        self.layout.total_steps()
    }

    pub fn can_proceed(&self) -> bool {
        can_proceed(self.current_role(), &self.state)
    }

    pub fn set_number_of_people(&mut self, count: u8) -> Result<(), WizardError> {
        if !(1..=MAX_TRAVELERS).contains(&count) {
            return Err(WizardError::TravelerCount);
        }
        self.edit(|state| state.fields.number_of_people = count);
        Ok(())
    }

    /// Residents never carry visit details, so switching to resident clears them.
    pub fn set_traveler_type(&mut self, traveler_type: TravelerType) {
        self.edit(|state| {
            state.fields.traveler_type = Some(traveler_type);
            if !traveler_type.requires_visit_details() {
                state.fields.visit_frequency = None;
                state.fields.duration = None;
            }
        });
    }

    pub fn set_visit_frequency(&mut self, frequency: VisitFrequency) {
        self.edit(|state| state.fields.visit_frequency = Some(frequency));
    }

    pub fn set_duration(&mut self, duration: StayDuration) {
        self.edit(|state| state.fields.duration = Some(duration));
    }

    /// Flights have no departure location, so switching to flight clears it.
    pub fn set_arrival_method(&mut self, method: ArrivalMethod) {
        self.edit(|state| {
            state.fields.arrival_method = Some(method);
            if method == ArrivalMethod::Flight {
                state.fields.departure_location = None;
            }
        });
    }

    pub fn set_flight(&mut self, flight_number: &str, airline: &str) {
        self.edit(|state| {
            state.fields.flight_number = non_blank(flight_number);
            state.fields.airline = non_blank(airline);
        });
    }

    pub fn set_ship(&mut self, ship_name: &str, shipping_line: &str) {
        self.edit(|state| {
            state.fields.ship_name = non_blank(ship_name);
            state.fields.shipping_line = non_blank(shipping_line);
        });
    }

    pub fn set_departure_location(&mut self, location: &str) {
        self.edit(|state| state.fields.departure_location = non_blank(location));
    }

    pub fn set_arrival_date(&mut self, date: Option<DateTime<Utc>>) {
        self.edit(|state| state.fields.arrival_date = date);
    }

    pub fn set_arrival_port(&mut self, port: &str) {
        self.edit(|state| state.fields.arrival_port = non_blank(port));
    }

    /// Select or deselect an island. Deselecting drops its nights entry.
    pub fn toggle_island(&mut self, code: &str) -> Result<(), WizardError> {
        check_code("island", code, ISLAND_CODES)?;
        self.edit(|state| {
            let islands = &mut state.fields.islands;
            if let Some(position) = islands.iter().position(|island| island == code) {
                islands.remove(position);
                state.fields.island_nights.remove(code);
            } else {
                islands.push(code.to_string());
            }
        });
        Ok(())
    }

    pub fn set_island_nights(&mut self, code: &str, nights: u32) -> Result<(), WizardError> {
        if !self.state.fields.islands.iter().any(|island| island == code) {
            return Err(WizardError::IslandNotSelected(code.to_string()));
        }
        self.edit(|state| {
            state.fields.island_nights.insert(code.to_string(), nights);
        });
        Ok(())
    }

    pub fn toggle_plant_item(&mut self, code: &str) -> Result<(), WizardError> {
        check_item_code("plant item", code, PLANT_CODES)?;
        self.edit(|state| state.fields.plant_items.toggle(code));
        Ok(())
    }

    pub fn set_plant_description(&mut self, description: &str) {
        self.edit(|state| state.fields.plant_items_description = non_blank(description));
    }

    pub fn toggle_animal_item(&mut self, code: &str) -> Result<(), WizardError> {
        check_item_code("animal item", code, ANIMAL_CODES)?;
        self.edit(|state| state.fields.animal_items.toggle(code));
        Ok(())
    }

    pub fn set_animal_description(&mut self, description: &str) {
        self.edit(|state| state.fields.animal_items_description = non_blank(description));
    }

    pub fn set_hawaii_address(&mut self, address: &str) {
        self.edit(|state| state.fields.hawaii_address = non_blank(address));
    }

    pub fn set_same_as_home_address(&mut self, same: bool) {
        self.edit(|state| state.fields.same_as_home_address = same);
    }

    pub fn set_contact(&mut self, details: ContactDetails) {
        self.edit(|state| state.contact = details);
    }

    pub fn set_language(&mut self, code: &str) -> Result<(), WizardError> {
        check_code("language", code, LANGUAGE_CODES)?;
        self.edit(|state| state.fields.language = code.to_string());
        Ok(())
    }

    /// The data a step persists, shaped like the step schema's input.
    pub fn step_data(&self, step: WizardStep) -> Value {
        let fields = &self.state.fields;
        match step {
            WizardStep::Welcome | WizardStep::Review => json!({}),
            WizardStep::TravelerInfo => json!({
                "numberOfPeople": fields.number_of_people,
                "travelerType": fields.traveler_type,
                "visitFrequency": fields.visit_frequency,
                "duration": fields.duration,
            }),
            WizardStep::ArrivalInfo => json!({
                "arrivalMethod": fields.arrival_method,
                "flightNumber": fields.flight_number,
                "airline": fields.airline,
                "shipName": fields.ship_name,
                "shippingLine": fields.shipping_line,
                "arrivalDate": fields.arrival_date.map(|date| date.to_rfc3339()),
                "arrivalPort": fields.arrival_port,
                "departureLocation": fields.departure_location,
            }),
            WizardStep::Islands => json!({
                "islands": fields.islands,
                "islandNights": fields.island_nights,
            }),
            WizardStep::PlantItems => json!({
                "plantItems": fields.plant_items,
                "plantItemsDescription": fields.plant_items_description,
            }),
            WizardStep::AnimalItems => json!({
                "animalItems": fields.animal_items,
                "animalItemsDescription": fields.animal_items_description,
            }),
            WizardStep::HawaiiAddress => json!({
                "hawaiiAddress": fields.hawaii_address,
                "sameAsHomeAddress": fields.same_as_home_address,
            }),
            WizardStep::ContactInfo => json!({
                "fullName": self.state.contact.full_name,
                "homeAddress": self.state.contact.home_address,
                "phoneNumber": self.state.contact.phone_number,
            }),
        }
    }

    /// Return the held declaration id, creating the record when none exists yet
    /// or the held one has been deleted.
    pub fn ensure_declaration(&mut self) -> Result<DeclarationId, WizardError> {
        if let Some(id) = self.state.declaration_id {
            if self.backend.fetch_declaration(id)?.is_some() {
                return Ok(id);
            }
            debug!(declaration_id = %id, "held declaration is gone, provisioning a new one");
        }

        let patch = DeclarationPatch::from(&self.state.fields);
        let created = self.backend.create_declaration(&patch)?;
        self.state.declaration_id = Some(created.id);
        self.persist();
        Ok(created.id)
    }

    /// Persist the current step and move to the next one.
    ///
    /// On any failure the wizard stays on the current step with its fields intact.
    pub fn advance(&mut self) -> Result<u8, WizardError> {
        let step = self.current_role();
        if self.state.current_step >= self.layout.total_steps() {
            return Err(WizardError::NoNextStep);
        }
        if !can_proceed(step, &self.state) {
            return Err(WizardError::StepIncomplete(step));
        }

        let id = self.ensure_declaration()?;
        match step {
            WizardStep::Welcome | WizardStep::Review => {}
            WizardStep::ContactInfo => {
                let contact = self.backend.upsert_contact(&self.state.contact)?;
                let patch = DeclarationPatch {
                    user_id: Some(Some(contact.id)),
                    ..DeclarationPatch::default()
                };
                self.backend.update_declaration(id, &patch)?;
                self.state.fields.user_id = Some(contact.id);
            }
            _ => {
                let data = self.step_data(step);
                self.backend.save_step(id, step, &data)?;
            }
        }

        self.state.current_step += 1;
        self.persist();
        Ok(self.state.current_step)
    }

    /// Step back without persisting anything. Returns whether the pointer moved.
    pub fn retreat(&mut self) -> bool {
        if self.state.current_step <= 1 {
            return false;
        }
        self.state.current_step -= 1;
        self.persist();
        true
    }

    /// Finalize the declaration from the review step.
    pub fn submit(
        &mut self,
        attestation: SubmissionAttestation,
    ) -> Result<Declaration, WizardError> {
        if self.current_role() != WizardStep::Review {
            return Err(WizardError::NotOnReview);
        }

        let id = self.ensure_declaration()?;
        let submitted = self.backend.submit_declaration(id, attestation)?;
        self.state.is_submitted = true;
        self.persist();
        info!(declaration_id = %id, "wizard submitted declaration");
        Ok(submitted)
    }

    /// Start over with a blank form and forget the stored snapshot.
    pub fn reset(&mut self) {
        self.state = WizardState::default();
        if let Some(store) = &self.snapshots {
            snapshot::discard(store.as_ref());
        }
    }

    fn edit(&mut self, change: impl FnOnce(&mut WizardState)) {
        change(&mut self.state);
        self.persist();
    }

    fn persist(&self) {
        if let Some(store) = &self.snapshots {
            snapshot::persist(store.as_ref(), self.layout, &self.state);
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn check_code(field: &'static str, code: &str, allowed: &[&str]) -> Result<(), WizardError> {
    if allowed.contains(&code) {
        Ok(())
    } else {
        Err(WizardError::UnknownCode {
            field,
            code: code.to_string(),
        })
    }
}

fn check_item_code(field: &'static str, code: &str, allowed: &[&str]) -> Result<(), WizardError> {
    if code == NONE_CODE {
        return Ok(());
    }
    check_code(field, code, allowed)
}
