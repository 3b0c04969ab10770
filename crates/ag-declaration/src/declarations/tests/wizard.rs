use super::common::*;
use std::sync::Arc;

use crate::declarations::domain::{
    ArrivalMethod, StayDuration, SubmissionAttestation, TravelerType, VisitFrequency, NONE_CODE,
};
use crate::declarations::snapshot::{self, SnapshotStore, SNAPSHOT_KEY};
use crate::declarations::{
    can_proceed, resume_draft, BackendError, DeclarationWizard, MemorySnapshotStore, StepLayout,
    WizardError, WizardState, WizardStep,
};

fn wizard(layout: StepLayout) -> (DeclarationWizard<MemoryService>, Arc<MemoryService>) {
    let (service, _) = build_service(layout);
    let service = Arc::new(service);
    (DeclarationWizard::new(service.clone(), layout), service)
}

fn fill_traveler(wizard: &mut DeclarationWizard<MemoryService>) {
    wizard.set_number_of_people(2).expect("valid count");
    wizard.set_traveler_type(TravelerType::Visitor);
    wizard.set_visit_frequency(VisitFrequency::First);
    wizard.set_duration(StayDuration::Overnight);
}

#[test]
fn resident_passes_traveler_gate_without_visit_details() {
    let mut state = WizardState::default();
    state.fields.traveler_type = Some(TravelerType::Resident);
    assert!(can_proceed(WizardStep::TravelerInfo, &state));

    state.fields.traveler_type = Some(TravelerType::Moving);
    assert!(!can_proceed(WizardStep::TravelerInfo, &state));
}

#[test]
fn arrival_gate_follows_method() {
    let mut state = WizardState::default();
    assert!(!can_proceed(WizardStep::ArrivalInfo, &state));

    state.fields.arrival_method = Some(ArrivalMethod::Ship);
    state.fields.ship_name = Some("Pride of America".to_string());
    assert!(!can_proceed(WizardStep::ArrivalInfo, &state));
    state.fields.departure_location = Some("Vancouver".to_string());
    assert!(can_proceed(WizardStep::ArrivalInfo, &state));

    state.fields.arrival_method = Some(ArrivalMethod::Flight);
    assert!(!can_proceed(WizardStep::ArrivalInfo, &state));
}

#[test]
fn switching_to_resident_clears_visit_details() {
    let (mut wizard, _) = wizard(StepLayout::Full);
    fill_traveler(&mut wizard);
    wizard.set_traveler_type(TravelerType::Resident);

    assert_eq!(wizard.state().fields.visit_frequency, None);
    assert_eq!(wizard.state().fields.duration, None);
}

#[test]
fn switching_to_flight_clears_departure_location() {
    let (mut wizard, _) = wizard(StepLayout::Full);
    wizard.set_arrival_method(ArrivalMethod::Other);
    wizard.set_departure_location("Papeete");
    wizard.set_arrival_method(ArrivalMethod::Flight);

    assert_eq!(wizard.state().fields.departure_location, None);
}

#[test]
fn item_sentinel_is_exclusive_at_selection_time() {
    let (mut wizard, _) = wizard(StepLayout::Full);
    wizard.toggle_plant_item("flowers-foliage").expect("known code");
    wizard.toggle_plant_item(NONE_CODE).expect("sentinel");
    assert_eq!(wizard.state().fields.plant_items.codes(), &[NONE_CODE.to_string()]);

    wizard.toggle_plant_item("soil-media").expect("known code");
    assert!(!wizard.state().fields.plant_items.contains_none());
    assert!(matches!(
        wizard.toggle_animal_item("unicorns"),
        Err(WizardError::UnknownCode { .. })
    ));
}

#[test]
fn deselecting_an_island_drops_its_nights() {
    let (mut wizard, _) = wizard(StepLayout::Full);
    wizard.toggle_island("maui").expect("known island");
    wizard.set_island_nights("maui", 4).expect("selected island");
    assert!(matches!(
        wizard.set_island_nights("oahu", 1),
        Err(WizardError::IslandNotSelected(_))
    ));

    wizard.toggle_island("maui").expect("known island");
    assert!(wizard.state().fields.islands.is_empty());
    assert!(wizard.state().fields.island_nights.is_empty());
}

#[test]
fn advance_refuses_when_gate_is_closed() {
    let (mut wizard, service) = wizard(StepLayout::Full);
    assert_eq!(wizard.advance().expect("welcome always proceeds"), 2);

    match wizard.advance() {
        Err(WizardError::StepIncomplete(WizardStep::TravelerInfo)) => {}
        other => panic!("expected closed gate, got {other:?}"),
    }
    assert_eq!(wizard.current_step(), 2);
    assert_eq!(service.drafts().expect("drafts").len(), 1);
}

#[test]
fn advance_persists_step_slice() {
    let (mut wizard, service) = wizard(StepLayout::Full);
    wizard.advance().expect("welcome");
    fill_traveler(&mut wizard);
    wizard.advance().expect("traveler step");

    let id = wizard.state().declaration_id.expect("provisioned");
    let stored = service.get(id).expect("stored");
    assert_eq!(stored.fields.number_of_people, 2);
    assert_eq!(stored.fields.visit_frequency, Some(VisitFrequency::First));
    assert_eq!(wizard.current_step(), 3);
}

#[test]
fn failed_persistence_keeps_the_wizard_in_place() {
    let (mut wizard, service) = wizard(StepLayout::Full);
    wizard.advance().expect("welcome");
    let id = wizard.state().declaration_id.expect("provisioned");
    fill_traveler(&mut wizard);
    service.delete_draft(id).expect("deleted elsewhere");

    // The wizard re-provisions a missing declaration rather than failing.
    wizard.advance().expect("traveler step");
    assert_ne!(wizard.state().declaration_id, Some(id));

    wizard.toggle_island("kauai").expect("known island");
    wizard.set_arrival_method(ArrivalMethod::Other);
    wizard.set_departure_location("Ensenada");
    wizard.advance().expect("arrival step");
    wizard.advance().expect("islands step");
    wizard.toggle_plant_item("fruits-vegetables").expect("known code");
    wizard.set_plant_description("Two mangoes");
    let before = wizard.state().clone();

    let mut stuck = DeclarationWizard::from_state(
        Arc::new(DeclarationServiceDown),
        StepLayout::Full,
        before.clone(),
    );
    match stuck.advance() {
        Err(WizardError::Backend(BackendError::Unavailable(_))) => {}
        other => panic!("expected backend failure, got {other:?}"),
    }
    assert_eq!(stuck.state(), &before);
}

#[test]
fn contact_step_links_the_contact() {
    let (mut wizard, service) = wizard(StepLayout::Full);
    let state = WizardState {
        current_step: 8,
        ..WizardState::default()
    };
    wizard.load_state(state);
    assert_eq!(wizard.current_role(), WizardStep::ContactInfo);
    assert!(!wizard.can_proceed());

    wizard.set_contact(contact_details());
    wizard.advance().expect("contact step");

    let id = wizard.state().declaration_id.expect("provisioned");
    let contact = service.contact_by_phone("4155550123").expect("contact stored");
    assert_eq!(service.get(id).expect("stored").fields.user_id, Some(contact.id));
    assert_eq!(wizard.state().fields.user_id, Some(contact.id));
    assert_eq!(wizard.current_role(), WizardStep::Review);
}

#[test]
fn submit_only_from_review() {
    let (mut wizard, service) = wizard(StepLayout::Compact);
    assert!(matches!(
        wizard.submit(SubmissionAttestation::accepted()),
        Err(WizardError::NotOnReview)
    ));

    wizard.load_state(WizardState {
        current_step: 6,
        ..WizardState::default()
    });
    assert!(matches!(wizard.advance(), Err(WizardError::NoNextStep)));

    let rejected = wizard.submit(SubmissionAttestation {
        certification_accepted: true,
        inspection_understood: false,
    });
    assert!(matches!(
        rejected,
        Err(WizardError::Backend(BackendError::Rejected(_)))
    ));
    assert!(!wizard.state().is_submitted);

    let submitted = wizard
        .submit(SubmissionAttestation::accepted())
        .expect("submit succeeds");
    assert!(submitted.is_submitted);
    assert!(wizard.state().is_submitted);
    assert!(service.drafts().expect("drafts").is_empty());
}

#[test]
fn retreat_stops_at_welcome() {
    let (mut wizard, _) = wizard(StepLayout::Standard);
    assert!(!wizard.retreat());
    wizard.advance().expect("welcome");
    assert!(wizard.retreat());
    assert_eq!(wizard.current_step(), 1);
}

#[test]
fn snapshots_survive_a_restart() {
    let (service, _) = build_service(StepLayout::Full);
    let service = Arc::new(service);
    let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());

    let mut first = DeclarationWizard::new(service.clone(), StepLayout::Full)
        .with_snapshots(store.clone());
    first.advance().expect("welcome");
    fill_traveler(&mut first);

    let second =
        DeclarationWizard::new(service.clone(), StepLayout::Full).with_snapshots(store.clone());
    assert_eq!(second.state(), first.state());

    let other_layout =
        DeclarationWizard::new(service, StepLayout::Standard).with_snapshots(store.clone());
    assert_eq!(other_layout.state(), &WizardState::default());
    assert_eq!(store.load(SNAPSHOT_KEY).expect("load"), None);
}

#[test]
fn snapshot_write_failures_are_not_fatal() {
    let (service, _) = build_service(StepLayout::Full);
    let store = Arc::new(ReadOnlySnapshots::default());
    let mut wizard = DeclarationWizard::new(Arc::new(service), StepLayout::Full)
        .with_snapshots(store.clone());

    wizard.advance().expect("welcome");
    fill_traveler(&mut wizard);
    wizard.advance().expect("traveler step");

    assert_eq!(wizard.current_step(), 3);
    assert!(*store.attempts.lock().expect("attempts mutex poisoned") > 0);
}

#[test]
fn reset_discards_the_snapshot() {
    let (service, _) = build_service(StepLayout::Full);
    let store = Arc::new(MemorySnapshotStore::new());
    let mut wizard =
        DeclarationWizard::new(Arc::new(service), StepLayout::Full).with_snapshots(store.clone());
    wizard.advance().expect("welcome");

    wizard.reset();

    assert_eq!(wizard.state(), &WizardState::default());
    assert!(snapshot::restore(store.as_ref(), StepLayout::Full).is_none());
}

#[test]
fn resumed_draft_restarts_at_welcome() {
    let (mut wizard, service) = wizard(StepLayout::Full);
    wizard.advance().expect("welcome");
    fill_traveler(&mut wizard);
    wizard.advance().expect("traveler step");

    let draft = service.drafts().expect("drafts").remove(0);
    let mut resumed = DeclarationWizard::new(service.clone(), StepLayout::Full);
    resumed.load_state(resume_draft(&draft, None));

    assert_eq!(resumed.current_step(), 1);
    assert_eq!(resumed.state().fields, draft.fields);
    assert_eq!(resumed.state().declaration_id, Some(draft.id));

    resumed.advance().expect("welcome");
    assert!(resumed.can_proceed(), "stored traveler data satisfies the gate");
}

/// Backend that fails every call.
struct DeclarationServiceDown;

impl crate::declarations::DeclarationBackend for DeclarationServiceDown {
    fn fetch_declaration(
        &self,
        _id: crate::declarations::DeclarationId,
    ) -> Result<Option<crate::declarations::Declaration>, BackendError> {
        Err(BackendError::Unavailable("network down".to_string()))
    }

    fn create_declaration(
        &self,
        _patch: &crate::declarations::DeclarationPatch,
    ) -> Result<crate::declarations::Declaration, BackendError> {
        Err(BackendError::Unavailable("network down".to_string()))
    }

    fn update_declaration(
        &self,
        _id: crate::declarations::DeclarationId,
        _patch: &crate::declarations::DeclarationPatch,
    ) -> Result<crate::declarations::Declaration, BackendError> {
        Err(BackendError::Unavailable("network down".to_string()))
    }

    fn save_step(
        &self,
        _id: crate::declarations::DeclarationId,
        _step: WizardStep,
        _data: &serde_json::Value,
    ) -> Result<crate::declarations::Declaration, BackendError> {
        Err(BackendError::Unavailable("network down".to_string()))
    }

    fn upsert_contact(
        &self,
        _details: &crate::declarations::ContactDetails,
    ) -> Result<crate::declarations::Contact, BackendError> {
        Err(BackendError::Unavailable("network down".to_string()))
    }

    fn submit_declaration(
        &self,
        _id: crate::declarations::DeclarationId,
        _attestation: SubmissionAttestation,
    ) -> Result<crate::declarations::Declaration, BackendError> {
        Err(BackendError::Unavailable("network down".to_string()))
    }
}
