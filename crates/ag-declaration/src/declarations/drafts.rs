use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{Contact, ContactDetails, Declaration, DeclarationFields, DeclarationId, TravelerType};
use super::steps::{StepLayout, WizardStep};
use super::wizard::WizardState;

/// One row of the drafts list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub id: DeclarationId,
    pub created_at: DateTime<Utc>,
    pub traveler_type: Option<TravelerType>,
    pub number_of_people: u8,
    pub islands: Vec<String>,
    pub progress_percent: u8,
}

impl DraftSummary {
    pub fn from_declaration(declaration: &Declaration, layout: StepLayout) -> Self {
        Self {
            id: declaration.id,
            created_at: declaration.created_at,
            traveler_type: declaration.fields.traveler_type,
            number_of_people: declaration.fields.number_of_people,
            islands: declaration.fields.islands.clone(),
            progress_percent: progress_percent(&declaration.fields, layout),
        }
    }
}

/// Share of the layout's field-bearing steps that hold at least one populated signal field.
pub fn progress_percent(fields: &DeclarationFields, layout: StepLayout) -> u8 {
    let groups: Vec<WizardStep> = layout
        .steps()
        .iter()
        .copied()
        .filter(|step| step.collects_fields())
        .collect();
    if groups.is_empty() {
        return 0;
    }

    let populated = groups
        .iter()
        .filter(|step| group_populated(**step, fields))
        .count();
    let percent = (populated as f64 / groups.len() as f64 * 100.0).round();
    percent as u8
}

fn group_populated(step: WizardStep, fields: &DeclarationFields) -> bool {
    match step {
        WizardStep::TravelerInfo => fields.traveler_type.is_some(),
        WizardStep::ArrivalInfo => fields.arrival_method.is_some(),
        WizardStep::Islands => !fields.islands.is_empty(),
        WizardStep::PlantItems => !fields.plant_items.is_empty(),
        WizardStep::AnimalItems => !fields.animal_items.is_empty(),
        WizardStep::HawaiiAddress => fields.same_as_home_address || fields.hawaii_address.is_some(),
        WizardStep::ContactInfo => fields.user_id.is_some(),
        WizardStep::Welcome | WizardStep::Review => false,
    }
}

/// Rebuild wizard state from a stored draft.
///
/// Every stored field is copied; the wizard always restarts at the welcome step.
pub fn resume_draft(draft: &Declaration, contact: Option<&Contact>) -> WizardState {
    WizardState {
        current_step: 1,
        fields: draft.fields.clone(),
        contact: contact.map(ContactDetails::from).unwrap_or_default(),
        declaration_id: Some(draft.id),
        is_submitted: false,
    }
}
