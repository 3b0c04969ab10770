//! Server-side step schemas.
//!
//! Each wizard step has a schema that checks the slice of declaration data the
//! step collects. Conditional requirements (visit details for visitors,
//! departure location for vessels) are cross-field checks applied after the
//! individual fields have been read.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::domain::{
    ArrivalMethod, ContactDetails, ItemSelection, StayDuration, SubmissionAttestation,
    TravelerType, VisitFrequency, ANIMAL_CODES, ISLAND_CODES, MAX_TRAVELERS, NONE_CODE,
    PLANT_CODES,
};
use super::fields::{FieldError, FieldReader};
use super::steps::{StepLayout, WizardStep};

const MIN_ADDRESS_LEN: usize = 5;
const MIN_NAME_LEN: usize = 2;
const MIN_PHONE_LEN: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum StepValidationError {
    #[error("invalid step {step}: the {layout} layout has steps 1 to {total}")]
    InvalidStep {
        step: i64,
        layout: &'static str,
        total: u8,
    },
    #[error("step data failed validation ({} field error(s))", .0.len())]
    Fields(Vec<FieldError>),
}

impl StepValidationError {
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            StepValidationError::Fields(errors) => errors,
            StepValidationError::InvalidStep { .. } => &[],
        }
    }
}

impl From<Vec<FieldError>> for StepValidationError {
    fn from(errors: Vec<FieldError>) -> Self {
        Self::Fields(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelerInfoSlice {
    pub number_of_people: u8,
    pub traveler_type: TravelerType,
    pub visit_frequency: Option<VisitFrequency>,
    pub duration: Option<StayDuration>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalInfoSlice {
    pub arrival_method: ArrivalMethod,
    pub flight_number: Option<String>,
    pub airline: Option<String>,
    pub ship_name: Option<String>,
    pub shipping_line: Option<String>,
    pub arrival_date: Option<DateTime<Utc>>,
    pub arrival_port: Option<String>,
    pub departure_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IslandsSlice {
    pub islands: Vec<String>,
    pub island_nights: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantItemsSlice {
    pub plant_items: ItemSelection,
    pub plant_items_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalItemsSlice {
    pub animal_items: ItemSelection,
    pub animal_items_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HawaiiAddressSlice {
    pub hawaii_address: Option<String>,
    pub same_as_home_address: bool,
}

/// Normalized data for one step, serialized as the plain field object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepSlice {
    Welcome {},
    TravelerInfo(TravelerInfoSlice),
    ArrivalInfo(ArrivalInfoSlice),
    Islands(IslandsSlice),
    PlantItems(PlantItemsSlice),
    AnimalItems(AnimalItemsSlice),
    HawaiiAddress(HawaiiAddressSlice),
    ContactInfo(ContactDetails),
    Review(SubmissionAttestation),
}

/// Resolve `step` within `layout` and validate `data` against that step's schema.
pub fn validate_step(
    layout: StepLayout,
    step: i64,
    data: &Value,
) -> Result<StepSlice, StepValidationError> {
    let role = u8::try_from(step)
        .ok()
        .and_then(|index| layout.step(index))
        .ok_or(StepValidationError::InvalidStep {
            step,
            layout: layout.as_str(),
            total: layout.total_steps(),
        })?;

    validate_role(role, data).map_err(StepValidationError::Fields)
}

/// Validate `data` against the schema of a step role, independent of layout.
pub fn validate_role(role: WizardStep, data: &Value) -> Result<StepSlice, Vec<FieldError>> {
    let mut reader = FieldReader::new(data)?;
    match role {
        WizardStep::Welcome => reader.finish(StepSlice::Welcome {}),
        WizardStep::TravelerInfo => traveler_info(reader),
        WizardStep::ArrivalInfo => arrival_info(reader),
        WizardStep::Islands => islands(reader),
        WizardStep::PlantItems => {
            let (plant_items, plant_items_description) = item_declaration(
                &mut reader,
                "plantItems",
                "plantItemsDescription",
                PLANT_CODES,
            );
            reader.finish(StepSlice::PlantItems(PlantItemsSlice {
                plant_items,
                plant_items_description,
            }))
        }
        WizardStep::AnimalItems => {
            let (animal_items, animal_items_description) = item_declaration(
                &mut reader,
                "animalItems",
                "animalItemsDescription",
                ANIMAL_CODES,
            );
            reader.finish(StepSlice::AnimalItems(AnimalItemsSlice {
                animal_items,
                animal_items_description,
            }))
        }
        WizardStep::HawaiiAddress => hawaii_address(reader),
        WizardStep::ContactInfo => match contact_info(&mut reader) {
            Some(details) => reader.finish(StepSlice::ContactInfo(details)),
            None => Err(finish_errors(reader)),
        },
        WizardStep::Review => review(reader),
    }
}

/// Check contact details on their own, as used when upserting a contact.
pub fn validate_contact(data: &Value) -> Result<ContactDetails, Vec<FieldError>> {
    let mut reader = FieldReader::new(data)?;
    match contact_info(&mut reader) {
        Some(details) => reader.finish(details),
        None => Err(finish_errors(reader)),
    }
}

fn finish_errors(reader: FieldReader<'_>) -> Vec<FieldError> {
    reader.finish(()).err().unwrap_or_default()
}

fn traveler_info(mut reader: FieldReader<'_>) -> Result<StepSlice, Vec<FieldError>> {
    let number_of_people = match reader.integer("numberOfPeople") {
        Some(count) if (1..=i64::from(MAX_TRAVELERS)).contains(&count) => Some(count as u8),
        Some(_) => {
            reader.reject(
                "numberOfPeople",
                format!("Number of travelers must be between 1 and {MAX_TRAVELERS}"),
            );
            None
        }
        None => {
            reader.require("numberOfPeople", "Number of travelers is required");
            None
        }
    };

    let traveler_type = reader.code("travelerType", TravelerType::from_code, TravelerType::CODES);
    let visit_frequency = reader.code(
        "visitFrequency",
        VisitFrequency::from_code,
        VisitFrequency::CODES,
    );
    let duration = reader.code("duration", StayDuration::from_code, StayDuration::CODES);

    let Some(traveler_type) = traveler_type else {
        reader.require("travelerType", "Traveler type is required");
        return Err(finish_errors(reader));
    };

    let (visit_frequency, duration) = if traveler_type.requires_visit_details() {
        if visit_frequency.is_none() {
            reader.require(
                "visitFrequency",
                "Visit frequency is required for visitors and people moving to Hawaii",
            );
        }
        if duration.is_none() {
            reader.require(
                "duration",
                "Duration is required for visitors and people moving to Hawaii",
            );
        }
        (visit_frequency, duration)
    } else {
        (None, None)
    };

    match number_of_people {
        Some(number_of_people) => reader.finish(StepSlice::TravelerInfo(TravelerInfoSlice {
            number_of_people,
            traveler_type,
            visit_frequency,
            duration,
        })),
        None => Err(finish_errors(reader)),
    }
}

fn arrival_info(mut reader: FieldReader<'_>) -> Result<StepSlice, Vec<FieldError>> {
    let arrival_method = reader.code(
        "arrivalMethod",
        ArrivalMethod::from_code,
        ArrivalMethod::CODES,
    );
    let flight_number = reader.text("flightNumber");
    let airline = reader.text("airline");
    let ship_name = reader.text("shipName");
    let shipping_line = reader.text("shippingLine");
    let arrival_date = reader.timestamp("arrivalDate");
    let arrival_port = reader.text("arrivalPort");
    let departure_location = reader.text("departureLocation");

    let Some(arrival_method) = arrival_method else {
        reader.require("arrivalMethod", "Arrival method is required");
        return Err(finish_errors(reader));
    };

    match arrival_method {
        ArrivalMethod::Flight => {
            if flight_number.is_none() {
                reader.reject("flightNumber", "Flight number is required for flights");
            }
            if airline.is_none() {
                reader.reject("airline", "Airline is required for flights");
            }
        }
        ArrivalMethod::Ship => {
            if ship_name.is_none() {
                reader.reject("shipName", "Ship name is required for cruise ships");
            }
        }
        ArrivalMethod::Other => {}
    }

    if arrival_method.requires_departure_location() && departure_location.is_none() {
        reader.reject(
            "departureLocation",
            "Departure location is required for cruise ships and other vessels",
        );
    }

    let is_flight = arrival_method == ArrivalMethod::Flight;
    let is_ship = arrival_method == ArrivalMethod::Ship;
    reader.finish(StepSlice::ArrivalInfo(ArrivalInfoSlice {
        arrival_method,
        flight_number: flight_number.filter(|_| is_flight),
        airline: airline.filter(|_| is_flight),
        ship_name: ship_name.filter(|_| is_ship),
        shipping_line: shipping_line.filter(|_| is_ship),
        arrival_date,
        arrival_port,
        departure_location: departure_location.filter(|_| !is_flight),
    }))
}

fn islands(mut reader: FieldReader<'_>) -> Result<StepSlice, Vec<FieldError>> {
    let islands = reader.code_list("islands", ISLAND_CODES);
    let island_nights = reader.count_map("islandNights").unwrap_or_default();

    let Some(islands) = islands else {
        reader.require("islands", "Please select at least one island");
        return Err(finish_errors(reader));
    };

    if islands.is_empty() {
        reader.reject("islands", "Please select at least one island");
    }
    check_nights_subset(&mut reader, &islands, &island_nights);

    reader.finish(StepSlice::Islands(IslandsSlice {
        islands,
        island_nights,
    }))
}

pub(crate) fn check_nights_subset(
    reader: &mut FieldReader<'_>,
    islands: &[String],
    island_nights: &BTreeMap<String, u32>,
) {
    for code in island_nights.keys() {
        if !islands.iter().any(|island| island == code) {
            reader.reject(
                format!("islandNights.{code}"),
                "Nights can only be recorded for selected islands",
            );
        }
    }
}

pub(crate) fn read_item_selection(
    reader: &mut FieldReader<'_>,
    key: &str,
    allowed: &[&str],
) -> Option<ItemSelection> {
    let mut permitted: Vec<&str> = allowed.to_vec();
    permitted.push(NONE_CODE);
    let codes = reader.code_list(key, &permitted)?;
    if codes.len() > 1 && codes.iter().any(|code| code == NONE_CODE) {
        reader.reject(
            key,
            format!("'{NONE_CODE}' cannot be combined with other selections"),
        );
        return None;
    }
    Some(ItemSelection::from_codes(codes))
}

fn item_declaration(
    reader: &mut FieldReader<'_>,
    items_key: &str,
    description_key: &str,
    allowed: &[&str],
) -> (ItemSelection, Option<String>) {
    let items = read_item_selection(reader, items_key, allowed).unwrap_or_default();
    let description = reader.text(description_key);

    if items.has_declared_items() && description.is_none() {
        reader.reject(
            description_key,
            "Please describe the items you are bringing",
        );
    }

    let description = description.filter(|_| items.has_declared_items());
    (items, description)
}

fn hawaii_address(mut reader: FieldReader<'_>) -> Result<StepSlice, Vec<FieldError>> {
    let same_as_home_address = reader.flag("sameAsHomeAddress").unwrap_or(false);
    let hawaii_address = reader.text("hawaiiAddress");

    if !same_as_home_address {
        let long_enough = hawaii_address
            .as_deref()
            .is_some_and(|address| address.chars().count() >= MIN_ADDRESS_LEN);
        if !long_enough {
            reader.reject(
                "hawaiiAddress",
                "Please enter your Hawaii address or check 'Same As Home Address'",
            );
        }
    }

    reader.finish(StepSlice::HawaiiAddress(HawaiiAddressSlice {
        hawaii_address: hawaii_address.filter(|_| !same_as_home_address),
        same_as_home_address,
    }))
}

fn contact_info(reader: &mut FieldReader<'_>) -> Option<ContactDetails> {
    let full_name = min_text(reader, "fullName", MIN_NAME_LEN, "Please enter your full name");
    let home_address = min_text(
        reader,
        "homeAddress",
        MIN_ADDRESS_LEN,
        "Please enter your complete home address",
    );
    let phone_number = min_text(
        reader,
        "phoneNumber",
        MIN_PHONE_LEN,
        "Please enter a valid phone number",
    );

    Some(ContactDetails {
        full_name: full_name?,
        home_address: home_address?,
        phone_number: phone_number?,
    })
}

fn min_text(
    reader: &mut FieldReader<'_>,
    key: &str,
    min_len: usize,
    message: &str,
) -> Option<String> {
    match reader.text(key) {
        Some(value) if value.chars().count() >= min_len => Some(value),
        Some(_) | None => {
            reader.require(key, message);
            None
        }
    }
}

fn review(mut reader: FieldReader<'_>) -> Result<StepSlice, Vec<FieldError>> {
    let certification_accepted = reader.flag("certificationAccepted");
    let inspection_understood = reader.flag("inspectionUnderstood");

    if certification_accepted != Some(true) {
        reader.require(
            "certificationAccepted",
            "You must accept the certification to proceed",
        );
    }
    if inspection_understood != Some(true) {
        reader.require(
            "inspectionUnderstood",
            "You must acknowledge the inspection requirement",
        );
    }

    reader.finish(StepSlice::Review(SubmissionAttestation::accepted()))
}
