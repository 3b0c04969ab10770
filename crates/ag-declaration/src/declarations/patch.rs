use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::domain::{
    ArrivalMethod, ContactId, DeclarationFields, ItemSelection, StayDuration, TravelerType,
    VisitFrequency, ANIMAL_CODES, ISLAND_CODES, LANGUAGE_CODES, MAX_TRAVELERS, PLANT_CODES,
};
use super::fields::{FieldError, FieldReader};
use super::validation::{read_item_selection, StepSlice};

/// Partial update for a declaration.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_people: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traveler_type: Option<Option<TravelerType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visit_frequency: Option<Option<VisitFrequency>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<Option<StayDuration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_method: Option<Option<ArrivalMethod>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airline: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_name: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_line: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival_port: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_location: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub islands: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub island_nights: Option<BTreeMap<String, u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plant_items: Option<ItemSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animal_items: Option<ItemSelection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plant_items_description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animal_items_description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hawaii_address: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_as_home_address: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Option<ContactId>>,
}

impl DeclarationPatch {
    /// Parse a JSON body, type-checking every known key. Unknown keys are ignored.
    pub fn from_json(data: &Value) -> Result<Self, Vec<FieldError>> {
        let mut reader = FieldReader::new(data)?;

        let number_of_people = match reader.integer("numberOfPeople") {
            Some(count) if (1..=i64::from(MAX_TRAVELERS)).contains(&count) => Some(count as u8),
            Some(_) => {
                reader.reject(
                    "numberOfPeople",
                    format!("Number of travelers must be between 1 and {MAX_TRAVELERS}"),
                );
                None
            }
            None => None,
        };

        let language = match reader.text("language") {
            Some(code) if LANGUAGE_CODES.contains(&code.as_str()) => Some(code),
            Some(code) => {
                reader.reject("language", format!("unsupported language '{code}'"));
                None
            }
            None => None,
        };

        let user_id = reader
            .nullable_integer("userId")
            .map(|id| id.map(ContactId));

        let patch = Self {
            number_of_people,
            traveler_type: reader.nullable_code(
                "travelerType",
                TravelerType::from_code,
                TravelerType::CODES,
            ),
            visit_frequency: reader.nullable_code(
                "visitFrequency",
                VisitFrequency::from_code,
                VisitFrequency::CODES,
            ),
            duration: reader.nullable_code("duration", StayDuration::from_code, StayDuration::CODES),
            arrival_method: reader.nullable_code(
                "arrivalMethod",
                ArrivalMethod::from_code,
                ArrivalMethod::CODES,
            ),
            flight_number: reader.nullable_text("flightNumber"),
            airline: reader.nullable_text("airline"),
            ship_name: reader.nullable_text("shipName"),
            shipping_line: reader.nullable_text("shippingLine"),
            arrival_date: reader.nullable_timestamp("arrivalDate"),
            arrival_port: reader.nullable_text("arrivalPort"),
            departure_location: reader.nullable_text("departureLocation"),
            islands: reader.code_list("islands", ISLAND_CODES),
            island_nights: reader.count_map("islandNights"),
            plant_items: read_item_selection(&mut reader, "plantItems", PLANT_CODES),
            animal_items: read_item_selection(&mut reader, "animalItems", ANIMAL_CODES),
            plant_items_description: reader.nullable_text("plantItemsDescription"),
            animal_items_description: reader.nullable_text("animalItemsDescription"),
            hawaii_address: reader.nullable_text("hawaiiAddress"),
            same_as_home_address: reader.flag("sameAsHomeAddress"),
            language,
            user_id,
        };

        reader.finish(patch)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Shallow-merge the patch over `fields`.
    ///
    /// Replacing `islands` without supplying `islandNights` drops nights for
    /// islands that are no longer selected.
    pub fn apply_to(&self, fields: &mut DeclarationFields) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut fields.number_of_people, &self.number_of_people);
        set(&mut fields.traveler_type, &self.traveler_type);
        set(&mut fields.visit_frequency, &self.visit_frequency);
        set(&mut fields.duration, &self.duration);
        set(&mut fields.arrival_method, &self.arrival_method);
        set(&mut fields.flight_number, &self.flight_number);
        set(&mut fields.airline, &self.airline);
        set(&mut fields.ship_name, &self.ship_name);
        set(&mut fields.shipping_line, &self.shipping_line);
        set(&mut fields.arrival_date, &self.arrival_date);
        set(&mut fields.arrival_port, &self.arrival_port);
        set(&mut fields.departure_location, &self.departure_location);
        set(&mut fields.islands, &self.islands);
        set(&mut fields.island_nights, &self.island_nights);
        set(&mut fields.plant_items, &self.plant_items);
        set(&mut fields.animal_items, &self.animal_items);
        set(&mut fields.plant_items_description, &self.plant_items_description);
        set(&mut fields.animal_items_description, &self.animal_items_description);
        set(&mut fields.hawaii_address, &self.hawaii_address);
        set(&mut fields.same_as_home_address, &self.same_as_home_address);
        set(&mut fields.language, &self.language);
        set(&mut fields.user_id, &self.user_id);

        if self.islands.is_some() && self.island_nights.is_none() {
            let islands = &fields.islands;
            fields
                .island_nights
                .retain(|code, _| islands.iter().any(|island| island == code));
        }
    }

    /// Rules that depend on the merged record rather than the patch alone.
    pub fn check_merged(&self, merged: &DeclarationFields) -> Vec<FieldError> {
        if self.island_nights.is_none() {
            return Vec::new();
        }

        merged
            .island_nights
            .keys()
            .filter(|code| !merged.islands.iter().any(|island| island == *code))
            .map(|code| {
                FieldError::new(
                    format!("islandNights.{code}"),
                    "Nights can only be recorded for selected islands",
                )
            })
            .collect()
    }
}

impl From<&DeclarationFields> for DeclarationPatch {
    fn from(fields: &DeclarationFields) -> Self {
        Self {
            number_of_people: Some(fields.number_of_people),
            traveler_type: Some(fields.traveler_type),
            visit_frequency: Some(fields.visit_frequency),
            duration: Some(fields.duration),
            arrival_method: Some(fields.arrival_method),
            flight_number: Some(fields.flight_number.clone()),
            airline: Some(fields.airline.clone()),
            ship_name: Some(fields.ship_name.clone()),
            shipping_line: Some(fields.shipping_line.clone()),
            arrival_date: Some(fields.arrival_date),
            arrival_port: Some(fields.arrival_port.clone()),
            departure_location: Some(fields.departure_location.clone()),
            islands: Some(fields.islands.clone()),
            island_nights: Some(fields.island_nights.clone()),
            plant_items: Some(fields.plant_items.clone()),
            animal_items: Some(fields.animal_items.clone()),
            plant_items_description: Some(fields.plant_items_description.clone()),
            animal_items_description: Some(fields.animal_items_description.clone()),
            hawaii_address: Some(fields.hawaii_address.clone()),
            same_as_home_address: Some(fields.same_as_home_address),
            language: Some(fields.language.clone()),
            user_id: Some(fields.user_id),
        }
    }
}

/// The patch that persists a validated step slice.
///
/// Fields a step normalizes away are cleared rather than left untouched.
impl From<&StepSlice> for DeclarationPatch {
    fn from(slice: &StepSlice) -> Self {
        match slice {
            StepSlice::Welcome {} | StepSlice::ContactInfo(_) | StepSlice::Review(_) => {
                Self::default()
            }
            StepSlice::TravelerInfo(traveler) => Self {
                number_of_people: Some(traveler.number_of_people),
                traveler_type: Some(Some(traveler.traveler_type)),
                visit_frequency: Some(traveler.visit_frequency),
                duration: Some(traveler.duration),
                ..Self::default()
            },
            StepSlice::ArrivalInfo(arrival) => Self {
                arrival_method: Some(Some(arrival.arrival_method)),
                flight_number: Some(arrival.flight_number.clone()),
                airline: Some(arrival.airline.clone()),
                ship_name: Some(arrival.ship_name.clone()),
                shipping_line: Some(arrival.shipping_line.clone()),
                arrival_date: Some(arrival.arrival_date),
                arrival_port: Some(arrival.arrival_port.clone()),
                departure_location: Some(arrival.departure_location.clone()),
                ..Self::default()
            },
            StepSlice::Islands(islands) => Self {
                islands: Some(islands.islands.clone()),
                island_nights: Some(islands.island_nights.clone()),
                ..Self::default()
            },
            StepSlice::PlantItems(plants) => Self {
                plant_items: Some(plants.plant_items.clone()),
                plant_items_description: Some(plants.plant_items_description.clone()),
                ..Self::default()
            },
            StepSlice::AnimalItems(animals) => Self {
                animal_items: Some(animals.animal_items.clone()),
                animal_items_description: Some(animals.animal_items_description.clone()),
                ..Self::default()
            },
            StepSlice::HawaiiAddress(address) => Self {
                hawaii_address: Some(address.hawaii_address.clone()),
                same_as_home_address: Some(address.same_as_home_address),
                ..Self::default()
            },
        }
    }
}
