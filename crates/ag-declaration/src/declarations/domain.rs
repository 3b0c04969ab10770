use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel item code meaning "nothing to declare in this category".
pub const NONE_CODE: &str = "none";

pub const ISLAND_CODES: &[&str] = &["oahu", "maui", "hawaii", "kauai", "molokai", "lanai"];

pub const PLANT_CODES: &[&str] = &[
    "fruits-vegetables",
    "flowers-foliage",
    "plants-cuttings",
    "seeds-bulbs",
    "soil-media",
    "microorganisms",
];

pub const ANIMAL_CODES: &[&str] = &[
    "dogs",
    "cats",
    "birds",
    "seafood",
    "reptiles",
    "other-animals",
];

pub const LANGUAGE_CODES: &[&str] = &["en", "es", "tl", "ja", "ko", "zh"];

pub const DEFAULT_LANGUAGE: &str = "en";

pub const MAX_TRAVELERS: u8 = 10;

/// Store-assigned identifier for a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclarationId(pub i64);

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned identifier for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Residency relationship of the travel party to the islands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelerType {
    Visitor,
    Resident,
    Moving,
}

impl TravelerType {
    pub const CODES: &'static [&'static str] = &["visitor", "resident", "moving"];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "visitor" => Some(Self::Visitor),
            "resident" => Some(Self::Resident),
            "moving" => Some(Self::Moving),
            _ => None,
        }
    }

    /// Visitors and people relocating must state visit frequency and duration.
    pub const fn requires_visit_details(self) -> bool {
        matches!(self, Self::Visitor | Self::Moving)
    }
}

/// How many times the traveler has visited, as an ordinal bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitFrequency {
    #[serde(rename = "1st")]
    First,
    #[serde(rename = "2nd")]
    Second,
    #[serde(rename = "3rd")]
    Third,
    #[serde(rename = "4th")]
    Fourth,
    #[serde(rename = "5th")]
    Fifth,
    #[serde(rename = "6-10")]
    SixToTen,
    #[serde(rename = "10+")]
    MoreThanTen,
}

impl VisitFrequency {
    pub const CODES: &'static [&'static str] = &["1st", "2nd", "3rd", "4th", "5th", "6-10", "10+"];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1st" => Some(Self::First),
            "2nd" => Some(Self::Second),
            "3rd" => Some(Self::Third),
            "4th" => Some(Self::Fourth),
            "5th" => Some(Self::Fifth),
            "6-10" => Some(Self::SixToTen),
            "10+" => Some(Self::MoreThanTen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StayDuration {
    Hours,
    Overnight,
}

impl StayDuration {
    pub const CODES: &'static [&'static str] = &["hours", "overnight"];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "hours" => Some(Self::Hours),
            "overnight" => Some(Self::Overnight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalMethod {
    Flight,
    Ship,
    Other,
}

impl ArrivalMethod {
    pub const CODES: &'static [&'static str] = &["flight", "ship", "other"];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "flight" => Some(Self::Flight),
            "ship" => Some(Self::Ship),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Vessels must name where they sailed from; flights do not.
    pub const fn requires_departure_location(self) -> bool {
        matches!(self, Self::Ship | Self::Other)
    }
}

/// Multi-select of category codes where [`NONE_CODE`] excludes every other code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemSelection(Vec<String>);

impl ItemSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn none_declared() -> Self {
        Self(vec![NONE_CODE.to_string()])
    }

    /// Build a selection from stored codes; the caller is responsible for validation.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selection = Self::default();
        for code in codes {
            let code = code.into();
            if !selection.0.contains(&code) {
                selection.0.push(code);
            }
        }
        selection
    }

    /// Select or deselect a code, keeping the sentinel mutually exclusive.
    pub fn toggle(&mut self, code: &str) {
        if let Some(position) = self.0.iter().position(|existing| existing == code) {
            self.0.remove(position);
            return;
        }

        if code == NONE_CODE {
            self.0.clear();
        } else {
            self.0.retain(|existing| existing != NONE_CODE);
        }
        self.0.push(code.to_string());
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|existing| existing == code)
    }

    pub fn contains_none(&self) -> bool {
        self.contains(NONE_CODE)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    /// Codes other than the sentinel.
    pub fn declared(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .map(String::as_str)
            .filter(|code| *code != NONE_CODE)
    }

    pub fn has_declared_items(&self) -> bool {
        self.declared().next().is_some()
    }
}

/// Every user-editable attribute of a declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeclarationFields {
    pub number_of_people: u8,
    pub traveler_type: Option<TravelerType>,
    pub visit_frequency: Option<VisitFrequency>,
    pub duration: Option<StayDuration>,
    pub arrival_method: Option<ArrivalMethod>,
    pub flight_number: Option<String>,
    pub airline: Option<String>,
    pub ship_name: Option<String>,
    pub shipping_line: Option<String>,
    pub arrival_date: Option<DateTime<Utc>>,
    pub arrival_port: Option<String>,
    pub departure_location: Option<String>,
    pub islands: Vec<String>,
    pub island_nights: BTreeMap<String, u32>,
    pub plant_items: ItemSelection,
    pub animal_items: ItemSelection,
    pub plant_items_description: Option<String>,
    pub animal_items_description: Option<String>,
    pub hawaii_address: Option<String>,
    pub same_as_home_address: bool,
    pub language: String,
    pub user_id: Option<ContactId>,
}

impl Default for DeclarationFields {
    fn default() -> Self {
        Self {
            number_of_people: 1,
            traveler_type: None,
            visit_frequency: None,
            duration: None,
            arrival_method: None,
            flight_number: None,
            airline: None,
            ship_name: None,
            shipping_line: None,
            arrival_date: None,
            arrival_port: None,
            departure_location: None,
            islands: Vec::new(),
            island_nights: BTreeMap::new(),
            plant_items: ItemSelection::default(),
            animal_items: ItemSelection::default(),
            plant_items_description: None,
            animal_items_description: None,
            hawaii_address: None,
            same_as_home_address: false,
            language: DEFAULT_LANGUAGE.to_string(),
            user_id: None,
        }
    }
}

impl DeclarationFields {
    /// Number of plant and animal categories declared, ignoring the sentinel.
    pub fn declared_item_count(&self) -> usize {
        self.plant_items.declared().count() + self.animal_items.declared().count()
    }

    /// Clear conditional fields the current answers make inapplicable: visit
    /// details for residents and the departure location for flights.
    pub fn drop_inapplicable_details(&mut self) {
        if self
            .traveler_type
            .is_some_and(|traveler| !traveler.requires_visit_details())
        {
            self.visit_frequency = None;
            self.duration = None;
        }
        if self.arrival_method == Some(ArrivalMethod::Flight) {
            self.departure_location = None;
        }
    }
}

/// A persisted declaration, draft or submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    pub id: DeclarationId,
    #[serde(flatten)]
    pub fields: DeclarationFields,
    pub is_submitted: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

impl Declaration {
    pub fn is_draft(&self) -> bool {
        !self.is_submitted
    }
}

/// Reusable identity details, keyed naturally by phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub full_name: String,
    pub home_address: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact details as entered on the contact step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactDetails {
    pub full_name: String,
    pub home_address: String,
    pub phone_number: String,
}

impl ContactDetails {
    pub fn is_complete(&self) -> bool {
        [&self.full_name, &self.home_address, &self.phone_number]
            .iter()
            .all(|value| !value.trim().is_empty())
    }
}

impl From<&Contact> for ContactDetails {
    fn from(contact: &Contact) -> Self {
        Self {
            full_name: contact.full_name.clone(),
            home_address: contact.home_address.clone(),
            phone_number: contact.phone_number.clone(),
        }
    }
}

/// The two acknowledgements collected on the review step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAttestation {
    pub certification_accepted: bool,
    pub inspection_understood: bool,
}

impl SubmissionAttestation {
    pub const fn accepted() -> Self {
        Self {
            certification_accepted: true,
            inspection_understood: true,
        }
    }
}

/// Snapshot of a submitted declaration handed to receipt rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationSummary {
    pub declaration_id: DeclarationId,
    pub submitted_at: DateTime<Utc>,
    pub number_of_people: u8,
    pub items_declared: usize,
    pub islands: Vec<String>,
    pub language: String,
}

impl ConfirmationSummary {
    /// Returns `None` for drafts.
    pub fn from_declaration(declaration: &Declaration) -> Option<Self> {
        let submitted_at = declaration.submitted_at?;
        if !declaration.is_submitted {
            return None;
        }

        Some(Self {
            declaration_id: declaration.id,
            submitted_at,
            number_of_people: declaration.fields.number_of_people,
            items_declared: declaration.fields.declared_item_count(),
            islands: declaration.fields.islands.clone(),
            language: declaration.fields.language.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn residents_and_flights_drop_conditional_details() {
        let mut fields = DeclarationFields {
            traveler_type: Some(TravelerType::Resident),
            visit_frequency: Some(VisitFrequency::Second),
            duration: Some(StayDuration::Hours),
            arrival_method: Some(ArrivalMethod::Flight),
            departure_location: Some("Los Angeles".to_string()),
            ..DeclarationFields::default()
        };
        fields.drop_inapplicable_details();

        assert_eq!(fields.visit_frequency, None);
        assert_eq!(fields.duration, None);
        assert_eq!(fields.departure_location, None);

        let mut visitor = DeclarationFields {
            traveler_type: Some(TravelerType::Visitor),
            visit_frequency: Some(VisitFrequency::First),
            arrival_method: Some(ArrivalMethod::Ship),
            departure_location: Some("Vancouver".to_string()),
            ..DeclarationFields::default()
        };
        visitor.drop_inapplicable_details();
        assert_eq!(visitor.visit_frequency, Some(VisitFrequency::First));
        assert_eq!(visitor.departure_location.as_deref(), Some("Vancouver"));
    }

    #[test]
    fn selecting_none_clears_other_codes() {
        let mut selection = ItemSelection::from_codes(["dogs", "cats"]);
        selection.toggle(NONE_CODE);
        assert_eq!(selection.codes(), &[NONE_CODE.to_string()]);
    }

    #[test]
    fn selecting_a_code_removes_none() {
        let mut selection = ItemSelection::none_declared();
        selection.toggle("birds");
        assert_eq!(selection.codes(), &["birds".to_string()]);
        assert!(!selection.contains_none());
    }

    #[test]
    fn toggling_twice_deselects() {
        let mut selection = ItemSelection::new();
        selection.toggle("seafood");
        selection.toggle("seafood");
        assert!(selection.is_empty());
    }

    #[test]
    fn declared_item_count_ignores_sentinel() {
        let fields = DeclarationFields {
            plant_items: ItemSelection::from_codes(["seeds-bulbs", "soil-media"]),
            animal_items: ItemSelection::none_declared(),
            ..DeclarationFields::default()
        };
        assert_eq!(fields.declared_item_count(), 2);
    }

    #[test]
    fn declaration_serializes_with_camel_case_keys() {
        let declaration = Declaration {
            id: DeclarationId(7),
            fields: DeclarationFields::default(),
            is_submitted: false,
            submitted_at: None,
            created_at: Utc::now(),
            version: 1,
        };
        let json = serde_json::to_value(&declaration).expect("serializes");
        assert_eq!(json["id"], 7);
        assert_eq!(json["numberOfPeople"], 1);
        assert_eq!(json["language"], "en");
        assert_eq!(json["isSubmitted"], false);
        assert!(json["submittedAt"].is_null());
        assert_eq!(json["plantItems"], serde_json::json!([]));
    }
}
