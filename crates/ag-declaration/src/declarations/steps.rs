use serde::{Deserialize, Serialize};

/// Role of one wizard screen. The numeric position depends on the active [`StepLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Welcome,
    TravelerInfo,
    ArrivalInfo,
    Islands,
    PlantItems,
    AnimalItems,
    HawaiiAddress,
    ContactInfo,
    Review,
}

impl WizardStep {
    pub const fn label(self) -> &'static str {
        match self {
            WizardStep::Welcome => "Welcome",
            WizardStep::TravelerInfo => "Traveler Information",
            WizardStep::ArrivalInfo => "Arrival Information",
            WizardStep::Islands => "Island Destinations",
            WizardStep::PlantItems => "Plant Items",
            WizardStep::AnimalItems => "Animal Items",
            WizardStep::HawaiiAddress => "Hawaii Address",
            WizardStep::ContactInfo => "Contact Information",
            WizardStep::Review => "Review & Certify",
        }
    }

    /// Steps that collect declaration data, as opposed to the welcome and review screens.
    pub const fn collects_fields(self) -> bool {
        !matches!(self, WizardStep::Welcome | WizardStep::Review)
    }
}

/// The step sets the wizard has shipped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepLayout {
    /// Nine steps including Hawaii address and contact details.
    Full,
    /// Seven steps, without address and contact screens.
    Standard,
    /// Six steps, without arrival information.
    Compact,
}

const FULL_STEPS: &[WizardStep] = &[
    WizardStep::Welcome,
    WizardStep::TravelerInfo,
    WizardStep::ArrivalInfo,
    WizardStep::Islands,
    WizardStep::PlantItems,
    WizardStep::AnimalItems,
    WizardStep::HawaiiAddress,
    WizardStep::ContactInfo,
    WizardStep::Review,
];

const STANDARD_STEPS: &[WizardStep] = &[
    WizardStep::Welcome,
    WizardStep::TravelerInfo,
    WizardStep::ArrivalInfo,
    WizardStep::Islands,
    WizardStep::PlantItems,
    WizardStep::AnimalItems,
    WizardStep::Review,
];

const COMPACT_STEPS: &[WizardStep] = &[
    WizardStep::Welcome,
    WizardStep::TravelerInfo,
    WizardStep::Islands,
    WizardStep::PlantItems,
    WizardStep::AnimalItems,
    WizardStep::Review,
];

impl Default for StepLayout {
    fn default() -> Self {
        Self::Full
    }
}

impl StepLayout {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Some(Self::Full),
            "standard" => Some(Self::Standard),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            StepLayout::Full => "full",
            StepLayout::Standard => "standard",
            StepLayout::Compact => "compact",
        }
    }

    pub const fn steps(self) -> &'static [WizardStep] {
        match self {
            StepLayout::Full => FULL_STEPS,
            StepLayout::Standard => STANDARD_STEPS,
            StepLayout::Compact => COMPACT_STEPS,
        }
    }

    pub const fn total_steps(self) -> u8 {
        self.steps().len() as u8
    }

    /// Resolve a 1-based step index.
    pub fn step(self, index: u8) -> Option<WizardStep> {
        let position = usize::from(index).checked_sub(1)?;
        self.steps().get(position).copied()
    }

    /// 1-based index of a step role, if the layout contains it.
    pub fn index_of(self, step: WizardStep) -> Option<u8> {
        self.steps()
            .iter()
            .position(|candidate| *candidate == step)
            .map(|position| position as u8 + 1)
    }

    pub fn contains(self, step: WizardStep) -> bool {
        self.index_of(step).is_some()
    }
}
