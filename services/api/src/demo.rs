use crate::infra::{in_memory_service, parse_layout, MemoryDeclarationService};
use ag_declaration::config::AppConfig;
use ag_declaration::declarations::{
    validate_step, ArrivalMethod, ConfirmationSummary, ContactDetails, DeclarationServiceError,
    DeclarationWizard, DraftSummary, FileSnapshotStore, MemorySnapshotStore, SnapshotStore,
    StayDuration, StepLayout, StepValidationError, SubmissionAttestation, TravelerType,
    VisitFrequency, WizardStep, NONE_CODE,
};
use ag_declaration::error::AppError;
use chrono::{Duration, Utc};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Wizard layout to walk (full, standard, compact). Defaults to APP_WIZARD_LAYOUT.
    #[arg(long, value_parser = parse_layout)]
    pub(crate) layout: Option<StepLayout>,
    /// Mirror wizard progress to a snapshot file under APP_SNAPSHOT_DIR.
    #[arg(long)]
    pub(crate) persist_snapshot: bool,
    /// Override the snapshot directory used with --persist-snapshot.
    #[arg(long)]
    pub(crate) snapshot_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ValidateStepArgs {
    /// 1-based step number within the layout
    #[arg(long)]
    pub(crate) step: i64,
    /// JSON file holding the step payload
    #[arg(long)]
    pub(crate) file: PathBuf,
    /// Wizard layout the step number refers to. Defaults to APP_WIZARD_LAYOUT.
    #[arg(long, value_parser = parse_layout)]
    pub(crate) layout: Option<StepLayout>,
}

pub(crate) fn run_validate_step(args: ValidateStepArgs) -> Result<(), AppError> {
    let ValidateStepArgs { step, file, layout } = args;
    let layout = match layout {
        Some(layout) => layout,
        None => AppConfig::load()?.wizard.layout,
    };

    let raw = std::fs::read_to_string(&file)?;
    let payload: serde_json::Value = serde_json::from_str(&raw)?;

    match validate_step(layout, step, &payload) {
        Ok(slice) => {
            println!(
                "Step {step} of the {} layout accepted the payload:",
                layout.as_str()
            );
            println!("{}", serde_json::to_string_pretty(&slice)?);
            Ok(())
        }
        Err(err) => {
            render_step_rejection(&err);
            Err(DeclarationServiceError::from(err).into())
        }
    }
}

fn render_step_rejection(err: &StepValidationError) {
    match err {
        StepValidationError::InvalidStep { .. } => println!("{err}"),
        StepValidationError::Fields(errors) => {
            println!("Payload rejected ({} field errors)", errors.len());
            for error in errors {
                let path = if error.path.is_empty() {
                    "<root>"
                } else {
                    error.path.as_str()
                };
                println!("  - {path}: {}", error.message);
            }
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        layout,
        persist_snapshot,
        snapshot_dir,
    } = args;

    let config = AppConfig::load()?;
    let layout = layout.unwrap_or(config.wizard.layout);
    let store: Arc<dyn SnapshotStore> = if persist_snapshot {
        let dir = snapshot_dir.unwrap_or(config.wizard.snapshot_dir);
        println!("Mirroring wizard progress to {}", dir.display());
        Arc::new(FileSnapshotStore::new(dir))
    } else {
        Arc::new(MemorySnapshotStore::new())
    };

    println!(
        "Agricultural declaration demo ({} layout, {} steps)",
        layout.as_str(),
        layout.total_steps()
    );

    let service = in_memory_service(layout);
    let outcome = walk_wizard(service, layout, store)?;

    for entry in &outcome.trail {
        println!("  {entry}");
    }

    println!("\nDrafts before submission");
    render_drafts(&outcome.drafts_before_submit);

    println!("\nConfirmation");
    let summary = &outcome.confirmation;
    println!("- Declaration #{}", summary.declaration_id);
    println!("  Submitted at: {}", summary.submitted_at.to_rfc3339());
    println!("  Travelers: {}", summary.number_of_people);
    println!("  Items declared: {}", summary.items_declared);
    println!("  Islands: {}", summary.islands.join(", "));
    println!("  Language: {}", summary.language);

    println!("\nDrafts after submission");
    render_drafts(&outcome.drafts_after_submit);

    Ok(())
}

fn render_drafts(drafts: &[DraftSummary]) {
    if drafts.is_empty() {
        println!("  (none)");
        return;
    }
    for draft in drafts {
        let traveler = draft
            .traveler_type
            .map(|value| format!("{value:?}"))
            .unwrap_or_else(|| "unknown traveler".to_string());
        println!(
            "  - #{} {} | {} people | {}% complete | started {}",
            draft.id,
            traveler,
            draft.number_of_people,
            draft.progress_percent,
            draft.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

#[derive(Debug)]
pub(crate) struct DemoOutcome {
    pub(crate) trail: Vec<String>,
    pub(crate) drafts_before_submit: Vec<DraftSummary>,
    pub(crate) confirmation: ConfirmationSummary,
    pub(crate) drafts_after_submit: Vec<DraftSummary>,
}

pub(crate) fn walk_wizard(
    service: Arc<MemoryDeclarationService>,
    layout: StepLayout,
    store: Arc<dyn SnapshotStore>,
) -> Result<DemoOutcome, AppError> {
    let mut wizard = DeclarationWizard::new(service.clone(), layout).with_snapshots(store);
    // A snapshot left by an earlier run points at records this store never saw.
    wizard.reset();

    let mut trail = Vec::with_capacity(usize::from(layout.total_steps()));
    while wizard.current_role() != WizardStep::Review {
        let role = wizard.current_role();
        fill_step(&mut wizard, role)?;
        let position = wizard.current_step();
        let next = wizard.advance()?;
        trail.push(format!(
            "[{position}/{}] {} -> step {next}",
            layout.total_steps(),
            role.label()
        ));
    }

    let drafts_before_submit = service.draft_summaries()?;
    let submitted = wizard.submit(SubmissionAttestation::accepted())?;
    trail.push(format!(
        "[{}/{}] {} -> submitted #{}",
        wizard.current_step(),
        layout.total_steps(),
        WizardStep::Review.label(),
        submitted.id
    ));

    let confirmation = service.confirmation(submitted.id)?;
    let drafts_after_submit = service.draft_summaries()?;

    Ok(DemoOutcome {
        trail,
        drafts_before_submit,
        confirmation,
        drafts_after_submit,
    })
}

fn fill_step(
    wizard: &mut DeclarationWizard<MemoryDeclarationService>,
    role: WizardStep,
) -> Result<(), AppError> {
    match role {
        WizardStep::Welcome | WizardStep::Review => {}
        WizardStep::TravelerInfo => {
            wizard.set_number_of_people(2)?;
            wizard.set_traveler_type(TravelerType::Visitor);
            wizard.set_visit_frequency(VisitFrequency::First);
            wizard.set_duration(StayDuration::Overnight);
        }
        WizardStep::ArrivalInfo => {
            wizard.set_arrival_method(ArrivalMethod::Flight);
            wizard.set_flight("HA11", "Hawaiian Airlines");
            wizard.set_arrival_date(Some(Utc::now() + Duration::days(7)));
            wizard.set_arrival_port("HNL");
        }
        WizardStep::Islands => {
            wizard.toggle_island("oahu")?;
            wizard.toggle_island("maui")?;
            wizard.set_island_nights("oahu", 4)?;
            wizard.set_island_nights("maui", 3)?;
        }
        WizardStep::PlantItems => {
            wizard.toggle_plant_item("flowers-foliage")?;
            wizard.set_plant_description("Lei made with orchids from Oregon");
        }
        WizardStep::AnimalItems => {
            wizard.toggle_animal_item(NONE_CODE)?;
        }
        WizardStep::HawaiiAddress => {
            wizard.set_hawaii_address("2005 Kalia Rd, Honolulu HI 96815");
        }
        WizardStep::ContactInfo => {
            wizard.set_contact(ContactDetails {
                full_name: "Kai Mahoe".to_string(),
                home_address: "44 Alder Way, Portland OR 97205".to_string(),
                phone_number: "5035550148".to_string(),
            });
        }
    }
    Ok(())
}
