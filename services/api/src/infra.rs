use ag_declaration::declarations::{
    DeclarationService, InMemoryContactRepository, InMemoryDeclarationRepository, StepLayout,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type MemoryDeclarationService =
    DeclarationService<InMemoryDeclarationRepository, InMemoryContactRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn in_memory_service(layout: StepLayout) -> Arc<MemoryDeclarationService> {
    Arc::new(DeclarationService::new(
        Arc::new(InMemoryDeclarationRepository::default()),
        Arc::new(InMemoryContactRepository::default()),
        layout,
    ))
}

pub(crate) fn parse_layout(raw: &str) -> Result<StepLayout, String> {
    StepLayout::parse(raw)
        .ok_or_else(|| format!("unknown wizard layout '{raw}' (expected full, standard, or compact)"))
}
