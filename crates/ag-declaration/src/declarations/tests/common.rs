use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::declarations::domain::{
    Contact, ContactDetails, ContactId, Declaration, DeclarationId,
};
use crate::declarations::repository::{
    ContactRepository, DeclarationRepository, NewDeclaration, RepositoryError,
};
use crate::declarations::snapshot::{SnapshotError, SnapshotStore};
use crate::declarations::{
    declaration_router, DeclarationService, InMemoryContactRepository,
    InMemoryDeclarationRepository, StepLayout,
};

pub(super) type MemoryService =
    DeclarationService<InMemoryDeclarationRepository, InMemoryContactRepository>;

pub(super) fn build_service(layout: StepLayout) -> (MemoryService, Arc<InMemoryDeclarationRepository>) {
    let declarations = Arc::new(InMemoryDeclarationRepository::default());
    let contacts = Arc::new(InMemoryContactRepository::default());
    let service = DeclarationService::new(declarations.clone(), contacts, layout);
    (service, declarations)
}

pub(super) fn router_with_service(service: MemoryService) -> axum::Router {
    declaration_router(Arc::new(service))
}

pub(super) fn contact_payload() -> Value {
    json!({
        "fullName": "Leilani Akana",
        "homeAddress": "410 Mission St, San Francisco CA",
        "phoneNumber": "4155550123",
    })
}

pub(super) fn contact_details() -> ContactDetails {
    ContactDetails {
        full_name: "Leilani Akana".to_string(),
        home_address: "410 Mission St, San Francisco CA".to_string(),
        phone_number: "4155550123".to_string(),
    }
}

pub(super) fn attestation() -> Value {
    json!({ "certificationAccepted": true, "inspectionUnderstood": true })
}

pub(super) fn paths(errors: &[crate::declarations::FieldError]) -> Vec<&str> {
    errors.iter().map(|error| error.path.as_str()).collect()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct UnavailableRepository;

impl DeclarationRepository for UnavailableRepository {
    fn insert(&self, _record: NewDeclaration) -> Result<Declaration, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: Declaration, _expected_version: u64) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: DeclarationId) -> Result<Option<Declaration>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_draft(&self, _id: DeclarationId) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn drafts(&self) -> Result<Vec<Declaration>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl ContactRepository for UnavailableRepository {
    fn insert(
        &self,
        _details: ContactDetails,
        _now: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _contact: Contact) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: ContactId) -> Result<Option<Contact>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_phone(&self, _phone_number: &str) -> Result<Option<Contact>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Declaration store that holds the first `readers` fetches at a barrier, so
/// concurrent callers all read the same version before any of them writes.
pub(super) struct RacingRepository {
    inner: InMemoryDeclarationRepository,
    held: AtomicUsize,
    barrier: Barrier,
}

impl RacingRepository {
    pub(super) fn new(readers: usize) -> Self {
        Self {
            inner: InMemoryDeclarationRepository::default(),
            held: AtomicUsize::new(readers),
            barrier: Barrier::new(readers),
        }
    }
}

impl DeclarationRepository for RacingRepository {
    fn insert(&self, record: NewDeclaration) -> Result<Declaration, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: Declaration, expected_version: u64) -> Result<(), RepositoryError> {
        self.inner.update(record, expected_version)
    }

    fn fetch(&self, id: DeclarationId) -> Result<Option<Declaration>, RepositoryError> {
        let record = self.inner.fetch(id)?;
        let hold = self
            .held
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if hold {
            self.barrier.wait();
        }
        Ok(record)
    }

    fn delete_draft(&self, id: DeclarationId) -> Result<bool, RepositoryError> {
        self.inner.delete_draft(id)
    }

    fn drafts(&self) -> Result<Vec<Declaration>, RepositoryError> {
        self.inner.drafts()
    }
}

pub(super) fn racing_service(
    readers: usize,
) -> DeclarationService<RacingRepository, InMemoryContactRepository> {
    DeclarationService::new(
        Arc::new(RacingRepository::new(readers)),
        Arc::new(InMemoryContactRepository::default()),
        StepLayout::Full,
    )
}

/// Snapshot store whose writes always fail.
#[derive(Default)]
pub(super) struct ReadOnlySnapshots {
    pub(super) attempts: Mutex<usize>,
}

impl SnapshotStore for ReadOnlySnapshots {
    fn load(&self, _key: &str) -> Result<Option<String>, SnapshotError> {
        Ok(None)
    }

    fn save(&self, _key: &str, _contents: &str) -> Result<(), SnapshotError> {
        *self.attempts.lock().expect("attempts mutex poisoned") += 1;
        Err(SnapshotError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only volume",
        )))
    }

    fn clear(&self, _key: &str) -> Result<(), SnapshotError> {
        Ok(())
    }
}
