use chrono::{DateTime, Utc};

use super::domain::{Contact, ContactDetails, ContactId, Declaration, DeclarationFields, DeclarationId};

/// Values for a declaration that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeclaration {
    pub fields: DeclarationFields,
    pub created_at: DateTime<Utc>,
}

/// Storage abstraction for declarations so the service can be exercised in isolation.
pub trait DeclarationRepository: Send + Sync {
    /// Persist a new record, assigning its id. Version starts at 1.
    fn insert(&self, record: NewDeclaration) -> Result<Declaration, RepositoryError>;
    /// Replace a stored record wholesale, provided the stored version still
    /// equals `expected_version`. The check and the write happen atomically.
    fn update(&self, record: Declaration, expected_version: u64) -> Result<(), RepositoryError>;
    fn fetch(&self, id: DeclarationId) -> Result<Option<Declaration>, RepositoryError>;
    /// Remove a record only while it is unsubmitted. Returns whether a row was removed.
    fn delete_draft(&self, id: DeclarationId) -> Result<bool, RepositoryError>;
    /// Unsubmitted records, newest first.
    fn drafts(&self) -> Result<Vec<Declaration>, RepositoryError>;
}

/// Storage abstraction for contacts, keyed naturally by phone number.
pub trait ContactRepository: Send + Sync {
    fn insert(
        &self,
        details: ContactDetails,
        now: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError>;
    fn update(&self, contact: Contact) -> Result<(), RepositoryError>;
    fn fetch(&self, id: ContactId) -> Result<Option<Contact>, RepositoryError>;
    fn find_by_phone(&self, phone_number: &str) -> Result<Option<Contact>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record was modified concurrently and is now at version {current}")]
    Stale { current: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
