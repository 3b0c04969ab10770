use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{Contact, ContactDetails, ContactId, Declaration, DeclarationId};
use super::repository::{
    ContactRepository, DeclarationRepository, NewDeclaration, RepositoryError,
};

#[derive(Default)]
struct DeclarationTable {
    next_id: i64,
    rows: BTreeMap<DeclarationId, Declaration>,
}

/// Process-local declaration store with serial ids.
#[derive(Default, Clone)]
pub struct InMemoryDeclarationRepository {
    table: Arc<Mutex<DeclarationTable>>,
}

impl InMemoryDeclarationRepository {
    fn lock(&self) -> Result<MutexGuard<'_, DeclarationTable>, RepositoryError> {
        self.table
            .lock()
            .map_err(|_| RepositoryError::Unavailable("declaration table lock poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|table| table.rows.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeclarationRepository for InMemoryDeclarationRepository {
    fn insert(&self, record: NewDeclaration) -> Result<Declaration, RepositoryError> {
        let mut table = self.lock()?;
        table.next_id += 1;
        let id = DeclarationId(table.next_id);
        let declaration = Declaration {
            id,
            fields: record.fields,
            is_submitted: false,
            submitted_at: None,
            created_at: record.created_at,
            version: 1,
        };
        table.rows.insert(id, declaration.clone());
        Ok(declaration)
    }

    fn update(&self, record: Declaration, expected_version: u64) -> Result<(), RepositoryError> {
        let mut table = self.lock()?;
        match table.rows.get_mut(&record.id) {
            Some(stored) if stored.version != expected_version => Err(RepositoryError::Stale {
                current: stored.version,
            }),
            Some(stored) => {
                *stored = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: DeclarationId) -> Result<Option<Declaration>, RepositoryError> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    fn delete_draft(&self, id: DeclarationId) -> Result<bool, RepositoryError> {
        let mut table = self.lock()?;
        if !table.rows.get(&id).is_some_and(Declaration::is_draft) {
            return Ok(false);
        }
        Ok(table.rows.remove(&id).is_some())
    }

    fn drafts(&self) -> Result<Vec<Declaration>, RepositoryError> {
        let table = self.lock()?;
        let mut drafts: Vec<Declaration> = table
            .rows
            .values()
            .filter(|declaration| declaration.is_draft())
            .cloned()
            .collect();
        // Ids break ties between records created within the same instant.
        drafts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(drafts)
    }
}

#[derive(Default)]
struct ContactTable {
    next_id: i64,
    rows: BTreeMap<ContactId, Contact>,
}

/// Process-local contact store with serial ids.
#[derive(Default, Clone)]
pub struct InMemoryContactRepository {
    table: Arc<Mutex<ContactTable>>,
}

impl InMemoryContactRepository {
    fn lock(&self) -> Result<MutexGuard<'_, ContactTable>, RepositoryError> {
        self.table
            .lock()
            .map_err(|_| RepositoryError::Unavailable("contact table lock poisoned".into()))
    }
}

impl ContactRepository for InMemoryContactRepository {
    fn insert(
        &self,
        details: ContactDetails,
        now: DateTime<Utc>,
    ) -> Result<Contact, RepositoryError> {
        let mut table = self.lock()?;
        if table
            .rows
            .values()
            .any(|contact| contact.phone_number == details.phone_number)
        {
            return Err(RepositoryError::Conflict);
        }

        table.next_id += 1;
        let contact = Contact {
            id: ContactId(table.next_id),
            full_name: details.full_name,
            home_address: details.home_address,
            phone_number: details.phone_number,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(contact.id, contact.clone());
        Ok(contact)
    }

    fn update(&self, contact: Contact) -> Result<(), RepositoryError> {
        let mut table = self.lock()?;
        match table.rows.get_mut(&contact.id) {
            Some(stored) => {
                *stored = contact;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: ContactId) -> Result<Option<Contact>, RepositoryError> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    fn find_by_phone(&self, phone_number: &str) -> Result<Option<Contact>, RepositoryError> {
        Ok(self
            .lock()?
            .rows
            .values()
            .find(|contact| contact.phone_number == phone_number)
            .cloned())
    }
}
