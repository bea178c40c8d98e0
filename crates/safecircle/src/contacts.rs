//! Contact book: merging default and personal contacts.
//!
//! Defaults are institution-provided and never written to storage. Personal
//! contacts live inside the stored [`UserProfile`]. Every read merges the two
//! sets; every write persists only the personal subset.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::contact::{Contact, ContactId, ContactKind, DirectoryEntry, NewContact, UserProfile};
use crate::error::{Error, Result};
use crate::profile::ProfileStore;

/// The built-in default contacts.
#[must_use]
pub fn default_contacts() -> Vec<Contact> {
    vec![
        Contact {
            id: ContactId(1),
            name: "Campus Security".to_string(),
            relationship: "Security".to_string(),
            email: "security@snu.edu.in".to_string(),
        },
        Contact {
            id: ContactId(2),
            name: "University Health Center".to_string(),
            relationship: "Medical".to_string(),
            email: "health.center@snu.edu.in".to_string(),
        },
    ]
}

/// Merge defaults and personal contacts into one directory.
///
/// Defaults come first. Entries whose email (trimmed, case-insensitive) was
/// already seen are dropped, so a default wins over a personal duplicate and
/// the first personal entry wins among personal duplicates.
#[must_use]
pub fn merge_contacts(defaults: &[Contact], personal: &[Contact]) -> Vec<DirectoryEntry> {
    let mut seen = HashSet::new();
    let tagged = defaults
        .iter()
        .map(|c| (c, ContactKind::Default))
        .chain(personal.iter().map(|c| (c, ContactKind::Personal)));

    tagged
        .filter(|(contact, _)| seen.insert(contact.email_key()))
        .map(|(contact, kind)| DirectoryEntry {
            contact: contact.clone(),
            kind,
        })
        .collect()
}

/// Pick an id for a new personal contact.
///
/// Uses the current time in milliseconds, bumped past any id in use.
#[must_use]
pub fn next_contact_id(now_millis: i64, taken: impl IntoIterator<Item = ContactId>) -> ContactId {
    let floor = taken
        .into_iter()
        .map(|id| id.0.saturating_add(1))
        .max()
        .unwrap_or(i64::MIN);
    ContactId(now_millis.max(floor))
}

/// Who an SOS alert goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipients {
    /// Name of the signed-in user.
    pub user_name: String,
    /// Unique recipient addresses, defaults first.
    pub emails: Vec<String>,
}

/// Reads and edits the merged contact directory.
#[derive(Debug, Clone)]
pub struct ContactBook {
    store: Arc<dyn ProfileStore>,
    defaults: Vec<Contact>,
}

impl ContactBook {
    /// Create a contact book with the built-in defaults.
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self::with_defaults(store, default_contacts())
    }

    /// Create a contact book with custom defaults.
    pub fn with_defaults(store: Arc<dyn ProfileStore>, defaults: Vec<Contact>) -> Self {
        Self { store, defaults }
    }

    /// The default contacts.
    #[must_use]
    pub fn defaults(&self) -> &[Contact] {
        &self.defaults
    }

    /// The underlying profile store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    fn is_default(&self, id: ContactId) -> bool {
        self.defaults.iter().any(|c| c.id == id)
    }

    fn require_profile(&self) -> Result<UserProfile> {
        self.store.load()?.ok_or(Error::NotSignedIn)
    }

    /// The merged directory. Shows only defaults when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be read.
    pub fn list(&self) -> Result<Vec<DirectoryEntry>> {
        let personal = self
            .store
            .load()?
            .map(|p| p.emergency_contacts)
            .unwrap_or_default();
        Ok(merge_contacts(&self.defaults, &personal))
    }

    /// Resolve alert recipients, or `None` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be read.
    pub fn resolve_recipients(&self) -> Result<Option<Recipients>> {
        let Some(profile) = self.store.load()? else {
            return Ok(None);
        };

        let emails = merge_contacts(&self.defaults, &profile.emergency_contacts)
            .into_iter()
            .map(|entry| entry.contact.email)
            .collect();

        Ok(Some(Recipients {
            user_name: profile.name,
            emails,
        }))
    }

    /// Add a personal contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the form is invalid, nobody is signed in, or the
    /// write fails.
    pub fn add(&self, form: NewContact) -> Result<Contact> {
        form.validate()?;
        let mut profile = self.require_profile()?;

        let taken = self
            .defaults
            .iter()
            .chain(&profile.emergency_contacts)
            .map(|c| c.id);
        let id = next_contact_id(Utc::now().timestamp_millis(), taken);

        let contact = Contact::new(id, form);
        profile.emergency_contacts.push(contact.clone());
        self.store.save(&profile)?;

        info!(id = %contact.id, "Emergency contact added");
        Ok(contact)
    }

    /// Replace a personal contact's fields.
    ///
    /// # Errors
    ///
    /// Refuses default contacts. Otherwise returns an error if the form is
    /// invalid, nobody is signed in, the id is unknown, or the write fails.
    pub fn update(&self, id: ContactId, form: NewContact) -> Result<Contact> {
        if self.is_default(id) {
            debug!(%id, "Refusing to edit default contact");
            return Err(Error::DefaultContactImmutable {
                id,
                action: "edited",
            });
        }
        form.validate()?;
        let mut profile = self.require_profile()?;

        let slot = profile
            .emergency_contacts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(Error::ContactNotFound { id })?;
        *slot = Contact::new(id, form);
        let updated = slot.clone();

        self.store.save(&profile)?;
        info!(%id, "Emergency contact updated");
        Ok(updated)
    }

    /// Delete a personal contact, returning it.
    ///
    /// # Errors
    ///
    /// Refuses default contacts without writing. Otherwise returns an error if
    /// nobody is signed in, the id is unknown, or the write fails.
    pub fn delete(&self, id: ContactId) -> Result<Contact> {
        if self.is_default(id) {
            debug!(%id, "Refusing to delete default contact");
            return Err(Error::DefaultContactImmutable {
                id,
                action: "deleted",
            });
        }
        let mut profile = self.require_profile()?;

        let index = profile
            .emergency_contacts
            .iter()
            .position(|c| c.id == id)
            .ok_or(Error::ContactNotFound { id })?;
        let removed = profile.emergency_contacts.remove(index);

        self.store.save(&profile)?;
        info!(%id, "Emergency contact removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::StoredProfileStore;
    use crate::storage::Storage;

    fn contact(id: i64, email: &str) -> Contact {
        Contact {
            id: ContactId(id),
            name: format!("Contact {id}"),
            relationship: "Friend".to_string(),
            email: email.to_string(),
        }
    }

    fn book() -> ContactBook {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        ContactBook::new(Arc::new(StoredProfileStore::new(storage)))
    }

    fn signed_in_book() -> ContactBook {
        let book = book();
        let profile = UserProfile::signup(
            "Alex",
            NewContact::new("Mom", "Mother", "mom@example.com"),
            ContactId(100),
        )
        .unwrap();
        book.store().save(&profile).unwrap();
        book
    }

    #[test]
    fn test_merge_defaults_first() {
        let merged = merge_contacts(&default_contacts(), &[contact(10, "a@example.com")]);
        let kinds: Vec<_> = merged.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ContactKind::Default,
                ContactKind::Default,
                ContactKind::Personal
            ]
        );
    }

    #[test]
    fn test_merge_default_wins_on_overlap() {
        let personal = [contact(10, "  SECURITY@snu.edu.in ")];
        let merged = merge_contacts(&default_contacts(), &personal);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].contact.name, "Campus Security");
        assert_eq!(merged[0].kind, ContactKind::Default);
    }

    #[test]
    fn test_merge_first_personal_wins() {
        let personal = [contact(10, "x@example.com"), contact(11, "X@example.com")];
        let merged = merge_contacts(&[], &personal);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].contact.id, ContactId(10));
    }

    #[test]
    fn test_merge_idempotent() {
        let personal = [contact(10, "a@example.com"), contact(11, "b@example.com")];
        let once = merge_contacts(&default_contacts(), &personal);

        let once_contacts: Vec<Contact> = once.iter().map(|e| e.contact.clone()).collect();
        let twice = merge_contacts(&default_contacts(), &once_contacts);
        let twice_contacts: Vec<Contact> = twice.iter().map(|e| e.contact.clone()).collect();
        assert_eq!(once_contacts, twice_contacts);
    }

    #[test]
    fn test_next_contact_id() {
        assert_eq!(next_contact_id(500, []), ContactId(500));
        assert_eq!(
            next_contact_id(500, [ContactId(1), ContactId(500)]),
            ContactId(501)
        );
        assert_eq!(next_contact_id(500, [ContactId(2)]), ContactId(500));
    }

    #[test]
    fn test_list_without_profile_shows_defaults() {
        let entries = book().list().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.kind == ContactKind::Default));
    }

    #[test]
    fn test_resolve_recipients() {
        assert!(book().resolve_recipients().unwrap().is_none());

        let recipients = signed_in_book().resolve_recipients().unwrap().unwrap();
        assert_eq!(recipients.user_name, "Alex");
        assert_eq!(
            recipients.emails,
            vec![
                "security@snu.edu.in",
                "health.center@snu.edu.in",
                "mom@example.com"
            ]
        );
    }

    #[test]
    fn test_add_requires_sign_in() {
        let err = book()
            .add(NewContact::new("Dad", "Father", "dad@example.com"))
            .unwrap_err();
        assert!(err.is_not_signed_in());
    }

    #[test]
    fn test_add_validates_before_write() {
        let book = signed_in_book();
        let err = book
            .add(NewContact::new("D", "Father", "dad@example.com"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(book.list().unwrap().len(), 3);
    }

    #[test]
    fn test_add_persists_personal_only() {
        let book = signed_in_book();
        let added = book
            .add(NewContact::new("Dad", "Father", "dad@example.com"))
            .unwrap();
        assert!(added.id > ContactId(100));

        let stored = book.store().load().unwrap().unwrap();
        assert_eq!(stored.emergency_contacts.len(), 2);
        assert!(stored
            .emergency_contacts
            .iter()
            .all(|c| !c.email.ends_with("snu.edu.in")));
    }

    #[test]
    fn test_delete_default_is_refused_without_write() {
        let book = signed_in_book();
        let mut rx = book.store().subscribe();
        rx.borrow_and_update();
        let before = book.store().load().unwrap();

        let err = book.delete(ContactId(1)).unwrap_err();
        assert!(err.is_refusal());
        assert_eq!(err.to_string(), "default contacts cannot be deleted");
        assert_eq!(book.store().load().unwrap(), before);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_edit_default_is_refused() {
        let err = signed_in_book()
            .update(
                ContactId(2),
                NewContact::new("Clinic", "Medical", "clinic@example.com"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DefaultContactImmutable {
                action: "edited",
                ..
            }
        ));
    }

    #[test]
    fn test_update_personal() {
        let book = signed_in_book();
        let updated = book
            .update(
                ContactId(100),
                NewContact::new("Mum", "Mother", "mum@example.com"),
            )
            .unwrap();
        assert_eq!(updated.id, ContactId(100));

        let stored = book.store().load().unwrap().unwrap();
        assert_eq!(stored.emergency_contacts[0].email, "mum@example.com");
    }

    #[test]
    fn test_delete_personal_and_unknown() {
        let book = signed_in_book();
        let removed = book.delete(ContactId(100)).unwrap();
        assert_eq!(removed.email, "mom@example.com");
        assert_eq!(book.list().unwrap().len(), 2);

        let err = book.delete(ContactId(100)).unwrap_err();
        assert!(matches!(err, Error::ContactNotFound { .. }));
    }
}
