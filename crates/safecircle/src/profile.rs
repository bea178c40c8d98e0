//! Persisted user profile.
//!
//! The profile lives as JSON under a single local-storage key. Reads are
//! validated at the boundary: stored contacts that are missing fields or
//! carry an invalid email are skipped with a warning instead of failing the
//! whole load. Writes are validated and rejected.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::contact::{Contact, UserProfile};
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Local-storage key holding the signed-in user.
pub const PROFILE_KEY: &str = "safeCircleUser";

/// Access to the stored user profile.
///
/// Injected into the contact book and the SOS controller so tests can swap
/// in their own stores.
pub trait ProfileStore: Send + Sync + Debug {
    /// Load the stored profile, or `None` when no user has signed up.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the record is corrupt.
    fn load(&self) -> Result<Option<UserProfile>>;

    /// Overwrite the stored profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is invalid or cannot be written.
    fn save(&self, profile: &UserProfile) -> Result<()>;

    /// Watch the stored profile. Subscribers wake only on real changes.
    fn subscribe(&self) -> watch::Receiver<Option<UserProfile>>;
}

/// On-disk shape of the profile, with contacts left untyped so one bad
/// record doesn't poison the rest.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProfile {
    name: String,
    #[serde(default)]
    emergency_contacts: Vec<serde_json::Value>,
}

/// Decode a stored profile, skipping invalid contacts.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or has no name.
pub fn decode_profile(raw: &str) -> Result<UserProfile> {
    let stored: StoredProfile = serde_json::from_str(raw)?;

    let mut emergency_contacts = Vec::with_capacity(stored.emergency_contacts.len());
    for (index, value) in stored.emergency_contacts.into_iter().enumerate() {
        let contact = match serde_json::from_value::<Contact>(value) {
            Ok(contact) => contact,
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed stored contact");
                continue;
            }
        };
        if let Err(e) = contact.check() {
            warn!(index, id = %contact.id, error = %e, "Skipping invalid stored contact");
            continue;
        }
        emergency_contacts.push(contact);
    }

    Ok(UserProfile {
        name: stored.name,
        emergency_contacts,
    })
}

fn validate_for_write(profile: &UserProfile) -> Result<()> {
    UserProfile::validate_name(&profile.name)?;
    for contact in &profile.emergency_contacts {
        contact.check()?;
    }
    Ok(())
}

/// A [`ProfileStore`] backed by [`Storage`].
#[derive(Debug)]
pub struct StoredProfileStore {
    storage: Arc<Storage>,
    /// Hash of the last record seen, for change detection.
    last_hash: Mutex<Option<blake3::Hash>>,
    tx: watch::Sender<Option<UserProfile>>,
}

impl StoredProfileStore {
    /// Create a store over `storage`, seeding subscribers with the current record.
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        let raw = storage.get_item(PROFILE_KEY).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read stored profile");
            None
        });

        let initial = raw.as_deref().and_then(|raw| {
            decode_profile(raw)
                .map_err(|e| warn!(error = %e, "Ignoring unreadable stored profile"))
                .ok()
        });
        let last_hash = raw.as_deref().map(|raw| blake3::hash(raw.as_bytes()));

        let (tx, _rx) = watch::channel(initial);
        Self {
            storage,
            last_hash: Mutex::new(last_hash),
            tx,
        }
    }

    /// Remove the stored profile.
    ///
    /// Returns `true` if a profile was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub fn clear(&self) -> Result<bool> {
        let removed = self.storage.remove_item(PROFILE_KEY)?;
        if removed {
            self.record(None, None)?;
            info!("Stored profile removed");
        }
        Ok(removed)
    }

    /// Note a write and notify subscribers if the content changed.
    fn record(&self, hash: Option<blake3::Hash>, profile: Option<UserProfile>) -> Result<()> {
        let mut last = self
            .last_hash
            .lock()
            .map_err(|_| Error::internal("profile hash lock poisoned"))?;
        if *last == hash {
            debug!("Profile unchanged; subscribers not notified");
            return Ok(());
        }
        *last = hash;
        drop(last);

        self.tx.send_replace(profile);
        Ok(())
    }
}

impl ProfileStore for StoredProfileStore {
    fn load(&self) -> Result<Option<UserProfile>> {
        self.storage
            .get_item(PROFILE_KEY)?
            .map(|raw| decode_profile(&raw))
            .transpose()
    }

    fn save(&self, profile: &UserProfile) -> Result<()> {
        validate_for_write(profile)?;

        let raw = serde_json::to_string(profile)?;
        let hash = blake3::hash(raw.as_bytes());
        self.storage.set_item(PROFILE_KEY, &raw)?;
        debug!(
            contacts = profile.emergency_contacts.len(),
            "Profile saved"
        );

        self.record(Some(hash), Some(profile.clone()))
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserProfile>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{ContactId, NewContact};

    fn store() -> (Arc<Storage>, StoredProfileStore) {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let store = StoredProfileStore::new(storage.clone());
        (storage, store)
    }

    fn profile() -> UserProfile {
        UserProfile::signup(
            "Alex",
            NewContact::new("Mom", "Mother", "mom@example.com"),
            ContactId(10),
        )
        .unwrap()
    }

    #[test]
    fn test_load_empty() {
        let (_, store) = store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let (storage, store) = store();
        store.save(&profile()).unwrap();

        assert_eq!(store.load().unwrap(), Some(profile()));
        let raw = storage.get_item(PROFILE_KEY).unwrap().unwrap();
        assert!(raw.contains("\"emergencyContacts\""));
    }

    #[test]
    fn test_save_rejects_invalid_contact() {
        let (_, store) = store();
        let mut bad = profile();
        bad.emergency_contacts[0].email = "nope".to_string();

        assert!(matches!(
            store.save(&bad).unwrap_err(),
            Error::Validation { field: "email", .. }
        ));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_load_skips_invalid_contacts() {
        let (storage, store) = store();
        storage
            .set_item(
                PROFILE_KEY,
                r#"{"name":"Alex","emergencyContacts":[
                    {"id":1,"name":"Ok","relationship":"Friend","email":"ok@example.com"},
                    {"id":2,"name":"No Email","relationship":"Friend"},
                    {"id":3,"name":"Bad","relationship":"Friend","email":"bad"}
                ]}"#,
            )
            .unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.emergency_contacts.len(), 1);
        assert_eq!(loaded.emergency_contacts[0].id, ContactId(1));
    }

    #[test]
    fn test_load_corrupt_record_is_error() {
        let (storage, store) = store();
        storage.set_item(PROFILE_KEY, "{not json").unwrap();
        assert!(matches!(store.load().unwrap_err(), Error::Json(_)));
    }

    #[test]
    fn test_subscribe_sees_changes_only() {
        let (_, store) = store();
        let mut rx = store.subscribe();
        assert!(rx.borrow_and_update().is_none());

        store.save(&profile()).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().name, "Alex");

        store.save(&profile()).unwrap();
        assert!(!rx.has_changed().unwrap());

        let mut renamed = profile();
        renamed.name = "Sam".to_string();
        store.save(&renamed).unwrap();
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_new_seeds_existing_profile() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        StoredProfileStore::new(storage.clone())
            .save(&profile())
            .unwrap();

        let store = StoredProfileStore::new(storage);
        assert_eq!(store.subscribe().borrow().as_ref(), Some(&profile()));
    }

    #[test]
    fn test_clear() {
        let (_, store) = store();
        store.save(&profile()).unwrap();
        let rx = store.subscribe();

        assert!(store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
        assert!(rx.borrow().is_none());
        assert!(!store.clear().unwrap());
    }
}
