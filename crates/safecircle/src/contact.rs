//! Core profile and contact types for safecircle.
//!
//! This module defines the records persisted in local storage and the
//! validation applied at the store boundary.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum length (in characters) for names and relationships.
pub const MIN_NAME_LEN: usize = 2;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Check whether `email` looks like a deliverable address.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Normalize an email for comparison.
#[must_use]
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Identifier of a contact.
///
/// Personal contacts use their creation time in milliseconds; default
/// contacts use small fixed integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub i64);

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ContactId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// An emergency contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Identifier.
    pub id: ContactId,
    /// Display name.
    pub name: String,
    /// Relationship to the user ("Mother", "Security", ...).
    pub relationship: String,
    /// Address alerts are sent to.
    pub email: String,
}

impl Contact {
    /// Create a contact from validated fields.
    #[must_use]
    pub fn new(id: ContactId, fields: NewContact) -> Self {
        Self {
            id,
            name: fields.name,
            relationship: fields.relationship,
            email: fields.email,
        }
    }

    /// Check the fields required of any stored contact.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is blank or the email is invalid.
    pub fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "must not be blank"));
        }
        if !is_valid_email(&self.email) {
            return Err(Error::validation(
                "email",
                format!("'{}' is not a valid address", self.email),
            ));
        }
        Ok(())
    }

    /// Normalized email used for de-duplication.
    #[must_use]
    pub fn email_key(&self) -> String {
        email_key(&self.email)
    }
}

/// Fields for creating or editing a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    /// Display name.
    pub name: String,
    /// Relationship to the user.
    pub relationship: String,
    /// Email address.
    pub email: String,
}

impl NewContact {
    /// Build a contact form, trimming whitespace.
    pub fn new(
        name: impl Into<String>,
        relationship: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            relationship: relationship.into().trim().to_string(),
            email: email.into().trim().to_string(),
        }
    }

    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_min_len("contact name", &self.name)?;
        check_min_len("relationship", &self.relationship)?;
        if !is_valid_email(&self.email) {
            return Err(Error::validation(
                "email",
                "please enter a valid email address",
            ));
        }
        Ok(())
    }
}

fn check_min_len(field: &'static str, value: &str) -> Result<()> {
    if value.trim().chars().count() < MIN_NAME_LEN {
        return Err(Error::validation(
            field,
            format!("must be at least {MIN_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

/// Where a contact comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    /// Institution-provided; cannot be edited or deleted.
    Default,
    /// Added by the user; stored with the profile.
    Personal,
}

impl std::fmt::Display for ContactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Personal => write!(f, "personal"),
        }
    }
}

/// A contact in the merged directory, tagged with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// The contact.
    #[serde(flatten)]
    pub contact: Contact,
    /// Its provenance.
    pub kind: ContactKind,
}

impl DirectoryEntry {
    /// Whether this entry can be edited or deleted.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.kind == ContactKind::Personal
    }
}

/// The signed-in user, as persisted under the local-storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The user's name, used in alert messages.
    pub name: String,
    /// Personal emergency contacts. Defaults are never stored here.
    #[serde(default)]
    pub emergency_contacts: Vec<Contact>,
}

impl UserProfile {
    /// Create a profile at signup with its first emergency contact.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name or contact is invalid.
    pub fn signup(name: &str, first_contact: NewContact, id: ContactId) -> Result<Self> {
        let name = name.trim();
        check_min_len("name", name)?;
        first_contact.validate()?;
        Ok(Self {
            name: name.to_string(),
            emergency_contacts: vec![Contact::new(id, first_contact)],
        })
    }

    /// Validate a new display name.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the name is too short.
    pub fn validate_name(name: &str) -> Result<()> {
        check_min_len("name", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> NewContact {
        NewContact::new("Jane Doe", "Sister", "jane@example.com")
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("security@snu.edu.in"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.d"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_email_key_normalizes() {
        assert_eq!(email_key("  Jane@Example.COM "), "jane@example.com");
    }

    #[test]
    fn test_new_contact_trims_and_validates() {
        let contact = NewContact::new("  Jane ", " Sister ", " jane@example.com ");
        assert_eq!(contact.name, "Jane");
        assert_eq!(contact.email, "jane@example.com");
        assert!(contact.validate().is_ok());
    }

    #[test]
    fn test_new_contact_rejects_short_fields() {
        let err = NewContact::new("J", "Sister", "jane@example.com")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("contact name"));

        let err = NewContact::new("Jane", "S", "jane@example.com")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("relationship"));

        let err = NewContact::new("Jane", "Sister", "jane")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_contact_check() {
        let mut contact = Contact::new(ContactId(5), form());
        assert!(contact.check().is_ok());

        contact.email = "broken".to_string();
        assert!(contact.check().is_err());
    }

    #[test]
    fn test_contact_id_parse_and_display() {
        let id: ContactId = " 1712345678901 ".parse().unwrap();
        assert_eq!(id, ContactId(1_712_345_678_901));
        assert_eq!(id.to_string(), "1712345678901");
        assert!("abc".parse::<ContactId>().is_err());
    }

    #[test]
    fn test_signup_builds_profile() {
        let profile = UserProfile::signup(" Alex ", form(), ContactId(99)).unwrap();
        assert_eq!(profile.name, "Alex");
        assert_eq!(profile.emergency_contacts.len(), 1);
        assert_eq!(profile.emergency_contacts[0].id, ContactId(99));
    }

    #[test]
    fn test_signup_rejects_short_name() {
        let err = UserProfile::signup("A", form(), ContactId(1)).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "name", .. }));
    }

    #[test]
    fn test_profile_wire_format() {
        let profile = UserProfile::signup("Alex", form(), ContactId(7)).unwrap();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["name"], "Alex");
        assert_eq!(json["emergencyContacts"][0]["id"], 7);
        assert_eq!(json["emergencyContacts"][0]["relationship"], "Sister");
    }

    #[test]
    fn test_profile_without_contacts_field() {
        let profile: UserProfile = serde_json::from_str(r#"{"name":"Alex"}"#).unwrap();
        assert!(profile.emergency_contacts.is_empty());
    }

    #[test]
    fn test_directory_entry_flattens() {
        let entry = DirectoryEntry {
            contact: Contact::new(ContactId(1), form()),
            kind: ContactKind::Default,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["email"], "jane@example.com");
        assert_eq!(json["kind"], "default");
        assert!(!entry.is_editable());
    }
}
