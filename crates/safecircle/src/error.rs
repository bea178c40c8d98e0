//! Errors raised by the safecircle library.
//!
//! Everything fallible in this crate returns [`Result`]. The binary wraps
//! these in `anyhow` at the top level.

use std::path::PathBuf;
use thiserror::Error;

use crate::contact::ContactId;

/// Failure of a safecircle operation.
#[derive(Error, Debug)]
pub enum Error {
    /// The local database could not be opened.
    #[error("cannot open local storage at {path}: {source}")]
    DatabaseOpen {
        /// Database file location.
        path: PathBuf,
        /// Cause reported by SQLite.
        #[source]
        source: rusqlite::Error,
    },

    /// A statement against the local database failed.
    #[error("local storage query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// The stored schema could not be brought up to date.
    #[error("schema migration failed: {message}")]
    DatabaseMigration {
        /// What went wrong.
        message: String,
    },

    /// The configuration sources could not be merged or parsed.
    #[error("cannot load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// The merged configuration holds unusable values.
    #[error("configuration rejected: {message}")]
    ConfigValidation {
        /// Which setting is wrong and why.
        message: String,
    },

    /// No user profile is stored.
    #[error("not signed in: please sign up first")]
    NotSignedIn,

    /// A user-supplied field failed validation.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// No personal contact has this id.
    #[error("contact {id} not found")]
    ContactNotFound {
        /// The id that was looked up.
        id: ContactId,
    },

    /// Institution-provided contacts are read-only.
    #[error("default contacts cannot be {action}")]
    DefaultContactImmutable {
        /// Id of the default contact.
        id: ContactId,
        /// What was attempted ("deleted", "edited").
        action: &'static str,
    },

    /// The AI advisory gateway failed.
    #[error("advisory gateway error: {0}")]
    Gateway(#[from] safecircle_ai::GatewayError),

    /// A file operation failed.
    #[error("file operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// The data directory could not be created.
    #[error("cannot create directory {path}: {source}")]
    DirectoryCreate {
        /// Directory that was requested.
        path: PathBuf,
        /// Cause reported by the OS.
        #[source]
        source: std::io::Error,
    },

    /// A stored or emitted record was not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A condition that should never happen.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Build an [`Error::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Build an [`Error::Validation`] for `field`.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// True when the action needs a signed-in user.
    #[must_use]
    pub fn is_not_signed_in(&self) -> bool {
        matches!(self, Self::NotSignedIn)
    }

    /// True when a default contact was the target of an edit or delete.
    #[must_use]
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::DefaultContactImmutable { .. })
    }
}
