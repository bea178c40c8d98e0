//! `safecircle` - Campus safety companion
//!
//! Press-and-hold SOS alerts to emergency contacts, a contact book that
//! merges institution defaults with personal contacts, and front-ends for the
//! AI safety advisor (chat, route risk, text-to-speech).

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod chat;
pub mod cli;
pub mod config;
pub mod contact;
pub mod contacts;
pub mod dispatch;
pub mod error;
pub mod geolocation;
pub mod logging;
pub mod profile;
pub mod resources;
pub mod route;
pub mod sos;
pub mod storage;

pub use chat::{ChatMessage, ChatSession, Sender};
pub use config::Config;
pub use contact::{Contact, ContactId, ContactKind, DirectoryEntry, NewContact, UserProfile};
pub use contacts::{default_contacts, merge_contacts, ContactBook, Recipients};
pub use dispatch::{AlertDispatcher, AlertEvent, EmailAlertDispatcher, EmailMessage, Mailer};
pub use error::{Error, Result};
pub use geolocation::{Coordinates, GeolocationError, Geolocator};
pub use logging::init_logging;
pub use profile::{ProfileStore, StoredProfileStore, PROFILE_KEY};
pub use resources::{EmergencyResource, EMERGENCY_RESOURCES};
pub use route::{describe_route, RouteInsightsForm};
pub use sos::{SosController, SosFailure, SosOutcome, SosSnapshot, SosStatus, SosTiming};
pub use storage::{Storage, StorageStats};
