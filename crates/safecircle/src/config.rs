//! Layered configuration.
//!
//! Built-in defaults are overridden by the TOML file, which is overridden by
//! `SAFECIRCLE_*` environment variables. The merged result is validated
//! before use.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use safecircle_ai::backend::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SPEECH_MODEL};
use safecircle_ai::{AdvisoryGateway, GatewayError, GeminiBackend, GeminiConfig, DEFAULT_VOICE};

use crate::contact::Contact;
use crate::contacts::default_contacts;
use crate::error::{Error, Result};
use crate::geolocation::{Coordinates, FixedGeolocator, Geolocator, UnavailableGeolocator};
use crate::sos::SosTiming;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "safecircle";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "safecircle.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "SAFECIRCLE_";

/// Fallback environment variable for the AI API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SAFECIRCLE_`, nested keys split on `__`)
/// 2. TOML config file at `~/.config/safecircle/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// SOS control timing.
    pub sos: SosConfig,
    /// Position source.
    pub location: LocationConfig,
    /// Default emergency contacts.
    pub contacts: ContactsConfig,
    /// AI advisory gateway.
    pub ai: AiConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/safecircle/safecircle.db`
    pub database_path: Option<PathBuf>,
}

/// SOS control timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SosConfig {
    /// How long the control must be held, in milliseconds.
    pub hold_duration_ms: u64,
    /// Progress update interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Delay before `sent`/`error` revert to idle, in milliseconds.
    pub reset_after_ms: u64,
}

/// Position source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Fixed latitude to report.
    pub latitude: Option<f64>,
    /// Fixed longitude to report.
    pub longitude: Option<f64>,
    /// Upper bound on a position query, in milliseconds.
    pub timeout_ms: u64,
}

/// Default contact configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsConfig {
    /// Institution-provided contacts shown to every user.
    pub defaults: Vec<Contact>,
}

/// AI advisory gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// API root.
    pub base_url: String,
    /// Model for chat and route assessment.
    pub model: String,
    /// Model for speech synthesis.
    pub speech_model: String,
    /// Prebuilt voice name.
    pub voice: String,
    /// API key. Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SosConfig {
    fn default() -> Self {
        Self {
            hold_duration_ms: 2000,
            tick_interval_ms: 20,
            reset_after_ms: 6000,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            timeout_ms: 10_000,
        }
    }
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            defaults: default_contacts(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            api_key: None,
            request_timeout_secs: 60,
        }
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

impl Config {
    /// Load from the default file location and the environment.
    ///
    /// # Errors
    ///
    /// See [`Config::load_from`].
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load using `config_path` instead of the default file, if given.
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Fails if the file or an environment value cannot be parsed, or if the
    /// merged settings do not validate.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/safecircle/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// `<local data dir>/safecircle`.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Check value ranges and the default contact list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if self.sos.tick_interval_ms == 0 {
            return Err(invalid("sos.tick_interval_ms must be greater than 0"));
        }
        if self.sos.hold_duration_ms < self.sos.tick_interval_ms {
            return Err(invalid(format!(
                "sos.hold_duration_ms ({}) must be at least one tick ({})",
                self.sos.hold_duration_ms, self.sos.tick_interval_ms
            )));
        }
        if self.sos.reset_after_ms == 0 {
            return Err(invalid("sos.reset_after_ms must be greater than 0"));
        }

        if self.location.timeout_ms == 0 {
            return Err(invalid("location.timeout_ms must be greater than 0"));
        }
        match (self.location.latitude, self.location.longitude) {
            (Some(latitude), Some(longitude)) => {
                if !Coordinates::new(latitude, longitude).is_valid() {
                    return Err(invalid(format!(
                        "location ({latitude}, {longitude}) is out of range"
                    )));
                }
            }
            (None, None) => {}
            _ => {
                return Err(invalid(
                    "location.latitude and location.longitude must be set together",
                ))
            }
        }

        let mut ids = HashSet::new();
        let mut emails = HashSet::new();
        for contact in &self.contacts.defaults {
            contact.check().map_err(|e| {
                invalid(format!("default contact {}: {e}", contact.id))
            })?;
            if !ids.insert(contact.id) {
                return Err(invalid(format!("duplicate default contact id {}", contact.id)));
            }
            if !emails.insert(contact.email_key()) {
                return Err(invalid(format!(
                    "duplicate default contact email {}",
                    contact.email
                )));
            }
        }

        if self.ai.request_timeout_secs == 0 {
            return Err(invalid("ai.request_timeout_secs must be greater than 0"));
        }
        if self.ai.model.trim().is_empty() || self.ai.speech_model.trim().is_empty() {
            return Err(invalid("ai.model and ai.speech_model must not be empty"));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Durations for the SOS controller.
    #[must_use]
    pub fn sos_timing(&self) -> SosTiming {
        SosTiming {
            hold_duration: Duration::from_millis(self.sos.hold_duration_ms),
            tick_interval: Duration::from_millis(self.sos.tick_interval_ms),
            reset_after: Duration::from_millis(self.sos.reset_after_ms),
            location_timeout: Duration::from_millis(self.location.timeout_ms),
        }
    }

    /// The configured fixed position, if any.
    #[must_use]
    pub fn fixed_position(&self) -> Option<Coordinates> {
        match (self.location.latitude, self.location.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Build the position source.
    #[must_use]
    pub fn geolocator(&self) -> Arc<dyn Geolocator> {
        match self.fixed_position() {
            Some(position) => Arc::new(FixedGeolocator::new(position)),
            None => Arc::new(UnavailableGeolocator::new(
                "no location configured; set location.latitude and location.longitude",
            )),
        }
    }

    /// The API key from config, else from `GEMINI_API_KEY`.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        self.ai
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Build the AI advisory gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is available or the client cannot be built.
    pub fn gateway(&self) -> Result<AdvisoryGateway> {
        let api_key = self.api_key().ok_or_else(|| {
            GatewayError::NotConfigured(format!(
                "set ai.api_key, {ENV_PREFIX}AI__API_KEY or {API_KEY_ENV}"
            ))
        })?;

        let gemini = GeminiConfig {
            base_url: self.ai.base_url.clone(),
            api_key,
            model: self.ai.model.clone(),
            speech_model: self.ai.speech_model.clone(),
            request_timeout: Duration::from_secs(self.ai.request_timeout_secs),
        };
        let backend = GeminiBackend::new(gemini)?;
        Ok(AdvisoryGateway::new(Arc::new(backend)).with_voice(self.ai.voice.clone()))
    }

    /// A copy safe to print, with secrets masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.ai.api_key.is_some() {
            config.ai.api_key = Some("********".to_string());
        }
        config
    }
}
