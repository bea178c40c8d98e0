//! SOS alert dispatch.
//!
//! An [`AlertEvent`] becomes one email per recipient. Delivery goes through a
//! [`Mailer`]; the shipped [`ConsoleMailer`] only logs the message. Dispatch
//! is all-or-nothing: the first failed send aborts the rest.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::geolocation::Coordinates;

/// A triggered alert, built fresh for each SOS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Latitude of the user.
    pub latitude: f64,
    /// Longitude of the user.
    pub longitude: f64,
    /// Name of the user raising the alert.
    pub user_name: String,
    /// Unique recipient addresses.
    pub recipient_emails: Vec<String>,
}

impl AlertEvent {
    /// Build an event at `position`.
    pub fn new(
        position: Coordinates,
        user_name: impl Into<String>,
        recipient_emails: Vec<String>,
    ) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            user_name: user_name.into(),
            recipient_emails,
        }
    }

    /// Link to the position on a map.
    #[must_use]
    pub fn map_link(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }

    /// Email subject line.
    #[must_use]
    pub fn subject(&self) -> String {
        format!("SOS Alert from {}", self.user_name)
    }

    /// Email body.
    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "EMERGENCY!\n\n\
             {name} has triggered an SOS alert.\n\n\
             Their last known location is: {lat}, {lon}\n\
             View on map: {link}\n\n\
             Please take immediate action.\n",
            name = self.user_name,
            lat = self.latitude,
            lon = self.longitude,
            link = self.map_link(),
        )
    }

    /// One message per recipient, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<EmailMessage> {
        let subject = self.subject();
        let body = self.body();
        self.recipient_emails
            .iter()
            .map(|to| EmailMessage {
                to: to.clone(),
                subject: subject.clone(),
                body: body.clone(),
            })
            .collect()
    }
}

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Why a dispatch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The event had no recipients.
    #[error("no recipients to alert")]
    NoRecipients,

    /// A send failed; later recipients were not attempted.
    #[error("failed to send alert to {to}: {message}")]
    Send {
        /// The recipient whose send failed.
        to: String,
        /// What went wrong.
        message: String,
    },
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    /// Addresses alerted, in send order.
    pub delivered: Vec<String>,
}

/// Delivers a single email.
#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    /// Send one message.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure.
    async fn send(&self, message: &EmailMessage) -> Result<(), String>;
}

/// Sends alerts for SOS events.
#[async_trait]
pub trait AlertDispatcher: Send + Sync + Debug {
    /// Alert every recipient of `event`.
    ///
    /// # Errors
    ///
    /// Fails on an empty recipient list or on the first failed send.
    async fn dispatch(&self, event: &AlertEvent) -> Result<DispatchReceipt, DispatchError>;
}

/// Simulated delivery: the message is written to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), String> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "Simulated email sent (no real delivery)"
        );
        Ok(())
    }
}

/// Keeps sent messages in memory. Can be told to fail for one address.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    fail_for: Option<String>,
    delay: Duration,
}

impl MemoryMailer {
    /// Create an empty mailer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every send to `email`.
    #[must_use]
    pub fn failing_for(mut self, email: impl Into<String>) -> Self {
        self.fail_for = Some(email.into());
        self
    }

    /// Wait `delay` before each send.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_for.as_deref() == Some(message.to.as_str()) {
            return Err("mailbox unavailable".to_string());
        }
        self.sent
            .lock()
            .map_err(|_| "mailer lock poisoned".to_string())?
            .push(message.clone());
        Ok(())
    }
}

/// Email-based dispatcher.
#[derive(Debug, Clone)]
pub struct EmailAlertDispatcher {
    mailer: Arc<dyn Mailer>,
}

impl EmailAlertDispatcher {
    /// Dispatch through `mailer`.
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Dispatcher that only logs.
    #[must_use]
    pub fn console() -> Self {
        Self::new(Arc::new(ConsoleMailer))
    }
}

#[async_trait]
impl AlertDispatcher for EmailAlertDispatcher {
    async fn dispatch(&self, event: &AlertEvent) -> Result<DispatchReceipt, DispatchError> {
        if event.recipient_emails.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        let messages = event.messages();
        debug!(
            recipients = messages.len(),
            user = %event.user_name,
            "Dispatching SOS alert"
        );

        let mut delivered = Vec::with_capacity(messages.len());
        for message in messages {
            if let Err(error) = self.mailer.send(&message).await {
                warn!(to = %message.to, %error, sent = delivered.len(), "Alert send failed");
                return Err(DispatchError::Send {
                    to: message.to,
                    message: error,
                });
            }
            delivered.push(message.to);
        }

        info!(recipients = delivered.len(), "SOS alert dispatched");
        Ok(DispatchReceipt { delivered })
    }
}
