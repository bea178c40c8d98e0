//! Press-and-hold SOS activation.
//!
//! The controller walks `idle → arming → sending → sent | error → idle`.
//! Holding the control for the configured duration arms it; releasing early
//! cancels. Once armed, recipients are resolved, the position is looked up
//! and the alert is dispatched exactly once. Terminal states revert to idle
//! on their own after a timeout.
//!
//! State lives behind a mutex that is never held across an await. Every
//! press bumps a generation counter so stale timer ticks are ignored, and
//! both timers are [`ScopedTimer`]s so dropping the controller cancels them.

mod timer;

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use crate::contacts::ContactBook;
use crate::dispatch::{AlertDispatcher, AlertEvent};
use crate::geolocation::{locate, GeolocationError, Geolocator};

pub use timer::ScopedTimer;

/// Progress value at which the alert fires.
pub const ARMED_PROGRESS: u8 = 100;

/// Where the user should be sent to fix a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Redirect {
    /// Sign up first.
    Signup,
    /// Add an emergency contact.
    Contacts,
}

impl std::fmt::Display for Redirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signup => write!(f, "signup"),
            Self::Contacts => write!(f, "contacts"),
        }
    }
}

/// A user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Short heading.
    pub title: &'static str,
    /// One-sentence explanation.
    pub description: &'static str,
}

/// Why an SOS did not go out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SosFailure {
    /// No user is signed in.
    #[error("not signed in")]
    Unauthenticated,

    /// The merged contact list is empty.
    #[error("no emergency contacts")]
    NoRecipients,

    /// The position could not be determined.
    #[error("geolocation failed: {0}")]
    Geolocation(#[from] GeolocationError),

    /// The dispatcher reported a failure.
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    /// The stored profile could not be read.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl SosFailure {
    /// The message to show the user.
    #[must_use]
    pub fn notice(&self) -> Notice {
        match self {
            Self::Unauthenticated => Notice {
                title: "Not Signed In",
                description: "Please sign up to use the SOS feature.",
            },
            Self::NoRecipients => Notice {
                title: "No Emergency Contacts",
                description: "Please add an emergency contact in your settings.",
            },
            Self::Geolocation(_) => Notice {
                title: "Location Error",
                description: "Could not get your location. Please enable location services.",
            },
            Self::Dispatch(_) => Notice {
                title: "Error Sending Alert",
                description: "Could not send the SOS alert. Please try again or contact support.",
            },
            Self::Storage(_) => Notice {
                title: "Profile Unavailable",
                description: "Could not read your saved profile. Please try again.",
            },
        }
    }

    /// Where to send the user, if the failure has a fix.
    #[must_use]
    pub fn redirect(&self) -> Option<Redirect> {
        match self {
            Self::Unauthenticated => Some(Redirect::Signup),
            Self::NoRecipients => Some(Redirect::Contacts),
            _ => None,
        }
    }
}

/// Result of one activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SosOutcome {
    /// The alert reached every recipient.
    Sent {
        /// Addresses alerted.
        recipients: Vec<String>,
    },
    /// The alert did not go out.
    Failed(SosFailure),
}

impl SosOutcome {
    /// Confirmation text for a sent alert.
    #[must_use]
    pub fn confirmation(recipients: &[String]) -> String {
        format!(
            "Help is on the way. An alert with your location has been sent to your \
             emergency contacts: {}. Please move to a safe location if possible.\n\
             (This is a simulation. In a real app, an email/SMS would be sent.)",
            recipients.join(", ")
        )
    }
}

/// Phase of the SOS control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SosStatus {
    /// Waiting for a press.
    Idle,
    /// Being held; progress is advancing.
    Arming,
    /// Armed; resolving, locating and dispatching.
    Sending,
    /// The alert went out.
    Sent,
    /// The alert failed.
    Error,
}

impl SosStatus {
    /// Whether a press is accepted in this phase.
    #[must_use]
    pub fn accepts_press(self) -> bool {
        matches!(self, Self::Idle | Self::Sent | Self::Error)
    }

    /// Whether this is a display state awaiting auto-revert.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Error)
    }

    /// Label for the control in this phase.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Hold to Activate",
            Self::Arming => "Activating...",
            Self::Sending => "Sending Alert...",
            Self::Sent => "Alert Sent",
            Self::Error => "Failed",
        }
    }
}

impl std::fmt::Display for SosStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Arming => "arming",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// What subscribers see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SosSnapshot {
    /// Current phase.
    pub status: SosStatus,
    /// Arming progress, 0 to 100.
    pub progress: u8,
    /// Result of the last activation, while displayed.
    pub outcome: Option<SosOutcome>,
}

impl SosSnapshot {
    fn idle() -> Self {
        Self {
            status: SosStatus::Idle,
            progress: 0,
            outcome: None,
        }
    }
}

/// Durations governing the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SosTiming {
    /// How long the control must be held.
    pub hold_duration: Duration,
    /// Progress update interval while held.
    pub tick_interval: Duration,
    /// How long `sent`/`error` stay before reverting to idle.
    pub reset_after: Duration,
    /// Upper bound on the position query.
    pub location_timeout: Duration,
}

impl Default for SosTiming {
    fn default() -> Self {
        Self {
            hold_duration: Duration::from_millis(2000),
            tick_interval: Duration::from_millis(20),
            reset_after: Duration::from_millis(6000),
            location_timeout: Duration::from_secs(10),
        }
    }
}

impl SosTiming {
    /// Number of ticks needed to arm. Always at least one.
    #[must_use]
    pub fn ticks_to_arm(&self) -> u32 {
        let tick = self.tick_interval.as_micros().max(1);
        let ticks = self.hold_duration.as_micros().div_ceil(tick).max(1);
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }

    /// Progress after `tick` of `total` ticks.
    #[must_use]
    pub fn progress_at(tick: u32, total: u32) -> u8 {
        let percent = u64::from(tick) * u64::from(ARMED_PROGRESS) / u64::from(total.max(1));
        u8::try_from(percent.min(u64::from(ARMED_PROGRESS))).unwrap_or(ARMED_PROGRESS)
    }
}

#[derive(Debug)]
struct State {
    snapshot: SosSnapshot,
    generation: u64,
    /// Result of the current generation; survives the revert to idle.
    last_outcome: Option<SosOutcome>,
    arm_timer: Option<ScopedTimer>,
    reset_timer: Option<ScopedTimer>,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    tx: watch::Sender<SosSnapshot>,
    contacts: ContactBook,
    geolocator: Arc<dyn Geolocator>,
    dispatcher: Arc<dyn AlertDispatcher>,
    timing: SosTiming,
}

/// The SOS control.
///
/// Presses and releases must happen inside a tokio runtime because they spawn
/// timer tasks. Dropping the controller cancels any pending timers; an alert
/// already being sent is allowed to finish.
#[derive(Debug)]
pub struct SosController {
    inner: Arc<Inner>,
}

impl SosController {
    /// Create a controller.
    pub fn new(
        contacts: ContactBook,
        geolocator: Arc<dyn Geolocator>,
        dispatcher: Arc<dyn AlertDispatcher>,
        timing: SosTiming,
    ) -> Self {
        let (tx, _rx) = watch::channel(SosSnapshot::idle());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    snapshot: SosSnapshot::idle(),
                    generation: 0,
                    last_outcome: None,
                    arm_timer: None,
                    reset_timer: None,
                }),
                tx,
                contacts,
                geolocator,
                dispatcher,
                timing,
            }),
        }
    }

    /// The configured durations.
    #[must_use]
    pub fn timing(&self) -> SosTiming {
        self.inner.timing
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SosSnapshot {
        self.inner.tx.borrow().clone()
    }

    /// Watch snapshots as they change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SosSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Start holding the control.
    ///
    /// Accepted in `idle`, `sent` and `error`; a pending auto-revert is
    /// cancelled. Returns whether the press was accepted.
    pub fn press(&self) -> bool {
        let mut state = self.inner.lock();
        if !state.snapshot.status.accepts_press() {
            debug!(status = %state.snapshot.status, "Press ignored");
            return false;
        }

        state.generation += 1;
        let generation = state.generation;
        state.last_outcome = None;
        state.reset_timer = None;
        state.snapshot = SosSnapshot {
            status: SosStatus::Arming,
            progress: 0,
            outcome: None,
        };

        let weak = Arc::downgrade(&self.inner);
        state.arm_timer = Some(ScopedTimer::spawn(run_activation(weak, generation)));

        info!(generation, "SOS arming");
        self.inner.publish(&state);
        true
    }

    /// Let go of the control.
    ///
    /// Only has an effect while arming: progress resets and the control
    /// returns to idle. Returns whether the release cancelled arming.
    pub fn release(&self) -> bool {
        let mut state = self.inner.lock();
        if state.snapshot.status != SosStatus::Arming {
            return false;
        }

        state.arm_timer = None;
        let progress = state.snapshot.progress;
        state.snapshot = SosSnapshot::idle();

        info!(progress, "SOS released before arming; cancelled");
        self.inner.publish(&state);
        true
    }

    /// Wait for the result of the latest activation.
    ///
    /// Returns the result even if the control has since reverted to idle.
    /// Returns `None` when nothing was activated or the press was released
    /// before arming.
    pub async fn wait_for_outcome(&self) -> Option<SosOutcome> {
        let mut rx = self.subscribe();
        {
            let state = self.inner.lock();
            if state.last_outcome.is_some() || state.snapshot.status == SosStatus::Idle {
                return state.last_outcome.clone();
            }
        }

        rx.wait_for(|s| s.status.is_terminal() || s.status == SosStatus::Idle)
            .await
            .ok()?;
        self.inner.lock().last_outcome.clone()
    }

    /// Cancel pending timers. A press in progress is abandoned.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        state.arm_timer = None;
        state.reset_timer = None;
        if state.snapshot.status == SosStatus::Arming {
            state.snapshot = SosSnapshot::idle();
            self.inner.publish(&state);
        }
        debug!("SOS controller shut down");
    }
}

impl Drop for SosController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Every critical section leaves State consistent, so a poisoned lock
        // still holds usable data.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn publish(&self, state: &State) {
        self.tx.send_replace(state.snapshot.clone());
    }

    /// Record arming progress. Returns false if this activation is stale.
    fn advance(&self, generation: u64, progress: u8) -> bool {
        let mut state = self.lock();
        if state.generation != generation || state.snapshot.status != SosStatus::Arming {
            return false;
        }
        state.snapshot.progress = progress;
        self.publish(&state);
        true
    }

    /// Move from arming to sending. Returns false if this activation is stale.
    fn begin_sending(&self, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation || state.snapshot.status != SosStatus::Arming {
            return false;
        }
        // The arm task carries on as the sender; release its guard so no
        // later state change aborts the dispatch.
        if let Some(timer) = state.arm_timer.take() {
            timer.detach();
        }
        state.snapshot.status = SosStatus::Sending;
        state.snapshot.progress = ARMED_PROGRESS;

        info!(generation, "SOS triggered");
        self.publish(&state);
        true
    }

    async fn run_alert(&self) -> SosOutcome {
        let recipients = match self.contacts.resolve_recipients() {
            Ok(Some(recipients)) => recipients,
            Ok(None) => return SosOutcome::Failed(SosFailure::Unauthenticated),
            Err(e) => return SosOutcome::Failed(SosFailure::Storage(e.to_string())),
        };
        if recipients.emails.is_empty() {
            return SosOutcome::Failed(SosFailure::NoRecipients);
        }

        let position = match locate(self.geolocator.as_ref(), self.timing.location_timeout).await
        {
            Ok(position) => position,
            Err(e) => return SosOutcome::Failed(e.into()),
        };
        debug!(%position, recipients = recipients.emails.len(), "Position acquired");

        let event = AlertEvent::new(position, recipients.user_name, recipients.emails);
        match self.dispatcher.dispatch(&event).await {
            Ok(receipt) => SosOutcome::Sent {
                recipients: receipt.delivered,
            },
            Err(e) => SosOutcome::Failed(SosFailure::Dispatch(e.to_string())),
        }
    }

    fn finish(self: &Arc<Self>, generation: u64, outcome: SosOutcome) {
        let mut state = self.lock();
        if state.generation != generation || state.snapshot.status != SosStatus::Sending {
            warn!(generation, "Discarding outcome of a superseded activation");
            return;
        }

        match &outcome {
            SosOutcome::Sent { recipients } => {
                info!(recipients = recipients.len(), "SOS alert sent");
                state.snapshot.status = SosStatus::Sent;
            }
            SosOutcome::Failed(failure) => {
                error!(error = %failure, redirect = ?failure.redirect(), "SOS alert failed");
                state.snapshot.status = SosStatus::Error;
            }
        }
        state.last_outcome = Some(outcome.clone());
        state.snapshot.outcome = Some(outcome);

        let weak = Arc::downgrade(self);
        state.reset_timer = Some(ScopedTimer::after(self.timing.reset_after, move || {
            if let Some(inner) = weak.upgrade() {
                inner.revert(generation);
            }
        }));
        self.publish(&state);
    }

    fn revert(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || !state.snapshot.status.is_terminal() {
            return;
        }
        if let Some(timer) = state.reset_timer.take() {
            timer.detach();
        }
        state.snapshot = SosSnapshot::idle();
        debug!(generation, "SOS reverted to idle");
        self.publish(&state);
    }
}

/// Drive one activation: tick progress, then send.
async fn run_activation(weak: Weak<Inner>, generation: u64) {
    let Some(timing) = weak.upgrade().map(|inner| inner.timing) else {
        return;
    };

    let total = timing.ticks_to_arm();
    let mut ticker = interval_at(Instant::now() + timing.tick_interval, timing.tick_interval);
    for tick in 1..=total {
        ticker.tick().await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if !inner.advance(generation, SosTiming::progress_at(tick, total)) {
            return;
        }
    }

    let Some(inner) = weak.upgrade() else {
        return;
    };
    if !inner.begin_sending(generation) {
        return;
    }
    let outcome = inner.run_alert().await;
    inner.finish(generation, outcome);
}
