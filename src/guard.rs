//! Presentation-layer mirror of the access gate.
//!
//! The guard keeps protected UI hidden while claims are being resolved and
//! reacts when they change later (background refresh, window focus). Claims
//! fetches are single-flight: a trigger arriving while a fetch is outstanding
//! is coalesced into it. A forced refresh supersedes the outstanding fetch,
//! whose result is then discarded, so only the latest result is applied.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::access::{path_has_prefix, AccessLevel, Redirects};
use crate::claims::Claims;
use crate::error::GateError;
use crate::notify::{Notification, NotificationLevel, NotificationSink};

/// Where the guard gets the caller's current claims from.
#[async_trait]
pub trait ClaimsSource: Send + Sync {
    /// `Ok(None)` means there is no session.
    async fn fetch_claims(&self) -> Result<Option<Claims>, GateError>;
}

/// Where the guard stands for the page it protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Claims not resolved yet.
    Loading,
    /// The caller meets the page's requirement.
    AuthenticatedOk,
    /// No session, or the claims fetch failed.
    Unauthenticated,
    /// Signed in but the email address is not verified.
    Unverified,
    /// Verified but without an active subscription.
    Unsubscribed,
}

impl GuardState {
    /// Only a fully authorized state renders protected content.
    pub fn renders(self) -> bool {
        self == GuardState::AuthenticatedOk
    }
}

/// What the UI should do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardAction {
    /// Render nothing and stay put.
    Hold,
    /// Show the protected content.
    Render,
    /// Leave for this location.
    Navigate(String),
}

/// Result of one refresh trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched claims were applied, producing this state.
    Applied(GuardState),
    /// Another fetch was already in flight; this trigger joined it.
    Coalesced,
    /// A newer fetch started meanwhile; this result was discarded.
    Abandoned,
}

#[derive(Debug, Default)]
struct Flight {
    in_flight: Option<u64>,
    generation: u64,
}

/// Guards one protected page on the client.
///
/// State is published on a [`watch`] channel; denials are announced through
/// the injected [`NotificationSink`].
pub struct ClientGuard {
    source: Arc<dyn ClaimsSource>,
    requirement: AccessLevel,
    redirects: Redirects,
    notifier: Arc<dyn NotificationSink>,
    state: watch::Sender<GuardState>,
    flight: Mutex<Flight>,
    focus_debounce: Duration,
    last_focus: Mutex<Option<Instant>>,
}

impl ClientGuard {
    /// Creates a guard in [`GuardState::Loading`].
    ///
    /// # Parameters
    ///
    /// * `source` - Where claims are fetched from on every refresh.
    /// * `requirement` - Level of the protected page.
    /// * `redirects` - Pages a denied user is navigated to.
    /// * `notifier` - Receives a notification for each new denial.
    ///
    /// Nothing is fetched until [`ClientGuard::refresh`] or
    /// [`ClientGuard::spawn_background_refresh`] runs.
    pub fn new(
        source: Arc<dyn ClaimsSource>,
        requirement: AccessLevel,
        redirects: Redirects,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let (state, _) = watch::channel(GuardState::Loading);
        Self {
            source,
            requirement,
            redirects,
            notifier,
            state,
            flight: Mutex::new(Flight::default()),
            focus_debounce: Duration::from_secs(2),
            last_focus: Mutex::new(None),
        }
    }

    /// Focus events closer together than `debounce` trigger one refresh.
    pub fn with_focus_debounce(mut self, debounce: Duration) -> Self {
        self.focus_debounce = debounce;
        self
    }

    /// The latest applied state.
    pub fn state(&self) -> GuardState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state.subscribe()
    }

    /// What to show on `current_path` in the current state.
    ///
    /// Never navigates to the page the user is already on.
    pub fn action(&self, current_path: &str) -> GuardAction {
        let target = match self.state() {
            GuardState::Loading => return GuardAction::Hold,
            GuardState::AuthenticatedOk => return GuardAction::Render,
            GuardState::Unauthenticated => {
                if path_has_prefix(current_path, &self.redirects.login) {
                    return GuardAction::Hold;
                }
                return GuardAction::Navigate(self.redirects.login_with_return(current_path));
            }
            GuardState::Unverified => &self.redirects.verify_email,
            GuardState::Unsubscribed => &self.redirects.subscription,
        };

        if path_has_prefix(current_path, target) {
            GuardAction::Hold
        } else {
            GuardAction::Navigate(target.clone())
        }
    }

    /// Fetches claims unless a fetch is already outstanding.
    pub async fn refresh(&self) -> RefreshOutcome {
        match self.begin(false) {
            Some(ticket) => self.run(ticket).await,
            None => {
                trace!("claims refresh coalesced");
                RefreshOutcome::Coalesced
            }
        }
    }

    /// Fetches claims now, superseding any outstanding fetch.
    pub async fn force_refresh(&self) -> RefreshOutcome {
        match self.begin(true) {
            Some(ticket) => self.run(ticket).await,
            None => RefreshOutcome::Coalesced,
        }
    }

    /// Window focus regained. Returns `None` when debounced.
    pub async fn on_focus(&self) -> Option<RefreshOutcome> {
        let now = Instant::now();
        {
            let mut last = lock(&self.last_focus);
            if let Some(previous) = *last {
                if now.duration_since(previous) < self.focus_debounce {
                    return None;
                }
            }
            *last = Some(now);
        }
        Some(self.refresh().await)
    }

    /// Refreshes every `period` until the guard is dropped or the handle aborted.
    pub fn spawn_background_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let guard: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(guard) = guard.upgrade() else {
                    break;
                };
                guard.refresh().await;
            }
        })
    }

    fn begin(&self, supersede: bool) -> Option<Ticket<'_>> {
        let mut flight = lock(&self.flight);
        if flight.in_flight.is_some() && !supersede {
            return None;
        }
        flight.generation += 1;
        flight.in_flight = Some(flight.generation);
        Some(Ticket {
            guard: self,
            generation: flight.generation,
            finished: false,
        })
    }

    async fn run(&self, mut ticket: Ticket<'_>) -> RefreshOutcome {
        let fetched = self.source.fetch_claims().await;
        if !ticket.finish() {
            debug!(generation = ticket.generation, "stale claims refresh discarded");
            return RefreshOutcome::Abandoned;
        }

        let next = self.evaluate(fetched);
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "guard state changed");
            self.announce(previous, next);
        }
        RefreshOutcome::Applied(next)
    }

    fn evaluate(&self, fetched: Result<Option<Claims>, GateError>) -> GuardState {
        if self.requirement == AccessLevel::Public {
            return GuardState::AuthenticatedOk;
        }
        let claims = match fetched {
            Ok(Some(claims)) => claims,
            // Fetch failures count as signed out
            Ok(None) | Err(_) => return GuardState::Unauthenticated,
        };
        if self.requirement >= AccessLevel::Verified && !claims.is_email_verified {
            return GuardState::Unverified;
        }
        if self.requirement == AccessLevel::Subscribed && !claims.is_subscribed() {
            return GuardState::Unsubscribed;
        }
        GuardState::AuthenticatedOk
    }

    fn announce(&self, previous: GuardState, next: GuardState) {
        let notification = match next {
            GuardState::Unauthenticated if previous != GuardState::Loading => Notification::new(
                NotificationLevel::Warning,
                "Your session has expired. Please sign in again.",
            ),
            GuardState::Unverified => Notification::new(
                NotificationLevel::Info,
                "Please verify your email address to continue.",
            ),
            GuardState::Unsubscribed => Notification::new(
                NotificationLevel::Info,
                "An active subscription is required to view this page.",
            ),
            _ => return,
        };
        self.notifier.notify(notification);
    }
}

/// An outstanding fetch. Dropping it unfinished releases the flight slot.
struct Ticket<'a> {
    guard: &'a ClientGuard,
    generation: u64,
    finished: bool,
}

impl Ticket<'_> {
    /// Releases the slot. Returns whether this fetch is still the latest.
    fn finish(&mut self) -> bool {
        self.finished = true;
        let mut flight = lock(&self.guard.flight);
        if flight.in_flight == Some(self.generation) {
            flight.in_flight = None;
            true
        } else {
            false
        }
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
