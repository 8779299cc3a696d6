//! Navigation guard driven by session state.
//!
//! The guard is a three-state machine. It stays `Unresolved` until the
//! session store has read the initial auth state, and falls back to
//! `Unresolved` whenever a session event arrives; the next navigation
//! resolves it again. Protected content is only rendered from `Admitted`.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use teamboard_core::{Resolved, Route};
use teamboard_settings::RoleRedirect;
use teamboard_stores::{SessionEvent, SessionStatus, SessionStore};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

/// Guard state for the current navigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardState {
    /// Session not resolved yet, or invalidated since the last check.
    Unresolved,
    /// The last navigation was refused.
    Denied,
    /// The last navigation was allowed.
    Admitted,
}

/// What to show for a navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Show the route.
    Render(Route),
    /// Show a neutral placeholder; the session is still resolving.
    Placeholder,
    /// Navigate elsewhere.
    Redirect(Route),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(route) => write!(f, "render {route}"),
            Self::Placeholder => f.write_str("placeholder"),
            Self::Redirect(route) => write!(f, "redirect {route}"),
        }
    }
}

struct Inner {
    events: broadcast::Receiver<SessionEvent>,
    state: GuardState,
}

/// Admits or denies navigation based on the session and its role.
pub struct RouteGuard {
    session: Arc<SessionStore>,
    mismatch: RoleRedirect,
    inner: Mutex<Inner>,
}

impl RouteGuard {
    /// Create a guard following `session`.
    ///
    /// `mismatch` picks where a signed-in user without the required role
    /// is sent.
    pub fn new(session: Arc<SessionStore>, mismatch: RoleRedirect) -> Self {
        let events = session.subscribe();
        Self {
            session,
            mismatch,
            inner: Mutex::new(Inner {
                events,
                state: GuardState::Unresolved,
            }),
        }
    }

    /// Current state, after taking pending session events into account.
    pub fn state(&self) -> GuardState {
        let mut inner = self.inner.lock();
        Self::drain(&mut inner);
        inner.state
    }

    /// Decide what to show for a raw path.
    pub fn navigate(&self, path: &str) -> Decision {
        match Route::resolve(path) {
            Resolved::Exact(route) => self.check(&route),
            Resolved::Redirect(route) => {
                debug!(path, target = %route, "unknown path redirected");
                Decision::Redirect(route)
            }
        }
    }

    /// Decide what to show for a route.
    pub fn check(&self, route: &Route) -> Decision {
        let mut inner = self.inner.lock();
        Self::drain(&mut inner);
        let (state, decision) = self.evaluate(route);
        if inner.state != state {
            debug!(route = %route, from = ?inner.state, to = ?state, "guard state changed");
        }
        inner.state = state;
        decision
    }

    fn evaluate(&self, route: &Route) -> (GuardState, Decision) {
        if self.session.status() == SessionStatus::Resolving {
            return (GuardState::Unresolved, Decision::Placeholder);
        }
        let Some(session) = self.session.current_session() else {
            return if route.is_public() {
                (GuardState::Admitted, Decision::Render(route.clone()))
            } else {
                (GuardState::Denied, Decision::Redirect(Route::Login))
            };
        };
        if *route == Route::Login {
            return (
                GuardState::Admitted,
                Decision::Redirect(Route::DEFAULT_AUTHENTICATED),
            );
        }
        match route.required_role() {
            Some(role) if !session.has_role(role) => {
                debug!(route = %route, role = %session.role, required = %role, "role mismatch");
                (GuardState::Denied, Decision::Redirect(self.mismatch_target()))
            }
            _ => (GuardState::Admitted, Decision::Render(route.clone())),
        }
    }

    fn mismatch_target(&self) -> Route {
        match self.mismatch {
            RoleRedirect::Dashboard => Route::DEFAULT_AUTHENTICATED,
            RoleRedirect::Login => Route::Login,
        }
    }

    fn drain(inner: &mut Inner) {
        loop {
            match inner.events.try_recv() {
                Ok(_) => inner.state = GuardState::Unresolved,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "guard missed session events");
                    inner.state = GuardState::Unresolved;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}
