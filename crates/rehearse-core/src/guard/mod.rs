//! Route guard for authenticated areas.
//!
//! [`RouteGuard`] is a small state machine fed with [`AuthSnapshot`]s. It
//! decides whether a protected route may render, must redirect to the login
//! route, or should surface a configuration problem when auth never finishes
//! loading.

use std::fmt;
use std::time::Duration;

use crate::auth::{AuthController, AuthSnapshot, IdentityApi};
use crate::config::ConnectionMode;

/// How long a protected route waits for auth to finish loading.
pub const GUARD_GRACE_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Landing,
    Login,
    Signup,
    ForgotPassword,
    Practice,
    History,
    TailoredQuestions,
    Diagnostics,
    SetupError,
}

impl Route {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Login => "/login",
            Self::Signup => "/signup",
            Self::ForgotPassword => "/forgot-password",
            Self::Practice => "/practice",
            Self::History => "/history",
            Self::TailoredQuestions => "/tailored-questions",
            Self::Diagnostics => "/supabase-test",
            Self::SetupError => "/setup-error",
        }
    }

    /// Routes that need a signed-in identity.
    #[must_use]
    pub const fn is_protected(self) -> bool {
        matches!(self, Self::Practice | Self::History | Self::TailoredQuestions)
    }

    /// Login and signup never time out into a configuration error.
    #[must_use]
    pub const fn is_public_auth_page(self) -> bool {
        matches!(self, Self::Login | Self::Signup)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Shown when auth did not settle within the grace period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationGuidance {
    pub title: &'static str,
    pub causes: [&'static str; 3],
    pub tip: &'static str,
    pub links: [Route; 2],
}

impl Default for ConfigurationGuidance {
    fn default() -> Self {
        Self {
            title: "Configuration Issue Detected",
            causes: [
                "Missing or incorrect environment variables",
                "Supabase project not properly set up",
                "Network connectivity issues",
            ],
            tip: "Check your .env file for proper Supabase URL and anon key.",
            links: [Route::SetupError, Route::Login],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// Nothing evaluated yet; render nothing.
    Undetermined,
    /// No identity while auth is still loading.
    Pending,
    Authorized,
    /// Redirect to the login route.
    Unauthorized { redirect: Route },
    ConfigurationError(ConfigurationGuidance),
}

impl GuardState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Authorized | Self::Unauthorized { .. } | Self::ConfigurationError(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    route: Route,
    mode: ConnectionMode,
    state: GuardState,
}

impl RouteGuard {
    #[must_use]
    pub const fn new(route: Route, mode: ConnectionMode) -> Self {
        Self {
            route,
            mode,
            state: GuardState::Undetermined,
        }
    }

    #[must_use]
    pub const fn route(&self) -> Route {
        self.route
    }

    #[must_use]
    pub const fn state(&self) -> &GuardState {
        &self.state
    }

    /// Apply one auth snapshot. Terminal states are sticky.
    pub fn evaluate(&mut self, snapshot: &AuthSnapshot) -> &GuardState {
        if self.state.is_terminal() {
            return &self.state;
        }

        self.state = if self.route.is_protected() && self.mode == ConnectionMode::Mock {
            GuardState::Unauthorized {
                redirect: Route::SetupError,
            }
        } else if snapshot.identity.is_some() {
            GuardState::Authorized
        } else if snapshot.loading {
            GuardState::Pending
        } else {
            GuardState::Unauthorized {
                redirect: Route::Login,
            }
        };
        &self.state
    }

    /// The grace period ran out. Only a pending guard off the auth pages reacts.
    pub fn grace_elapsed(&mut self) -> &GuardState {
        if self.state == GuardState::Pending && !self.route.is_public_auth_page() {
            tracing::warn!(
                "Auth did not finish loading within {:?} on {}",
                GUARD_GRACE_PERIOD,
                self.route
            );
            self.state = GuardState::ConfigurationError(ConfigurationGuidance::default());
        }
        &self.state
    }

    /// Drive the guard against a live controller until it reaches a terminal state.
    ///
    /// On login and signup this waits for loading to finish without a deadline.
    pub async fn resolve<A: IdentityApi>(&mut self, controller: &AuthController<A>) -> GuardState {
        let mut receiver = controller.watch();
        let snapshot = receiver.borrow_and_update().clone();
        self.evaluate(&snapshot);

        let deadline = tokio::time::sleep(GUARD_GRACE_PERIOD);
        tokio::pin!(deadline);
        let mut deadline_armed = !self.route.is_public_auth_page();

        while !self.state.is_terminal() {
            tokio::select! {
                changed = receiver.changed() => {
                    let mut snapshot = receiver.borrow_and_update().clone();
                    if changed.is_err() {
                        // Controller gone; nothing will finish loading any more.
                        snapshot.loading = false;
                    }
                    self.evaluate(&snapshot);
                }
                () = &mut deadline, if deadline_armed => {
                    deadline_armed = false;
                    self.grace_elapsed();
                }
            }
        }

        tracing::debug!("Guard for {} settled: {:?}", self.route, self.state);
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::Identity;
    use crate::testing::FakeIdentity;

    fn snapshot(identity: Option<&str>, loading: bool) -> AuthSnapshot {
        AuthSnapshot {
            identity: identity.map(|id| Identity {
                id: id.to_string(),
                email: None,
                display_name: None,
            }),
            loading,
        }
    }

    #[test]
    fn starts_undetermined() {
        let guard = RouteGuard::new(Route::Practice, ConnectionMode::Configured);
        assert_eq!(guard.state(), &GuardState::Undetermined);
    }

    #[test]
    fn identity_authorizes() {
        let mut guard = RouteGuard::new(Route::History, ConnectionMode::Configured);
        assert_eq!(guard.evaluate(&snapshot(Some("u"), true)), &GuardState::Authorized);
    }

    #[test]
    fn loading_without_identity_is_pending_then_unauthorized() {
        let mut guard = RouteGuard::new(Route::Practice, ConnectionMode::Configured);
        assert_eq!(guard.evaluate(&snapshot(None, true)), &GuardState::Pending);
        assert_eq!(
            guard.evaluate(&snapshot(None, false)),
            &GuardState::Unauthorized {
                redirect: Route::Login
            }
        );
    }

    #[test]
    fn never_authorizes_without_identity_once_loaded() {
        for route in [Route::Practice, Route::History, Route::TailoredQuestions, Route::Login] {
            let mut guard = RouteGuard::new(route, ConnectionMode::Configured);
            assert_ne!(guard.evaluate(&snapshot(None, false)), &GuardState::Authorized);
        }
    }

    #[test]
    fn grace_period_turns_pending_into_configuration_error() {
        let mut guard = RouteGuard::new(Route::Practice, ConnectionMode::Configured);
        guard.evaluate(&snapshot(None, true));
        let state = guard.grace_elapsed().clone();
        let GuardState::ConfigurationError(guidance) = state else {
            panic!("expected configuration error, got {state:?}");
        };
        assert_eq!(guidance.links, [Route::SetupError, Route::Login]);
    }

    #[test]
    fn grace_period_is_ignored_on_auth_pages() {
        let mut guard = RouteGuard::new(Route::Login, ConnectionMode::Configured);
        guard.evaluate(&snapshot(None, true));
        assert_eq!(guard.grace_elapsed(), &GuardState::Pending);
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut guard = RouteGuard::new(Route::Practice, ConnectionMode::Configured);
        guard.evaluate(&snapshot(Some("u"), false));
        assert_eq!(guard.evaluate(&snapshot(None, false)), &GuardState::Authorized);
    }

    #[test]
    fn mock_mode_sends_protected_routes_to_setup_error() {
        let mut guard = RouteGuard::new(Route::TailoredQuestions, ConnectionMode::Mock);
        assert_eq!(
            guard.evaluate(&snapshot(Some("u"), false)),
            &GuardState::Unauthorized {
                redirect: Route::SetupError
            }
        );
        let mut login = RouteGuard::new(Route::Login, ConnectionMode::Mock);
        assert_eq!(login.evaluate(&snapshot(None, true)), &GuardState::Pending);
    }

    #[tokio::test]
    async fn resolve_authorizes_existing_session() {
        let controller = AuthController::start(Arc::new(FakeIdentity::signed_in("user-1")));
        let mut guard = RouteGuard::new(Route::Practice, ConnectionMode::Configured);
        assert_eq!(guard.resolve(&controller).await, GuardState::Authorized);
    }

    #[tokio::test]
    async fn resolve_redirects_when_signed_out() {
        let controller = AuthController::start(Arc::new(FakeIdentity::default()));
        let mut guard = RouteGuard::new(Route::History, ConnectionMode::Configured);
        assert_eq!(
            guard.resolve(&controller).await,
            GuardState::Unauthorized {
                redirect: Route::Login
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_times_out_into_configuration_error() {
        let api = Arc::new(FakeIdentity::default());
        api.hang_session_lookup();
        let controller = AuthController::start(Arc::clone(&api));
        let mut guard = RouteGuard::new(Route::Practice, ConnectionMode::Configured);

        let state = guard.resolve(&controller).await;
        assert!(matches!(state, GuardState::ConfigurationError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn login_page_keeps_waiting_past_the_grace_period() {
        let api = Arc::new(FakeIdentity::default());
        api.hang_session_lookup();
        let controller = AuthController::start(Arc::clone(&api));
        let mut guard = RouteGuard::new(Route::Login, ConnectionMode::Configured);

        let waited = tokio::time::timeout(
            GUARD_GRACE_PERIOD + std::time::Duration::from_secs(1),
            guard.resolve(&controller),
        )
        .await;
        assert!(waited.is_err());
        assert_eq!(guard.state(), &GuardState::Pending);

        api.release_session_lookup();
        assert_eq!(
            guard.resolve(&controller).await,
            GuardState::Unauthorized {
                redirect: Route::Login
            }
        );
    }
}
