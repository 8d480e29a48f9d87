//! Observable auth state for the whole application.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::{AuthEvent, AuthResult, IdentityApi, SignUpOutcome};
use crate::models::Identity;

/// What every auth-dependent consumer renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub identity: Option<Identity>,
    pub loading: bool,
}

impl AuthSnapshot {
    const fn initial() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }
}

/// Single writer of the auth snapshot.
///
/// One listener task follows the identity provider's event stream for as long
/// as the controller lives. Dropping the controller aborts it.
pub struct AuthController<A: IdentityApi> {
    api: Arc<A>,
    state: Arc<watch::Sender<AuthSnapshot>>,
    listener: Option<JoinHandle<()>>,
}

impl<A: IdentityApi> AuthController<A> {
    /// Publish `loading = true`, subscribe once, and resolve any existing session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(api: Arc<A>) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::initial());
        let state = Arc::new(state);
        // Subscribe before the initial lookup so no event is missed in between.
        let events = api.subscribe();
        let listener = tokio::spawn(listen(Arc::clone(&api), Arc::clone(&state), events));

        Self {
            api,
            state,
            listener: Some(listener),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Wait until the initial session lookup has finished.
    pub async fn ready(&self) -> AuthSnapshot {
        let mut receiver = self.state.subscribe();
        let settled = receiver
            .wait_for(|snapshot| !snapshot.loading)
            .await
            .map(|snapshot| snapshot.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let session = self.api.sign_in(email, password).await?;
        publish(&self.state, Some(session.user.clone()));
        Ok(session.user)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<SignUpOutcome> {
        let outcome = self.api.sign_up(email, password, display_name).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            publish(&self.state, Some(session.user.clone()));
        }
        Ok(outcome)
    }

    /// Forget the identity locally, then tell the provider.
    ///
    /// A provider failure is logged; the local identity stays cleared.
    pub async fn sign_out(&self) {
        publish(&self.state, None);
        if let Err(error) = self.api.sign_out().await {
            tracing::warn!("Remote sign-out failed: {}", error);
        }
    }

    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        self.api.reset_password(email).await
    }

    /// Stop following identity-change events.
    pub fn shutdown(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl<A: IdentityApi> Drop for AuthController<A> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn publish(state: &watch::Sender<AuthSnapshot>, identity: Option<Identity>) {
    state.send_modify(|snapshot| {
        snapshot.identity = identity;
        snapshot.loading = false;
    });
}

async fn listen<A: IdentityApi>(
    api: Arc<A>,
    state: Arc<watch::Sender<AuthSnapshot>>,
    mut events: broadcast::Receiver<AuthEvent>,
) {
    match api.current_session().await {
        Ok(session) => publish(&state, session.map(|session| session.user)),
        Err(error) => {
            tracing::warn!("Failed to load existing session: {}", error);
            publish(&state, None);
        }
    }

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Auth listener skipped {} events", skipped);
                AuthEvent::TokenRefreshed
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        tracing::debug!("Auth event: {:?}", event);

        if event == AuthEvent::SignedOut {
            publish(&state, None);
            continue;
        }
        match api.current_identity().await {
            Ok(identity) => publish(&state, identity),
            Err(error) => {
                tracing::warn!("Failed to resolve identity after {:?}: {}", event, error);
                let current = state.borrow().identity.clone();
                publish(&state, current);
            }
        }
    }
}
