//! Session manager: the single writer of the authenticated-identity state.
//!
//! Consumers never share the manager itself; they hold a [`SessionHandle`],
//! a cheap watch receiver that sees every transition.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::models::{Identity, Session};
use crate::error::{Error, ValidationError};
use crate::sync::contract::{IdentityProvider, VerificationKind};
use crate::sync::validate;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// Startup: stored-session recovery has not finished yet.
    Initializing,
    SignedOut,
    SignedIn(Session),
}

impl AuthState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    pub fn identity_id(&self) -> Option<Uuid> {
        self.session().map(|session| session.user.id)
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self, Self::Initializing)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Upper bound on stored-session recovery during startup.
    pub recovery_timeout: Duration,
    /// Independent timer that ends the initializing state no matter what.
    pub failsafe: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recovery_timeout: Duration::from_secs(10),
            failsafe: Duration::from_secs(5),
        }
    }
}

/// Read side of the session state, handed to every repository.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<AuthState>,
    observed: Option<Uuid>,
}

impl SessionHandle {
    fn new(rx: watch::Receiver<AuthState>) -> Self {
        let observed = rx.borrow().identity_id();
        Self { rx, observed }
    }

    pub fn state(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.rx.borrow().session().cloned()
    }

    pub fn identity_id(&self) -> Option<Uuid> {
        self.rx.borrow().identity_id()
    }

    pub fn require(&self) -> Result<Session, Error> {
        self.session().ok_or(Error::NotSignedIn)
    }

    /// Reports whether the signed-in identity differs from the one seen on
    /// the previous call, and remembers the current one.
    pub fn take_transition(&mut self) -> bool {
        let current = self.rx.borrow_and_update().identity_id();
        if current != self.observed {
            self.observed = current;
            true
        } else {
            false
        }
    }
}

pub struct SessionManager<P> {
    provider: Arc<P>,
    state: Arc<watch::Sender<AuthState>>,
    config: SessionConfig,
}

impl<P: IdentityProvider + 'static> SessionManager<P> {
    pub fn new(provider: Arc<P>, config: SessionConfig) -> Self {
        let (tx, _) = watch::channel(AuthState::Initializing);
        Self {
            provider,
            state: Arc::new(tx),
            config,
        }
    }

    pub fn subscribe(&self) -> SessionHandle {
        SessionHandle::new(self.state.subscribe())
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    /// Recovers a stored session, bounded by the recovery timeout. A failsafe
    /// task forces `SignedOut` if the state is still initializing when it fires.
    /// A session established by sign-in or verification while recovery is
    /// pending wins over the recovery outcome.
    pub async fn initialize(&self) -> AuthState {
        self.publish(AuthState::Initializing);
        let failsafe = self.spawn_failsafe();

        let recovered =
            tokio::time::timeout(self.config.recovery_timeout, self.provider.get_session()).await;
        failsafe.abort();

        let next = match recovered {
            Ok(Ok(Some(session))) if !session.is_expired(Utc::now()) => {
                info!(user_id = %session.user.id, "session recovered");
                AuthState::SignedIn(session)
            }
            Ok(Ok(_)) => {
                info!("no stored session");
                AuthState::SignedOut
            }
            Ok(Err(err)) => {
                warn!(error = %err, "session recovery failed");
                AuthState::SignedOut
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.recovery_timeout.as_millis() as u64,
                    "session recovery timed out"
                );
                AuthState::SignedOut
            }
        };
        self.state.send_if_modified(|current| {
            if matches!(current, AuthState::SignedIn(_)) {
                debug!("recovery outcome superseded by a newer session");
                false
            } else if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        self.state()
    }

    fn spawn_failsafe(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let after = self.config.failsafe;
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            state.send_if_modified(|current| {
                if current.is_initializing() {
                    warn!("failsafe fired; leaving initializing state");
                    *current = AuthState::SignedOut;
                    true
                } else {
                    false
                }
            });
        })
    }

    fn publish(&self, next: AuthState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Creates a pending identity. No session is established until the
    /// address is confirmed.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, Error> {
        let email = validate::email(email)?;
        validate::password(password)?;
        let display_name = validate::optional_text(display_name);

        let identity = self
            .provider
            .sign_up(&email, password, display_name.as_deref())
            .await
            .map_err(|err| {
                warn!(error = %err, "sign up rejected");
                Error::from(err)
            })?;
        info!(user_id = %identity.id, "sign up pending confirmation");
        Ok(identity)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, Error> {
        let email = validate::email(email)?;
        let session = self
            .provider
            .sign_in(&email, password)
            .await
            .map_err(|err| {
                warn!(error = %err, "sign in rejected");
                Error::from(err)
            })?;
        info!(user_id = %session.user.id, "signed in");
        self.publish(AuthState::SignedIn(session.clone()));
        Ok(session)
    }

    /// Drops the local session whatever the provider says. Signing out while
    /// signed out is a no-op.
    pub async fn sign_out(&self) -> Result<(), Error> {
        let Some(session) = self.current_session() else {
            debug!("sign out without an active session");
            return Ok(());
        };
        self.publish(AuthState::SignedOut);
        if let Err(err) = self.provider.sign_out(&session.access_token).await {
            warn!(error = %err, "provider sign out failed; local session dropped anyway");
        }
        info!(user_id = %session.user.id, "signed out");
        Ok(())
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), Error> {
        let email = validate::email(email)?;
        self.provider.reset_password(&email).await?;
        info!("password recovery requested");
        Ok(())
    }

    pub async fn update_password(&self, password: &str, confirmation: &str) -> Result<(), Error> {
        validate::new_password(password, confirmation)?;
        let session = self.current_session().ok_or(Error::NotSignedIn)?;
        let identity = self
            .provider
            .update_password(&session.access_token, password)
            .await?;
        info!(user_id = %identity.id, "password updated");
        self.replace_identity(identity);
        Ok(())
    }

    /// Confirms a sign-up, or opens a recovery session before a password reset.
    pub async fn verify(&self, token: &str, kind: VerificationKind) -> Result<Session, Error> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ValidationError::EmptyToken.into());
        }
        let session = self.provider.verify(token, kind).await?;
        info!(user_id = %session.user.id, kind = kind.as_str(), "token verified");
        self.publish(AuthState::SignedIn(session.clone()));
        Ok(session)
    }

    pub async fn resend_confirmation(&self, email: &str) -> Result<(), Error> {
        let email = validate::email(email)?;
        self.provider.resend_confirmation(&email).await?;
        info!("confirmation resent");
        Ok(())
    }

    /// Edits the display name of the signed-in identity. The change lives in
    /// local state only; nothing is written to the provider.
    pub fn update_profile(&self, display_name: &str) -> Result<Identity, Error> {
        let mut identity = self.current_session().ok_or(Error::NotSignedIn)?.user;
        identity.display_name = validate::optional_text(display_name);
        self.replace_identity(identity.clone());
        Ok(identity)
    }

    fn replace_identity(&self, identity: Identity) {
        self.state.send_if_modified(|current| match current {
            AuthState::SignedIn(session) if session.user.id == identity.id => {
                session.user = identity;
                true
            }
            _ => false,
        });
    }
}
