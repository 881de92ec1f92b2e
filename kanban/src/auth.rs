//! Authentication state.
//!
//! [`AuthProvider`] owns the current [`AuthState`] and publishes every
//! change on a `watch` channel, so any number of observers can react to
//! sign-in and sign-out.

use kanban_proto::model::User;
use tokio::sync::watch;

use crate::store::{AuthBackend, StoreError};

/// Errors raised by sign-in and sign-out.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No email was given.
    #[error("email cannot be empty")]
    EmptyEmail,

    /// The backend refused or could not be reached.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// The signed-in user, if any.
    pub user: Option<User>,
    /// A sign-in or sign-out is in progress.
    pub is_loading: bool,
}

/// Publishes [`AuthState`] changes.
#[derive(Debug)]
pub struct AuthProvider {
    tx: watch::Sender<AuthState>,
}

impl Default for AuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider {
    /// Creates a provider with nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::default());
        Self { tx }
    }

    /// Subscribes to state changes. The receiver sees the current state
    /// immediately and every later change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Returns the signed-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.tx.borrow().user.clone()
    }

    /// Signs in through `backend` and publishes the result.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptyEmail`] for a blank email, or the backend's
    /// error; in both cases the published user is `None`.
    pub async fn sign_in<B: AuthBackend>(
        &self,
        backend: &B,
        email: &str,
        display_name: Option<String>,
    ) -> Result<User, AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::EmptyEmail);
        }

        self.tx.send_modify(|state| state.is_loading = true);
        match backend.sign_in(email, display_name).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "signed in");
                self.tx.send_replace(AuthState {
                    user: Some(user.clone()),
                    is_loading: false,
                });
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "sign-in failed");
                self.tx.send_replace(AuthState::default());
                Err(e.into())
            }
        }
    }

    /// Signs out through `backend` and publishes `None`.
    ///
    /// The local state is cleared even when the backend call fails.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn logout<B: AuthBackend>(&self, backend: &B) -> Result<(), AuthError> {
        self.tx.send_modify(|state| state.is_loading = true);
        let result = backend.sign_out().await;
        self.tx.send_replace(AuthState::default());
        if let Err(e) = &result {
            tracing::warn!(error = %e, "sign-out failed");
        } else {
            tracing::info!("signed out");
        }
        result.map_err(Into::into)
    }
}
