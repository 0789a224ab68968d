//! Authentication session state.
//!
//! The session credential lives under [`keys::AUTH_TOKEN`] so it survives
//! restarts and can be checked synchronously at startup. Every successful
//! login or registration publishes exactly one [`AuthEvent`]; the
//! reconciliation engine listens for these.
//!
//! Signing out removes the credential and the cached profile. The cart is
//! left untouched so it carries over into the next anonymous session.

mod error;

pub use error::AuthError;

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::SecretString;
use tokio::sync::broadcast;

use crate::models::User;
use crate::storage::{KeyValueStore, keys};

/// Capacity of the auth event channel.
const EVENT_CAPACITY: usize = 16;

/// How the user authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Login,
    Register,
}

impl AuthKind {
    /// Stable lowercase name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }
}

/// A successful login or registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthKind,
    pub user: User,
}

/// Credential storage, current user, and the auth-success event stream.
///
/// Cheaply cloneable; clones share state and the event channel.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    storage: Arc<dyn KeyValueStore>,
    current_user: RwLock<Option<User>>,
    events: broadcast::Sender<AuthEvent>,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("authenticated", &self.is_authenticated())
            .field("current_user", &self.current_user())
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    /// Create a session backed by `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(AuthInner {
                storage,
                current_user: RwLock::new(None),
                events,
            }),
        }
    }

    /// Whether a credential is currently held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read_token().is_some_and(|token| !token.is_empty())
    }

    /// The stored bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.read_token()
            .filter(|token| !token.is_empty())
            .map(SecretString::from)
    }

    /// Profile of the signed-in user, once known.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.inner
            .current_user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cache the signed-in user's profile.
    pub fn set_current_user(&self, user: Option<User>) {
        *self
            .inner
            .current_user
            .write()
            .unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// Store a new credential and publish an [`AuthEvent`].
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the credential cannot be stored. No
    /// event is published in that case.
    pub fn sign_in(&self, token: &str, user: User, kind: AuthKind) -> Result<(), AuthError> {
        self.inner.storage.set(keys::AUTH_TOKEN, token)?;
        self.set_current_user(Some(user.clone()));

        tracing::info!(user_id = %user.id, kind = kind.as_str(), "User authenticated");
        sentry::configure_scope(|scope| {
            scope.set_user(Some(sentry::User {
                id: Some(user.id.to_string()),
                email: Some(user.email.clone()),
                ..Default::default()
            }));
        });

        // No receivers just means nobody is reconciling yet
        let _ = self.inner.events.send(AuthEvent { kind, user });
        Ok(())
    }

    /// Drop the credential and cached profile. The cart is not touched.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the credential cannot be removed.
    pub fn sign_out(&self) -> Result<(), AuthError> {
        self.inner.storage.remove(keys::AUTH_TOKEN)?;
        self.set_current_user(None);
        sentry::configure_scope(|scope| scope.set_user(None));
        tracing::info!("User signed out");
        Ok(())
    }

    /// Subscribe to auth-success events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    fn read_token(&self) -> Option<String> {
        match self.inner.storage.get(keys::AUTH_TOKEN) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read session credential");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mattys_media_core::UserId;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::storage::MemoryStore;

    fn user() -> User {
        User {
            id: UserId::new("u-1"),
            email: "matty@example.com".to_string(),
            name: "Matty".to_string(),
        }
    }

    #[test]
    fn test_credential_survives_new_session() {
        let storage = Arc::new(MemoryStore::new());
        let session = AuthSession::new(storage.clone());
        assert!(!session.is_authenticated());

        session.sign_in("tok-123", user(), AuthKind::Login).unwrap();
        assert!(session.is_authenticated());

        let restarted = AuthSession::new(storage);
        assert!(restarted.is_authenticated());
        assert_eq!(restarted.token().unwrap().expose_secret(), "tok-123");
        // Profile is not persisted; it is fetched again at startup
        assert_eq!(restarted.current_user(), None);
    }

    #[test]
    fn test_sign_in_publishes_one_event() {
        let session = AuthSession::new(Arc::new(MemoryStore::new()));
        let mut events = session.subscribe();

        session.sign_in("tok", user(), AuthKind::Register).unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, AuthKind::Register);
        assert_eq!(event.user, user());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_sign_out_clears_credential_without_event() {
        let session = AuthSession::new(Arc::new(MemoryStore::new()));
        session.sign_in("tok", user(), AuthKind::Login).unwrap();
        let mut events = session.subscribe();

        session.sign_out().unwrap();

        assert!(!session.is_authenticated());
        assert_eq!(session.token().map(|t| t.expose_secret().to_owned()), None);
        assert_eq!(session.current_user(), None);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_failed_credential_write_publishes_nothing() {
        let session = AuthSession::new(Arc::new(MemoryStore::with_quota(2)));
        let mut events = session.subscribe();

        let result = session.sign_in("a-long-token", user(), AuthKind::Login);
        assert!(matches!(result, Err(AuthError::Storage(_))));
        assert!(!session.is_authenticated());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_empty_token_is_not_authenticated() {
        let storage = Arc::new(MemoryStore::new());
        storage.insert(keys::AUTH_TOKEN, "");
        let session = AuthSession::new(storage);
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
    }
}
