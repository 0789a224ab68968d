//! Storefront context shared by every view.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::cart::{CartPersistence, CartStore, WriteThrough};
use crate::config::ClientConfig;
use crate::models::User;
use crate::reconcile::ReconciliationEngine;
use crate::services::api::{ApiClient, ApiError};
use crate::services::auth::{AuthError, AuthSession};
use crate::services::checkout::{CheckoutError, WhatsAppCheckout};
use crate::storage::{FileStore, KeyValueStore, StorageError};
use crate::telemetry::{Telemetry, TracingTelemetry, add_breadcrumb};

/// Error building the storefront context.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to build API client: {0}")]
    Api(#[from] ApiError),
}

/// Everything the storefront views need, built once at startup.
///
/// This struct is cheaply cloneable via `Arc`. All clones share the same
/// cart store, session, and reconciliation engine.
#[derive(Clone)]
pub struct StorefrontContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: ClientConfig,
    telemetry: Arc<dyn Telemetry>,
    store: CartStore,
    auth: AuthSession,
    api: ApiClient,
    engine: ReconciliationEngine<ApiClient>,
}

impl std::fmt::Debug for StorefrontContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontContext")
            .field("store", &self.inner.store)
            .field("auth", &self.inner.auth)
            .finish_non_exhaustive()
    }
}

impl StorefrontContext {
    /// Build the context with file-backed storage under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or the HTTP
    /// client fails to build.
    pub fn new(config: ClientConfig) -> Result<Self, ContextError> {
        let storage = Arc::new(FileStore::open(config.data_dir.clone())?);
        Self::with_storage(config, storage, Arc::new(TracingTelemetry))
    }

    /// Build the context over an explicit storage backend and telemetry sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_storage(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self, ContextError> {
        let persistence = CartPersistence::new(Arc::clone(&storage), Arc::clone(&telemetry));
        let store = CartStore::open(persistence, Arc::clone(&telemetry));
        let auth = AuthSession::new(storage);
        let api = ApiClient::new(&config, auth.clone())?;
        let engine = ReconciliationEngine::new(store.clone(), api.clone(), Arc::clone(&telemetry));

        Ok(Self {
            inner: Arc::new(ContextInner {
                config,
                telemetry,
                store,
                auth,
                api,
                engine,
            }),
        })
    }

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the telemetry sink.
    #[must_use]
    pub fn telemetry(&self) -> &Arc<dyn Telemetry> {
        &self.inner.telemetry
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn store(&self) -> &CartStore {
        &self.inner.store
    }

    /// Get a reference to the auth session.
    #[must_use]
    pub fn auth(&self) -> &AuthSession {
        &self.inner.auth
    }

    /// Get a reference to the backend API client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the reconciliation engine.
    #[must_use]
    pub fn engine(&self) -> &ReconciliationEngine<ApiClient> {
        &self.inner.engine
    }

    /// Restore the signed-in user from a stored credential.
    ///
    /// Returns `None` without touching the network when no credential is
    /// held. A credential the backend rejects, or a profile fetch that
    /// fails, signs the session out.
    pub async fn bootstrap(&self) -> Option<User> {
        if !self.inner.auth.is_authenticated() {
            return None;
        }

        match self.inner.api.current_user().await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Restored session");
                Some(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stored credential rejected; signing out");
                if let Err(e) = self.inner.auth.sign_out() {
                    tracing::error!(error = %e, "Failed to clear stale credential");
                }
                None
            }
        }
    }

    /// Reconcile the cart on every future login or registration.
    #[must_use]
    pub fn spawn_reconciler(&self) -> JoinHandle<()> {
        self.inner.engine.spawn_listener(self.inner.auth.subscribe())
    }

    /// Sign out. The cart is kept.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the credential cannot be removed.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.inner.auth.sign_out()
    }

    /// Empty the server cart, then the local cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` without a session, or the backend
    /// error if the server cart could not be deleted. The local cart is left
    /// untouched in both cases.
    pub async fn clear_cart_everywhere(&self) -> Result<WriteThrough, ApiError> {
        self.inner.api.clear_remote_cart().await?;
        Ok(self.inner.store.clear())
    }

    /// Send the cart to the backend and generate a WhatsApp order message.
    ///
    /// The local cart is cleared once the message has been generated.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::NotAuthenticated` without a session,
    /// `CheckoutError::EmptyCart` for an empty cart, and `CheckoutError::Api`
    /// if the backend rejects either request.
    pub async fn checkout_whatsapp(&self) -> Result<WhatsAppCheckout, CheckoutError> {
        if !self.inner.auth.is_authenticated() {
            return Err(CheckoutError::NotAuthenticated);
        }
        let cart = self.inner.store.current();
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.inner.api.push_cart(&cart).await?;
        let checkout = self.inner.api.whatsapp_checkout().await?;

        tracing::info!(lines = cart.len(), "Generated WhatsApp checkout");
        add_breadcrumb("checkout", "whatsapp generated", sentry::Level::Info);
        let _ = self.inner.store.clear();

        Ok(checkout)
    }
}
