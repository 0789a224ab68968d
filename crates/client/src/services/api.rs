//! HTTP client for the storefront backend.
//!
//! All endpoints live under the configured API base URL. Authenticated
//! endpoints send the session credential as a bearer token; a `401`
//! response is surfaced as [`ApiError::Unauthorized`].
//!
//! Error responses carry a JSON body of the form `{"detail": "..."}`.

use mattys_media_core::{Cart, CartLine, ProductId};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use super::auth::{AuthError, AuthKind, AuthSession};
use super::checkout::WhatsAppCheckout;
use crate::cart::wire::WireLine;
use crate::config::ClientConfig;
use crate::models::{AuthResponse, Product, User};
use crate::reconcile::{CartRemote, RemoteError};

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to build a request or parse a response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing, expired, or rejected session credential.
    #[error("unauthorized")]
    Unauthorized,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct CartRequest {
    items: Vec<WireLine>,
}

/// Server cart as returned by `GET /cart` and `POST /cart`.
#[derive(Debug, Deserialize)]
struct CartResponse {
    #[serde(default)]
    items: Vec<WireLine>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Storefront backend client.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    session: AuthSession,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ClientConfig, session: AuthSession) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            session,
        })
    }

    /// The session whose credential this client sends.
    #[must_use]
    pub const fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Sign in with email and password.
    ///
    /// On success the credential is stored and one login event is published.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for a wrong email or password.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let request = self
            .client
            .post(self.endpoint("auth/login")?)
            .json(&LoginRequest { email, password });

        let auth: AuthResponse = match send_json(request).await {
            Err(ApiError::Unauthorized) => return Err(AuthError::InvalidCredentials),
            other => other?,
        };
        self.session
            .sign_in(&auth.token, auth.user.clone(), AuthKind::Login)?;
        Ok(auth.user)
    }

    /// Create an account and sign in.
    ///
    /// On success the credential is stored and one registration event is
    /// published.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email is taken.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<User, AuthError> {
        let request = self
            .client
            .post(self.endpoint("auth/register")?)
            .json(&RegisterRequest {
                email,
                password,
                name,
            });

        let auth: AuthResponse = match send_json(request).await {
            Err(ApiError::Api { status: 400, .. }) => return Err(AuthError::UserAlreadyExists),
            other => other?,
        };
        self.session
            .sign_in(&auth.token, auth.user.clone(), AuthKind::Register)?;
        Ok(auth.user)
    }

    /// Fetch the signed-in user's profile and cache it on the session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the credential is missing or stale.
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<User, ApiError> {
        let request = self.authorized(self.client.get(self.endpoint("auth/me")?))?;
        let user: User = send_json(request).await?;
        self.session.set_current_user(Some(user.clone()));
        Ok(user)
    }

    /// List catalog products, optionally limited to one category.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be parsed.
    #[instrument(skip(self))]
    pub async fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>, ApiError> {
        let request = self.client.get(self.products_url(category)?);
        send_json(request).await
    }

    /// Fetch one catalog product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Api` with status 404 if no product has this ID.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product, ApiError> {
        send_json(self.client.get(self.product_url(product_id)?)).await
    }

    /// Fetch the signed-in user's server cart.
    ///
    /// Lines that do not form a valid cart line are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be parsed.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Result<Cart, ApiError> {
        let request = self.authorized(self.client.get(self.endpoint("cart")?))?;
        let response: CartResponse = send_json(request).await?;
        Ok(cart_from_wire(response.items))
    }

    /// Replace the signed-in user's server cart.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, cart), fields(lines = cart.len()))]
    pub async fn push_cart(&self, cart: &Cart) -> Result<(), ApiError> {
        let body = CartRequest {
            items: cart.iter().map(WireLine::from).collect(),
        };
        let request = self
            .authorized(self.client.post(self.endpoint("cart")?))?
            .json(&body);
        let _: CartResponse = send_json(request).await?;
        Ok(())
    }

    /// Delete the signed-in user's server cart.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self))]
    pub async fn clear_remote_cart(&self) -> Result<(), ApiError> {
        let request = self.authorized(self.client.delete(self.endpoint("cart")?))?;
        check_status(request.send().await?).await?;
        Ok(())
    }

    /// Generate a WhatsApp order message from the server cart.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Api` with status 400 if the server cart is empty.
    #[instrument(skip(self))]
    pub async fn whatsapp_checkout(&self) -> Result<WhatsAppCheckout, ApiError> {
        let request = self.authorized(self.client.post(self.endpoint("checkout/whatsapp")?))?;
        send_json(request).await
    }

    fn products_url(&self, category: Option<&str>) -> Result<Url, ApiError> {
        let mut url = self.endpoint("products")?;
        if let Some(category) = category {
            url.query_pairs_mut().append_pair("category", category);
        }
        Ok(url)
    }

    fn product_url(&self, product_id: &ProductId) -> Result<Url, ApiError> {
        let mut url = self.endpoint("products")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Parse(format!("Invalid product URL for {product_id}")))?
            .push(product_id.as_str());
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Parse(format!("Invalid endpoint {path}: {e}")))
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self.session.token().ok_or(ApiError::Unauthorized)?;
        Ok(request.bearer_auth(token.expose_secret()))
    }
}

impl CartRemote for ApiClient {
    async fn fetch_cart(&self) -> Result<Cart, RemoteError> {
        Ok(Self::fetch_cart(self).await?)
    }

    async fn push_cart(&self, cart: &Cart) -> Result<(), RemoteError> {
        Ok(Self::push_cart(self, cart).await?)
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
    let response = check_status(request.send().await?).await?;
    response
        .json()
        .await
        .map_err(|e| ApiError::Parse(e.to_string()))
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status, &body))
}

fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    if status == StatusCode::UNAUTHORIZED {
        return ApiError::Unauthorized;
    }
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.to_string(),
    };
    ApiError::Api {
        status: status.as_u16(),
        message,
    }
}

fn cart_from_wire(items: Vec<WireLine>) -> Cart {
    items
        .into_iter()
        .filter_map(|item| match CartLine::try_from(item) {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping invalid line from server cart");
                None
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::MemoryStore;

    fn client() -> ApiClient {
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        ApiClient::new(&config, AuthSession::new(Arc::new(MemoryStore::new()))).unwrap()
    }

    #[test]
    fn test_endpoints_join_under_api_base() {
        let client = client();
        assert_eq!(
            client.endpoint("auth/login").unwrap().as_str(),
            "http://localhost:8000/api/auth/login"
        );
        assert_eq!(
            client.endpoint("checkout/whatsapp").unwrap().as_str(),
            "http://localhost:8000/api/checkout/whatsapp"
        );
    }

    #[test]
    fn test_product_urls() {
        let client = client();
        assert_eq!(
            client.products_url(None).unwrap().as_str(),
            "http://localhost:8000/api/products"
        );
        assert_eq!(
            client.products_url(Some("business-cards")).unwrap().as_str(),
            "http://localhost:8000/api/products?category=business-cards"
        );
        assert_eq!(
            client.product_url(&ProductId::new("p 1")).unwrap().as_str(),
            "http://localhost:8000/api/products/p%201"
        );
    }

    #[test]
    fn test_product_list_parses() {
        let products: Vec<Product> = serde_json::from_str(
            r#"[{"id":"p-1","name":"Vinyl Banner","category":"banners",
                 "description":"Outdoor vinyl.","base_price":89.99,"images":[]}]"#,
        )
        .unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].base_price, Decimal::new(8999, 2));
    }

    #[test]
    fn test_authorized_requires_credential() {
        let client = client();
        let request = client.client.get(client.endpoint("cart").unwrap());
        assert!(matches!(
            client.authorized(request),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn test_authorized_sends_bearer_token() {
        let storage = Arc::new(MemoryStore::new());
        storage.insert(crate::storage::keys::AUTH_TOKEN, "tok-9");
        let config = ClientConfig::from_lookup(|_| None).unwrap();
        let client = ApiClient::new(&config, AuthSession::new(storage)).unwrap();

        let request = client
            .authorized(client.client.get(client.endpoint("cart").unwrap()))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            request.headers().get("authorization").unwrap(),
            "Bearer tok-9"
        );
    }

    #[test]
    fn test_error_body_detail() {
        let err = error_from_body(StatusCode::BAD_REQUEST, r#"{"detail":"Cart is empty"}"#);
        assert!(matches!(
            err,
            ApiError::Api { status: 400, ref message } if message == "Cart is empty"
        ));

        let err = error_from_body(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(
            err,
            ApiError::Api { status: 502, ref message } if message == "upstream down"
        ));

        assert!(matches!(
            error_from_body(StatusCode::UNAUTHORIZED, r#"{"detail":"Token expired"}"#),
            ApiError::Unauthorized
        ));
    }

    #[test]
    fn test_server_cart_drops_invalid_lines() {
        let response: CartResponse = serde_json::from_str(
            r#"{"id":"c1","total":30.0,"items":[
                {"product_id":"a","product_name":"A","quantity":2,"price":10.0},
                {"product_id":"b","product_name":"B","quantity":0,"price":5.0},
                {"product_id":"c","product_name":"C","quantity":1,"custom_text":"hi","price":10.0}
            ]}"#,
        )
        .unwrap();

        let cart = cart_from_wire(response.items);
        assert_eq!(cart.len(), 2);
        assert_eq!(cart.totals().total_price, Decimal::new(30, 0));
        assert_eq!(cart.get(1).unwrap().custom_text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_empty_server_cart() {
        let response: CartResponse =
            serde_json::from_str(r#"{"id":"","items":[],"total":0.0}"#).unwrap();
        assert!(cart_from_wire(response.items).is_empty());
    }

    #[test]
    fn test_push_body_uses_wire_layout() {
        let cart = Cart::from_lines([CartLine::new(
            "mug",
            "Mug",
            mattys_media_core::Quantity::new(2).unwrap(),
            mattys_media_core::Price::from_cents(1250).unwrap(),
        )]);
        let body = CartRequest {
            items: cart.iter().map(WireLine::from).collect(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"items": [{
                "product_id": "mug",
                "product_name": "Mug",
                "quantity": 2,
                "custom_text": null,
                "price": 12.5
            }]})
        );
    }
}
