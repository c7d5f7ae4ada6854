//! Remote cart service client.

use async_trait::async_trait;
use mockall::automock;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use tracing::debug;

use crate::{
    auth::BearerCredential,
    domain::carts::{
        errors::CartSyncError,
        records::{CartResponse, RemoteCartItem, RemoteLineKey, RemoteQuantityUpdate},
    },
};

/// Configuration for connecting to the cart API.
#[derive(Debug, Clone)]
pub struct HttpCartConfig {
    /// API base address, e.g. `"https://api.lpshop.vn/api"`.
    pub base_url: String,
}

/// HTTP client for the authenticated cart endpoints.
#[derive(Debug, Clone)]
pub struct HttpCartService {
    config: HttpCartConfig,
    http: Client,
}

impl HttpCartService {
    /// Create a new client from the given configuration.
    #[must_use]
    pub fn new(config: HttpCartConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn request(&self, method: Method, path: &str, credential: &BearerCredential) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(credential.expose())
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        credential: &BearerCredential,
        body: Option<&B>,
    ) -> Result<Response, CartSyncError> {
        let mut request = self.request(method.clone(), path, credential);

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(CartSyncError::UnexpectedResponse(format!(
                "{method} {path} failed with status {status}: {text}"
            )));
        }

        debug!(%method, path, status = %response.status(), "cart service responded");

        Ok(response)
    }
}

#[async_trait]
impl RemoteCartService for HttpCartService {
    async fn get_cart(
        &self,
        credential: &BearerCredential,
    ) -> Result<Vec<RemoteCartItem>, CartSyncError> {
        let response = self
            .send::<()>(Method::GET, "cart", credential, None)
            .await?;

        let parsed: CartResponse = response.json().await?;

        Ok(parsed.items)
    }

    async fn add_to_cart(
        &self,
        credential: &BearerCredential,
        item: &RemoteCartItem,
    ) -> Result<(), CartSyncError> {
        self.send(Method::POST, "cart/items", credential, Some(item))
            .await?;

        Ok(())
    }

    async fn remove_from_cart(
        &self,
        credential: &BearerCredential,
        key: &RemoteLineKey,
    ) -> Result<(), CartSyncError> {
        self.send(Method::DELETE, "cart/items", credential, Some(key))
            .await?;

        Ok(())
    }

    async fn update_cart_item(
        &self,
        credential: &BearerCredential,
        update: &RemoteQuantityUpdate,
    ) -> Result<(), CartSyncError> {
        self.send(Method::PATCH, "cart/items", credential, Some(update))
            .await?;

        Ok(())
    }

    async fn clear_cart(&self, credential: &BearerCredential) -> Result<(), CartSyncError> {
        self.send::<()>(Method::DELETE, "cart", credential, None)
            .await?;

        Ok(())
    }
}

/// Authenticated cart kept by the shop API.
///
/// The remote cart is a best-effort mirror of the local one: callers treat
/// every error as non-fatal.
#[automock]
#[async_trait]
pub trait RemoteCartService: Send + Sync {
    /// Fetch every item of the authenticated cart.
    async fn get_cart(
        &self,
        credential: &BearerCredential,
    ) -> Result<Vec<RemoteCartItem>, CartSyncError>;

    /// Insert an item, or overwrite the quantity of the item with the same variant.
    async fn add_to_cart(
        &self,
        credential: &BearerCredential,
        item: &RemoteCartItem,
    ) -> Result<(), CartSyncError>;

    /// Remove the item with the given variant key.
    async fn remove_from_cart(
        &self,
        credential: &BearerCredential,
        key: &RemoteLineKey,
    ) -> Result<(), CartSyncError>;

    /// Set the quantity of the item with the given variant key.
    async fn update_cart_item(
        &self,
        credential: &BearerCredential,
        update: &RemoteQuantityUpdate,
    ) -> Result<(), CartSyncError>;

    /// Remove every item.
    async fn clear_cart(&self, credential: &BearerCredential) -> Result<(), CartSyncError>;
}
