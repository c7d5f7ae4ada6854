//! Test Helpers

use std::sync::{Arc, Mutex, PoisonError};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jiff::Timestamp;
use serde_json::{Value, json};

use crate::{
    auth::BearerCredential,
    domain::carts::{
        CartSyncError, MockRemoteCartService,
        models::{CartLine, NewCartLine},
        records::{RemoteCartItem, RemoteLineKey, RemoteQuantityUpdate},
    },
};

/// A JWT-shaped credential carrying the given claims. The signature is junk.
pub(crate) fn credential_with_claims(claims: &Value) -> BearerCredential {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

    BearerCredential::new(format!("{header}.{payload}.c2lnbmF0dXJl"))
}

pub(crate) fn credential_for(subject: &str) -> BearerCredential {
    credential_with_claims(&json!({ "sub": subject }))
}

pub(crate) fn candidate(product: &str, price: u64, stock: u32) -> NewCartLine {
    NewCartLine {
        product_id: product.to_string(),
        display_name: format!("Product {product}"),
        slug: product.to_lowercase(),
        image_url: format!("https://cdn.example/{product}.png"),
        unit_price: price,
        sale_price: None,
        size: None,
        color: None,
        stock_snapshot: stock,
    }
}

pub(crate) fn variant(
    product: &str,
    size: &str,
    color: &str,
    price: u64,
    stock: u32,
) -> NewCartLine {
    NewCartLine {
        size: Some(size.to_string()),
        color: Some(color.to_string()),
        ..candidate(product, price, stock)
    }
}

pub(crate) fn line(product: &str, price: u64, stock: u32, quantity: u32) -> CartLine {
    CartLine::from_candidate(candidate(product, price, stock), quantity, Timestamp::UNIX_EPOCH)
}

pub(crate) fn remote_item(line: &CartLine) -> RemoteCartItem {
    RemoteCartItem::from(line)
}

/// A remote call observed by [`recording_remote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RemoteCall {
    Add(RemoteCartItem),
    Remove(RemoteLineKey),
    Update(RemoteQuantityUpdate),
    Clear,
}

pub(crate) type RemoteCalls = Arc<Mutex<Vec<RemoteCall>>>;

pub(crate) fn recorded(calls: &RemoteCalls) -> Vec<RemoteCall> {
    calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// A mock remote serving `cart` (or failing when `None`) and recording every
/// mutation it receives.
pub(crate) fn recording_remote(
    cart: Option<Vec<RemoteCartItem>>,
) -> (MockRemoteCartService, RemoteCalls) {
    let calls: RemoteCalls = Arc::default();
    let mut remote = MockRemoteCartService::new();

    remote.expect_get_cart().returning(move |_| {
        cart.clone()
            .ok_or_else(|| CartSyncError::UnexpectedResponse("connection reset".to_string()))
    });

    let log = Arc::clone(&calls);
    remote.expect_add_to_cart().returning(move |_, item| {
        push(&log, RemoteCall::Add(item.clone()));
        Ok(())
    });

    let log = Arc::clone(&calls);
    remote.expect_remove_from_cart().returning(move |_, key| {
        push(&log, RemoteCall::Remove(key.clone()));
        Ok(())
    });

    let log = Arc::clone(&calls);
    remote.expect_update_cart_item().returning(move |_, update| {
        push(&log, RemoteCall::Update(update.clone()));
        Ok(())
    });

    let log = Arc::clone(&calls);
    remote.expect_clear_cart().returning(move |_| {
        push(&log, RemoteCall::Clear);
        Ok(())
    });

    (remote, calls)
}

fn push(calls: &RemoteCalls, call: RemoteCall) {
    calls
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(call);
}
