//! Cart Records
//!
//! Wire shapes exchanged with the remote cart service.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::domain::carts::models::{CartLine, LineId, VariantKey, normalize_selector};

/// Cart item as stored by the remote cart service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCartItem {
    pub product_ref: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub image_url: String,
    pub price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<u64>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub stock: u32,
}

impl RemoteCartItem {
    /// Map into a local line, minting a local line id.
    #[must_use]
    pub fn into_line(self, created_at: Timestamp) -> CartLine {
        let key = VariantKey::new(self.product_ref, self.size, self.color);

        CartLine {
            line_id: LineId::generate(&key, created_at),
            product_id: key.product_id,
            display_name: self.display_name,
            slug: self.slug,
            image_url: self.image_url,
            unit_price: self.price,
            sale_price: self.sale_price,
            size: key.size,
            color: key.color,
            quantity: self.quantity,
            stock_snapshot: self.stock,
        }
    }
}

impl From<&CartLine> for RemoteCartItem {
    fn from(line: &CartLine) -> Self {
        Self {
            product_ref: line.product_id.clone(),
            display_name: line.display_name.clone(),
            slug: line.slug.clone(),
            image_url: line.image_url.clone(),
            price: line.unit_price,
            sale_price: line.sale_price,
            size: normalize_selector(line.size.clone()),
            color: normalize_selector(line.color.clone()),
            quantity: line.quantity,
            stock: line.stock_snapshot,
        }
    }
}

/// Variant key as addressed by the remote cart service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLineKey {
    pub product_ref: String,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl From<VariantKey> for RemoteLineKey {
    fn from(key: VariantKey) -> Self {
        Self {
            product_ref: key.product_id,
            size: key.size,
            color: key.color,
        }
    }
}

/// Quantity change for one remote cart item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteQuantityUpdate {
    pub product_ref: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub quantity: u32,
}

impl RemoteQuantityUpdate {
    #[must_use]
    pub fn new(key: VariantKey, quantity: u32) -> Self {
        Self {
            product_ref: key.product_id,
            size: key.size,
            color: key.color,
            quantity,
        }
    }
}

/// Body of the remote `GET /cart` response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CartResponse {
    #[serde(default)]
    pub items: Vec<RemoteCartItem>,
}
