//! Cart Models

use std::fmt::{self, Display, Formatter, Write as _};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Storage partition of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerKey {
    /// Cart of an anonymous visitor.
    Guest,

    /// Cart of an authenticated identity, keyed by its subject id.
    User(String),
}

impl OwnerKey {
    /// Storage marker of the guest cart.
    pub const GUEST: &'static str = "guest";

    /// Prefix of authenticated owner keys.
    pub const USER_PREFIX: &'static str = "user:";

    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }
}

impl Display for OwnerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guest => f.write_str(Self::GUEST),
            Self::User(subject) => write!(f, "{}{subject}", Self::USER_PREFIX),
        }
    }
}

/// The (product, size, color) tuple that decides line identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub product_id: String,
    pub size: Option<String>,
    pub color: Option<String>,
}

impl VariantKey {
    #[must_use]
    pub fn new(product_id: impl Into<String>, size: Option<String>, color: Option<String>) -> Self {
        Self {
            product_id: product_id.into(),
            size: normalize_selector(size),
            color: normalize_selector(color),
        }
    }
}

/// Renders `product-size-color` with `-` and `%` percent-escaped inside each
/// field, so distinct keys never render the same.
impl Display for VariantKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_escaped(f, &self.product_id)?;
        f.write_char('-')?;
        write_escaped(f, self.size.as_deref().unwrap_or_default())?;
        f.write_char('-')?;
        write_escaped(f, self.color.as_deref().unwrap_or_default())
    }
}

fn write_escaped(f: &mut Formatter<'_>, field: &str) -> fmt::Result {
    for ch in field.chars() {
        match ch {
            '%' => f.write_str("%25")?,
            '-' => f.write_str("%2D")?,
            _ => f.write_char(ch)?,
        }
    }

    Ok(())
}

/// Blank selectors and missing selectors describe the same variant.
pub(crate) fn normalize_selector(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();

        if trimmed.is_empty() {
            None
        } else if trimmed.len() == value.len() {
            Some(value)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Local-only cart line identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// Derive an id from the variant key and the moment the line was created.
    #[must_use]
    pub fn generate(key: &VariantKey, created_at: Timestamp) -> Self {
        Self(format!("{key}-{}", created_at.as_millisecond()))
    }

    /// The same id with a `-<n>` disambiguation suffix.
    #[must_use]
    pub(crate) fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}-{n}", self.0))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LineId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for LineId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for LineId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cart Line Model
///
/// Holds a snapshot of the product as it looked when the line was added or
/// last synchronised. The snapshot is never refreshed from the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub line_id: LineId,
    pub product_id: String,
    pub display_name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub image_url: String,
    pub unit_price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<u64>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    pub quantity: u32,
    pub stock_snapshot: u32,
}

impl CartLine {
    /// Build a line from a candidate, with the quantity taken as given.
    #[must_use]
    pub fn from_candidate(candidate: NewCartLine, quantity: u32, created_at: Timestamp) -> Self {
        let key = candidate.variant_key();

        Self {
            line_id: LineId::generate(&key, created_at),
            product_id: key.product_id,
            display_name: candidate.display_name,
            slug: candidate.slug,
            image_url: candidate.image_url,
            unit_price: candidate.unit_price,
            sale_price: candidate.sale_price,
            size: key.size,
            color: key.color,
            quantity,
            stock_snapshot: candidate.stock_snapshot,
        }
    }

    #[must_use]
    pub fn variant_key(&self) -> VariantKey {
        VariantKey::new(
            self.product_id.clone(),
            self.size.clone(),
            self.color.clone(),
        )
    }

    /// Sale price when it undercuts the regular price, regular price otherwise.
    #[must_use]
    pub fn effective_price(&self) -> u64 {
        match self.sale_price {
            Some(sale_price) if sale_price < self.unit_price => sale_price,
            _ => self.unit_price,
        }
    }

    #[must_use]
    pub fn line_total(&self) -> u64 {
        self.effective_price().saturating_mul(u64::from(self.quantity))
    }

    #[must_use]
    pub fn line_savings(&self) -> u64 {
        self.unit_price
            .saturating_sub(self.effective_price())
            .saturating_mul(u64::from(self.quantity))
    }

    /// Take the presentation, price and stock fields from a fresher candidate.
    pub(crate) fn refresh_snapshot(&mut self, candidate: NewCartLine) {
        self.display_name = candidate.display_name;
        self.slug = candidate.slug;
        self.image_url = candidate.image_url;
        self.unit_price = candidate.unit_price;
        self.sale_price = candidate.sale_price;
        self.stock_snapshot = candidate.stock_snapshot;
    }
}

/// New Cart Line Data
///
/// A product configuration offered for adding to the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartLine {
    pub product_id: String,
    pub display_name: String,
    pub slug: String,
    pub image_url: String,
    pub unit_price: u64,
    pub sale_price: Option<u64>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock_snapshot: u32,
}

impl NewCartLine {
    #[must_use]
    pub fn variant_key(&self) -> VariantKey {
        VariantKey::new(
            self.product_id.clone(),
            self.size.clone(),
            self.color.clone(),
        )
    }
}
