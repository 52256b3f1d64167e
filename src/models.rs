//! Domain types shared across the engine that are not database rows.
//!
//! Includes the stock unit addressing, cart ownership, the canonical variant
//! selection used as the cart matching key, and the JSON wire shape of cart lines.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The thing stock is tracked against.
///
/// Ordering is used for lock acquisition: all product units sort before all
/// combination units, then by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum StockUnit {
    /// A product sold without variants
    Product(i64),
    /// A concrete variant combination of a product
    Combination(i64),
}

impl StockUnit {
    /// Cache key for the stock hint of this unit.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::Product(id) => format!("stock:product:{id}"),
            Self::Combination(id) => format!("stock:combination:{id}"),
        }
    }
}

impl fmt::Display for StockUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product(id) => write!(f, "product #{id}"),
            Self::Combination(id) => write!(f, "combination #{id}"),
        }
    }
}

/// Owner of a cart: an authenticated user or a guest session, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerRef {
    /// Authenticated user id
    User(i64),
    /// Guest session token
    Session(String),
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Session(token) => write!(f, "session:{token}"),
        }
    }
}

/// One selected variant value as it travels on the wire and in JSON snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedVariant {
    /// Variant value id
    pub id: i64,
    /// Variant axis label (e.g. "Size")
    #[serde(default)]
    pub name: String,
    /// Selected value (e.g. "Large")
    #[serde(default)]
    pub value: String,
    /// Surcharge; optional on input, always server-computed on output
    #[serde(default)]
    pub additional_price: f64,
}

/// Canonical selected-variant set: sorted ascending by id, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantSelection(Vec<SelectedVariant>);

impl VariantSelection {
    /// Sorts the selection by id and rejects malformed sets.
    ///
    /// # Errors
    /// - `Validation` when an id is not positive
    /// - `Conflict` when an id appears twice
    pub fn normalize(mut variants: Vec<SelectedVariant>) -> Result<Self> {
        if let Some(bad) = variants.iter().find(|v| v.id <= 0) {
            return Err(Error::validation(format!(
                "Variant id must be positive, got {}",
                bad.id
            )));
        }
        variants.sort_by_key(|v| v.id);
        if let Some(pair) = variants.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(Error::conflict(format!(
                "Variant {} selected more than once",
                pair[0].id
            )));
        }
        Ok(Self(variants))
    }

    /// Builds a selection from already-canonical rows (used when reading snapshots back).
    pub(crate) const fn from_sorted(variants: Vec<SelectedVariant>) -> Self {
        Self(variants)
    }

    /// Ascending variant value ids.
    #[must_use]
    pub fn ids(&self) -> Vec<i64> {
        self.0.iter().map(|v| v.id).collect()
    }

    /// Matching key stored alongside cart lines and combinations.
    #[must_use]
    pub fn key(&self) -> String {
        variant_key(&self.ids())
    }

    /// Whether no variants are selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Selected variants in canonical order.
    #[must_use]
    pub fn variants(&self) -> &[SelectedVariant] {
        &self.0
    }

    /// Sum of all variant surcharges.
    #[must_use]
    pub fn additional_total(&self) -> f64 {
        self.0.iter().map(|v| v.additional_price).sum()
    }

    /// JSON snapshot for storage; `None` when nothing is selected.
    pub fn to_json(&self) -> Result<Option<serde_json::Value>> {
        if self.0.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_value(&self.0)?))
    }

    /// Reads a stored snapshot back.
    pub fn from_json(value: Option<&serde_json::Value>) -> Result<Self> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(json) => Ok(Self(serde_json::from_value(json.clone())?)),
        }
    }
}

/// Canonical key for a set of variant value ids: ascending, comma-joined.
#[must_use]
pub fn variant_key(ids: &[i64]) -> String {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Cart line as submitted by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineInput {
    /// Product being added
    pub product_id: i64,
    /// Optional variant selection
    #[serde(default)]
    pub selected_variants: Option<Vec<SelectedVariant>>,
    /// Requested quantity
    pub quantity: i32,
}

impl CartLineInput {
    /// Line without variants.
    #[must_use]
    pub const fn plain(product_id: i64, quantity: i32) -> Self {
        Self {
            product_id,
            selected_variants: None,
            quantity,
        }
    }

    /// Line selecting the given variant value ids (labels are filled in server-side).
    #[must_use]
    pub fn with_variants(product_id: i64, variant_ids: &[i64], quantity: i32) -> Self {
        let selected = variant_ids
            .iter()
            .map(|&id| SelectedVariant {
                id,
                name: String::new(),
                value: String::new(),
                additional_price: 0.0,
            })
            .collect();
        Self {
            product_id,
            selected_variants: Some(selected),
            quantity,
        }
    }
}

/// Vendor approval state as reported by the vendor registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    /// Awaiting review
    Pending,
    /// Allowed to sell
    Approved,
    /// Temporarily blocked
    Suspended,
    /// Application refused
    Rejected,
}

impl VendorStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Suspended => "suspended",
            Self::Rejected => "rejected",
        }
    }
}

/// Product publication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Visible and purchasable
    Active,
    /// Hidden from buyers
    Inactive,
    /// Not yet published
    Draft,
}

impl ProductStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Draft => "draft",
        }
    }
}

/// How the buyer intends to pay. Gateway integration lives elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Pay the courier
    CashOnDelivery,
    /// Card payment
    Card,
    /// Stored wallet balance
    Wallet,
    /// Manual bank transfer
    BankTransfer,
}

impl PaymentMethod {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cash_on_delivery",
            Self::Card => "card",
            Self::Wallet => "wallet",
            Self::BankTransfer => "bank_transfer",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cash_on_delivery" | "cod" => Ok(Self::CashOnDelivery),
            "card" => Ok(Self::Card),
            "wallet" => Ok(Self::Wallet),
            "bank_transfer" => Ok(Self::BankTransfer),
            other => Err(Error::validation(format!("Unknown payment method '{other}'"))),
        }
    }
}

/// Rounds a money amount to cents.
#[must_use]
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
