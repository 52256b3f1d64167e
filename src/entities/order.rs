//! Order entity - Immutable record produced by a successful checkout.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Buyer-facing order reference (e.g., "ORD-20251016-000042")
    #[sea_orm(unique)]
    pub order_number: String,
    /// Buying user, if authenticated
    pub user_id: Option<i64>,
    /// Buying guest session, if not authenticated
    pub session_id: Option<String>,
    /// Shipping address id validated by the address service
    pub shipping_address_id: i64,
    /// `"cash_on_delivery"`, `"card"`, `"wallet"` or `"bank_transfer"`
    pub payment_method: String,
    /// Free-form buyer notes
    pub notes: Option<String>,
    /// Fulfilment state; always `"pending"` when created here
    pub status: String,
    /// Sum of line quantities
    pub total_items: i32,
    /// Sum of line totals
    pub subtotal: f64,
    /// Amount due
    pub total_amount: f64,
    /// When the order was committed
    pub created_at: DateTimeUtc,
}

/// `Order` relationships are declared from the item side
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
