//! Product entity - Read model of the product catalog.
//!
//! Each product belongs to one vendor and carries its base price, an optional
//! discounted price and a publication status. `stock` is the bare-product stock
//! counter, used when the product is sold without variant combinations.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning vendor
    pub vendor_id: i64,
    /// Name of the product (e.g., "Canvas Sneaker")
    pub name: String,
    /// Base price per unit
    pub price: f64,
    /// Sale price; takes precedence over `price` when set
    pub discounted_price: Option<f64>,
    /// Publication state: `"active"`, `"inactive"` or `"draft"`
    pub status: String,
    /// Units on hand when the product has no variant combinations
    pub stock: i32,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Price a buyer pays before variant surcharges.
    #[must_use]
    pub fn effective_price(&self) -> f64 {
        self.discounted_price.unwrap_or(self.price)
    }

    /// Whether buyers may purchase the product.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product belongs to one vendor
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
