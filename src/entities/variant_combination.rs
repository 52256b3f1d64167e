//! Variant combination entity - One concrete tuple of variant values for a product.
//!
//! When a product has combinations, the combination's `stock` is authoritative.
//! `variant_key` holds the ascending, comma-joined ids of the linked values and is
//! unique per product; the junction table stays the source the key is derived from.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Variant combination database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "variant_combinations")]
pub struct Model {
    /// Unique identifier for the combination
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Product this combination belongs to
    pub product_id: i64,
    /// Value labels joined in axis order (e.g., "Black-Large")
    pub combination_name: String,
    /// SKU suffix derived from value codes (e.g., "BLA-LAR")
    pub sku_suffix: String,
    /// Canonical variant value id set (e.g., "3,8")
    pub variant_key: String,
    /// Units on hand
    pub stock: i32,
    /// Amount added on top of base price and value surcharges
    pub price_modifier: f64,
    /// Inactive combinations cannot be ordered
    pub is_active: bool,
    /// When the combination was generated
    pub created_at: DateTimeUtc,
    /// When the combination was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `VariantCombination` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each combination belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
