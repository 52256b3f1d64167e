//! Variant value entity - One value of a variant axis offered for one product.
//!
//! `stock` is a legacy column kept for old rows; availability always comes from
//! the combination (or the bare product) and never from this field.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Variant value database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "variant_values")]
pub struct Model {
    /// Unique identifier for the variant value
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Product offering this value
    pub product_id: i64,
    /// Axis this value belongs to; `None` only for legacy rows
    pub variant_type_id: Option<i64>,
    /// Axis label copied from the variant type (e.g., "Color")
    pub name: String,
    /// The value itself (e.g., "Black")
    pub value: String,
    /// Surcharge added to the unit price when selected
    pub additional_price: f64,
    /// Deprecated per-value stock, never consulted
    pub stock: Option<i32>,
}

/// Defines relationships between `VariantValue` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each value belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    /// Each value sits on one variant axis
    #[sea_orm(
        belongs_to = "super::variant_type::Entity",
        from = "Column::VariantTypeId",
        to = "super::variant_type::Column::Id"
    )]
    VariantType,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::variant_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VariantType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
