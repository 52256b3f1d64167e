//! Cart item entity - One line of a cart.
//!
//! `(cart_id, product_id, variant_key)` is unique: selecting the same product with
//! the same variant set again adds to the existing line.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cart item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Cart holding this line
    pub cart_id: i64,
    /// Product on this line
    pub product_id: i64,
    /// Canonical variant id set, empty when no variants are selected
    pub variant_key: String,
    /// Selected variants ordered by id, `None` when none are selected
    pub selected_variants: Option<Json>,
    /// Quantity requested
    pub quantity: i32,
    /// Unit price at the time of the last change
    pub unit_price: f64,
    /// `unit_price * quantity`
    pub total_price: f64,
    /// When the line was created
    pub created_at: DateTimeUtc,
    /// When the line was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `CartItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one cart
    #[sea_orm(
        belongs_to = "super::cart::Entity",
        from = "Column::CartId",
        to = "super::cart::Column::Id",
        on_delete = "Cascade"
    )]
    Cart,
    /// Each line references one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
