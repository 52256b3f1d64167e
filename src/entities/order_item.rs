//! Order item entity - Frozen snapshot of one purchased cart line.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order item database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    /// Unique identifier for the order line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order holding this line
    pub order_id: i64,
    /// Purchased product
    pub product_id: i64,
    /// Purchased combination, `None` for products without variants
    pub combination_id: Option<i64>,
    /// Vendor that fulfils this line
    pub vendor_id: i64,
    /// Selected variants as they were at checkout
    pub selected_variants: Option<Json>,
    /// Units purchased
    pub quantity: i32,
    /// Unit price charged
    pub unit_price: f64,
    /// `unit_price * quantity`
    pub total_price: f64,
}

/// Defines relationships between `OrderItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
