//! Supply record entity - Append-only log of vendor restocks.
//!
//! Every row is written in the same transaction as the stock increment it caused.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Supply record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supply_records")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Vendor that delivered the goods
    pub vendor_id: i64,
    /// Restocked product
    pub product_id: i64,
    /// Restocked combination, `None` for products without variants
    pub combination_id: Option<i64>,
    /// Units received
    pub quantity_supplied: i32,
    /// When the goods were received
    pub supply_date: DateTimeUtc,
}

/// Defines relationships between `SupplyRecord` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each record refers to one product
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
