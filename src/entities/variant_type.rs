//! Variant type entity - A product attribute axis such as Size or Color.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Variant type database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "variant_types")]
pub struct Model {
    /// Unique identifier for the variant type
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lowercase machine name (e.g., "size"), unique
    #[sea_orm(unique)]
    pub name: String,
    /// Label shown to buyers (e.g., "Size")
    pub display_name: String,
    /// Position of this axis in combination names
    pub sort_order: i32,
}

/// `VariantType` relationships are declared from the value side
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
