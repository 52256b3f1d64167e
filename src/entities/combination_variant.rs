//! Junction between combinations and the variant values they are made of.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Combination/variant link database model (composite primary key)
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "combination_variants")]
pub struct Model {
    /// Linked combination
    #[sea_orm(primary_key, auto_increment = false)]
    pub combination_id: i64,
    /// Linked variant value
    #[sea_orm(primary_key, auto_increment = false)]
    pub variant_value_id: i64,
}

/// Defines relationships of the junction rows
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The combination side of the link
    #[sea_orm(
        belongs_to = "super::variant_combination::Entity",
        from = "Column::CombinationId",
        to = "super::variant_combination::Column::Id",
        on_delete = "Cascade"
    )]
    Combination,
    /// The value side of the link
    #[sea_orm(
        belongs_to = "super::variant_value::Entity",
        from = "Column::VariantValueId",
        to = "super::variant_value::Column::Id"
    )]
    VariantValue,
}

impl Related<super::variant_combination::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Combination.def()
    }
}

impl Related<super::variant_value::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VariantValue.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
