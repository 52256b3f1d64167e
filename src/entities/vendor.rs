//! Vendor entity - Read model of the vendor registry.
//!
//! Only the approval status matters to the engine: products of vendors that are
//! not approved cannot be checked out.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Vendor database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vendors")]
pub struct Model {
    /// Unique identifier for the vendor
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name of the shop
    pub name: String,
    /// Approval state: `"pending"`, `"approved"`, `"suspended"` or `"rejected"`
    pub status: String,
    /// When the vendor was registered
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Whether the vendor may currently sell.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == "approved"
    }
}

/// `Vendor` relationships are declared from the product side
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
